//! DLFlow processing library
//!
//! Typed, in-process routines that characterise an uploaded dataset:
//! a validator producing a `ValidationReport` and a sampler producing
//! `PreviewData`. Both are synchronous and meant to run on the blocking
//! pool; [`run_validation`] and [`run_sampling`] do that under a deadline.

pub mod codes;
pub mod error;
pub mod sampler;
pub mod tabular;
pub mod traits;
pub mod validator;

pub use error::ProcessingError;
pub use sampler::TabularSampler;
pub use traits::{run_sampling, run_validation, FileValidator, PreviewSampler};
pub use validator::{TabularValidator, ValidatorSettings};

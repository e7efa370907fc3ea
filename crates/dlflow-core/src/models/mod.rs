//! Data models for the ingestion pipeline
//!
//! Jobs, validation reports and previews are shared between the server crates
//! and the client library, so the wire format is defined once here.

mod file_job;
mod preview;
mod responses;
mod validation;

pub use file_job::*;
pub use preview::*;
pub use responses::*;
pub use validation::*;

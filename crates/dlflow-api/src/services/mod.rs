//! Request-side services used by the HTTP handlers.

pub mod jobs;
pub mod upload;

pub use jobs::JobService;
pub use upload::UploadReceiver;

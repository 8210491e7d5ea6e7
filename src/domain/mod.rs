pub mod error;
pub mod model;

pub use error::AppError;
pub use model::{transcode_reason, DownloadEvent, DownloadPhase, DownloadRequest, Session};

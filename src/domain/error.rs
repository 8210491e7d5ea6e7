use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("Invalid TikTok URL")]
    InvalidUrl,

    #[error("Download failed: {0}")]
    Extraction(String),

    #[error("Could not determine the downloaded file.")]
    OutputNotFound,

    #[error("{tool} is missing.\n\n{hint}")]
    MissingTool { tool: &'static str, hint: String },

    #[error("FFmpeg failed to convert.\n\n{0}")]
    Transcode(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Worker error: {0}")]
    Worker(String),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

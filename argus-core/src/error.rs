use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "ffmpeg")]
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Detector error: {0}")]
    Detector(String),

    #[error("Evidence store error: {0}")]
    Storage(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl From<lettre::error::Error> for CoreError {
    fn from(err: lettre::error::Error) -> Self {
        CoreError::Mail(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for CoreError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        CoreError::Mail(err.to_string())
    }
}

impl From<lettre::address::AddressError> for CoreError {
    fn from(err: lettre::address::AddressError) -> Self {
        CoreError::Mail(err.to_string())
    }
}

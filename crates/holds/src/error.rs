use thiserror::Error;

#[derive(Error, Debug)]
pub enum HoldError {
    #[error("Failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Click coordinates ({x},{y}) out of bounds for image {width}x{height}")]
    ClickOutOfBounds { x: i64, y: i64, width: u32, height: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Timed out after {seconds}s while {operation}")]
    Timeout { operation: String, seconds: u64 },

    #[error("Worker failure: {0}")]
    Worker(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HoldError {
    /// Errors caused by the request itself rather than by the system.
    /// These are reported back to the caller and never retried.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ImageDecode(_) | Self::InvalidImage(_) | Self::ClickOutOfBounds { .. } | Self::Base64(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, HoldError>;

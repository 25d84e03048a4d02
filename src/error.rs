use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Message generation failed: {0}")]
    Generation(String),

    #[error("Browser automation error: {0}")]
    Automation(String),

    #[error("Timed out after {seconds}s: {reason}")]
    Timeout { seconds: u64, reason: String },

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        AppError::Automation(format!("DevTools WebSocket error: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

//! Error types for vidgrab

use thiserror::Error;

/// Stable error codes, one per failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Input errors
    ValidationError,
    PreconditionError,

    // Remote errors
    BackendError,
    TransportError,

    // Local errors
    InvalidConfig,
    FileError,
}

/// Main error type for vidgrab
#[derive(Error, Debug)]
pub enum VidgrabError {
    /// Malformed or empty input, caught before any request
    #[error("{0}")]
    Validation(String),

    /// Operation invoked without its required prior state
    #[error("{0}")]
    Precondition(String),

    /// Non-2xx response or explicit `error` field from the backend
    #[error("{0}")]
    Backend(String),

    /// The backend could not be reached at all
    #[error("Server not reachable. Please make sure the backend server is running. ({0})")]
    Transport(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VidgrabError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::Precondition(_) => ErrorCode::PreconditionError,
            Self::Backend(_) => ErrorCode::BackendError,
            Self::Transport(_) => ErrorCode::TransportError,
            Self::InvalidConfig(_) => ErrorCode::InvalidConfig,
            Self::File(_) => ErrorCode::FileError,
            Self::Json(_) => ErrorCode::BackendError,
        }
    }
}

impl From<reqwest::Error> for VidgrabError {
    fn from(err: reqwest::Error) -> Self {
        // A body that arrived but would not decode is the server's fault,
        // everything else never made it there.
        if err.is_decode() || err.is_body() {
            Self::Backend(format!("Malformed response from server: {}", err))
        } else if err.is_status() {
            Self::Backend(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, VidgrabError>;

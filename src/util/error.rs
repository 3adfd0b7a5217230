//! Error types for the pass scheduler and its backends.

use thiserror::Error;

/// Failure reported by a rendering backend call.
///
/// The scheduler never retries these: a backend error ends the worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The rendering context could not be created
    #[error("Failed to create rendering context: {0}")]
    ContextCreation(String),

    /// An allocation for frame-sized resources failed
    #[error("Out of memory allocating {0}")]
    OutOfMemory(String),

    /// A call arrived before the context existed or after it was destroyed
    #[error("Backend context is not initialized")]
    NotInitialized,

    /// A shading program handle the backend never issued
    #[error("Unknown shading program: {0}")]
    UnknownProgram(u32),

    /// Generic nonzero error code from a backend operation
    #[error("Backend call '{op}' failed with code {code}")]
    Call { op: &'static str, code: i32 },
}

/// Main error type for scheduler operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Backend operation failed
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Zero-sized or oversized frame
    #[error("Invalid frame size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    /// Render options that cannot be honoured
    #[error("Invalid render options: {0}")]
    InvalidOptions(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid options error.
    pub fn invalid_options(msg: impl Into<String>) -> Self {
        Self::InvalidOptions(msg.into())
    }
}

/// Result type alias for scheduler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::InvalidSize { width: 0, height: 720 };
        assert!(e.to_string().contains("0x720"));

        let e = Error::Backend(BackendError::Call { op: "render_pass", code: 3 });
        assert!(e.to_string().contains("render_pass"));
        assert!(e.to_string().contains("3"));
    }

    #[test]
    fn test_error_from_backend() {
        let err: Error = BackendError::NotInitialized.into();
        assert!(matches!(err, Error::Backend(BackendError::NotInitialized)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}

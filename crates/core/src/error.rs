//! Error types shared by the application-facing crates.

use thiserror::Error;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Vulkan-related errors surfaced outside the RHI
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Window creation or event loop errors
    #[error("Window error: {0}")]
    Window(String),

    /// Invalid or unparsable configuration
    #[error("Config error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config("frames_in_flight must be in 1..=3".to_string());
        assert_eq!(
            err.to_string(),
            "Config error: frames_in_flight must be in 1..=3"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}

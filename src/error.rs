use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("No URL provided")]
    MissingUrl,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Browser launch failed: {0}")]
    BrowserLaunchFailed(String),

    #[error("Page error: {0}")]
    PageError(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Load state wait failed: {0}")]
    LoadStateFailed(String),

    #[error("Screenshot capture failed: {0}")]
    ScreenshotFailed(String),

    #[error("Content extraction failed: {0}")]
    ContentFailed(String),

    #[error("Page evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Browser close failed: {0}")]
    CloseFailed(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl CaptureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::MissingUrl | CaptureError::InvalidUrl(_) => ErrorKind::Usage,
            CaptureError::ConfigurationError(_) => ErrorKind::Configuration,
            CaptureError::IoError(_) | CaptureError::SerializationError(_) => {
                ErrorKind::Persistence
            }
            _ => ErrorKind::Capture,
        }
    }

    pub fn is_usage(&self) -> bool {
        matches!(self.kind(), ErrorKind::Usage)
    }
}

/// Which stage of the pipeline an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing command-line input, detected before any browser work
    Usage,
    /// Invalid configuration file or override
    Configuration,
    /// Failure while the browser session was open
    Capture,
    /// Directory creation or file write failure
    Persistence,
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(err: serde_json::Error) -> Self {
        CaptureError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        assert_eq!(CaptureError::MissingUrl.kind(), ErrorKind::Usage);
        assert_eq!(CaptureError::InvalidUrl("x".to_string()).kind(), ErrorKind::Usage);
        assert_eq!(
            CaptureError::Timeout(Duration::from_secs(30)).kind(),
            ErrorKind::Capture
        );
        assert_eq!(
            CaptureError::BrowserLaunchFailed("no chrome".to_string()).kind(),
            ErrorKind::Capture
        );
        assert_eq!(
            CaptureError::IoError("disk full".to_string()).kind(),
            ErrorKind::Persistence
        );
        assert_eq!(
            CaptureError::ConfigurationError("bad".to_string()).kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CaptureError = io.into();
        assert!(matches!(err, CaptureError::IoError(ref msg) if msg.contains("denied")));
        assert!(!err.is_usage());
    }
}

//! Error types for the render pipeline

use thiserror::Error;

/// Result type alias for render operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while turning a card document into an image
#[derive(Error, Debug)]
pub enum Error {
    /// The browser process failed to start
    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    /// Page setup or content injection failed
    #[error("Failed to load document: {0}")]
    Load(String),

    /// The page did not go quiet within the load budget
    #[error("Page load timed out after {0}ms")]
    Timeout(u64),

    /// Snapshot failed after a successful load
    #[error("Screenshot capture failed: {0}")]
    Capture(String),

    /// Closing the browser failed. Only ever logged.
    #[error("Browser teardown failed: {0}")]
    Teardown(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The render worker went away before replying
    #[error("Render worker failed: {0}")]
    Worker(String),
}

/// Rejections raised before any rendering work starts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// One or more of the required text fields is missing or blank
    #[error("Missing required fields: {}", .missing.join(", "))]
    MissingFields { missing: Vec<&'static str> },

    /// An image reference is not an http(s) URL or a `data:image/*` URI
    #[error("Invalid {field}: {reason}")]
    InvalidImageRef { field: &'static str, reason: String },
}

/// Everything the render service can fail with
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Render(#[from] Error),
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Load(err.to_string())
    }
}

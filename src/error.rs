//! Error types for table export

use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while exporting a table
#[derive(Error, Debug)]
pub enum Error {
    /// The requested browser driver name is not one of the known drivers
    #[error("Unsupported web driver '{0}' (expected one of: chrome, firefox, safari, edge)")]
    UnsupportedDriver(String),

    /// The output file extension does not map to a writable format
    #[error("Unsupported output format '{0}'")]
    UnsupportedFormat(String),

    /// A backend, binary or feature needed for this export is not available
    #[error("{capability} is not available; {remedy}")]
    MissingCapability { capability: String, remedy: String },

    /// Failed to launch the browser or connect to its driver
    #[error("Browser initialization failed: {0}")]
    InitializationError(String),

    /// Failed to load the scratch page
    #[error("Failed to load page: {0}")]
    LoadError(String),

    /// Failed to execute JavaScript
    #[error("Script execution failed: {0}")]
    ScriptError(String),

    /// No element matched the selector
    #[error("No element matched tag name '{selector}'")]
    ElementNotFound { selector: String },

    /// Failed to capture the screenshot
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// The computed crop rectangle is inverted
    #[error("Invalid crop rectangle: {0}")]
    InvalidCrop(String),

    /// WebDriver protocol error
    #[cfg(feature = "webdriver")]
    #[error("WebDriver error: {0}")]
    WebDriverError(String),

    /// The browser session was used after it was closed
    #[error("Browser session already closed")]
    SessionClosed,

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Failed to assemble the PDF container
    #[cfg(feature = "pdf")]
    #[error("PDF output failed: {0}")]
    PdfError(String),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

#[cfg(feature = "pdf")]
impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::PdfError(err.to_string())
    }
}

impl Error {
    /// Whether the error should surface as-is rather than be wrapped into
    /// the failing stage's variant
    pub(crate) fn passes_through(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_) | Error::SessionClosed | Error::ElementNotFound { .. }
        )
    }

    pub(crate) fn missing(capability: impl Into<String>, remedy: impl Into<String>) -> Self {
        Error::MissingCapability {
            capability: capability.into(),
            remedy: remedy.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_capability_names_the_remedy() {
        let err = Error::missing("geckodriver", "install it and put it on PATH");
        assert_eq!(
            err.to_string(),
            "geckodriver is not available; install it and put it on PATH"
        );
    }

    #[test]
    fn timeouts_and_closed_sessions_pass_through() {
        assert!(Error::Timeout(300).passes_through());
        assert!(Error::SessionClosed.passes_through());
        assert!(!Error::LoadError("x".into()).passes_through());
    }

    #[test]
    fn unsupported_driver_lists_known_drivers() {
        let msg = Error::UnsupportedDriver("opera".into()).to_string();
        assert!(msg.contains("opera"));
        assert!(msg.contains("chrome, firefox, safari, edge"));
    }
}

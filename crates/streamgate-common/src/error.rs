//! Common error types used throughout streamgate.
//!
//! Every failure that can surface while answering a request maps to one
//! variant here, and every variant maps to exactly one HTTP status through
//! [`Error::http_status`].

/// Common error type for streamgate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A stream identifier is not a valid encoding of any address.
    #[error("Invalid stream identifier: {0}")]
    Decode(String),

    /// The address scheme has no input process that can acquire it.
    #[error("Unsupported stream address: {0}")]
    UnsupportedScheme(String),

    /// The OS refused to start a pipeline process.
    #[error("Failed to spawn {process}: {source}")]
    Spawn {
        process: String,
        #[source]
        source: std::io::Error,
    },

    /// The address is not on the configured allow list.
    #[error("Stream has not been enabled: {0}")]
    NotAllowed(String),

    /// A request path resolved outside the served root.
    #[error("Path escapes the served root: {0}")]
    PathTraversal(String),

    /// The passthrough upstream could not be resolved or fetched.
    #[error("Upstream fetch failed: {0}")]
    UpstreamFetch(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a new Decode error.
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new Spawn error for the named process.
    pub fn spawn<S: Into<String>>(process: S, source: std::io::Error) -> Self {
        Self::Spawn {
            process: process.into(),
            source,
        }
    }

    /// Create a new UpstreamFetch error.
    pub fn upstream<S: Into<String>>(msg: S) -> Self {
        Self::UpstreamFetch(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// HTTP status code this error is answered with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Decode(_) | Self::InvalidInput(_) => 400,
            Self::NotAllowed(_) | Self::PathTraversal(_) => 403,
            Self::UnsupportedScheme(_) | Self::Spawn { .. } | Self::Io(_) => 500,
            Self::UpstreamFetch(_) => 502,
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::decode("not base64");
        assert_eq!(err.to_string(), "Invalid stream identifier: not base64");

        let err = Error::NotAllowed("https://example.com/other".into());
        assert_eq!(
            err.to_string(),
            "Stream has not been enabled: https://example.com/other"
        );

        let err = Error::spawn(
            "ffmpeg",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(err.to_string(), "Failed to spawn ffmpeg: no such file");
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(Error::decode("x").http_status(), 400);
        assert_eq!(Error::invalid_input("x").http_status(), 400);
        assert_eq!(Error::NotAllowed("x".into()).http_status(), 403);
        assert_eq!(Error::PathTraversal("x".into()).http_status(), 403);
        assert_eq!(Error::UnsupportedScheme("x".into()).http_status(), 500);
        assert_eq!(
            Error::spawn("x", std::io::Error::other("boom")).http_status(),
            500
        );
        assert_eq!(Error::upstream("x").http_status(), 502);
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }
}

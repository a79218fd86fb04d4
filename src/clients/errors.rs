use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong talking to Last.fm or writing the page
#[derive(Error, Debug)]
pub enum Error {
    /// Transport failure: connection, timeout, unreadable body
    #[error("LastFM request error: {0}")]
    LastFMRequestError(#[from] reqwest::Error),

    /// Body is not the JSON shape we read
    #[error("LastFM Deserialization error: {0}")]
    LastFMDeserializationError(#[from] serde_json::Error),

    /// Last.fm error envelope
    #[error("LastFM API error {code}: {message}")]
    LastFMApiError {
        /// Last.fm error code
        code: i64,
        /// Human readable message from Last.fm
        message: String,
    },

    /// Parsed body is missing a required field
    #[error("LastFM API unexpected response: {0}")]
    LastFMUnexpectedResponse(String),

    /// The element to write does not exist
    #[error("Target element not found: {0}")]
    MissingTarget(String),

    /// I/O failure while reading or writing the page
    #[error("Page error: {0}")]
    PageError(#[from] std::io::Error),

    /// Missing or invalid setting
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl From<std::env::VarError> for Error {
    fn from(err: std::env::VarError) -> Self {
        Error::ConfigurationError(err.to_string())
    }
}

/// Coarse classification of an [`Error`], carried by refresh outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection failure, timeout or unreadable body
    Network,
    /// Body was not the JSON we expected
    Parse,
    /// Last.fm answered with its error envelope
    Api,
    /// JSON parsed but lacked a required field
    UnexpectedResponse,
    /// The target element does not exist
    MissingTarget,
    /// Writing the target failed
    Page,
    /// Invalid or missing settings
    Configuration,
}

impl Error {
    /// Classify this error for reporting in a refresh outcome
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::LastFMRequestError(_) => ErrorKind::Network,
            Error::LastFMDeserializationError(_) => ErrorKind::Parse,
            Error::LastFMApiError { .. } => ErrorKind::Api,
            Error::LastFMUnexpectedResponse(_) => ErrorKind::UnexpectedResponse,
            Error::MissingTarget(_) => ErrorKind::MissingTarget,
            Error::PageError(_) => ErrorKind::Page,
            Error::ConfigurationError(_) => ErrorKind::Configuration,
        }
    }
}

//! Error types for client calls.
//!
//! Every failure a call can end in is a variant of [`Error`]. HTTP error
//! statuses are carried as [`Error::Status`] with a classified [`ErrorKind`],
//! so callers can match on the kind without inspecting raw status codes.

use http::{HeaderMap, StatusCode};
use std::fmt;

/// The classified kind of a non-2xx HTTP response.
///
/// See [`crate::classify`] for the status-to-kind mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 404 Not Found.
    NotFound,
    /// 401 Unauthorized.
    Unauthorized,
    /// 400 Bad Request.
    InvalidRequest,
    /// 409 Conflict.
    Conflict,
    /// Any other non-2xx status.
    HttpError(StatusCode),
}

impl ErrorKind {
    /// Returns the status code this kind stands for.
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::HttpError(status) => *status,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => f.write_str("Resource not found"),
            ErrorKind::Unauthorized => f.write_str("Unauthorized"),
            ErrorKind::InvalidRequest => f.write_str("Invalid request"),
            ErrorKind::Conflict => f.write_str("Conflict"),
            ErrorKind::HttpError(status) => write!(f, "HTTP error: {}", status),
        }
    }
}

/// The main error type for client calls.
///
/// # Examples
///
/// ```no_run
/// use steadfast::{Client, Error, ErrorKind};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("http://localhost:8080")?
///     .build()?;
///
/// match client.get::<serde_json::Value>("/users/7").await {
///     Ok(response) => println!("Found: {:?}", response.data),
///     Err(Error::Status { kind: ErrorKind::NotFound, .. }) => println!("No such user"),
///     Err(Error::RetriesExhausted { attempts, last_error }) => {
///         eprintln!("Gave up after {} attempts: {}", attempts, last_error);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A connection, DNS or socket level failure.
    ///
    /// Timeouts reported by the transport are mapped to [`Error::Timeout`]
    /// instead.
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// A deadline elapsed, either on a single attempt or on the whole call.
    #[error("Request timed out")]
    Timeout,

    /// The server answered with a non-2xx status.
    #[error("{kind}: {raw_response}")]
    Status {
        /// The classified kind of the status.
        kind: ErrorKind,
        /// The raw response body.
        raw_response: String,
        /// The response headers.
        headers: HeaderMap,
    },

    /// Failed to deserialize a 2xx response body into the expected type.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// Invalid client, request or configuration-file settings.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Every attempt allowed by the retry policy failed with a retryable error.
    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// The number of attempts made
        attempts: usize,
        /// The error of the final attempt
        last_error: Box<Error>,
    },

    /// Failed to serialize the request body.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// An interceptor aborted the chain.
    #[error("Interceptor aborted request: {0}")]
    Interceptor(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Error::Timeout
        } else {
            Error::Transport(error)
        }
    }
}

impl Error {
    /// Returns `true` if this error is potentially retryable.
    ///
    /// Transport errors, timeouts and 5xx statuses are retryable. Classified
    /// 4xx kinds and local failures are not.
    ///
    /// # Examples
    ///
    /// ```
    /// use steadfast::{Error, ErrorKind};
    /// use http::{HeaderMap, StatusCode};
    ///
    /// let err = Error::Status {
    ///     kind: ErrorKind::HttpError(StatusCode::SERVICE_UNAVAILABLE),
    ///     raw_response: String::new(),
    ///     headers: HeaderMap::new(),
    /// };
    /// assert!(err.is_retryable());
    ///
    /// let err = Error::Status {
    ///     kind: ErrorKind::Conflict,
    ///     raw_response: String::new(),
    ///     headers: HeaderMap::new(),
    /// };
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Timeout => true,
            Error::Status { kind, .. } => match kind {
                ErrorKind::HttpError(status) => status.is_server_error(),
                _ => false,
            },
            Error::DeserializationFailed { .. } => false,
            Error::ConfigurationError(_) => false,
            Error::RetriesExhausted { .. } => false,
            Error::SerializationFailed(_) => false,
            Error::Interceptor(_) => false,
            Error::InvalidUrl(_) => false,
        }
    }

    /// Returns the classified kind for [`Error::Status`], looking through
    /// [`Error::RetriesExhausted`] to the last attempt.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Status { kind, .. } => Some(*kind),
            Error::RetriesExhausted { last_error, .. } => last_error.kind(),
            _ => None,
        }
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Status { kind, .. } => Some(kind.status()),
            Error::DeserializationFailed { status, .. } => Some(*status),
            Error::RetriesExhausted { last_error, .. } => last_error.status(),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::Status { raw_response, .. } => Some(raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    /// Returns `true` for [`Error::Timeout`], including a timed-out last attempt.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout => true,
            Error::RetriesExhausted { last_error, .. } => last_error.is_timeout(),
            _ => false,
        }
    }
}

/// A specialized `Result` type for client calls.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(kind: ErrorKind) -> Error {
        Error::Status {
            kind,
            raw_response: "body".to_string(),
            headers: HeaderMap::new(),
        }
    }

    #[test]
    fn test_only_server_errors_are_retryable_statuses() {
        assert!(status_error(ErrorKind::HttpError(StatusCode::INTERNAL_SERVER_ERROR)).is_retryable());
        assert!(status_error(ErrorKind::HttpError(StatusCode::BAD_GATEWAY)).is_retryable());
        assert!(!status_error(ErrorKind::HttpError(StatusCode::TOO_MANY_REQUESTS)).is_retryable());
        assert!(!status_error(ErrorKind::HttpError(StatusCode::FORBIDDEN)).is_retryable());
        for kind in [
            ErrorKind::NotFound,
            ErrorKind::Unauthorized,
            ErrorKind::InvalidRequest,
            ErrorKind::Conflict,
        ] {
            assert!(!status_error(kind).is_retryable(), "{kind:?} must not retry");
        }
    }

    #[test]
    fn test_timeout_is_retryable_local_errors_are_not() {
        assert!(Error::Timeout.is_retryable());
        assert!(!Error::ConfigurationError("bad".into()).is_retryable());
        assert!(!Error::SerializationFailed("bad".into()).is_retryable());
        assert!(!Error::Interceptor("denied".into()).is_retryable());
    }

    #[test]
    fn test_accessors_look_through_exhausted_retries() {
        let err = Error::RetriesExhausted {
            attempts: 3,
            last_error: Box::new(status_error(ErrorKind::HttpError(
                StatusCode::SERVICE_UNAVAILABLE,
            ))),
        };
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(
            err.kind(),
            Some(ErrorKind::HttpError(StatusCode::SERVICE_UNAVAILABLE))
        );
        assert!(!err.is_timeout());
        assert!(err.raw_response().is_none());
    }

    #[test]
    fn test_kind_display_and_status() {
        assert_eq!(ErrorKind::NotFound.to_string(), "Resource not found");
        assert_eq!(
            ErrorKind::HttpError(StatusCode::BAD_GATEWAY).to_string(),
            "HTTP error: 502 Bad Gateway"
        );
        assert_eq!(ErrorKind::Conflict.status(), StatusCode::CONFLICT);
        assert_eq!(
            status_error(ErrorKind::Unauthorized).to_string(),
            "Unauthorized: body"
        );
    }
}

//! Status classification.
//!
//! [`classify`] turns a [`RawResponse`] into an [`Outcome`]. It is pure: the
//! same status always yields the same kind, and it never decides what the
//! caller does with an error.
//!
//! | status | kind |
//! |---|---|
//! | 404 | [`ErrorKind::NotFound`] |
//! | 401 | [`ErrorKind::Unauthorized`] |
//! | 400 | [`ErrorKind::InvalidRequest`] |
//! | 409 | [`ErrorKind::Conflict`] |
//! | any other non-2xx | [`ErrorKind::HttpError`] |
//! | 2xx | success |

use crate::transport::RawResponse;
use crate::{Error, ErrorKind};
use http::StatusCode;

/// The result of one attempt, as seen by the retry policy.
#[derive(Debug)]
pub enum Outcome {
    /// A 2xx response.
    Success(RawResponse),
    /// A non-2xx response, as an [`Error::Status`].
    ClassifiedError(Error),
    /// A failure before any response arrived that may succeed on retry.
    TransientFailure(Error),
    /// A failure before any response arrived that retrying cannot fix.
    FatalFailure(Error),
}

impl Outcome {
    /// Builds the outcome of one attempt: responses are classified, errors
    /// are split by [`Error::is_retryable`].
    pub fn from_attempt(attempt: crate::Result<RawResponse>) -> Self {
        match attempt {
            Ok(response) => classify(response),
            Err(error) if error.is_retryable() => Outcome::TransientFailure(error),
            Err(error) => Outcome::FatalFailure(error),
        }
    }

    /// Returns `true` for [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// Returns the error kind for a status, or `None` for 2xx.
pub fn kind_for_status(status: StatusCode) -> Option<ErrorKind> {
    match status {
        StatusCode::NOT_FOUND => Some(ErrorKind::NotFound),
        StatusCode::UNAUTHORIZED => Some(ErrorKind::Unauthorized),
        StatusCode::BAD_REQUEST => Some(ErrorKind::InvalidRequest),
        StatusCode::CONFLICT => Some(ErrorKind::Conflict),
        status if status.is_success() => None,
        status => Some(ErrorKind::HttpError(status)),
    }
}

/// Classifies a response by its status code.
pub fn classify(response: RawResponse) -> Outcome {
    match kind_for_status(response.status) {
        None => Outcome::Success(response),
        Some(kind) => {
            let raw_response = response.text();
            Outcome::ClassifiedError(Error::Status {
                kind,
                raw_response,
                headers: response.headers,
            })
        }
    }
}

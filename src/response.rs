//! Typed response wrapper.

use crate::transport::RawResponse;
use crate::{Error, Result};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// A successful call: the decoded body plus what it took to get it.
///
/// # Examples
///
/// ```no_run
/// use steadfast::Client;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), steadfast::Error> {
/// let client = Client::builder()
///     .base_url("http://localhost:8080")?
///     .build()?;
///
/// let response = client.get::<User>("/users/1").await?;
/// println!("{} took {:?} over {} attempts", response.name, response.latency, response.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The deserialized response data.
    pub data: T,

    /// The raw response body as a string.
    pub raw_body: String,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from the first attempt to the successful response, backoff included.
    pub latency: Duration,

    /// The number of attempts made; `1` if the first one succeeded.
    pub attempts: usize,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        raw_body: String,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            data,
            raw_body,
            status,
            headers,
            latency,
            attempts,
        }
    }

    /// Maps the response data, keeping the metadata.
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Returns `true` if the call needed more than one attempt.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl Response<()> {
    /// Wraps a response whose body is ignored, such as a 204.
    pub(crate) fn empty(raw: RawResponse, latency: Duration, attempts: usize) -> Self {
        let raw_body = raw.text();
        Response::new((), raw_body, raw.status, raw.headers, latency, attempts)
    }
}

impl<T: DeserializeOwned> Response<T> {
    /// Decodes a 2xx body as JSON.
    pub(crate) fn decode(raw: RawResponse, latency: Duration, attempts: usize) -> Result<Self> {
        let raw_body = raw.text();
        match serde_json::from_str::<T>(&raw_body) {
            Ok(data) => Ok(Response::new(
                data,
                raw_body,
                raw.status,
                raw.headers,
                latency,
                attempts,
            )),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    raw_response = %raw_body,
                    "Failed to deserialize response"
                );

                Err(Error::DeserializationFailed {
                    raw_response: raw_body,
                    serde_error: e.to_string(),
                    status: raw.status,
                })
            }
        }
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn raw(status: StatusCode, body: &str) -> RawResponse {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("abc"));
        RawResponse::new(status, headers, body.as_bytes().to_vec())
    }

    #[test]
    fn test_decode_keeps_metadata() {
        let response = Response::<Vec<u32>>::decode(
            raw(StatusCode::OK, "[1,2]"),
            Duration::from_millis(5),
            2,
        )
        .unwrap();

        assert_eq!(response.data, vec![1, 2]);
        assert_eq!(response.raw_body, "[1,2]");
        assert_eq!(response.header("x-request-id"), Some("abc"));
        assert!(response.was_retried());
        assert_eq!(response.len(), 2);
    }

    #[test]
    fn test_decode_failure_keeps_raw_body() {
        let result = Response::<Vec<u32>>::decode(raw(StatusCode::OK, "nope"), Duration::ZERO, 1);

        match result {
            Err(Error::DeserializationFailed {
                raw_response,
                status,
                ..
            }) => {
                assert_eq!(raw_response, "nope");
                assert_eq!(status, StatusCode::OK);
            }
            other => panic!("Expected DeserializationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_ignores_body_and_map_keeps_metadata() {
        let response = Response::empty(raw(StatusCode::NO_CONTENT, ""), Duration::ZERO, 1)
            .map(|()| "deleted");

        assert_eq!(response.data, "deleted");
        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert!(!response.was_retried());
    }
}

//! Request metadata: the description of one logical call before it is built
//! into a concrete [`Request`](crate::transport::Request).

use crate::retry::RetryPolicy;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use std::time::Duration;

/// Metadata for an individual call.
///
/// The path may be a template with `{name}` placeholders, filled from
/// [`with_path_param`](Self::with_path_param) when the request is built.
///
/// # Examples
///
/// ```
/// use steadfast::metadata::RequestMetadata;
/// use http::Method;
///
/// let metadata = RequestMetadata::new(Method::GET, "/users/retry/{id}")
///     .with_path_param("id", 7)
///     .with_query_param("failCount", "2");
///
/// assert_eq!(metadata.resolved_path().unwrap(), "/users/retry/7");
/// ```
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// The HTTP method (GET, POST, etc.).
    pub method: Method,

    /// The request path template (relative to the base URL).
    pub path: String,

    /// Values for `{name}` placeholders in the path.
    pub path_params: Vec<(String, String)>,

    /// Additional headers for this request.
    pub headers: HeaderMap,

    /// Query parameters for this request, in insertion order.
    pub query_params: Vec<(String, String)>,

    /// Retry policy for this call. Falls back to the client's policy.
    pub retry_policy: Option<RetryPolicy>,

    /// Deadline for the whole call, retries and backoff included.
    pub deadline: Option<Duration>,
}

impl RequestMetadata {
    /// Creates a new `RequestMetadata` with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            path_params: Vec::new(),
            headers: HeaderMap::new(),
            query_params: Vec::new(),
            retry_policy: None,
            deadline: None,
        }
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, crate::Error> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Sets the value substituted for `{name}` in the path.
    pub fn with_path_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.path_params.push((name.into(), value.to_string()));
        self
    }

    /// Adds a query parameter to the request.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// Adds multiple query parameters to the request.
    pub fn with_query_params(
        mut self,
        params: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.query_params.extend(params);
        self
    }

    /// Overrides the client's retry policy for this call.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Bounds the whole call, including retries and backoff, by `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns the path with every placeholder substituted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`](crate::Error::ConfigurationError)
    /// if a placeholder has no value or is left unterminated.
    pub fn resolved_path(&self) -> Result<String, crate::Error> {
        let mut resolved = String::with_capacity(self.path.len());
        let mut rest = self.path.as_str();

        while let Some(open) = rest.find('{') {
            resolved.push_str(&rest[..open]);
            let close = rest[open..].find('}').ok_or_else(|| {
                crate::Error::ConfigurationError(format!("Unterminated path parameter in {}", self.path))
            })?;
            let name = &rest[open + 1..open + close];
            let value = self
                .path_params
                .iter()
                .rev()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value)
                .ok_or_else(|| {
                    crate::Error::ConfigurationError(format!("Missing path parameter: {}", name))
                })?;
            resolved.push_str(value);
            rest = &rest[open + close + 1..];
        }
        resolved.push_str(rest);

        Ok(resolved)
    }
}

impl Default for RequestMetadata {
    fn default() -> Self {
        Self::new(Method::GET, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_multiple_placeholders() {
        let metadata = RequestMetadata::new(Method::PUT, "/teams/{team}/users/{id}")
            .with_path_param("team", "core")
            .with_path_param("id", 42);
        assert_eq!(metadata.resolved_path().unwrap(), "/teams/core/users/42");
    }

    #[test]
    fn test_plain_path_is_unchanged() {
        let metadata = RequestMetadata::new(Method::POST, "/users/reset");
        assert_eq!(metadata.resolved_path().unwrap(), "/users/reset");
    }

    #[test]
    fn test_missing_parameter_is_rejected() {
        let metadata = RequestMetadata::new(Method::GET, "/users/{id}");
        assert!(matches!(
            metadata.resolved_path(),
            Err(crate::Error::ConfigurationError(msg)) if msg.contains("id")
        ));
    }

    #[test]
    fn test_unterminated_placeholder_is_rejected() {
        let metadata = RequestMetadata::new(Method::GET, "/users/{id").with_path_param("id", 1);
        assert!(metadata.resolved_path().is_err());
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        assert!(RequestMetadata::default().with_header("bad header", "v").is_err());
        let metadata = RequestMetadata::default()
            .with_header("x-trace", "abc")
            .unwrap();
        assert_eq!(metadata.headers.get("x-trace").unwrap(), "abc");
    }
}

//! The lowest layer of a call: one network round trip.
//!
//! A [`Transport`] sends a fully built [`Request`] and returns the
//! [`RawResponse`] whatever its status. It never retries, classifies or logs;
//! those concerns belong to the layers above it.

use crate::Result;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use url::Url;

/// A boxed, sendable future, as returned by [`Transport`] and
/// [`Interceptor`](crate::interceptor::Interceptor) implementations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A fully built outgoing request.
///
/// Requests are immutable; the `with_*` methods consume the request and
/// return a new one, which is how interceptors rewrite it.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    timeout: Option<Duration>,
}

impl Request {
    /// Creates a request without headers, body or timeout.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The target URL, path parameters and query already applied.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The serialized body, if any.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// The timeout for a single attempt of this request.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the request with `name` set to `value`, replacing earlier values.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns the request with every header in `headers` set.
    pub fn with_headers(mut self, headers: &HeaderMap) -> Self {
        for (name, value) in headers {
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Returns the request with a JSON body and matching content type.
    pub fn with_json_body(mut self, body: Vec<u8>) -> Self {
        self.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Some(body);
        self
    }

    /// Returns the request with a per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A response as it came off the wire.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The full response body.
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Creates a response from its parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// The body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends one request and returns its response.
///
/// Implementations must be safe to share between concurrent calls.
pub trait Transport: Send + Sync {
    /// Performs a single round trip.
    ///
    /// Returns `Ok` for every response the server produced, including error
    /// statuses. Connection-level failures return [`crate::Error::Transport`]
    /// and an elapsed request timeout returns [`crate::Error::Timeout`].
    fn send<'a>(&'a self, request: Request) -> BoxFuture<'a, Result<RawResponse>>;
}

/// [`Transport`] backed by a pooled `reqwest` client.
///
/// Cloning is cheap and clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Wraps an existing `reqwest` client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn send<'a>(&'a self, request: Request) -> BoxFuture<'a, Result<RawResponse>> {
        Box::pin(async move {
            let Request {
                method,
                url,
                headers,
                body,
                timeout,
            } = request;

            let mut builder = self.client.request(method, url).headers(headers);
            if let Some(timeout) = timeout {
                builder = builder.timeout(timeout);
            }
            if let Some(body) = body {
                builder = builder.body(body);
            }

            let response = builder.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?.to_vec();

            Ok(RawResponse::new(status, headers, body))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("http://localhost:8080/users/1").unwrap()
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let request = Request::new(Method::POST, url()).with_json_body(b"{}".to_vec());
        assert_eq!(request.body(), Some(&b"{}"[..]));
        assert_eq!(
            request.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_with_header_replaces_existing_value() {
        let request = Request::new(Method::GET, url())
            .with_header(HeaderName::from_static("x-a"), HeaderValue::from_static("1"))
            .with_header(HeaderName::from_static("x-a"), HeaderValue::from_static("2"));
        assert_eq!(request.headers().get_all("x-a").iter().count(), 1);
        assert_eq!(request.headers().get("x-a").unwrap(), "2");
    }

    #[test]
    fn test_raw_response_text_is_lossy() {
        let response = RawResponse::new(StatusCode::OK, HeaderMap::new(), vec![b'o', b'k', 0xff]);
        assert_eq!(response.text(), "ok\u{fffd}");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(reqwest::Client::new());
        let url = Url::parse(&format!("http://{}/users/1", addr)).unwrap();
        let result = transport.send(Request::new(Method::GET, url)).await;

        match result {
            Err(err @ crate::Error::Transport(_)) => assert!(err.is_retryable()),
            other => panic!("Expected Transport error, got {:?}", other),
        }
    }
}

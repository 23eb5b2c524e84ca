//! The interceptor chain wrapped around every transport call.
//!
//! An [`Interceptor`] receives the outgoing [`Request`] and a [`Next`] handle
//! for the remainder of the chain. It may rewrite the request, call
//! [`Next::run`], inspect or rewrite the response, or return an error without
//! calling `next` at all, which aborts the call.
//!
//! The chain is built once by [`ClientBuilder`](crate::ClientBuilder) and is
//! read-only afterwards. The default links, outermost first, are:
//!
//! 1. [`BearerAuth`] attaches the bearer token.
//! 2. [`RequestDebugLog`] logs method and URI at debug level.
//! 3. [`ExchangeLogger`] logs the full request, then the response status.
//!
//! # Examples
//!
//! ```
//! use steadfast::interceptor::{Interceptor, Next};
//! use steadfast::transport::{BoxFuture, RawResponse, Request};
//! use steadfast::Error;
//!
//! /// Refuses to send anything but GET.
//! struct ReadOnly;
//!
//! impl Interceptor for ReadOnly {
//!     fn intercept<'a>(
//!         &'a self,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, steadfast::Result<RawResponse>> {
//!         Box::pin(async move {
//!             if request.method() != http::Method::GET {
//!                 return Err(Error::Interceptor("read-only client".to_string()));
//!             }
//!             next.run(request).await
//!         })
//!     }
//! }
//! ```

use crate::transport::{BoxFuture, RawResponse, Request, Transport};
use crate::{Error, Result};
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue};
use std::fmt;
use std::sync::Arc;

/// A link in the chain around the transport.
pub trait Interceptor: Send + Sync {
    /// Handles one request, normally by delegating to `next`.
    fn intercept<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Result<RawResponse>>;
}

/// The remainder of the chain, ending at the transport.
pub struct Next<'a> {
    interceptors: &'a [Arc<dyn Interceptor>],
    transport: &'a dyn Transport,
}

impl<'a> Next<'a> {
    /// Passes `request` to the next interceptor, or to the transport once
    /// every interceptor has run.
    pub fn run(self, request: Request) -> BoxFuture<'a, Result<RawResponse>> {
        match self.interceptors.split_first() {
            Some((current, rest)) => current.intercept(
                request,
                Next {
                    interceptors: rest,
                    transport: self.transport,
                },
            ),
            None => self.transport.send(request),
        }
    }
}

/// An ordered, immutable list of interceptors.
#[derive(Clone)]
pub struct InterceptorChain {
    interceptors: Arc<[Arc<dyn Interceptor>]>,
}

impl InterceptorChain {
    /// Builds a chain; the first interceptor is the outermost.
    pub fn new(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self {
            interceptors: interceptors.into(),
        }
    }

    /// Number of links, not counting the transport.
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Returns `true` if requests go straight to the transport.
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Runs `request` through every interceptor and then `transport`.
    pub async fn execute(&self, transport: &dyn Transport, request: Request) -> Result<RawResponse> {
        Next {
            interceptors: &self.interceptors,
            transport,
        }
        .run(request)
        .await
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.interceptors.len())
            .finish()
    }
}

/// Attaches `Authorization: Bearer <token>` to every request.
#[derive(Clone)]
pub struct BearerAuth {
    value: HeaderValue,
}

impl BearerAuth {
    /// Creates the interceptor from a token, with or without the `Bearer ` prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value.
    pub fn new(token: impl AsRef<str>) -> Result<Self> {
        let token = token.as_ref().trim();
        let token = token.strip_prefix("Bearer ").unwrap_or(token);
        let mut value = HeaderValue::try_from(format!("Bearer {}", token))
            .map_err(|e| Error::ConfigurationError(format!("Invalid bearer token: {}", e)))?;
        value.set_sensitive(true);
        Ok(Self { value })
    }
}

impl fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuth")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Interceptor for BearerAuth {
    fn intercept<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Result<RawResponse>> {
        next.run(request.with_header(AUTHORIZATION, self.value.clone()))
    }
}

/// Logs method and URI at debug level before dispatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestDebugLog;

impl Interceptor for RequestDebugLog {
    fn intercept<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Result<RawResponse>> {
        tracing::debug!(
            method = %request.method(),
            uri = %request.url(),
            "Request"
        );
        next.run(request)
    }
}

/// Logs URI, method and headers before dispatch and the status after.
///
/// Sensitive header values are redacted in the log output only.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExchangeLogger;

impl Interceptor for ExchangeLogger {
    fn intercept<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Result<RawResponse>> {
        Box::pin(async move {
            tracing::info!(
                uri = %request.url(),
                method = %request.method(),
                headers = ?RedactedHeaders(request.headers()),
                "Sending request"
            );

            let response = next.run(request).await?;

            tracing::info!(status = response.status.as_u16(), "Received response");

            Ok(response)
        })
    }
}

struct RedactedHeaders<'a>(&'a HeaderMap);

impl fmt::Debug for RedactedHeaders<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(name, value)| {
                let shown = if value.is_sensitive() || *name == AUTHORIZATION {
                    "<redacted>"
                } else {
                    value.to_str().unwrap_or("<binary>")
                };
                (name.as_str(), shown)
            }))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderName, Method, StatusCode};
    use std::sync::Mutex;
    use url::Url;

    /// Echoes the request headers back as the response headers.
    struct EchoTransport;

    impl Transport for EchoTransport {
        fn send<'a>(&'a self, request: Request) -> BoxFuture<'a, Result<RawResponse>> {
            Box::pin(async move {
                Ok(RawResponse::new(
                    StatusCode::OK,
                    request.headers().clone(),
                    Vec::new(),
                ))
            })
        }
    }

    struct Record {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Interceptor for Record {
        fn intercept<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Result<RawResponse>> {
            Box::pin(async move {
                self.log.lock().unwrap().push(format!("{} before", self.name));
                let response = next.run(request).await;
                self.log.lock().unwrap().push(format!("{} after", self.name));
                response
            })
        }
    }

    struct Deny;

    impl Interceptor for Deny {
        fn intercept<'a>(&'a self, _request: Request, _next: Next<'a>) -> BoxFuture<'a, Result<RawResponse>> {
            Box::pin(async { Err(Error::Interceptor("denied".to_string())) })
        }
    }

    fn request() -> Request {
        Request::new(Method::GET, Url::parse("http://localhost/users/1").unwrap())
    }

    #[tokio::test]
    async fn test_links_run_in_build_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = InterceptorChain::new(vec![
            Arc::new(Record { name: "outer", log: log.clone() }),
            Arc::new(Record { name: "inner", log: log.clone() }),
        ]);

        chain.execute(&EchoTransport, request()).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["outer before", "inner before", "inner after", "outer after"]
        );
    }

    #[tokio::test]
    async fn test_bearer_auth_reaches_transport() {
        let chain = InterceptorChain::new(vec![
            Arc::new(BearerAuth::new("secret").unwrap()),
            Arc::new(RequestDebugLog),
            Arc::new(ExchangeLogger),
        ]);

        let response = chain.execute(&EchoTransport, request()).await.unwrap();

        assert_eq!(response.headers.get(AUTHORIZATION).unwrap(), "Bearer secret");
    }

    #[tokio::test]
    async fn test_short_circuit_skips_transport_and_inner_links() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = InterceptorChain::new(vec![
            Arc::new(Deny),
            Arc::new(Record { name: "inner", log: log.clone() }),
        ]);

        let result = chain.execute(&EchoTransport, request()).await;

        assert!(matches!(result, Err(Error::Interceptor(_))));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_logging_does_not_alter_request() {
        let chain = InterceptorChain::new(vec![Arc::new(ExchangeLogger)]);
        let request = request().with_header(
            HeaderName::from_static("x-custom"),
            HeaderValue::from_static("kept"),
        );

        let response = chain.execute(&EchoTransport, request).await.unwrap();

        assert_eq!(response.headers.len(), 1);
        assert_eq!(response.headers.get("x-custom").unwrap(), "kept");
    }

    #[test]
    fn test_bearer_prefix_is_not_doubled() {
        let auth = BearerAuth::new("Bearer abc").unwrap();
        assert_eq!(auth.value, "Bearer abc");
        assert!(auth.value.is_sensitive());
        assert!(BearerAuth::new("bad\ntoken").is_err());
    }

    #[test]
    fn test_redacted_headers_hide_authorization() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert("accept", HeaderValue::from_static("application/json"));

        let rendered = format!("{:?}", RedactedHeaders(&headers));

        assert!(!rendered.contains("abc"));
        assert!(rendered.contains("application/json"));
    }
}

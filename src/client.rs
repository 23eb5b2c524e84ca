//! The client pipeline: retry policy around interceptor chain around transport.
//!
//! The [`Client`] type is the main entry point for making HTTP requests.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::{
    classify::Outcome,
    interceptor::{BearerAuth, ExchangeLogger, Interceptor, InterceptorChain, RequestDebugLog},
    metadata::RequestMetadata,
    retry::{RetryPolicy, RetryPredicate, RetryStrategy, Step},
    transport::{HttpTransport, RawResponse, Request, Transport},
    Error, Response, Result,
};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// An HTTP client with retries, status classification and an interceptor chain.
///
/// The client is cheap to clone; clones share the connection pool, the
/// interceptor chain and the configuration, none of which change after
/// [`ClientBuilder::build`]. Every call owns its own retry state, so
/// concurrent calls never wait on each other's backoff.
///
/// Dropping a call's future cancels it: an in-flight send is aborted and no
/// further attempt is started.
///
/// # Examples
///
/// ```no_run
/// use steadfast::{Client, RetryPolicy, Response};
/// use std::time::Duration;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct User {
///     id: i64,
///     name: String,
///     age: i32,
/// }
///
/// # async fn example() -> Result<(), steadfast::Error> {
/// let client = Client::builder()
///     .base_url("http://localhost:8080")?
///     .bearer_token("token")?
///     .timeout(Duration::from_secs(5))
///     .retry_policy(RetryPolicy::exponential(3, Duration::from_secs(1), 2.0))
///     .build()?;
///
/// let user: Response<User> = client.get("/users/1").await?;
/// println!("User: {}", user.data.name);
///
/// let created: Response<User> = client
///     .post("/users", &User { id: 9, name: "Kim".into(), age: 31 })
///     .await?;
/// println!("Created user {} in {:?}", created.data.id, created.latency);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    chain: InterceptorChain,
    base_url: Url,
    default_headers: HeaderMap,
    retry_policy: RetryPolicy,
    timeout: Option<Duration>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url.as_str())
            .field("chain", &self.inner.chain)
            .field("retry_policy", &self.inner.retry_policy)
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The base URL every request path is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Makes a typed call and decodes the 2xx body as JSON.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use steadfast::{Client, metadata::RequestMetadata, RetryPolicy};
    /// use http::Method;
    /// use std::time::Duration;
    ///
    /// # async fn example() -> Result<(), steadfast::Error> {
    /// let client = Client::builder()
    ///     .base_url("http://localhost:8080")?
    ///     .build()?;
    ///
    /// let metadata = RequestMetadata::new(Method::GET, "/users/retry/{id}")
    ///     .with_path_param("id", 1)
    ///     .with_query_param("failCount", "2")
    ///     .with_retry_policy(RetryPolicy::exponential(3, Duration::from_millis(100), 2.0))
    ///     .with_deadline(Duration::from_secs(5));
    ///
    /// let response = client.call::<(), serde_json::Value>(metadata, None).await?;
    /// println!("Succeeded after {} attempts", response.attempts);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call<Req, Res>(
        &self,
        metadata: RequestMetadata,
        body: Option<&Req>,
    ) -> Result<Response<Res>>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let (raw, latency, attempts) = self.execute(&metadata, body).await?;
        Response::decode(raw, latency, attempts)
    }

    /// Makes a call whose response body is ignored, such as one answered with 204.
    pub async fn call_empty<Req>(
        &self,
        metadata: RequestMetadata,
        body: Option<&Req>,
    ) -> Result<Response<()>>
    where
        Req: Serialize,
    {
        let (raw, latency, attempts) = self.execute(&metadata, body).await?;
        Ok(Response::empty(raw, latency, attempts))
    }

    /// Runs one logical call: build, then retry loop, bounded by the deadline.
    async fn execute<Req>(
        &self,
        metadata: &RequestMetadata,
        body: Option<&Req>,
    ) -> Result<(RawResponse, Duration, usize)>
    where
        Req: Serialize,
    {
        let request = self.build_request(metadata, body)?;
        let policy = metadata
            .retry_policy
            .as_ref()
            .unwrap_or(&self.inner.retry_policy);

        let start_time = Instant::now();
        let attempts = self.run_attempts(request, policy);

        let (raw, attempts) = match metadata.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, attempts).await {
                Ok(result) => result?,
                Err(_) => {
                    tracing::warn!(
                        method = %metadata.method,
                        path = %metadata.path,
                        deadline_ms = deadline.as_millis(),
                        "Call deadline exceeded, abandoning remaining attempts"
                    );
                    return Err(Error::Timeout);
                }
            },
            None => attempts.await?,
        };

        let latency = start_time.elapsed();
        tracing::info!(
            status = raw.status.as_u16(),
            latency_ms = latency.as_millis(),
            attempts = attempts,
            "Call succeeded"
        );

        Ok((raw, latency, attempts))
    }

    /// Drives the retry state machine until it reaches a terminal phase.
    async fn run_attempts(
        &self,
        request: Request,
        policy: &RetryPolicy,
    ) -> Result<(RawResponse, usize)> {
        let mut state = policy.start();

        loop {
            tracing::debug!(
                method = %request.method(),
                url = %request.url(),
                attempt = state.attempt(),
                "Executing HTTP request"
            );

            let result = self
                .inner
                .chain
                .execute(self.inner.transport.as_ref(), request.clone())
                .await;
            let attempt = state.attempt();

            match policy.advance(&mut state, Outcome::from_attempt(result)) {
                Step::Succeeded(response) => return Ok((response, attempt)),
                Step::Retry { delay, error } => {
                    tracing::warn!(
                        error = %error,
                        attempt = attempt,
                        method = %request.method(),
                        url = %request.url(),
                        "Request failed"
                    );
                    tracing::info!(
                        delay_ms = delay.as_millis(),
                        next_attempt = state.attempt(),
                        "Retrying request after delay"
                    );
                    tokio::time::sleep(delay).await;
                }
                Step::Exhausted(error) | Step::Fatal(error) => {
                    tracing::warn!(
                        error = %error,
                        attempt = attempt,
                        phase = ?state.phase(),
                        method = %request.method(),
                        url = %request.url(),
                        "Request failed"
                    );
                    return Err(error);
                }
            }
        }
    }

    /// Builds the concrete request for `metadata`.
    fn build_request<Req>(&self, metadata: &RequestMetadata, body: Option<&Req>) -> Result<Request>
    where
        Req: Serialize,
    {
        let path = metadata.resolved_path()?;

        let mut url = self.inner.base_url.clone();
        let full_path = format!("{}{}", url.path().trim_end_matches('/'), path);
        url.set_path(&full_path);

        if !metadata.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &metadata.query_params {
                pairs.append_pair(key, value);
            }
        }

        let mut request = Request::new(metadata.method.clone(), url)
            .with_headers(&self.inner.default_headers)
            .with_headers(&metadata.headers)
            .with_timeout(self.inner.timeout);

        if let Some(body) = body {
            let json = serde_json::to_vec(body).map_err(|e| Error::SerializationFailed(e.to_string()))?;
            request = request.with_json_body(json);
        }

        Ok(request)
    }

    /// Makes a GET request to the specified path.
    pub async fn get<Res>(&self, path: impl Into<String>) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        let metadata = RequestMetadata::new(Method::GET, path);
        self.call::<(), Res>(metadata, None).await
    }

    /// Makes a POST request to the specified path with a JSON body.
    pub async fn post<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Response<Res>>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let metadata = RequestMetadata::new(Method::POST, path);
        self.call(metadata, Some(body)).await
    }

    /// Makes a PUT request to the specified path with a JSON body.
    pub async fn put<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Response<Res>>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let metadata = RequestMetadata::new(Method::PUT, path);
        self.call(metadata, Some(body)).await
    }

    /// Makes a DELETE request to the specified path, ignoring the response body.
    pub async fn delete(&self, path: impl Into<String>) -> Result<Response<()>> {
        let metadata = RequestMetadata::new(Method::DELETE, path);
        self.call_empty::<()>(metadata, None).await
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// The interceptor chain is assembled in [`build`](Self::build): the bearer
/// token link (if a token was given), the debug request log, the exchange
/// logger, then any custom interceptors in the order they were added.
///
/// # Examples
///
/// ```no_run
/// use steadfast::{ClientBuilder, RetryStrategy};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), steadfast::Error> {
/// let client = ClientBuilder::new()
///     .base_url("http://localhost:8080")?
///     .timeout(Duration::from_secs(30))
///     .retry_strategy(RetryStrategy::standard())
///     .default_header("User-Agent", "my-app/1.0")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    bearer: Option<BearerAuth>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    transport: Option<Arc<dyn Transport>>,
    retry_policy: RetryPolicy,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    ///
    /// By default calls are attempted once and have no timeout.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            bearer: None,
            interceptors: Vec::new(),
            transport: None,
            retry_policy: RetryPolicy::none(),
            timeout: None,
        }
    }

    /// Sets the base URL for all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Attaches `Authorization: Bearer <token>` to every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value.
    pub fn bearer_token(mut self, token: impl AsRef<str>) -> Result<Self> {
        self.bearer = Some(BearerAuth::new(token)?);
        Ok(self)
    }

    /// Appends an interceptor after the built-in ones.
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Replaces the `reqwest` transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets the retry policy used by calls that do not carry their own.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets the retry strategy, keeping the current retryable set.
    pub fn retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        let predicate = self.retry_policy.predicate_arc();
        self.retry_policy = RetryPolicy::new(strategy).with_shared_predicate(predicate);
        self
    }

    /// Sets the retryable set, keeping the current strategy.
    ///
    /// By default, requests are retried based on `Error::is_retryable()`.
    pub fn retry_predicate(mut self, predicate: Box<dyn RetryPredicate>) -> Self {
        self.retry_policy = self
            .retry_policy
            .with_shared_predicate(Arc::from(predicate));
        self
    }

    /// Sets the timeout of each individual attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided or if the HTTP client
    /// cannot be created.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::ConfigurationError("Base URL is required".to_string()))?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let http_client = reqwest::Client::builder().build().map_err(|e| {
                    Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
                })?;
                Arc::new(HttpTransport::new(http_client))
            }
        };

        let mut links: Vec<Arc<dyn Interceptor>> = Vec::with_capacity(self.interceptors.len() + 3);
        if let Some(bearer) = self.bearer {
            links.push(Arc::new(bearer));
        }
        links.push(Arc::new(RequestDebugLog));
        links.push(Arc::new(ExchangeLogger));
        links.extend(self.interceptors);

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                chain: InterceptorChain::new(links),
                base_url,
                default_headers: self.default_headers,
                retry_policy: self.retry_policy,
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

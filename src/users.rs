//! Typed operations against the user resource service.
//!
//! [`UserClient`] has one method per endpoint. Plain CRUD calls are made
//! once; [`UserClient::fetch_with_retry`] carries the configured retry
//! policy; [`UserClient::fetch_with_timeout`] carries a caller deadline.

use crate::config::ClientConfig;
use crate::metadata::RequestMetadata;
use crate::retry::RetryPolicy;
use crate::{Client, Result};
use http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A user as stored by the resource service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// Unique key.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Age in years.
    pub age: i32,
}

impl User {
    /// Creates a user.
    pub fn new(id: i64, name: impl Into<String>, age: i32) -> Self {
        Self {
            id,
            name: name.into(),
            age,
        }
    }
}

/// The error the service is asked to produce by
/// [`UserClient::fetch_with_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// 404.
    NotFound,
    /// 401.
    Unauthorized,
    /// 400.
    BadRequest,
    /// 409.
    Conflict,
    /// 500 or success, with equal probability.
    RandomError,
}

impl ErrorType {
    /// The wire name of this error type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::NotFound => "NOT_FOUND",
            ErrorType::Unauthorized => "UNAUTHORIZED",
            ErrorType::BadRequest => "BAD_REQUEST",
            ErrorType::Conflict => "CONFLICT",
            ErrorType::RandomError => "RANDOM_ERROR",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client for the user endpoints.
///
/// # Examples
///
/// ```no_run
/// use steadfast::users::{User, UserClient};
/// use steadfast::{ClientConfig, Error, ErrorKind};
///
/// # async fn example() -> Result<(), Error> {
/// let users = UserClient::from_config(&ClientConfig::default())?;
///
/// users.create_user(&User::new(7, "Alice", 30)).await?;
/// let alice = users.fetch_user(7).await?;
/// assert_eq!(alice.name, "Alice");
///
/// match users.create_user(&alice).await {
///     Err(e) if e.kind() == Some(ErrorKind::Conflict) => println!("already there"),
///     other => println!("unexpected: {:?}", other),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct UserClient {
    client: Client,
    retry_policy: RetryPolicy,
}

impl UserClient {
    /// Wraps `client`. `retry_policy` applies to [`fetch_with_retry`](Self::fetch_with_retry) only.
    pub fn new(client: Client, retry_policy: RetryPolicy) -> Self {
        Self {
            client,
            retry_policy,
        }
    }

    /// Builds the client, bearer token, per-attempt timeout and retry policy
    /// from configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = Client::builder()
            .base_url(&config.base_url)?
            .bearer_token(&config.token)?;
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self::new(builder.build()?, config.retry.policy()))
    }

    /// The underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// `GET /users/{id}`. Fails with `NotFound` if absent.
    pub async fn fetch_user(&self, id: i64) -> Result<User> {
        let metadata = RequestMetadata::new(Method::GET, "/users/{id}").with_path_param("id", id);
        self.once(metadata, None).await
    }

    /// `POST /users`. Fails with `Conflict` if the id is taken.
    pub async fn create_user(&self, user: &User) -> Result<User> {
        let metadata = RequestMetadata::new(Method::POST, "/users");
        self.once(metadata, Some(user)).await
    }

    /// `PUT /users/{id}`. Fails with `NotFound` if absent.
    pub async fn update_user(&self, id: i64, user: &User) -> Result<User> {
        let metadata = RequestMetadata::new(Method::PUT, "/users/{id}").with_path_param("id", id);
        self.once(metadata, Some(user)).await
    }

    /// `DELETE /users/{id}`. Fails with `NotFound` if absent.
    pub async fn delete_user(&self, id: i64) -> Result<()> {
        let metadata = RequestMetadata::new(Method::DELETE, "/users/{id}")
            .with_path_param("id", id)
            .with_retry_policy(RetryPolicy::none());
        self.client.call_empty::<()>(metadata, None).await?;
        Ok(())
    }

    /// `GET /users/retry/{id}` with the configured retry policy.
    ///
    /// The service fails the first `fail_count` calls per id (2 when `None`)
    /// with 503.
    pub async fn fetch_with_retry(&self, id: i64, fail_count: Option<u32>) -> Result<User> {
        let mut metadata = RequestMetadata::new(Method::GET, "/users/retry/{id}")
            .with_path_param("id", id)
            .with_retry_policy(self.retry_policy.clone());
        if let Some(fail_count) = fail_count {
            metadata = metadata.with_query_param("failCount", fail_count.to_string());
        }
        let response = self.client.call::<(), User>(metadata, None).await?;
        Ok(response.data)
    }

    /// `GET /users/error/{id}?errorType=...`, forcing a classified error.
    pub async fn fetch_with_error(&self, id: i64, error_type: ErrorType) -> Result<User> {
        let metadata = RequestMetadata::new(Method::GET, "/users/error/{id}")
            .with_path_param("id", id)
            .with_query_param("errorType", error_type.as_str());
        self.once(metadata, None).await
    }

    /// `GET /users/timeout/{id}?delayMs=...`, bounded by `deadline`.
    ///
    /// Fails with `Timeout` once `deadline` elapses, whatever `delay` is.
    pub async fn fetch_with_timeout(&self, id: i64, delay: Duration, deadline: Duration) -> Result<User> {
        let metadata = RequestMetadata::new(Method::GET, "/users/timeout/{id}")
            .with_path_param("id", id)
            .with_query_param("delayMs", delay.as_millis().to_string())
            .with_retry_policy(RetryPolicy::none())
            .with_deadline(deadline);
        let response = self.client.call::<(), User>(metadata, None).await?;
        Ok(response.data)
    }

    /// `POST /users/reset`: clears the service's users and retry counters.
    pub async fn reset(&self) -> Result<()> {
        let metadata = RequestMetadata::new(Method::POST, "/users/reset");
        self.client.call_empty::<()>(metadata, None).await?;
        Ok(())
    }

    /// `POST /users/sample-data`: seeds users 1 to 5.
    pub async fn seed_sample_data(&self) -> Result<()> {
        let metadata = RequestMetadata::new(Method::POST, "/users/sample-data");
        self.client.call_empty::<()>(metadata, None).await?;
        Ok(())
    }

    async fn once(&self, metadata: RequestMetadata, body: Option<&User>) -> Result<User> {
        let metadata = metadata.with_retry_policy(RetryPolicy::none());
        let response = self.client.call::<User, User>(metadata, body).await?;
        Ok(response.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_wire_shape() {
        let user = User::new(3, "User 3", 42);
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json, serde_json::json!({"id": 3, "name": "User 3", "age": 42}));

        let back: User = serde_json::from_value(json).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn test_error_type_wire_names() {
        assert_eq!(ErrorType::NotFound.to_string(), "NOT_FOUND");
        assert_eq!(ErrorType::BadRequest.as_str(), "BAD_REQUEST");
        assert_eq!(ErrorType::RandomError.as_str(), "RANDOM_ERROR");
    }

    #[test]
    fn test_from_config_rejects_invalid_config() {
        let config = ClientConfig {
            base_url: String::new(),
            ..ClientConfig::default()
        };
        assert!(UserClient::from_config(&config).is_err());
    }
}

//! Example demonstrating retry policies against a flaky endpoint.
//!
//! The retry endpoint answers 503 for the first `failCount` calls per id,
//! then 200.
//!
//! This example shows how to:
//! - Retry with exponential backoff until the endpoint recovers
//! - Run out of attempts and inspect `RetriesExhausted`
//! - Configure linear and custom strategies
//! - Narrow the retryable set with predicates
//!
//! Run with: `cargo run --example retry_strategies`

use http::Method;
use std::time::{Duration, Instant};
use steadfast::metadata::RequestMetadata;
use steadfast::retry::{RetryOnStatus, RetryOnTimeout, OrPredicate};
use steadfast::users::{User, UserClient};
use steadfast::{Client, ClientConfig, Error, RetryConfig, RetryPolicy, RetryStrategy};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing to see retry attempts
    tracing_subscriber::fmt()
        .with_env_filter("steadfast=info,retry_strategies=info")
        .init();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    tokio::spawn(mock_server::run(listener));
    let base_url = format!("http://{address}");

    println!("=== Exponential Backoff ===");
    println!("Delays: 100ms, 200ms");
    let users = UserClient::from_config(&ClientConfig {
        base_url: base_url.clone(),
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 100,
            ..RetryConfig::default()
        },
        ..ClientConfig::default()
    })?;

    let start = Instant::now();
    let user = users.fetch_with_retry(1, Some(2)).await?;
    println!("Recovered: {:?} after {:?}", user, start.elapsed());
    println!();

    println!("=== Running Out of Attempts ===");
    match users.fetch_with_retry(2, Some(5)).await {
        Ok(user) => println!("Unexpected success: {:?}", user),
        Err(Error::RetriesExhausted {
            attempts,
            last_error,
        }) => {
            println!("Gave up after {} attempts", attempts);
            println!("Last error: {}", last_error);
        }
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    let client = Client::builder().base_url(&base_url)?.build()?;

    println!("=== Linear Retry Strategy ===");
    println!("Fixed 50ms delay between attempts");
    let metadata = RequestMetadata::new(Method::GET, "/users/retry/{id}")
        .with_path_param("id", 3)
        .with_query_param("failCount", "3")
        .with_retry_policy(RetryPolicy::new(RetryStrategy::Linear {
            delay: Duration::from_millis(50),
            max_attempts: 4,
        }));

    let response = client.call::<(), User>(metadata, None).await?;
    println!("Success after {} attempts", response.attempts);
    println!();

    println!("=== Custom Retry Strategy ===");
    println!("Custom delay function: attempt 1=20ms, 2=60ms, then stop");
    let metadata = RequestMetadata::new(Method::GET, "/users/retry/{id}")
        .with_path_param("id", 4)
        .with_retry_policy(RetryPolicy::new(RetryStrategy::Custom {
            delay_fn: |attempt| match attempt {
                1 => Some(Duration::from_millis(20)),
                2 => Some(Duration::from_millis(60)),
                _ => None,
            },
        }));

    let response = client.call::<(), User>(metadata, None).await?;
    println!("Success with custom strategy after {} attempts", response.attempts);
    println!();

    println!("=== Narrowing the Retryable Set ===");
    println!("Only 502 and timeouts are retried, so the first 503 is final");
    let policy = RetryPolicy::exponential(3, Duration::from_millis(50), 2.0).with_predicate(
        OrPredicate::new(vec![
            Box::new(RetryOnStatus::new([http::StatusCode::BAD_GATEWAY])),
            Box::new(RetryOnTimeout),
        ]),
    );
    let metadata = RequestMetadata::new(Method::GET, "/users/retry/{id}")
        .with_path_param("id", 5)
        .with_retry_policy(policy);

    match client.call::<(), User>(metadata, None).await {
        Ok(user) => println!("Unexpected success: {:?}", user.data),
        Err(e) => println!("Failed without retrying: {}", e),
    }

    Ok(())
}

//! Example demonstrating error classification.
//!
//! This example shows how to:
//! - Match on the classified `ErrorKind` of a failed call
//! - Access raw response data on errors
//! - Deal with deserialization failures
//! - Tell timeouts and retryable errors apart
//!
//! Run with: `cargo run --example error_handling`

use serde::Deserialize;
use std::time::Duration;
use steadfast::users::{ErrorType, UserClient};
use steadfast::{ClientConfig, Error, ErrorKind};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("steadfast=info")
        .init();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    tokio::spawn(mock_server::run(listener));

    let config = ClientConfig {
        base_url: format!("http://{address}"),
        ..ClientConfig::default()
    };
    let users = UserClient::from_config(&config)?;

    println!("=== Example 1: Classified Status Errors ===");
    for error_type in [
        ErrorType::NotFound,
        ErrorType::Unauthorized,
        ErrorType::BadRequest,
        ErrorType::Conflict,
    ] {
        match users.fetch_with_error(1, error_type).await {
            Ok(user) => println!("{error_type}: unexpected success {:?}", user),
            Err(Error::Status { kind, headers, .. }) => {
                let action = match kind {
                    ErrorKind::NotFound => "create it first",
                    ErrorKind::Unauthorized => "refresh the token",
                    ErrorKind::InvalidRequest => "fix the request",
                    ErrorKind::Conflict => "pick another id",
                    ErrorKind::HttpError(_) => "try again later",
                };
                println!("{error_type}: {} ({}), {}", kind, kind.status(), action);
                println!("  Content-Length: {:?}", headers.get("content-length"));
            }
            Err(e) => println!("{error_type}: other error {}", e),
        }
    }
    println!();

    println!("=== Example 2: Random Server Errors ===");
    for _ in 0..5 {
        match users.fetch_with_error(1, ErrorType::RandomError).await {
            Ok(user) => println!("Success: {:?}", user),
            Err(e) => println!("Failed: {} (retryable: {})", e, e.is_retryable()),
        }
    }
    println!();

    println!("=== Example 3: Handling Deserialization Errors ===");
    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct WrongSchema {
        nonexistent_field: String,
    }

    users.seed_sample_data().await?;
    match users.client().get::<WrongSchema>("/users/1").await {
        Ok(_) => println!("Unexpected success"),
        Err(Error::DeserializationFailed {
            raw_response,
            serde_error,
            status,
        }) => {
            println!("Deserialization Failed!");
            println!("  Status: {}", status);
            println!("  Serde error: {}", serde_error);
            println!("  Raw response: {}", raw_response);
        }
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 4: Call Deadlines ===");
    match users
        .fetch_with_timeout(1, Duration::from_secs(5), Duration::from_millis(500))
        .await
    {
        Ok(user) => println!("Unexpected success: {:?}", user),
        Err(e) if e.is_timeout() => println!("Timed out as expected: {}", e),
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 5: Connection Errors ===");
    let unreachable = UserClient::from_config(&ClientConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        ..ClientConfig::default()
    })?;

    match unreachable.fetch_user(1).await {
        Ok(_) => println!("Unexpected success"),
        Err(Error::Transport(e)) => {
            println!("Transport Error!");
            println!("  Error: {}", e);
            println!("  Is connect error: {}", e.is_connect());
        }
        Err(e) => println!("Other error: {}", e),
    }

    Ok(())
}

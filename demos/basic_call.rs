//! Basic example demonstrating the user CRUD calls.
//!
//! This example shows how to:
//! - Start the in-memory user service
//! - Build a `UserClient` from configuration
//! - Create, fetch, update and delete a user
//! - Access response metadata through the lower-level `Client`
//!
//! Run with: `cargo run --example basic_call`

use steadfast::users::{User, UserClient};
use steadfast::{ClientConfig, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("steadfast=debug,basic_call=info")
        .init();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| Error::ConfigurationError(e.to_string()))?;
    let address = listener
        .local_addr()
        .map_err(|e| Error::ConfigurationError(e.to_string()))?;
    tokio::spawn(mock_server::run(listener));

    let config = ClientConfig {
        base_url: format!("http://{address}"),
        ..ClientConfig::default()
    };
    let users = UserClient::from_config(&config)?;

    println!("=== Create ===");
    let alice = users.create_user(&User::new(1, "Alice", 30)).await?;
    println!("Created: {:?}", alice);
    println!();

    println!("=== Fetch ===");
    let fetched = users.fetch_user(1).await?;
    println!("Fetched: {:?}", fetched);
    println!();

    println!("=== Update ===");
    let updated = users.update_user(1, &User::new(1, "Alice", 31)).await?;
    println!("Updated: {:?}", updated);
    println!();

    println!("=== Accessing Response Metadata ===");
    let response = users.client().get::<User>("/users/1").await?;
    println!("Status code: {}", response.status);
    println!("Request latency: {:?}", response.latency);
    println!("Raw response length: {} bytes", response.raw_body.len());
    println!("Content-Type: {:?}", response.header("content-type"));
    println!("Was retried: {}", response.was_retried());
    println!();

    println!("=== Delete ===");
    users.delete_user(1).await?;
    match users.fetch_user(1).await {
        Err(e) => println!("After delete: {}", e),
        Ok(user) => println!("Unexpectedly still there: {:?}", user),
    }

    Ok(())
}

//! End-to-end tests of `UserClient` against the in-memory user service.

use http::StatusCode;
use std::time::{Duration, Instant};
use steadfast::users::{ErrorType, User, UserClient};
use steadfast::{ClientConfig, Error, ErrorKind, RetryConfig};

struct TestServer {
    base_url: String,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn spawn_server() -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let task = tokio::spawn(async move {
        mock_server::run(listener)
            .await
            .expect("mock server must run");
    });

    TestServer {
        base_url: format!("http://{address}"),
        task,
    }
}

fn users_for(server: &TestServer, max_attempts: usize) -> UserClient {
    let config = ClientConfig {
        base_url: server.base_url.clone(),
        retry: RetryConfig {
            max_attempts,
            base_delay_ms: 20,
            ..RetryConfig::default()
        },
        ..ClientConfig::default()
    };
    UserClient::from_config(&config).expect("config must be valid")
}

#[tokio::test]
async fn fetch_unknown_user_is_not_found() {
    let server = spawn_server().await;
    let users = users_for(&server, 3);

    let err = users.fetch_user(404).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn create_then_fetch() {
    let server = spawn_server().await;
    let users = users_for(&server, 3);

    let alice = User::new(1, "Alice", 30);
    let created = users.create_user(&alice).await.unwrap();
    assert_eq!(created, alice);

    let fetched = users.fetch_user(1).await.unwrap();
    assert_eq!(fetched, alice);
}

#[tokio::test]
async fn duplicate_create_is_conflict() {
    let server = spawn_server().await;
    let users = users_for(&server, 3);

    let bob = User::new(2, "Bob", 41);
    users.create_user(&bob).await.unwrap();

    let err = users.create_user(&bob).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Conflict));
}

#[tokio::test]
async fn update_and_delete() {
    let server = spawn_server().await;
    let users = users_for(&server, 3);

    users.create_user(&User::new(3, "Carol", 25)).await.unwrap();

    let updated = users
        .update_user(3, &User::new(3, "Caroline", 26))
        .await
        .unwrap();
    assert_eq!(updated.name, "Caroline");
    assert_eq!(users.fetch_user(3).await.unwrap().age, 26);

    users.delete_user(3).await.unwrap();
    let err = users.fetch_user(3).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn update_and_delete_unknown_user_are_not_found() {
    let server = spawn_server().await;
    let users = users_for(&server, 3);

    let err = users
        .update_user(9, &User::new(9, "Nobody", 1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NotFound));

    let err = users.delete_user(9).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn fetch_with_retry_succeeds_on_third_attempt() {
    let server = spawn_server().await;
    let users = users_for(&server, 3);

    let user = users.fetch_with_retry(20, Some(2)).await.unwrap();
    assert_eq!(user.id, 20);
    assert_eq!(user.name, "User 20");
}

#[tokio::test]
async fn fetch_with_retry_returns_stored_user() {
    let server = spawn_server().await;
    let users = users_for(&server, 3);

    users.create_user(&User::new(21, "Dana", 52)).await.unwrap();
    let user = users.fetch_with_retry(21, None).await.unwrap();
    assert_eq!(user, User::new(21, "Dana", 52));
}

#[tokio::test]
async fn fetch_with_retry_exhausts_attempts() {
    let server = spawn_server().await;
    let users = users_for(&server, 2);

    let err = users.fetch_with_retry(22, Some(2)).await.unwrap_err();
    match &err {
        Error::RetriesExhausted { attempts, .. } => assert_eq!(*attempts, 2),
        other => panic!("Expected RetriesExhausted, got {:?}", other),
    }
    assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
}

#[tokio::test]
async fn fetch_with_error_maps_each_type() {
    let server = spawn_server().await;
    let users = users_for(&server, 3);

    let cases = [
        (ErrorType::NotFound, ErrorKind::NotFound),
        (ErrorType::Unauthorized, ErrorKind::Unauthorized),
        (ErrorType::BadRequest, ErrorKind::InvalidRequest),
        (ErrorType::Conflict, ErrorKind::Conflict),
    ];

    for (error_type, expected) in cases {
        let err = users.fetch_with_error(1, error_type).await.unwrap_err();
        assert_eq!(err.kind(), Some(expected), "{error_type}");
    }
}

#[tokio::test]
async fn random_error_yields_both_outcomes() {
    let server = spawn_server().await;
    let users = users_for(&server, 3);

    let mut ok = 0;
    let mut failed = 0;
    for _ in 0..40 {
        match users.fetch_with_error(1, ErrorType::RandomError).await {
            Ok(user) => {
                assert_eq!(user.id, 1);
                ok += 1;
            }
            Err(err) => {
                assert_eq!(
                    err.kind(),
                    Some(ErrorKind::HttpError(StatusCode::INTERNAL_SERVER_ERROR))
                );
                failed += 1;
            }
        }
    }
    assert!(ok > 0 && failed > 0, "ok={ok} failed={failed}");
}

#[tokio::test]
async fn fetch_with_timeout_honours_deadline() {
    let server = spawn_server().await;
    let users = users_for(&server, 3);

    let start = Instant::now();
    let err = users
        .fetch_with_timeout(1, Duration::from_secs(3), Duration::from_millis(300))
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "got {:?}", err);
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn fetch_with_timeout_within_deadline() {
    let server = spawn_server().await;
    let users = users_for(&server, 3);

    let user = users
        .fetch_with_timeout(4, Duration::from_millis(20), Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(user.id, 4);
}

#[tokio::test]
async fn sample_data_then_reset() {
    let server = spawn_server().await;
    let users = users_for(&server, 3);

    users.seed_sample_data().await.unwrap();
    for id in 1..=5 {
        let user = users.fetch_user(id).await.unwrap();
        assert_eq!(user.name, format!("User {id}"));
    }

    users.reset().await.unwrap();
    let err = users.fetch_user(1).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
}

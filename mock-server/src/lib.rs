use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub age: i32,
}

#[derive(Deserialize)]
pub struct RetryParams {
    #[serde(rename = "failCount")]
    pub fail_count: Option<u32>,
}

#[derive(Deserialize)]
pub struct ErrorParams {
    #[serde(rename = "errorType")]
    pub error_type: String,
}

#[derive(Deserialize)]
pub struct TimeoutParams {
    #[serde(rename = "delayMs", default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_delay_ms() -> u64 {
    5000
}

/// Failures served by the retry endpoint before it succeeds, per id.
pub const DEFAULT_FAIL_COUNT: u32 = 2;

#[derive(Clone, Default)]
pub struct AppState {
    users: Arc<RwLock<HashMap<i64, User>>>,
    retry_counts: Arc<RwLock<HashMap<i64, u32>>>,
}

pub fn app() -> Router {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/reset", post(reset))
        .route("/users/sample-data", post(create_sample_data))
        .route("/users/retry/{id}", get(get_user_with_retry))
        .route("/users/error/{id}", get(get_user_with_error))
        .route("/users/timeout/{id}", get(get_user_with_timeout))
        .route("/users/{id}", get(get_user).put(update_user).delete(delete_user))
        .with_state(AppState::default())
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn default_user(id: i64) -> User {
    User {
        id,
        name: format!("User {id}"),
        age: rand::thread_rng().gen_range(20..50),
    }
}

async fn stored_or_default(state: &AppState, id: i64) -> User {
    let users = state.users.read().await;
    users.get(&id).cloned().unwrap_or_else(|| default_user(id))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, StatusCode> {
    let users = state.users.read().await;
    users.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn create_user(
    State(state): State<AppState>,
    Json(user): Json<User>,
) -> Result<(StatusCode, Json<User>), StatusCode> {
    let mut users = state.users.write().await;
    if users.contains_key(&user.id) {
        return Err(StatusCode::CONFLICT);
    }
    users.insert(user.id, user.clone());
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(user): Json<User>,
) -> Result<Json<User>, StatusCode> {
    let mut users = state.users.write().await;
    let stored = users.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    *stored = User { id, ..user };
    Ok(Json(stored.clone()))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let mut users = state.users.write().await;
    users
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn get_user_with_retry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<RetryParams>,
) -> Result<Json<User>, StatusCode> {
    let fail_count = params.fail_count.unwrap_or(DEFAULT_FAIL_COUNT);
    {
        let mut counts = state.retry_counts.write().await;
        let count = counts.entry(id).or_insert(0);
        *count += 1;
        if *count <= fail_count {
            tracing::debug!(id, attempt = *count, fail_count, "Failing retry request");
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        }
        counts.remove(&id);
    }
    Ok(Json(stored_or_default(&state, id).await))
}

async fn get_user_with_error(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<ErrorParams>,
) -> Result<Json<User>, StatusCode> {
    match params.error_type.to_uppercase().as_str() {
        "NOT_FOUND" => return Err(StatusCode::NOT_FOUND),
        "UNAUTHORIZED" => return Err(StatusCode::UNAUTHORIZED),
        "BAD_REQUEST" => return Err(StatusCode::BAD_REQUEST),
        "CONFLICT" => return Err(StatusCode::CONFLICT),
        "RANDOM_ERROR" if rand::random::<bool>() => {
            return Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
        _ => {}
    }
    Ok(Json(stored_or_default(&state, id).await))
}

async fn get_user_with_timeout(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<TimeoutParams>,
) -> Json<User> {
    tokio::time::sleep(Duration::from_millis(params.delay_ms)).await;
    Json(stored_or_default(&state, id).await)
}

async fn reset(State(state): State<AppState>) -> StatusCode {
    state.users.write().await.clear();
    state.retry_counts.write().await.clear();
    StatusCode::NO_CONTENT
}

async fn create_sample_data(State(state): State<AppState>) -> StatusCode {
    let mut users = state.users.write().await;
    for id in 1..=5 {
        users.insert(id, default_user(id));
    }
    StatusCode::CREATED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_user_is_named_after_id() {
        let user = default_user(12);
        assert_eq!(user.name, "User 12");
        assert!((20..50).contains(&user.age));
    }

    #[test]
    fn retry_params_fail_count_is_optional() {
        let params: RetryParams = serde_json::from_str("{}").unwrap();
        assert!(params.fail_count.is_none());
    }

    #[test]
    fn timeout_params_default_delay() {
        let params: TimeoutParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.delay_ms, 5000);
    }

    #[test]
    fn user_wire_shape() {
        let json = serde_json::to_value(User {
            id: 1,
            name: "A".into(),
            age: 30,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"id": 1, "name": "A", "age": 30}));
    }
}

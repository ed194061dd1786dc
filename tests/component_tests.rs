//! Tests for the public building blocks, wired together without a socket.
//!
//! Custom `Cache` and `UserRepository` implementations stand in for broken
//! backends so the failure paths of the full pipeline can be checked.
//!
//! Run with: `cargo test --test component_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;

use front_door::auth::{Authentication, AuthFailure, RepositoryError};
use front_door::cache::MemoryCache;
use front_door::middleware::{Admission, FixedWindowLimiter};
use front_door::models::{ErrorResponse, User, UserResponse};
use front_door::{
    AppState, Cache, CacheBackend, CacheError, Config, InMemoryUserRepository, UserRepository,
    build_router,
};

struct UnreachableDirectory;

#[async_trait]
impl UserRepository for UnreachableDirectory {
    async fn get_user_by_username(&self, _username: &str) -> Result<Option<User>, RepositoryError> {
        Err(RepositoryError::Unavailable("directory timed out".to_string()))
    }
}

struct BrokenCache;

#[async_trait]
impl Cache for BrokenCache {
    async fn get(&self, _key: &str) -> Result<Option<i64>, CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: i64, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }

    async fn increment(&self, _key: &str) -> Result<i64, CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }
}

fn bearer(sub: &str) -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    let token = encode(
        &Header::default(),
        &json!({ "sub": sub, "exp": exp }),
        &EncodingKey::from_secret(Config::default().jwt_secret_key.as_bytes()),
    )
    .unwrap();
    format!("Bearer {token}")
}

fn me(authorization: &str) -> Request<Body> {
    Request::builder()
        .uri("/api/v1/users/me")
        .header(header::AUTHORIZATION, authorization)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Authentication chain
// ============================================================================

#[tokio::test]
async fn test_authenticator_resolves_seeded_user() {
    let users = Arc::new(InMemoryUserRepository::with_usernames(&["alice"]));
    let state = AppState::new(Config::default(), CacheBackend::memory(), users).unwrap();

    let mut headers = axum::http::HeaderMap::new();
    headers.insert(header::AUTHORIZATION, bearer("alice").parse().unwrap());

    match state.authenticator.authenticate(&headers).await.unwrap() {
        Authentication::Authenticated(user) => assert_eq!(user.username, "alice"),
        Authentication::Unauthorized(failure) => panic!("unexpected rejection: {failure}"),
    }

    headers.insert(header::AUTHORIZATION, bearer("nobody").parse().unwrap());
    assert!(matches!(
        state.authenticator.authenticate(&headers).await.unwrap(),
        Authentication::Unauthorized(AuthFailure::PrincipalNotFound)
    ));

    state.shutdown().await;
}

#[tokio::test]
async fn test_repository_outage_is_a_generic_500() {
    let state = AppState::new(
        Config::default(),
        CacheBackend::memory(),
        Arc::new(UnreachableDirectory),
    )
    .unwrap();
    let app = build_router(state).unwrap();

    let response = app.oneshot(me(&bearer("alice"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["detail"], "Internal server error.");
}

// ============================================================================
// Rate limiting over the cache abstraction
// ============================================================================

#[tokio::test]
async fn test_cache_outage_fails_closed() {
    let users = Arc::new(InMemoryUserRepository::with_usernames(&["alice"]));
    let mut state = AppState::new(Config::default(), CacheBackend::memory(), users).unwrap();
    state.cache = Arc::new(BrokenCache);
    let app = build_router(state).unwrap();

    let response = app.oneshot(me(&bearer("alice"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        json_body(response).await["detail"],
        "Service temporarily unavailable."
    );
}

#[tokio::test(start_paused = true)]
async fn test_fixed_window_resets_after_expiry() {
    let cache = Arc::new(MemoryCache::new());
    let limiter = FixedWindowLimiter::new(cache, 2, Duration::from_secs(30)).unwrap();

    assert_eq!(limiter.admit("198.51.100.7").await.unwrap(), Admission::Allow);
    assert_eq!(limiter.admit("198.51.100.7").await.unwrap(), Admission::Allow);
    assert_eq!(limiter.admit("198.51.100.7").await.unwrap(), Admission::Throttle);
    assert_eq!(limiter.admit("198.51.100.8").await.unwrap(), Admission::Allow);

    tokio::time::advance(Duration::from_secs(31)).await;

    assert_eq!(limiter.admit("198.51.100.7").await.unwrap(), Admission::Allow);
}

// ============================================================================
// Wire models
// ============================================================================

#[test]
fn test_user_response_omits_nothing() {
    let user = User::new("dana")
        .with_email("dana@example.com")
        .with_full_name("Dana Example");

    let value = serde_json::to_value(UserResponse::from(user.clone())).unwrap();

    assert_eq!(value["id"], user.id.to_string());
    assert_eq!(value["username"], "dana");
    assert_eq!(value["email"], "dana@example.com");
    assert_eq!(value["full_name"], "Dana Example");
    assert_eq!(value["is_active"], true);
    assert!(value["created_at"].is_string());
}

#[test]
fn test_error_response_round_trips() {
    let parsed: ErrorResponse =
        serde_json::from_value(json!({ "detail": "User not found" })).unwrap();
    assert_eq!(parsed.detail, "User not found");
}

//! Application routing and the request pipeline.
//!
//! # Pipeline (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← X-Request-Id, task-local scope, request span
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  Rate Limiting   │ ← 429 if exceeded, 503 if the cache is down
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │    Exception     │ ← 500 for panics and internal errors
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Basic Auth     │ ← 401 on /docs, /redoc, /openapi.json
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   CORS + limit   │ ← Cross-origin headers, body size cap
//! └────────┬─────────┘
//!          ▼
//!      Handler (bearer auth via the CurrentUser extractor)
//! ```
//!
//! The order is fixed here and nowhere else. Rejections from inner stages
//! still pass back out through the request ID stage, so they carry the
//! correlation header.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::handlers;
use crate::middleware::{
    BasicAuthLayer, ExceptionLayer, RateLimitError, RateLimitLayer, RequestIdLayer,
};
use crate::state::AppState;

/// Routes served by the application, without any pipeline stages.
pub fn application_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/v1/users/me", get(handlers::current_user))
        .route("/openapi.json", get(handlers::openapi_document))
        .route("/docs", get(handlers::swagger_ui))
        .route("/redoc", get(handlers::redoc))
}

/// Wrap `router` in the full request pipeline.
///
/// Generic over the router state so callers can add their own routes before
/// the state is attached.
///
/// # Errors
///
/// Returns `RateLimitError` if the rate limit window is empty while limiting
/// is enabled.
pub fn with_pipeline<S>(router: Router<S>, state: &AppState) -> Result<Router<S>, RateLimitError>
where
    S: Clone + Send + Sync + 'static,
{
    let config = &state.config;

    // 1. Rate limiting
    let rate_limit = if config.rate_limiting_enabled() {
        info!(
            requests = config.rate_limit_requests,
            window_secs = config.rate_limit_time_window.as_secs(),
            backend = state.cache_backend(),
            trust_forwarded_headers = config.trust_forwarded_headers,
            "Rate limiting enabled"
        );
        RateLimitLayer::new(
            state.cache.clone(),
            config.rate_limit_requests,
            config.rate_limit_time_window,
            config.trust_forwarded_headers,
        )?
    } else {
        info!("Rate limiting disabled (RATE_LIMIT_REQUESTS=0)");
        RateLimitLayer::disabled()
    };

    // 2. Failure normalization
    if config.app_debug {
        warn!("APP_DEBUG is on: failure messages are returned to clients");
    }

    // 3. Documentation gate
    if !config.docs_credentials_configured() {
        info!("Documentation credentials not set; /docs, /redoc and /openapi.json will return 401");
    }
    let basic_auth = BasicAuthLayer::from_parts(
        config.swagger_username.as_deref(),
        config.swagger_password.as_deref(),
    );

    // 4. Body size cap
    info!(
        max_size_mb = config.max_request_body_size / (1024 * 1024),
        "Request body size limit configured"
    );

    let pipeline = ServiceBuilder::new()
        .layer(RequestIdLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(rate_limit)
        .layer(ExceptionLayer::new(config.app_debug))
        .layer(basic_auth)
        .layer(build_cors_layer(&config.cors_allowed_origins))
        .layer(DefaultBodyLimit::max(config.max_request_body_size));

    Ok(router.layer(pipeline))
}

/// Build the application router with every route and pipeline stage.
///
/// # Errors
///
/// Returns `RateLimitError` if rate limiting configuration is invalid.
pub fn build_router(state: AppState) -> Result<Router, RateLimitError> {
    let router = with_pipeline(application_routes(), &state)?;
    Ok(router.with_state(state))
}

/// Build CORS layer from configuration.
///
/// `*` anywhere in the list allows any origin. Entries that are not valid
/// header values are skipped.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_any = allowed_origins.iter().any(|o| o == "*");

    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allow_any {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(origin) => Some(origin),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(origins)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::InMemoryUserRepository;
    use crate::cache::CacheBackend;
    use crate::config::Config;
    use crate::middleware::REQUEST_ID_HEADER;

    fn state_with(config: Config) -> AppState {
        let users = Arc::new(InMemoryUserRepository::with_usernames(&["alice"]));
        AppState::new(config, CacheBackend::memory(), users).unwrap()
    }

    fn app(config: Config) -> Router {
        let state = state_with(config);
        let routes = application_routes().route("/test/panic", get(explode));
        with_pipeline(routes, &state).unwrap().with_state(state)
    }

    async fn explode() -> &'static str {
        panic!("handler exploded")
    }

    fn token(sub: &str) -> String {
        let exp = chrono::Utc::now().timestamp() + 3600;
        encode(
            &Header::default(),
            &serde_json::json!({ "sub": sub, "exp": exp }),
            &EncodingKey::from_secret(b"development-secret"),
        )
        .unwrap()
    }

    fn get_request(path: &str, authorization: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_build_cors_layer_any() {
        let _layer = build_cors_layer(&["*".to_string()]);
    }

    #[test]
    fn test_build_cors_layer_specific() {
        let _layer = build_cors_layer(&[
            "https://example.com".to_string(),
            "not a header\nvalue".to_string(),
        ]);
    }

    #[tokio::test]
    async fn test_build_router_rejects_empty_window() {
        let state = state_with(Config {
            rate_limit_time_window: Duration::ZERO,
            ..Config::default()
        });
        assert!(build_router(state).is_err());
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let response = app(Config::default())
            .oneshot(get_request("/health", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_current_user_with_valid_token() {
        let bearer = format!("Bearer {}", token("alice"));
        let response = app(Config::default())
            .oneshot(get_request("/api/v1/users/me", Some(&bearer)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["username"], "alice");
    }

    #[tokio::test]
    async fn test_current_user_failures() {
        let unknown = format!("Bearer {}", token("mallory"));
        let cases = [
            (None, "Not authenticated"),
            (Some("Bearer not-a-jwt"), "Invalid authentication credentials"),
            (Some(unknown.as_str()), "User not found"),
        ];

        for (authorization, detail) in cases {
            let response = app(Config::default())
                .oneshot(get_request("/api/v1/users/me", authorization))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{authorization:?}");
            assert!(response.headers().contains_key(REQUEST_ID_HEADER));
            assert_eq!(json_body(response).await["detail"], detail);
        }
    }

    #[tokio::test]
    async fn test_throttled_regardless_of_token() {
        let router = app(Config {
            rate_limit_requests: 2,
            ..Config::default()
        });
        let bearer = format!("Bearer {}", token("alice"));

        for _ in 0..2 {
            let response = router
                .clone()
                .oneshot(get_request("/api/v1/users/me", Some(&bearer)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = router
            .clone()
            .oneshot(get_request("/api/v1/users/me", Some(&bearer)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(
            json_body(response).await["detail"],
            "Too many requests. Try again later."
        );
    }

    #[tokio::test]
    async fn test_disabled_rate_limit_admits_everything() {
        let router = app(Config {
            rate_limit_requests: 0,
            ..Config::default()
        });

        for _ in 0..20 {
            let response = router
                .clone()
                .oneshot(get_request("/health", None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_docs_gate() {
        let router = app(Config {
            swagger_username: Some("admin".to_string()),
            swagger_password: Some("s3cret".to_string()),
            ..Config::default()
        });

        let denied = router
            .clone()
            .oneshot(get_request("/docs", None))
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(denied.headers()[WWW_AUTHENTICATE], "Basic realm='Swagger UI'");

        let basic = format!("Basic {}", STANDARD.encode("admin:s3cret"));
        for path in ["/docs", "/redoc", "/openapi.json"] {
            let response = router
                .clone()
                .oneshot(get_request(path, Some(&basic)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "path {path}");
        }
    }

    #[tokio::test]
    async fn test_panic_is_normalized_with_correlation_header() {
        let response = app(Config::default())
            .oneshot(
                Request::builder()
                    .uri("/test/panic")
                    .header(REQUEST_ID_HEADER, "trace-me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "trace-me");
        assert_eq!(json_body(response).await["detail"], "Internal server error.");
    }

    #[tokio::test]
    async fn test_panic_message_shown_in_debug() {
        let response = app(Config {
            app_debug: true,
            ..Config::default()
        })
        .oneshot(get_request("/test/panic", None))
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["detail"], "handler exploded");
    }
}

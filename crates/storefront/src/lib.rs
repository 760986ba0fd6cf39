//! MercadoBoom storefront API.
//!
//! JSON API behind the MercadoBoom SPA: catalog, cart, checkout through
//! MercadoPago or bank transfer, orders, support tickets and the admin
//! back-office. Exposed as a library so the router can be tested and the CLI
//! can share repositories and services.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the full application router.
///
/// Layers, outermost first: Sentry, tracing, request ID, security headers,
/// CORS, sessions.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.pool(), state.config());
    let cors = cors_layer(&state.config().frontend_url);

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", routes::api_routes(&state.config().trusted_proxies))
        .layer(session_layer)
        .layer(cors)
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<axum::body::Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            },
        ))
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// CORS for the SPA origin, with cookies.
fn cors_layer(frontend_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true);

    match HeaderValue::from_str(frontend_url) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!(frontend_url, "FRONTEND_URL is not a valid origin, CORS disabled");
            layer
        }
    }
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::SocketAddr;

    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::Request;
    use hmac::{Hmac, Mac};
    use secrecy::SecretString;
    use sha2::Sha256;
    use sqlx::PgPool;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{DEFAULT_MERCADOPAGO_API_URL, MercadoPagoConfig, test_config};
    use crate::services::notifications::Notifier;

    const WEBHOOK_SECRET: &str = "webhook-signing-key";

    /// App over a pool that never connects: only requests rejected before
    /// any query can be tested here.
    fn test_app() -> Router {
        let mut config = test_config();
        config.mercadopago = Some(MercadoPagoConfig {
            access_token: SecretString::from("TEST-token"),
            webhook_secret: Some(SecretString::from(WEBHOOK_SECRET)),
            api_url: DEFAULT_MERCADOPAGO_API_URL.to_string(),
        });
        let pool = PgPool::connect_lazy("postgres://localhost/mercadoboom_test").unwrap();
        let notifier = Notifier::new(None, None, config.frontend_url.clone());
        app(AppState::from_parts(config, pool, None, notifier, None))
    }

    fn request(method: &str, uri: &str) -> axum::http::request::Builder {
        let peer: SocketAddr = "203.0.113.10:40000".parse().unwrap();
        Request::builder()
            .method(method)
            .uri(uri)
            .extension(ConnectInfo(peer))
    }

    fn sign(data_id: &str, request_id: &str, ts: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
        mac.update(format!("id:{data_id};request-id:{request_id};ts:{ts};").as_bytes());
        format!("ts={ts},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(request("GET", "/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    }

    #[tokio::test]
    async fn test_protected_routes_require_login() {
        for (method, uri) in [
            ("GET", "/api/auth/me"),
            ("GET", "/api/cart"),
            ("GET", "/api/orders"),
            ("GET", "/api/addresses"),
            ("GET", "/api/tickets"),
            ("POST", "/api/payments/create-direct-transfer"),
            ("GET", "/api/admin/dashboard"),
            ("PUT", "/api/admin/settings/payment"),
        ] {
            let response = test_app()
                .oneshot(
                    request(method, uri)
                        .header("content-type", "application/json")
                        .body(Body::from("{}"))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(
                response.status(),
                StatusCode::UNAUTHORIZED,
                "{method} {uri}"
            );
        }
    }

    #[tokio::test]
    async fn test_webhook_rejects_bad_signature() {
        let response = test_app()
            .oneshot(
                request("POST", "/api/payments/webhook")
                    .header("content-type", "application/json")
                    .header("x-request-id", "req-1")
                    .header("x-signature", "ts=1700000000,v1=deadbeef")
                    .body(Body::from(r#"{"type":"payment","data":{"id":"123"}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_rejects_missing_signature() {
        let response = test_app()
            .oneshot(
                request("POST", "/api/payments/webhook?type=payment&data.id=123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_acknowledges_other_topics() {
        let response = test_app()
            .oneshot(
                request("POST", "/api/payments/webhook")
                    .header("content-type", "application/json")
                    .header("x-request-id", "req-2")
                    .header("x-signature", sign("987", "req-2", "1700000000"))
                    .body(Body::from(r#"{"type":"merchant_order","data":{"id":"987"}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_webhook_without_gateway_is_acknowledged() {
        let response = test_app()
            .oneshot(
                request("POST", "/api/payments/webhook")
                    .header("content-type", "application/json")
                    .header("x-request-id", "req-3")
                    .header("x-signature", sign("555", "req-3", "1700000001"))
                    .body(Body::from(r#"{"type":"payment","data":{"id":"555"}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let response = test_app()
            .oneshot(request("GET", "/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

//! HTTP middleware stack for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (propagate or generate `x-request-id`)
//! 4. Security headers
//! 5. CORS (the SPA origin, with credentials)
//! 6. Session layer (tower-sessions with `PostgreSQL` store)
//! 7. Rate limiting (governor, per route group)
//!
//! Authentication is done per handler with the [`RequireAuth`] and
//! [`RequireAdmin`] extractors.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    RequireAdmin, RequireAuth, clear_current_user, clear_pending_two_factor,
    pending_two_factor, set_current_user, set_pending_two_factor,
};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::{RequestId, request_id_middleware};
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;

//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (strict rate limit)
//! POST /api/auth/register            - Create account and log in
//! POST /api/auth/login               - Password login (may ask for a code)
//! POST /api/auth/verify-2fa          - Second login step
//! POST /api/auth/logout              - Drop the session
//! GET  /api/auth/me                  - Current user
//!
//! # Account (requires auth)
//! GET  /api/account/profile          - Profile
//! PUT  /api/account/profile          - Update name/phone
//! PUT  /api/account/password         - Change password
//! PUT  /api/account/two-factor       - Enable/disable two-factor login
//!
//! # Catalog
//! GET  /api/products                 - Active products (filters, sort, paging)
//! GET  /api/products/{id}            - Product with its current offer
//! GET  /api/categories               - Categories
//! GET  /api/categories/{slug}        - One category
//! GET  /api/banners                  - Active banners
//! GET  /api/offers                   - Running offers with products
//!
//! # Cart (requires auth)
//! GET    /api/cart                   - Cart with prices
//! DELETE /api/cart                   - Empty the cart
//! POST   /api/cart/items             - Add units
//! PUT    /api/cart/items/{product_id} - Set quantity (0 removes)
//! DELETE /api/cart/items/{product_id} - Remove line
//!
//! # Addresses (requires auth)
//! GET/POST       /api/addresses
//! GET/PUT/DELETE /api/addresses/{id}
//! PUT            /api/addresses/{id}/default
//!
//! # Orders (requires auth)
//! GET  /api/orders                   - Own orders
//! GET  /api/orders/{id}              - Own order
//! POST /api/orders/{id}/cancel       - Cancel while pending
//! PUT  /api/orders/{id}/receipt      - Attach transfer receipt URL
//!
//! # Payments
//! POST /api/payments/create-preference      - MercadoPago checkout
//! POST /api/payments/create-direct-transfer - Bank transfer checkout
//! GET  /api/payments/config                 - Offered methods (public)
//! POST /api/payments/webhook                - MercadoPago notifications
//!
//! # Support (requires auth)
//! GET/POST /api/tickets
//! GET      /api/tickets/{id}
//! POST     /api/tickets/{id}/messages
//! POST     /api/tickets/{id}/close
//!
//! # Uploads (requires auth)
//! POST /api/uploads/receipt          - Presigned receipt upload
//!
//! # Admin (requires admin)
//! /api/admin/...                     - See `admin::routes`
//! ```

pub mod account;
pub mod addresses;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod content;
pub mod orders;
pub mod payments;
pub mod products;
pub mod tickets;
pub mod uploads;

use std::net::IpAddr;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/verify-2fa", post(auth::verify_two_factor))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(account::profile).put(account::update_profile),
        )
        .route("/password", put(account::change_password))
        .route("/two-factor", put(account::set_two_factor))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add))
        .route(
            "/items/{product_id}",
            put(cart::set_quantity).delete(cart::remove),
        )
}

/// Create the address routes router.
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(addresses::index).post(addresses::create))
        .route(
            "/{id}",
            get(addresses::show)
                .put(addresses::update)
                .delete(addresses::delete),
        )
        .route("/{id}/default", put(addresses::set_default))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/receipt", put(orders::attach_receipt))
}

/// Create the ticket routes router.
pub fn ticket_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(tickets::index).post(tickets::create))
        .route("/{id}", get(tickets::show))
        .route("/{id}/messages", post(tickets::reply))
        .route("/{id}/close", post(tickets::close))
}

/// Create all `/api` routes.
///
/// The webhook is added after the rate limiters so gateway retries are never
/// throttled. `trusted_proxies` decides whose forwarding headers the limiters
/// believe.
pub fn api_routes(trusted_proxies: &[IpAddr]) -> Router<AppState> {
    Router::new()
        .nest(
            "/auth",
            auth_routes().layer(auth_rate_limiter(trusted_proxies)),
        )
        .nest("/account", account_routes())
        .route("/products", get(products::index))
        .route("/products/{id}", get(products::show))
        .route("/categories", get(products::categories))
        .route("/categories/{slug}", get(products::category))
        .route("/banners", get(content::banners))
        .route("/offers", get(content::offers))
        .nest("/cart", cart_routes())
        .nest("/addresses", address_routes())
        .nest("/orders", order_routes())
        .route(
            "/payments/create-preference",
            post(payments::create_preference),
        )
        .route(
            "/payments/create-direct-transfer",
            post(payments::create_direct_transfer),
        )
        .route("/payments/config", get(payments::config))
        .nest("/tickets", ticket_routes())
        .route("/uploads/receipt", post(uploads::receipt))
        .nest("/admin", admin::routes())
        .layer(api_rate_limiter(trusted_proxies))
        .route("/payments/webhook", post(payments::webhook))
}

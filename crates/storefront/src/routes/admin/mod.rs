//! Back-office API. Every handler requires [`RequireAdmin`](crate::middleware::RequireAdmin).

pub mod catalog;
pub mod content;
pub mod dashboard;
pub mod orders;
pub mod settings;
pub mod tickets;
pub mod users;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::routes::uploads;
use crate::state::AppState;

/// Create the admin routes router (nested under `/api/admin`).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::dashboard))
        // Catalog
        .route(
            "/products",
            get(catalog::products).post(catalog::create_product),
        )
        .route(
            "/products/{id}",
            get(catalog::product)
                .put(catalog::update_product)
                .delete(catalog::delete_product),
        )
        .route("/products/{id}/stock", put(catalog::set_stock))
        .route("/categories", post(catalog::create_category))
        .route(
            "/categories/{id}",
            put(catalog::update_category).delete(catalog::delete_category),
        )
        // Orders
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", put(orders::update_status))
        .route("/orders/{id}/verify-transfer", post(orders::verify_transfer))
        // Users
        .route("/users", get(users::index))
        .route("/users/{id}/blocked", put(users::set_blocked))
        .route("/users/{id}/admin", put(users::set_admin))
        // Support
        .route("/tickets", get(tickets::index))
        .route("/tickets/{id}", get(tickets::show))
        .route("/tickets/{id}/messages", post(tickets::reply))
        .route("/tickets/{id}/status", put(tickets::update_status))
        // Content
        .route(
            "/banners",
            get(content::banners).post(content::create_banner),
        )
        .route(
            "/banners/{id}",
            put(content::update_banner).delete(content::delete_banner),
        )
        .route("/offers", get(content::offers).post(content::create_offer))
        .route(
            "/offers/{id}",
            get(content::offer)
                .put(content::update_offer)
                .delete(content::delete_offer),
        )
        // Settings
        .route(
            "/settings/payment",
            get(settings::payment_config).put(settings::update_payment_config),
        )
        .route(
            "/settings/transfer-discount",
            get(settings::transfer_discount).put(settings::update_transfer_discount),
        )
        .route("/uploads", post(uploads::admin_upload))
}

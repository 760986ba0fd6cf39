//! Admin dashboard handler.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use crate::db::orders::OrderStats;
use crate::db::{OrderRepository, ProductRepository, TicketRepository, UserRepository};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::catalog::Product;
use crate::state::AppState;

/// Dashboard figures.
#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub total_users: i64,
    pub total_products: i64,
    #[serde(flatten)]
    pub orders: OrderStats,
    pub open_tickets: i64,
    pub low_stock: Vec<Product>,
}

/// GET /api/admin/dashboard
#[instrument(skip(state, _admin))]
pub async fn dashboard(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Dashboard>> {
    let pool = state.pool();
    let users = UserRepository::new(pool);
    let products = ProductRepository::new(pool);
    let orders = OrderRepository::new(pool);
    let tickets = TicketRepository::new(pool);

    let (total_users, total_products, order_stats, open_tickets, low_stock) = tokio::join!(
        users.count(),
        products.count(),
        orders.stats(),
        tickets.count_open(),
        products.low_stock(),
    );

    Ok(Json(Dashboard {
        total_users: total_users?,
        total_products: total_products?,
        orders: order_stats?,
        open_tickets: open_tickets?,
        low_stock: low_stock?,
    }))
}

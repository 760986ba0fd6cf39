//! Admin support desk.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

use mercadoboom_core::TicketId;

use crate::db::TicketRepository;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::ticket::{
    ReplyRequest, Ticket, TicketFilter, TicketMessage, TicketThread, UpdateTicketStatusRequest,
};
use crate::services::tickets::TicketService;
use crate::state::AppState;

/// GET /api/admin/tickets
#[instrument(skip(state, _admin))]
pub async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(filter): Query<TicketFilter>,
) -> Result<Json<Vec<Ticket>>> {
    let tickets = TicketRepository::new(state.pool())
        .list(filter.status)
        .await?;
    Ok(Json(tickets))
}

/// GET /api/admin/tickets/{id}
#[instrument(skip(state, _admin))]
pub async fn show(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
) -> Result<Json<TicketThread>> {
    let thread = TicketService::new(state.pool(), state.notifier())
        .thread(id, None)
        .await?;
    Ok(Json(thread))
}

/// POST /api/admin/tickets/{id}/messages
///
/// Picks up an open ticket and emails the customer.
#[instrument(skip(state, admin, request), fields(admin_id = %admin.id))]
pub async fn reply(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
    Json(request): Json<ReplyRequest>,
) -> Result<(StatusCode, Json<TicketMessage>)> {
    let message = TicketService::new(state.pool(), state.notifier())
        .reply_as_admin(&admin, id, &request.message)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// PUT /api/admin/tickets/{id}/status
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn update_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
    Json(request): Json<UpdateTicketStatusRequest>,
) -> Result<Json<Ticket>> {
    let ticket = TicketService::new(state.pool(), state.notifier())
        .set_status(id, request.status)
        .await?;
    Ok(Json(ticket))
}

//! Customer support ticket route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use mercadoboom_core::TicketId;

use crate::db::TicketRepository;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::ticket::{CreateTicketRequest, ReplyRequest, Ticket, TicketMessage, TicketThread};
use crate::services::tickets::TicketService;
use crate::state::AppState;

/// POST /api/tickets
#[instrument(skip(state, user, request), fields(user_id = %user.id))]
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(request): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<TicketThread>)> {
    let thread = TicketService::new(state.pool(), state.notifier())
        .create(user.id, &request)
        .await?;
    Ok((StatusCode::CREATED, Json(thread)))
}

/// GET /api/tickets
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Ticket>>> {
    let tickets = TicketRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(tickets))
}

/// GET /api/tickets/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
) -> Result<Json<TicketThread>> {
    let thread = TicketService::new(state.pool(), state.notifier())
        .thread(id, Some(user.id))
        .await?;
    Ok(Json(thread))
}

/// POST /api/tickets/{id}/messages
#[instrument(skip(state, user, request), fields(user_id = %user.id))]
pub async fn reply(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
    Json(request): Json<ReplyRequest>,
) -> Result<(StatusCode, Json<TicketMessage>)> {
    let message = TicketService::new(state.pool(), state.notifier())
        .reply_as_user(&user, id, &request.message)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /api/tickets/{id}/close
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn close(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
) -> Result<Json<Ticket>> {
    let ticket = TicketService::new(state.pool(), state.notifier())
        .close(user.id, id)
        .await?;
    Ok(Json(ticket))
}

//! Support tickets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercadoboom_core::{OrderId, TicketId, TicketMessageId, TicketPriority, TicketStatus, UserId};

/// A support conversation opened by a user.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Ticket {
    pub id: TicketId,
    pub user_id: UserId,
    pub order_id: Option<OrderId>,
    pub subject: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One message in a ticket.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TicketMessage {
    pub id: TicketMessageId,
    pub ticket_id: TicketId,
    pub author_id: UserId,
    pub from_admin: bool,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Ticket with its full conversation.
#[derive(Debug, Serialize)]
pub struct TicketThread {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub messages: Vec<TicketMessage>,
}

/// New ticket body.
#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub subject: String,
    pub message: String,
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub priority: TicketPriority,
}

/// Reply body (user or admin).
#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub message: String,
}

/// Admin status change.
#[derive(Debug, Deserialize)]
pub struct UpdateTicketStatusRequest {
    pub status: TicketStatus,
}

/// Admin listing filter.
#[derive(Debug, Default, Deserialize)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
}

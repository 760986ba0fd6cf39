//! Support ticket conversations.
//!
//! A ticket moves `open → in_progress → resolved → closed`. Customer replies
//! reopen a resolved ticket; admin replies pick up an open one. Nobody can
//! write to a closed ticket.

use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};

use mercadoboom_core::{TicketId, TicketStatus, UserId};

use crate::db::{OrderRepository, RepositoryError, TicketRepository, UserRepository};
use crate::models::ticket::{CreateTicketRequest, Ticket, TicketMessage, TicketThread};
use crate::models::user::User;
use crate::services::notifications::Notifier;

/// Longest accepted subject, in characters.
const MAX_SUBJECT_LENGTH: usize = 200;

/// Errors that can occur handling a ticket.
#[derive(Debug, Error)]
pub enum TicketError {
    #[error("ticket not found")]
    NotFound,

    #[error("order not found")]
    OrderNotFound,

    #[error("ticket is closed")]
    Closed,

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Status a ticket takes after a reply.
fn status_after_reply(current: TicketStatus, from_admin: bool) -> Result<TicketStatus, TicketError> {
    match (current, from_admin) {
        (TicketStatus::Closed, _) => Err(TicketError::Closed),
        (TicketStatus::Open, true) => Ok(TicketStatus::InProgress),
        (TicketStatus::Resolved, false) => Ok(TicketStatus::Open),
        (status, _) => Ok(status),
    }
}

fn required<'s>(value: &'s str, field: &str) -> Result<&'s str, TicketError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TicketError::InvalidInput(format!("{field} is required")));
    }
    Ok(trimmed)
}

/// Ticket service.
pub struct TicketService<'a> {
    tickets: TicketRepository<'a>,
    orders: OrderRepository<'a>,
    users: UserRepository<'a>,
    notifier: &'a Notifier,
}

impl<'a> TicketService<'a> {
    /// Create a new ticket service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, notifier: &'a Notifier) -> Self {
        Self {
            tickets: TicketRepository::new(pool),
            orders: OrderRepository::new(pool),
            users: UserRepository::new(pool),
            notifier,
        }
    }

    /// Open a ticket with its first message.
    ///
    /// # Errors
    ///
    /// Returns `TicketError::InvalidInput` for a blank subject or message and
    /// `TicketError::OrderNotFound` when the referenced order isn't the user's.
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn create(
        &self,
        user_id: UserId,
        request: &CreateTicketRequest,
    ) -> Result<TicketThread, TicketError> {
        let subject = required(&request.subject, "subject")?;
        if subject.chars().count() > MAX_SUBJECT_LENGTH {
            return Err(TicketError::InvalidInput(format!(
                "subject must be at most {MAX_SUBJECT_LENGTH} characters"
            )));
        }
        let body = required(&request.message, "message")?;

        if let Some(order_id) = request.order_id
            && self.orders.get_for_user(user_id, order_id).await?.is_none()
        {
            return Err(TicketError::OrderNotFound);
        }

        let (ticket, message) = self
            .tickets
            .create(user_id, subject, body, request.order_id, request.priority)
            .await?;
        info!(ticket_id = %ticket.id, "Ticket opened");

        Ok(TicketThread {
            ticket,
            messages: vec![message],
        })
    }

    /// A ticket with its messages, checking ownership unless `owner` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `TicketError::NotFound` if the ticket doesn't exist or belongs
    /// to someone else.
    pub async fn thread(
        &self,
        id: TicketId,
        owner: Option<UserId>,
    ) -> Result<TicketThread, TicketError> {
        let ticket = self.get(id, owner).await?;
        let messages = self.tickets.messages(id).await?;
        Ok(TicketThread { ticket, messages })
    }

    async fn get(&self, id: TicketId, owner: Option<UserId>) -> Result<Ticket, TicketError> {
        self.tickets
            .get(id)
            .await?
            .filter(|t| owner.is_none_or(|user_id| t.user_id == user_id))
            .ok_or(TicketError::NotFound)
    }

    /// Customer reply on their own ticket.
    ///
    /// # Errors
    ///
    /// Returns `TicketError::Closed` for a closed ticket.
    #[instrument(skip(self, user, body), fields(user_id = %user.id))]
    pub async fn reply_as_user(
        &self,
        user: &User,
        id: TicketId,
        body: &str,
    ) -> Result<TicketMessage, TicketError> {
        let body = required(body, "message")?;
        let ticket = self.get(id, Some(user.id)).await?;
        let next = status_after_reply(ticket.status, false)?;

        let (_, message) = self
            .tickets
            .add_message(id, user.id, false, body, next)
            .await?;
        Ok(message)
    }

    /// Admin reply. Emails the ticket owner.
    ///
    /// # Errors
    ///
    /// Returns `TicketError::Closed` for a closed ticket.
    #[instrument(skip(self, admin, body), fields(admin_id = %admin.id))]
    pub async fn reply_as_admin(
        &self,
        admin: &User,
        id: TicketId,
        body: &str,
    ) -> Result<TicketMessage, TicketError> {
        let body = required(body, "message")?;
        let ticket = self.get(id, None).await?;
        let next = status_after_reply(ticket.status, true)?;

        let (ticket, message) = self
            .tickets
            .add_message(id, admin.id, true, body, next)
            .await?;

        if let Some(owner) = self.users.get_by_id(ticket.user_id).await? {
            self.notifier.ticket_reply(&owner, &ticket, &message).await;
        }

        Ok(message)
    }

    /// Customer closes their own ticket.
    ///
    /// # Errors
    ///
    /// Returns `TicketError::NotFound` if the ticket isn't the user's.
    pub async fn close(&self, user_id: UserId, id: TicketId) -> Result<Ticket, TicketError> {
        let ticket = self.get(id, Some(user_id)).await?;
        if ticket.status == TicketStatus::Closed {
            return Ok(ticket);
        }
        let ticket = self.tickets.set_status(id, TicketStatus::Closed).await?;
        info!(ticket_id = %id, "Ticket closed by customer");
        Ok(ticket)
    }

    /// Admin status change. Any status may be set.
    ///
    /// # Errors
    ///
    /// Returns `TicketError::NotFound` if the ticket doesn't exist.
    pub async fn set_status(&self, id: TicketId, status: TicketStatus) -> Result<Ticket, TicketError> {
        self.tickets
            .set_status(id, status)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => TicketError::NotFound,
                other => TicketError::Repository(other),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_reply_picks_up_open_ticket() {
        assert_eq!(
            status_after_reply(TicketStatus::Open, true).ok(),
            Some(TicketStatus::InProgress)
        );
        assert_eq!(
            status_after_reply(TicketStatus::Resolved, true).ok(),
            Some(TicketStatus::Resolved)
        );
    }

    #[test]
    fn test_customer_reply_reopens_resolved_ticket() {
        assert_eq!(
            status_after_reply(TicketStatus::Resolved, false).ok(),
            Some(TicketStatus::Open)
        );
        assert_eq!(
            status_after_reply(TicketStatus::InProgress, false).ok(),
            Some(TicketStatus::InProgress)
        );
    }

    #[test]
    fn test_closed_ticket_rejects_replies() {
        assert!(matches!(
            status_after_reply(TicketStatus::Closed, false),
            Err(TicketError::Closed)
        ));
        assert!(matches!(
            status_after_reply(TicketStatus::Closed, true),
            Err(TicketError::Closed)
        ));
    }

    #[test]
    fn test_required_trims() {
        assert_eq!(required("  hola ", "message").ok(), Some("hola"));
        assert!(matches!(
            required("   ", "subject"),
            Err(TicketError::InvalidInput(msg)) if msg == "subject is required"
        ));
    }
}

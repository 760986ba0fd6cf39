//! Support ticket repository.

use sqlx::{PgPool, Postgres, Transaction};

use mercadoboom_core::{OrderId, TicketId, TicketPriority, TicketStatus, UserId};

use super::RepositoryError;
use crate::models::ticket::{Ticket, TicketMessage};

/// Repository for support tickets and their messages.
pub struct TicketRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TicketRepository<'a> {
    /// Create a new ticket repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Open a ticket together with its first message.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        subject: &str,
        body: &str,
        order_id: Option<OrderId>,
        priority: TicketPriority,
    ) -> Result<(Ticket, TicketMessage), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let ticket = sqlx::query_as::<_, Ticket>(
            r"
            INSERT INTO support_tickets (user_id, order_id, subject, priority)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            ",
        )
        .bind(user_id)
        .bind(order_id)
        .bind(subject)
        .bind(priority)
        .fetch_one(&mut *tx)
        .await?;

        let message = insert_message(&mut tx, ticket.id, user_id, false, body).await?;

        tx.commit().await?;
        Ok((ticket, message))
    }

    /// A user's tickets, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Ticket>, RepositoryError> {
        let tickets = sqlx::query_as::<_, Ticket>(
            "SELECT * FROM support_tickets WHERE user_id = $1 ORDER BY updated_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(tickets)
    }

    /// All tickets, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, status: Option<TicketStatus>) -> Result<Vec<Ticket>, RepositoryError> {
        let tickets = sqlx::query_as::<_, Ticket>(
            r"
            SELECT * FROM support_tickets
            WHERE $1::ticket_status IS NULL OR status = $1
            ORDER BY updated_at DESC, id DESC
            ",
        )
        .bind(status)
        .fetch_all(self.pool)
        .await?;
        Ok(tickets)
    }

    /// Get a ticket by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: TicketId) -> Result<Option<Ticket>, RepositoryError> {
        let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM support_tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(ticket)
    }

    /// Messages of a ticket in chronological order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn messages(&self, id: TicketId) -> Result<Vec<TicketMessage>, RepositoryError> {
        let messages = sqlx::query_as::<_, TicketMessage>(
            "SELECT * FROM ticket_messages WHERE ticket_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(messages)
    }

    /// Append a message and move the ticket to `next_status`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the ticket doesn't exist.
    pub async fn add_message(
        &self,
        id: TicketId,
        author_id: UserId,
        from_admin: bool,
        body: &str,
        next_status: TicketStatus,
    ) -> Result<(Ticket, TicketMessage), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let ticket = sqlx::query_as::<_, Ticket>(
            r"
            UPDATE support_tickets SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(next_status)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let message = insert_message(&mut tx, id, author_id, from_admin, body).await?;

        tx.commit().await?;
        Ok((ticket, message))
    }

    /// Set a ticket's status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the ticket doesn't exist.
    pub async fn set_status(
        &self,
        id: TicketId,
        status: TicketStatus,
    ) -> Result<Ticket, RepositoryError> {
        sqlx::query_as::<_, Ticket>(
            "UPDATE support_tickets SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Number of tickets that are neither resolved nor closed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_open(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM support_tickets WHERE status IN ('open', 'in_progress')",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }
}

async fn insert_message(
    tx: &mut Transaction<'_, Postgres>,
    ticket_id: TicketId,
    author_id: UserId,
    from_admin: bool,
    body: &str,
) -> Result<TicketMessage, RepositoryError> {
    let message = sqlx::query_as::<_, TicketMessage>(
        r"
        INSERT INTO ticket_messages (ticket_id, author_id, from_admin, body)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        ",
    )
    .bind(ticket_id)
    .bind(author_id)
    .bind(from_admin)
    .bind(body)
    .fetch_one(&mut **tx)
    .await?;
    Ok(message)
}

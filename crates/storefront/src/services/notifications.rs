//! Customer notifications over email and SMS.
//!
//! Best-effort messages (order and ticket updates) never fail the caller:
//! a missing channel is logged at debug level and a delivery error is
//! logged as a warning. Two-factor codes are the exception and return an
//! error so the login can be retried.

use rust_decimal::Decimal;
use thiserror::Error;

use mercadoboom_core::{PaymentType, TwoFactorMethod};

use super::email::{
    EmailError, EmailService, OrderCreatedEmail, OrderLineView, OrderStatusEmail,
    TicketReplyEmail,
};
use super::sms::{SmsClient, SmsError};
use crate::models::order::Order;
use crate::models::ticket::{Ticket, TicketMessage};
use crate::models::user::User;

/// Errors delivering a message that must arrive.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The requested channel has no configuration.
    #[error("{0} delivery is not configured")]
    NotConfigured(&'static str),

    /// The user has no phone number for an SMS.
    #[error("user has no phone number")]
    NoPhone,

    #[error(transparent)]
    Email(#[from] EmailError),

    #[error(transparent)]
    Sms(#[from] SmsError),
}

/// Fan-out point for customer notifications.
#[derive(Clone)]
pub struct Notifier {
    email: Option<EmailService>,
    sms: Option<SmsClient>,
    frontend_url: String,
}

impl Notifier {
    /// Create a notifier over whichever channels are configured.
    #[must_use]
    pub const fn new(
        email: Option<EmailService>,
        sms: Option<SmsClient>,
        frontend_url: String,
    ) -> Self {
        Self {
            email,
            sms,
            frontend_url,
        }
    }

    /// Whether two-factor codes can be sent over `method`.
    #[must_use]
    pub const fn can_deliver(&self, method: TwoFactorMethod) -> bool {
        match method {
            TwoFactorMethod::Email => self.email.is_some(),
            TwoFactorMethod::Sms => self.sms.is_some(),
        }
    }

    /// Deliver a two-factor code over the user's chosen channel.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel is missing or delivery fails.
    pub async fn send_two_factor_code(
        &self,
        user: &User,
        method: TwoFactorMethod,
        code: &str,
        minutes: i64,
    ) -> Result<(), NotificationError> {
        match method {
            TwoFactorMethod::Email => {
                let email = self
                    .email
                    .as_ref()
                    .ok_or(NotificationError::NotConfigured("email"))?;
                email
                    .send_two_factor_code(user.email.as_str(), code, minutes)
                    .await?;
            }
            TwoFactorMethod::Sms => {
                let sms = self
                    .sms
                    .as_ref()
                    .ok_or(NotificationError::NotConfigured("sms"))?;
                let phone = user.phone.as_deref().ok_or(NotificationError::NoPhone)?;
                let body = format!(
                    "MercadoBoom: tu código de acceso es {code}. Vence en {minutes} minutos."
                );
                sms.send(phone, &body).await?;
            }
        }
        Ok(())
    }

    /// Confirm a new checkout to the buyer.
    pub async fn order_created(&self, user: &User, orders: &[Order]) {
        let Some(email) = &self.email else {
            tracing::debug!(user_id = %user.id, "Email not configured, skipping order confirmation");
            return;
        };
        let Some(first) = orders.first() else {
            return;
        };

        let lines: Vec<OrderLineView> = orders
            .iter()
            .map(|o| OrderLineView {
                product_name: o.product_name.clone(),
                quantity: o.quantity,
                total: o.total.to_string(),
            })
            .collect();
        let total: Decimal = orders.iter().map(|o| o.total).sum();
        let name = user.full_name();
        let checkout_id = first.checkout_id.to_string();
        let total = total.to_string();
        let orders_url = self.orders_url();

        let message = OrderCreatedEmail {
            name: &name,
            checkout_id: &checkout_id,
            payment_label: payment_label(first.payment_type),
            lines: &lines,
            total: &total,
            orders_url: &orders_url,
        };
        if let Err(e) = email.send_order_created(user.email.as_str(), &message).await {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to send order confirmation");
        }
    }

    /// Tell the buyer an order changed status, by email and, when a phone is
    /// known, by SMS.
    pub async fn order_status_changed(&self, user: &User, order: &Order) {
        let name = user.full_name();
        let orders_url = self.orders_url();

        if let Some(email) = &self.email {
            let message = OrderStatusEmail {
                name: &name,
                order_id: order.id.as_i32(),
                product_name: &order.product_name,
                status_label: order.status.label(),
                tracking_number: order.tracking_number.as_deref(),
                note: order.admin_note.as_deref(),
                orders_url: &orders_url,
            };
            if let Err(e) = email.send_order_status(user.email.as_str(), &message).await {
                tracing::warn!(order_id = %order.id, error = %e, "Failed to send order status email");
            }
        } else {
            tracing::debug!(order_id = %order.id, "Email not configured, skipping status email");
        }

        if let (Some(sms), Some(phone)) = (&self.sms, user.phone.as_deref()) {
            let tracking = order
                .tracking_number
                .as_deref()
                .map(|t| format!(" Seguimiento: {t}."))
                .unwrap_or_default();
            let body = format!(
                "MercadoBoom: tu pedido #{} está {}.{tracking}",
                order.id,
                order.status.label().to_lowercase()
            );
            if let Err(e) = sms.send(phone, &body).await {
                tracing::warn!(order_id = %order.id, error = %e, "Failed to send order status SMS");
            }
        }
    }

    /// Forward an admin reply on a ticket.
    pub async fn ticket_reply(&self, user: &User, ticket: &Ticket, message: &TicketMessage) {
        let Some(email) = &self.email else {
            tracing::debug!(ticket_id = %ticket.id, "Email not configured, skipping ticket reply");
            return;
        };
        let name = user.full_name();
        let ticket_url = format!("{}/account/tickets/{}", self.frontend_url, ticket.id);

        let content = TicketReplyEmail {
            name: &name,
            ticket_id: ticket.id.as_i32(),
            subject: &ticket.subject,
            message: &message.body,
            ticket_url: &ticket_url,
        };
        if let Err(e) = email.send_ticket_reply(user.email.as_str(), &content).await {
            tracing::warn!(ticket_id = %ticket.id, error = %e, "Failed to send ticket reply email");
        }
    }

    fn orders_url(&self) -> String {
        format!("{}/account/orders", self.frontend_url)
    }
}

const fn payment_label(payment_type: PaymentType) -> &'static str {
    match payment_type {
        PaymentType::Mercadopago => "MercadoPago",
        PaymentType::DirectTransfer => "Transferencia bancaria",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use mercadoboom_core::{Email, UserId};

    use super::*;

    fn user(phone: Option<&str>) -> User {
        User {
            id: UserId::new(7),
            email: Email::parse("ana@example.com").unwrap(),
            first_name: "Ana".to_string(),
            last_name: "Pérez".to_string(),
            phone: phone.map(str::to_string),
            is_admin: false,
            is_blocked: false,
            two_factor_enabled: true,
            two_factor_method: TwoFactorMethod::Email,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_two_factor_code_requires_configured_channel() {
        let notifier = Notifier::new(None, None, "http://localhost:5173".to_string());

        let err = notifier
            .send_two_factor_code(&user(None), TwoFactorMethod::Email, "123456", 10)
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::NotConfigured("email")));

        let err = notifier
            .send_two_factor_code(&user(Some("+5491155551234")), TwoFactorMethod::Sms, "123456", 10)
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::NotConfigured("sms")));
    }

    #[tokio::test]
    async fn test_best_effort_messages_skip_missing_channels() {
        let notifier = Notifier::new(None, None, "http://localhost:5173".to_string());
        notifier.order_created(&user(None), &[]).await;
    }
}

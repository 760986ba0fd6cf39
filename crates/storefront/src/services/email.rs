//! Transactional email over SMTP.
//!
//! Messages are rendered from Askama templates (HTML and plain text) and
//! sent as `multipart/alternative` through lettre.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;

/// One line of the order confirmation.
#[derive(Debug, Clone)]
pub struct OrderLineView {
    pub product_name: String,
    pub quantity: i32,
    pub total: String,
}

#[derive(Template)]
#[template(path = "email/two_factor_code.html")]
struct TwoFactorCodeHtml<'a> {
    code: &'a str,
    minutes: i64,
}

#[derive(Template)]
#[template(path = "email/two_factor_code.txt")]
struct TwoFactorCodeText<'a> {
    code: &'a str,
    minutes: i64,
}

#[derive(Template)]
#[template(path = "email/order_created.html")]
struct OrderCreatedHtml<'a> {
    name: &'a str,
    checkout_id: &'a str,
    payment_label: &'a str,
    lines: &'a [OrderLineView],
    total: &'a str,
    orders_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_created.txt")]
struct OrderCreatedText<'a> {
    name: &'a str,
    checkout_id: &'a str,
    payment_label: &'a str,
    lines: &'a [OrderLineView],
    total: &'a str,
    orders_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_status.html")]
struct OrderStatusHtml<'a> {
    name: &'a str,
    order_id: i32,
    product_name: &'a str,
    status_label: &'a str,
    tracking_number: Option<&'a str>,
    note: Option<&'a str>,
    orders_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_status.txt")]
struct OrderStatusText<'a> {
    name: &'a str,
    order_id: i32,
    product_name: &'a str,
    status_label: &'a str,
    tracking_number: Option<&'a str>,
    note: Option<&'a str>,
    orders_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/ticket_reply.html")]
struct TicketReplyHtml<'a> {
    name: &'a str,
    ticket_id: i32,
    subject: &'a str,
    message: &'a str,
    ticket_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/ticket_reply.txt")]
struct TicketReplyText<'a> {
    name: &'a str,
    ticket_id: i32,
    subject: &'a str,
    message: &'a str,
    ticket_url: &'a str,
}

/// Content of an order-created email.
#[derive(Debug)]
pub struct OrderCreatedEmail<'a> {
    pub name: &'a str,
    pub checkout_id: &'a str,
    pub payment_label: &'a str,
    pub lines: &'a [OrderLineView],
    pub total: &'a str,
    pub orders_url: &'a str,
}

/// Content of an order-status email.
#[derive(Debug)]
pub struct OrderStatusEmail<'a> {
    pub name: &'a str,
    pub order_id: i32,
    pub product_name: &'a str,
    pub status_label: &'a str,
    pub tracking_number: Option<&'a str>,
    pub note: Option<&'a str>,
    pub orders_url: &'a str,
}

/// Content of a ticket-reply email.
#[derive(Debug)]
pub struct TicketReplyEmail<'a> {
    pub name: &'a str,
    pub ticket_id: i32,
    pub subject: &'a str,
    pub message: &'a str,
    pub ticket_url: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Send a two-factor login code.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_two_factor_code(
        &self,
        to: &str,
        code: &str,
        minutes: i64,
    ) -> Result<(), EmailError> {
        let html = TwoFactorCodeHtml { code, minutes }.render()?;
        let text = TwoFactorCodeText { code, minutes }.render()?;

        self.send_multipart_email(to, "Tu código de acceso a MercadoBoom", &text, &html)
            .await
    }

    /// Send the confirmation for a new checkout.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_created(
        &self,
        to: &str,
        email: &OrderCreatedEmail<'_>,
    ) -> Result<(), EmailError> {
        let html = OrderCreatedHtml {
            name: email.name,
            checkout_id: email.checkout_id,
            payment_label: email.payment_label,
            lines: email.lines,
            total: email.total,
            orders_url: email.orders_url,
        }
        .render()?;
        let text = OrderCreatedText {
            name: email.name,
            checkout_id: email.checkout_id,
            payment_label: email.payment_label,
            lines: email.lines,
            total: email.total,
            orders_url: email.orders_url,
        }
        .render()?;

        self.send_multipart_email(to, "Recibimos tu pedido", &text, &html)
            .await
    }

    /// Tell a customer their order moved to a new status.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_status(
        &self,
        to: &str,
        email: &OrderStatusEmail<'_>,
    ) -> Result<(), EmailError> {
        let html = OrderStatusHtml {
            name: email.name,
            order_id: email.order_id,
            product_name: email.product_name,
            status_label: email.status_label,
            tracking_number: email.tracking_number,
            note: email.note,
            orders_url: email.orders_url,
        }
        .render()?;
        let text = OrderStatusText {
            name: email.name,
            order_id: email.order_id,
            product_name: email.product_name,
            status_label: email.status_label,
            tracking_number: email.tracking_number,
            note: email.note,
            orders_url: email.orders_url,
        }
        .render()?;

        let subject = format!("Pedido #{}: {}", email.order_id, email.status_label);
        self.send_multipart_email(to, &subject, &text, &html).await
    }

    /// Forward an admin reply on a support ticket.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_ticket_reply(
        &self,
        to: &str,
        email: &TicketReplyEmail<'_>,
    ) -> Result<(), EmailError> {
        let html = TicketReplyHtml {
            name: email.name,
            ticket_id: email.ticket_id,
            subject: email.subject,
            message: email.message,
            ticket_url: email.ticket_url,
        }
        .render()?;
        let text = TicketReplyText {
            name: email.name,
            ticket_id: email.ticket_id,
            subject: email.subject,
            message: email.message,
            ticket_url: email.ticket_url,
        }
        .render()?;

        let subject = format!("Respuesta a tu consulta #{}", email.ticket_id);
        self.send_multipart_email(to, &subject, &text, &html).await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_two_factor_template_contains_code() {
        let text = TwoFactorCodeText {
            code: "482913",
            minutes: 10,
        }
        .render()
        .unwrap();
        assert!(text.contains("482913"));
        assert!(text.contains("10 minutos"));
    }

    #[test]
    fn test_order_status_template_escapes_html() {
        let html = OrderStatusHtml {
            name: "Ana",
            order_id: 42,
            product_name: "<script>x</script>",
            status_label: "Enviado",
            tracking_number: Some("AR123"),
            note: None,
            orders_url: "https://mercadoboom.test/orders",
        }
        .render()
        .unwrap();
        assert!(!html.contains("<script>x</script>"));
        assert!(html.contains("AR123"));
    }

    #[test]
    fn test_order_created_text_lists_lines() {
        let lines = vec![
            OrderLineView {
                product_name: "Parlante".to_string(),
                quantity: 2,
                total: "20000.00".to_string(),
            },
            OrderLineView {
                product_name: "Cable".to_string(),
                quantity: 1,
                total: "1500.00".to_string(),
            },
        ];
        let text = OrderCreatedText {
            name: "Ana",
            checkout_id: "c0ffee",
            payment_label: "Transferencia bancaria",
            lines: &lines,
            total: "21500.00",
            orders_url: "https://mercadoboom.test/orders",
        }
        .render()
        .unwrap();
        assert!(text.contains("Parlante x2: $ 20000.00"));
        assert!(text.contains("Cable x1"));
        assert!(text.contains("Total: $ 21500.00"));
    }
}

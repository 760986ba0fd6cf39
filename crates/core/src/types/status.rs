//! Status enums for orders, payments and support tickets.
//!
//! [`OrderStatus`] carries the order lifecycle rules: which transitions are
//! legal and which statuses hold reserved stock. [`PaymentStatus`] maps the
//! gateway's payment states onto the order lifecycle.

use serde::{Deserialize, Serialize};

/// Error returned when parsing a status from a string fails.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

impl ParseStatusError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Implements `as_str`, `Display` and `FromStr` from a single variant table.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The wire/database representation.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ParseStatusError::new($kind, s)),
                }
            }
        }
    };
}

/// Order lifecycle status.
///
/// ```text
/// PENDIENTE -> PAGADO -> EN_PREPARACION -> ENVIADO -> ENTREGADO
///     \           \            \
///      +-----------+------------+--> CANCELADO
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created, awaiting payment.
    #[default]
    Pendiente,
    /// Payment confirmed.
    Pagado,
    /// Being packed.
    EnPreparacion,
    /// Handed to the carrier.
    Enviado,
    /// Received by the customer.
    Entregado,
    /// Cancelled by the customer, an admin or a failed payment.
    Cancelado,
}

string_enum!(OrderStatus, "order status", {
    Pendiente => "PENDIENTE",
    Pagado => "PAGADO",
    EnPreparacion => "EN_PREPARACION",
    Enviado => "ENVIADO",
    Entregado => "ENTREGADO",
    Cancelado => "CANCELADO",
});

impl OrderStatus {
    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Staying in the same status is not a transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pendiente, Self::Pagado | Self::Cancelado)
                | (Self::Pagado, Self::EnPreparacion | Self::Cancelado)
                | (Self::EnPreparacion, Self::Enviado | Self::Cancelado)
                | (Self::Enviado, Self::Entregado)
        )
    }

    /// Whether an order in this status has its units taken out of stock.
    #[must_use]
    pub const fn holds_stock(self) -> bool {
        matches!(
            self,
            Self::Pagado | Self::EnPreparacion | Self::Enviado | Self::Entregado
        )
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Entregado | Self::Cancelado)
    }

    /// Human-readable label used in customer notifications.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pendiente => "Pendiente de pago",
            Self::Pagado => "Pagado",
            Self::EnPreparacion => "En preparación",
            Self::Enviado => "Enviado",
            Self::Entregado => "Entregado",
            Self::Cancelado => "Cancelado",
        }
    }
}

/// Payment status as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    InProcess,
    Approved,
    Rejected,
    Cancelled,
    Refunded,
    ChargedBack,
}

string_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    InProcess => "in_process",
    Approved => "approved",
    Rejected => "rejected",
    Cancelled => "cancelled",
    Refunded => "refunded",
    ChargedBack => "charged_back",
});

impl PaymentStatus {
    /// Map a gateway status string. Unknown values (`authorized`,
    /// `in_mediation`, ...) are treated as still pending.
    #[must_use]
    pub fn from_gateway(status: &str) -> Self {
        status.trim().to_ascii_lowercase().parse().unwrap_or_default()
    }

    /// The order status this payment status implies, if any.
    #[must_use]
    pub const fn order_effect(self) -> Option<OrderStatus> {
        match self {
            Self::Approved => Some(OrderStatus::Pagado),
            Self::Rejected | Self::Cancelled | Self::Refunded | Self::ChargedBack => {
                Some(OrderStatus::Cancelado)
            }
            Self::Pending | Self::InProcess => None,
        }
    }
}

/// How an order is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// Hosted checkout through MercadoPago.
    Mercadopago,
    /// Manual bank transfer verified by an admin.
    DirectTransfer,
}

string_enum!(PaymentType, "payment type", {
    Mercadopago => "mercadopago",
    DirectTransfer => "direct_transfer",
});

/// Support ticket status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "ticket_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

string_enum!(TicketStatus, "ticket status", {
    Open => "open",
    InProgress => "in_progress",
    Resolved => "resolved",
    Closed => "closed",
});

/// Support ticket priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "ticket_priority", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
}

string_enum!(TicketPriority, "ticket priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
});

/// Channel used to deliver two-factor codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "two_factor_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TwoFactorMethod {
    #[default]
    Email,
    Sms,
}

string_enum!(TwoFactorMethod, "two-factor method", {
    Email => "email",
    Sms => "sms",
});

//! Core types for MercadoBoom.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CurrencyCode, Percentage, PercentageError, percentage_of, round_money};
pub use status::*;

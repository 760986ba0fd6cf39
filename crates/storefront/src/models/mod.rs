//! Domain models for the storefront.
//!
//! Row types derive `sqlx::FromRow` and are serialized directly as API
//! responses. Request bodies live next to the entity they create or update.

pub mod address;
pub mod cart;
pub mod catalog;
pub mod content;
pub mod order;
pub mod session;
pub mod settings;
pub mod ticket;
pub mod user;

pub use session::{CurrentUser, keys as session_keys};

//! MercadoBoom Core - Shared domain types.
//!
//! This crate provides the types used across all MercadoBoom components:
//! - `storefront` - The `/api` server (catalog, checkout, orders, admin)
//! - `cli` - Command-line tools for migrations, admin users and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Order lifecycle rules and money arithmetic live
//! here so they can be tested without a database.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, money math, status enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

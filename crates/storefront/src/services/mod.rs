//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Registration, password login, two-factor codes, account settings
//! - `checkout` - Turns a cart (or explicit items) into priced orders
//! - `orders` - Order state machine, stock bookkeeping, payment reconciliation
//! - `payments` - Payment gateway client and webhook verification
//! - `pricing` - Offer, shipping and transfer discount math
//! - `email` / `sms` / `notifications` - Customer messaging
//! - `storage` - Presigned upload URLs for S3-compatible storage
//! - `settings` - Cached payment and discount configuration
//! - `tickets` - Support conversations and their status rules

pub mod auth;
pub mod checkout;
pub mod email;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod pricing;
pub mod settings;
pub mod sms;
pub mod storage;
pub mod tickets;

/// Compare two byte strings without short-circuiting on the first difference.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc123", b"abc123"));
        assert!(!constant_time_eq(b"abc123", b"abc124"));
        assert!(!constant_time_eq(b"abc", b"abc123"));
        assert!(constant_time_eq(b"", b""));
    }
}

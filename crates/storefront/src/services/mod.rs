//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Password login and account creation
//! - `chapters` - Protected chapter PDFs
//! - `checkout` - Course pricing and book order validation
//! - `email` - Outgoing mail (SMTP or log preview)
//! - `lockers` - Parcel locker directory
//! - `mailing` - Partner chapter drip scheduler
//! - `payments` - Payment provider client and webhook verification

pub mod auth;
pub mod chapters;
pub mod checkout;
pub mod email;
pub mod lockers;
pub mod mailing;
pub mod payments;

/// Constant-time string comparison to prevent timing attacks.
#[must_use]
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(constant_time_compare("", ""));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }
}

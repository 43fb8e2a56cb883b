//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};

use guidebook_core::{AccountStatus, Email, UserId};

/// A storefront user (domain type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Whether the user has paid for the guide.
    pub status: AccountStatus,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether the user may read the chapters.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.status == AccountStatus::Paid
    }
}

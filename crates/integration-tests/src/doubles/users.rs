//! In-memory account store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use guidebook_core::{AccountStatus, Email, UserId};
use guidebook_storefront::db::{RepositoryError, UserStore};
use guidebook_storefront::models::User;
use guidebook_storefront::services::auth::hash_password;

/// Accounts kept in a vector, with argon2 hashes like the real store.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<Vec<(User, String)>>,
    fail_updates: AtomicBool,
}

impl InMemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account with a plain-text password.
    pub fn add(&self, email: &str, password: &str, status: AccountStatus) -> User {
        let email = Email::parse(email).expect("test e-mail must be valid");
        let hash = hash_password(password).expect("hashing must succeed");
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        let user = User {
            id: UserId::new(i32::try_from(users.len()).unwrap_or(i32::MAX) + 1),
            email,
            status,
            created_at: Utc::now(),
        };
        users.push((user.clone(), hash));
        user
    }

    /// Current status of an account.
    #[must_use]
    pub fn status_of(&self, email: &str) -> Option<AccountStatus> {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(u, _)| u.email.as_str() == email)
            .map(|(u, _)| u.status)
    }

    /// Make `mark_paid` fail with a database error.
    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .get_with_password_hash(email)
            .await?
            .map(|(user, _)| user))
    }

    async fn get_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        Ok(self
            .users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(u, _)| &u.email == email)
            .cloned())
    }

    async fn create(
        &self,
        email: &Email,
        password_hash: &str,
        status: AccountStatus,
    ) -> Result<User, RepositoryError> {
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        if users.iter().any(|(u, _)| &u.email == email) {
            return Err(RepositoryError::Conflict(format!("email {email} taken")));
        }
        let user = User {
            id: UserId::new(i32::try_from(users.len()).unwrap_or(i32::MAX) + 1),
            email: email.clone(),
            status,
            created_at: Utc::now(),
        };
        users.push((user.clone(), password_hash.to_owned()));
        Ok(user)
    }

    async fn mark_paid(&self, email: &Email) -> Result<bool, RepositoryError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(RepositoryError::DataCorruption("update rejected".into()));
        }
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        let mut changed = false;
        for (user, _) in users.iter_mut().filter(|(u, _)| &u.email == email) {
            user.status = AccountStatus::Paid;
            changed = true;
        }
        Ok(changed)
    }
}

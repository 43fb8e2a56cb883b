//! Account management.
//!
//! # Usage
//!
//! ```bash
//! gb-cli user create -e reader@example.pl -p 'long password' --paid
//! ```

use guidebook_core::{AccountStatus, UserId};
use guidebook_storefront::db::UserRepository;
use guidebook_storefront::services::auth::AuthService;

use super::{CliError, connect};

/// Create a password account.
///
/// # Errors
///
/// Returns `CliError::Auth` for a bad e-mail, a short password or an e-mail
/// that is already taken.
pub async fn create(email: &str, password: &str, paid: bool) -> Result<UserId, CliError> {
    let pool = connect().await?;
    let users = UserRepository::new(pool);

    let status = if paid {
        AccountStatus::Paid
    } else {
        AccountStatus::Pending
    };

    let user = AuthService::new(&users)
        .register(email, password, status)
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, status = %user.status, "User created");
    Ok(user.id)
}

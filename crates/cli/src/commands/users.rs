//! Member management.

use la_red_core::Tokens;
use la_red_storefront::db::ProfileRepository;
use la_red_storefront::services::auth::register_with_password;

use super::{CommandError, connect};

/// Create a member with a password and an optional starting balance.
///
/// Profile rows are left to the first sign-in.
///
/// # Errors
///
/// Returns `CommandError::Auth` if the email is taken or the password is
/// too short, and `CommandError::InvalidAmount` for a negative balance.
pub async fn create(email: &str, password: &str, tokens: i64) -> Result<(), CommandError> {
    if tokens < 0 {
        return Err(CommandError::InvalidAmount(tokens));
    }

    let pool = connect().await?;
    let user = register_with_password(&pool, email, password).await?;
    tracing::info!(user_id = %user.id, email = %user.email, "Created user");

    if tokens > 0 {
        let balance = ProfileRepository::new(&pool)
            .credit(user.id, Tokens::new(tokens))
            .await?;
        tracing::info!(%balance, "Credited starting balance");
    }
    Ok(())
}

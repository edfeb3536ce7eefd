//! Token balance management.

use la_red_core::{Email, Tokens};
use la_red_storefront::db::{ProfileRepository, UserRepository};

use super::{CommandError, connect};

/// Credit tokens to an existing member.
///
/// # Errors
///
/// Returns `CommandError::InvalidAmount` unless `amount` is positive and
/// `CommandError::UnknownUser` if nobody has this email.
pub async fn grant(email: &str, amount: i64) -> Result<(), CommandError> {
    if amount <= 0 {
        return Err(CommandError::InvalidAmount(amount));
    }
    let email = Email::parse(email)?;

    let pool = connect().await?;
    let user = UserRepository::new(&pool)
        .get_by_email(&email)
        .await?
        .ok_or_else(|| CommandError::UnknownUser(email.to_string()))?;

    let balance = ProfileRepository::new(&pool)
        .credit(user.id, Tokens::new(amount))
        .await?;
    tracing::info!(user_id = %user.id, granted = amount, %balance, "Tokens granted");
    Ok(())
}

//! Profiles and token balances.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use la_red_core::{Tokens, UserId};

use super::RepositoryError;
use crate::models::{Profile, TokenBalance, UserSettings};
use crate::services::account::AccountStore;

#[derive(sqlx::FromRow)]
struct ProfileRow {
    user_id: UserId,
    username: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            user_id: row.user_id,
            username: row.username,
            display_name: row.display_name,
            avatar_url: row.avatar_url,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BalanceRow {
    user_id: UserId,
    balance: Tokens,
}

/// Repository for `profiles` and `token_balances`.
pub struct ProfileRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProfileRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user's profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_profile(&self, user_id: UserId) -> Result<Option<Profile>, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r"
            SELECT user_id, username, display_name, avatar_url, created_at
            FROM storefront.profiles
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Profile::from))
    }

    /// Insert a profile row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already has a profile.
    pub async fn insert_profile(&self, profile: &Profile) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.profiles (user_id, username, display_name, avatar_url, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(profile.user_id)
        .bind(&profile.username)
        .bind(&profile.display_name)
        .bind(&profile.avatar_url)
        .bind(profile.created_at)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "profile"))?;

        Ok(())
    }

    /// Point the profile at a newly uploaded avatar.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no profile yet.
    #[instrument(skip(self, avatar_url))]
    pub async fn set_avatar_url(
        &self,
        user_id: UserId,
        avatar_url: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.profiles
            SET avatar_url = $1
            WHERE user_id = $2
            ",
        )
        .bind(avatar_url)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Get a user's token balance.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_balance(
        &self,
        user_id: UserId,
    ) -> Result<Option<TokenBalance>, RepositoryError> {
        let row = sqlx::query_as::<_, BalanceRow>(
            r"
            SELECT user_id, balance
            FROM storefront.token_balances
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| TokenBalance {
            user_id: r.user_id,
            balance: r.balance,
        }))
    }

    /// Insert a token balance row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already has a balance.
    pub async fn insert_balance(&self, balance: &TokenBalance) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.token_balances (user_id, balance)
            VALUES ($1, $2)
            ",
        )
        .bind(balance.user_id)
        .bind(balance.balance)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "token balance"))?;

        Ok(())
    }

    /// Add tokens to a balance, creating the row if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self), fields(amount = amount.amount()))]
    pub async fn credit(&self, user_id: UserId, amount: Tokens) -> Result<Tokens, RepositoryError> {
        let (balance,): (Tokens,) = sqlx::query_as(
            r"
            INSERT INTO storefront.token_balances (user_id, balance)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET balance = token_balances.balance + EXCLUDED.balance,
                          updated_at = now()
            RETURNING balance
            ",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(self.pool)
        .await?;

        Ok(balance)
    }
}

/// [`AccountStore`] backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<Profile>, RepositoryError> {
        ProfileRepository::new(&self.pool).get_profile(user_id).await
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<(), RepositoryError> {
        ProfileRepository::new(&self.pool)
            .insert_profile(profile)
            .await
    }

    async fn fetch_balance(
        &self,
        user_id: UserId,
    ) -> Result<Option<TokenBalance>, RepositoryError> {
        ProfileRepository::new(&self.pool).get_balance(user_id).await
    }

    async fn insert_balance(&self, balance: &TokenBalance) -> Result<(), RepositoryError> {
        ProfileRepository::new(&self.pool)
            .insert_balance(balance)
            .await
    }

    async fn fetch_settings(&self, _user_id: UserId) -> Result<UserSettings, RepositoryError> {
        // No settings table yet; every session starts from the defaults.
        Ok(UserSettings::default())
    }
}

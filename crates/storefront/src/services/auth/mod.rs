//! Authentication.
//!
//! [`AuthClient`] is the seam the account provider signs in through.
//! [`SessionAuthClient`] implements it with argon2 password hashes in
//! `PostgreSQL` and the signed-in identity in the visitor's session.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::broadcast;
use tower_sessions::Session;
use tracing::{debug, info, instrument};

use la_red_core::Email;

use crate::db::{RepositoryError, UserRepository};
use crate::models::CurrentUser;
use crate::models::session_keys::CURRENT_USER;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Auth state transitions, published on a broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(CurrentUser),
    SignedOut(Option<CurrentUser>),
}

/// Identity operations the account provider depends on.
#[async_trait]
pub trait AuthClient: Send + Sync {
    /// The signed-in user, if any.
    async fn current_session(&self) -> Result<Option<CurrentUser>, AuthError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<CurrentUser, AuthError>;

    /// Register and sign in.
    async fn sign_up(&self, email: &str, password: &str) -> Result<CurrentUser, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Receive future auth events.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// [`AuthClient`] over the visitor's session and the users tables.
#[derive(Clone)]
pub struct SessionAuthClient {
    session: Session,
    pool: PgPool,
    events: broadcast::Sender<AuthEvent>,
}

impl SessionAuthClient {
    #[must_use]
    pub const fn new(session: Session, pool: PgPool, events: broadcast::Sender<AuthEvent>) -> Self {
        Self {
            session,
            pool,
            events,
        }
    }

    async fn start_session(&self, user: CurrentUser) -> Result<CurrentUser, AuthError> {
        // New id on privilege change.
        self.session.cycle_id().await?;
        self.session.insert(CURRENT_USER, &user).await?;

        // No receivers is fine.
        let _ = self.events.send(AuthEvent::SignedIn(user.clone()));
        Ok(user)
    }
}

#[async_trait]
impl AuthClient for SessionAuthClient {
    async fn current_session(&self) -> Result<Option<CurrentUser>, AuthError> {
        Ok(self.session.get::<CurrentUser>(CURRENT_USER).await?)
    }

    #[instrument(skip(self, password))]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<CurrentUser, AuthError> {
        let email = Email::parse(email)?;

        let (user, hash) = UserRepository::new(&self.pool)
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(password, &hash)?;

        info!(user_id = %user.id, "User signed in");
        self.start_session(CurrentUser::from(&user)).await
    }

    #[instrument(skip(self, password))]
    async fn sign_up(&self, email: &str, password: &str) -> Result<CurrentUser, AuthError> {
        let user = register_with_password(&self.pool, email, password).await?;

        info!(user_id = %user.id, "User registered");
        self.start_session(user).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let user = self.session.remove::<CurrentUser>(CURRENT_USER).await?;
        self.session.cycle_id().await?;

        debug!(user_id = ?user.as_ref().map(|u| u.id), "User signed out");
        let _ = self.events.send(AuthEvent::SignedOut(user));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

/// Create a user with a password.
///
/// # Errors
///
/// Returns `AuthError::InvalidEmail` if the email format is invalid.
/// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
/// Returns `AuthError::UserAlreadyExists` if the email is already registered.
pub async fn register_with_password(
    pool: &PgPool,
    email: &str,
    password: &str,
) -> Result<CurrentUser, AuthError> {
    let email = Email::parse(email)?;
    validate_password(password)?;
    let password_hash = hash_password(password)?;

    let user = UserRepository::new(pool)
        .create_with_password(&email, &password_hash)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
            other => AuthError::Repository(other),
        })?;

    Ok(CurrentUser::from(&user))
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

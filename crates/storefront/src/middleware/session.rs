//! Session middleware configuration.
//!
//! The session carries both the signed-in identity and, for guests, the
//! cart and wishlist arrays, so it outlives sign-out. The cookie holding
//! the session id is signed with a key derived from
//! `STOREFRONT_SESSION_SECRET`.

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use tower_sessions::cookie::{Key, SameSite, time::Duration};
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::{ConfigError, StorefrontConfig};

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "lared_session";

/// Sessions expire after 7 days of inactivity.
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Cookie signing key for a session secret.
///
/// # Errors
///
/// Returns `ConfigError::InsecureSecret` if the secret is shorter than
/// 64 bytes.
pub fn session_key(secret: &SecretString) -> Result<Key, ConfigError> {
    Key::try_from(secret.expose_secret().as_bytes()).map_err(|e| {
        ConfigError::InsecureSecret("STOREFRONT_SESSION_SECRET".to_string(), e.to_string())
    })
}

/// Create the session layer with the `PostgreSQL` store.
///
/// The `tower_sessions.session` table is created by the CLI `migrate`
/// command.
///
/// # Errors
///
/// Returns `ConfigError` if the session secret cannot be used as a key.
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> Result<SessionManagerLayer<PostgresStore, SignedCookie>, ConfigError> {
    let key = session_key(&config.session_secret)?;
    Ok(session_layer(
        PostgresStore::new(pool.clone()),
        config.is_https(),
        key,
    ))
}

/// Signed session layer over any store.
#[must_use]
pub fn session_layer<S: SessionStore + Clone>(
    store: S,
    secure: bool,
    key: Key,
) -> SessionManagerLayer<S, SignedCookie> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(
            SESSION_EXPIRY_SECONDS,
        )))
        .with_secure(secure)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(key)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_needs_64_bytes() {
        let short = SecretString::from("k7Qz!r2Lw9@pX4vN#8mB$3tY6&hJ1cF5");
        assert!(matches!(
            session_key(&short),
            Err(ConfigError::InsecureSecret(..))
        ));

        let long = SecretString::from("k7Qz!r2Lw9@pX4vN#8mB$3tY6&hJ1cF5".repeat(2));
        assert!(session_key(&long).is_ok());
    }
}

//! Authentication route handlers.
//!
//! Password registration, login and logout. The signed-in identity is
//! kept in the session; the response carries the freshly loaded account.

use axum::{Json, extract::State, http::StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{instrument, warn};

use super::account_provider;
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::models::{AccountSnapshot, session_keys};
use crate::services::{AccountError, AccountProvider};
use crate::state::AppState;

/// Login and registration body.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

/// Turn a sign-in result into the account response.
///
/// Credentials were accepted when only an account row failed to load, so
/// the visitor is signed in and gets whatever did load.
async fn signed_in(
    provider: &AccountProvider,
    result: std::result::Result<(), AccountError>,
) -> Result<AccountSnapshot> {
    match result {
        Ok(()) => {}
        Err(AccountError::Repository(e)) => {
            warn!(error = %e, "Signed in with account rows unavailable");
        }
        Err(e) => return Err(e.into()),
    }

    let snapshot = provider.snapshot().await;
    if let Some(user) = &snapshot.user {
        set_sentry_user(&user.id, Some(user.email.as_str()));
    }
    Ok(snapshot)
}

/// `POST /api/auth/register`
#[instrument(skip_all, fields(email = %body.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<Credentials>,
) -> Result<(StatusCode, Json<AccountSnapshot>)> {
    let provider = account_provider(&state, &session).await?;
    let result = provider
        .sign_up(&body.email, body.password.expose_secret())
        .await
        .map(|_| ());

    let snapshot = signed_in(&provider, result).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// `POST /api/auth/login`
#[instrument(skip_all, fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<Credentials>,
) -> Result<Json<AccountSnapshot>> {
    let provider = account_provider(&state, &session).await?;
    let result = provider
        .sign_in(&body.email, body.password.expose_secret())
        .await
        .map(|_| ());

    Ok(Json(signed_in(&provider, result).await?))
}

/// `POST /api/auth/logout`
///
/// Drops the identity and device settings. The guest cart stays in the
/// session.
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
) -> Result<StatusCode> {
    let provider = account_provider(&state, &session).await?;
    provider.sign_out().await?;
    session
        .remove::<serde_json::Value>(session_keys::USER_SETTINGS)
        .await?;

    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

//! Account route handlers.
//!
//! Profile, balance, settings, avatar, addresses, order history and
//! checkout. Everything except `GET /api/account` requires a member.

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{instrument, warn};

use la_red_core::AddressId;

use super::account_provider;
use crate::db::{AddressRepository, OrderRepository, ProfileRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::{
    AccountSnapshot, Address, AddressInput, Order, SettingsUpdate, UserSettings, session_keys,
};
use crate::services::{AccountError, AccountProvider, CheckoutService};
use crate::state::AppState;

/// Checkout body.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub address_id: Option<AddressId>,
}

/// Load the provider, serving partial state when only account rows failed.
async fn initialized(state: &AppState, session: &Session) -> Result<AccountProvider> {
    let provider = account_provider(state, session).await?;
    match provider.initialize().await {
        Ok(()) => {}
        Err(AccountError::Repository(e)) => {
            warn!(error = %e, "Serving account with missing fields");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(provider)
}

/// `GET /api/account`
///
/// Guests get an empty snapshot rather than 401 so clients can probe.
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<AccountSnapshot>> {
    let provider = initialized(&state, &session).await?;
    Ok(Json(provider.snapshot().await))
}

/// `PATCH /api/account/settings`
///
/// Settings live on the device, which for the server is the session.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_settings(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<UserSettings>> {
    let provider = initialized(&state, &session).await?;
    let settings = provider.update_settings(update).await;
    session
        .insert(session_keys::USER_SETTINGS, &settings)
        .await?;
    Ok(Json(settings))
}

/// `POST /api/account/avatar`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn upload_avatar(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    mut multipart: Multipart,
) -> Result<Json<AccountSnapshot>> {
    let provider = initialized(&state, &session).await?;
    if provider.profile().await.is_none() {
        return Err(AppError::Internal("profile unavailable".to_string()));
    }

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        upload = Some((content_type, bytes));
        break;
    }
    let (content_type, bytes) =
        upload.ok_or_else(|| AppError::BadRequest("missing file field".to_string()))?;

    let url = state
        .media()
        .upload_avatar(user.id, &content_type, &bytes)
        .await?;
    ProfileRepository::new(state.pool())
        .set_avatar_url(user.id, &url)
        .await?;
    provider.refresh_profile().await?;

    Ok(Json(provider.snapshot().await))
}

/// `GET /api/account/addresses`
pub async fn addresses(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Address>>> {
    let addresses = AddressRepository::new(state.pool()).list(user.id).await?;
    Ok(Json(addresses))
}

/// `POST /api/account/addresses`
pub async fn create_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(input): Json<AddressInput>,
) -> Result<(StatusCode, Json<Address>)> {
    validate(&input)?;
    let address = AddressRepository::new(state.pool())
        .create(user.id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// `PUT /api/account/addresses/{id}`
pub async fn update_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
    Json(input): Json<AddressInput>,
) -> Result<Json<Address>> {
    validate(&input)?;
    let address = AddressRepository::new(state.pool())
        .update(user.id, id, &input)
        .await?;
    Ok(Json(address))
}

/// `DELETE /api/account/addresses/{id}`
pub async fn delete_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<StatusCode> {
    AddressRepository::new(state.pool())
        .delete(user.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/account/orders`
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(orders))
}

/// `POST /api/checkout`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    body: Option<Json<CheckoutRequest>>,
) -> Result<(StatusCode, Json<Order>)> {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    let order = CheckoutService::new(state.pool())
        .checkout(user.id, body.address_id)
        .await?;

    let order_id = order.id.to_string();
    let total = order.total_tokens.to_string();
    add_breadcrumb(
        "checkout",
        "Order paid",
        Some(&[("order_id", order_id.as_str()), ("total", total.as_str())]),
    );

    Ok((StatusCode::CREATED, Json(order)))
}

fn validate(input: &AddressInput) -> Result<()> {
    input
        .validate()
        .map_err(|field| AppError::BadRequest(format!("{field} is required")))
}

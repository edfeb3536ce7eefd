//! Authenticated user types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use la_red_core::{Email, UserId};

/// A row of `storefront.users`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub created_at: DateTime<Utc>,
}

/// Session-stored user identity.
///
/// Presence of this value in the session is the switch between guest
/// and member mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
        }
    }
}

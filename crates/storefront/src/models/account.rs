//! Account data derived from the signed-in identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use la_red_core::{Tokens, UserId};

use super::user::CurrentUser;

/// A row of `storefront.profiles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Default profile synthesized for a user signing in for the first time.
    #[must_use]
    pub fn default_for(user: &CurrentUser) -> Self {
        Self {
            user_id: user.id,
            username: user.email.local_part().to_string(),
            display_name: None,
            avatar_url: None,
            created_at: Utc::now(),
        }
    }
}

/// A row of `storefront.token_balances`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub user_id: UserId,
    pub balance: Tokens,
}

/// Per-user preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub email_notifications: bool,
    pub newsletter: bool,
    pub theme: String,
    pub language: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            email_notifications: true,
            newsletter: false,
            theme: "dark".to_string(),
            language: "es".to_string(),
        }
    }
}

/// Partial settings; `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SettingsUpdate {
    pub email_notifications: Option<bool>,
    pub newsletter: Option<bool>,
    pub theme: Option<String>,
    pub language: Option<String>,
}

impl UserSettings {
    /// Merge a partial update into these settings.
    pub fn apply(&mut self, update: SettingsUpdate) {
        if let Some(value) = update.email_notifications {
            self.email_notifications = value;
        }
        if let Some(value) = update.newsletter {
            self.newsletter = value;
        }
        if let Some(value) = update.theme {
            self.theme = value;
        }
        if let Some(value) = update.language {
            self.language = value;
        }
    }
}

/// Everything the account provider knows, as returned by `GET /api/account`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccountSnapshot {
    pub user: Option<CurrentUser>,
    pub profile: Option<Profile>,
    pub balance: Tokens,
    pub settings: Option<UserSettings>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_merges_only_present_fields() {
        let mut settings = UserSettings::default();
        settings.apply(SettingsUpdate {
            newsletter: Some(true),
            theme: Some("light".to_string()),
            ..SettingsUpdate::default()
        });

        assert!(settings.newsletter);
        assert_eq!(settings.theme, "light");
        assert!(settings.email_notifications);
        assert_eq!(settings.language, "es");
    }
}

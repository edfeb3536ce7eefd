//! Session and profile provider.
//!
//! [`AccountProvider`] tracks who is signed in and the rows that hang off
//! that identity: profile, token balance and settings. Profile and
//! balance rows are created lazily the first time a user is seen.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use la_red_core::{Tokens, UserId};

use super::auth::{AuthClient, AuthError, AuthEvent};
use crate::db::RepositoryError;
use crate::models::{
    AccountSnapshot, CurrentUser, Profile, SettingsUpdate, TokenBalance, UserSettings,
};

/// Errors surfaced by [`AccountProvider`].
#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Account rows the provider reads and lazily creates.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<Profile>, RepositoryError>;

    /// Insert a profile. A duplicate must return `RepositoryError::Conflict`.
    async fn insert_profile(&self, profile: &Profile) -> Result<(), RepositoryError>;

    async fn fetch_balance(
        &self,
        user_id: UserId,
    ) -> Result<Option<TokenBalance>, RepositoryError>;

    /// Insert a balance. A duplicate must return `RepositoryError::Conflict`.
    async fn insert_balance(&self, balance: &TokenBalance) -> Result<(), RepositoryError>;

    async fn fetch_settings(&self, user_id: UserId) -> Result<UserSettings, RepositoryError>;
}

/// Identity, profile, balance and settings for one visitor.
pub struct AccountProvider {
    auth: Arc<dyn AuthClient>,
    store: Arc<dyn AccountStore>,
    starting_tokens: Tokens,
    saved_settings: Option<UserSettings>,
    state: RwLock<AccountSnapshot>,
}

impl AccountProvider {
    #[must_use]
    pub fn new(auth: Arc<dyn AuthClient>, store: Arc<dyn AccountStore>) -> Self {
        Self {
            auth,
            store,
            starting_tokens: Tokens::ZERO,
            saved_settings: None,
            state: RwLock::new(AccountSnapshot::default()),
        }
    }

    /// Balance given to a user whose balance row does not exist yet.
    #[must_use]
    pub const fn with_starting_tokens(mut self, tokens: Tokens) -> Self {
        self.starting_tokens = tokens;
        self
    }

    /// Settings previously saved on this device. They take precedence
    /// over what the store returns.
    #[must_use]
    pub fn with_saved_settings(mut self, settings: Option<UserSettings>) -> Self {
        self.saved_settings = settings;
        self
    }

    /// Load state for the current session, if any.
    ///
    /// # Errors
    ///
    /// Returns `AccountError` if the session or an account row could not
    /// be read. Fields that failed are left unavailable; the rest are
    /// still populated.
    pub async fn initialize(&self) -> Result<(), AccountError> {
        match self.auth.current_session().await {
            Ok(Some(user)) => self.load_for(user).await,
            Ok(None) => {
                self.clear().await;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to read auth session");
                self.clear().await;
                Err(e.into())
            }
        }
    }

    /// React to auth events until the channel closes.
    pub fn watch(self: Arc<Self>, mut events: broadcast::Receiver<AuthEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        // Failures are already logged by `load_for`.
                        let _ = self.apply(event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Auth event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Apply one auth event to local state.
    ///
    /// The channel carries events from every session, so an event only
    /// takes effect when this provider's own session agrees with it.
    ///
    /// # Errors
    ///
    /// Returns `AccountError` if the session or account rows could not be
    /// read.
    pub async fn apply(&self, event: AuthEvent) -> Result<(), AccountError> {
        match event {
            AuthEvent::SignedIn(user) => {
                let current = self.auth.current_session().await?;
                if current.as_ref().map(|u| u.id) != Some(user.id) {
                    debug!(user_id = %user.id, "Ignoring sign-in from another session");
                    return Ok(());
                }
                self.load_for(user).await
            }
            AuthEvent::SignedOut(user) => {
                let signed_in = self.state.read().await.user.as_ref().map(|u| u.id);
                let event_user = user.map(|u| u.id);
                if event_user
                    .zip(signed_in)
                    .is_some_and(|(theirs, ours)| theirs != ours)
                {
                    debug!(user_id = ?event_user, "Ignoring sign-out from another session");
                    return Ok(());
                }
                if self.auth.current_session().await?.is_none() {
                    self.clear().await;
                }
                Ok(())
            }
        }
    }

    /// Sign in with a password and load the user's account.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Auth` if the credentials are rejected, or
    /// `AccountError::Repository` if account rows could not be loaded.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<CurrentUser, AccountError> {
        let user = self.auth.sign_in_with_password(email, password).await?;
        self.load_for(user.clone()).await?;
        Ok(user)
    }

    /// Register, sign in and provision the new user's account rows.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Auth` if registration is rejected, or
    /// `AccountError::Repository` if account rows could not be created.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<CurrentUser, AccountError> {
        let user = self.auth.sign_up(email, password).await?;
        self.load_for(user.clone()).await?;
        Ok(user)
    }

    /// End the session. Local state is cleared even if the auth client
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Auth` if the session could not be ended.
    pub async fn sign_out(&self) -> Result<(), AccountError> {
        let result = self.auth.sign_out().await;
        self.clear().await;

        result.map_err(|e| {
            warn!(error = %e, "Sign out failed remotely, local state cleared");
            e.into()
        })
    }

    /// Re-read the signed-in user's account rows.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Repository` if a row could not be loaded.
    pub async fn refresh_profile(&self) -> Result<(), AccountError> {
        let user = self.state.read().await.user.clone();
        match user {
            Some(user) => self.load_for(user).await,
            None => Ok(()),
        }
    }

    /// Merge a partial update into the current settings and return them.
    pub async fn update_settings(&self, update: SettingsUpdate) -> UserSettings {
        let mut state = self.state.write().await;
        let settings = state.settings.get_or_insert_with(UserSettings::default);
        settings.apply(update);
        settings.clone()
    }

    pub async fn user(&self) -> Option<CurrentUser> {
        self.state.read().await.user.clone()
    }

    pub async fn profile(&self) -> Option<Profile> {
        self.state.read().await.profile.clone()
    }

    pub async fn balance(&self) -> Tokens {
        self.state.read().await.balance
    }

    pub async fn settings(&self) -> Option<UserSettings> {
        self.state.read().await.settings.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.user.is_some()
    }

    pub async fn snapshot(&self) -> AccountSnapshot {
        self.state.read().await.clone()
    }

    async fn clear(&self) {
        *self.state.write().await = AccountSnapshot::default();
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn load_for(&self, user: CurrentUser) -> Result<(), AccountError> {
        let (profile, balance, settings) = tokio::join!(
            self.profile_or_create(&user),
            self.balance_or_create(&user),
            self.store.fetch_settings(user.id),
        );

        let mut failure = None;
        let profile = degrade(profile, "profile", &mut failure).flatten();
        let balance = degrade(balance, "token balance", &mut failure)
            .flatten()
            .map_or(Tokens::ZERO, |b| b.balance);
        let settings = self
            .saved_settings
            .clone()
            .or_else(|| degrade(settings, "settings", &mut failure));

        *self.state.write().await = AccountSnapshot {
            user: Some(user),
            profile,
            balance,
            settings,
        };

        failure.map_or(Ok(()), |e| Err(e.into()))
    }

    async fn profile_or_create(
        &self,
        user: &CurrentUser,
    ) -> Result<Option<Profile>, RepositoryError> {
        if let Some(profile) = self.store.fetch_profile(user.id).await? {
            return Ok(Some(profile));
        }

        let profile = Profile::default_for(user);
        match self.store.insert_profile(&profile).await {
            Ok(()) => {
                info!(username = %profile.username, "Created profile");
                Ok(Some(profile))
            }
            Err(RepositoryError::Conflict(_)) => {
                debug!("Profile created concurrently, re-fetching");
                self.store.fetch_profile(user.id).await
            }
            Err(e) => Err(e),
        }
    }

    async fn balance_or_create(
        &self,
        user: &CurrentUser,
    ) -> Result<Option<TokenBalance>, RepositoryError> {
        if let Some(balance) = self.store.fetch_balance(user.id).await? {
            return Ok(Some(balance));
        }

        let balance = TokenBalance {
            user_id: user.id,
            balance: self.starting_tokens,
        };
        match self.store.insert_balance(&balance).await {
            Ok(()) => {
                info!(balance = %balance.balance, "Created token balance");
                Ok(Some(balance))
            }
            Err(RepositoryError::Conflict(_)) => {
                debug!("Token balance created concurrently, re-fetching");
                self.store.fetch_balance(user.id).await
            }
            Err(e) => Err(e),
        }
    }
}

/// Log a failed field load and keep the first error.
fn degrade<T>(
    result: Result<T, RepositoryError>,
    field: &str,
    failure: &mut Option<RepositoryError>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            error!(field, error = %e, "Failed to load account field");
            failure.get_or_insert(e);
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::Utc;
    use la_red_core::Email;

    use super::*;

    struct FakeAuth {
        user: Arc<Mutex<Option<CurrentUser>>>,
        fail_sign_out: bool,
        events: broadcast::Sender<AuthEvent>,
    }

    impl FakeAuth {
        fn new(user: Option<CurrentUser>) -> Self {
            Self {
                user: Arc::new(Mutex::new(user)),
                fail_sign_out: false,
                events: broadcast::channel(8).0,
            }
        }
    }

    #[async_trait]
    impl AuthClient for FakeAuth {
        async fn current_session(&self) -> Result<Option<CurrentUser>, AuthError> {
            Ok(self.user.lock().unwrap().clone())
        }

        async fn sign_in_with_password(
            &self,
            email: &str,
            password: &str,
        ) -> Result<CurrentUser, AuthError> {
            if password != "hunter2hunter2" {
                return Err(AuthError::InvalidCredentials);
            }
            let user = member(email);
            *self.user.lock().unwrap() = Some(user.clone());
            Ok(user)
        }

        async fn sign_up(&self, email: &str, password: &str) -> Result<CurrentUser, AuthError> {
            self.sign_in_with_password(email, password).await
        }

        async fn sign_out(&self) -> Result<(), AuthError> {
            if self.fail_sign_out {
                return Err(AuthError::Repository(RepositoryError::Database(
                    sqlx::Error::PoolTimedOut,
                )));
            }
            *self.user.lock().unwrap() = None;
            Ok(())
        }

        fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
            self.events.subscribe()
        }
    }

    #[derive(Default)]
    struct FakeStore {
        profiles: Mutex<HashMap<UserId, Profile>>,
        balances: Mutex<HashMap<UserId, Tokens>>,
        profiles_unavailable: bool,
        // Simulates another request inserting first.
        race_inserts: bool,
    }

    #[async_trait]
    impl AccountStore for FakeStore {
        async fn fetch_profile(&self, user_id: UserId) -> Result<Option<Profile>, RepositoryError> {
            if self.profiles_unavailable {
                return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
            }
            Ok(self.profiles.lock().unwrap().get(&user_id).cloned())
        }

        async fn insert_profile(&self, profile: &Profile) -> Result<(), RepositoryError> {
            let mut profiles = self.profiles.lock().unwrap();
            if self.race_inserts {
                let mut winner = profile.clone();
                winner.username = "winner".to_string();
                profiles.insert(profile.user_id, winner);
            }
            if profiles.contains_key(&profile.user_id) {
                return Err(RepositoryError::Conflict("profile already exists".into()));
            }
            profiles.insert(profile.user_id, profile.clone());
            Ok(())
        }

        async fn fetch_balance(
            &self,
            user_id: UserId,
        ) -> Result<Option<TokenBalance>, RepositoryError> {
            Ok(self
                .balances
                .lock()
                .unwrap()
                .get(&user_id)
                .map(|&balance| TokenBalance { user_id, balance }))
        }

        async fn insert_balance(&self, balance: &TokenBalance) -> Result<(), RepositoryError> {
            let mut balances = self.balances.lock().unwrap();
            if balances.contains_key(&balance.user_id) {
                return Err(RepositoryError::Conflict("balance already exists".into()));
            }
            balances.insert(balance.user_id, balance.balance);
            Ok(())
        }

        async fn fetch_settings(&self, _user_id: UserId) -> Result<UserSettings, RepositoryError> {
            Ok(UserSettings::default())
        }
    }

    fn member(email: &str) -> CurrentUser {
        CurrentUser {
            id: UserId::new(uuid::Uuid::from_u128(7)),
            email: Email::parse(email).unwrap(),
        }
    }

    fn provider(auth: FakeAuth, store: FakeStore) -> AccountProvider {
        AccountProvider::new(Arc::new(auth), Arc::new(store)).with_starting_tokens(Tokens::new(50))
    }

    #[tokio::test]
    async fn test_initialize_without_session() {
        let account = provider(FakeAuth::new(None), FakeStore::default());
        account.initialize().await.unwrap();

        assert!(!account.is_authenticated().await);
        assert_eq!(account.balance().await, Tokens::ZERO);
        assert_eq!(account.profile().await, None);
    }

    #[tokio::test]
    async fn test_first_sign_in_provisions_rows() {
        let store = Arc::new(FakeStore::default());
        let account = AccountProvider::new(Arc::new(FakeAuth::new(None)), store.clone())
            .with_starting_tokens(Tokens::new(50));

        let user = account
            .sign_in("Vecina@LaRed.mx", "hunter2hunter2")
            .await
            .unwrap();

        let profile = account.profile().await.unwrap();
        assert_eq!(profile.username, "vecina");
        assert_eq!(account.balance().await, Tokens::new(50));
        assert_eq!(account.settings().await, Some(UserSettings::default()));
        assert!(store.profiles.lock().unwrap().contains_key(&user.id));
    }

    #[tokio::test]
    async fn test_existing_rows_are_not_overwritten() {
        let user = member("socio@lared.mx");
        let store = FakeStore::default();
        store.balances.lock().unwrap().insert(user.id, Tokens::new(900));
        store.profiles.lock().unwrap().insert(
            user.id,
            Profile {
                user_id: user.id,
                username: "el_socio".to_string(),
                display_name: Some("El Socio".to_string()),
                avatar_url: None,
                created_at: Utc::now(),
            },
        );

        let account = provider(FakeAuth::new(Some(user)), store);
        account.initialize().await.unwrap();

        assert_eq!(account.profile().await.unwrap().username, "el_socio");
        assert_eq!(account.balance().await, Tokens::new(900));
    }

    #[tokio::test]
    async fn test_insert_conflict_refetches() {
        let store = FakeStore {
            race_inserts: true,
            ..FakeStore::default()
        };
        let account = provider(FakeAuth::new(Some(member("a@lared.mx"))), store);

        account.initialize().await.unwrap();
        assert_eq!(account.profile().await.unwrap().username, "winner");
    }

    #[tokio::test]
    async fn test_failed_field_degrades_and_reports() {
        let store = FakeStore {
            profiles_unavailable: true,
            ..FakeStore::default()
        };
        let account = provider(FakeAuth::new(Some(member("a@lared.mx"))), store);

        let err = account.initialize().await.unwrap_err();
        assert!(matches!(err, AccountError::Repository(_)));
        assert!(account.is_authenticated().await);
        assert_eq!(account.profile().await, None);
        assert_eq!(account.balance().await, Tokens::new(50));
    }

    #[tokio::test]
    async fn test_sign_out_clears_even_on_failure() {
        let mut auth = FakeAuth::new(Some(member("a@lared.mx")));
        auth.fail_sign_out = true;
        let account = provider(auth, FakeStore::default());
        account.initialize().await.unwrap();
        assert!(account.is_authenticated().await);

        assert!(account.sign_out().await.is_err());
        assert!(!account.is_authenticated().await);
        assert_eq!(account.balance().await, Tokens::ZERO);
        assert_eq!(account.settings().await, None);
    }

    #[tokio::test]
    async fn test_wrong_password_keeps_guest_state() {
        let account = provider(FakeAuth::new(None), FakeStore::default());
        let err = account.sign_in("a@lared.mx", "nope").await.unwrap_err();

        assert!(matches!(err, AccountError::Auth(AuthError::InvalidCredentials)));
        assert!(!account.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_update_settings_merges() {
        let account = provider(FakeAuth::new(Some(member("a@lared.mx"))), FakeStore::default());
        account.initialize().await.unwrap();

        let settings = account
            .update_settings(SettingsUpdate {
                language: Some("en".to_string()),
                ..SettingsUpdate::default()
            })
            .await;
        assert_eq!(settings.language, "en");
        assert_eq!(settings.theme, "dark");
        assert_eq!(account.settings().await, Some(settings));
    }

    #[tokio::test]
    async fn test_saved_settings_take_precedence() {
        let saved = UserSettings {
            theme: "light".to_string(),
            ..UserSettings::default()
        };
        let account = provider(FakeAuth::new(Some(member("a@lared.mx"))), FakeStore::default())
            .with_saved_settings(Some(saved.clone()));
        account.initialize().await.unwrap();

        assert_eq!(account.settings().await, Some(saved));
    }

    #[tokio::test]
    async fn test_watch_follows_events() {
        let auth = FakeAuth::new(None);
        let events = auth.events.clone();
        let session = auth.user.clone();
        let account = Arc::new(provider(auth, FakeStore::default()));
        let handle = account.clone().watch(events.subscribe());

        let user = member("a@lared.mx");
        *session.lock().unwrap() = Some(user.clone());
        events.send(AuthEvent::SignedIn(user)).unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while !account.is_authenticated().await {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(account.balance().await, Tokens::new(50));

        *session.lock().unwrap() = None;
        events.send(AuthEvent::SignedOut(None)).unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while account.is_authenticated().await {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        handle.abort();
    }

    #[tokio::test]
    async fn test_events_from_other_sessions_are_ignored() {
        let alice = member("alicia@lared.mx");
        let bruno = CurrentUser {
            id: UserId::new(uuid::Uuid::from_u128(8)),
            email: Email::parse("bruno@lared.mx").unwrap(),
        };
        let account = provider(FakeAuth::new(Some(alice.clone())), FakeStore::default());
        account.initialize().await.unwrap();

        account.apply(AuthEvent::SignedIn(bruno.clone())).await.unwrap();
        assert_eq!(account.user().await.map(|u| u.id), Some(alice.id));

        account.apply(AuthEvent::SignedOut(Some(bruno))).await.unwrap();
        account.apply(AuthEvent::SignedOut(None)).await.unwrap();
        assert_eq!(account.user().await.map(|u| u.id), Some(alice.id));

        // Alice signing out on another device leaves this session signed in.
        account.apply(AuthEvent::SignedOut(Some(alice.clone()))).await.unwrap();
        assert_eq!(account.user().await.map(|u| u.id), Some(alice.id));
    }
}

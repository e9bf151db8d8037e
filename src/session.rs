//! ==============================================================================
//! session.rs - operator session manager
//! ==============================================================================
//!
//! purpose:
//!     owns the single operator session of the console. the session lives in
//!     memory and is mirrored into the key-value store so a restart can
//!     rehydrate it.
//!
//! state machine:
//!
//! ```text
//!     Unauthenticated ──login ok──▶ Authenticated
//!            ▲                            │
//!            └──── logout | check fails ──┘
//!
//!     `loading` is only true between construction and `bootstrap()`.
//! ```
//!
//! failure policy:
//!     fails closed. a missing, malformed or expired persisted token (or an
//!     unreadable user record) drops the session, removes the persisted auth
//!     keys and logs why. nothing here panics on bad storage content.
//!
//! relationships:
//!     - uses: token.rs (validate_token), storage.rs (authToken/user/rememberMe)
//!     - used by: context.rs, server.rs (auth gate, login/logout handlers)
//!
//! ==============================================================================

use crate::config::AuthConfig;
use crate::domain::User;
use crate::storage::{
    SharedStore, StorageError, AUTH_KEYS, AUTH_TOKEN_KEY, REMEMBER_ME_KEY, USER_KEY,
};
use crate::token::{now_secs, validate_token, Claims, TokenError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    /// the token was written but did not validate afterwards
    #[error("login rejected: {0}")]
    Rejected(#[from] TokenError),
    #[error("could not persist session: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialField {
    Email,
    Password,
}

/// a login form error tied to the field it should be shown under
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CredentialError {
    pub field: CredentialField,
    pub message: String,
}

impl CredentialError {
    fn new(field: CredentialField, message: &str) -> Self {
        Self { field, message: message.to_string() }
    }
}

/// the mocked credential check behind the login form
///
/// compares against the single demo operator from `[auth]`. never touches
/// session state.
pub fn authenticate_credentials(
    email: &str,
    password: &str,
    auth: &AuthConfig,
) -> Result<User, CredentialError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(CredentialError::new(CredentialField::Email, "Email is required"));
    }
    if !email.contains('@') {
        return Err(CredentialError::new(CredentialField::Email, "Enter a valid email address"));
    }
    if password.is_empty() {
        return Err(CredentialError::new(CredentialField::Password, "Password is required"));
    }
    if !email.eq_ignore_ascii_case(&auth.email) || password != auth.password {
        return Err(CredentialError::new(CredentialField::Password, "Invalid email or password"));
    }
    Ok(User {
        id: Some(auth.user_id.clone()),
        email: auth.email.clone(),
        name: Some(auth.display_name.clone()),
    })
}

pub struct SessionManager {
    store: SharedStore,
    user: Option<User>,
    claims: Option<Claims>,
    loading: bool,
}

impl SessionManager {
    pub fn new(store: SharedStore) -> Self {
        Self { store, user: None, claims: None, loading: true }
    }

    /// one-time startup rehydration from the store
    pub fn bootstrap(&mut self) -> bool {
        self.bootstrap_at(now_secs())
    }

    pub fn bootstrap_at(&mut self, now: u64) -> bool {
        self.loading = true;
        let authenticated = if self.store.get(REMEMBER_ME_KEY).as_deref() == Some("false") {
            tracing::info!("[SESSION] previous session was not remembered, discarding");
            self.clear();
            false
        } else {
            self.check_auth_at(now)
        };
        self.loading = false;
        authenticated
    }

    pub fn check_auth(&mut self) -> bool {
        self.check_auth_at(now_secs())
    }

    /// validate the persisted session at `now` (epoch seconds)
    pub fn check_auth_at(&mut self, now: u64) -> bool {
        match self.load_persisted(now) {
            Ok((claims, user)) => {
                tracing::debug!(email = %user.email, exp = claims.exp, "[SESSION] session valid");
                self.claims = Some(claims);
                self.user = Some(user);
                true
            }
            Err(reason) => {
                if self.user.is_some() || self.store.get(AUTH_TOKEN_KEY).is_some() {
                    tracing::warn!("[SESSION] dropping session: {}", reason);
                }
                self.clear();
                false
            }
        }
    }

    fn load_persisted(&self, now: u64) -> Result<(Claims, User), String> {
        let token = self.store.get(AUTH_TOKEN_KEY).ok_or("no persisted token")?;
        let user_json = self.store.get(USER_KEY).ok_or("no persisted user")?;
        let claims = validate_token(&token, now).map_err(|e| e.to_string())?;
        let user: User = serde_json::from_str(&user_json)
            .map_err(|e| format!("invalid persisted user: {}", e))?;
        Ok((claims, user))
    }

    pub fn login(&mut self, token: &str, user: &User, remember: bool) -> Result<(), LoginError> {
        self.login_at(token, user, remember, now_secs())
    }

    /// persist `token` + `user`, then re-validate what was written
    pub fn login_at(
        &mut self,
        token: &str,
        user: &User,
        remember: bool,
        now: u64,
    ) -> Result<(), LoginError> {
        let user_json = serde_json::to_string(user).map_err(StorageError::from)?;
        self.store.set(AUTH_TOKEN_KEY, token)?;
        self.store.set(USER_KEY, &user_json)?;
        self.store.set(REMEMBER_ME_KEY, if remember { "true" } else { "false" })?;

        if let Err(e) = validate_token(token, now) {
            tracing::warn!(email = %user.email, "[SESSION] login rejected: {}", e);
            self.clear();
            return Err(LoginError::Rejected(e));
        }
        if !self.check_auth_at(now) {
            // stored user record did not round-trip
            return Err(LoginError::Rejected(TokenError::MissingFields("email")));
        }
        tracing::info!(email = %user.email, "[SESSION] logged in");
        Ok(())
    }

    pub fn logout(&mut self) {
        if let Some(user) = &self.user {
            tracing::info!(email = %user.email, "[SESSION] logged out");
        }
        self.clear();
    }

    /// drop in-memory state and every persisted auth key
    fn clear(&mut self) {
        self.user = None;
        self.claims = None;
        for key in AUTH_KEYS {
            if let Err(e) = self.store.remove(key) {
                tracing::error!(key, "[SESSION] failed to clear persisted key: {}", e);
            }
        }
    }

    pub fn state(&self) -> AuthState {
        if self.user.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == AuthState::Authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// expiry of the current session, epoch seconds
    pub fn expires_at(&self) -> Option<u64> {
        self.claims.as_ref().map(|c| c.exp)
    }

    /// whether the in-memory session has outlived its token at `now`
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }
}

//! ==============================================================================
//! context.rs - process-wide application context
//! ==============================================================================
//!
//! purpose:
//!     the single source of truth for session, thresholds, theme, the
//!     population simulator and the public status badge. built once at
//!     startup and handed to the web layer as `SharedContext`.
//!
//! ownership:
//!     each store has exactly one writer method here; everything else reads.
//!     telemetry windows are NOT in here - every mounted view owns its own
//!     generator (see telemetry.rs).
//!
//! relationships:
//!     - built by: main.rs (and the integration tests)
//!     - used by: server.rs (handlers + auth gate)
//!
//! ==============================================================================

use std::sync::Arc;
use tokio::sync::{watch, RwLock};

use crate::analytics::PipelineStatus;
use crate::config::{HostConfig, StorageConfig};
use crate::domain::{Theme, ThresholdSettings, User};
use crate::notify::Notifier;
use crate::session::{authenticate_credentials, CredentialError, LoginError, SessionManager};
use crate::simulation::SimulationState;
use crate::storage::{FileStore, MemoryStore, SharedStore, StorageError};
use crate::theme::ThemeStore;
use crate::thresholds::{ThresholdError, ThresholdStore};
use crate::token::{issue_token, now_secs, Claims};

pub type SharedContext = Arc<RwLock<AppContext>>;

#[derive(Debug, thiserror::Error)]
pub enum LoginFailure {
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error(transparent)]
    Session(#[from] LoginError),
}

pub struct AppContext {
    config: HostConfig,
    notifier: Notifier,
    session: SessionManager,
    thresholds: ThresholdStore,
    theme: ThemeStore,
    simulation: SimulationState,
    public_status: PipelineStatus,
}

/// open the configured store, in-memory when no path is set
pub fn open_store(config: &StorageConfig) -> SharedStore {
    match &config.path {
        Some(path) => {
            tracing::info!("[STORAGE] using {}", path.display());
            Arc::new(FileStore::open(path))
        }
        None => {
            tracing::info!("[STORAGE] using in-memory store (nothing survives a restart)");
            MemoryStore::shared()
        }
    }
}

impl AppContext {
    /// build every store from `store` and rehydrate the session
    pub fn new(config: HostConfig, store: SharedStore) -> Self {
        let notifier = Notifier::new();
        let mut session = SessionManager::new(store.clone());
        let thresholds = ThresholdStore::load(store.clone(), notifier.clone());
        let theme = ThemeStore::load(store, notifier.clone());

        if session.bootstrap() {
            tracing::info!(
                email = session.user().map(|u| u.email.as_str()).unwrap_or_default(),
                "[STARTUP] restored previous session"
            );
        }

        Self {
            config,
            notifier,
            session,
            thresholds,
            theme,
            simulation: SimulationState::new(),
            public_status: PipelineStatus::default(),
        }
    }

    pub fn shared(self) -> SharedContext {
        Arc::new(RwLock::new(self))
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    // --------------------------------------------------------------------------
    // session
    // --------------------------------------------------------------------------

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn user(&self) -> Option<&User> {
        self.session.user()
    }

    /// authenticated and the token has not run out yet
    pub fn has_live_session(&self, now: u64) -> bool {
        self.session.is_authenticated() && !self.session.is_expired_at(now)
    }

    /// re-validate the persisted session, dropping it if it went stale
    pub fn check_auth(&mut self) -> bool {
        let was_authenticated = self.session.is_authenticated();
        let ok = self.session.check_auth();
        if was_authenticated && !ok {
            self.notifier.error("Session Expired", "Please sign in again.");
        }
        ok
    }

    /// the login form path: mocked credential check, token issue, session login
    pub fn login_with_credentials(
        &mut self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<User, LoginFailure> {
        let user = match authenticate_credentials(email, password, &self.config.auth) {
            Ok(user) => user,
            Err(e) => {
                self.notifier.error("Login Failed", e.message.clone());
                return Err(e.into());
            }
        };
        let claims = Claims::for_user(&user, now_secs(), self.config.auth.token_ttl_seconds);
        self.login(&issue_token(&claims), &user, remember)?;
        Ok(user)
    }

    pub fn login(&mut self, token: &str, user: &User, remember: bool) -> Result<(), LoginError> {
        match self.session.login(token, user, remember) {
            Ok(()) => {
                self.notifier.success("Login Successful", format!("Welcome back, {}.", user.display_name()));
                Ok(())
            }
            Err(e) => {
                self.notifier.error("Login Failed", e.to_string());
                Err(e)
            }
        }
    }

    pub fn logout(&mut self) {
        let was_authenticated = self.session.is_authenticated();
        self.session.logout();
        if was_authenticated {
            self.notifier.info("Logged Out", "You have been signed out.");
        }
    }

    // --------------------------------------------------------------------------
    // thresholds & theme
    // --------------------------------------------------------------------------

    pub fn thresholds(&self) -> ThresholdSettings {
        self.thresholds.get()
    }

    pub fn update_thresholds(&mut self, new: ThresholdSettings) -> Result<ThresholdSettings, ThresholdError> {
        self.thresholds.update(new).inspect_err(|e| {
            self.notifier.error("Settings Not Saved", e.to_string());
        })
    }

    pub fn reset_thresholds(&mut self) -> Result<ThresholdSettings, ThresholdError> {
        self.thresholds.reset()
    }

    pub fn subscribe_thresholds(&self) -> watch::Receiver<ThresholdSettings> {
        self.thresholds.subscribe()
    }

    pub fn theme(&self) -> Theme {
        self.theme.get()
    }

    pub fn set_theme(&mut self, raw: &str) -> Result<Theme, StorageError> {
        self.theme.set(raw)
    }

    // --------------------------------------------------------------------------
    // simulator & public status
    // --------------------------------------------------------------------------

    pub fn simulation(&self) -> &SimulationState {
        &self.simulation
    }

    pub fn simulation_mut(&mut self) -> &mut SimulationState {
        &mut self.simulation
    }

    pub fn public_status(&self) -> PipelineStatus {
        self.public_status
    }

    pub fn set_public_status(&mut self, status: PipelineStatus) {
        if status != self.public_status {
            tracing::info!(status = status.label(), "[STATUS] public status changed");
        }
        self.public_status = status;
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NoticeKind;
    use crate::storage::{KeyValueStore, AUTH_KEYS, THRESHOLDS_KEY};

    fn context() -> (SharedStore, AppContext) {
        let store = MemoryStore::shared();
        let ctx = AppContext::new(HostConfig::default(), store.clone());
        (store, ctx)
    }

    #[test]
    fn test_fresh_context() {
        let (_, ctx) = context();
        assert!(!ctx.session().is_authenticated());
        assert!(!ctx.session().is_loading());
        assert_eq!(ctx.thresholds(), ThresholdSettings::default());
        assert_eq!(ctx.theme(), Theme::Dark);
        assert_eq!(ctx.public_status(), PipelineStatus::Operational);
    }

    #[test]
    fn test_corrupt_storage_does_not_break_startup() {
        let store = MemoryStore::shared();
        store.set(THRESHOLDS_KEY, "}}}{{{").unwrap();
        store.set("theme", "purple").unwrap();
        store.set("authToken", "nonsense").unwrap();
        store.set("user", "nonsense").unwrap();

        let ctx = AppContext::new(HostConfig::default(), store.clone());
        assert_eq!(ctx.thresholds(), ThresholdSettings::new(200.0, 80.0, 300.0));
        assert_eq!(ctx.theme(), Theme::Dark);
        assert!(!ctx.session().is_authenticated());
        assert_eq!(store.get("authToken"), None);
    }

    #[test]
    fn test_login_with_credentials_round_trip() {
        let (store, mut ctx) = context();
        let mut notices = ctx.notifier().subscribe();
        let auth = ctx.config().auth.clone();

        let user = ctx.login_with_credentials(&auth.email, &auth.password, true).unwrap();
        assert_eq!(user.email, auth.email);
        assert!(ctx.has_live_session(now_secs()));
        assert_eq!(notices.try_recv().unwrap().title, "Login Successful");

        // the context survives a restart
        let restored = AppContext::new(HostConfig::default(), store.clone());
        assert_eq!(restored.user().map(|u| u.email.clone()), Some(auth.email.clone()));

        ctx.logout();
        assert!(!ctx.session().is_authenticated());
        for key in AUTH_KEYS {
            assert_eq!(store.get(key), None);
        }
        assert!(!ctx.check_auth());
    }

    #[test]
    fn test_wrong_password_leaves_session_alone() {
        let (store, mut ctx) = context();
        let mut notices = ctx.notifier().subscribe();
        let email = ctx.config().auth.email.clone();

        let err = ctx.login_with_credentials(&email, "hunter2", true).unwrap_err();
        assert!(matches!(err, LoginFailure::Credentials(_)));
        assert!(!ctx.session().is_authenticated());
        assert_eq!(store.get("authToken"), None);
        assert_eq!(notices.try_recv().unwrap().kind, NoticeKind::Error);
    }

    #[test]
    fn test_zero_ttl_login_is_rejected() {
        let store = MemoryStore::shared();
        let mut config = HostConfig::default();
        config.auth.token_ttl_seconds = 0;
        let mut ctx = AppContext::new(config.clone(), store);

        let err = ctx
            .login_with_credentials(&config.auth.email, &config.auth.password, true)
            .unwrap_err();
        assert!(matches!(err, LoginFailure::Session(LoginError::Rejected(_))));
        assert!(!ctx.session().is_authenticated());
    }

    #[test]
    fn test_threshold_update_through_context() {
        let (store, mut ctx) = context();
        let mut rx = ctx.subscribe_thresholds();
        let wanted = ThresholdSettings::new(250.0, 90.0, 320.0);
        ctx.update_thresholds(wanted).unwrap();
        assert_eq!(ctx.thresholds(), wanted);
        assert_eq!(*rx.borrow_and_update(), wanted);
        assert!(store.get(THRESHOLDS_KEY).is_some());

        assert!(ctx.update_thresholds(ThresholdSettings::new(1.0, 90.0, 320.0)).is_err());
        assert_eq!(ctx.thresholds(), wanted);

        ctx.reset_thresholds().unwrap();
        assert_eq!(ctx.thresholds(), ThresholdSettings::default());
    }
}

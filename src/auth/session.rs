//! Session lifecycle management.
//!
//! `SessionManager` owns the signed-in state: the bearer token, the account
//! type and the user profile. It acquires tokens at login, refreshes them
//! proactively before expiry and reactively when a request is rejected, and
//! keeps everything persisted through the credential store.
//!
//! Refreshes are single-flight: however many callers notice a stale token at
//! once, exactly one network call is made and every caller resolves to its
//! result. The proactive timer and the request wrapper's reactive path both
//! funnel through the same `refresh`, so they cannot race each other into
//! duplicate calls either.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::api::directory::{AccountDirectory, NewAccount};
use crate::identity::{IdentityProvider, IdentityUser};
use crate::models::{AccountType, UserProfile};

use super::error::AuthError;
use super::store::CredentialStore;
use super::token;

// ============================================================================
// Constants
// ============================================================================

/// Default minimum validity callers need from `ensure_fresh_token`.
pub const DEFAULT_MIN_TOKEN_VALIDITY: Duration = Duration::from_secs(60);

/// Refresh this long before expiry, so requests never race the deadline and
/// a herd of reactive 401-triggered refreshes is avoided.
const PROACTIVE_LEAD_MS: i64 = 120_000;

/// Floor for the proactive delay, avoids refresh storms on short-lived tokens.
const PROACTIVE_FLOOR_MS: i64 = 30_000;

/// Retry delay when the token expiry cannot be decoded.
const PROACTIVE_FALLBACK_MS: u64 = 5_000;

/// Token issuance right after session creation may lag; bounded retries.
const TOKEN_ACQUISITION_ATTEMPTS: u32 = 3;

/// Base delay between token acquisition attempts (linear backoff).
const TOKEN_ACQUISITION_BACKOFF_MS: u64 = 1_000;

/// A restored token with less life than this is refreshed immediately.
const RESTORE_MIN_VALIDITY_MS: i64 = 120_000;

type SharedRefresh = Shared<BoxFuture<'static, Option<String>>>;

/// A live session snapshot.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub account_type: AccountType,
    pub user: UserProfile,
}

/// Authentication status for UI layers.
#[derive(Debug, Clone)]
pub struct AuthStatus {
    pub logged_in: bool,
    pub account_type: Option<AccountType>,
    pub user: Option<UserProfile>,
}

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    account_type: Option<AccountType>,
    user: Option<UserProfile>,
}

struct SessionInner {
    identity: Arc<dyn IdentityProvider>,
    directory: Arc<dyn AccountDirectory>,
    store: CredentialStore,
    state: RwLock<SessionState>,
    /// The in-flight refresh, shared by every concurrent caller.
    refresh: Mutex<Option<SharedRefresh>>,
    /// Generation counter for the proactive timer. Bumping it invalidates
    /// any previously scheduled timer, so at most one can ever fire.
    timer_generation: AtomicU64,
}

/// Cheaply cloneable handle to the shared session state. Construct one at
/// application start and pass it to the API client and anything else that
/// needs authentication.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        directory: Arc<dyn AccountDirectory>,
        store: CredentialStore,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                identity,
                directory,
                store,
                state: RwLock::new(SessionState::default()),
                refresh: Mutex::new(None),
                timer_generation: AtomicU64::new(0),
            }),
        }
    }

    // ===== Session establishment =====

    /// Sign in with email and password.
    ///
    /// Creates an identity session, acquires a bearer token (with bounded
    /// retries, since issuance can lag session creation), resolves the
    /// account type with the backend and persists the composed session.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        info!("Starting login");
        let login = self
            .inner
            .identity
            .login(email, password)
            .await
            .map_err(|err| AuthError::Authentication(err.to_string()))?;

        let token = match login.token {
            Some(token) => token,
            None => self.acquire_token().await?,
        };

        let record = self
            .inner
            .directory
            .resolve_account(&login.user.id, &token)
            .await
            .map_err(|err| AuthError::AccountResolution(err.to_string()))?;

        let user = compose_profile(
            &login.user,
            record.account_type,
            record.entity_id,
            record.name,
            record.entity_data,
        );
        info!(account_type = user.account_type.as_str(), "Login complete");
        Ok(self.adopt_session(token, user).await)
    }

    /// Create a new account: identity account, session, token, then backend
    /// registration.
    ///
    /// If the backend registration fails the identity session is deleted as
    /// a compensating step, so the half-created account does not linger as a
    /// signed-in-but-unregistered session. The rollback itself can fail too;
    /// that leaves an identity account with no platform record, which the
    /// next registration or login attempt has to reconcile.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        account_type: AccountType,
    ) -> Result<Session, AuthError> {
        info!(account_type = account_type.as_str(), "Starting registration");
        self.inner
            .identity
            .create_account(email, password, name)
            .await
            .map_err(|err| AuthError::Authentication(err.to_string()))?;

        let login = self
            .inner
            .identity
            .login(email, password)
            .await
            .map_err(|err| AuthError::Authentication(err.to_string()))?;

        let token = match login.token {
            Some(token) => token,
            None => self.acquire_token().await?,
        };

        let account = NewAccount {
            user_id: login.user.id.clone(),
            email: login.user.email.clone(),
            name: login.user.name.clone(),
            account_type,
        };
        let record = match self.inner.directory.register_account(&account, &token).await {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, "Backend registration failed, rolling back identity session");
                if let Err(rollback) = self.inner.identity.delete_session().await {
                    error!(
                        error = %rollback,
                        "Rollback after failed registration also failed; identity account left without platform record"
                    );
                }
                return Err(AuthError::AccountResolution(err.to_string()));
            }
        };

        let user = compose_profile(
            &login.user,
            account_type,
            record.entity_id,
            record.name,
            record.entity_data,
        );
        info!("Registration complete");
        Ok(self.adopt_session(token, user).await)
    }

    /// Bounded token acquisition: issuance may not succeed immediately after
    /// session creation.
    async fn acquire_token(&self) -> Result<String, AuthError> {
        for attempt in 1..=TOKEN_ACQUISITION_ATTEMPTS {
            match self.inner.identity.issue_token().await {
                Ok(Some(token)) => return Ok(token),
                Ok(None) => debug!(attempt, "No token issued yet"),
                Err(err) => warn!(attempt, error = %err, "Token issuance attempt failed"),
            }
            if attempt < TOKEN_ACQUISITION_ATTEMPTS {
                let backoff = TOKEN_ACQUISITION_BACKOFF_MS * attempt as u64;
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }
        Err(AuthError::TokenAcquisition {
            attempts: TOKEN_ACQUISITION_ATTEMPTS,
        })
    }

    async fn adopt_session(&self, token: String, user: UserProfile) -> Session {
        let account_type = user.account_type;
        {
            let mut state = self.inner.state.write().await;
            state.token = Some(token.clone());
            state.account_type = Some(account_type);
            state.user = Some(user.clone());
        }
        self.inner.store.save(&token, account_type, &user).await;
        self.schedule_proactive_refresh(&token);
        Session {
            token,
            account_type,
            user,
        }
    }

    // ===== Token freshness =====

    /// Return a token with at least `min_validity` of life left, refreshing
    /// if needed. `None` means there is no session, or the refresh failed;
    /// the caller decides whether that is fatal.
    ///
    /// Safe to call from any number of tasks at once: stale tokens trigger a
    /// single shared refresh.
    pub async fn ensure_fresh_token(&self, min_validity: Duration) -> Option<String> {
        let token = self.inner.state.read().await.token.clone()?;
        match token::ms_until_expiry(&token) {
            Some(remaining) if remaining >= min_validity.as_millis() as i64 => Some(token),
            _ => self.refresh().await,
        }
    }

    /// Single-flight token refresh.
    ///
    /// If a refresh is already pending every caller awaits the same shared
    /// future and observes the same resolved value; otherwise a new one is
    /// started. Transient failures come back as `None`, never as an error.
    pub async fn refresh(&self) -> Option<String> {
        let shared = {
            let mut pending = self.inner.refresh.lock().unwrap();
            if let Some(existing) = pending.as_ref() {
                debug!("Refresh already in flight, sharing result");
                existing.clone()
            } else {
                let manager = self.clone();
                let fut: SharedRefresh = async move {
                    let result = manager.run_refresh().await;
                    // Slot must be empty before anyone observes the result,
                    // so the next stale caller starts a fresh attempt.
                    manager.inner.refresh.lock().unwrap().take();
                    result
                }
                .boxed()
                .shared();
                *pending = Some(fut.clone());
                fut
            }
        };
        shared.await
    }

    async fn run_refresh(&self) -> Option<String> {
        debug!("Refreshing access token");

        // The identity session must still be alive; a vanished session means
        // the user is signed out for real.
        match self.inner.identity.current_user().await {
            Ok(Some(_)) => {}
            Ok(None) => {
                info!("Identity session gone, logging out");
                self.logout().await;
                return None;
            }
            Err(err) => {
                warn!(error = %err, "Could not verify identity session, skipping refresh");
                return None;
            }
        }

        match self.inner.identity.issue_token().await {
            Ok(Some(token)) => {
                self.inner.state.write().await.token = Some(token.clone());
                self.inner.store.save_token(&token).await;
                self.schedule_proactive_refresh(&token);
                debug!("Access token refreshed");
                Some(token)
            }
            Ok(None) => {
                warn!("Identity service declined to issue a token");
                None
            }
            Err(err) => {
                warn!(error = %err, "Token refresh failed");
                None
            }
        }
    }

    // ===== Teardown and restore =====

    /// Sign out: best-effort remote invalidation, then unconditional local
    /// teardown.
    pub async fn logout(&self) {
        info!("Logging out");
        if let Err(err) = self.inner.identity.delete_session().await {
            warn!(error = %err, "Remote session invalidation failed");
        }
        self.clear_local().await;
    }

    async fn clear_local(&self) {
        self.cancel_proactive_refresh();
        *self.inner.state.write().await = SessionState::default();
        self.inner.store.clear().await;
    }

    /// Restore a persisted session at process start.
    ///
    /// Adopts whatever storage holds, verifies the identity session is still
    /// alive (anything else fails safe to signed-out) and refreshes the
    /// token if it is close to expiry. Returns whether a session is live.
    pub async fn restore(&self) -> bool {
        let stored = self.inner.store.restore().await;
        let token = stored.token.clone();
        {
            let mut state = self.inner.state.write().await;
            state.token = stored.token;
            state.account_type = stored.account_type;
            state.user = stored.user;
        }
        if let Some(ref token) = token {
            self.schedule_proactive_refresh(token);
        }

        match self.inner.identity.current_user().await {
            Ok(Some(_)) => {}
            Ok(None) => {
                info!("No identity session behind stored credentials, clearing");
                self.clear_local().await;
                return false;
            }
            Err(err) => {
                warn!(error = %err, "Could not verify restored session, clearing");
                self.clear_local().await;
                return false;
            }
        }

        if let Some(ref token) = token {
            if !token::is_fresh(token, RESTORE_MIN_VALIDITY_MS) {
                self.refresh().await;
            }
        }

        self.status().await.logged_in
    }

    // ===== Snapshots =====

    /// Current authentication status snapshot.
    pub async fn status(&self) -> AuthStatus {
        let state = self.inner.state.read().await;
        AuthStatus {
            logged_in: state.token.is_some() && state.user.is_some(),
            account_type: state.account_type,
            user: state.user.clone(),
        }
    }

    /// The current token, fresh or not.
    pub async fn token(&self) -> Option<String> {
        self.inner.state.read().await.token.clone()
    }

    // ===== Proactive refresh =====

    /// Schedule the next proactive refresh, superseding any pending one.
    fn schedule_proactive_refresh(&self, token: &str) {
        let delay = match token::ms_until_expiry(token) {
            Some(remaining) => {
                Duration::from_millis((remaining - PROACTIVE_LEAD_MS).max(PROACTIVE_FLOOR_MS) as u64)
            }
            // Expiry unknown: treat as near-expired and retry shortly.
            None => Duration::from_millis(PROACTIVE_FALLBACK_MS),
        };
        debug!(delay_ms = delay.as_millis() as u64, "Scheduling proactive refresh");

        let generation = self.inner.timer_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else { return };
            if inner.timer_generation.load(Ordering::SeqCst) != generation {
                // Superseded by a newer schedule or a logout.
                return;
            }
            SessionManager { inner }.refresh().await;
        });
    }

    fn cancel_proactive_refresh(&self) {
        self.inner.timer_generation.fetch_add(1, Ordering::SeqCst);
    }
}

fn compose_profile(
    user: &IdentityUser,
    account_type: AccountType,
    entity_id: Option<String>,
    record_name: Option<String>,
    entity_data: serde_json::Map<String, serde_json::Value>,
) -> UserProfile {
    let name = if user.name.is_empty() {
        record_name.unwrap_or_default()
    } else {
        user.name.clone()
    };
    UserProfile {
        user_id: user.id.clone(),
        account_type,
        entity_id,
        name,
        email: user.email.clone(),
        verified: user.verified,
        extra: entity_data,
    }
}

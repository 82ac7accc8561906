//! In-process doubles for the identity service and the account directory,
//! shared by the session manager and API client test modules.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;

use crate::api::directory::{AccountDirectory, AccountRecord, NewAccount};
use crate::api::ApiError;
use crate::identity::{IdentityError, IdentityLogin, IdentityProvider, IdentityUser};
use crate::models::AccountType;

/// Build an unsigned JWT-shaped token expiring `offset_secs` from now
/// (negative for already expired).
pub fn make_token(offset_secs: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let exp = Utc::now().timestamp() + offset_secs;
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, exp));
    format!("{}.{}.sig", header, payload)
}

/// Scripted identity provider. Counters record how often each operation was
/// hit; the issuance queue yields one token per `issue_token` call and
/// `Ok(None)` once exhausted.
pub struct MockIdentity {
    login_token: Option<String>,
    login_fails: bool,
    delete_fails: bool,
    issue_delay: Duration,
    issue_tokens: Mutex<VecDeque<String>>,
    session_alive: AtomicBool,
    login_count: AtomicUsize,
    current_user_count: AtomicUsize,
    issue_count: AtomicUsize,
    delete_count: AtomicUsize,
}

impl MockIdentity {
    pub fn new() -> Self {
        Self {
            login_token: None,
            login_fails: false,
            delete_fails: false,
            issue_delay: Duration::ZERO,
            issue_tokens: Mutex::new(VecDeque::new()),
            session_alive: AtomicBool::new(true),
            login_count: AtomicUsize::new(0),
            current_user_count: AtomicUsize::new(0),
            issue_count: AtomicUsize::new(0),
            delete_count: AtomicUsize::new(0),
        }
    }

    /// Token handed back directly by `login`.
    pub fn with_login_token(mut self, token: String) -> Self {
        self.login_token = Some(token);
        self
    }

    pub fn with_login_failure(mut self) -> Self {
        self.login_fails = true;
        self
    }

    pub fn with_delete_failure(mut self) -> Self {
        self.delete_fails = true;
        self
    }

    /// Successive results for `issue_token`.
    pub fn with_issue_tokens(self, tokens: Vec<String>) -> Self {
        *self.issue_tokens.lock().unwrap() = tokens.into();
        self
    }

    /// Simulated network latency for `issue_token`.
    pub fn with_issue_delay(mut self, delay: Duration) -> Self {
        self.issue_delay = delay;
        self
    }

    /// Invalidate the identity session out from under the client.
    pub fn kill_session(&self) {
        self.session_alive.store(false, Ordering::SeqCst);
    }

    pub fn login_calls(&self) -> usize {
        self.login_count.load(Ordering::SeqCst)
    }

    pub fn current_user_calls(&self) -> usize {
        self.current_user_count.load(Ordering::SeqCst)
    }

    pub fn issue_calls(&self) -> usize {
        self.issue_count.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_count.load(Ordering::SeqCst)
    }

    fn user_for(&self, email: &str) -> IdentityUser {
        IdentityUser {
            id: "u-1".to_string(),
            email: email.to_string(),
            name: "Asha".to_string(),
            verified: true,
        }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn create_account(
        &self,
        email: &str,
        _password: &str,
        _name: &str,
    ) -> Result<IdentityUser, IdentityError> {
        Ok(self.user_for(email))
    }

    async fn login(&self, email: &str, _password: &str) -> Result<IdentityLogin, IdentityError> {
        self.login_count.fetch_add(1, Ordering::SeqCst);
        if self.login_fails {
            return Err(IdentityError::InvalidCredentials("bad password".to_string()));
        }
        self.session_alive.store(true, Ordering::SeqCst);
        Ok(IdentityLogin {
            user: self.user_for(email),
            token: self.login_token.clone(),
        })
    }

    async fn current_user(&self) -> Result<Option<IdentityUser>, IdentityError> {
        self.current_user_count.fetch_add(1, Ordering::SeqCst);
        if self.session_alive.load(Ordering::SeqCst) {
            Ok(Some(self.user_for("asha@example.org")))
        } else {
            Ok(None)
        }
    }

    async fn issue_token(&self) -> Result<Option<String>, IdentityError> {
        self.issue_count.fetch_add(1, Ordering::SeqCst);
        if !self.issue_delay.is_zero() {
            tokio::time::sleep(self.issue_delay).await;
        }
        Ok(self.issue_tokens.lock().unwrap().pop_front())
    }

    async fn delete_session(&self) -> Result<(), IdentityError> {
        self.delete_count.fetch_add(1, Ordering::SeqCst);
        self.session_alive.store(false, Ordering::SeqCst);
        if self.delete_fails {
            Err(IdentityError::ServerError("invalidation failed".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Scripted account directory.
pub struct MockDirectory {
    account_type: AccountType,
    resolve_fails: bool,
    register_fails: bool,
    resolve_count: AtomicUsize,
    register_count: AtomicUsize,
}

impl MockDirectory {
    pub fn new(account_type: AccountType) -> Self {
        Self {
            account_type,
            resolve_fails: false,
            register_fails: false,
            resolve_count: AtomicUsize::new(0),
            register_count: AtomicUsize::new(0),
        }
    }

    pub fn with_resolve_failure(mut self) -> Self {
        self.resolve_fails = true;
        self
    }

    pub fn with_register_failure(mut self) -> Self {
        self.register_fails = true;
        self
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_count.load(Ordering::SeqCst)
    }

    pub fn register_calls(&self) -> usize {
        self.register_count.load(Ordering::SeqCst)
    }

    fn record(&self) -> AccountRecord {
        AccountRecord {
            account_type: self.account_type,
            entity_id: Some("entity-1".to_string()),
            name: Some("Asha".to_string()),
            entity_data: serde_json::Map::new(),
        }
    }
}

#[async_trait]
impl AccountDirectory for MockDirectory {
    async fn resolve_account(&self, _user_id: &str, _token: &str) -> Result<AccountRecord, ApiError> {
        self.resolve_count.fetch_add(1, Ordering::SeqCst);
        if self.resolve_fails {
            return Err(ApiError::ServerError("account lookup failed".to_string()));
        }
        Ok(self.record())
    }

    async fn register_account(
        &self,
        _account: &NewAccount,
        _token: &str,
    ) -> Result<AccountRecord, ApiError> {
        self.register_count.fetch_add(1, Ordering::SeqCst);
        if self.register_fails {
            return Err(ApiError::ServerError("registration rejected".to_string()));
        }
        Ok(self.record())
    }
}

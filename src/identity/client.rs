//! HTTP client for the identity service.
//!
//! All calls are JSON over HTTPS. Unauthenticated calls (account creation,
//! session creation) carry the project header; authenticated calls carry the
//! session header, falling back to the last issued token. The provider
//! session id is persisted through the shared key-value store so a restarted
//! process can resume the same identity session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::auth::store::{KeyValueStore, KEY_IDENTITY_SESSION};
use crate::config::Config;

use super::{IdentityError, IdentityLogin, IdentityProvider, IdentityUser};

/// Project scoping header sent on every call.
const HEADER_PROJECT: &str = "X-Identity-Project";
/// Session header for authenticated calls.
const HEADER_SESSION: &str = "X-Identity-Session";
/// Bearer-token fallback header when no session id is held.
const HEADER_TOKEN: &str = "X-Identity-Token";

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 2;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// A 5xx from the identity service is retried once after this delay.
const SERVER_ERROR_RETRY_MS: u64 = 2000;

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Mutable session state, lazily restored from storage on first use.
#[derive(Default)]
struct SessionState {
    session_id: Option<String>,
    token: Option<String>,
    restored: bool,
}

pub struct IdentityClient {
    client: Client,
    endpoint: String,
    project: String,
    store: Arc<dyn KeyValueStore>,
    state: Mutex<SessionState>,
}

impl IdentityClient {
    pub fn new(config: &Config, store: Arc<dyn KeyValueStore>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.identity_endpoint.trim_end_matches('/').to_string(),
            project: config.identity_project.clone(),
            store,
            state: Mutex::new(SessionState::default()),
        })
    }

    /// Load the persisted session id the first time it is needed.
    async fn session_headers(&self) -> (Option<String>, Option<String>) {
        let mut state = self.state.lock().await;
        if !state.restored {
            state.restored = true;
            match self.store.get(KEY_IDENTITY_SESSION).await {
                Ok(Some(id)) => {
                    debug!("Restored identity session from storage");
                    state.session_id = Some(id);
                }
                Ok(None) => {}
                Err(err) => warn!(error = %err, "Failed to restore identity session"),
            }
        }
        (state.session_id.clone(), state.token.clone())
    }

    async fn adopt_session(&self, session_id: String) {
        self.state.lock().await.session_id = Some(session_id.clone());
        if let Err(err) = self.store.set(KEY_IDENTITY_SESSION, &session_id).await {
            warn!(error = %err, "Failed to persist identity session");
        }
    }

    async fn forget_session(&self) {
        {
            let mut state = self.state.lock().await;
            state.session_id = None;
            state.token = None;
        }
        if let Err(err) = self.store.remove(KEY_IDENTITY_SESSION).await {
            warn!(error = %err, "Failed to clear persisted identity session");
        }
    }

    /// Send one request, retrying on rate limiting and transient server
    /// errors. Returns the status and raw body; endpoint methods interpret
    /// both.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<(StatusCode, String), IdentityError> {
        let url = format!("{}{}", self.endpoint, path);
        let (session_id, token) = self.session_headers().await;

        let mut rate_limit_retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;
        let mut server_error_retried = false;

        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header(HEADER_PROJECT, &self.project);
            if let Some(ref id) = session_id {
                request = request.header(HEADER_SESSION, id);
            } else if let Some(ref token) = token {
                request = request.header(HEADER_TOKEN, token);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();
            debug!(%status, path, "Identity response received");

            match status.as_u16() {
                429 => {
                    rate_limit_retries += 1;
                    if rate_limit_retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(IdentityError::RateLimited);
                    }
                    warn!(path, retry = rate_limit_retries, backoff_ms, "Identity rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
                500..=599 if !server_error_retried => {
                    server_error_retried = true;
                    warn!(path, %status, "Identity server error, retrying once");
                    tokio::time::sleep(Duration::from_millis(SERVER_ERROR_RETRY_MS)).await;
                }
                _ => {
                    let body = response.text().await.unwrap_or_default();
                    return Ok((status, body));
                }
            }
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(
        status: StatusCode,
        body: &str,
    ) -> Result<T, IdentityError> {
        if !status.is_success() {
            return Err(IdentityError::from_status(status, body));
        }
        serde_json::from_str(body)
            .map_err(|err| IdentityError::InvalidResponse(format!("{}: {}", err, body.len())))
    }

    /// Start a password recovery flow; the service mails a secret to the
    /// account address with a link back into the app.
    pub async fn create_recovery(&self, email: &str, redirect_url: &str) -> Result<(), IdentityError> {
        let body = json!({ "email": email, "url": redirect_url });
        let (status, text) = self
            .request(Method::POST, "/account/recovery", Some(&body))
            .await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(IdentityError::from_status(status, &text))
        }
    }

    /// Complete a password recovery with the mailed secret.
    pub async fn complete_recovery(
        &self,
        user_id: &str,
        secret: &str,
        password: &str,
    ) -> Result<(), IdentityError> {
        let body = json!({
            "userId": user_id,
            "secret": secret,
            "password": password,
        });
        let (status, text) = self
            .request(Method::PUT, "/account/recovery", Some(&body))
            .await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(IdentityError::from_status(status, &text))
        }
    }
}

#[async_trait]
impl IdentityProvider for IdentityClient {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<IdentityUser, IdentityError> {
        let body = json!({
            "userId": "unique()",
            "email": email,
            "password": password,
            "name": name,
        });
        let (status, text) = self.request(Method::POST, "/account", Some(&body)).await?;
        Self::parse(status, &text)
    }

    async fn login(&self, email: &str, password: &str) -> Result<IdentityLogin, IdentityError> {
        // Reuse an existing session for the same account; replace any other.
        match self.current_user().await {
            Ok(Some(user)) if user.email == email => {
                debug!("Existing identity session matches, reusing");
                let token = self.state.lock().await.token.clone();
                return Ok(IdentityLogin { user, token });
            }
            Ok(Some(_)) => {
                if let Err(err) = self.delete_session().await {
                    warn!(error = %err, "Could not delete previous identity session");
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "Session probe before login failed");
                self.forget_session().await;
            }
        }

        let body = json!({ "email": email, "password": password });
        let (status, text) = self
            .request(Method::POST, "/account/sessions/email", Some(&body))
            .await?;
        // On this endpoint a 401 means the credentials were wrong, not that
        // some prior session expired.
        if status == StatusCode::UNAUTHORIZED {
            return Err(IdentityError::InvalidCredentials(text));
        }
        let session: SessionResponse = Self::parse(status, &text)?;
        self.adopt_session(session.id).await;

        // Token issuance right after session creation is allowed to fail;
        // the session manager retries it with backoff.
        let token = match self.issue_token().await {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "Token issuance at login failed, deferring");
                None
            }
        };

        let user = match self.current_user().await? {
            Some(user) => user,
            None => return Err(IdentityError::SessionExpired),
        };

        Ok(IdentityLogin { user, token })
    }

    async fn current_user(&self) -> Result<Option<IdentityUser>, IdentityError> {
        let (status, text) = self.request(Method::GET, "/account", None).await?;
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.forget_session().await;
            return Ok(None);
        }
        Self::parse(status, &text).map(Some)
    }

    async fn issue_token(&self) -> Result<Option<String>, IdentityError> {
        let (status, text) = self.request(Method::POST, "/account/token", None).await?;
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(None);
        }
        let parsed: TokenResponse = Self::parse(status, &text)?;
        self.state.lock().await.token = Some(parsed.token.clone());
        Ok(Some(parsed.token))
    }

    async fn delete_session(&self) -> Result<(), IdentityError> {
        let has_session = self.session_headers().await.0.is_some();
        let result = if has_session {
            match self.request(Method::DELETE, "/account/sessions/current", None).await {
                Ok((status, text)) if !status.is_success() => {
                    Err(IdentityError::from_status(status, &text))
                }
                Ok(_) => Ok(()),
                Err(err) => Err(err),
            }
        } else {
            Ok(())
        };
        // Local state goes away no matter what the service said.
        self.forget_session().await;
        result
    }
}

//! Authenticated API client for the RescueLink backend.
//!
//! Every feature call goes through `ApiClient` instead of raw HTTP: it
//! attaches a fresh bearer token, transparently refreshes and retries once
//! when the backend rejects the token, and caches short-lived GET responses.
//!
//! Exactly one retry is attempted per logical request. If the refresh fails,
//! or the retry is rejected again, the session is logged out and the typed
//! authorization error tells the UI layer to send the user back to sign-in.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::{AuthError, SessionManager, DEFAULT_MIN_TOKEN_VALIDITY};
use crate::config::Config;
use crate::models::{Ngo, Report, UserProfile};

use super::cache::ResponseCache;
use super::endpoints;
use super::error::ApiError;

fn is_auth_rejection(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// API client for the RescueLink backend. Share it behind an `Arc`; the
/// underlying `reqwest::Client` already pools connections.
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: SessionManager,
    cache: ResponseCache,
}

impl ApiClient {
    pub fn new(config: &Config, session: SessionManager) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            session,
            cache: ResponseCache::new(),
        })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Start a request against a backend path. Pass the builder to
    /// `execute` for authentication and the retry-once behavior.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    /// Send a request with the current bearer token.
    ///
    /// On 401/403 the token is refreshed (single-flight with every other
    /// caller) and the request retried exactly once. A rejection of the
    /// retry, or a failed refresh, logs the session out and surfaces
    /// `AuthError::Authorization`. Every other status is returned unmodified
    /// for the caller to interpret.
    pub async fn execute(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        // Clone up front; a streaming body cannot be retried.
        let retry_builder = builder.try_clone();

        let token = self.session.ensure_fresh_token(DEFAULT_MIN_TOKEN_VALIDITY).await;
        let mut request = builder;
        if let Some(ref token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !is_auth_rejection(response.status()) {
            return Ok(response);
        }

        debug!(status = %response.status(), "Request rejected, refreshing token for one retry");
        let refreshed = self.session.refresh().await;
        let (Some(fresh), Some(retry)) = (refreshed, retry_builder) else {
            warn!("No refreshed token or request not retryable, logging out");
            self.session.logout().await;
            self.cache.clear();
            return Err(AuthError::Authorization.into());
        };

        let response = retry.bearer_auth(&fresh).send().await?;
        if is_auth_rejection(response.status()) {
            warn!(status = %response.status(), "Still rejected after refresh, logging out");
            self.session.logout().await;
            self.cache.clear();
            return Err(AuthError::Authorization.into());
        }
        Ok(response)
    }

    /// GET a JSON resource, consulting the response cache first.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        if let Some(cached) = self.cache.lookup(&url) {
            debug!(url, "Response cache hit");
            return serde_json::from_str(&cached)
                .map_err(|err| ApiError::InvalidResponse(err.to_string()));
        }

        let response = self.execute(self.client.get(&url)).await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_status(status, &text));
        }

        self.cache.store(&url, &text);
        serde_json::from_str(&text).map_err(|err| ApiError::InvalidResponse(err.to_string()))
    }

    /// POST a JSON body and parse a JSON response. Never cached.
    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let builder = self.client.post(self.url(path)).json(body);
        let response = self.execute(builder).await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_status(status, &text));
        }
        serde_json::from_str(&text).map_err(|err| ApiError::InvalidResponse(err.to_string()))
    }

    // ===== Typed endpoints =====

    /// Fetch the signed-in principal's profile.
    pub async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        self.get_json(endpoints::PROFILE_ME).await
    }

    /// Fetch the reports filed by the signed-in user.
    pub async fn fetch_own_reports(&self) -> Result<Vec<Report>, ApiError> {
        self.get_json(endpoints::OWN_REPORTS).await
    }

    /// Fetch open reports near a location.
    pub async fn fetch_nearby_reports(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<Report>, ApiError> {
        let path = format!(
            "{}?lat={}&lng={}&radius={}",
            endpoints::NEARBY_REPORTS,
            latitude,
            longitude,
            radius_km
        );
        self.get_json(&path).await
    }

    /// Fetch one report by id.
    pub async fn fetch_report(&self, report_id: &str) -> Result<Report, ApiError> {
        self.get_json(&endpoints::report_detail(report_id)).await
    }

    /// Fetch the NGO directory.
    pub async fn fetch_ngos(&self) -> Result<Vec<Ngo>, ApiError> {
        self.get_json(endpoints::NGO_DIRECTORY).await
    }

    /// Register this device for push notifications.
    pub async fn register_device(&self, push_token: &str, platform: &str) -> Result<(), ApiError> {
        let body = serde_json::json!({
            "push_token": push_token,
            "platform": platform,
        });
        let builder = self
            .client
            .post(self.url(endpoints::REGISTER_DEVICE))
            .json(&body);
        let response = self.execute(builder).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &text));
        }
        Ok(())
    }
}

//! Backend account directory.
//!
//! The backend keeps its own record of which identity-service account maps
//! to which platform entity (user or NGO). During login the session manager
//! resolves that record; during registration it creates one. Both calls run
//! before a session exists, so they authenticate with an explicitly passed
//! bearer token instead of going through the request wrapper.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::Config;
use crate::models::AccountType;

use super::endpoints;
use super::error::ApiError;

/// The backend's account record for a signed-in principal.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountRecord {
    pub account_type: AccountType,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub entity_data: serde_json::Map<String, serde_json::Value>,
}

/// Payload for registering a new account with the backend.
#[derive(Debug, Clone, Serialize)]
pub struct NewAccount {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub account_type: AccountType,
}

/// Account resolution operations the session manager depends on.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn resolve_account(&self, user_id: &str, token: &str) -> Result<AccountRecord, ApiError>;

    async fn register_account(
        &self,
        account: &NewAccount,
        token: &str,
    ) -> Result<AccountRecord, ApiError>;
}

pub struct DirectoryClient {
    client: Client,
    base_url: String,
}

impl DirectoryClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_record(
        &self,
        path: &str,
        body: &serde_json::Value,
        token: &str,
    ) -> Result<AccountRecord, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        debug!(%status, path, "Directory response received");
        if !status.is_success() {
            return Err(ApiError::from_status(status, &text));
        }
        serde_json::from_str(&text)
            .map_err(|err| ApiError::InvalidResponse(format!("account record: {}", err)))
    }
}

#[async_trait]
impl AccountDirectory for DirectoryClient {
    async fn resolve_account(&self, user_id: &str, token: &str) -> Result<AccountRecord, ApiError> {
        let body = json!({ "user_id": user_id });
        self.post_record(endpoints::GET_ACCOUNT_TYPE, &body, token).await
    }

    async fn register_account(
        &self,
        account: &NewAccount,
        token: &str,
    ) -> Result<AccountRecord, ApiError> {
        let body = serde_json::to_value(account)
            .map_err(|err| ApiError::InvalidResponse(err.to_string()))?;
        self.post_record(endpoints::REGISTER_ACCOUNT, &body, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn test_config(url: &str) -> Config {
        Config {
            identity_endpoint: String::new(),
            identity_project: String::new(),
            api_base_url: url.to_string(),
            request_timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_resolve_account_parses_record() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/users/auth/get_type")
            .match_header("authorization", "Bearer tok-1")
            .with_status(200)
            .with_body(
                r#"{"success":true,"account_type":"ngo","entity_id":"ngo-3","name":"Paws First","entity_data":{"city":"Pune"}}"#,
            )
            .create_async()
            .await;

        let client = DirectoryClient::new(&test_config(&server.url())).unwrap();
        let record = client.resolve_account("u-1", "tok-1").await.unwrap();
        assert_eq!(record.account_type, AccountType::Ngo);
        assert_eq!(record.entity_id.as_deref(), Some("ngo-3"));
        assert_eq!(record.entity_data["city"], "Pune");
    }

    #[tokio::test]
    async fn test_missing_account_type_is_invalid_response() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/users/auth/get_type")
            .with_status(200)
            .with_body(r#"{"success":false,"error":"no such user"}"#)
            .create_async()
            .await;

        let client = DirectoryClient::new(&test_config(&server.url())).unwrap();
        let err = client.resolve_account("u-1", "tok-1").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }
}

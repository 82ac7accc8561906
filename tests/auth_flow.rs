//! End-to-end session flow against a mock identity service and backend.
//!
//! One mock server plays both roles: identity endpoints under `/account` and
//! backend endpoints under `/users`. The tokens are unsigned JWT-shaped
//! strings with a far-future expiry.

use std::sync::Arc;

use mockito::{Matcher, Server, ServerGuard};

use rescuelink::api::DirectoryClient;
use rescuelink::auth::store::{
    CredentialStore, KEY_ACCESS_TOKEN, KEY_ACCOUNT_TYPE, KEY_IDENTITY_SESSION, KEY_USER_INFO,
};
use rescuelink::auth::{KeyValueStore, MemoryStore};
use rescuelink::identity::IdentityClient;
use rescuelink::{AccountType, ApiClient, Config, SessionManager};

/// `{"exp":9999999999}` - valid until 2286.
const FRESH_TOKEN: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJleHAiOjk5OTk5OTk5OTl9.sig";

fn config_for(server: &ServerGuard) -> Config {
    Config {
        identity_endpoint: server.url(),
        identity_project: "rescuelink-test".to_string(),
        api_base_url: server.url(),
        request_timeout_secs: 5,
    }
}

fn build_session(config: &Config, storage: Arc<MemoryStore>) -> SessionManager {
    let identity = Arc::new(IdentityClient::new(config, storage.clone()).unwrap());
    let directory = Arc::new(DirectoryClient::new(config).unwrap());
    let store = CredentialStore::new(storage);
    SessionManager::new(identity, directory, store)
}

#[tokio::test]
async fn login_then_authenticated_request() {
    let mut server = Server::new_async().await;

    // Login probe: no identity session yet.
    server
        .mock("GET", "/account")
        .match_header("X-Identity-Session", Matcher::Missing)
        .with_status(401)
        .with_body("{}")
        .create_async()
        .await;
    server
        .mock("POST", "/account/sessions/email")
        .match_header("X-Identity-Project", "rescuelink-test")
        .with_status(201)
        .with_body(r#"{"id":"sess-1"}"#)
        .create_async()
        .await;
    let token_mock = server
        .mock("POST", "/account/token")
        .match_header("X-Identity-Session", "sess-1")
        .with_status(201)
        .with_body(format!(r#"{{"token":"{}"}}"#, FRESH_TOKEN))
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/account")
        .match_header("X-Identity-Session", "sess-1")
        .with_status(200)
        .with_body(r#"{"id":"u-1","email":"asha@example.org","name":"Asha","emailVerification":true}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/users/auth/get_type")
        .match_header("authorization", format!("Bearer {}", FRESH_TOKEN).as_str())
        .with_status(200)
        .with_body(r#"{"account_type":"user","entity_id":"e-1","name":"Asha"}"#)
        .create_async()
        .await;
    let profile_mock = server
        .mock("GET", "/users/profile/me/")
        .match_header("authorization", format!("Bearer {}", FRESH_TOKEN).as_str())
        .with_status(200)
        .with_body(r#"{"user_id":"u-1","account_type":"user","name":"Asha","email":"asha@example.org","verified":true}"#)
        .expect(1)
        .create_async()
        .await;

    let config = config_for(&server);
    let storage = Arc::new(MemoryStore::new());
    let session = build_session(&config, storage.clone());

    let established = session.login("asha@example.org", "pw").await.unwrap();
    assert_eq!(established.account_type, AccountType::User);
    assert_eq!(established.token, FRESH_TOKEN);
    assert_eq!(established.user.email, "asha@example.org");

    // Within the validity window the cached token is returned without
    // another issuance call.
    let token = session
        .ensure_fresh_token(rescuelink::auth::DEFAULT_MIN_TOKEN_VALIDITY)
        .await
        .unwrap();
    assert_eq!(token, FRESH_TOKEN);
    token_mock.assert_async().await;

    // The wrapper attaches the token to backend calls.
    let api = ApiClient::new(&config, session.clone()).unwrap();
    let profile = api.fetch_profile().await.unwrap();
    assert_eq!(profile.user_id, "u-1");
    profile_mock.assert_async().await;

    // The session landed in persistent storage.
    assert_eq!(
        storage.get(KEY_ACCESS_TOKEN).await.unwrap().as_deref(),
        Some(FRESH_TOKEN)
    );
    assert_eq!(
        storage.get(KEY_IDENTITY_SESSION).await.unwrap().as_deref(),
        Some("sess-1")
    );
}

#[tokio::test]
async fn restore_then_logout_clears_storage_despite_remote_failure() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/account")
        .match_header("X-Identity-Session", "sess-9")
        .with_status(200)
        .with_body(r#"{"id":"u-1","email":"asha@example.org","name":"Asha"}"#)
        .create_async()
        .await;
    let delete_mock = server
        .mock("DELETE", "/account/sessions/current")
        .with_status(400)
        .with_body(r#"{"message":"already gone"}"#)
        .expect(1)
        .create_async()
        .await;

    // Storage as a previous run would have left it.
    let storage = Arc::new(MemoryStore::new());
    storage.set(KEY_ACCESS_TOKEN, FRESH_TOKEN).await.unwrap();
    storage.set(KEY_ACCOUNT_TYPE, "user").await.unwrap();
    storage
        .set(
            KEY_USER_INFO,
            r#"{"user_id":"u-1","account_type":"user","name":"Asha","email":"asha@example.org","verified":true}"#,
        )
        .await
        .unwrap();
    storage.set(KEY_IDENTITY_SESSION, "sess-9").await.unwrap();

    let config = config_for(&server);
    let session = build_session(&config, storage.clone());

    assert!(session.restore().await);
    assert_eq!(session.status().await.account_type, Some(AccountType::User));

    // Remote invalidation fails; local state must still be gone.
    session.logout().await;
    delete_mock.assert_async().await;
    assert!(!session.status().await.logged_in);
    assert!(storage.get(KEY_ACCESS_TOKEN).await.unwrap().is_none());
    assert!(storage.get(KEY_IDENTITY_SESSION).await.unwrap().is_none());
}

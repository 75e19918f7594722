//! lazy-traveler REST client
//!
//! Talks to the account and chat-history endpoints of the backend.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use lt_core::config::ApiConfig;
use lt_core::history::{ChatRecord, HistorySource, SessionSummary};

use crate::error::{ApiError, Result};
use crate::models::{
    LoginRequest, LogoutRequest, PasswordChange, Profile, SignupRequest, TagsBody, TagsResponse,
    Tokens, validate_tags,
};

/// REST API client
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    /// Create a new client against `base_url` (e.g. `https://api.lazy-traveler.store`)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        Self::new(&config.base_url, config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Install (or drop) the bearer token used by authenticated calls
    pub fn set_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = token;
        }
    }

    pub fn has_token(&self) -> bool {
        self.token().is_some()
    }

    fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Add the authorization header; fails early when no token is installed
    fn add_auth(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token().ok_or(ApiError::NotSignedIn)?;
        Ok(request.bearer_auth(token))
    }

    /// Map non-success statuses to errors, surfacing the backend's message
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!("Backend rejected credentials: {}", status);
            return Err(ApiError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .or_else(|| v.get("detail"))
                    .and_then(|m| m.as_str())
                    .map(String::from)
            })
            .unwrap_or(body);

        warn!("API request failed: {} - {}", status, message);
        Err(ApiError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let response = Self::check(response).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// Exchange credentials for a JWT pair
    pub async fn login(&self, username: &str, password: &str) -> Result<Tokens> {
        debug!("Logging in as {}", username);

        let response = self
            .client
            .post(self.url("/accounts/login/"))
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let tokens: Tokens = Self::json(response).await?;
        self.set_token(Some(tokens.access.clone()));
        info!("Logged in as {}", username);
        Ok(tokens)
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<()> {
        request.validate()?;
        debug!("Signing up {}", request.username);

        let response = self
            .client
            .post(self.url("/accounts/signup/"))
            .json(request)
            .send()
            .await?;

        Self::check(response).await?;
        info!("Signed up {}", request.username);
        Ok(())
    }

    /// Blacklist the refresh token server-side and forget the access token
    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        let response = self
            .add_auth(self.client.post(self.url("/accounts/logout/")))?
            .json(&LogoutRequest { refresh_token })
            .send()
            .await?;

        Self::check(response).await?;
        self.set_token(None);
        Ok(())
    }

    pub async fn get_tags(&self) -> Result<Vec<String>> {
        let response = self
            .add_auth(self.client.get(self.url("/accounts/update_tags/")))?
            .send()
            .await?;

        let body: TagsResponse = Self::json(response).await?;
        Ok(body.tags)
    }

    pub async fn update_tags(&self, tags: &[String]) -> Result<()> {
        validate_tags(tags)?;

        let response = self
            .add_auth(self.client.put(self.url("/accounts/update_tags/")))?
            .json(&TagsBody {
                tags: tags.to_vec(),
            })
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    pub async fn update_password(&self, change: &PasswordChange) -> Result<()> {
        change.validate()?;

        let response = self
            .add_auth(self.client.post(self.url("/accounts/update_password/")))?
            .json(change)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    pub async fn delete_account(&self) -> Result<()> {
        let response = self
            .add_auth(self.client.delete(self.url("/accounts/delete_account/")))?
            .send()
            .await?;

        Self::check(response).await?;
        self.set_token(None);
        info!("Account deleted");
        Ok(())
    }

    pub async fn my_page(&self) -> Result<Profile> {
        let response = self
            .add_auth(self.client.get(self.url("/accounts/mypage/")))?
            .send()
            .await?;

        Self::json(response).await
    }

    /// Session list of the signed-in user, newest first
    pub async fn chat_history(&self) -> Result<Vec<SessionSummary>> {
        let response = self
            .add_auth(self.client.get(self.url("/chatbot/chat_history/")))?
            .send()
            .await?;

        Self::json(response).await
    }

    /// Every exchange of one session, oldest first
    pub async fn session_history(&self, session_id: &str) -> Result<Vec<ChatRecord>> {
        let response = self
            .add_auth(self.client.get(self.url("/chatbot/chat_history/")))?
            .query(&[("session_id", session_id)])
            .send()
            .await?;

        Self::json(response).await
    }
}

#[async_trait]
impl HistorySource for ApiClient {
    async fn fetch_index(&self) -> lt_core::Result<Vec<SessionSummary>> {
        Ok(self.chat_history().await?)
    }

    async fn fetch_session(&self, session_id: &str) -> lt_core::Result<Vec<ChatRecord>> {
        Ok(self.session_history(session_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_login_stores_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts/login/"))
            .and(body_json(json!({"username": "kim", "password": "pw"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access": "acc", "refresh": "ref"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let tokens = client.login("kim", "pw").await.unwrap();

        assert_eq!(tokens, Tokens { access: "acc".into(), refresh: "ref".into() });
        assert!(client.has_token());
    }

    #[tokio::test]
    async fn test_login_failure_surfaces_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts/login/"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"detail": "No active account"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        match client.login("kim", "bad").await {
            Err(ApiError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "No active account");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!client.has_token());
    }

    #[tokio::test]
    async fn test_authenticated_call_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/mypage/"))
            .and(header("authorization", "Bearer acc"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"username": "kim", "tags": "카페,한식"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.set_token(Some("acc".into()));
        let profile = client.my_page().await.unwrap();

        assert_eq!(profile.username, "kim");
        assert_eq!(profile.tags, vec!["카페", "한식"]);
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_reauth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chatbot/chat_history/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.set_token(Some("expired".into()));

        assert!(matches!(client.chat_history().await, Err(ApiError::Unauthorized)));
        let core_err: lt_core::Error = client.fetch_index().await.unwrap_err();
        assert!(matches!(core_err, lt_core::Error::Unauthorized));
    }

    #[tokio::test]
    async fn test_missing_token_fails_without_request() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        assert!(matches!(client.get_tags().await, Err(ApiError::NotSignedIn)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_history_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chatbot/chat_history/"))
            .and(query_param("session_id", "abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"user_id": 1, "message": "안녕", "response": "반가워요", "created_at": "2025-03-01T12:00:00Z", "session_id": "abc123"}
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.set_token(Some("acc".into()));
        let records = client.fetch_session("abc123").await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].response, "반가워요");
    }

    #[tokio::test]
    async fn test_chat_history_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chatbot/chat_history/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"session_id": "b", "first_message": "둘째", "created_at": "2025-03-02T12:00:00Z"},
                {"session_id": "a", "first_message": "첫째", "created_at": "2025-03-01T12:00:00Z"}
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.set_token(Some("acc".into()));
        let sessions = client.chat_history().await.unwrap();

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_id, "b");
    }

    #[tokio::test]
    async fn test_session_not_found_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chatbot/chat_history/"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"error": "no such session"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.set_token(Some("acc".into()));
        let err = client.session_history("nope").await.unwrap_err();
        assert_eq!(err.to_string(), "API error (404): no such session");
    }

    #[tokio::test]
    async fn test_update_tags_validates_locally() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        client.set_token(Some("acc".into()));

        assert!(matches!(client.update_tags(&[]).await, Err(ApiError::Validation(_))));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_tags_sends_joined_string() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/accounts/update_tags/"))
            .and(body_json(json!({"tags": "공원,서점"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.set_token(Some("acc".into()));
        client
            .update_tags(&["공원".to_string(), "서점".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_logout_posts_refresh_token_and_clears() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts/logout/"))
            .and(body_json(json!({"refresh_token": "ref"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "bye"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.set_token(Some("acc".into()));
        client.logout("ref").await.unwrap();
        assert!(!client.has_token());
    }

    #[tokio::test]
    async fn test_delete_account() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/accounts/delete_account/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "done"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.set_token(Some("acc".into()));
        client.delete_account().await.unwrap();
        assert!(!client.has_token());
    }
}

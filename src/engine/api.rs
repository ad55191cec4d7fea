//! Zefest API Module
//! Bearer-token HTTP client for the Zefest backend with one-shot token refresh
//! and backend error message normalisation

use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::engine::config::ApiConfig;
use crate::engine::session::{self, AuthResponse, User};
use crate::engine::storage::{KeyValueStore, StorageError};

pub const FALLBACK_ERROR_MESSAGE: &str = "Une erreur est survenue. Veuillez réessayer.";

const REFRESH_PATH: &str = "/auth/token/refresh/";
const CLIENT_USER_AGENT: &str = "Zefest-Client";

/// Body fields searched, in order, for a human readable backend message
const MESSAGE_FIELDS: [&str; 4] = ["details", "error", "detail", "message"];

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("{message}")]
    Backend { status: u16, message: String },
    #[error("Session expired")]
    SessionExpired,
    #[error("Invalid response body: {0}")]
    DecodeError(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

impl ApiError {
    /// Message suitable for a toast notification
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Backend { message, .. } => message.clone(),
            _ => FALLBACK_ERROR_MESSAGE.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Backend { status, .. } => Some(*status),
            ApiError::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email_or_phone: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: String,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Extract the message shown to the user from a backend error body.
///
/// Looks at `details`, `error`, `detail` and `message` in that order, skipping
/// empty values, then accepts a bare string body, else returns the fallback.
pub fn normalize_error_message(body: &Value) -> String {
    if let Value::Object(map) = body {
        for field in MESSAGE_FIELDS {
            match map.get(field) {
                None | Some(Value::Null) | Some(Value::Bool(false)) => continue,
                Some(Value::String(s)) if s.is_empty() => continue,
                Some(Value::String(s)) => return s.clone(),
                Some(other) => return other.to_string(),
            }
        }
        return FALLBACK_ERROR_MESSAGE.to_string();
    }

    match body {
        Value::String(s) if !s.is_empty() => s.clone(),
        _ => FALLBACK_ERROR_MESSAGE.to_string(),
    }
}

pub struct ApiClient {
    base_url: String,
    http_client: reqwest::Client,
    store: Arc<dyn KeyValueStore>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_default();
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client,
            store,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn send(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut request = self
            .http_client
            .request(method.clone(), self.url(path))
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT);

        if let Some(token) = session::access_token(self.store.as_ref()) {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        Ok(request.send().await?)
    }

    /// Send a request, refreshing the access token once on a 401
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ApiError> {
        let mut response = self.send(&method, path, body).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            info!(%method, path, "access token rejected, refreshing");
            self.refresh_access_token().await?;
            response = self.send(&method, path, body).await?;
        }

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let body: Value = serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
            let message = normalize_error_message(&body);
            warn!(%method, path, status = status.as_u16(), "backend error: {}", message);
            return Err(ApiError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        if bytes.is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Any failure clears the session.
    pub async fn refresh_access_token(&self) -> Result<String, ApiError> {
        let store = self.store.as_ref();
        let Some(refresh) = session::refresh_token(store) else {
            warn!("no refresh token stored, ending session");
            session::logout(store)?;
            return Err(ApiError::SessionExpired);
        };

        let outcome = self
            .http_client
            .post(self.url(REFRESH_PATH))
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .json(&json!({ "refresh": refresh }))
            .send()
            .await;

        let refreshed = match outcome {
            Ok(response) if response.status().is_success() => {
                response.json::<RefreshResponse>().await.ok()
            }
            Ok(response) => {
                debug!(status = response.status().as_u16(), "token refresh rejected");
                None
            }
            Err(e) => {
                debug!("token refresh failed: {}", e);
                None
            }
        };

        match refreshed {
            Some(RefreshResponse { access }) => {
                session::store_access_token(store, &access)?;
                Ok(access)
            }
            None => {
                warn!("token refresh failed, ending session");
                session::logout(store)?;
                Err(ApiError::SessionExpired)
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ApiError> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ApiError> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn patch<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ApiError> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    /// Log in and persist the returned session
    pub async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, ApiError> {
        let body = serde_json::to_value(credentials)?;
        let auth: AuthResponse = self.post("/auth/login", &body).await?;
        session::save_auth(self.store.as_ref(), &auth)?;
        Ok(auth)
    }

    pub async fn me(&self) -> Result<User, ApiError> {
        self.get("/auth/me").await
    }

    pub async fn settings(&self) -> Result<Value, ApiError> {
        self.get("/mobcash/setting").await
    }

    pub async fn mark_notification_read(&self, notification_id: u64) -> Result<Value, ApiError> {
        self.patch(
            &format!("/mobcash/notification/{}/", notification_id),
            &json!({ "is_read": true }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::storage::MemoryStore;

    #[test]
    fn test_message_priority() {
        let body = json!({ "message": "m", "detail": "d", "error": "e" });
        assert_eq!(normalize_error_message(&body), "e");

        let body = json!({ "details": "first", "error": "e" });
        assert_eq!(normalize_error_message(&body), "first");

        let body = json!({ "details": "", "detail": "Token invalide" });
        assert_eq!(normalize_error_message(&body), "Token invalide");
    }

    #[test]
    fn test_message_non_string_field() {
        let body = json!({ "error": ["Montant trop faible"] });
        assert_eq!(normalize_error_message(&body), r#"["Montant trop faible"]"#);
    }

    #[test]
    fn test_message_fallbacks() {
        assert_eq!(normalize_error_message(&json!("plain text")), "plain text");
        assert_eq!(normalize_error_message(&json!({ "code": 3 })), FALLBACK_ERROR_MESSAGE);
        assert_eq!(normalize_error_message(&Value::Null), FALLBACK_ERROR_MESSAGE);
    }

    #[test]
    fn test_url_joining() {
        let config = ApiConfig {
            base_url: "http://localhost:8000/".to_string(),
            request_timeout_secs: 5,
        };
        let client = ApiClient::new(&config, Arc::new(MemoryStore::new()));
        assert_eq!(client.url("/auth/me"), "http://localhost:8000/auth/me");
        assert_eq!(client.url("auth/me"), "http://localhost:8000/auth/me");
    }

    #[test]
    fn test_user_message() {
        let err = ApiError::Backend {
            status: 400,
            message: "Solde insuffisant".to_string(),
        };
        assert_eq!(err.user_message(), "Solde insuffisant");
        assert_eq!(err.status(), Some(400));
        assert_eq!(ApiError::SessionExpired.user_message(), FALLBACK_ERROR_MESSAGE);
    }
}

//! Login and token refresh calls
//!
//! Both are JSON POSTs relative to the API base URL:
//! 1. Login: `{email, password}` → `{access, refresh}`
//! 2. Refresh: `{refresh}` → `{access}` (optionally a rotated `refresh`)
//!
//! Neither call retries. A failed login is reported to the caller; what a
//! failed refresh means for the session is decided by the session manager.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{DEFAULT_AUTH_TIMEOUT, LOGIN_PATH, REFRESH_PATH};
use crate::error::{AuthError, Result};
use crate::tokens::TokenPair;

/// Response from the refresh endpoint.
///
/// Backends that rotate refresh tokens also return a new `refresh`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

/// Client for the backend token endpoints.
#[derive(Debug, Clone)]
pub struct AuthEndpoints {
    client: reqwest::Client,
    base_url: String,
    login_path: String,
    refresh_path: String,
    timeout: Duration,
}

impl AuthEndpoints {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            login_path: LOGIN_PATH.to_string(),
            refresh_path: REFRESH_PATH.to_string(),
            timeout: DEFAULT_AUTH_TIMEOUT,
        }
    }

    pub fn with_paths(mut self, login_path: impl Into<String>, refresh_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self.refresh_path = refresh_path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange email and password for a token pair.
    ///
    /// Any non-2xx answer is a rejected login.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair> {
        let response = self
            .client
            .post(self.url(&self.login_path))
            .timeout(self.timeout)
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(|e| AuthError::NetworkFailure(format!("login request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(AuthError::InvalidCredentials(format!(
                "login endpoint returned {status}: {}",
                error_detail(&body)
            )));
        }

        debug!(%status, "login endpoint accepted credentials");
        response
            .json::<TokenPair>()
            .await
            .map_err(|e| AuthError::MalformedToken(format!("invalid login response: {e}")))
    }

    /// Trade a refresh token for a new access token.
    pub async fn refresh(&self, refresh: &str) -> Result<RefreshResponse> {
        let response = self
            .client
            .post(self.url(&self.refresh_path))
            .timeout(self.timeout)
            .json(&RefreshRequest { refresh })
            .send()
            .await
            .map_err(|e| AuthError::NetworkFailure(format!("token refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(AuthError::RefreshFailed(format!(
                "refresh endpoint returned {status}: {}",
                error_detail(&body)
            )));
        }

        response
            .json::<RefreshResponse>()
            .await
            .map_err(|e| AuthError::MalformedToken(format!("invalid refresh response: {e}")))
    }
}

/// The backend reports errors as `{"detail": "..."}`; fall back to the raw body.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("detail")?.as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Json;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use tokio::net::TcpListener;

    use super::*;

    #[derive(Clone, Default)]
    struct Backend {
        refresh_calls: Arc<AtomicUsize>,
    }

    async fn login_handler(Json(body): Json<serde_json::Value>) -> (StatusCode, Json<serde_json::Value>) {
        if body["email"] == "ada@example.com" && body["password"] == "hunter2" {
            (
                StatusCode::OK,
                Json(serde_json::json!({"access": "at_1", "refresh": "rt_1"})),
            )
        } else {
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "detail": "No active account found with the given credentials"
                })),
            )
        }
    }

    async fn refresh_handler(
        State(backend): State<Backend>,
        Json(body): Json<serde_json::Value>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
        match body["refresh"].as_str() {
            Some("rt_1") => (StatusCode::OK, Json(serde_json::json!({"access": "at_2"}))),
            Some("rt_rotating") => (
                StatusCode::OK,
                Json(serde_json::json!({"access": "at_3", "refresh": "rt_3"})),
            ),
            Some("rt_garbled") => (StatusCode::OK, Json(serde_json::json!({"token": "x"}))),
            _ => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"detail": "Token is invalid or expired"})),
            ),
        }
    }

    async fn start_backend() -> (String, Backend) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let backend = Backend::default();

        let app = axum::Router::new()
            .route("/api/token_obtain_pair/", post(login_handler))
            .route("/api/token/refresh/", post(refresh_handler))
            .with_state(backend.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/api"), backend)
    }

    #[tokio::test]
    async fn login_returns_token_pair() {
        let (base, _) = start_backend().await;
        let endpoints = AuthEndpoints::new(reqwest::Client::new(), base);

        let pair = endpoints.login("ada@example.com", "hunter2").await.unwrap();
        assert_eq!(pair.access, "at_1");
        assert_eq!(pair.refresh, "rt_1");
    }

    #[tokio::test]
    async fn login_rejection_carries_backend_detail() {
        let (base, _) = start_backend().await;
        let endpoints = AuthEndpoints::new(reqwest::Client::new(), base);

        let err = endpoints.login("ada@example.com", "wrong").await.unwrap_err();
        match err {
            AuthError::InvalidCredentials(msg) => {
                assert!(msg.contains("401"), "got: {msg}");
                assert!(msg.contains("No active account"), "got: {msg}");
            }
            other => panic!("expected InvalidCredentials, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn login_unreachable_is_network_failure() {
        let endpoints = AuthEndpoints::new(reqwest::Client::new(), "http://127.0.0.1:1/api")
            .with_timeout(Duration::from_secs(2));

        let err = endpoints.login("ada@example.com", "hunter2").await.unwrap_err();
        assert!(matches!(err, AuthError::NetworkFailure(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn refresh_returns_new_access_token() {
        let (base, backend) = start_backend().await;
        let endpoints = AuthEndpoints::new(reqwest::Client::new(), format!("{base}/"));

        let response = endpoints.refresh("rt_1").await.unwrap();
        assert_eq!(response.access, "at_2");
        assert!(response.refresh.is_none());
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_accepts_rotated_refresh_token() {
        let (base, _) = start_backend().await;
        let endpoints = AuthEndpoints::new(reqwest::Client::new(), base);

        let response = endpoints.refresh("rt_rotating").await.unwrap();
        assert_eq!(response.access, "at_3");
        assert_eq!(response.refresh.as_deref(), Some("rt_3"));
    }

    #[tokio::test]
    async fn refresh_rejection_is_refresh_failed() {
        let (base, _) = start_backend().await;
        let endpoints = AuthEndpoints::new(reqwest::Client::new(), base);

        let err = endpoints.refresh("rt_revoked").await.unwrap_err();
        match err {
            AuthError::RefreshFailed(msg) => {
                assert!(msg.contains("400"), "got: {msg}");
                assert!(msg.contains("Token is invalid or expired"), "got: {msg}");
            }
            other => panic!("expected RefreshFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparseable_refresh_body_is_malformed() {
        let (base, _) = start_backend().await;
        let endpoints = AuthEndpoints::new(reqwest::Client::new(), base);

        let err = endpoints.refresh("rt_garbled").await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn custom_paths_are_used() {
        let (base, _) = start_backend().await;
        let root = base.trim_end_matches("/api").to_string();
        let endpoints = AuthEndpoints::new(reqwest::Client::new(), root)
            .with_paths("/api/token_obtain_pair/", "/api/token/refresh/");

        assert!(endpoints.login("ada@example.com", "hunter2").await.is_ok());
        assert!(endpoints.refresh("rt_1").await.is_ok());
    }

    #[test]
    fn error_detail_falls_back_to_raw_body() {
        assert_eq!(error_detail(r#"{"detail":"nope"}"#), "nope");
        assert_eq!(error_detail("<html>502</html>"), "<html>502</html>");
        assert_eq!(error_detail(r#"{"email":["required"]}"#), r#"{"email":["required"]}"#);
    }
}

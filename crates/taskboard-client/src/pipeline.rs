//! Authenticated request pipeline
//!
//! `attempt → on 401 → refresh → retry once`. The token is fetched lazily:
//! a locally valid access token is sent as-is and only a 401 (or local
//! expiry) triggers a refresh. A failure to obtain a token, or a second 401
//! after a successful refresh, ends the session and redirects to login.
//! Every other failure is returned untouched and never retried.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use taskboard_session::SessionManager;
use tracing::{debug, instrument, warn};

use crate::error::{RequestError, Result};
use crate::redirect::{LoginRedirect, NoopRedirect};
use crate::request::{ApiRequest, ApiResponse};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn new_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().as_simple())
}

/// Sends API requests on behalf of one session.
pub struct RequestPipeline {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    session: Arc<SessionManager>,
    redirect: Arc<dyn LoginRedirect>,
}

impl RequestPipeline {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, session: Arc<SessionManager>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            session,
            redirect: Arc::new(NoopRedirect),
        }
    }

    pub fn with_redirect(mut self, redirect: Arc<dyn LoginRedirect>) -> Self {
        self.redirect = redirect;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Send `request` with the session's bearer token.
    #[instrument(skip_all, fields(request_id = %new_request_id(), method = %request.method, path = %request.path))]
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let started = Instant::now();
        let result = self.send_with_retry(request).await;

        let status = match &result {
            Ok(response) => response.status.as_u16().to_string(),
            Err(e) => e.metric_label(),
        };
        crate::metrics::record_request(&status, request.method.as_str(), started.elapsed().as_secs_f64());
        result
    }

    async fn send_with_retry(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let epoch = self.session.epoch();
        let token = match self.session.ensure_fresh_token().await {
            Ok(token) => token,
            Err(e) => return Err(self.end_session(epoch, RequestError::Auth(e))),
        };

        let response = self.dispatch(request, &token).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return into_result(response);
        }

        debug!("request rejected with 401, refreshing token");
        crate::metrics::record_auth_retry();
        let token = match self.session.refresh_rejected(&token).await {
            Ok(token) => token,
            Err(e) => return Err(self.end_session(epoch, RequestError::Auth(e))),
        };

        let retried = self.dispatch(request, &token).await?;
        if retried.status == StatusCode::UNAUTHORIZED {
            warn!("request still unauthorized after token refresh");
            return Err(self.end_session(epoch, RequestError::Unauthorized));
        }
        into_result(retried)
    }

    /// Log out and send the user to login. Returns `error` for the caller.
    ///
    /// Concurrent failures of one session redirect once; a failure from a
    /// session that a newer login replaced changes nothing.
    fn end_session(&self, epoch: u64, error: RequestError) -> RequestError {
        if !self.session.end(epoch) {
            debug!(error = %error, "session already ended");
            return error;
        }
        let reason = match &error {
            RequestError::Unauthorized => "unauthorized",
            _ => "auth_error",
        };
        warn!(error = %error, "session ended, redirecting to login");
        self.redirect.redirect_to_login(&error.to_string());
        crate::metrics::record_session_ended(reason);
        error
    }

    async fn dispatch(&self, request: &ApiRequest, token: &str) -> Result<ApiResponse> {
        let url = self.url(&request.path);
        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .bearer_auth(token)
            .timeout(self.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                RequestError::Transport(format!(
                    "request timed out after {}s",
                    self.timeout.as_secs()
                ))
            } else {
                RequestError::Transport(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| RequestError::Transport(format!("reading response body: {e}")))?;
        debug!(%status, bytes = body.len(), "response received");

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn into_result(response: ApiResponse) -> Result<ApiResponse> {
    if response.status.is_success() {
        Ok(response)
    } else {
        Err(RequestError::Api {
            status: response.status.as_u16(),
            body: response.text(),
        })
    }
}

//! Authenticated request gateway.
//!
//! Every call to the backend goes through [`ApiClient::request`] (JSON) or
//! [`ApiClient::request_multipart`] (uploads). A 401 on a call that is not
//! `skip_auth` joins the session's single in-flight refresh, and on success
//! the original call is replayed exactly once. If refresh fails, or the replay
//! is still unauthorized, the session is terminated and the caller gets
//! [`ApiError::Unauthorized`].

use std::sync::Arc;
use std::time::Duration;

use futures::future::FutureExt;
use reqwest::header::{self, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::error::{ApiError, RefreshFailure, REQUEST_FAILED, UPLOAD_FAILED};
use super::transport::{HttpRequest, HttpResponse, MultipartPayload, RequestBody, ReqwestTransport, Transport};
use crate::auth::{LogoutReason, Navigator, SessionContext};
use crate::config::{Config, CredentialMode};
use crate::models::auth::{AuthResponse, RefreshRequest};

// ============================================================================
// Constants
// ============================================================================

/// Path of the refresh endpoint, relative to the API base URL.
pub(crate) const REFRESH_PATH: &str = "/auth/refresh";

/// Default bound on a single refresh exchange, in seconds.
const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 30;

/// Per-call knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    /// Surface 401 as a plain `ApiError::Request` instead of refreshing.
    /// Used by login/register/logout and by the refresh call itself.
    pub skip_auth: bool,
}

impl RequestOptions {
    pub fn skip_auth() -> Self {
        Self { skip_auth: true }
    }
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Base URL including the API prefix, e.g. `http://localhost:8080/api/v1`
    pub base_url: String,
    pub credential_mode: CredentialMode,
    pub refresh_timeout: Duration,
}

impl ClientSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential_mode: CredentialMode::Cookie,
            refresh_timeout: Duration::from_secs(DEFAULT_REFRESH_TIMEOUT_SECS),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.api_url(),
            credential_mode: config.credential_mode,
            refresh_timeout: Duration::from_secs(config.refresh_timeout_secs),
        }
    }
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    session: SessionContext,
    settings: ClientSettings,
}

/// API client for the learning-management backend.
/// Clone is cheap - clones share the transport, the session and its refresh state.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, session: SessionContext, settings: ClientSettings) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                session,
                settings,
            }),
        }
    }

    /// Build a reqwest-backed client from configuration
    pub fn from_config(config: &Config, navigator: Arc<dyn Navigator>) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self::new(
            Arc::new(transport),
            SessionContext::new(navigator),
            ClientSettings::from_config(config),
        ))
    }

    pub fn session(&self) -> &SessionContext {
        &self.inner.session
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.inner.settings
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.inner.settings.base_url, endpoint)
    }

    // ===== Gateway =====

    /// Perform one logical JSON request.
    ///
    /// A 204 or empty body deserializes from `null`, so `T = ()` or
    /// `T = Option<_>` accept no-content responses.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let request = HttpRequest::new(method, self.url(endpoint), body);
        let response = self.execute(request, options).await?;
        Self::decode(response, REQUEST_FAILED)
    }

    /// Same protocol as [`request`](Self::request), with a multipart payload.
    /// The payload is already in memory, so the replay sends identical bytes.
    pub async fn request_multipart<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        payload: MultipartPayload,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let request = HttpRequest::new(Method::POST, self.url(endpoint), RequestBody::Multipart(payload));
        let response = self.execute(request, options).await?;
        Self::decode(response, UPLOAD_FAILED)
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.request(Method::GET, endpoint, RequestBody::Empty, RequestOptions::default())
            .await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(Method::POST, endpoint, RequestBody::json(body)?, RequestOptions::default())
            .await
    }

    pub async fn post_empty<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.request(Method::POST, endpoint, RequestBody::Empty, RequestOptions::default())
            .await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(Method::PUT, endpoint, RequestBody::json(body)?, RequestOptions::default())
            .await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(Method::PATCH, endpoint, RequestBody::json(body)?, RequestOptions::default())
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.request(Method::DELETE, endpoint, RequestBody::Empty, RequestOptions::default())
            .await
    }

    /// Send `request`, recovering from one authorization failure.
    /// At most two network attempts: the original and one replay.
    async fn execute(&self, request: HttpRequest, options: RequestOptions) -> Result<HttpResponse, ApiError> {
        let mut refreshed = false;

        loop {
            debug!(method = %request.method, url = %request.url, retry = refreshed, "Sending request");
            let response = self.send_once(&request).await?;

            if response.status != StatusCode::UNAUTHORIZED || options.skip_auth {
                return Ok(response);
            }

            if refreshed {
                warn!(url = %request.url, "Still unauthorized after refresh, ending session");
                self.inner.session.terminate(LogoutReason::Rejected);
                return Err(ApiError::Unauthorized);
            }

            debug!(url = %request.url, "Unauthorized, refreshing session");
            if let Err(reason) = self.refresh().await {
                debug!(url = %request.url, %reason, "Refresh failed, giving up on request");
                return Err(ApiError::Unauthorized);
            }
            refreshed = true;
        }
    }

    /// One network exchange with credentials attached, no recovery.
    async fn send_once(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let attempt = self.authorize(request)?;
        Ok(self.inner.transport.send(&attempt).await?)
    }

    /// Attach the bearer credential when running in bearer mode.
    fn authorize(&self, request: &HttpRequest) -> Result<HttpRequest, ApiError> {
        let mut attempt = request.clone();
        if self.inner.settings.credential_mode == CredentialMode::Bearer {
            if let Some(tokens) = self.inner.session.tokens() {
                let value = HeaderValue::from_str(&format!("Bearer {}", tokens.access_token))
                    .map_err(|e| ApiError::InvalidCredential(e.to_string()))?;
                attempt.headers.insert(header::AUTHORIZATION, value);
            }
        }
        Ok(attempt)
    }

    fn decode<T: DeserializeOwned>(response: HttpResponse, fallback: &str) -> Result<T, ApiError> {
        if !response.status.is_success() {
            return Err(ApiError::from_status(response.status, &response.body, fallback));
        }
        if response.status == StatusCode::NO_CONTENT || response.body.iter().all(u8::is_ascii_whitespace) {
            return serde_json::from_value(serde_json::Value::Null)
                .map_err(|e| ApiError::InvalidResponse(format!("expected a body: {}", e)));
        }
        serde_json::from_slice(&response.body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    // ===== Refresh =====

    /// Public refresh primitive. Joins a refresh already in flight, otherwise
    /// starts one. A failed refresh has already terminated the session.
    pub async fn refresh_session(&self) -> Result<(), ApiError> {
        self.refresh().await.map_err(|_| ApiError::Unauthorized)
    }

    async fn refresh(&self) -> Result<(), RefreshFailure> {
        let client = self.clone();
        self.inner
            .session
            .run_refresh(move || {
                async move {
                    let outcome = client.perform_refresh().await;
                    if let Err(ref reason) = outcome {
                        warn!(%reason, "Session refresh failed");
                        client.inner.session.terminate(LogoutReason::RefreshFailed);
                    }
                    outcome
                }
                .boxed()
            })
            .await
    }

    /// Run the exchange and apply its result to the session. Nothing is
    /// applied to a session that has ended in the meantime.
    async fn perform_refresh(&self) -> Result<(), RefreshFailure> {
        let auth = self.refresh_exchange().await?;
        let session = &self.inner.session;
        // A logout that landed while the exchange was in flight wins.
        if let Some(tokens) = auth.token_pair() {
            if !session.rotate_tokens(tokens) {
                debug!("Session cleared during refresh, rotated credential discarded");
            }
        }
        if let Some(ms) = auth.expires_in {
            session.renew(Duration::from_millis(ms));
        }
        debug!(expires_in_ms = auth.expires_in, "Session refreshed");
        Ok(())
    }

    /// The single network exchange behind a refresh, bounded by the refresh
    /// timeout. It goes straight to `send_once` (the skip-auth path), so a 401
    /// here is a failure and never another refresh.
    pub(crate) async fn refresh_exchange(&self) -> Result<AuthResponse, RefreshFailure> {
        let body = match (self.inner.settings.credential_mode, self.inner.session.tokens()) {
            (CredentialMode::Bearer, Some(tokens)) => RequestBody::json(&RefreshRequest {
                refresh_token: &tokens.refresh_token,
            })
            .map_err(|e| RefreshFailure::Network(e.to_string()))?,
            _ => RequestBody::Empty,
        };
        let request = HttpRequest::new(Method::POST, self.url(REFRESH_PATH), body);

        let response = tokio::time::timeout(
            self.inner.settings.refresh_timeout,
            self.send_once(&request),
        )
        .await
        .map_err(|_| RefreshFailure::TimedOut)?
        .map_err(|e| RefreshFailure::Network(e.to_string()))?;

        if !response.status.is_success() {
            return Err(RefreshFailure::Rejected(response.status));
        }

        // Cookie mode answers with at most `expiresIn`; tolerate any body.
        Ok(serde_json::from_slice(&response.body).unwrap_or_default())
    }
}

//! Shared test helpers for the `#[cfg(test)]` modules in this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use reqwest::StatusCode;

use crate::api::client::REFRESH_PATH;
use crate::api::error::TransportError;
use crate::api::transport::{HttpRequest, HttpResponse, MultipartPayload, RequestBody, Transport};
use crate::api::{ApiClient, ClientSettings};
use crate::auth::{LogoutReason, Navigator, SessionContext};
use crate::config::CredentialMode;
use crate::models::User;

pub const TEST_BASE_URL: &str = "http://backend.test/api/v1";

#[derive(Debug, Clone)]
enum ReplyKind {
    Respond(StatusCode, String),
    Unreachable,
    Hang,
}

/// A canned answer for one route.
#[derive(Debug, Clone)]
pub struct Reply {
    kind: ReplyKind,
    delay: Duration,
}

impl Reply {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            kind: ReplyKind::Respond(
                StatusCode::from_u16(status).expect("valid status"),
                body.to_string(),
            ),
            delay: Duration::ZERO,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            kind: ReplyKind::Unreachable,
            delay: Duration::ZERO,
        }
    }

    /// Never answers.
    pub fn hang() -> Self {
        Self {
            kind: ReplyKind::Hang,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }
}

struct Route {
    reply: Reply,
    // Answer 401 until a refresh has succeeded.
    until_refreshed: bool,
}

/// In-process backend: routes by path, records every request it sees.
/// A 2xx answer on the refresh path flips `refreshed`.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, Route>>,
    log: Mutex<Vec<HttpRequest>>,
    pub refreshed: AtomicBool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, path: &str, reply: Reply) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            Route {
                reply,
                until_refreshed: false,
            },
        );
    }

    pub fn until_refreshed(&self, path: &str, reply: Reply) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            Route {
                reply,
                until_refreshed: true,
            },
        );
    }

    fn path_of(url: &str) -> String {
        url.strip_prefix(TEST_BASE_URL).unwrap_or(url).to_string()
    }

    fn requests(&self, path: &str) -> Vec<HttpRequest> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| Self::path_of(&r.url) == path)
            .cloned()
            .collect()
    }

    pub fn calls(&self, path: &str) -> usize {
        self.requests(path).len()
    }

    pub fn total_calls(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn methods(&self, path: &str) -> Vec<reqwest::Method> {
        self.requests(path).into_iter().map(|r| r.method).collect()
    }

    pub fn json_bodies(&self, path: &str) -> Vec<serde_json::Value> {
        self.requests(path)
            .into_iter()
            .filter_map(|r| match r.body {
                RequestBody::Json(bytes) => serde_json::from_slice(&bytes).ok(),
                _ => None,
            })
            .collect()
    }

    pub fn multipart_bodies(&self, path: &str) -> Vec<MultipartPayload> {
        self.requests(path)
            .into_iter()
            .filter_map(|r| match r.body {
                RequestBody::Multipart(payload) => Some(payload),
                _ => None,
            })
            .collect()
    }

    pub fn authorization_headers(&self, path: &str) -> Vec<String> {
        self.requests(path)
            .into_iter()
            .filter_map(|r| {
                r.headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.log.lock().unwrap().push(request.clone());
        let path = Self::path_of(&request.url);

        let route = {
            let routes = self.routes.lock().unwrap();
            routes.get(&path).map(|r| (r.reply.clone(), r.until_refreshed))
        };
        let Some((reply, until_refreshed)) = route else {
            return Ok(HttpResponse::new(StatusCode::NOT_FOUND, r#"{"message":"Not found"}"#));
        };

        if until_refreshed && !self.refreshed.load(Ordering::SeqCst) {
            return Ok(HttpResponse::new(StatusCode::UNAUTHORIZED, ""));
        }

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }

        match reply.kind {
            ReplyKind::Respond(status, body) => {
                if path == REFRESH_PATH && status.is_success() {
                    self.refreshed.store(true, Ordering::SeqCst);
                }
                Ok(HttpResponse::new(status, body))
            }
            ReplyKind::Unreachable => Err(TransportError::Connect("connection refused".to_string())),
            ReplyKind::Hang => std::future::pending().await,
        }
    }
}

/// Navigator that remembers every redirect.
#[derive(Default)]
pub struct RecordingNavigator {
    reasons: Mutex<Vec<LogoutReason>>,
}

impl RecordingNavigator {
    pub fn count(&self) -> usize {
        self.reasons.lock().unwrap().len()
    }

    pub fn reasons(&self) -> Vec<LogoutReason> {
        self.reasons.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect_to_login(&self, reason: LogoutReason) {
        self.reasons.lock().unwrap().push(reason);
    }
}

pub fn test_user() -> User {
    User {
        id: 42,
        email: "learner@example.com".to_string(),
        name: "Learner".to_string(),
        avatar_url: None,
        provider: Some("local".to_string()),
    }
}

/// Cookie-mode client over `transport` with a recording navigator.
pub fn test_client(transport: Arc<ScriptedTransport>) -> (ApiClient, Arc<RecordingNavigator>) {
    test_client_with_mode(transport, CredentialMode::Cookie)
}

pub fn test_client_with_mode(
    transport: Arc<ScriptedTransport>,
    mode: CredentialMode,
) -> (ApiClient, Arc<RecordingNavigator>) {
    let navigator = Arc::new(RecordingNavigator::default());
    let session = SessionContext::new(navigator.clone());
    let mut settings = ClientSettings::new(TEST_BASE_URL);
    settings.credential_mode = mode;
    (ApiClient::new(transport, session, settings), navigator)
}

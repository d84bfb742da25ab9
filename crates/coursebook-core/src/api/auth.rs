//! Session-establishing calls: login, register, logout, and identity checks.

use std::time::Duration;

use reqwest::Method;
use tracing::{debug, info, warn};

use super::client::{ApiClient, RequestOptions};
use super::error::ApiError;
use super::transport::RequestBody;
use crate::auth::LogoutReason;
use crate::models::{AuthResponse, LoginRequest, RegisterRequest, TokenPair, User};

impl ApiClient {
    /// Log in and establish the session from the response.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let body = RequestBody::json(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let response: AuthResponse = self
            .request(Method::POST, "/auth/login", body, RequestOptions::skip_auth())
            .await?;
        self.establish_from(response)
    }

    pub async fn register(&self, email: &str, password: &str, name: &str) -> Result<User, ApiError> {
        let body = RequestBody::json(&RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
        })?;
        let response: AuthResponse = self
            .request(Method::POST, "/auth/register", body, RequestOptions::skip_auth())
            .await?;
        self.establish_from(response)
    }

    fn establish_from(&self, response: AuthResponse) -> Result<User, ApiError> {
        let tokens = response.token_pair();
        let user = response
            .user
            .ok_or_else(|| ApiError::InvalidResponse("auth response without user".to_string()))?;
        let expires_in = response.expires_in.map(Duration::from_millis);
        self.session().establish(user.clone(), expires_in, tokens);
        info!(user_id = user.id, "Logged in");
        Ok(user)
    }

    /// Resume a bearer-mode session from a stored refresh credential: refresh
    /// first, then confirm the identity. The deadline from the refresh applies
    /// once the identity is known.
    pub async fn resume(&self, refresh_token: &str) -> Result<User, ApiError> {
        self.session().store_tokens(TokenPair {
            access_token: String::new(),
            refresh_token: refresh_token.to_string(),
        });
        let auth = match self.refresh_exchange().await {
            Ok(auth) => auth,
            Err(reason) => {
                debug!(%reason, "Stored credential not accepted");
                self.session().clear();
                return Err(ApiError::Unauthorized);
            }
        };
        if let Some(tokens) = auth.token_pair() {
            self.session().store_tokens(tokens);
        }

        let user = self.me().await?;
        if let Some(ms) = auth.expires_in {
            self.session().renew(Duration::from_millis(ms));
        }
        Ok(user)
    }

    /// Current identity (`GET /auth/me`). Goes through the normal 401 recovery.
    pub async fn me(&self) -> Result<User, ApiError> {
        let user: User = self.get("/auth/me").await?;
        self.session().set_user(Some(user.clone()));
        Ok(user)
    }

    /// App-start verification: `true` when the server still recognises the session.
    pub async fn check_auth(&self) -> bool {
        match self.me().await {
            Ok(user) => {
                debug!(user_id = user.id, "Session verified");
                true
            }
            Err(e) => {
                debug!(error = %e, "Not authenticated");
                self.session().clear();
                false
            }
        }
    }

    /// Tell the server to drop the session, then always clear local state and
    /// navigate. Sent `skip_auth` so an expired session is not refreshed just to end it.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result: Result<serde_json::Value, ApiError> = self
            .request(Method::POST, "/auth/logout", RequestBody::Empty, RequestOptions::skip_auth())
            .await;
        if let Err(ref e) = result {
            warn!(error = %e, "Server logout failed, clearing local session anyway");
        }
        self.session().terminate(LogoutReason::SignedOut);
        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::api::client::REFRESH_PATH;
    use crate::api::ApiError;
    use crate::auth::LogoutReason;
    use crate::config::CredentialMode;
    use crate::testutil::{test_client, test_client_with_mode, Reply, ScriptedTransport};

    const LOGIN_OK: &str = r#"{"tokenType":"Bearer","expiresIn":900000,"user":{"id":7,"email":"ada@example.com","name":"Ada","provider":"local"}}"#;

    #[tokio::test(start_paused = true)]
    async fn test_login_establishes_session() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("/auth/login", Reply::json(200, LOGIN_OK));
        let (client, _) = test_client(transport.clone());

        let user = client.login("ada@example.com", "secret").await.unwrap();

        assert_eq!(user.id, 7);
        assert!(client.session().is_authenticated());
        assert_eq!(
            client.session().snapshot().remaining(),
            Some(std::time::Duration::from_secs(900))
        );
        let sent = transport.json_bodies("/auth/login").pop().unwrap();
        assert_eq!(sent["email"], "ada@example.com");
    }

    #[tokio::test]
    async fn test_bad_credentials_do_not_refresh() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("/auth/login", Reply::json(401, r#"{"message":"Invalid email or password"}"#));
        let (client, navigator) = test_client(transport.clone());

        let err = client.login("ada@example.com", "wrong").await.unwrap_err();

        assert_eq!(err.to_string(), "Invalid email or password");
        assert_eq!(transport.calls(REFRESH_PATH), 0);
        assert_eq!(navigator.count(), 0);
        assert!(!client.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_register_posts_name() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("/auth/register", Reply::json(200, LOGIN_OK));
        let (client, _) = test_client(transport.clone());

        client.register("ada@example.com", "secret", "Ada").await.unwrap();

        let sent = transport.json_bodies("/auth/register").pop().unwrap();
        assert_eq!(sent["name"], "Ada");
        assert!(client.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_check_auth_failure_clears_state() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("/auth/me", Reply::json(401, ""));
        transport.on(REFRESH_PATH, Reply::json(401, ""));
        let (client, _) = test_client(transport);
        client.session().establish(crate::testutil::test_user(), None, None);

        assert!(!client.check_auth().await);
        assert!(!client.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_check_auth_success_sets_user() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("/auth/me", Reply::json(200, r#"{"id":7,"email":"ada@example.com","name":"Ada"}"#));
        let (client, _) = test_client(transport);

        assert!(client.check_auth().await);
        assert_eq!(client.session().user().unwrap().id, 7);
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_server_fails() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("/auth/logout", Reply::unreachable());
        let (client, navigator) = test_client(transport.clone());
        client.session().establish(crate::testutil::test_user(), None, None);

        let result = client.logout().await;

        assert!(matches!(result, Err(ApiError::Network(_))));
        assert!(!client.session().is_authenticated());
        assert_eq!(navigator.reasons(), vec![LogoutReason::SignedOut]);
        assert_eq!(transport.calls(REFRESH_PATH), 0);
    }

    #[tokio::test]
    async fn test_resume_bearer_session() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(REFRESH_PATH, Reply::json(200, r#"{"accessToken":"a2","refreshToken":"r2","expiresIn":60000}"#));
        transport.on("/auth/me", Reply::json(200, r#"{"id":7,"email":"ada@example.com","name":"Ada"}"#));
        let (client, _) = test_client_with_mode(transport.clone(), CredentialMode::Bearer);

        let user = client.resume("stored-refresh").await.unwrap();

        assert_eq!(user.id, 7);
        assert_eq!(transport.json_bodies(REFRESH_PATH)[0]["refreshToken"], "stored-refresh");
        assert_eq!(transport.authorization_headers("/auth/me"), vec!["Bearer a2".to_string()]);
        assert_eq!(client.session().tokens().unwrap().refresh_token, "r2");
        assert!(client.session().expires_at().is_some());
    }

    #[tokio::test]
    async fn test_resume_with_rejected_credential() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(REFRESH_PATH, Reply::json(401, r#"{"message":"Invalid refresh token"}"#));
        let (client, navigator) = test_client_with_mode(transport.clone(), CredentialMode::Bearer);

        let err = client.resume("stale-refresh").await.unwrap_err();

        assert!(err.is_unauthorized());
        assert!(client.session().tokens().is_none());
        assert!(!client.session().is_authenticated());
        assert_eq!(transport.calls("/auth/me"), 0);
        assert_eq!(navigator.count(), 0);
    }
}

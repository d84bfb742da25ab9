use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    #[serde(rename = "avatarUrl", default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

impl User {
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            self.email.clone()
        } else {
            format!("{} <{}>", self.name, self.email)
        }
    }
}

/// Body of `/auth/login`, `/auth/register` and `/auth/refresh`.
///
/// In cookie mode the server strips both tokens and only `expiresIn`/`user`
/// survive, so every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(rename = "accessToken", default)]
    pub access_token: Option<String>,
    #[serde(rename = "refreshToken", default)]
    pub refresh_token: Option<String>,
    #[serde(rename = "tokenType", default)]
    pub token_type: Option<String>,
    /// Milliseconds until the access credential expires
    #[serde(rename = "expiresIn", default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub user: Option<User>,
}

impl AuthResponse {
    pub fn token_pair(&self) -> Option<TokenPair> {
        match (&self.access_token, &self.refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Some(TokenPair {
                    access_token: access.clone(),
                    refresh_token: refresh.clone(),
                })
            }
            _ => None,
        }
    }
}

/// Access + refresh credential pair, only held in bearer mode.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    pub refresh_token: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_mode_auth_response() {
        let json = r#"{"tokenType":"Bearer","expiresIn":900000,"user":{"id":3,"email":"a@b.c","name":"Ada","provider":"local"}}"#;
        let resp: AuthResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.expires_in, Some(900_000));
        assert!(resp.token_pair().is_none());
        assert_eq!(resp.user.unwrap().display_name(), "Ada <a@b.c>");
    }

    #[test]
    fn test_bearer_mode_auth_response() {
        let json = r#"{"accessToken":"acc","refreshToken":"ref","expiresIn":1000}"#;
        let resp: AuthResponse = serde_json::from_str(json).unwrap();
        let pair = resp.token_pair().unwrap();
        assert_eq!(pair.access_token, "acc");
        assert!(!format!("{pair:?}").contains("ref"));
    }
}

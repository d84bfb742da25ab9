//! Application state for the CLI: configuration, the API client, the local
//! cache and the expiry monitor, plus the interactive login flow.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use coursebook_core::auth::{CredentialStore, ExpiryMonitor, LogoutReason, Navigator};
use coursebook_core::config::{Config, CredentialMode};
use coursebook_core::models::User;
use coursebook_core::{ApiClient, CacheManager};

/// Prints where the user should go next when the session ends.
struct CliNavigator;

impl Navigator for CliNavigator {
    fn redirect_to_login(&self, reason: LogoutReason) {
        match reason {
            LogoutReason::SignedOut => println!("Logged out."),
            other => eprintln!("Session ended ({}). Run `coursebook login` to sign in again.", other),
        }
    }
}

pub struct App {
    pub config: Config,
    pub api: ApiClient,
    pub cache: CacheManager,
    pub monitor: ExpiryMonitor,
    connected: bool,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let api = ApiClient::from_config(&config, Arc::new(CliNavigator))
            .context("Failed to build HTTP client")?;

        let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
        debug!(?cache_dir, "Cache directory configured");
        let cache = CacheManager::new(cache_dir.join("data"), config.cache_stale_minutes)?;

        let monitor = ExpiryMonitor::new(api.clone(), config.session.clone());

        Ok(Self {
            config,
            api,
            cache,
            monitor,
            connected: false,
        })
    }

    /// An authenticated client, logging in on first use.
    ///
    /// Bearer mode resumes from the keychain when a refresh credential is
    /// stored; otherwise (and always in cookie mode, whose cookies live only
    /// as long as the process) the user is asked to log in.
    pub async fn connect(&mut self) -> Result<ApiClient> {
        if self.connected && self.api.session().is_authenticated() {
            return Ok(self.api.clone());
        }

        if !self.resume().await {
            self.login_interactive().await?;
        }
        self.connected = true;
        Ok(self.api.clone())
    }

    async fn resume(&self) -> bool {
        if self.config.credential_mode != CredentialMode::Bearer {
            return false;
        }
        let Some(email) = self.config.last_email.as_deref() else {
            return false;
        };

        let token = match CredentialStore::refresh_token(&self.config.api_url(), email) {
            Ok(Some(token)) => token,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "Could not read keychain");
                return false;
            }
        };

        match self.api.resume(&token).await {
            Ok(user) => {
                debug!(user_id = user.id, "Resumed stored session");
                true
            }
            Err(e) => {
                debug!(error = %e, "Stored session no longer valid");
                false
            }
        }
    }

    /// Interactive login, pre-filling the last used email
    pub async fn login_interactive(&mut self) -> Result<User> {
        println!("\n=== Coursebook Login ===\n");
        let email = self.prompt_email(None)?;
        let password = Self::prompt_password()?;
        self.login(email, password).await
    }

    pub async fn login(&mut self, email: String, password: String) -> Result<User> {
        println!("\nAuthenticating...");
        let user = self.api.login(&email, &password).await?;
        self.remember_login(email);
        println!("Welcome, {}!\n", user.display_name());
        Ok(user)
    }

    pub async fn register(&mut self, email: String, password: String, name: String) -> Result<User> {
        let user = self.api.register(&email, &password, &name).await?;
        self.remember_login(email);
        Ok(user)
    }

    fn remember_login(&mut self, email: String) {
        if self.config.last_email.as_deref() != Some(email.as_str()) {
            // Cached lists belong to the previous account
            if let Err(e) = self.cache.clear() {
                warn!(error = %e, "Failed to clear cache");
            }
        }
        self.config.last_email = Some(email);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
        self.connected = true;
        self.persist_tokens();
    }

    /// Store the current refresh credential (bearer mode only).
    pub fn persist_tokens(&self) {
        if self.config.credential_mode != CredentialMode::Bearer {
            return;
        }
        let (Some(email), Some(tokens)) = (self.config.last_email.as_deref(), self.api.session().tokens()) else {
            return;
        };
        if tokens.refresh_token.is_empty() {
            return;
        }
        if let Err(e) = CredentialStore::store_refresh_token(&self.config.api_url(), email, &tokens.refresh_token) {
            warn!(error = %e, "Failed to store refresh token");
        }
    }

    /// Forget everything stored for the last account.
    pub fn forget_credentials(&self) {
        if let Some(email) = self.config.last_email.as_deref() {
            if let Err(e) = CredentialStore::delete(&self.config.api_url(), email) {
                warn!(error = %e, "Failed to delete stored credential");
            }
        }
        if let Err(e) = self.cache.clear() {
            warn!(error = %e, "Failed to clear cache");
        }
    }

    /// Whether a server-side session can be reached without prompting.
    pub async fn try_resume(&mut self) -> bool {
        if self.api.session().is_authenticated() {
            return true;
        }
        self.connected = self.resume().await;
        self.connected
    }

    pub fn prompt_email(&self, given: Option<String>) -> Result<String> {
        if let Some(email) = given {
            return Ok(email);
        }
        match self.config.last_email.as_deref() {
            Some(last) => {
                let input = prompt(&format!("Email [{}]: ", last))?;
                Ok(if input.is_empty() { last.to_string() } else { input })
            }
            None => prompt("Email: "),
        }
    }

    pub fn prompt_password() -> Result<String> {
        let password = rpassword::prompt_password("Password: ")?;
        Ok(password)
    }
}

/// Read one trimmed line from stdin after printing a prompt.
pub fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

use anyhow::{Context, Result};
use keyring::Entry;

use crate::config::APP_NAME;

/// Keychain entries are namespaced per backend so two servers never share a credential.
fn service_name(api_url: &str) -> String {
    format!("{}:{}", APP_NAME, api_url.trim_end_matches('/'))
}

/// OS keychain storage for the bearer-mode refresh credential.
pub struct CredentialStore;

impl CredentialStore {
    /// Store the refresh credential for an account
    pub fn store_refresh_token(api_url: &str, email: &str, refresh_token: &str) -> Result<()> {
        let entry = Entry::new(&service_name(api_url), email)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(refresh_token)
            .context("Failed to store refresh token in keychain")?;
        Ok(())
    }

    /// Retrieve the refresh credential for an account, `None` when nothing is stored
    pub fn refresh_token(api_url: &str, email: &str) -> Result<Option<String>> {
        let entry = Entry::new(&service_name(api_url), email)
            .context("Failed to create keyring entry")?;
        match entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve refresh token from keychain"),
        }
    }

    /// Delete the stored credential; missing entries are not an error
    pub fn delete(api_url: &str, email: &str) -> Result<()> {
        let entry = Entry::new(&service_name(api_url), email)
            .context("Failed to create keyring entry")?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

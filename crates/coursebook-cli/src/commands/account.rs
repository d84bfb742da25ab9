use anyhow::{bail, Result};
use tracing::warn;

use crate::app::{prompt, App};
use coursebook_core::utils::{format_countdown, format_optional};

pub async fn login(app: &mut App, email: Option<String>) -> Result<()> {
    let email = app.prompt_email(email)?;
    let password = App::prompt_password()?;
    app.login(email, password).await?;
    Ok(())
}

pub async fn register(app: &mut App, email: Option<String>, name: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let name = match name {
        Some(name) => name,
        None => prompt("Name: ")?,
    };
    let password = App::prompt_password()?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }

    let user = app.register(email, password, name).await?;
    println!("Account created. Welcome, {}!", user.display_name());
    Ok(())
}

pub async fn logout(app: &mut App) -> Result<()> {
    if app.try_resume().await {
        if let Err(e) = app.monitor.logout().await {
            warn!(error = %e, "Server logout failed");
        }
    } else {
        println!("No active session.");
    }
    app.forget_credentials();
    Ok(())
}

pub async fn whoami(app: &mut App) -> Result<()> {
    let api = app.connect().await?;
    let user = api.me().await?;

    println!("{} <{}>", user.display_name(), user.email);
    println!("Provider: {}", format_optional(&user.provider, "local"));
    if let Some(remaining) = api.session().snapshot().remaining() {
        println!("Session:  {} remaining", format_countdown(remaining));
    }
    Ok(())
}

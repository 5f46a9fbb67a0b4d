//! Sign-in and account commands (`funban login|logout|whoami|account`).

use anyhow::{Context as _, Result};
use console::style;
use dialoguer::{Input, Password};

use funban::credentials::Credentials;
use funban::ui::icons::CHECK;

use super::Context;
use crate::AccountCommands;

pub async fn cmd_login(ctx: &Context, email: Option<String>, password: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => Input::<String>::new()
            .with_prompt("Email")
            .interact_text()
            .context("Failed to read email")?,
    };
    let password = match password {
        Some(password) => password,
        None => Password::new()
            .with_prompt("Password")
            .interact()
            .context("Failed to read password")?,
    };

    let signed_in = ctx.anonymous_api().sign_in(&email, &password).await?;
    let api = ctx.anonymous_api().with_token(signed_in.token.clone());
    let account_email = match api.me().await {
        Ok(account) => Some(account.email),
        Err(e) => {
            tracing::warn!(error = %e, "signed in but could not fetch account details");
            signed_in.email.or(Some(email))
        }
    };

    ctx.store.save(&Credentials {
        token: signed_in.token,
        email: account_email.clone(),
    })?;
    println!(
        "{}Signed in as {}",
        CHECK,
        style(account_email.as_deref().unwrap_or("unknown")).bold()
    );
    Ok(())
}

pub fn cmd_logout(ctx: &Context) -> Result<()> {
    if ctx.store.clear()? {
        println!("Signed out.");
    } else {
        println!("Not signed in.");
    }
    Ok(())
}

pub async fn cmd_whoami(ctx: &Context) -> Result<()> {
    let account = ctx.api()?.me().await.map_err(|e| ctx.api_failure(e))?;
    println!("{}", account.email);

    // keep the cached email in step with the server
    if let Some(mut credentials) = ctx.store.load()?
        && credentials.email.as_deref() != Some(account.email.as_str())
    {
        credentials.email = Some(account.email);
        ctx.store.save(&credentials)?;
    }
    Ok(())
}

pub async fn cmd_account(ctx: &Context, command: AccountCommands) -> Result<()> {
    let api = ctx.api()?;
    match command {
        AccountCommands::Password => {
            let old = Password::new()
                .with_prompt("Old password")
                .interact()
                .context("Failed to read password")?;
            let new = Password::new()
                .with_prompt("New password")
                .with_confirmation("Repeat new password", "Passwords do not match")
                .interact()
                .context("Failed to read password")?;
            api.change_password(&old, &new)
                .await
                .map_err(|e| ctx.api_failure(e))?;
            println!("{}Password changed.", CHECK);
        }
        AccountCommands::Email { new_email } => {
            if new_email.trim().is_empty() {
                anyhow::bail!("New email is required");
            }
            api.change_email(&new_email)
                .await
                .map_err(|e| ctx.api_failure(e))?;
            if let Some(mut credentials) = ctx.store.load()? {
                credentials.email = Some(new_email.clone());
                ctx.store.save(&credentials)?;
            }
            println!("{}Email changed to {}", CHECK, style(new_email).bold());
        }
    }
    Ok(())
}

//! Console client entry point.
//!
//! Restores the stored session (or signs in with `CONSOLE_EMAIL` /
//! `CONSOLE_PASSWORD`) and reports what the console would show.

use std::sync::Arc;

use anyhow::{Context, bail};

use console_client::{AppContext, ClientConfig, ListParams, SqliteStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().context("invalid configuration")?;
    console_observability::init(config.log_format);

    let path = config.storage_path()?;
    tracing::debug!(path = %path.display(), "opening client storage");
    let ctx = AppContext::start(config, Arc::new(SqliteStore::open(&path))).await?;

    if !ctx.session().is_authenticated() {
        let email = std::env::var("CONSOLE_EMAIL").ok();
        let password = std::env::var("CONSOLE_PASSWORD").ok();
        let (Some(email), Some(password)) = (email, password) else {
            tracing::info!("not signed in; set CONSOLE_EMAIL and CONSOLE_PASSWORD to sign in");
            return Ok(());
        };
        let remember_me = std::env::var("CONSOLE_REMEMBER_ME").is_ok_and(|v| v == "true");

        if !ctx.login(&email, &password, remember_me).await? {
            bail!("Invalid credentials. Please try again.");
        }
    }

    let Some(session) = ctx.session().current() else {
        bail!("session did not settle");
    };
    tracing::info!(user = %session.display_name, email = %session.email, "signed in");

    let reference = ctx.reference();
    let (countries, clients, roles) = tokio::join!(reference.countries(), reference.clients(), reference.roles());
    tracing::info!(
        countries = countries.map(|c| c.len()).unwrap_or_default(),
        clients = clients.map(|c| c.len()).unwrap_or_default(),
        roles = roles.map(|r| r.len()).unwrap_or_default(),
        "reference data loaded"
    );

    let page = ctx.users().list(ListParams::default()).await?;
    tracing::info!(
        shown = page.users.len(),
        total = page.pagination.total_records,
        "admin users"
    );

    if std::env::var("CONSOLE_LOGOUT").is_ok_and(|v| v == "true") {
        let ctx = ctx.logout().await.map_err(|e| e.source)?;
        tracing::info!(status = ctx.status().as_str(), "signed out");
    }

    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use plugreg_registration::{Registrar, RegistrationOptions};
use plugreg_storage::DynStore;

use crate::auth::{self, Credentials};
use crate::cli::OutputFormat;
use crate::client::WebApiStore;
use crate::config::AppConfig;
use crate::output::{self, ConsoleReporter};

/// Runs a registration, or only plans it when `dry_run` is set.
pub async fn register(
    cfg: &AppConfig,
    options: &RegistrationOptions,
    dry_run: bool,
    format: OutputFormat,
) -> Result<()> {
    // Local preconditions fail before any network traffic, token included.
    options.validate()?;

    let store = connect(cfg).await?;
    let registrar =
        Registrar::new(store).with_reporter(Arc::new(ConsoleReporter::new(format)));

    let plan = registrar.plan(options).await?;
    if dry_run {
        return output::print_plan(&plan, format);
    }

    let summary = registrar.execute(plan).await?;
    output::print_summary(&summary, format)
}

async fn connect(cfg: &AppConfig) -> Result<DynStore> {
    let credentials = Credentials::from_config(cfg)?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;
    let token = auth::acquire_token(&http, &credentials, cfg.base_url()).await?;

    let store = WebApiStore::new(
        cfg.base_url(),
        &cfg.api_version,
        token,
        Duration::from_secs(cfg.timeout_secs),
    )?;
    tracing::info!(url = %cfg.base_url(), api_version = %cfg.api_version, "Connected");
    Ok(Arc::new(store))
}

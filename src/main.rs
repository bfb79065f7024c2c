mod api;
mod app;
mod config;
mod layout;
mod sensors;
mod taxonomy;
mod util;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::api::{ApiClient, AuthClient};
use crate::app::{ExplorerApp, SeedData};
use crate::config::AppConfig;
use crate::taxonomy::rows_from_payload;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Base URL of the data service.
    #[arg(long)]
    api_url: Option<String>,

    /// Base URL of the authentication service.
    #[arg(long)]
    auth_url: Option<String>,

    /// Config file to use instead of the per-user default.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Open the explorer without checking for a session.
    #[arg(long)]
    skip_login: bool,

    /// Taxonomy JSON shown until the live taxonomy arrives.
    #[arg(long, value_name = "FILE")]
    taxonomy: Option<PathBuf>,

    /// Anomaly list JSON shown until the live list arrives.
    #[arg(long, value_name = "FILE")]
    rows: Option<PathBuf>,
}

fn read_json(path: &Path) -> Result<Value> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn load_seed(args: &Args) -> Result<SeedData> {
    let taxonomy = match &args.taxonomy {
        Some(path) => read_json(path)?,
        None => Value::Object(Default::default()),
    };
    let rows = match &args.rows {
        Some(path) => rows_from_payload(&read_json(path)?),
        None => Vec::new(),
    };

    Ok(SeedData { rows, taxonomy })
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config_path = args.config.clone().or_else(AppConfig::default_path);
    let mut config = config_path
        .as_deref()
        .map(AppConfig::load)
        .unwrap_or_default();
    if let Some(api_url) = &args.api_url {
        config.api_url = api_url.clone();
    }
    if let Some(auth_url) = &args.auth_url {
        config.auth_url = auth_url.clone();
    }

    let seed = load_seed(&args)?;
    info!(
        rows = seed.rows.len(),
        api = %config.api_url,
        auth = %config.auth_url,
        "starting edgescope"
    );

    let runtime = Arc::new(
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .context("failed to start the async runtime")?,
    );
    let api = ApiClient::new(&config.api_url).context("failed to create the data client")?;
    let auth = AuthClient::new(&config.auth_url).context("failed to create the auth client")?;

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "edgescope",
        options,
        Box::new(move |cc| {
            Ok(Box::new(ExplorerApp::new(
                cc,
                config,
                config_path,
                runtime,
                (api, auth),
                seed,
                args.skip_login,
            )))
        }),
    )
    .map_err(|error| anyhow!("failed to run the UI: {error}"))
}

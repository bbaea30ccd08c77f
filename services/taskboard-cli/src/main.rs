//! Taskboard command-line client
//!
//! Wires the persisted session, the authenticated request pipeline and the
//! task timer to a handful of subcommands. Session state lives in a JSON file
//! next to the config, so consecutive runs share one login.

mod cli;
mod commands;
mod config;
mod metrics;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use taskboard_auth::{AuthEndpoints, FileStore, KeyValueStore, SystemClock, TokenStore};
use taskboard_client::{RequestPipeline, TaskTimer, TaskboardApi};
use taskboard_session::SessionManager;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::commands::{App, CliRedirect};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let prometheus = if cli.metrics {
        Some(metrics::install_recorder()?)
    } else {
        None
    };

    let config_path = Config::resolve_path(cli.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    debug!(path = %config_path.display(), base_url = %config.api.base_url, "config loaded");

    let app = build_app(config)?;
    let outcome = app.run(cli.command).await;

    if let Some(handle) = prometheus {
        eprintln!("{}", handle.render());
    }

    match outcome {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            Ok(())
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "command failed");
            Err(e)
        }
    }
}

/// Logs go to stderr so command output on stdout stays pipeable.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn build_app(config: Config) -> Result<App> {
    let storage: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(config.storage.path.clone()).with_context(|| {
            format!("failed to open session storage {}", config.storage.path.display())
        })?,
    );

    let http = reqwest::Client::builder()
        .user_agent(concat!("taskboard/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    let endpoints = AuthEndpoints::new(http.clone(), &config.api.base_url)
        .with_paths(&config.auth.login_path, &config.auth.refresh_path)
        .with_timeout(config.refresh_timeout());
    let session = Arc::new(
        SessionManager::new(TokenStore::new(storage.clone()), endpoints)
            .with_expiry_skew(config.auth.expiry_skew_secs)
            .with_refresh_timeout(config.refresh_timeout()),
    );

    let pipeline = RequestPipeline::new(http, &config.api.base_url, session.clone())
        .with_redirect(Arc::new(CliRedirect))
        .with_timeout(config.request_timeout());

    Ok(App {
        session,
        api: TaskboardApi::new(Arc::new(pipeline)),
        timer: TaskTimer::new(storage, Arc::new(SystemClock)),
        default_email: config.auth.email,
        password: config.auth.password,
    })
}

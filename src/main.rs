use std::path::Path;
use std::sync::Arc;

use eyre::{Result, WrapErr};
use log::{LevelFilter, info, warn};

mod cli;

use cli::Cli;
use ytx_server::config::{Config, config_path};
use ytx_server::http::{HttpFetch, ReqwestFetch};
use ytx_server::orchestrator::FallbackOrchestrator;
use ytx_server::server::{AppState, create_router};
use ytx_server::translate::GoogleTranslator;

fn setup_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(if verbose { LevelFilter::Debug } else { LevelFilter::Info });
    builder.parse_default_env();

    if let Some(path) = log_file {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(path)?);
        builder.target(env_logger::Target::Pipe(target));
    }

    builder.init();
    if let Some(path) = log_file {
        info!("Logging initialized: {}", path.display());
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Config {
    let loaded = match cli.config {
        Some(ref path) => Config::load_from(path),
        None => Config::load(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            let path = cli.config.clone().unwrap_or_else(config_path);
            warn!("Ignoring unreadable config {}: {e}", path.display());
            Config::default()
        }
    }
    .apply_env();

    if let Some(ref host) = cli.host {
        config.host = Some(host.clone());
    }
    if let Some(port) = cli.port {
        config.port = Some(port);
    }
    config
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = <Cli as clap::Parser>::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: failed to load .env: {e}");
        }
    }
    setup_logging(cli.verbose, cli.log_file.as_deref())?;

    let config = Arc::new(load_config(&cli));
    let http: Arc<dyn HttpFetch> = Arc::new(ReqwestFetch::default());

    let orchestrator = FallbackOrchestrator::from_config(&config, http.clone());
    info!("Supadata configured: {}", config.supadata_key().is_some());
    info!("Proxy configured: {}", config.resolved_proxy().is_some());
    info!("Strategy order: {}", orchestrator.labels().join(" -> "));
    if orchestrator.labels().is_empty() {
        warn!("No transcript strategies are enabled; /transcript will fail");
    }

    let translator = GoogleTranslator::new(http).with_timeout(config.request_timeout());
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        translator: Arc::new(translator),
        config: config.clone(),
    };

    let addr = format!("{}:{}", config.host(), config.port());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("failed to bind {addr}"))?;
    info!("ytx-server {} listening on {addr}", env!("GIT_DESCRIBE"));

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("server error")?;

    Ok(())
}


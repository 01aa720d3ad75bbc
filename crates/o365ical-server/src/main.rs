//! o365ical daemon entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use o365ical_core::{TracingConfig, init_tracing};
use o365ical_providers::OAuthClient;
use o365ical_server::http::{self, AppState};
use o365ical_server::{
    AttachmentMirror, CalendarService, Config, Refresher, RefresherConfig, ServerError,
    ServerResult, SessionRegistry, SqliteStore, Storage, WindowCache,
};

/// Serves Office 365 calendars as iCalendar feeds.
#[derive(Debug, Parser)]
#[command(name = "o365ical", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, env = "O365ICAL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let tracing_config = if cli.debug || config.debug {
        Ok(TracingConfig::debug())
    } else {
        config
            .logging
            .output_format()
            .map(|format| TracingConfig::default().with_format(format))
    };
    let initialized = tracing_config
        .and_then(|c| init_tracing(c).map_err(|e| ServerError::config(e.to_string())));
    if let Err(e) = initialized {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "o365ical failed");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> ServerResult<Config> {
    match cli.config {
        Some(ref path) => Config::load_from(path),
        None => Config::load(),
    }
}

async fn run(config: Config) -> ServerResult<()> {
    let credentials = config.oauth.to_credentials()?;
    let oauth = OAuthClient::new(credentials, config.graph.timeout())?;

    let database = config.storage.database_path();
    if let Some(parent) = database.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store: Arc<dyn Storage> = Arc::new(SqliteStore::open(&database)?);

    let known_users = store.load_user_tokens()?;
    info!(
        database = %database.display(),
        known_users = known_users.len(),
        "storage ready"
    );
    let registry = Arc::new(SessionRegistry::with_known_users(known_users));

    let cache = WindowCache::new(store.clone(), config.refresh.ttl());
    let mirror = AttachmentMirror::new(store.clone(), config.storage.attachments_path());
    let calendar = Arc::new(CalendarService::new(cache.clone(), mirror.clone()));

    let refresher = Refresher::new(
        RefresherConfig::new(config.refresh.tick()),
        registry.clone(),
        cache,
    );
    let refresher_handle = refresher.handle();
    let refresher_task = tokio::spawn(refresher.run());

    let state = AppState {
        registry,
        store,
        calendar,
        mirror,
        oauth: Arc::new(oauth),
        graph: config.graph.to_graph_config(),
        refresher: refresher_handle.clone(),
        public_url: config.server.public_url.clone(),
    };

    let served = http::serve(config.server.listen, state, shutdown_signal()).await;

    if refresher_handle.stop().await.is_err() {
        warn!("refresher already stopped");
    }
    if let Err(e) = refresher_task.await {
        warn!(error = %e, "refresher task panicked");
    }
    served
}

/// Completes on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}

//! Go-match analysis dispatcher CLI.
//!
//! Entry point for the dispatcher binary. Provides subcommands for:
//! - `run` - Start the poller, dispatcher, and scheduler
//! - `migrate` - Run database migrations

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use igo_dispatch::config::Settings;
use igo_dispatch::dispatcher::Dispatcher;
use igo_dispatch::engine::HttpEngineClient;
use igo_dispatch::listing::HttpListingApiClient;
use igo_dispatch::poller::MovePoller;
use igo_dispatch::scheduler::{drive_poller, supervise_dispatcher};
use igo_dispatch::store::PostgresStore;

/// Go-match analysis dispatcher.
#[derive(Parser, Debug)]
#[command(name = "igo-dispatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Environment name, selects `config/{name}.toml` as an overlay.
    #[arg(short, long, default_value = "development")]
    environment: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the move poller, dispatcher, and scheduler.
    Run,

    /// Run database migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load(&cli.environment) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    init_tracing(&settings.logging.level, &settings.logging.format);

    if let Err(errors) = settings.validate() {
        for e in &errors {
            error!(error = e, "invalid configuration");
        }
        return std::process::ExitCode::FAILURE;
    }

    info!(version = igo_dispatch::VERSION, environment = %cli.environment, "starting igo-dispatch");

    let result = match cli.command {
        Commands::Run => run(settings).await,
        Commands::Migrate => migrate(&settings).await,
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal error");
            std::process::ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.pretty().init();
    }
}

async fn migrate(settings: &Settings) -> igo_dispatch::error::Result<()> {
    let pool = connect(settings).await?;
    let store = PostgresStore::new(pool);
    info!("running migrations");
    store.run_migrations().await?;
    info!("migrations complete");
    Ok(())
}

async fn connect(settings: &Settings) -> igo_dispatch::error::Result<sqlx::PgPool> {
    PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .min_connections(settings.database.min_connections)
        .acquire_timeout(settings.database.connect_timeout())
        .idle_timeout(settings.database.idle_timeout())
        .connect(&settings.database.url)
        .await
        .map_err(|e| igo_dispatch::error::InfraError::Database(e).into())
}

async fn run(settings: Settings) -> igo_dispatch::error::Result<()> {
    let pool = connect(&settings).await?;
    let store = Arc::new(PostgresStore::new(pool));
    store.run_migrations().await?;

    let http = reqwest::Client::builder()
        .timeout(settings.engine.request_timeout().max(settings.listing_api.request_timeout()))
        .build()
        .map_err(|e| igo_dispatch::error::InfraError::Engine(Box::new(e)))?;

    let engine = Arc::new(HttpEngineClient::new(http.clone(), settings.engine.base_url.clone()));
    let listing = Arc::new(HttpListingApiClient::new(
        http,
        settings.listing_api.base_url.clone(),
        settings.listing_api.max_retries,
        settings.listing_api.initial_backoff(),
    ));

    let dispatcher = Arc::new(Dispatcher::new(store.clone(), engine, &settings.dispatcher, settings.engine.max_visits));
    let poller = Arc::new(MovePoller::new(store, listing));

    let shutdown = CancellationToken::new();
    let mut tasks = tokio::task::JoinSet::new();

    tasks.spawn(supervise_dispatcher(dispatcher, shutdown.clone()));

    if settings.poller.enabled {
        let interval = settings.poller.interval();
        let poller_shutdown = shutdown.clone();
        tasks.spawn(drive_poller(poller, interval, poller_shutdown));
    } else {
        info!("poller disabled by configuration");
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
        () = shutdown.cancelled() => {}
    }
    shutdown.cancel();

    // Give in-flight work a bounded window to wind down cooperatively rather
    // than hanging forever on a task that never notices the cancellation.
    let drain = tokio::time::timeout(Duration::from_secs(120), async {
        while let Some(res) = tasks.join_next().await {
            if let Ok(Err(e)) = res {
                error!(error = %e, "background task exited with error");
            }
        }
    });
    if drain.await.is_err() {
        error!("timed out waiting for background tasks to shut down");
    }

    Ok(())
}

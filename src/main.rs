use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use diesel_migrations::MigrationHarness;
use expotab::{
    MIGRATIONS,
    config::{ConfigError, Settings, create_app},
    msg::Msg,
    state::{AppState, DbPool, build_pool},
};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Live exhibition judging server")]
struct Cli {
    /// Path to a TOML settings file.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web server (the default).
    Serve,
    /// Apply any pending database migrations and exit.
    Migrate,
}

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not open the database: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("could not run migrations: {0}")]
    Migrations(String),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

fn migrate(pool: &DbPool) -> Result<(), StartupError> {
    let mut conn = pool.get()?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| StartupError::Migrations(e.to_string()))?;
    tracing::info!("applied {} migration(s)", applied.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    tracing::info!(database_url = %settings.database_url, "opening database");
    let pool = build_pool(&settings.database_url)?;
    migrate(&pool)?;

    if let Some(Command::Migrate) = cli.command {
        return Ok(());
    }

    let (tx, _) = tokio::sync::broadcast::channel::<Msg>(1000);
    let state = AppState {
        pool,
        key: settings.key()?,
        tx,
        settings: Arc::new(settings.clone()),
    };

    let listener = tokio::net::TcpListener::bind(settings.bind).await?;
    tracing::info!("listening on {}", settings.bind);
    axum::serve(listener, create_app(state)).await?;

    Ok(())
}

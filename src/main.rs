use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use subhub::config::{ConfigLoader, Overrides};
use subhub::{app, db, server};

/// Subscription management server.
#[derive(Debug, Parser)]
#[command(name = "subhub", version, about)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short = 'f', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on.
    #[arg(long)]
    port: Option<u16>,

    /// Local database path or remote libsql URL.
    #[arg(long)]
    database_url: Option<String>,

    /// JWT signing secret, at least 32 bytes. Prefer SUBHUB_JWT_SECRET.
    #[arg(long)]
    jwt_secret: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("subhub=info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> subhub::Result<()> {
    let overrides = Overrides {
        host: cli.host,
        port: cli.port,
        database_url: cli.database_url,
        jwt_secret: cli.jwt_secret,
    };
    let config = ConfigLoader::default().load(cli.config.as_deref(), &overrides)?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Configuration loaded"
    );

    let db = db::open(&config.database).await?;
    let router = app::build(db)?;

    server::run(Arc::new(config), router.into_handle()).await?;
    tracing::info!("Server exited");
    Ok(())
}

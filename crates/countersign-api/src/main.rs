//! Countersign REST API entry point.
//!
//! Binary name: `countersign`
//!
//! Parses CLI arguments, initializes the database and workflows, then
//! starts the REST API server.

mod http;
mod state;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use state::AppState;

#[derive(Parser)]
#[command(name = "countersign", about = "Procurement approval workflow service")]
struct Cli {
    /// Data directory (database, blobs, config.toml). Defaults to
    /// $COUNTERSIGN_DATA_DIR or ~/.countersign.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Bind address, overriding config.toml.
    #[arg(long)]
    bind: Option<String>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "info,countersign=debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    let data_dir = cli
        .data_dir
        .unwrap_or_else(countersign_infra::config::default_data_dir);
    let state = AppState::init(data_dir).await?;

    let bind_address = cli
        .bind
        .unwrap_or_else(|| state.config.bind_address.clone());
    let router = http::router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "listening");
    axum::serve(listener, router).await?;

    Ok(())
}

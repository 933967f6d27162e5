//! karat-api: appraisal read path HTTP service

use anyhow::Result;
use clap::Parser;
use tracing::info;

use karat_api::{build_router, AppState};
use karat_common::config::{self, Overrides};
use karat_common::db;

#[derive(Parser, Debug)]
#[command(name = "karat-api", about = "Code credit appraisal API")]
struct Args {
    /// Path to the shared karat database
    #[arg(long)]
    database: Option<std::path::PathBuf>,

    /// Listen address, e.g. 127.0.0.1:5780
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting karat-api v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let overrides = Overrides {
        database_path: args.database,
        listen_addr: args.listen,
        ..Overrides::default()
    };
    let settings = config::resolve(&overrides)?;

    info!("Database path: {}", settings.database_path.display());
    let pool = db::connect(&settings.database_path).await?;
    db::init_schema(&pool).await?;

    let listen_addr = settings.listen_addr.clone();
    let state = AppState::new(pool, settings);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!("karat-api listening on http://{}", listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

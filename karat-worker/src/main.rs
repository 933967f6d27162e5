//! karat-worker: appraisal write path worker pool

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use karat_common::config::{self, Overrides};
use karat_common::db;
use karat_common::queue::JobQueue;
use karat_worker::analyzer::CommandAnalyzer;
use karat_worker::consumer::Consumer;
use karat_worker::git::CliGitGateway;
use karat_worker::pipeline::WorkerPipeline;

#[derive(Parser, Debug)]
#[command(name = "karat-worker", about = "Code credit appraisal worker")]
struct Args {
    /// Path to the shared karat database
    #[arg(long)]
    database: Option<std::path::PathBuf>,

    /// Directory holding local clone checkouts
    #[arg(long)]
    clone_root: Option<std::path::PathBuf>,

    /// Concurrent worker slots
    #[arg(long)]
    slots: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting karat-worker v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let overrides = Overrides {
        database_path: args.database,
        clone_root: args.clone_root,
        worker_slots: args.slots,
        ..Overrides::default()
    };
    let settings = config::resolve(&overrides)?;

    info!("Database path: {}", settings.database_path.display());
    info!("Clone root: {}", settings.clone_root.display());
    let pool = db::connect(&settings.database_path).await?;
    db::init_schema(&pool).await?;
    std::fs::create_dir_all(&settings.clone_root)?;

    let pipeline = Arc::new(WorkerPipeline::new(
        pool.clone(),
        &settings,
        CliGitGateway::new(settings.clone_root.clone()),
        CommandAnalyzer::new(settings.analyzer_command.clone()),
    ));

    let cancel = CancellationToken::new();
    let poll_interval = Duration::from_millis(settings.poll_interval_ms);
    let mut handles = Vec::with_capacity(settings.worker_slots);

    for slot in 0..settings.worker_slots {
        let consumer = Consumer::new(
            slot,
            JobQueue::new(pool.clone(), settings.visibility_timeout_secs),
            pipeline.clone(),
            poll_interval,
        );
        handles.push(tokio::spawn(consumer.run(cancel.clone())));
    }
    info!("{} worker slots consuming the queue", settings.worker_slots);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    cancel.cancel();

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}

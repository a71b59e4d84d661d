use clap::Parser;
use echo_narrative::cli::{self, Cli};
use echo_narrative::memory::{FileSnapshotStore, TieredMemory};
use echo_narrative::narrative::NarrativeSystem;
use std::sync::Arc;

#[tokio::main]
async fn main() -> echo_narrative::error::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "echo_narrative=info".into()),
        )
        .init();

    let config = Cli::parse().resolve_config()?;

    let snapshots = Arc::new(FileSnapshotStore::new(&config.snapshot_dir)?);
    let memory = TieredMemory::load(
        snapshots,
        config.snapshot_key.clone(),
        config.compress_threshold,
    )
    .await?;

    let system = NarrativeSystem::builder(Arc::new(memory))
        .config(&config)
        .build();

    cli::run(system).await
}

//! Drain queue example
//!
//! This example demonstrates the core functionality of goes-dl:
//! - Opening a task store and seeding it from a list of object names
//! - Building a fetcher for the public GOES bucket
//! - Subscribing to orchestrator events
//! - Writing every fetched dataset to an output directory
//!
//! Usage:
//!
//! ```text
//! cargo run --example drain_queue -- names.txt out/
//! ```
//!
//! `names.txt` holds one bucket object name per line. Names already in the
//! store are skipped, so the example can be re-run after an interruption.

use std::path::PathBuf;
use std::sync::Arc;

use goes_dl::{
    Config, Dataset, Event, FetchError, Fetcher, Orchestrator, Store, StoreError, TaskHandler,
    run_with_shutdown,
};

/// Writes each dataset under `out_dir`, keeping only the file name
struct SaveToDir {
    out_dir: PathBuf,
}

#[async_trait::async_trait]
impl TaskHandler for SaveToDir {
    async fn on_item_success(&self, name: &str, dataset: &Dataset) -> Result<(), String> {
        let file_name = name.rsplit('/').next().unwrap_or(name);
        let target = self.out_dir.join(file_name);
        tokio::fs::write(&target, &dataset.bytes)
            .await
            .map_err(|e| format!("failed to write {}: {}", target.display(), e))
    }

    async fn on_item_error(&self, name: &str, error: &FetchError) {
        eprintln!("✗ {} ({})", name, error.kind());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let names_file = args.next().ok_or("usage: drain_queue <names.txt> <out_dir>")?;
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| "out".to_string()));
    tokio::fs::create_dir_all(&out_dir).await?;

    let config = Config::default();
    let store = Arc::new(Store::open(&config.persistence.database_path).await?);

    // Seed the store, skipping names a previous run already queued
    let listing = tokio::fs::read_to_string(&names_file).await?;
    let mut queued = 0;
    for name in listing.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match store.add(name, "").await {
            Ok(()) => queued += 1,
            Err(goes_dl::Error::Store(StoreError::Duplicate { .. })) => {}
            Err(e) => return Err(e.into()),
        }
    }
    println!("Queued {} new tasks", queued);

    let fetcher = Fetcher::from_config(&config)?;
    let orchestrator = Orchestrator::new(store.clone(), fetcher, config.batch.batch_size);

    // Subscribe to events
    let mut events = orchestrator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::BatchClaimed { round, names } => {
                    println!("Round {}: claimed {} tasks", round, names.len());
                }
                Event::TaskProcessed { name } => println!("✓ {}", name),
                Event::TaskCancelled { name, reason } => println!("✗ {}: {}", name, reason),
                Event::Drained { rounds } => println!("Queue drained after {} rounds", rounds),
            }
        }
    });

    let handler = SaveToDir { out_dir };
    let summary = run_with_shutdown(&orchestrator, &handler).await?;

    let counts = store.counts().await?;
    println!(
        "Done: {} processed, {} cancelled this run ({} pending, {} total)",
        summary.processed,
        summary.cancelled,
        counts.pending,
        counts.total()
    );

    store.close().await;
    Ok(())
}

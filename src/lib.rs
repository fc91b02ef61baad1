//! # goes-dl
//!
//! Persistent task queue and batch downloader for satellite netCDF datasets.
//!
//! ## Design Philosophy
//!
//! goes-dl is designed to be:
//! - **Crash-tolerant** - Task state lives in a SQLite file, so a restarted
//!   worker picks up where the last one stopped
//! - **Shareable** - Several processes may drain the same store file; each
//!   pending task is claimed by exactly one of them
//! - **Bounded** - At most `max_concurrent` transfers are in flight, however
//!   large a batch is
//! - **Library-first** - Callers plug in what happens to each dataset
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use goes_dl::{Config, Dataset, Fetcher, Orchestrator, Store, TaskHandler};
//!
//! struct Save;
//!
//! #[async_trait::async_trait]
//! impl TaskHandler for Save {
//!     async fn on_item_success(&self, name: &str, dataset: &Dataset) -> Result<(), String> {
//!         println!("{name}: {} ({} bytes)", dataset.format, dataset.len());
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let store = Arc::new(Store::open(&config.persistence.database_path).await?);
//!     store.add("ABI-L2-CMIPF/2020/001/00/OR_ABI-L2-CMIPF-M6C13_G16.nc", "").await?;
//!
//!     let fetcher = Fetcher::from_config(&config)?;
//!     let orchestrator = Orchestrator::new(store, fetcher, config.batch.batch_size);
//!
//!     // Subscribe to events
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = orchestrator.run(&Save).await?;
//!     println!("{} processed, {} cancelled", summary.processed, summary.cancelled);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Bounded-concurrency dataset fetching
pub mod fetch;
/// Batch orchestration over the task store
pub mod orchestrator;
/// Persistent task store
pub mod store;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, FetchError, Result, StoreError};
pub use fetch::{
    BucketResolver, Dataset, DatasetDecoder, DatasetFormat, Decoder, FetchHandler, FetchSummary,
    Fetcher, HttpTransport, SourceResolver, Transport,
};
pub use orchestrator::{Orchestrator, TaskHandler};
pub use store::Store;
pub use types::{Event, RunSummary, Task, TaskCounts, TaskStatus};

use tokio_util::sync::CancellationToken;

/// Helper function to drain the store with graceful signal handling.
///
/// Runs the orchestrator until the store is drained or a termination signal
/// arrives. On a signal the batch in progress is finished and recorded, then
/// the run stops without claiming another one.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use goes_dl::{Config, Fetcher, Orchestrator, Store, TaskHandler, run_with_shutdown};
///
/// struct Discard;
/// impl TaskHandler for Discard {}
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let store = Arc::new(Store::open(&config.persistence.database_path).await?);
///     let orchestrator = Orchestrator::new(store, Fetcher::from_config(&config)?, 34);
///
///     // Run with automatic signal handling
///     run_with_shutdown(&orchestrator, &Discard).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown<H>(orchestrator: &Orchestrator, handler: &H) -> Result<RunSummary>
where
    H: TaskHandler + ?Sized,
{
    let cancel = CancellationToken::new();
    let run = orchestrator.run_until_cancelled(handler, cancel.clone());
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => return result,
        _ = wait_for_signal() => {
            tracing::info!("Shutdown requested, finishing current batch");
            cancel.cancel();
        }
    }

    run.await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{Signal, SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    fn register(kind: SignalKind, label: &'static str) -> Option<(Signal, &'static str)> {
        match signal(kind) {
            Ok(stream) => Some((stream, label)),
            Err(e) => {
                tracing::warn!(error = %e, signal = label, "Could not register signal handler");
                None
            }
        }
    }

    async fn next(handler: &mut Option<(Signal, &'static str)>) -> &'static str {
        match handler {
            Some((stream, label)) => {
                stream.recv().await;
                *label
            }
            None => std::future::pending().await,
        }
    }

    let mut sigterm = register(SignalKind::terminate(), "SIGTERM");
    let mut sigint = register(SignalKind::interrupt(), "SIGINT");

    if sigterm.is_none() && sigint.is_none() {
        tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
        tokio::signal::ctrl_c().await.ok();
        return;
    }

    let received = tokio::select! {
        label = next(&mut sigterm) => label,
        label = next(&mut sigint) => label,
    };
    tracing::info!(signal = received, "Received termination signal");
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}

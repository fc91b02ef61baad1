//! Batch orchestrator — drains the task store through the fetcher.
//!
//! Each round claims up to `batch_size` pending tasks, fetches them as one
//! batch, and records every outcome back into the store: successes become
//! `PROCESSED`, failures become `CANCELLED` with the error as detail. Rounds
//! repeat until a claim comes back empty.
//!
//! Failed items are not re-queued. A worker that dies mid-batch leaves its
//! claimed tasks `TAKEN`; [`Store::stale_claims`] reports them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::error::FetchError;
use crate::fetch::{Dataset, FetchHandler, Fetcher};
use crate::store::Store;
use crate::types::{Event, RunSummary};

/// Capacity of the event channel; slow subscribers miss older events
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Caller hooks invoked for each item before its outcome is recorded
#[async_trait::async_trait]
pub trait TaskHandler: Send + Sync {
    /// Handle a fetched dataset, e.g. clip it and persist the output
    ///
    /// Returning `Err(reason)` cancels the task with `reason` as detail
    /// instead of marking it processed.
    async fn on_item_success(&self, name: &str, dataset: &Dataset) -> std::result::Result<(), String> {
        let _ = (name, dataset);
        Ok(())
    }

    /// Observe a failed fetch; the task is cancelled afterwards
    async fn on_item_error(&self, name: &str, error: &FetchError) {
        let _ = (name, error);
    }
}

/// Repeatedly claims, fetches and records batches until the store is drained
pub struct Orchestrator {
    store: Arc<Store>,
    fetcher: Fetcher,
    batch_size: usize,
    worker_id: String,
    event_tx: broadcast::Sender<Event>,
}

impl Orchestrator {
    /// Create an orchestrator claiming at most `batch_size` tasks per round
    ///
    /// `batch_size` is clamped to at least one.
    pub fn new(store: Arc<Store>, fetcher: Fetcher, batch_size: usize) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            fetcher,
            batch_size: batch_size.max(1),
            worker_id: format!("pid-{}", std::process::id()),
            event_tx,
        }
    }

    /// Detail written on every task this orchestrator claims
    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Claim up to `batch_size` pending tasks
    pub async fn claim_batch(&self) -> Result<Vec<String>> {
        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            match self.store.take(&self.worker_id).await? {
                Some(name) => batch.push(name),
                None => break,
            }
        }
        Ok(batch)
    }

    /// Run rounds until no pending task is left
    pub async fn run<H>(&self, handler: &H) -> Result<RunSummary>
    where
        H: TaskHandler + ?Sized,
    {
        self.run_until_cancelled(handler, CancellationToken::new())
            .await
    }

    /// Run rounds until drained or `cancel` fires
    ///
    /// Cancellation is checked between rounds: the batch in progress always
    /// finishes and records its outcomes, so no claimed task is abandoned.
    pub async fn run_until_cancelled<H>(
        &self,
        handler: &H,
        cancel: CancellationToken,
    ) -> Result<RunSummary>
    where
        H: TaskHandler + ?Sized,
    {
        let mut summary = RunSummary::default();

        loop {
            if cancel.is_cancelled() {
                tracing::info!(rounds = summary.rounds, "orchestrator stopped before draining");
                break;
            }

            let batch = self.claim_batch().await?;
            if batch.is_empty() {
                tracing::info!(
                    rounds = summary.rounds,
                    processed = summary.processed,
                    cancelled = summary.cancelled,
                    "no pending tasks left"
                );
                self.event_tx
                    .send(Event::Drained {
                        rounds: summary.rounds,
                    })
                    .ok();
                break;
            }

            summary.rounds += 1;
            tracing::info!(round = summary.rounds, batch_size = batch.len(), "batch claimed");
            self.event_tx
                .send(Event::BatchClaimed {
                    round: summary.rounds,
                    names: batch.clone(),
                })
                .ok();

            let recorder = OutcomeRecorder::new(&self.store, handler, &self.event_tx);
            self.fetcher.fetch_all(&batch, &recorder).await;

            summary.processed += recorder.processed.load(Ordering::Relaxed);
            summary.cancelled += recorder.cancelled.load(Ordering::Relaxed);
            summary.unrecorded += recorder.unrecorded.load(Ordering::Relaxed);
        }

        Ok(summary)
    }
}

/// Drain `store` with a fresh orchestrator
pub async fn run<H>(
    store: Arc<Store>,
    fetcher: Fetcher,
    batch_size: usize,
    handler: &H,
) -> Result<RunSummary>
where
    H: TaskHandler + ?Sized,
{
    Orchestrator::new(store, fetcher, batch_size)
        .run(handler)
        .await
}

/// Bridges fetch callbacks to the caller's handler and the store
struct OutcomeRecorder<'a, H: ?Sized> {
    store: &'a Store,
    handler: &'a H,
    event_tx: &'a broadcast::Sender<Event>,
    processed: AtomicU64,
    cancelled: AtomicU64,
    unrecorded: AtomicU64,
}

impl<'a, H: TaskHandler + ?Sized> OutcomeRecorder<'a, H> {
    fn new(store: &'a Store, handler: &'a H, event_tx: &'a broadcast::Sender<Event>) -> Self {
        Self {
            store,
            handler,
            event_tx,
            processed: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            unrecorded: AtomicU64::new(0),
        }
    }

    async fn mark_processed(&self, name: &str) {
        match self.store.processed(name, "").await {
            Ok(()) => {
                self.processed.fetch_add(1, Ordering::Relaxed);
                self.event_tx
                    .send(Event::TaskProcessed {
                        name: name.to_string(),
                    })
                    .ok();
            }
            Err(e) => self.record_failure(name, e),
        }
    }

    async fn mark_cancelled(&self, name: &str, reason: String) {
        tracing::warn!(task = name, reason = %reason, "task cancelled");
        match self.store.cancelled(name, &reason).await {
            Ok(()) => {
                self.cancelled.fetch_add(1, Ordering::Relaxed);
                self.event_tx
                    .send(Event::TaskCancelled {
                        name: name.to_string(),
                        reason,
                    })
                    .ok();
            }
            Err(e) => self.record_failure(name, e),
        }
    }

    fn record_failure(&self, name: &str, err: crate::Error) {
        tracing::error!(task = name, error = %err, "failed to record task outcome");
        self.unrecorded.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait::async_trait]
impl<H: TaskHandler + ?Sized> FetchHandler for OutcomeRecorder<'_, H> {
    async fn on_success(&self, name: &str, dataset: Dataset) {
        match self.handler.on_item_success(name, &dataset).await {
            Ok(()) => self.mark_processed(name).await,
            Err(reason) => self.mark_cancelled(name, reason).await,
        }
    }

    async fn on_error(&self, name: &str, error: FetchError) {
        self.handler.on_item_error(name, &error).await;
        self.mark_cancelled(name, error.to_string()).await;
    }
}

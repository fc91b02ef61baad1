//! Bounded-concurrency dataset fetching
//!
//! A [`Fetcher`] takes a batch of task names and, for each one independently:
//! resolves a source URL, downloads the bytes, decodes them into a [`Dataset`]
//! and reports the outcome to a [`FetchHandler`]. At most `max_concurrent`
//! transfers are in flight at once, however large the batch.
//!
//! - [`resolver`] - name → URL
//! - [`transport`] - URL → bytes
//! - [`decode`] - bytes → dataset

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::error::FetchError;

mod decode;
mod resolver;
mod transport;

pub use decode::{Dataset, DatasetDecoder, DatasetFormat, Decoder};
pub use resolver::{BucketResolver, SourceResolver};
pub use transport::{HttpTransport, Transport};

/// Default ceiling on simultaneous transfers
pub const MAX_CONCURRENT: usize = 10;

/// Receives exactly one callback per item of a batch
#[async_trait::async_trait]
pub trait FetchHandler: Send + Sync {
    /// The item was downloaded and decoded
    async fn on_success(&self, name: &str, dataset: Dataset);

    /// Resolution, transfer or decoding failed for the item
    async fn on_error(&self, name: &str, error: FetchError);
}

/// Callback totals for one [`Fetcher::fetch_all`] call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Items reported through `on_success`
    pub succeeded: usize,
    /// Items reported through `on_error`
    pub failed: usize,
}

/// Resolves, downloads and decodes batches of datasets
///
/// Holds no per-batch state; the transport (and its connection pool) is
/// reused across calls.
#[derive(Clone)]
pub struct Fetcher {
    resolver: Arc<dyn SourceResolver>,
    transport: Arc<dyn Transport>,
    decoder: Arc<dyn Decoder>,
    max_concurrent: usize,
}

impl Fetcher {
    /// Assemble a fetcher from its three stages
    ///
    /// `max_concurrent` is clamped to at least one.
    pub fn new(
        resolver: Arc<dyn SourceResolver>,
        transport: Arc<dyn Transport>,
        decoder: Arc<dyn Decoder>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            resolver,
            transport,
            decoder,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Public-bucket resolver, HTTP transport and netCDF decoder from `config`
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        config.validate()?;
        let resolver = BucketResolver::from_config(&config.source).map_err(|e| {
            crate::Error::Config {
                message: format!("invalid base_url: {}", e),
                key: Some("source.base_url".to_string()),
            }
        })?;
        let transport = HttpTransport::new(&config.fetch)?;

        Ok(Self::new(
            Arc::new(resolver),
            Arc::new(transport),
            Arc::new(DatasetDecoder),
            config.fetch.max_concurrent,
        ))
    }

    /// Ceiling on simultaneous transfers
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Fetch every item of `names`, reporting each through `handler`
    ///
    /// Returns once every item has reached exactly one callback. A failing
    /// item never cancels its siblings. Callback order is unspecified.
    pub async fn fetch_all<H>(&self, names: &[String], handler: &H) -> FetchSummary
    where
        H: FetchHandler + ?Sized,
    {
        let gate = Semaphore::new(self.max_concurrent);
        let succeeded = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);

        tracing::debug!(
            batch_size = names.len(),
            max_concurrent = self.max_concurrent,
            "starting batch fetch"
        );

        let items = names.iter().map(|name| {
            let gate = &gate;
            let succeeded = &succeeded;
            let failed = &failed;
            async move {
                match self.fetch_dataset(name, gate).await {
                    Ok(dataset) => {
                        handler.on_success(name, dataset).await;
                        succeeded.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        tracing::warn!(task = %name, kind = e.kind(), error = %e, "fetch failed");
                        handler.on_error(name, e).await;
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        });
        futures::future::join_all(items).await;

        FetchSummary {
            succeeded: succeeded.into_inner(),
            failed: failed.into_inner(),
        }
    }

    /// Resolve, download under the gate, then decode
    async fn fetch_dataset(&self, name: &str, gate: &Semaphore) -> Result<Dataset, FetchError> {
        let url = self.resolver.resolve(name)?;
        let bytes = self.download_gated(&url, gate).await?;
        self.decoder.decode(name, bytes)
    }

    /// Hold a gate permit for exactly the duration of the transfer
    async fn download_gated(&self, url: &url::Url, gate: &Semaphore) -> Result<Bytes, FetchError> {
        let _permit = gate.acquire().await.map_err(|_| FetchError::Transfer {
            url: url.to_string(),
            status: None,
            reason: "concurrency gate closed".to_string(),
        })?;
        self.transport.download(url).await
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("max_concurrent", &self.max_concurrent)
            .finish_non_exhaustive()
    }
}

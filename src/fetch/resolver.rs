//! Identifier → transfer source resolution.

use crate::config::SourceConfig;
use crate::error::FetchError;
use url::Url;

/// Maps a task name to the URL its bytes are downloaded from
///
/// Called once per item before the transfer. Closures with the matching
/// signature implement this trait too.
pub trait SourceResolver: Send + Sync {
    /// Resolve `name` to a download URL
    fn resolve(&self, name: &str) -> Result<Url, FetchError>;
}

impl<F> SourceResolver for F
where
    F: Fn(&str) -> Result<Url, FetchError> + Send + Sync,
{
    fn resolve(&self, name: &str) -> Result<Url, FetchError> {
        self(name)
    }
}

/// Resolves object names inside a public storage bucket
///
/// `ABI-L2-CMIPF/2019/316/00/file.nc` becomes
/// `{base_url}/{bucket}/ABI-L2-CMIPF/2019/316/00/file.nc`, with every path
/// segment percent-encoded. Names that already are `http(s)` URLs are used
/// as-is.
#[derive(Debug, Clone)]
pub struct BucketResolver {
    base: Url,
    bucket: String,
}

impl BucketResolver {
    /// Create a resolver for `bucket` served from `base_url`
    pub fn new(base_url: &str, bucket: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            base: Url::parse(base_url)?,
            bucket: bucket.to_string(),
        })
    }

    /// Create a resolver from the source settings
    pub fn from_config(config: &SourceConfig) -> Result<Self, url::ParseError> {
        Self::new(&config.base_url, &config.bucket)
    }
}

impl SourceResolver for BucketResolver {
    fn resolve(&self, name: &str) -> Result<Url, FetchError> {
        let failure = |reason: &str| FetchError::Resolution {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(failure("empty object name"));
        }

        if name.starts_with("http://") || name.starts_with("https://") {
            return Url::parse(name).map_err(|e| failure(&e.to_string()));
        }

        let segments: Vec<&str> = name.trim_start_matches('/').split('/').collect();
        if segments
            .iter()
            .any(|s| s.is_empty() || *s == "." || *s == "..")
        {
            return Err(failure("object name has an empty or relative path segment"));
        }

        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| failure("base URL cannot carry a path"))?
            .pop_if_empty()
            .push(&self.bucket)
            .extend(segments);
        Ok(url)
    }
}

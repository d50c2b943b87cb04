//! Lazy resolution of item metadata and duration.

use std::sync::Arc;
use tracing::{debug, warn};

use super::cache::{fingerprint, MetadataCache};
use super::types::MediaMetadata;
use crate::converter::{Converter, ConverterError};
use crate::queue::QueueItem;

/// Stats resolved for an item before it is converted.
#[derive(Debug, Clone, Default)]
pub struct ResolvedStats {
    pub metadata: Option<Arc<MediaMetadata>>,
    /// Seconds; 0 when every source failed.
    pub duration_secs: f64,
    pub size_bytes: Option<u64>,
}

/// Resolves metadata through the cache and the prober.
pub struct MetadataResolver<C: Converter> {
    converter: Arc<C>,
    cache: MetadataCache,
}

impl<C: Converter> MetadataResolver<C> {
    pub fn new(converter: Arc<C>) -> Self {
        Self {
            converter,
            cache: MetadataCache::new(),
        }
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Metadata for an item: already attached, cached, or freshly probed.
    pub async fn metadata(&self, item: &QueueItem) -> Result<Arc<MediaMetadata>, ConverterError> {
        if let Some(metadata) = &item.metadata {
            return Ok(Arc::clone(metadata));
        }

        let key = fingerprint(&item.path).await.ok();
        if let Some(cached) = key.as_deref().and_then(|k| self.cache.get(k)) {
            debug!(item = %item.name, "Metadata cache hit");
            return Ok(cached);
        }

        let metadata = Arc::new(self.converter.probe(&item.path).await?);
        if let Some(key) = key {
            self.cache.insert(key, Arc::clone(&metadata));
        }
        Ok(metadata)
    }

    /// Fills in whatever the item is missing.
    ///
    /// Duration falls back from the item itself, to the full probe, to a
    /// duration-only probe, to 0. Never fails.
    pub async fn resolve(&self, item: &QueueItem) -> ResolvedStats {
        let size_bytes = if item.size_bytes == 0 {
            tokio::fs::metadata(&item.path).await.ok().map(|m| m.len())
        } else {
            None
        };

        let metadata = match self.metadata(item).await {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!(item = %item.name, "Metadata probe failed: {}", e);
                None
            }
        };

        let mut duration_secs = item.duration();
        if duration_secs <= 0.0 {
            duration_secs = metadata
                .as_ref()
                .map(|m| m.format.duration_secs)
                .unwrap_or(0.0);
        }
        if duration_secs <= 0.0 {
            duration_secs = match self.converter.probe_duration(&item.path).await {
                Ok(d) => d,
                Err(e) => {
                    warn!(
                        item = %item.name,
                        "Duration unavailable, progress will be degraded: {}", e
                    );
                    0.0
                }
            };
        }

        ResolvedStats {
            metadata,
            duration_secs,
            size_bytes,
        }
    }
}

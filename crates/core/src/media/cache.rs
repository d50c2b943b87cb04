//! Metadata cache keyed by file fingerprint.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::UNIX_EPOCH;

use super::types::MediaMetadata;

/// Fingerprint of a file: SHA-256 over (path, size, modification time).
///
/// A file rewritten in place gets a new fingerprint, so stale metadata is
/// never served for it.
pub async fn fingerprint(path: &Path) -> std::io::Result<String> {
    let meta = tokio::fs::metadata(path).await?;
    let modified_nanos = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    Ok(fingerprint_parts(path, meta.len(), modified_nanos))
}

fn fingerprint_parts(path: &Path, size: u64, modified_nanos: u128) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update([0u8]);
    hasher.update(size.to_le_bytes());
    hasher.update(modified_nanos.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// In-memory cache of probed metadata.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: RwLock<HashMap<String, Arc<MediaMetadata>>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<MediaMetadata>> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub fn insert(&self, key: String, metadata: Arc<MediaMetadata>) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, metadata);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_fingerprint_parts_differ() {
        let path = Path::new("/videos/a.mp4");
        let base = fingerprint_parts(path, 100, 1);
        assert_eq!(base, fingerprint_parts(path, 100, 1));
        assert_ne!(base, fingerprint_parts(path, 101, 1));
        assert_ne!(base, fingerprint_parts(path, 100, 2));
        assert_ne!(base, fingerprint_parts(Path::new("/videos/b.mp4"), 100, 1));
    }

    #[tokio::test]
    async fn test_fingerprint_changes_with_content() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"one").unwrap();
        let first = fingerprint(file.path()).await.unwrap();

        std::fs::write(file.path(), b"longer content").unwrap();
        let second = fingerprint(file.path()).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_fingerprint_missing_file() {
        assert!(fingerprint(Path::new("/nonexistent/clip.mp4")).await.is_err());
    }

    #[test]
    fn test_cache_roundtrip() {
        let cache = MetadataCache::new();
        assert!(cache.is_empty());
        cache.insert("k".to_string(), Arc::new(MediaMetadata::default()));
        assert!(cache.get("k").is_some());
        assert!(cache.get("other").is_none());
        assert_eq!(cache.len(), 1);
    }
}

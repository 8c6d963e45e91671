//! Local thumbnail image cache
//!
//! Thumbnails are content-addressed by the last path segment of their
//! remote URL. A file that already exists is served as-is with no network
//! access and no staleness re-validation. Downloads go to a unique
//! temporary sibling and are renamed into place, so racing writers for the
//! same filename can never leave a torn file behind.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;

use crate::domain::errors::CrawlError;

/// Thumbnail resolution as the sync engine sees it.
#[async_trait]
pub trait ThumbnailStore: Send + Sync {
    /// Return the local path for `remote_url`, downloading it first if it
    /// is not cached yet.
    async fn ensure(&self, remote_url: &str) -> Result<PathBuf, CrawlError>;
}

/// Filesystem-backed thumbnail cache.
pub struct ThumbnailCache {
    cache_dir: PathBuf,
    client: reqwest::Client,
    max_concurrent: usize,
}

impl ThumbnailCache {
    pub fn new(cache_dir: PathBuf, max_concurrent: usize) -> Self {
        Self {
            cache_dir,
            client: reqwest::Client::new(),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Local cache path for a remote URL: cache dir + last path segment.
    pub fn local_path(&self, remote_url: &str) -> Result<PathBuf, CrawlError> {
        let parsed = Url::parse(remote_url)
            .map_err(|e| CrawlError::Parse(format!("invalid thumbnail URL {remote_url}: {e}")))?;
        let filename = parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .ok_or_else(|| {
                CrawlError::Parse(format!("thumbnail URL has no file segment: {remote_url}"))
            })?;
        Ok(self.cache_dir.join(filename))
    }

    /// Warm the cache for a batch of already-known items, fanning out with
    /// a bounded worker count. Used outside the crawl loop (bulk display
    /// loads); individual failures are logged and counted, not propagated.
    pub async fn prefetch(&self, remote_urls: &[String]) -> usize {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let tasks = remote_urls.iter().map(|remote_url| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                match self.ensure(remote_url).await {
                    Ok(_) => true,
                    Err(err) => {
                        tracing::warn!(%remote_url, %err, "thumbnail prefetch failed");
                        false
                    }
                }
            }
        });

        let results = futures::future::join_all(tasks).await;
        results.into_iter().filter(|ok| *ok).count()
    }

    async fn download_to(&self, remote_url: &str, path: &Path) -> Result<(), CrawlError> {
        tracing::info!(%remote_url, ?path, "downloading thumbnail");
        let response = self.client.get(remote_url).send().await?;
        if !response.status().is_success() {
            return Err(CrawlError::Network(format!(
                "thumbnail request failed with status {}: {remote_url}",
                response.status()
            )));
        }
        let bytes = response.bytes().await?;
        write_atomic(path, &bytes).await
    }
}

#[async_trait]
impl ThumbnailStore for ThumbnailCache {
    async fn ensure(&self, remote_url: &str) -> Result<PathBuf, CrawlError> {
        let path = self.local_path(remote_url)?;

        if tokio::fs::try_exists(&path)
            .await
            .map_err(|e| CrawlError::Storage(e.to_string()))?
        {
            tracing::debug!(?path, "thumbnail already cached");
            return Ok(path);
        }

        self.download_to(remote_url, &path).await?;
        Ok(path)
    }
}

/// Write via a unique temporary sibling, then rename into place. Rename is
/// atomic on the same filesystem, so a reader (or a racing writer) only
/// ever sees a complete file at the final path.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CrawlError> {
    let parent = path
        .parent()
        .ok_or_else(|| CrawlError::Storage(format!("no parent directory for {path:?}")))?;
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| CrawlError::Storage(e.to_string()))?;

    let tmp = parent.join(format!(
        ".{}.{}.part",
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        uuid::Uuid::new_v4()
    ));
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| CrawlError::Storage(e.to_string()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| CrawlError::Storage(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn local_path_uses_the_last_url_segment() {
        let cache = ThumbnailCache::new(PathBuf::from("/cache"), 5);
        let path = cache
            .local_path("https://img.example/items/cable-a.jpg")
            .unwrap();
        assert_eq!(path, PathBuf::from("/cache/cable-a.jpg"));
    }

    #[test]
    fn query_string_does_not_leak_into_the_filename() {
        let cache = ThumbnailCache::new(PathBuf::from("/cache"), 5);
        let path = cache
            .local_path("https://img.example/cable-a.jpg?sz=150&fmt=webp")
            .unwrap();
        assert_eq!(path, PathBuf::from("/cache/cable-a.jpg"));
    }

    #[test]
    fn url_without_a_file_segment_is_rejected() {
        let cache = ThumbnailCache::new(PathBuf::from("/cache"), 5);
        assert!(cache.local_path("https://img.example").is_err());
    }

    #[tokio::test]
    async fn cached_file_short_circuits_without_network() {
        let dir = tempdir().unwrap();
        let cache = ThumbnailCache::new(dir.path().to_path_buf(), 5);
        let cached = dir.path().join("cable-a.jpg");
        tokio::fs::write(&cached, b"existing bytes").await.unwrap();

        // The fake host would fail any real request; a cache hit never
        // touches the network, so both calls succeed and agree.
        let first = cache
            .ensure("https://img.invalid/cable-a.jpg")
            .await
            .unwrap();
        let second = cache
            .ensure("https://img.invalid/cable-a.jpg")
            .await
            .unwrap();

        assert_eq!(first, cached);
        assert_eq!(first, second);
        let bytes = tokio::fs::read(&cached).await.unwrap();
        assert_eq!(bytes, b"existing bytes");
    }

    #[tokio::test]
    async fn prefetch_counts_cache_hits_as_resolved() {
        let dir = tempdir().unwrap();
        let cache = ThumbnailCache::new(dir.path().to_path_buf(), 2);
        tokio::fs::write(dir.path().join("a.jpg"), b"a").await.unwrap();
        tokio::fs::write(dir.path().join("b.jpg"), b"b").await.unwrap();

        let resolved = cache
            .prefetch(&[
                "https://img.invalid/a.jpg".to_string(),
                "https://img.invalid/b.jpg".to_string(),
            ])
            .await;
        assert_eq!(resolved, 2);
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temporary_files() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("cable-a.jpg");
        write_atomic(&target, b"image bytes").await.unwrap();

        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"image bytes");
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["cable-a.jpg".to_string()]);
    }
}

//! File-based page cache with TTL.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

/// Cached page with its fetch time
#[derive(Serialize, Deserialize)]
struct CacheEntry {
    url: String,
    html: String,
    cached_at: DateTime<Utc>,
}

/// Fetched HTML keyed by URL
pub struct PageCache {
    base_dir: PathBuf,
    ttl: Duration,
}

impl PageCache {
    pub fn new(base_dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            base_dir: base_dir.into(),
            ttl,
        }
    }

    /// Readable prefix of the URL plus a hash, safe as a file name
    fn cache_path(&self, url: &str) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);
        let stem: String = url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .take(60)
            .collect();
        self.base_dir
            .join(format!("{}-{:016x}.json", stem, hasher.finish()))
    }

    /// Cached HTML if present and fresh
    pub fn get(&self, url: &str) -> Option<String> {
        let path = self.cache_path(url);
        if !path.exists() {
            return None;
        }

        let content = std::fs::read_to_string(&path).ok()?;
        let entry: CacheEntry = serde_json::from_str(&content).ok()?;

        if Utc::now() - entry.cached_at > self.ttl || entry.url != url {
            let _ = std::fs::remove_file(&path);
            return None;
        }

        Some(entry.html)
    }

    pub fn set(&self, url: &str, html: &str) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir)?;

        let entry = CacheEntry {
            url: url.to_string(),
            html: html.to_string(),
            cached_at: Utc::now(),
        };
        std::fs::write(self.cache_path(url), serde_json::to_string(&entry)?)?;

        Ok(())
    }

    #[cfg(test)]
    pub fn clear(&self) -> Result<()> {
        if self.base_dir.exists() {
            std::fs::remove_dir_all(&self.base_dir)?;
        }
        Ok(())
    }
}

//! In-process shared caches
//!
//! Uses moka async cache (Send + Sync, last writer wins per key).
//! Owned by whoever builds the service and passed in explicitly.

use moka::future::Cache;
use serde::{Deserialize, Serialize};

/// Concurrency-safe key/value cache with string keys
#[derive(Clone)]
pub struct SharedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    entries: Cache<String, V>,
}

impl<V> SharedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache holding at most `max_capacity` entries, without expiry
    pub fn new(max_capacity: u64) -> Self {
        SharedCache {
            entries: Cache::builder().max_capacity(max_capacity).build(),
        }
    }

    /// Get a cached value
    pub async fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).await
    }

    /// Store a value, replacing any previous one
    pub async fn put(&self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), value).await;
    }

    /// Remove one entry, or everything when `key` is `None`
    pub async fn clear(&self, key: Option<&str>) {
        match key {
            Some(key) => self.entries.invalidate(key).await,
            None => self.entries.invalidate_all(),
        }
    }

    /// Keys currently cached, sorted
    pub async fn keys(&self) -> Vec<String> {
        self.entries.run_pending_tasks().await;
        let mut keys: Vec<String> = self.entries.iter().map(|(k, _)| k.as_ref().clone()).collect();
        keys.sort();
        keys
    }
}

impl<V> Default for SharedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(10_000)
    }
}

/// Biological annotation of one gene program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramAnnotation {
    /// Program identifier, e.g. "new_program_5_activity_scaled"
    pub program: String,
    /// Short name
    pub name: String,
    /// One or two sentence description
    pub description: String,
    /// Broad category (e.g. "immune", "metabolic")
    pub category: String,
    /// Annotator confidence ("high", "medium", "low")
    pub confidence: String,
}

/// Annotations keyed by program identifier
pub type AnnotationCache = SharedCache<ProgramAnnotation>;

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(program: &str, name: &str) -> ProgramAnnotation {
        ProgramAnnotation {
            program: program.to_string(),
            name: name.to_string(),
            description: String::new(),
            category: "immune".to_string(),
            confidence: "high".to_string(),
        }
    }

    #[tokio::test]
    async fn test_get_put_clear() {
        let cache = AnnotationCache::default();

        assert!(cache.get("program_5").await.is_none());

        cache.put("program_5", annotation("program_5", "Type 2 inflammation")).await;
        cache.put("program_7", annotation("program_7", "Epithelial barrier")).await;
        assert_eq!(
            cache.get("program_5").await.unwrap().name,
            "Type 2 inflammation"
        );
        assert_eq!(cache.keys().await, vec!["program_5", "program_7"]);

        cache.clear(Some("program_5")).await;
        assert!(cache.get("program_5").await.is_none());
        assert!(cache.get("program_7").await.is_some());

        cache.clear(None).await;
        assert!(cache.get("program_7").await.is_none());
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let cache = AnnotationCache::default();
        cache.put("program_5", annotation("program_5", "first")).await;
        cache.put("program_5", annotation("program_5", "second")).await;

        assert_eq!(cache.get("program_5").await.unwrap().name, "second");
    }

    #[tokio::test]
    async fn test_shared_between_tasks() {
        let cache: SharedCache<u32> = SharedCache::new(100);

        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.put(format!("k{}", i), i).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        for i in 0..8u32 {
            assert_eq!(cache.get(&format!("k{}", i)).await, Some(i));
        }
    }
}

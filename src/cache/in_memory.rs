use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::{future::Cache as MokaCache, Expiry};

use super::Cache;

/// Longest lifetime an entry may be given.
const MAX_ENTRY_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 365);

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn new(value: &str, ttl: Duration) -> Self {
        Self {
            value: value.to_string(),
            expires_at: Instant::now() + ttl.min(MAX_ENTRY_TTL),
        }
    }

    fn is_live(&self) -> bool {
        self.expires_at > Instant::now()
    }
}

/// Entries leave the cache only when their own deadline passes.
struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, value: &Entry, created_at: Instant) -> Option<Duration> {
        Some(value.expires_at.saturating_duration_since(created_at))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.expires_at.saturating_duration_since(updated_at))
    }
}

/// moka-backed cache honouring a TTL per entry. Unbounded: tokens and
/// markers are never evicted before they expire.
pub struct InMemoryCache {
    entries: MokaCache<String, Entry>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            entries: MokaCache::builder().expire_after(EntryExpiry).build(),
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        match self.entries.get(key).await {
            Some(entry) if entry.is_live() => Ok(Some(entry.value)),
            Some(_) => {
                self.entries.invalidate(key).await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        self.entries
            .insert(key.to_string(), Entry::new(value, ttl))
            .await;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<bool> {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with_if(async { Entry::new(value, ttl) }, |current| !current.is_live())
            .await;
        Ok(entry.is_fresh())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.invalidate(key).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete() {
        let cache = InMemoryCache::new();
        cache.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        cache.delete("k").await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn entries_expire_after_their_ttl() {
        let cache = InMemoryCache::new();
        cache.set("short", "1", Duration::from_millis(20)).await.unwrap();
        cache.set("long", "2", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get("short").await.unwrap().is_none());
        assert_eq!(cache.get("long").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn set_if_absent_claims_a_key_once() {
        let cache = InMemoryCache::new();
        assert!(cache.set_if_absent("m", "a", Duration::from_secs(60)).await.unwrap());
        assert!(!cache.set_if_absent("m", "b", Duration::from_secs(60)).await.unwrap());
        assert_eq!(cache.get("m").await.unwrap().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn set_if_absent_replaces_an_expired_value() {
        let cache = InMemoryCache::new();
        cache.set("m", "old", Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.set_if_absent("m", "new", Duration::from_secs(60)).await.unwrap());
        assert_eq!(cache.get("m").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn huge_ttl_is_capped() {
        let cache = InMemoryCache::new();
        cache.set("k", "v", Duration::MAX).await.unwrap();
        assert!(cache.set_if_absent("m", "v", Duration::MAX).await.unwrap());
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn many_entries_are_all_kept() {
        let cache = InMemoryCache::new();
        for i in 0..20_000 {
            cache.set(&format!("k{i}"), "v", Duration::from_secs(60)).await.unwrap();
        }
        cache.entries.run_pending_tasks().await;
        assert_eq!(cache.get("k0").await.unwrap().as_deref(), Some("v"));
        assert_eq!(cache.get("k19999").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn deleting_a_missing_key_is_fine() {
        let cache = InMemoryCache::new();
        cache.delete("nothing").await.unwrap();
    }
}

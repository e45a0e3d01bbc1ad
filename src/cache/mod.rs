//! TTL key/value cache backing the one-time token store.

use std::time::Duration;

use async_trait::async_trait;

pub mod in_memory;
pub mod redis;

/// Per-key operations are expected to be strongly consistent.
/// There are no cross-key transactions.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()>;

    /// Write only if the key holds no live value. Returns whether the write
    /// happened; the check and the write are one atomic step per key.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<bool>;

    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}

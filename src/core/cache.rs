use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// A value paired with the instant it stops being served.
#[derive(Debug, Clone)]
pub struct CachedValue<T> {
    value: T,
    expires_at: Instant,
}

impl<T> CachedValue<T> {
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    pub fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }

    pub fn fresh(&self) -> Option<&T> {
        self.is_fresh().then_some(&self.value)
    }

    /// The stored value regardless of freshness.
    pub fn value(&self) -> &T {
        &self.value
    }
}

/// Process-wide keyed TTL store. Clones share the same slots.
///
/// Entries are never evicted explicitly; a stale entry reads as a miss and
/// is overwritten by the next `put`.
#[derive(Clone)]
pub struct ResponseCache<T> {
    inner: Arc<RwLock<HashMap<String, CachedValue<T>>>>,
}

impl<T: Clone> ResponseCache<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &str) -> Option<T> {
        self.inner
            .read()
            .await
            .get(key)
            .and_then(|entry| entry.fresh().cloned())
    }

    pub async fn put(&self, key: &str, value: T, ttl: Duration) {
        self.inner
            .write()
            .await
            .insert(key.to_string(), CachedValue::new(value, ttl));
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

impl<T: Clone> Default for ResponseCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

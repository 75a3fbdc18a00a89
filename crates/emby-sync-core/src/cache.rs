use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// How long bulk listings are trusted.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct Entry<T> {
    payload: Arc<T>,
    fetched_at: Instant,
}

/// A single cached value with a fixed time-to-live.
///
/// Readers never see a half-built payload: a refresh replaces the whole
/// entry under the write lock, and concurrent callers that arrive while a
/// refresh is running wait for it instead of issuing their own.
pub struct TtlCache<T> {
    name: &'static str,
    ttl: Duration,
    slot: RwLock<Option<Entry<T>>>,
}

impl<T> TtlCache<T> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            slot: RwLock::new(None),
        }
    }

    fn fresh(&self, entry: &Option<Entry<T>>) -> Option<Arc<T>> {
        entry
            .as_ref()
            .filter(|e| e.fetched_at.elapsed() < self.ttl)
            .map(|e| e.payload.clone())
    }

    /// Returns the cached payload or runs `refresh` and stores its result.
    ///
    /// A failed refresh leaves the previous entry untouched.
    pub async fn get_or_try_refresh<F, Fut, E>(&self, refresh: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        {
            let slot = self.slot.read().await;
            if let Some(payload) = self.fresh(&slot) {
                debug!(cache = self.name, "Cache hit");
                return Ok(payload);
            }
        }

        let mut slot = self.slot.write().await;
        if let Some(payload) = self.fresh(&slot) {
            debug!(cache = self.name, "Cache hit after wait");
            return Ok(payload);
        }

        debug!(cache = self.name, "Cache miss, refreshing");
        let payload = Arc::new(refresh().await?);
        *slot = Some(Entry {
            payload: payload.clone(),
            fetched_at: Instant::now(),
        });
        Ok(payload)
    }

    pub async fn invalidate(&self) {
        let mut slot = self.slot.write().await;
        if slot.take().is_some() {
            debug!(cache = self.name, "Cache invalidated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn load(counter: &AtomicUsize) -> Result<Vec<u32>, String> {
        let n = counter.fetch_add(1, Ordering::SeqCst) as u32;
        Ok(vec![n])
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_only_after_ttl() {
        let cache = TtlCache::new("movies", DEFAULT_TTL);
        let calls = AtomicUsize::new(0);

        let first = cache.get_or_try_refresh(|| load(&calls)).await.unwrap();
        tokio::time::advance(Duration::from_secs(299)).await;
        let second = cache.get_or_try_refresh(|| load(&calls)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));

        tokio::time::advance(Duration::from_secs(2)).await;
        let third = cache.get_or_try_refresh(|| load(&calls)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*third, vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_nothing_new() {
        let cache: TtlCache<Vec<u32>> = TtlCache::new("series", DEFAULT_TTL);

        let err = cache
            .get_or_try_refresh(|| async { Err::<Vec<u32>, _>("offline".to_string()) })
            .await
            .unwrap_err();
        assert_eq!(err, "offline");

        // Nothing was stored, so the next caller refreshes.
        let calls = AtomicUsize::new(0);
        cache.get_or_try_refresh(|| load(&calls)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_refresh() {
        let cache = TtlCache::new("collections", DEFAULT_TTL);
        let calls = AtomicUsize::new(0);

        cache.get_or_try_refresh(|| load(&calls)).await.unwrap();
        cache.invalidate().await;
        cache.get_or_try_refresh(|| load(&calls)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

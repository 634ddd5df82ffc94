//! Short-lived cache of network usage readings
//!
//! Concurrent score calls for the same node within the TTL share one
//! backend query: the first caller runs it and the others await its
//! result. Failures are never cached.

use super::NetUsageSource;
use crate::error::TelemetryError;
use crate::observability::SchedulerMetrics;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::trace;

#[derive(Debug, Clone, Copy)]
struct Reading {
    rate: f64,
    fetched_at: Instant,
}

/// One node's reading; empty while its query is in flight
type Slot = Arc<OnceCell<Reading>>;

/// Wraps a [`NetUsageSource`] with a per-node TTL cache
pub struct CachedUsageSource<S> {
    inner: S,
    ttl: Duration,
    slots: DashMap<String, Slot>,
    metrics: SchedulerMetrics,
}

impl<S: NetUsageSource> CachedUsageSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            slots: DashMap::new(),
            metrics: SchedulerMetrics::new(),
        }
    }

    fn is_fresh(&self, reading: &Reading) -> bool {
        reading.fetched_at.elapsed() < self.ttl
    }

    /// Current slot for `node`, replacing one that holds an expired reading
    fn slot(&self, node: &str) -> Slot {
        let mut slot = self.slots.entry(node.to_string()).or_default();
        if slot.get().is_some_and(|r| !self.is_fresh(r)) {
            *slot = Slot::default();
        }
        Arc::clone(slot.value())
    }

    /// Drop readings older than the TTL; in-flight queries are kept
    pub fn evict_expired(&self) {
        self.slots
            .retain(|_, slot| slot.get().map_or(true, |r| self.is_fresh(r)));
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[async_trait]
impl<S: NetUsageSource> NetUsageSource for CachedUsageSource<S> {
    async fn transmit_rate(&self, node: &str, instance: &str) -> Result<f64, TelemetryError> {
        let slot = self.slot(node);
        let queried = AtomicBool::new(false);

        let inner = &self.inner;
        let flag = &queried;
        let result = slot
            .get_or_try_init(|| async move {
                flag.store(true, Ordering::Relaxed);
                let rate = inner.transmit_rate(node, instance).await?;
                Ok::<_, TelemetryError>(Reading {
                    rate,
                    fetched_at: Instant::now(),
                })
            })
            .await;

        match result {
            Ok(reading) => {
                if queried.load(Ordering::Relaxed) {
                    self.metrics.inc_telemetry_cache_misses();
                } else {
                    trace!(node = %node, rate = reading.rate, "Network usage cache hit");
                    self.metrics.inc_telemetry_cache_hits();
                }
                Ok(reading.rate)
            }
            Err(e) => {
                self.metrics.inc_telemetry_cache_misses();
                self.slots.remove_if(node, |_, current| Arc::ptr_eq(current, &slot));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::task::JoinSet;

    struct CountingSource {
        calls: Arc<AtomicUsize>,
        fail: bool,
        delay: Duration,
    }

    #[async_trait]
    impl NetUsageSource for CountingSource {
        async fn transmit_rate(&self, _node: &str, _instance: &str) -> Result<f64, TelemetryError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(TelemetryError::Timeout(Duration::from_secs(10)))
            } else {
                Ok(100.0 + n as f64)
            }
        }
    }

    fn source(fail: bool) -> (CountingSource, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            CountingSource {
                calls: Arc::clone(&calls),
                fail,
                delay: Duration::ZERO,
            },
            calls,
        )
    }

    #[tokio::test]
    async fn test_repeated_reads_hit_cache() {
        let (inner, calls) = source(false);
        let cache = CachedUsageSource::new(inner, Duration::from_secs(60));

        assert_eq!(cache.transmit_rate("node1", "ip1").await.unwrap(), 100.0);
        assert_eq!(cache.transmit_rate("node1", "ip1").await.unwrap(), 100.0);
        assert_eq!(cache.transmit_rate("node2", "ip2").await.unwrap(), 101.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_queries() {
        let (inner, calls) = source(false);
        let cache = CachedUsageSource::new(inner, Duration::ZERO);

        cache.transmit_rate("node1", "ip1").await.unwrap();
        cache.transmit_rate("node1", "ip1").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cache.evict_expired();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let (inner, calls) = source(true);
        let cache = CachedUsageSource::new(inner, Duration::from_secs(60));

        assert!(cache.transmit_rate("node1", "ip1").await.is_err());
        assert!(cache.transmit_rate("node1", "ip1").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_one_query() {
        let (mut inner, calls) = source(false);
        inner.delay = Duration::from_millis(100);
        let cache = Arc::new(CachedUsageSource::new(inner, Duration::from_secs(60)));

        let mut readers = JoinSet::new();
        for _ in 0..5 {
            let cache = Arc::clone(&cache);
            readers.spawn(async move { cache.transmit_rate("node1", "ip1").await });
        }
        while let Some(joined) = readers.join_next().await {
            assert_eq!(joined.unwrap().unwrap(), 100.0);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_reading_is_refreshed() {
        let (inner, calls) = source(false);
        let cache = CachedUsageSource::new(inner, Duration::from_millis(20));

        assert_eq!(cache.transmit_rate("node1", "ip1").await.unwrap(), 100.0);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.transmit_rate("node1", "ip1").await.unwrap(), 101.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

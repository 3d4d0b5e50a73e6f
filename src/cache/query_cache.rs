//! 查询结果缓存
//!
//! 每个分区一个 moka 缓存，固定 TTL。同一 key 的并发未命中只计算一次。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, trace};

use crate::errors::{Result, ViewPulseError};

pub struct QueryCache<V> {
    name: &'static str,
    inner: Cache<String, V>,
}

impl<V> QueryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, ttl: Duration, max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        debug!(
            "QueryCache '{}' initialized (ttl: {}s, capacity: {})",
            name,
            ttl.as_secs(),
            max_capacity
        );
        Self { name, inner }
    }

    /// 命中直接返回；未命中时执行 compute 并写入。计算失败不缓存。
    pub async fn get_or_compute<F>(&self, key: String, compute: F) -> Result<V>
    where
        F: Future<Output = Result<V>>,
    {
        if let Some(value) = self.inner.get(&key).await {
            trace!("QueryCache '{}' hit: {}", self.name, key);
            return Ok(value);
        }

        trace!("QueryCache '{}' miss: {}", self.name, key);
        self.inner
            .try_get_with(key, compute)
            .await
            .map_err(|e: Arc<ViewPulseError>| (*e).clone())
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
        debug!("QueryCache '{}' invalidated", self.name);
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_memoizes_until_invalidated() {
        let cache: QueryCache<u32> = QueryCache::new("test", Duration::from_secs(60), 16);
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_compute("k".to_string(), async {
                    Ok(calls.fetch_add(1, Ordering::SeqCst) + 10)
                })
                .await
                .unwrap();
            assert_eq!(value, 10);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate_all();
        let value = cache
            .get_or_compute("k".to_string(), async {
                Ok(calls.fetch_add(1, Ordering::SeqCst) + 10)
            })
            .await
            .unwrap();
        assert_eq!(value, 11);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache: QueryCache<u32> = QueryCache::new("test", Duration::from_secs(60), 16);

        let err = cache
            .get_or_compute("k".to_string(), async {
                Err(ViewPulseError::transient_storage("db down"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ViewPulseError::TransientStorage(_)));

        let value = cache
            .get_or_compute("k".to_string(), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}

use async_trait::async_trait;
use moka::future::Cache;
use moka::policy::Expiry;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::cache::TicketStore;
use crate::errors::{Result, ViewPulseError};

/// 每个票据按写入时给定的 TTL 过期
struct TicketExpiry;

impl Expiry<String, Duration> for TicketExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Duration,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(*value)
    }
}

/// 进程内票据存储
///
/// 缓存本身不设容量上限：票据只能因 TTL 到期而消失，绝不被淘汰。
/// `max_tickets` 是准入上限，达到后拒绝新票据（TransientStorage），
/// 已存在的票据照常判为重复。
pub struct MokaTicketStore {
    inner: Cache<String, Duration>,
    max_tickets: u64,
}

impl MokaTicketStore {
    pub fn new(max_tickets: u64) -> Self {
        let inner = Cache::builder().expire_after(TicketExpiry).build();

        debug!(
            "MokaTicketStore initialized, admitting up to {} live tickets",
            max_tickets
        );
        Self { inner, max_tickets }
    }

    /// entry_count 是近似值，先跑一次维护任务再下结论
    async fn is_full(&self) -> bool {
        if self.inner.entry_count() < self.max_tickets {
            return false;
        }
        self.inner.run_pending_tasks().await;
        self.inner.entry_count() >= self.max_tickets
    }

    #[cfg(test)]
    pub(crate) async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }
}

#[async_trait]
impl TicketStore for MokaTicketStore {
    async fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool> {
        if self.inner.contains_key(key) {
            return Ok(false);
        }
        if self.is_full().await {
            return Err(ViewPulseError::transient_storage(format!(
                "ticket store full ({} live tickets)",
                self.max_tickets
            )));
        }

        let entry = self.inner.entry(key.to_string()).or_insert(ttl).await;
        Ok(entry.is_fresh())
    }

    async fn release(&self, key: &str) -> Result<()> {
        self.inner.invalidate(key).await;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const TTL: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_set_if_absent_once() {
        let store = MokaTicketStore::new(100);
        assert!(store.set_if_absent("viewed:a:b:1", TTL).await.unwrap());
        assert!(!store.set_if_absent("viewed:a:b:1", TTL).await.unwrap());
        assert!(store.set_if_absent("viewed:a:b:2", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_allows_reinsert() {
        let store = MokaTicketStore::new(100);
        assert!(store.set_if_absent("k", TTL).await.unwrap());
        store.release("k").await.unwrap();
        assert!(store.set_if_absent("k", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn test_ticket_expires_after_ttl() {
        let store = MokaTicketStore::new(100);
        assert!(
            store
                .set_if_absent("short", Duration::from_millis(100))
                .await
                .unwrap()
        );
        tokio::time::sleep(Duration::from_millis(300)).await;
        store.run_pending_tasks().await;
        assert!(
            store
                .set_if_absent("short", Duration::from_millis(100))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_full_store_keeps_existing_tickets() {
        let store = MokaTicketStore::new(100);
        assert!(store.set_if_absent("viewed:first", TTL).await.unwrap());

        for i in 0..5000 {
            let _ = store.set_if_absent(&format!("viewed:other:{}", i), TTL).await;
        }
        store.run_pending_tasks().await;

        // 早先的票据没有被挤掉
        assert!(!store.set_if_absent("viewed:first", TTL).await.unwrap());
        assert!(!store.set_if_absent("viewed:other:0", TTL).await.unwrap());

        // 满了以后新票据被拒绝，而不是当作新浏览
        let refused = store.set_if_absent("viewed:late", TTL).await;
        assert!(matches!(refused, Err(ViewPulseError::TransientStorage(_))));
    }

    #[tokio::test]
    async fn test_expired_tickets_free_capacity() {
        let store = MokaTicketStore::new(2);
        let short = Duration::from_millis(100);
        assert!(store.set_if_absent("a", short).await.unwrap());
        assert!(store.set_if_absent("b", short).await.unwrap());
        store.run_pending_tasks().await;
        assert!(store.set_if_absent("c", TTL).await.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(store.set_if_absent("c", TTL).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_set_if_absent_single_winner() {
        let store = Arc::new(MokaTicketStore::new(1000));
        let mut handles = Vec::new();
        for _ in 0..64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.set_if_absent("same-key", TTL).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}

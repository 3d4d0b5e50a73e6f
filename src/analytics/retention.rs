//! 原始事件清理
//!
//! 删除保留期之前的浏览与搜索事件。两张表分别删除，一张失败不影响另一张。
//! 计数器、来源汇总与每日汇总不受影响。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info};

use crate::storage::SeaOrmStorage;

/// 清理报告
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RetentionReport {
    pub cutoff: Option<DateTime<Utc>>,
    pub deleted_views: u64,
    pub deleted_searches: u64,
    /// 任意一张表删除失败
    pub failed: bool,
}

pub struct RetentionSweeper {
    storage: Arc<SeaOrmStorage>,
    retention_days: u32,
}

impl RetentionSweeper {
    pub fn new(storage: Arc<SeaOrmStorage>, retention_days: u32) -> Self {
        Self {
            storage,
            retention_days,
        }
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    /// 早于 `now - retention_days` 的事件会被删除
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.retention_days as i64)
    }

    pub async fn sweep(&self, now: DateTime<Utc>) -> RetentionReport {
        let cutoff = self.cutoff(now);
        let mut report = RetentionReport {
            cutoff: Some(cutoff),
            ..Default::default()
        };

        match self.storage.delete_views_before(cutoff).await {
            Ok(deleted) => report.deleted_views = deleted,
            Err(e) => {
                error!("Failed to prune view events before {}: {}", cutoff, e);
                report.failed = true;
            }
        }

        match self.storage.delete_searches_before(cutoff).await {
            Ok(deleted) => report.deleted_searches = deleted,
            Err(e) => {
                error!("Failed to prune search events before {}: {}", cutoff, e);
                report.failed = true;
            }
        }

        info!(
            "Retention sweep completed: {} view events, {} search events older than {} days",
            report.deleted_views, report.deleted_searches, self.retention_days
        );
        report
    }
}

//! 每日聚合任务
//!
//! 把某一天 `[00:00, 次日 00:00) UTC` 的原始事件汇总成一行 daily_metrics，
//! 按日期 upsert，重复执行结果相同。之后执行保留期清理并失效相关查询缓存。

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::retention::RetentionSweeper;
use crate::cache::{CacheInvalidator, CacheScope};
use crate::errors::{Result, ViewPulseError};
use crate::metrics_core::{MetricsRecorder, NoopMetrics};
use crate::storage::{DailyMetrics, SeaOrmStorage, TopContentEntry, TopReferrerEntry, TopSearchEntry};

/// 单日聚合结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total_views: i64,
    pub unique_visitors: i64,
    pub total_searches: i64,
    pub metrics_written: bool,
    pub deleted_views: u64,
    pub deleted_searches: u64,
    /// 保留期清理有一张表删除失败
    pub retention_failed: bool,
}

/// 某日的 UTC 时间范围 `[start, end)`
pub fn day_bounds(date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ViewPulseError::date_parse(format!("invalid date: {}", date)))?
        .and_utc();
    Ok((start, start + Duration::days(1)))
}

/// 距离下一次 `hour_utc:00` 的时间
pub fn duration_until_next_run(now: DateTime<Utc>, hour_utc: u32) -> StdDuration {
    let hour = hour_utc.min(23);
    let today_run = now
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .map(|t| t.and_utc())
        .unwrap_or(now);
    let next = if today_run > now {
        today_run
    } else {
        today_run + Duration::days(1)
    };
    (next - now).to_std().unwrap_or_default()
}

pub struct AggregationJob {
    storage: Arc<SeaOrmStorage>,
    retention: RetentionSweeper,
    top_n: u64,
    invalidators: Vec<Arc<dyn CacheInvalidator>>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl AggregationJob {
    pub fn new(storage: Arc<SeaOrmStorage>, retention_days: u32, top_n: u64) -> Self {
        Self {
            retention: RetentionSweeper::new(storage.clone(), retention_days),
            storage,
            top_n,
            invalidators: Vec::new(),
            metrics: NoopMetrics::arc(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    /// 聚合成功后需要失效的查询缓存
    pub fn with_invalidator(mut self, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        self.invalidators.push(invalidator);
        self
    }

    /// 计算某日的汇总（不写库）
    pub async fn compute_metrics(&self, date: NaiveDate) -> Result<DailyMetrics> {
        let (start, end) = day_bounds(date)?;
        let storage = &self.storage;

        let total_views = storage.count_views_between(start, end).await?;
        let unique_visitors = storage.count_unique_visitors_between(start, end).await?;
        let total_searches = storage.count_searches_between(start, end).await?;

        let top_content = storage
            .top_content_between(start, end, self.top_n, false)
            .await?
            .into_iter()
            .map(|row| TopContentEntry {
                id: row.content_id,
                content_ref: row.content_ref,
                title: row.title,
                views: row.views,
            })
            .collect();

        let top_searches = storage
            .top_queries_between(start, end, self.top_n)
            .await?
            .into_iter()
            .map(|row| TopSearchEntry {
                query: row.query_text,
                count: row.searches,
            })
            .collect();

        let top_referrers = storage
            .top_view_referrers_between(start, end, self.top_n)
            .await?
            .into_iter()
            .map(|row| TopReferrerEntry {
                domain: row.referrer_domain,
                count: row.count,
            })
            .collect();

        Ok(DailyMetrics {
            date,
            total_views: total_views as i64,
            unique_visitors: unique_visitors as i64,
            total_searches: total_searches as i64,
            top_content,
            top_searches,
            top_referrers,
        })
    }

    /// 聚合指定日期并执行保留期清理
    ///
    /// 汇总写入失败时仍会执行清理，随后返回带日期的 Aggregation 错误。
    pub async fn run_daily_aggregation(&self, date: NaiveDate) -> Result<DailySummary> {
        debug!("Running daily aggregation for {}", date);

        let written = match self.compute_metrics(date).await {
            Ok(metrics) => self
                .storage
                .upsert_daily_metrics(&metrics)
                .await
                .map(|_| metrics),
            Err(e) => Err(e),
        };

        let mut summary = DailySummary {
            date,
            total_views: 0,
            unique_visitors: 0,
            total_searches: 0,
            metrics_written: false,
            deleted_views: 0,
            deleted_searches: 0,
            retention_failed: false,
        };

        let failure = match written {
            Ok(metrics) => {
                summary.total_views = metrics.total_views;
                summary.unique_visitors = metrics.unique_visitors;
                summary.total_searches = metrics.total_searches;
                summary.metrics_written = true;
                for invalidator in &self.invalidators {
                    invalidator.invalidate(&CacheScope::AFTER_AGGREGATION);
                }
                None
            }
            Err(e) => {
                error!("Daily aggregation for {} failed: {}", date, e);
                Some(e)
            }
        };

        let retention = self.retention.sweep(Utc::now()).await;
        summary.deleted_views = retention.deleted_views;
        summary.deleted_searches = retention.deleted_searches;
        summary.retention_failed = retention.failed;
        if retention.failed {
            self.metrics.inc_retention_failure();
        }

        if let Some(e) = failure {
            self.metrics.inc_aggregation_run("failure");
            return Err(ViewPulseError::aggregation(format!(
                "aggregation for {} failed: {}",
                date,
                e.message()
            )));
        }

        self.metrics.inc_aggregation_run("success");
        if summary.retention_failed {
            warn!("Daily aggregation for {} completed but retention sweep failed", date);
        }
        info!(
            "Daily aggregation for {} completed: {} views, {} unique visitors, {} searches",
            date, summary.total_views, summary.unique_visitors, summary.total_searches
        );
        Ok(summary)
    }

    /// 聚合昨天（UTC）
    pub async fn run_for_yesterday(&self) -> Result<DailySummary> {
        let yesterday = Utc::now()
            .date_naive()
            .pred_opt()
            .ok_or_else(|| ViewPulseError::date_parse("date underflow"))?;
        self.run_daily_aggregation(yesterday).await
    }

    /// 依次聚合 `[from, to]` 中的每一天
    pub async fn backfill(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailySummary>> {
        if from > to {
            return Err(ViewPulseError::validation(format!(
                "backfill range is empty: {} > {}",
                from, to
            )));
        }

        let mut summaries = Vec::new();
        for date in from.iter_days().take_while(|d| *d <= to) {
            summaries.push(self.run_daily_aggregation(date).await?);
        }
        Ok(summaries)
    }

    /// 启动每日定时聚合
    ///
    /// 单个循环串行执行，不会与自身重叠。
    pub fn spawn_background_task(self: Arc<Self>, hour_utc: u32) {
        tokio::spawn(async move {
            loop {
                let wait = duration_until_next_run(Utc::now(), hour_utc);
                debug!("Next daily aggregation in {} s", wait.as_secs());
                tokio::time::sleep(wait).await;

                if let Err(e) = self.run_for_yesterday().await {
                    error!("Scheduled aggregation failed: {}", e);
                }
            }
        });

        info!(
            "Daily aggregation scheduler started (runs at {:02}:00 UTC)",
            hour_utc.min(23)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_day_bounds() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let (start, end) = day_bounds(date).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_next_run_later_today() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 0, 30, 0).unwrap();
        assert_eq!(
            duration_until_next_run(now, 1),
            StdDuration::from_secs(30 * 60)
        );
    }

    #[test]
    fn test_next_run_tomorrow() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 1, 0, 0).unwrap();
        assert_eq!(
            duration_until_next_run(now, 1),
            StdDuration::from_secs(24 * 3600)
        );

        let late = Utc.with_ymd_and_hms(2026, 3, 14, 22, 0, 0).unwrap();
        assert_eq!(
            duration_until_next_run(late, 1),
            StdDuration::from_secs(3 * 3600)
        );
    }
}

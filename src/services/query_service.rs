//! 查询门面
//!
//! 热门内容、热门搜索、汇总等读接口，结果放在短 TTL 缓存里。
//! 缓存只通过 [`QueryFacade::invalidate`] 显式失效；采集不失效任何缓存，
//! 读到的数据最多落后一个 TTL。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;

use crate::cache::{CacheInvalidator, CacheScope, QueryCache};
use crate::config::CacheConfig;
use crate::errors::{Result, ViewPulseError};
use crate::storage::{DailyMetrics, SeaOrmStorage};

pub const MAX_WINDOW_DAYS: u32 = 365;
pub const MAX_LIMIT: u64 = 100;
pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const DEFAULT_TRENDING_LIMIT: u64 = 5;
pub const DEFAULT_SEARCH_LIMIT: u64 = 20;
pub const DEFAULT_HOT_LIMIT: u64 = 5;

/// 汇总中各榜单的长度
const SUMMARY_LIST_LEN: u64 = 10;
/// 汇总中附带的每日汇总行数
const SUMMARY_DAILY_ROWS: u64 = 7;

/// 热门关键词导出：最近 30 天前 50 个搜索词
pub const KEYWORD_EXPORT_DAYS: u32 = 30;
pub const KEYWORD_EXPORT_LIMIT: u64 = 50;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrendingItem {
    pub content_ref: String,
    pub title: String,
    pub views: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HotItem {
    pub content_ref: String,
    pub title: String,
    pub trending_score: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PopularSearch {
    pub query: String,
    pub searches: i64,
    pub clicks: i64,
    pub ctr: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReferrerRollup {
    pub domain: String,
    pub visits: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SummaryOverview {
    pub total_views: i64,
    pub unique_visitors: i64,
    pub total_searches: i64,
    pub avg_daily_views: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailySnapshot {
    pub date: NaiveDate,
    pub total_views: i64,
    pub unique_visitors: i64,
    pub total_searches: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnalyticsSummary {
    pub period_days: u32,
    pub generated_at: DateTime<Utc>,
    pub overview: SummaryOverview,
    pub trending_content: Vec<TrendingItem>,
    pub top_referrers: Vec<ReferrerRollup>,
    pub top_searches: Vec<PopularSearch>,
    pub daily_metrics: Vec<DailySnapshot>,
}

/// 供静态站点构建使用的热门关键词快照
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KeywordExport {
    pub generated_at: DateTime<Utc>,
    pub period_days: u32,
    pub keywords: Vec<PopularSearch>,
}

impl KeywordExport {
    /// 写成带缩进的 JSON，必要时创建父目录
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!("Keyword export written to {}", path.display());
        Ok(())
    }
}

/// 点击率（百分比，保留一位小数）；searches 为 0 时为 0
pub fn click_through_rate(clicks: i64, searches: i64) -> f64 {
    if searches <= 0 {
        return 0.0;
    }
    (clicks as f64 / searches as f64 * 1000.0).round() / 10.0
}

fn validate_window(window_days: u32) -> Result<()> {
    if window_days == 0 || window_days > MAX_WINDOW_DAYS {
        return Err(ViewPulseError::validation(format!(
            "window_days must be between 1 and {}",
            MAX_WINDOW_DAYS
        )));
    }
    Ok(())
}

fn validate_limit(limit: u64) -> Result<()> {
    if limit == 0 || limit > MAX_LIMIT {
        return Err(ViewPulseError::validation(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }
    Ok(())
}

/// 滚动窗口 `[now - window_days, now]`
fn window_bounds(window_days: u32) -> (DateTime<Utc>, DateTime<Utc>) {
    let now = Utc::now();
    // 上界取下一秒，包含本秒内刚写入的事件
    (
        now - Duration::days(window_days as i64),
        now + Duration::seconds(1),
    )
}

/// 查询缓存配置
#[derive(Debug, Clone)]
pub struct QuerySettings {
    pub trending_ttl: StdDuration,
    pub summary_ttl: StdDuration,
    pub max_entries: u64,
}

impl From<&CacheConfig> for QuerySettings {
    fn from(config: &CacheConfig) -> Self {
        Self {
            trending_ttl: StdDuration::from_secs(config.trending_ttl_secs),
            summary_ttl: StdDuration::from_secs(config.summary_ttl_secs),
            max_entries: config.max_query_entries,
        }
    }
}

pub struct QueryFacade {
    storage: Arc<SeaOrmStorage>,
    trending_cache: QueryCache<Vec<TrendingItem>>,
    hot_cache: QueryCache<Vec<HotItem>>,
    searches_cache: QueryCache<Vec<PopularSearch>>,
    keywords_cache: QueryCache<KeywordExport>,
    summary_cache: QueryCache<AnalyticsSummary>,
}

impl QueryFacade {
    pub fn new(storage: Arc<SeaOrmStorage>, settings: QuerySettings) -> Self {
        Self {
            storage,
            trending_cache: QueryCache::new(
                "trending",
                settings.trending_ttl,
                settings.max_entries,
            ),
            hot_cache: QueryCache::new("hot_by_score", settings.trending_ttl, settings.max_entries),
            searches_cache: QueryCache::new(
                "popular_searches",
                settings.summary_ttl,
                settings.max_entries,
            ),
            keywords_cache: QueryCache::new("keywords", settings.summary_ttl, 1),
            summary_cache: QueryCache::new("summary", settings.summary_ttl, settings.max_entries),
        }
    }

    /// 窗口内浏览最多的已发布内容
    pub async fn trending(&self, window_days: u32, limit: u64) -> Result<Vec<TrendingItem>> {
        validate_window(window_days)?;
        validate_limit(limit)?;

        self.trending_cache
            .get_or_compute(
                format!("{}:{}", window_days, limit),
                self.compute_trending(window_days, limit),
            )
            .await
    }

    async fn compute_trending(&self, window_days: u32, limit: u64) -> Result<Vec<TrendingItem>> {
        let (start, end) = window_bounds(window_days);
        let rows = self
            .storage
            .top_content_between(start, end, limit, true)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| TrendingItem {
                content_ref: row.content_ref,
                title: row.title,
                views: row.views,
            })
            .collect())
    }

    /// 按实时热度分排序的已发布内容（只含热度分大于 0 的）
    pub async fn hot_by_score(&self, limit: u64) -> Result<Vec<HotItem>> {
        validate_limit(limit)?;

        self.hot_cache
            .get_or_compute(limit.to_string(), async {
                let items = self.storage.hot_by_score(limit).await?;
                Ok(items
                    .into_iter()
                    .map(|item| HotItem {
                        content_ref: item.content_ref,
                        title: item.title,
                        trending_score: item.trending_score,
                    })
                    .collect())
            })
            .await
    }

    /// 窗口内的热门搜索及点击率
    pub async fn popular_searches(
        &self,
        window_days: u32,
        limit: u64,
    ) -> Result<Vec<PopularSearch>> {
        validate_window(window_days)?;
        validate_limit(limit)?;

        self.searches_cache
            .get_or_compute(
                format!("{}:{}", window_days, limit),
                self.compute_popular_searches(window_days, limit),
            )
            .await
    }

    async fn compute_popular_searches(
        &self,
        window_days: u32,
        limit: u64,
    ) -> Result<Vec<PopularSearch>> {
        let (start, end) = window_bounds(window_days);
        let rows = self.storage.top_queries_between(start, end, limit).await?;

        Ok(rows
            .into_iter()
            .map(|row| PopularSearch {
                ctr: click_through_rate(row.clicks, row.searches),
                query: row.query_text,
                searches: row.searches,
                clicks: row.clicks,
            })
            .collect())
    }

    /// 最近 30 天的热门搜索词快照，和 popular_searches 同源同序
    pub async fn trending_keywords(&self) -> Result<KeywordExport> {
        self.keywords_cache
            .get_or_compute("export".to_string(), async {
                let keywords = self
                    .compute_popular_searches(KEYWORD_EXPORT_DAYS, KEYWORD_EXPORT_LIMIT)
                    .await?;
                Ok(KeywordExport {
                    generated_at: Utc::now(),
                    period_days: KEYWORD_EXPORT_DAYS,
                    keywords,
                })
            })
            .await
    }

    /// 窗口汇总
    pub async fn summary(&self, window_days: u32) -> Result<AnalyticsSummary> {
        validate_window(window_days)?;

        self.summary_cache
            .get_or_compute(window_days.to_string(), self.compute_summary(window_days))
            .await
    }

    async fn compute_summary(&self, window_days: u32) -> Result<AnalyticsSummary> {
        let (start, end) = window_bounds(window_days);
        let storage = &self.storage;

        let total_views = storage.count_views_between(start, end).await? as i64;
        let unique_visitors = storage.count_unique_visitors_between(start, end).await? as i64;
        let total_searches = storage.count_searches_between(start, end).await? as i64;

        let trending_content = self.compute_trending(window_days, SUMMARY_LIST_LEN).await?;
        let top_searches = self
            .compute_popular_searches(window_days, SUMMARY_LIST_LEN)
            .await?;

        let top_referrers = storage
            .referrer_rollup_since(start, SUMMARY_LIST_LEN)
            .await?
            .into_iter()
            .map(|row| ReferrerRollup {
                domain: row.referrer_domain,
                visits: row.count,
            })
            .collect();

        let daily_metrics = storage
            .recent_daily_metrics(start.date_naive(), end.date_naive(), SUMMARY_DAILY_ROWS)
            .await?
            .into_iter()
            .map(|m| DailySnapshot {
                date: m.date,
                total_views: m.total_views,
                unique_visitors: m.unique_visitors,
                total_searches: m.total_searches,
            })
            .collect();

        Ok(AnalyticsSummary {
            period_days: window_days,
            generated_at: Utc::now(),
            overview: SummaryOverview {
                total_views,
                unique_visitors,
                total_searches,
                avg_daily_views: (total_views as f64 / window_days as f64).round() as i64,
            },
            trending_content,
            top_referrers,
            top_searches,
            daily_metrics,
        })
    }

    /// 历史单日汇总
    pub async fn daily_metrics(&self, date: NaiveDate) -> Result<Option<DailyMetrics>> {
        self.storage.find_daily_metrics(date).await
    }
}

impl CacheInvalidator for QueryFacade {
    fn invalidate(&self, scopes: &[CacheScope]) {
        for scope in scopes {
            match scope {
                CacheScope::Trending => self.trending_cache.invalidate_all(),
                CacheScope::HotByScore => self.hot_cache.invalidate_all(),
                CacheScope::PopularSearches => {
                    self.searches_cache.invalidate_all();
                    self.keywords_cache.invalidate_all();
                }
                CacheScope::Summary => self.summary_cache.invalidate_all(),
            }
        }
        debug!("Query caches invalidated: {:?}", scopes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctr_rounding() {
        assert_eq!(click_through_rate(2, 5), 40.0);
        assert_eq!(click_through_rate(1, 3), 33.3);
        assert_eq!(click_through_rate(2, 3), 66.7);
        assert_eq!(click_through_rate(0, 10), 0.0);
        assert_eq!(click_through_rate(5, 5), 100.0);
    }

    #[test]
    fn test_ctr_zero_searches() {
        assert_eq!(click_through_rate(0, 0), 0.0);
        assert_eq!(click_through_rate(3, 0), 0.0);
    }

    #[test]
    fn test_keyword_export_written_as_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("static").join("trending-keywords.json");
        let export = KeywordExport {
            generated_at: Utc::now(),
            period_days: KEYWORD_EXPORT_DAYS,
            keywords: vec![PopularSearch {
                query: "rust".to_string(),
                searches: 4,
                clicks: 1,
                ctr: click_through_rate(1, 4),
            }],
        };
        export.write_to(&path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["period_days"], 30);
        assert_eq!(written["keywords"][0]["query"], "rust");
        assert_eq!(written["keywords"][0]["ctr"], 25.0);
        assert!(written["generated_at"].is_string());
    }

    #[test]
    fn test_bounds_validation() {
        assert!(validate_window(1).is_ok());
        assert!(validate_window(365).is_ok());
        assert!(matches!(
            validate_window(0),
            Err(ViewPulseError::Validation(_))
        ));
        assert!(matches!(
            validate_window(366),
            Err(ViewPulseError::Validation(_))
        ));
        assert!(validate_limit(100).is_ok());
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(101).is_err());
    }
}

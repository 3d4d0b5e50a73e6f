//! 聚合与查询用的统计 SQL
//!
//! 所有时间范围均为左闭右开 `[start, end)`。

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, EntityTrait, FromQueryResult, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};

use super::{SeaOrmStorage, retry, storage_error};
use crate::errors::Result;
use crate::storage::{DailyMetrics, TopContentEntry, TopReferrerEntry, TopSearchEntry};

use migration::entities::{content_item, daily_metrics, referrer_record, search_event, view_event};

// ============ 查询结果类型 ============

/// 按内容分组的浏览数
#[derive(Debug, FromQueryResult)]
pub struct ContentViewsRow {
    pub content_id: i64,
    pub content_ref: String,
    pub title: String,
    pub views: i64,
}

/// 按查询词分组的搜索数与点击数
#[derive(Debug, FromQueryResult)]
pub struct QueryStatsRow {
    pub query_text: String,
    pub searches: i64,
    pub clicks: i64,
}

/// 按域名分组的计数
#[derive(Debug, FromQueryResult)]
pub struct DomainCountRow {
    pub referrer_domain: String,
    pub count: i64,
}

// ============ SeaOrmStorage 统计方法 ============

impl SeaOrmStorage {
    pub async fn count_views_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<u64> {
        let db = &self.db;
        retry::with_retry("count_views_between", self.retry_config, || async {
            view_event::Entity::find()
                .filter(view_event::Column::OccurredAt.gte(start))
                .filter(view_event::Column::OccurredAt.lt(end))
                .count(db)
                .await
        })
        .await
        .map_err(|e| storage_error("count_views_between", e))
    }

    /// 区间内不同 (visitor_id_hash, agent_hash) 组合数
    pub async fn count_unique_visitors_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64> {
        let db = &self.db;
        retry::with_retry("count_unique_visitors_between", self.retry_config, || async {
            view_event::Entity::find()
                .select_only()
                .column(view_event::Column::VisitorIdHash)
                .column(view_event::Column::AgentHash)
                .distinct()
                .filter(view_event::Column::OccurredAt.gte(start))
                .filter(view_event::Column::OccurredAt.lt(end))
                .count(db)
                .await
        })
        .await
        .map_err(|e| storage_error("count_unique_visitors_between", e))
    }

    pub async fn count_searches_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64> {
        let db = &self.db;
        retry::with_retry("count_searches_between", self.retry_config, || async {
            search_event::Entity::find()
                .filter(search_event::Column::OccurredAt.gte(start))
                .filter(search_event::Column::OccurredAt.lt(end))
                .count(db)
                .await
        })
        .await
        .map_err(|e| storage_error("count_searches_between", e))
    }

    /// 浏览数最多的内容，按浏览数降序、内容 ID 升序
    ///
    /// `published_only` 为 true 时只统计当前仍公开的内容。
    pub async fn top_content_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u64,
        published_only: bool,
    ) -> Result<Vec<ContentViewsRow>> {
        let db = &self.db;
        retry::with_retry("top_content_between", self.retry_config, || async {
            let mut query = view_event::Entity::find()
                .select_only()
                .column(view_event::Column::ContentId)
                .column(content_item::Column::ContentRef)
                .column(content_item::Column::Title)
                .column_as(view_event::Column::Id.count(), "views")
                .join(JoinType::InnerJoin, view_event::Relation::ContentItem.def())
                .filter(view_event::Column::OccurredAt.gte(start))
                .filter(view_event::Column::OccurredAt.lt(end));

            if published_only {
                query = query.filter(content_item::Column::IsPublished.eq(true));
            }

            query
                .group_by(view_event::Column::ContentId)
                .group_by(content_item::Column::ContentRef)
                .group_by(content_item::Column::Title)
                .order_by_desc(Expr::cust("views"))
                .order_by_asc(view_event::Column::ContentId)
                .limit(limit)
                .into_model::<ContentViewsRow>()
                .all(db)
                .await
        })
        .await
        .map_err(|e| storage_error("top_content_between", e))
    }

    /// 搜索最多的查询词，按搜索次数降序、查询词升序
    ///
    /// clicks 为回填了点击内容的搜索事件数。
    pub async fn top_queries_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<QueryStatsRow>> {
        let db = &self.db;
        retry::with_retry("top_queries_between", self.retry_config, || async {
            search_event::Entity::find()
                .select_only()
                .column(search_event::Column::QueryText)
                .column_as(search_event::Column::Id.count(), "searches")
                .column_as(search_event::Column::ClickedContentId.count(), "clicks")
                .filter(search_event::Column::OccurredAt.gte(start))
                .filter(search_event::Column::OccurredAt.lt(end))
                .group_by(search_event::Column::QueryText)
                .order_by_desc(Expr::cust("searches"))
                .order_by_asc(search_event::Column::QueryText)
                .limit(limit)
                .into_model::<QueryStatsRow>()
                .all(db)
                .await
        })
        .await
        .map_err(|e| storage_error("top_queries_between", e))
    }

    /// 区间内浏览事件的来源域名排行，按次数降序、域名升序
    pub async fn top_view_referrers_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<DomainCountRow>> {
        let db = &self.db;
        retry::with_retry("top_view_referrers_between", self.retry_config, || async {
            view_event::Entity::find()
                .select_only()
                .column(view_event::Column::ReferrerDomain)
                .column_as(view_event::Column::Id.count(), "count")
                .filter(view_event::Column::OccurredAt.gte(start))
                .filter(view_event::Column::OccurredAt.lt(end))
                .filter(view_event::Column::ReferrerDomain.is_not_null())
                .group_by(view_event::Column::ReferrerDomain)
                .order_by_desc(Expr::cust("count"))
                .order_by_asc(view_event::Column::ReferrerDomain)
                .limit(limit)
                .into_model::<DomainCountRow>()
                .all(db)
                .await
        })
        .await
        .map_err(|e| storage_error("top_view_referrers_between", e))
    }

    /// 最近活跃的来源记录按域名汇总（每条来源记录计 1）
    pub async fn referrer_rollup_since(
        &self,
        since: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<DomainCountRow>> {
        let db = &self.db;
        retry::with_retry("referrer_rollup_since", self.retry_config, || async {
            referrer_record::Entity::find()
                .select_only()
                .column(referrer_record::Column::ReferrerDomain)
                .column_as(referrer_record::Column::Id.count(), "count")
                .filter(referrer_record::Column::LastSeenAt.gte(since))
                .group_by(referrer_record::Column::ReferrerDomain)
                .order_by_desc(Expr::cust("count"))
                .order_by_asc(referrer_record::Column::ReferrerDomain)
                .limit(limit)
                .into_model::<DomainCountRow>()
                .all(db)
                .await
        })
        .await
        .map_err(|e| storage_error("referrer_rollup_since", e))
    }

    // ============ daily_metrics ============

    /// 按日期 upsert 汇总行；created_at 只在首次插入时写入
    pub async fn upsert_daily_metrics(&self, metrics: &DailyMetrics) -> Result<()> {
        let model = daily_metrics::ActiveModel {
            metric_date: Set(metrics.date),
            total_views: Set(metrics.total_views),
            unique_visitors: Set(metrics.unique_visitors),
            total_searches: Set(metrics.total_searches),
            top_content: Set(serde_json::to_string(&metrics.top_content)?),
            top_searches: Set(serde_json::to_string(&metrics.top_searches)?),
            top_referrers: Set(serde_json::to_string(&metrics.top_referrers)?),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        let on_conflict = OnConflict::column(daily_metrics::Column::MetricDate)
            .update_columns([
                daily_metrics::Column::TotalViews,
                daily_metrics::Column::UniqueVisitors,
                daily_metrics::Column::TotalSearches,
                daily_metrics::Column::TopContent,
                daily_metrics::Column::TopSearches,
                daily_metrics::Column::TopReferrers,
            ])
            .to_owned();

        let db = &self.db;
        retry::with_retry(
            &format!("upsert_daily_metrics({})", metrics.date),
            self.retry_config,
            || async {
                daily_metrics::Entity::insert(model.clone())
                    .on_conflict(on_conflict.clone())
                    .exec_without_returning(db)
                    .await
            },
        )
        .await
        .map_err(|e| storage_error("upsert_daily_metrics", e))?;

        Ok(())
    }

    pub async fn find_daily_metrics(&self, date: NaiveDate) -> Result<Option<DailyMetrics>> {
        let db = &self.db;
        let model = retry::with_retry("find_daily_metrics", self.retry_config, || async {
            daily_metrics::Entity::find()
                .filter(daily_metrics::Column::MetricDate.eq(date))
                .one(db)
                .await
        })
        .await
        .map_err(|e| storage_error("find_daily_metrics", e))?;

        model.map(decode_daily_metrics).transpose()
    }

    /// `[from, to]` 区间内最近的若干行，按日期降序
    pub async fn recent_daily_metrics(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        limit: u64,
    ) -> Result<Vec<DailyMetrics>> {
        let db = &self.db;
        let models = retry::with_retry("recent_daily_metrics", self.retry_config, || async {
            daily_metrics::Entity::find()
                .filter(daily_metrics::Column::MetricDate.gte(from))
                .filter(daily_metrics::Column::MetricDate.lte(to))
                .order_by_desc(daily_metrics::Column::MetricDate)
                .limit(limit)
                .all(db)
                .await
        })
        .await
        .map_err(|e| storage_error("recent_daily_metrics", e))?;

        models.into_iter().map(decode_daily_metrics).collect()
    }

    /// 同一日期的行数（幂等校验用）
    pub async fn count_daily_metrics_rows(&self, date: NaiveDate) -> Result<u64> {
        daily_metrics::Entity::find()
            .filter(daily_metrics::Column::MetricDate.eq(date))
            .count(&self.db)
            .await
            .map_err(|e| storage_error("count_daily_metrics_rows", e))
    }

    // ============ 保留策略 ============

    /// 一次性删除 cutoff 之前的浏览事件
    pub async fn delete_views_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let db = &self.db;
        let result = retry::with_retry("delete_views_before", self.retry_config, || async {
            view_event::Entity::delete_many()
                .filter(view_event::Column::OccurredAt.lt(cutoff))
                .exec(db)
                .await
        })
        .await
        .map_err(|e| storage_error("delete_views_before", e))?;

        Ok(result.rows_affected)
    }

    /// 一次性删除 cutoff 之前的搜索事件
    pub async fn delete_searches_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let db = &self.db;
        let result = retry::with_retry("delete_searches_before", self.retry_config, || async {
            search_event::Entity::delete_many()
                .filter(search_event::Column::OccurredAt.lt(cutoff))
                .exec(db)
                .await
        })
        .await
        .map_err(|e| storage_error("delete_searches_before", e))?;

        Ok(result.rows_affected)
    }
}

fn decode_daily_metrics(model: daily_metrics::Model) -> Result<DailyMetrics> {
    let top_content: Vec<TopContentEntry> = serde_json::from_str(&model.top_content)?;
    let top_searches: Vec<TopSearchEntry> = serde_json::from_str(&model.top_searches)?;
    let top_referrers: Vec<TopReferrerEntry> = serde_json::from_str(&model.top_referrers)?;

    Ok(DailyMetrics {
        date: model.metric_date,
        total_views: model.total_views,
        unique_visitors: model.unique_visitors,
        total_searches: model.total_searches,
        top_content,
        top_searches,
        top_referrers,
    })
}

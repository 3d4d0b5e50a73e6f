use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 内容条目（content_items 表的领域视图）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentItem {
    pub id: i64,
    pub content_ref: String,
    pub title: String,
    pub is_published: bool,
    pub views_count: i64,
    pub likes_count: i64,
    pub comments_count: i64,
    pub trending_score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<migration::entities::content_item::Model> for ContentItem {
    fn from(model: migration::entities::content_item::Model) -> Self {
        Self {
            id: model.id,
            content_ref: model.content_ref,
            title: model.title,
            is_published: model.is_published,
            views_count: model.views_count,
            likes_count: model.likes_count,
            comments_count: model.comments_count,
            trending_score: model.trending_score,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// 待写入的浏览事件
#[derive(Debug, Clone)]
pub struct NewViewEvent {
    pub content_id: i64,
    pub visitor_id_hash: String,
    pub agent_hash: String,
    pub occurred_at: DateTime<Utc>,
    pub referrer: Option<String>,
    pub referrer_domain: Option<String>,
}

/// 待写入的搜索事件
#[derive(Debug, Clone)]
pub struct NewSearchEvent {
    pub query_text: String,
    pub result_count: i32,
    pub visitor_id_hash: String,
    pub occurred_at: DateTime<Utc>,
}

/// 来源命中（用于 referrer_records upsert）
#[derive(Debug, Clone)]
pub struct ReferrerHit {
    pub content_id: i64,
    pub referrer_url: String,
    pub referrer_domain: String,
    pub seen_at: DateTime<Utc>,
}

/// 每日热门内容条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopContentEntry {
    pub id: i64,
    pub content_ref: String,
    pub title: String,
    pub views: i64,
}

/// 每日热门搜索条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopSearchEntry {
    pub query: String,
    pub count: i64,
}

/// 每日热门来源条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopReferrerEntry {
    pub domain: String,
    pub count: i64,
}

/// 每日汇总指标
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyMetrics {
    pub date: NaiveDate,
    pub total_views: i64,
    pub unique_visitors: i64,
    pub total_searches: i64,
    pub top_content: Vec<TopContentEntry>,
    pub top_searches: Vec<TopSearchEntry>,
    pub top_referrers: Vec<TopReferrerEntry>,
}

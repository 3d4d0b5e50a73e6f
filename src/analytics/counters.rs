//! 互动计数与热度分
//!
//! 每次更新在存储层编译为单条 UPDATE：先写 trending_score（用 `列 + 增量` 表达），
//! 再写三个计数器。SQLite/PostgreSQL 以旧行求值 SET 右侧，MySQL 按顺序求值，
//! 两种语义下结果一致。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::trace;

use crate::errors::{Result, ViewPulseError};

/// 单次点赞/评论增量的绝对值上限
pub const MAX_ENGAGEMENT_DELTA: i64 = 1_000_000;

pub const VIEW_WEIGHT: f64 = 0.6;
pub const LIKE_WEIGHT: f64 = 0.3;
pub const COMMENT_WEIGHT: f64 = 0.1;

/// 热度分公式
pub fn trending_score(views: i64, likes: i64, comments: i64) -> f64 {
    VIEW_WEIGHT * views as f64 + LIKE_WEIGHT * likes as f64 + COMMENT_WEIGHT * comments as f64
}

/// 一次计数器增量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngagementDelta {
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
}

impl EngagementDelta {
    pub fn view() -> Self {
        Self {
            views: 1,
            ..Default::default()
        }
    }

    pub fn likes(delta: i64) -> Self {
        Self {
            likes: delta,
            ..Default::default()
        }
    }

    pub fn comments(delta: i64) -> Self {
        Self {
            comments: delta,
            ..Default::default()
        }
    }

    pub fn is_zero(&self) -> bool {
        self.views == 0 && self.likes == 0 && self.comments == 0
    }
}

/// 当前计数器快照
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Engagement {
    pub views_count: i64,
    pub likes_count: i64,
    pub comments_count: i64,
    pub trending_score: f64,
}

/// 计数器存储
#[async_trait]
pub trait EngagementStore: Send + Sync {
    /// 原子应用增量（单条语句）。内容不存在返回 NotFound，
    /// 负增量会使计数器小于 0 时返回 Validation 且不写入。
    async fn apply_engagement_delta(&self, content_id: i64, delta: EngagementDelta) -> Result<()>;

    async fn engagement(&self, content_id: i64) -> Result<Option<Engagement>>;

    /// 按计数器重新计算全部热度分，返回更新行数
    async fn recompute_trending_scores(&self) -> Result<u64>;
}

fn check_delta(counter: &str, delta: i64) -> Result<()> {
    if delta.unsigned_abs() > MAX_ENGAGEMENT_DELTA as u64 {
        return Err(ViewPulseError::validation(format!(
            "{} delta must be within ±{}",
            counter, MAX_ENGAGEMENT_DELTA
        )));
    }
    Ok(())
}

/// 计数器引擎
#[derive(Clone)]
pub struct CounterEngine {
    store: Arc<dyn EngagementStore>,
}

impl CounterEngine {
    pub fn new(store: Arc<dyn EngagementStore>) -> Self {
        Self { store }
    }

    pub async fn record_view(&self, content_id: i64) -> Result<()> {
        trace!("record_view({})", content_id);
        self.store
            .apply_engagement_delta(content_id, EngagementDelta::view())
            .await
    }

    pub async fn record_like(&self, content_id: i64, delta: i64) -> Result<()> {
        check_delta("likes", delta)?;
        if delta == 0 {
            return Ok(());
        }
        self.store
            .apply_engagement_delta(content_id, EngagementDelta::likes(delta))
            .await
    }

    pub async fn record_comment(&self, content_id: i64, delta: i64) -> Result<()> {
        check_delta("comments", delta)?;
        if delta == 0 {
            return Ok(());
        }
        self.store
            .apply_engagement_delta(content_id, EngagementDelta::comments(delta))
            .await
    }

    pub async fn engagement(&self, content_id: i64) -> Result<Option<Engagement>> {
        self.store.engagement(content_id).await
    }

    pub async fn recompute_trending_scores(&self) -> Result<u64> {
        self.store.recompute_trending_scores().await
    }
}

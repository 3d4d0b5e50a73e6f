//! 采集链路依赖的存储接口
//!
//! `SeaOrmStorage` 实现全部接口；测试中可以替换为会失败的实现。

use async_trait::async_trait;

use crate::errors::Result;
use crate::storage::{ContentItem, NewSearchEvent, NewViewEvent, ReferrerHit};

/// 内容查询
#[async_trait]
pub trait ContentDirectory: Send + Sync {
    /// 按 content_ref 查找已发布的内容；不存在或未发布返回 None
    async fn resolve_published(&self, content_ref: &str) -> Result<Option<ContentItem>>;
}

/// 原始事件写入
#[async_trait]
pub trait EventSink: Send + Sync {
    /// 追加浏览事件，返回事件 ID
    async fn append_view(&self, event: NewViewEvent) -> Result<i64>;

    /// 追加搜索事件，返回事件 ID
    async fn append_search(&self, event: NewSearchEvent) -> Result<i64>;

    /// 来源 upsert，重复访问时 visit_count 原子 +1
    async fn upsert_referrer(&self, hit: ReferrerHit) -> Result<()>;

    /// 回填搜索点击；只有 clicked_content_id 仍为空时才写入，返回是否写入
    async fn backfill_search_click(&self, search_event_id: i64, content_id: i64) -> Result<bool>;
}

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::Result;

/// 去重票据存储
///
/// `set_if_absent` 必须是单次原子操作：并发调用同一个 key 时只有一个返回 true。
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// key 不存在时写入并返回 true；已存在（未过期）返回 false
    async fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// 删除票据（事件写入失败时归还，允许客户端重试）
    async fn release(&self, key: &str) -> Result<()>;

    fn backend_name(&self) -> &'static str;
}

/// 查询缓存的分区
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheScope {
    Trending,
    HotByScore,
    PopularSearches,
    Summary,
}

impl CacheScope {
    /// 每日聚合完成后需要失效的缓存
    pub const AFTER_AGGREGATION: [CacheScope; 3] = [
        CacheScope::Trending,
        CacheScope::PopularSearches,
        CacheScope::Summary,
    ];

    /// 内容发布状态变化后需要失效的缓存
    pub const AFTER_VISIBILITY_CHANGE: [CacheScope; 3] = [
        CacheScope::Trending,
        CacheScope::HotByScore,
        CacheScope::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheScope::Trending => "trending",
            CacheScope::HotByScore => "hot_by_score",
            CacheScope::PopularSearches => "popular_searches",
            CacheScope::Summary => "summary",
        }
    }
}

impl std::fmt::Display for CacheScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 显式缓存失效接口
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, scopes: &[CacheScope]);
}

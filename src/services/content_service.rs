//! Content registration service
//!
//! 内容目录的写操作，供 CLI 与 HTTP 共用。发布状态变化会让依赖可见性的查询缓存失效。

use std::sync::Arc;

use tracing::info;

use crate::cache::{CacheInvalidator, CacheScope};
use crate::errors::{Result, ViewPulseError};
use crate::storage::{ContentItem, SeaOrmStorage};

const MAX_REF_LEN: usize = 255;
const MAX_TITLE_LEN: usize = 512;

fn validate_content_ref(content_ref: &str) -> Result<()> {
    if content_ref.trim().is_empty() {
        return Err(ViewPulseError::validation("content_ref must not be empty"));
    }
    if content_ref.len() > MAX_REF_LEN {
        return Err(ViewPulseError::validation(format!(
            "content_ref exceeds {} bytes",
            MAX_REF_LEN
        )));
    }
    if content_ref.chars().any(char::is_whitespace) {
        return Err(ViewPulseError::validation(
            "content_ref must not contain whitespace",
        ));
    }
    Ok(())
}

pub struct ContentService {
    storage: Arc<SeaOrmStorage>,
    invalidator: Option<Arc<dyn CacheInvalidator>>,
}

impl ContentService {
    pub fn new(storage: Arc<SeaOrmStorage>) -> Self {
        Self {
            storage,
            invalidator: None,
        }
    }

    pub fn with_invalidator(mut self, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        self.invalidator = Some(invalidator);
        self
    }

    /// 注册内容；已存在时更新标题与发布状态
    pub async fn register(
        &self,
        content_ref: &str,
        title: &str,
        is_published: bool,
    ) -> Result<ContentItem> {
        validate_content_ref(content_ref)?;
        let title = title.trim();
        if title.is_empty() {
            return Err(ViewPulseError::validation("title must not be empty"));
        }
        if title.len() > MAX_TITLE_LEN {
            return Err(ViewPulseError::validation(format!(
                "title exceeds {} bytes",
                MAX_TITLE_LEN
            )));
        }

        let item = self
            .storage
            .upsert_content(content_ref, title, is_published)
            .await?;
        self.invalidate(&CacheScope::AFTER_VISIBILITY_CHANGE);
        Ok(item)
    }

    pub async fn set_published(&self, content_ref: &str, is_published: bool) -> Result<()> {
        validate_content_ref(content_ref)?;
        self.storage
            .set_published(content_ref, is_published)
            .await?;
        self.invalidate(&CacheScope::AFTER_VISIBILITY_CHANGE);
        Ok(())
    }

    pub async fn find(&self, content_ref: &str) -> Result<ContentItem> {
        self.storage
            .find_content(content_ref)
            .await?
            .ok_or_else(|| ViewPulseError::not_found(format!("内容不存在: {}", content_ref)))
    }

    fn invalidate(&self, scopes: &[CacheScope]) {
        if let Some(invalidator) = &self.invalidator {
            invalidator.invalidate(scopes);
            info!("Content visibility changed, caches invalidated");
        }
    }
}

//! content_items 的读写操作

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use tracing::info;

use super::{SeaOrmStorage, retry, storage_error};
use crate::analytics::ContentDirectory;
use crate::errors::{Result, ViewPulseError};
use crate::storage::ContentItem;

use migration::entities::content_item;

impl SeaOrmStorage {
    /// 注册或更新内容（content_ref 冲突时更新标题与发布状态，计数器保持不变）
    pub async fn upsert_content(
        &self,
        content_ref: &str,
        title: &str,
        is_published: bool,
    ) -> Result<ContentItem> {
        let now = Utc::now();
        let model = content_item::ActiveModel {
            content_ref: Set(content_ref.to_string()),
            title: Set(title.to_string()),
            is_published: Set(is_published),
            views_count: Set(0),
            likes_count: Set(0),
            comments_count: Set(0),
            trending_score: Set(0.0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let db = &self.db;
        retry::with_retry(
            &format!("upsert_content({})", content_ref),
            self.retry_config,
            || {
                let model = model.clone();
                async move {
                    content_item::Entity::insert(model)
                        .on_conflict(
                            OnConflict::column(content_item::Column::ContentRef)
                                .update_columns([
                                    content_item::Column::Title,
                                    content_item::Column::IsPublished,
                                    content_item::Column::UpdatedAt,
                                ])
                                .to_owned(),
                        )
                        .exec_without_returning(db)
                        .await
                }
            },
        )
        .await
        .map_err(|e| storage_error("upsert_content", e))?;

        info!("Content registered: {}", content_ref);

        self.find_content(content_ref).await?.ok_or_else(|| {
            ViewPulseError::database_operation(format!(
                "内容写入后无法读取: {}",
                content_ref
            ))
        })
    }

    pub async fn find_content(&self, content_ref: &str) -> Result<Option<ContentItem>> {
        let db = &self.db;
        let model = retry::with_retry("find_content", self.retry_config, || async {
            content_item::Entity::find()
                .filter(content_item::Column::ContentRef.eq(content_ref))
                .one(db)
                .await
        })
        .await
        .map_err(|e| storage_error("find_content", e))?;

        Ok(model.map(ContentItem::from))
    }

    /// 切换发布状态；内容不存在返回 NotFound
    pub async fn set_published(&self, content_ref: &str, is_published: bool) -> Result<()> {
        let db = &self.db;
        let result = retry::with_retry("set_published", self.retry_config, || async {
            content_item::Entity::update_many()
                .col_expr(content_item::Column::IsPublished, Expr::val(is_published).into())
                .col_expr(content_item::Column::UpdatedAt, Expr::val(Utc::now()).into())
                .filter(content_item::Column::ContentRef.eq(content_ref))
                .exec(db)
                .await
        })
        .await
        .map_err(|e| storage_error("set_published", e))?;

        if result.rows_affected == 0 {
            return Err(ViewPulseError::not_found(format!(
                "内容不存在: {}",
                content_ref
            )));
        }

        info!(
            "Content {} is now {}",
            content_ref,
            if is_published { "published" } else { "hidden" }
        );
        Ok(())
    }

    /// 已发布且热度分大于 0 的内容，按热度分降序、ID 升序
    pub async fn hot_by_score(&self, limit: u64) -> Result<Vec<ContentItem>> {
        let db = &self.db;
        let models = retry::with_retry("hot_by_score", self.retry_config, || async {
            content_item::Entity::find()
                .filter(content_item::Column::IsPublished.eq(true))
                .filter(content_item::Column::TrendingScore.gt(0.0))
                .order_by_desc(content_item::Column::TrendingScore)
                .order_by_asc(content_item::Column::Id)
                .limit(limit)
                .all(db)
                .await
        })
        .await
        .map_err(|e| storage_error("hot_by_score", e))?;

        Ok(models.into_iter().map(ContentItem::from).collect())
    }
}

#[async_trait]
impl ContentDirectory for SeaOrmStorage {
    async fn resolve_published(&self, content_ref: &str) -> Result<Option<ContentItem>> {
        Ok(self
            .find_content(content_ref)
            .await?
            .filter(|item| item.is_published))
    }
}

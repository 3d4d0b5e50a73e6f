//! EngagementStore implementation for SeaOrmStorage

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{ColumnTrait, EntityTrait, ExprTrait, PaginatorTrait, QueryFilter};
use tracing::debug;

use super::{SeaOrmStorage, retry, storage_error};
use crate::analytics::counters::{COMMENT_WEIGHT, LIKE_WEIGHT, VIEW_WEIGHT};
use crate::analytics::{Engagement, EngagementDelta, EngagementStore};
use crate::errors::{Result, ViewPulseError};

use migration::entities::content_item;

/// `列 + 增量`
fn bumped(column: content_item::Column, delta: i64) -> SimpleExpr {
    Expr::col(column).add(Expr::val(delta)).into()
}

/// 0.6*views + 0.3*likes + 0.1*comments，参数为各列的表达式
fn score_expr(views: SimpleExpr, likes: SimpleExpr, comments: SimpleExpr) -> SimpleExpr {
    Expr::val(VIEW_WEIGHT)
        .mul(views)
        .add(Expr::val(LIKE_WEIGHT).mul(likes))
        .add(Expr::val(COMMENT_WEIGHT).mul(comments))
        .into()
}

#[async_trait]
impl EngagementStore for SeaOrmStorage {
    async fn apply_engagement_delta(&self, content_id: i64, delta: EngagementDelta) -> Result<()> {
        if delta.is_zero() {
            return Ok(());
        }

        let db = &self.db;
        let result = retry::with_retry(
            &format!("apply_engagement_delta({})", content_id),
            self.retry_config.at_most_once(),
            || async {
                let views = bumped(content_item::Column::ViewsCount, delta.views);
                let likes = bumped(content_item::Column::LikesCount, delta.likes);
                let comments = bumped(content_item::Column::CommentsCount, delta.comments);

                // trending_score 必须是第一个 SET 子句
                let mut update = content_item::Entity::update_many()
                    .col_expr(
                        content_item::Column::TrendingScore,
                        score_expr(views.clone(), likes.clone(), comments.clone()),
                    )
                    .col_expr(content_item::Column::ViewsCount, views)
                    .col_expr(content_item::Column::LikesCount, likes)
                    .col_expr(content_item::Column::CommentsCount, comments)
                    .col_expr(content_item::Column::UpdatedAt, Expr::val(Utc::now()).into())
                    .filter(content_item::Column::Id.eq(content_id));

                // 负增量不得让计数器小于 0
                if delta.views < 0 {
                    let floor = delta.views.saturating_neg();
                    update = update.filter(content_item::Column::ViewsCount.gte(floor));
                }
                if delta.likes < 0 {
                    let floor = delta.likes.saturating_neg();
                    update = update.filter(content_item::Column::LikesCount.gte(floor));
                }
                if delta.comments < 0 {
                    let floor = delta.comments.saturating_neg();
                    update = update.filter(content_item::Column::CommentsCount.gte(floor));
                }

                update.exec(db).await
            },
        )
        .await
        .map_err(|e| storage_error("apply_engagement_delta", e))?;

        if result.rows_affected > 0 {
            return Ok(());
        }

        // 0 行：内容不存在，或负增量被守卫拦下
        let exists = content_item::Entity::find_by_id(content_id)
            .count(db)
            .await
            .map_err(|e| storage_error("apply_engagement_delta", e))?
            > 0;

        if exists {
            Err(ViewPulseError::validation(format!(
                "计数器不能小于 0 (content {}, delta {:?})",
                content_id, delta
            )))
        } else {
            Err(ViewPulseError::not_found(format!(
                "内容不存在: {}",
                content_id
            )))
        }
    }

    async fn engagement(&self, content_id: i64) -> Result<Option<Engagement>> {
        let db = &self.db;
        let model = retry::with_retry("engagement", self.retry_config, || async {
            content_item::Entity::find_by_id(content_id).one(db).await
        })
        .await
        .map_err(|e| storage_error("engagement", e))?;

        Ok(model.map(|m| Engagement {
            views_count: m.views_count,
            likes_count: m.likes_count,
            comments_count: m.comments_count,
            trending_score: m.trending_score,
        }))
    }

    async fn recompute_trending_scores(&self) -> Result<u64> {
        let db = &self.db;
        let result = retry::with_retry("recompute_trending_scores", self.retry_config, || async {
            content_item::Entity::update_many()
                .col_expr(
                    content_item::Column::TrendingScore,
                    score_expr(
                        Expr::col(content_item::Column::ViewsCount).into(),
                        Expr::col(content_item::Column::LikesCount).into(),
                        Expr::col(content_item::Column::CommentsCount).into(),
                    ),
                )
                .exec(db)
                .await
        })
        .await
        .map_err(|e| storage_error("recompute_trending_scores", e))?;

        debug!("Recomputed trending score for {} items", result.rows_affected);
        Ok(result.rows_affected)
    }
}

//! EventSink implementation for SeaOrmStorage
//!
//! 浏览事件、搜索事件只追加；来源记录使用 upsert，visit_count 在数据库内自增。

use async_trait::async_trait;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ActiveValue::Set, ColumnTrait, EntityTrait, ExprTrait, QueryFilter};
use tracing::trace;

use super::{SeaOrmStorage, retry, storage_error};
use crate::analytics::EventSink;
use crate::errors::Result;
use crate::storage::{NewSearchEvent, NewViewEvent, ReferrerHit};

use migration::entities::{referrer_record, search_event, view_event};

#[async_trait]
impl EventSink for SeaOrmStorage {
    async fn append_view(&self, event: NewViewEvent) -> Result<i64> {
        let model = view_event::ActiveModel {
            content_id: Set(event.content_id),
            visitor_id_hash: Set(event.visitor_id_hash),
            agent_hash: Set(event.agent_hash),
            occurred_at: Set(event.occurred_at),
            referrer: Set(event.referrer),
            referrer_domain: Set(event.referrer_domain),
            ..Default::default()
        };

        let db = &self.db;
        let result = retry::with_retry("append_view", self.retry_config.at_most_once(), || {
            let model = model.clone();
            async move { view_event::Entity::insert(model).exec(db).await }
        })
        .await
        .map_err(|e| storage_error("append_view", e))?;

        trace!(
            "View event {} appended for content {}",
            result.last_insert_id, event.content_id
        );
        Ok(result.last_insert_id)
    }

    async fn append_search(&self, event: NewSearchEvent) -> Result<i64> {
        let model = search_event::ActiveModel {
            query_text: Set(event.query_text),
            result_count: Set(event.result_count),
            clicked_content_id: Set(None),
            visitor_id_hash: Set(event.visitor_id_hash),
            occurred_at: Set(event.occurred_at),
            ..Default::default()
        };

        let db = &self.db;
        let result = retry::with_retry("append_search", self.retry_config.at_most_once(), || {
            let model = model.clone();
            async move { search_event::Entity::insert(model).exec(db).await }
        })
        .await
        .map_err(|e| storage_error("append_search", e))?;

        Ok(result.last_insert_id)
    }

    async fn upsert_referrer(&self, hit: ReferrerHit) -> Result<()> {
        let model = referrer_record::ActiveModel {
            content_id: Set(hit.content_id),
            referrer_url: Set(hit.referrer_url),
            referrer_domain: Set(hit.referrer_domain),
            visit_count: Set(1),
            last_seen_at: Set(hit.seen_at),
            ..Default::default()
        };

        // ON CONFLICT(content_id, referrer_url) DO UPDATE SET visit_count = referrer_records.visit_count + 1
        let on_conflict = OnConflict::columns([
            referrer_record::Column::ContentId,
            referrer_record::Column::ReferrerUrl,
        ])
        .value(
            referrer_record::Column::VisitCount,
            Expr::col((referrer_record::Entity, referrer_record::Column::VisitCount))
                .add(Expr::val(1)),
        )
        .update_columns([
            referrer_record::Column::ReferrerDomain,
            referrer_record::Column::LastSeenAt,
        ])
        .to_owned();

        let db = &self.db;
        retry::with_retry("upsert_referrer", self.retry_config.at_most_once(), || {
            let model = model.clone();
            let on_conflict = on_conflict.clone();
            async move {
                referrer_record::Entity::insert(model)
                    .on_conflict(on_conflict)
                    .exec_without_returning(db)
                    .await
            }
        })
        .await
        .map_err(|e| storage_error("upsert_referrer", e))?;

        Ok(())
    }

    async fn backfill_search_click(&self, search_event_id: i64, content_id: i64) -> Result<bool> {
        let db = &self.db;
        let result = retry::with_retry("backfill_search_click", self.retry_config, || async {
            search_event::Entity::update_many()
                .col_expr(
                    search_event::Column::ClickedContentId,
                    Expr::val(content_id).into(),
                )
                .filter(search_event::Column::Id.eq(search_event_id))
                .filter(search_event::Column::ClickedContentId.is_null())
                .exec(db)
                .await
        })
        .await
        .map_err(|e| storage_error("backfill_search_click", e))?;

        Ok(result.rows_affected == 1)
    }
}

//! 事件表迁移
//!
//! 创建以下表：
//! - view_events：浏览事件（只追加，按时间窗口聚合）
//! - search_events：搜索事件（clicked_content_id 可回填一次）
//! - referrer_records：按 (content_id, referrer_url) 汇总的来源

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 1. view_events
        manager
            .create_table(
                Table::create()
                    .table(ViewEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ViewEvents::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ViewEvents::ContentId).big_integer().not_null())
                    .col(
                        ColumnDef::new(ViewEvents::VisitorIdHash)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ViewEvents::AgentHash).string_len(64).not_null())
                    .col(
                        ColumnDef::new(ViewEvents::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ViewEvents::Referrer).text().null())
                    .col(
                        ColumnDef::new(ViewEvents::ReferrerDomain)
                            .string_len(255)
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_view_events_content_id")
                            .from(ViewEvents::Table, ViewEvents::ContentId)
                            .to(ContentItems::Table, ContentItems::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 时间窗口聚合用
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_view_events_occurred_at")
                    .table(ViewEvents::Table)
                    .col(ViewEvents::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_view_events_content_time")
                    .table(ViewEvents::Table)
                    .col(ViewEvents::ContentId)
                    .col(ViewEvents::OccurredAt)
                    .to_owned(),
            )
            .await?;

        // 2. search_events
        manager
            .create_table(
                Table::create()
                    .table(SearchEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SearchEvents::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SearchEvents::QueryText)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SearchEvents::ResultCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SearchEvents::ClickedContentId)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SearchEvents::VisitorIdHash)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SearchEvents::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_search_events_occurred_at")
                    .table(SearchEvents::Table)
                    .col(SearchEvents::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_search_events_query_time")
                    .table(SearchEvents::Table)
                    .col(SearchEvents::QueryText)
                    .col(SearchEvents::OccurredAt)
                    .to_owned(),
            )
            .await?;

        // 3. referrer_records
        manager
            .create_table(
                Table::create()
                    .table(ReferrerRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReferrerRecords::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ReferrerRecords::ContentId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReferrerRecords::ReferrerUrl)
                            .string_len(500)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReferrerRecords::ReferrerDomain)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReferrerRecords::VisitCount)
                            .big_integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(ReferrerRecords::LastSeenAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_referrer_records_content_id")
                            .from(ReferrerRecords::Table, ReferrerRecords::ContentId)
                            .to(ContentItems::Table, ContentItems::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // upsert 依赖的唯一约束
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_referrer_records_content_url")
                    .table(ReferrerRecords::Table)
                    .col(ReferrerRecords::ContentId)
                    .col(ReferrerRecords::ReferrerUrl)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_referrer_records_last_seen")
                    .table(ReferrerRecords::Table)
                    .col(ReferrerRecords::LastSeenAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReferrerRecords::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(SearchEvents::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(ViewEvents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ContentItems {
    #[sea_orm(iden = "content_items")]
    Table,
    Id,
}

#[derive(DeriveIden)]
enum ViewEvents {
    #[sea_orm(iden = "view_events")]
    Table,
    Id,
    ContentId,
    VisitorIdHash,
    AgentHash,
    OccurredAt,
    Referrer,
    ReferrerDomain,
}

#[derive(DeriveIden)]
enum SearchEvents {
    #[sea_orm(iden = "search_events")]
    Table,
    Id,
    QueryText,
    ResultCount,
    ClickedContentId,
    VisitorIdHash,
    OccurredAt,
}

#[derive(DeriveIden)]
enum ReferrerRecords {
    #[sea_orm(iden = "referrer_records")]
    Table,
    Id,
    ContentId,
    ReferrerUrl,
    ReferrerDomain,
    VisitCount,
    LastSeenAt,
}

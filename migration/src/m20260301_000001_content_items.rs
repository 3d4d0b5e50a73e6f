//! 内容条目表迁移
//!
//! 创建 content_items 表，保存可追踪内容与累计计数器：
//! - content_ref 唯一
//! - views/likes/comments 计数器
//! - trending_score 冗余列（用于热度排序）

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ContentItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ContentItems::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ContentItems::ContentRef)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ContentItems::Title).text().not_null())
                    .col(
                        ColumnDef::new(ContentItems::IsPublished)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ContentItems::ViewsCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ContentItems::LikesCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ContentItems::CommentsCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ContentItems::TrendingScore)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(ContentItems::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ContentItems::UpdatedAt)
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
                    .name("idx_content_items_content_ref")
                    .table(ContentItems::Table)
                    .col(ContentItems::ContentRef)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 热度排序索引
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_content_items_trending_score")
                    .table(ContentItems::Table)
                    .col(ContentItems::TrendingScore)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_content_items_trending_score")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(Index::drop().name("idx_content_items_content_ref").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(ContentItems::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ContentItems {
    #[sea_orm(iden = "content_items")]
    Table,
    Id,
    ContentRef,
    Title,
    IsPublished,
    ViewsCount,
    LikesCount,
    CommentsCount,
    TrendingScore,
    CreatedAt,
    UpdatedAt,
}

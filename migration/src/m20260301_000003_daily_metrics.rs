//! 每日汇总表迁移

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DailyMetrics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DailyMetrics::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DailyMetrics::MetricDate).date().not_null())
                    .col(
                        ColumnDef::new(DailyMetrics::TotalViews)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DailyMetrics::UniqueVisitors)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DailyMetrics::TotalSearches)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(DailyMetrics::TopContent).text().not_null())
                    .col(ColumnDef::new(DailyMetrics::TopSearches).text().not_null())
                    .col(ColumnDef::new(DailyMetrics::TopReferrers).text().not_null())
                    .col(
                        ColumnDef::new(DailyMetrics::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 唯一索引：每个日期一行，upsert 依赖
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_daily_metrics_date")
                    .table(DailyMetrics::Table)
                    .col(DailyMetrics::MetricDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_daily_metrics_date").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(DailyMetrics::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DailyMetrics {
    #[sea_orm(iden = "daily_metrics")]
    Table,
    Id,
    MetricDate,
    TotalViews,
    UniqueVisitors,
    TotalSearches,
    TopContent,
    TopSearches,
    TopReferrers,
    CreatedAt,
}

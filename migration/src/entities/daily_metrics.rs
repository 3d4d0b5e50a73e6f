//! 每日汇总指标实体，每个日期一行
//!
//! `top_*` 列保存 JSON 数组文本。

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "daily_metrics")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub metric_date: Date,
    pub total_views: i64,
    pub unique_visitors: i64,
    pub total_searches: i64,
    #[sea_orm(column_type = "Text")]
    pub top_content: String,
    #[sea_orm(column_type = "Text")]
    pub top_searches: String,
    #[sea_orm(column_type = "Text")]
    pub top_referrers: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

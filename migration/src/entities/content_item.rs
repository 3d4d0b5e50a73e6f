//! 内容条目实体
//!
//! 保存可被追踪的内容及其累计互动计数器。`trending_score` 是冗余列，
//! 与三个计数器在同一条 UPDATE 语句中一起写入。

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "content_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub content_ref: String,
    #[sea_orm(column_type = "Text")]
    pub title: String,
    pub is_published: bool,
    pub views_count: i64,
    pub likes_count: i64,
    pub comments_count: i64,
    pub trending_score: f64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::view_event::Entity")]
    ViewEvent,
    #[sea_orm(has_many = "super::referrer_record::Entity")]
    ReferrerRecord,
}

impl Related<super::view_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ViewEvent.def()
    }
}

impl Related<super::referrer_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReferrerRecord.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

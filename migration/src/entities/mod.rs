pub mod content_item;
pub mod daily_metrics;
pub mod referrer_record;
pub mod search_event;
pub mod view_event;

pub use content_item::Entity as ContentItemEntity;
pub use daily_metrics::Entity as DailyMetricsEntity;
pub use referrer_record::Entity as ReferrerRecordEntity;
pub use search_event::Entity as SearchEventEntity;
pub use view_event::Entity as ViewEventEntity;

//! 浏览采集、去重、计数与每日聚合

pub mod aggregation;
pub mod counters;
pub mod identity;
pub mod ingestion;
pub mod retention;
pub mod sink;

pub use aggregation::{AggregationJob, DailySummary};
pub use counters::{
    CounterEngine, Engagement, EngagementDelta, EngagementStore, trending_score,
};
pub use identity::{VisitorIdentity, hash_identifier};
pub use ingestion::{
    IngestOutcome, IngestionService, IngestionSettings, SearchHit, ViewHit, referrer_domain,
    sign_body,
};
pub use retention::{RetentionReport, RetentionSweeper};
pub use sink::{ContentDirectory, EventSink};

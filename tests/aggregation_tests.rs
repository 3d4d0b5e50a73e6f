//! 每日聚合、保留期清理与查询门面集成测试

use std::sync::{Arc, Once};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

use viewpulse::analytics::{AggregationJob, EventSink, hash_identifier};
use viewpulse::cache::CacheInvalidator;
use viewpulse::config::{CacheConfig, StaticConfig, init_config_with};
use viewpulse::services::{QueryFacade, QuerySettings};
use viewpulse::storage::{NewSearchEvent, NewViewEvent, SeaOrmStorage};

static INIT: Once = Once::new();

async fn setup() -> (TempDir, Arc<SeaOrmStorage>, i64, i64) {
    INIT.call_once(|| init_config_with(StaticConfig::default()));

    let temp_dir = TempDir::new().expect("创建临时目录失败");
    let db_url = format!(
        "sqlite://{}?mode=rwc",
        temp_dir.path().join("aggregation.db").display()
    );
    let storage = Arc::new(
        SeaOrmStorage::new(&db_url, "sqlite")
            .await
            .expect("创建存储失败"),
    );
    let first = storage.upsert_content("post-1", "First", true).await.unwrap();
    let second = storage.upsert_content("post-2", "Second", true).await.unwrap();
    (temp_dir, storage, first.id, second.id)
}

fn facade(storage: &Arc<SeaOrmStorage>) -> Arc<QueryFacade> {
    Arc::new(QueryFacade::new(
        storage.clone(),
        QuerySettings::from(&CacheConfig::default()),
    ))
}

fn noon(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap())
}

async fn view(
    storage: &SeaOrmStorage,
    content_id: i64,
    visitor: &str,
    at: DateTime<Utc>,
    referrer_domain: Option<&str>,
) {
    storage
        .append_view(NewViewEvent {
            content_id,
            visitor_id_hash: hash_identifier(visitor),
            agent_hash: hash_identifier("ua"),
            occurred_at: at,
            referrer: referrer_domain.map(|d| format!("https://{}/", d)),
            referrer_domain: referrer_domain.map(str::to_string),
        })
        .await
        .unwrap();
}

async fn search(storage: &SeaOrmStorage, query: &str, at: DateTime<Utc>) -> i64 {
    storage
        .append_search(NewSearchEvent {
            query_text: query.to_string(),
            result_count: 3,
            visitor_id_hash: hash_identifier("searcher"),
            occurred_at: at,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_aggregation_is_idempotent_per_date() {
    let (_dir, storage, first, second) = setup().await;
    let date = Utc::now().date_naive() - Duration::days(2);
    let at = noon(date);

    view(&storage, first, "alice", at, Some("google.com")).await;
    view(&storage, first, "alice", at, Some("google.com")).await;
    view(&storage, first, "bob", at, Some("news.ycombinator.com")).await;
    view(&storage, second, "bob", at, Some("google.com")).await;
    // 不在当天范围内
    view(&storage, second, "carol", at + Duration::days(1), None).await;
    search(&storage, "rust", at).await;
    search(&storage, "rust", at).await;
    search(&storage, "axum", at).await;

    let job = AggregationJob::new(storage.clone(), 90, 10);
    let summary = job.run_daily_aggregation(date).await.unwrap();
    assert!(summary.metrics_written);
    assert_eq!(summary.total_views, 4);
    assert_eq!(summary.unique_visitors, 2);
    assert_eq!(summary.total_searches, 3);

    let first_run = storage.find_daily_metrics(date).await.unwrap().unwrap();
    job.run_daily_aggregation(date).await.unwrap();
    let second_run = storage.find_daily_metrics(date).await.unwrap().unwrap();

    assert_eq!(first_run, second_run);
    assert_eq!(storage.count_daily_metrics_rows(date).await.unwrap(), 1);

    assert_eq!(first_run.top_content[0].content_ref, "post-1");
    assert_eq!(first_run.top_content[0].views, 3);
    assert_eq!(first_run.top_content[1].content_ref, "post-2");
    assert_eq!(first_run.top_searches[0].query, "rust");
    assert_eq!(first_run.top_searches[0].count, 2);
    assert_eq!(first_run.top_referrers[0].domain, "google.com");
    assert_eq!(first_run.top_referrers[0].count, 3);
}

#[tokio::test]
async fn test_equal_counts_break_ties_ascending() {
    let (_dir, storage, first, second) = setup().await;
    // 内容 ID 顺序与 content_ref 字母序相反，才能区分两种排序
    let third = storage.upsert_content("a-third", "Third", true).await.unwrap().id;
    let date = Utc::now().date_naive() - Duration::days(3);
    let at = noon(date);

    for content_id in [third, second, first] {
        view(&storage, content_id, "alice", at, None).await;
        view(&storage, content_id, "bob", at, None).await;
    }
    view(&storage, first, "carol", at, Some("zeta.example")).await;
    view(&storage, second, "carol", at, Some("alpha.example")).await;
    view(&storage, third, "carol", at, Some("mid.example")).await;
    for query in ["beta", "alpha", "beta", "alpha"] {
        search(&storage, query, at).await;
    }

    let job = AggregationJob::new(storage.clone(), 90, 10);
    job.run_daily_aggregation(date).await.unwrap();
    let metrics = storage.find_daily_metrics(date).await.unwrap().unwrap();

    let ids: Vec<i64> = metrics.top_content.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![first, second, third]);
    assert!(metrics.top_content.iter().all(|c| c.views == 3));

    let queries: Vec<&str> = metrics.top_searches.iter().map(|s| s.query.as_str()).collect();
    assert_eq!(queries, vec!["alpha", "beta"]);

    let domains: Vec<&str> = metrics
        .top_referrers
        .iter()
        .map(|r| r.domain.as_str())
        .collect();
    assert_eq!(domains, vec!["alpha.example", "mid.example", "zeta.example"]);

    // 查询门面使用同样的次序
    let trending = facade(&storage).trending(30, 10).await.unwrap();
    let trending_refs: Vec<&str> = trending.iter().map(|t| t.content_ref.as_str()).collect();
    assert_eq!(trending_refs, vec!["post-1", "post-2", "a-third"]);

    let popular = facade(&storage).popular_searches(30, 10).await.unwrap();
    assert_eq!(popular[0].query, "alpha");
    assert_eq!(popular[1].query, "beta");
}

#[tokio::test]
async fn test_day_window_is_half_open() {
    let (_dir, storage, first, _) = setup().await;
    let date = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
    let midnight = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap());
    let next_midnight = midnight + Duration::days(1);

    view(&storage, first, "at-start", midnight, None).await;
    view(&storage, first, "just-before", midnight - Duration::seconds(1), None).await;
    view(&storage, first, "at-end", next_midnight, None).await;
    view(&storage, first, "last-second", next_midnight - Duration::seconds(1), None).await;
    search(&storage, "start", midnight).await;
    search(&storage, "end", next_midnight).await;

    let job = AggregationJob::new(storage.clone(), 3650, 10);
    let summary = job.run_daily_aggregation(date).await.unwrap();
    assert_eq!(summary.total_views, 2);
    assert_eq!(summary.unique_visitors, 2);
    assert_eq!(summary.total_searches, 1);

    let metrics = storage.find_daily_metrics(date).await.unwrap().unwrap();
    assert_eq!(metrics.top_searches.len(), 1);
    assert_eq!(metrics.top_searches[0].query, "start");
}

#[tokio::test]
async fn test_retention_failure_reported_in_summary() {
    use sea_orm::ConnectionTrait;

    let (_dir, storage, first, _) = setup().await;
    let now = Utc::now();
    view(&storage, first, "old", now - Duration::days(100), None).await;
    search(&storage, "ancient", now - Duration::days(100)).await;

    storage
        .get_db()
        .execute_unprepared(
            "CREATE TRIGGER block_view_prune BEFORE DELETE ON view_events \
             BEGIN SELECT RAISE(ABORT, 'pruning blocked'); END;",
        )
        .await
        .unwrap();

    let job = AggregationJob::new(storage.clone(), 90, 10);
    let summary = job.run_for_yesterday().await.unwrap();
    assert!(summary.metrics_written);
    assert!(summary.retention_failed);
    assert_eq!(summary.deleted_views, 0);
    // 另一张表照常清理
    assert_eq!(summary.deleted_searches, 1);
}

#[tokio::test]
async fn test_empty_day_still_writes_row() {
    let (_dir, storage, _, _) = setup().await;
    let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();

    let job = AggregationJob::new(storage.clone(), 90, 10);
    let summary = job.run_daily_aggregation(date).await.unwrap();
    assert_eq!(summary.total_views, 0);

    let metrics = storage.find_daily_metrics(date).await.unwrap().unwrap();
    assert!(metrics.top_content.is_empty());
    assert!(metrics.top_searches.is_empty());
}

#[tokio::test]
async fn test_retention_removes_only_expired_events() {
    let (_dir, storage, first, _) = setup().await;
    let now = Utc::now();

    view(&storage, first, "old", now - Duration::days(100), None).await;
    view(&storage, first, "recent", now - Duration::days(10), None).await;
    search(&storage, "ancient", now - Duration::days(95)).await;
    search(&storage, "fresh", now - Duration::days(1)).await;

    let job = AggregationJob::new(storage.clone(), 90, 10);
    let summary = job.run_for_yesterday().await.unwrap();
    assert_eq!(summary.deleted_views, 1);
    assert_eq!(summary.deleted_searches, 1);
    assert!(!summary.retention_failed);

    let horizon = now - Duration::days(365);
    assert_eq!(
        storage.count_views_between(horizon, now).await.unwrap(),
        1
    );
    assert_eq!(
        storage.count_searches_between(horizon, now).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_backfill_writes_one_row_per_day() {
    let (_dir, storage, first, _) = setup().await;
    let from = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
    let to = NaiveDate::from_ymd_opt(2026, 2, 3).unwrap();
    view(&storage, first, "alice", noon(from), None).await;

    let job = AggregationJob::new(storage.clone(), 3650, 10);
    let summaries = job.backfill(from, to).await.unwrap();
    assert_eq!(summaries.len(), 3);
    assert_eq!(summaries[0].total_views, 1);
    assert_eq!(summaries[2].total_views, 0);

    for date in from.iter_days().take(3) {
        assert_eq!(storage.count_daily_metrics_rows(date).await.unwrap(), 1);
    }

    assert!(job.backfill(to, from).await.is_err());
}

#[tokio::test]
async fn test_popular_searches_click_through_rate() {
    let (_dir, storage, first, _) = setup().await;
    let at = Utc::now() - Duration::hours(1);

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(search(&storage, "leather jacket", at).await);
    }
    search(&storage, "boots", at).await;
    for id in &ids[..2] {
        assert!(storage.backfill_search_click(*id, first).await.unwrap());
    }

    let popular = facade(&storage).popular_searches(30, 20).await.unwrap();
    assert_eq!(popular[0].query, "leather jacket");
    assert_eq!(popular[0].searches, 5);
    assert_eq!(popular[0].clicks, 2);
    assert_eq!(popular[0].ctr, 40.0);
    assert_eq!(popular[1].query, "boots");
    assert_eq!(popular[1].ctr, 0.0);
}

#[tokio::test]
async fn test_trending_keywords_export_refreshes_after_aggregation() {
    let (_dir, storage, first, _) = setup().await;
    let facade = facade(&storage);
    let recent = Utc::now() - Duration::hours(3);

    let id = search(&storage, "rust", recent).await;
    search(&storage, "rust", recent).await;
    search(&storage, "go", recent).await;
    // 30 天窗口之外
    search(&storage, "cobol", Utc::now() - Duration::days(31)).await;
    storage.backfill_search_click(id, first).await.unwrap();

    let export = facade.trending_keywords().await.unwrap();
    assert_eq!(export.period_days, 30);
    let queries: Vec<&str> = export.keywords.iter().map(|k| k.query.as_str()).collect();
    assert_eq!(queries, vec!["rust", "go"]);
    assert_eq!(export.keywords[0].clicks, 1);
    assert_eq!(export.keywords[0].ctr, 50.0);

    search(&storage, "zig", recent).await;
    assert_eq!(facade.trending_keywords().await.unwrap(), export);

    let invalidator: Arc<dyn CacheInvalidator> = facade.clone();
    let job = AggregationJob::new(storage.clone(), 90, 10).with_invalidator(invalidator);
    job.run_for_yesterday().await.unwrap();
    assert_eq!(facade.trending_keywords().await.unwrap().keywords.len(), 3);
}

#[tokio::test]
async fn test_aggregation_invalidates_query_caches() {
    let (_dir, storage, first, second) = setup().await;
    let facade = facade(&storage);
    let recent = Utc::now() - Duration::minutes(5);

    view(&storage, first, "alice", recent, None).await;
    let before = facade.trending(30, 5).await.unwrap();
    assert_eq!(before.len(), 1);

    view(&storage, second, "bob", recent, None).await;
    view(&storage, second, "carol", recent, None).await;

    // 缓存命中，结果不变
    assert_eq!(facade.trending(30, 5).await.unwrap(), before);

    let invalidator: Arc<dyn CacheInvalidator> = facade.clone();
    let job = AggregationJob::new(storage.clone(), 90, 10).with_invalidator(invalidator);
    job.run_for_yesterday().await.unwrap();

    let after = facade.trending(30, 5).await.unwrap();
    assert_eq!(after.len(), 2);
    assert_eq!(after[0].content_ref, "post-2");
    assert_eq!(after[0].views, 2);
}

#[tokio::test]
async fn test_summary_and_hot_by_score() {
    let (_dir, storage, first, second) = setup().await;
    let facade = facade(&storage);
    let recent = Utc::now() - Duration::hours(2);

    view(&storage, first, "alice", recent, None).await;
    view(&storage, first, "bob", recent, None).await;
    view(&storage, second, "alice", recent, None).await;
    search(&storage, "rust", recent).await;

    let summary = facade.summary(7).await.unwrap();
    assert_eq!(summary.period_days, 7);
    assert_eq!(summary.overview.total_views, 3);
    assert_eq!(summary.overview.unique_visitors, 2);
    assert_eq!(summary.overview.total_searches, 1);
    assert_eq!(summary.overview.avg_daily_views, 0);
    assert_eq!(summary.trending_content[0].content_ref, "post-1");
    assert_eq!(summary.top_searches[0].query, "rust");

    // 只有热度分大于 0 的内容会出现（计数器由采集路径维护，这里直接写入）
    use viewpulse::analytics::CounterEngine;
    let counters = CounterEngine::new(storage.clone());
    counters.record_like(second, 4).await.unwrap();
    let hot = facade.hot_by_score(5).await.unwrap();
    assert_eq!(hot.len(), 1);
    assert_eq!(hot[0].content_ref, "post-2");

    assert!(facade.trending(0, 5).await.is_err());
    assert!(facade.trending(30, 101).await.is_err());
    assert!(facade.summary(366).await.is_err());
}

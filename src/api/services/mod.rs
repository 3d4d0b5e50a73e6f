use actix_web::{Scope, web};

pub mod health;
pub mod metrics;
pub mod query;
pub mod response;
pub mod tracking;

pub use health::{AppStartTime, HealthService, health_routes};
pub use metrics::{MetricsService, metrics_route};
pub use query::QueryService;
pub use response::{api_result, error_response, status_for};
pub use tracking::TrackingService;

/// 采集与查询端点，挂在 `api_prefix` 下
pub fn analytics_routes(prefix: &str) -> Scope {
    web::scope(prefix)
        .route("/track-view", web::post().to(TrackingService::track_view))
        .route("/track-search", web::post().to(TrackingService::track_search))
        .route(
            "/track-search/{id}/click",
            web::post().to(TrackingService::search_click),
        )
        .route(
            "/content/{content_ref}/engagement",
            web::post().to(TrackingService::engagement),
        )
        .route("/trending", web::get().to(QueryService::trending))
        .route("/hot", web::get().to(QueryService::hot))
        .route(
            "/popular-searches",
            web::get().to(QueryService::popular_searches),
        )
        .route("/summary", web::get().to(QueryService::summary))
        .route(
            "/trending-keywords",
            web::get().to(QueryService::trending_keywords),
        )
        .route(
            "/daily-metrics/{date}",
            web::get().to(QueryService::daily_metrics),
        )
}

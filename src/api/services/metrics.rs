//! Prometheus metrics endpoint
//!
//! Exposes application metrics in Prometheus text format at `/metrics`.

use actix_web::{HttpResponse, Resource, Responder, web};

#[cfg(feature = "metrics")]
use super::AppStartTime;

/// Metrics service handler
pub struct MetricsService;

impl MetricsService {
    #[cfg(feature = "metrics")]
    pub async fn metrics(app_start_time: web::Data<AppStartTime>) -> impl Responder {
        if let Some(metrics) = crate::metrics::metrics() {
            let uptime = (chrono::Utc::now() - app_start_time.start_datetime)
                .num_seconds()
                .max(0) as f64;
            metrics.uptime_seconds.set(uptime);
        }

        match crate::metrics::export() {
            Ok(output) => HttpResponse::Ok()
                .content_type("text/plain; version=0.0.4; charset=utf-8")
                .body(output),
            Err(e) => {
                tracing::error!("Metrics export failed: {}", e);
                HttpResponse::InternalServerError().finish()
            }
        }
    }

    #[cfg(not(feature = "metrics"))]
    pub async fn metrics() -> impl Responder {
        HttpResponse::NotFound()
            .content_type("text/plain")
            .body("Metrics not enabled. Rebuild with --features metrics")
    }
}

pub fn metrics_route() -> Resource {
    web::resource("/metrics").route(web::get().to(MetricsService::metrics))
}

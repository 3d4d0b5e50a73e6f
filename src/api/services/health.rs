use actix_web::{HttpResponse, Responder, Scope, web};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, trace};

use crate::analytics::IngestionService;
use crate::storage::SeaOrmStorage;

// 应用启动时间
#[derive(Clone, Debug)]
pub struct AppStartTime {
    pub start_datetime: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct StorageCheck {
    pub status: &'static str,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub storage: StorageCheck,
    pub ticket_store: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime: u64,
    pub checks: HealthChecks,
    pub response_time_ms: u64,
}

/// Health Service
///
/// 直接调用 storage，不经过业务服务层，探针需要快速响应。
pub struct HealthService;

impl HealthService {
    async fn check_storage(storage: &SeaOrmStorage) -> StorageCheck {
        let backend = storage.backend_name().to_string();
        match tokio::time::timeout(Duration::from_secs(5), storage.ping()).await {
            Ok(Ok(())) => StorageCheck {
                status: "healthy",
                backend,
                error: None,
            },
            Ok(Err(e)) => {
                error!("Storage health check failed: {}", e);
                StorageCheck {
                    status: "unhealthy",
                    backend,
                    error: Some(e.to_string()),
                }
            }
            Err(_) => {
                error!("Storage health check timeout");
                StorageCheck {
                    status: "unhealthy",
                    backend,
                    error: Some("timeout".to_string()),
                }
            }
        }
    }

    pub async fn health_check(
        storage: web::Data<Arc<SeaOrmStorage>>,
        ingestion: web::Data<Arc<IngestionService>>,
        app_start_time: web::Data<AppStartTime>,
    ) -> impl Responder {
        let start_time = Instant::now();
        trace!("Received health check request");

        let storage_check = Self::check_storage(&storage).await;
        let is_healthy = storage_check.error.is_none();

        let now = chrono::Utc::now();
        let body = HealthResponse {
            status: if is_healthy { "healthy" } else { "unhealthy" },
            timestamp: now.to_rfc3339(),
            uptime: (now - app_start_time.start_datetime).num_seconds().max(0) as u64,
            checks: HealthChecks {
                storage: storage_check,
                ticket_store: ingestion.ticket_backend(),
            },
            response_time_ms: start_time.elapsed().as_millis() as u64,
        };

        if is_healthy {
            HttpResponse::Ok().json(body)
        } else {
            HttpResponse::ServiceUnavailable().json(body)
        }
    }

    /// 就绪探针：存储可用才算就绪
    pub async fn readiness_check(storage: web::Data<Arc<SeaOrmStorage>>) -> impl Responder {
        match tokio::time::timeout(Duration::from_secs(2), storage.ping()).await {
            Ok(Ok(())) => HttpResponse::Ok().finish(),
            _ => HttpResponse::ServiceUnavailable().finish(),
        }
    }

    /// 存活探针
    pub async fn liveness_check() -> impl Responder {
        HttpResponse::NoContent().finish()
    }
}

pub fn health_routes() -> Scope {
    web::scope("/health")
        .route("", web::get().to(HealthService::health_check))
        .route("", web::head().to(HealthService::health_check))
        .route("/ready", web::get().to(HealthService::readiness_check))
        .route("/ready", web::head().to(HealthService::readiness_check))
        .route("/live", web::get().to(HealthService::liveness_check))
        .route("/live", web::head().to(HealthService::liveness_check))
}

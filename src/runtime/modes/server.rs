//! Server mode
//!
//! 组装组件、注册路由并启动 HTTP 服务，直到收到关闭信号。

use actix_web::{
    App, HttpServer,
    middleware::{Compress, DefaultHeaders},
    web,
};
use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::api::middleware::{RequestIdMiddleware, TimingMiddleware};
use crate::api::services::{AppStartTime, analytics_routes, health_routes, metrics_route};
use crate::runtime::lifetime;

/// 请求体上限（采集请求都很小）
const MAX_PAYLOAD_BYTES: usize = 64 * 1024;

/// Run the HTTP server
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server() -> Result<()> {
    let app_start_time = AppStartTime {
        start_datetime: chrono::Utc::now(),
    };

    let startup = lifetime::startup::prepare_server_startup()
        .await
        .inspect_err(|e| tracing::error!("Server startup failed: {:#}", e))?;

    let config = crate::config::get_config();
    let api_prefix = config.server.api_prefix.clone();
    let cpu_count = config.server.cpu_count.clamp(1, 32);
    warn!("Using {} CPU cores for the server", cpu_count);

    if config.server.trusted_proxies.is_empty() {
        warn!(
            "trusted_proxies not configured: connections from private IPs will use X-Forwarded-For \
             for visitor identity. Configure server.trusted_proxies explicitly in production."
        );
    } else {
        info!(
            "Explicit trusted proxies configured: {:?}",
            config.server.trusted_proxies
        );
    }

    let storage = startup.storage.clone();
    let ingestion = startup.ingestion.clone();
    let query = startup.query.clone();
    let content = startup.content.clone();
    let proxies = startup.proxies.clone();
    let metrics = startup.metrics.clone();

    let db_for_shutdown = storage.get_db().clone();

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TimingMiddleware::new(metrics.clone()))
            .wrap(RequestIdMiddleware)
            .wrap(Compress::default())
            .app_data(web::Data::new(storage.clone()))
            .app_data(web::Data::new(ingestion.clone()))
            .app_data(web::Data::new(query.clone()))
            .app_data(web::Data::new(content.clone()))
            .app_data(web::Data::new(proxies.clone()))
            .app_data(web::Data::new(app_start_time.clone()))
            .app_data(web::PayloadConfig::new(MAX_PAYLOAD_BYTES))
            .app_data(web::JsonConfig::default().limit(MAX_PAYLOAD_BYTES))
            .wrap(DefaultHeaders::new().add(("Cache-Control", "no-store")))
            .service(health_routes())
            .service(metrics_route())
            .service(analytics_routes(&api_prefix))
    })
    .keep_alive(std::time::Duration::from_secs(30))
    .client_request_timeout(std::time::Duration::from_millis(5000))
    .workers(cpu_count);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    warn!("Starting server at http://{}", bind_address);
    let server = server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run();

    tokio::select! {
        res = server => {
            res?;
        }
        _ = lifetime::shutdown::listen_for_shutdown(&db_for_shutdown) => {
            warn!("Graceful shutdown completed");
        }
    }

    Ok(())
}

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::analytics::{AggregationJob, CounterEngine, IngestionService, IngestionSettings};
use crate::cache::register::debug_ticket_store_registry;
use crate::cache::{CacheInvalidator, create_ticket_store};
use crate::config::{StaticConfig, get_config};
use crate::metrics_core::{MetricsRecorder, default_recorder};
use crate::services::{ContentService, QueryFacade, QuerySettings};
use crate::storage::{SeaOrmStorage, StorageFactory};
use crate::utils::ProxyPolicy;

/// 服务组件，server 与 CLI 共用
pub struct StartupContext {
    pub storage: Arc<SeaOrmStorage>,
    pub ingestion: Arc<IngestionService>,
    pub query: Arc<QueryFacade>,
    pub content: Arc<ContentService>,
    pub aggregation: Arc<AggregationJob>,
    pub proxies: ProxyPolicy,
    pub metrics: Arc<dyn MetricsRecorder>,
}

/// 安装 rustls 加密后端；重复安装时忽略
pub fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }
}

/// 在已有存储上组装全部组件
///
/// 查询门面同时作为缓存失效器注入内容服务与聚合任务。
pub async fn build_components(
    storage: Arc<SeaOrmStorage>,
    config: &StaticConfig,
) -> Result<StartupContext> {
    let tickets = create_ticket_store(&config.cache)
        .await
        .context("Failed to create ticket store")?;
    debug_ticket_store_registry();

    let metrics = default_recorder();

    let counters = CounterEngine::new(storage.clone());
    let ingestion = Arc::new(
        IngestionService::new(
            storage.clone(),
            storage.clone(),
            tickets,
            counters,
            IngestionSettings::from(&config.analytics),
        )
        .with_metrics(metrics.clone()),
    );
    if !ingestion.requires_signature() {
        warn!("analytics.ingestion_secret is not set, view tracking accepts unsigned requests");
    }

    let query = Arc::new(QueryFacade::new(
        storage.clone(),
        QuerySettings::from(&config.cache),
    ));
    let invalidator: Arc<dyn CacheInvalidator> = query.clone();

    let content = Arc::new(ContentService::new(storage.clone()).with_invalidator(invalidator.clone()));

    let aggregation = Arc::new(
        AggregationJob::new(
            storage.clone(),
            config.analytics.retention_days,
            config.analytics.top_n,
        )
        .with_invalidator(invalidator)
        .with_metrics(metrics.clone()),
    );

    Ok(StartupContext {
        storage,
        ingestion,
        query,
        content,
        aggregation,
        proxies: ProxyPolicy::from_config(&config.server.trusted_proxies),
        metrics,
    })
}

/// 打开存储并组装组件（CLI 与 server 共用，不启动后台任务）
pub async fn prepare_components() -> Result<StartupContext> {
    install_crypto_provider();

    let storage = StorageFactory::create()
        .await
        .context("Failed to create storage backend")?;
    info!("Using storage backend: {}", storage.backend_name());

    let config = get_config();
    build_components(storage, &config).await
}

/// 准备服务器启动的上下文，按配置启动每日聚合调度
pub async fn prepare_server_startup() -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    let context = prepare_components().await?;

    let config = get_config();
    if config.analytics.enable_scheduler {
        context
            .aggregation
            .clone()
            .spawn_background_task(config.analytics.aggregation_hour_utc);
    } else {
        info!("Daily aggregation scheduler is disabled, run `viewpulse aggregate` from cron");
    }

    debug!(
        "Pre-startup processing completed in {} ms",
        start_time.elapsed().as_millis()
    );

    Ok(context)
}

use crate::cache::traits::TicketStore;
use crate::config::CacheConfig;
use crate::errors::{Result, ViewPulseError};
use once_cell::sync::Lazy;
use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::{Arc, Once, RwLock},
};

pub type BoxedTicketStoreFuture = Pin<Box<dyn Future<Output = Result<Arc<dyn TicketStore>>> + Send>>;
pub type TicketStoreConstructor = Arc<dyn Fn(CacheConfig) -> BoxedTicketStoreFuture + Send + Sync>;

static TICKET_STORE_REGISTRY: Lazy<RwLock<HashMap<String, TicketStoreConstructor>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

static BUILTIN_PLUGINS: Once = Once::new();

pub fn register_ticket_store_plugin<S: Into<String>>(name: S, constructor: TicketStoreConstructor) {
    let name = name.into();
    let mut registry = TICKET_STORE_REGISTRY
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    registry.insert(name, constructor);
}

pub fn get_ticket_store_plugin(name: &str) -> Option<TicketStoreConstructor> {
    TICKET_STORE_REGISTRY
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(name)
        .cloned()
}

/// 注册内置的 memory / redis 票据存储
pub fn register_builtin_plugins() {
    BUILTIN_PLUGINS.call_once(|| {
        register_ticket_store_plugin(
            "memory",
            Arc::new(|config: CacheConfig| -> BoxedTicketStoreFuture {
                Box::pin(async move {
                    let store = super::ticket_store::MokaTicketStore::new(config.memory_max_capacity);
                    Ok(Arc::new(store) as Arc<dyn TicketStore>)
                })
            }),
        );
        register_ticket_store_plugin(
            "redis",
            Arc::new(|config: CacheConfig| -> BoxedTicketStoreFuture {
                Box::pin(async move {
                    let store = super::ticket_store::RedisTicketStore::connect(
                        &config.redis.url,
                        &config.redis.key_prefix,
                    )
                    .await?;
                    Ok(Arc::new(store) as Arc<dyn TicketStore>)
                })
            }),
        );
    });
}

/// 按配置的后端名称创建票据存储
pub async fn create_ticket_store(config: &CacheConfig) -> Result<Arc<dyn TicketStore>> {
    register_builtin_plugins();

    let constructor = get_ticket_store_plugin(&config.ticket_backend).ok_or_else(|| {
        ViewPulseError::cache_plugin_not_found(format!(
            "Unknown ticket store backend: '{}'",
            config.ticket_backend
        ))
    })?;

    let store = constructor(config.clone()).await?;
    tracing::info!("Using ticket store backend: {}", store.backend_name());
    Ok(store)
}

pub fn debug_ticket_store_registry() {
    let registry = TICKET_STORE_REGISTRY
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if registry.is_empty() {
        tracing::debug!("No ticket store plugins registered.");
    } else {
        tracing::debug!("Registered ticket store plugins:");
        for key in registry.keys() {
            tracing::debug!(" - {}", key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_memory_store() {
        let config = CacheConfig::default();
        let store = create_ticket_store(&config).await.unwrap();
        assert_eq!(store.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_unknown_backend() {
        let config = CacheConfig {
            ticket_backend: "memcached".to_string(),
            ..Default::default()
        };
        let result = create_ticket_store(&config).await;
        assert!(matches!(result, Err(ViewPulseError::CachePluginNotFound(_))));
    }

    #[tokio::test]
    async fn test_custom_plugin_registration() {
        register_ticket_store_plugin(
            "custom-memory",
            Arc::new(|_config: CacheConfig| -> BoxedTicketStoreFuture {
                Box::pin(async {
                    Ok(Arc::new(crate::cache::ticket_store::MokaTicketStore::new(16))
                        as Arc<dyn TicketStore>)
                })
            }),
        );
        assert!(get_ticket_store_plugin("custom-memory").is_some());
        debug_ticket_store_registry();
    }
}

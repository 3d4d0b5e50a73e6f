use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

use super::StaticConfig;

static CONFIG: OnceLock<ArcSwap<StaticConfig>> = OnceLock::new();

/// Get the global configuration instance
///
/// Returns an Arc pointer to the configuration, which is cheap to clone
/// and doesn't hold any locks.
pub fn get_config() -> Arc<StaticConfig> {
    CONFIG
        .get()
        .expect("Config not initialized. Call init_config() first.")
        .load_full()
}

/// Initialize the global configuration
///
/// Loads configuration from "config.toml" in the current directory.
/// If the file doesn't exist, uses in-memory defaults.
///
/// # Examples
/// ```no_run
/// use viewpulse::config::init_config;
/// init_config();
/// ```
pub fn init_config() {
    CONFIG.get_or_init(|| ArcSwap::from_pointee(StaticConfig::load()));
}

/// Initialize the global configuration from an explicit file path
pub fn init_config_from(path: &str) {
    init_config_with(StaticConfig::load_from(path));
}

/// Install a fully built configuration, replacing any previous one
pub fn init_config_with(config: StaticConfig) {
    let slot = CONFIG.get_or_init(|| ArcSwap::from_pointee(config.clone()));
    slot.store(Arc::new(config));
}

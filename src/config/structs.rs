use serde::{Deserialize, Serialize};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 静态配置（从 TOML 加载，启动时使用）
///
/// 包含：
/// - server: 服务器地址、端口、CPU 数量、API 前缀
/// - database: 数据库连接与重试配置
/// - cache: 去重票据后端与查询缓存 TTL
/// - logging: 日志配置
/// - analytics: 采集、去重、聚合与保留策略
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

impl StaticConfig {
    /// 从默认路径加载配置
    pub fn load() -> Self {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值
    /// ENV 前缀：VP，分隔符：__
    /// 示例：VP__ANALYTICS__DEDUP_TTL_SECS=600
    pub fn load_from(path: &str) -> Self {
        use config::{Config, Environment, File};

        let builder = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖，前缀 VP，分隔符 __
            .add_source(
                Environment::with_prefix("VP")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// 受信任的反向代理（IP 或 CIDR）。为空时自动信任私有地址
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
}

/// 数据库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_database_timeout")]
    pub timeout: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// 缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// 去重票据后端："memory" 或 "redis"
    #[serde(default = "default_ticket_backend")]
    pub ticket_backend: String,
    #[serde(default = "default_memory_capacity")]
    pub memory_max_capacity: u64,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default = "default_trending_ttl_secs")]
    pub trending_ttl_secs: u64,
    #[serde(default = "default_summary_ttl_secs")]
    pub summary_ttl_secs: u64,
    /// 每种查询缓存保留的最大条目数
    #[serde(default = "default_max_query_entries")]
    pub max_query_entries: u64,
}

/// Redis 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_redis_key_prefix")]
    pub key_prefix: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_file")]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

/// 分析采集与聚合配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// HMAC-SHA256 签名密钥。未配置时采集接口不校验签名
    #[serde(default)]
    pub ingestion_secret: Option<String>,
    #[serde(default = "default_dedup_ttl_secs")]
    pub dedup_ttl_secs: u64,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_top_n")]
    pub top_n: u64,
    #[serde(default = "default_ingest_timeout_ms")]
    pub ingest_timeout_ms: u64,
    #[serde(default)]
    pub enable_scheduler: bool,
    #[serde(default = "default_aggregation_hour_utc")]
    pub aggregation_hour_utc: u32,
}

// ============================================================
// Default value functions for static config
// ============================================================

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

fn default_database_url() -> String {
    "viewpulse.db".to_string()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_database_timeout() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_ticket_backend() -> String {
    "memory".to_string()
}

fn default_memory_capacity() -> u64 {
    100_000
}

fn default_trending_ttl_secs() -> u64 {
    300
}

fn default_summary_ttl_secs() -> u64 {
    600
}

fn default_max_query_entries() -> u64 {
    256
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

fn default_redis_key_prefix() -> String {
    "viewpulse:".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_file() -> Option<String> {
    None
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

fn default_dedup_ttl_secs() -> u64 {
    3600
}

fn default_retention_days() -> u32 {
    90
}

fn default_top_n() -> u64 {
    10
}

fn default_ingest_timeout_ms() -> u64 {
    3000
}

fn default_aggregation_hour_utc() -> u32 {
    1
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
            api_prefix: default_api_prefix(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            pool_size: default_database_pool_size(),
            timeout: default_database_timeout(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ticket_backend: default_ticket_backend(),
            memory_max_capacity: default_memory_capacity(),
            redis: RedisConfig::default(),
            trending_ttl_secs: default_trending_ttl_secs(),
            summary_ttl_secs: default_summary_ttl_secs(),
            max_query_entries: default_max_query_entries(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_redis_key_prefix(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: default_log_file(),
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            ingestion_secret: None,
            dedup_ttl_secs: default_dedup_ttl_secs(),
            retention_days: default_retention_days(),
            top_n: default_top_n(),
            ingest_timeout_ms: default_ingest_timeout_ms(),
            enable_scheduler: false,
            aggregation_hour_utc: default_aggregation_hour_utc(),
        }
    }
}

//! 数据库连接与迁移

use std::str::FromStr;
use std::time::Duration;

use sea_orm::sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, SqlxSqliteConnector};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::errors::{Result, ViewPulseError};
use migration::{Migrator, MigratorTrait};

/// 连接池参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    /// 建连、取连接和 SQLite busy_timeout 共用
    pub timeout: Duration,
}

impl From<&DatabaseConfig> for PoolSettings {
    fn from(config: &DatabaseConfig) -> Self {
        let max_connections = config.pool_size.max(1);
        Self {
            max_connections,
            min_connections: max_connections.min(5),
            timeout: Duration::from_secs(config.timeout.max(1)),
        }
    }
}

/// 按后端名建立连接
pub async fn connect(
    database_url: &str,
    backend_name: &str,
    config: &DatabaseConfig,
) -> Result<DatabaseConnection> {
    let pool = PoolSettings::from(config);
    debug!("Connecting to {} with {:?}", backend_name, pool);
    match backend_name {
        "sqlite" => connect_sqlite(database_url, pool).await,
        "mysql" | "postgres" => connect_generic(database_url, backend_name, pool).await,
        other => Err(ViewPulseError::database_config(format!(
            "不支持的数据库类型: {}",
            other
        ))),
    }
}

/// SQLite 连接选项
///
/// 采集请求并发追加事件，WAL + busy_timeout 让写者排队等锁而不是立刻报 BUSY。
pub fn sqlite_options(database_url: &str, busy_timeout: Duration) -> Result<SqliteConnectOptions> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| ViewPulseError::database_config(format!("SQLite URL 解析失败: {}", e)))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(busy_timeout);
    Ok(options)
}

async fn connect_sqlite(database_url: &str, pool: PoolSettings) -> Result<DatabaseConnection> {
    let options = sqlite_options(database_url, pool.timeout)?;
    let sqlx_pool = SqlitePoolOptions::new()
        .max_connections(pool.max_connections)
        .acquire_timeout(pool.timeout)
        .connect_with(options)
        .await
        .map_err(|e| {
            ViewPulseError::database_connection(format!("无法连接到 SQLite 数据库: {}", e))
        })?;

    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(sqlx_pool))
}

async fn connect_generic(
    database_url: &str,
    backend_name: &str,
    pool: PoolSettings,
) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options
        .max_connections(pool.max_connections)
        .min_connections(pool.min_connections)
        .connect_timeout(pool.timeout)
        .acquire_timeout(pool.timeout)
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(false);

    Database::connect(options).await.map_err(|e| {
        ViewPulseError::database_connection(format!(
            "无法连接到 {} 数据库: {}",
            backend_name.to_uppercase(),
            e
        ))
    })
}

/// 应用未执行的迁移
pub async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    let pending = Migrator::get_pending_migrations(db)
        .await
        .map_err(|e| ViewPulseError::database_operation(format!("读取迁移状态失败: {}", e)))?
        .len();
    if pending == 0 {
        debug!("Database schema is up to date");
        return Ok(());
    }

    Migrator::up(db, None)
        .await
        .map_err(|e| ViewPulseError::database_operation(format!("迁移失败: {}", e)))?;

    info!("Applied {} database migration(s)", pending);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_settings_from_config() {
        let config = DatabaseConfig {
            pool_size: 20,
            timeout: 8,
            ..Default::default()
        };
        let pool = PoolSettings::from(&config);
        assert_eq!(pool.max_connections, 20);
        assert_eq!(pool.min_connections, 5);
        assert_eq!(pool.timeout, Duration::from_secs(8));
    }

    #[test]
    fn test_pool_settings_floor() {
        let config = DatabaseConfig {
            pool_size: 0,
            timeout: 0,
            ..Default::default()
        };
        let pool = PoolSettings::from(&config);
        assert_eq!(pool.max_connections, 1);
        assert_eq!(pool.min_connections, 1);
        assert_eq!(pool.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_sqlite_options_reject_bad_mode() {
        assert!(sqlite_options("sqlite://views.db?mode=rwc", Duration::from_secs(1)).is_ok());
        assert!(matches!(
            sqlite_options("sqlite://views.db?mode=bogus", Duration::from_secs(1)),
            Err(ViewPulseError::DatabaseConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_backend_rejected() {
        let result = connect("mongodb://x", "mongo", &DatabaseConfig::default()).await;
        assert!(matches!(result, Err(ViewPulseError::DatabaseConfig(_))));
    }
}

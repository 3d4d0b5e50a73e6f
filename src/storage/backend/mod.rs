//! SeaORM storage backend
//!
//! This module provides database storage using SeaORM,
//! supporting SQLite, MySQL/MariaDB, and PostgreSQL.

pub mod analytics;
mod connection;
mod content;
mod counters;
mod events;
pub mod retry;

use sea_orm::{DatabaseConnection, DbErr};
use tracing::info;

use crate::errors::{Result, ViewPulseError};

pub use connection::{PoolSettings, connect, run_migrations, sqlite_options};

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite://")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(ViewPulseError::database_config(format!(
            "无法从 URL 推断数据库类型: {}. 支持的 URL 格式: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// 重试耗尽后的数据库错误转换
///
/// 连接类错误对调用方是暂时性的（可重试），其余视为操作失败。
pub(crate) fn storage_error(operation: &str, err: DbErr) -> ViewPulseError {
    if retry::is_transient(&err) {
        ViewPulseError::transient_storage(format!("{}: {}", operation, err))
    } else {
        ViewPulseError::database_operation(format!("{}: {}", operation, err))
    }
}

/// SeaORM-based storage backend
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
    backend_name: String,
    /// 重试配置
    retry_config: retry::RetryConfig,
}

impl SeaOrmStorage {
    pub async fn new(database_url: &str, backend_name: &str) -> Result<Self> {
        if database_url.is_empty() {
            return Err(ViewPulseError::database_config(
                "DATABASE_URL 未设置".to_string(),
            ));
        }

        let config = crate::config::get_config();
        let retry_config = retry::RetryConfig::from(&config.database);
        let db = connect(database_url, backend_name, &config.database).await?;

        let storage = SeaOrmStorage {
            db,
            backend_name: backend_name.to_string(),
            retry_config,
        };

        // 运行迁移
        run_migrations(&storage.db).await?;

        info!(
            "{} Storage initialized.",
            storage.backend_name.to_uppercase()
        );
        Ok(storage)
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    /// 获取数据库连接
    pub fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// 存活检查（health 接口使用）
    pub async fn ping(&self) -> Result<()> {
        self.db
            .ping()
            .await
            .map_err(|e| ViewPulseError::database_connection(format!("数据库不可用: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_backend_from_url() {
        assert_eq!(infer_backend_from_url("sqlite://data.db").unwrap(), "sqlite");
        assert_eq!(infer_backend_from_url("viewpulse.db").unwrap(), "sqlite");
        assert_eq!(infer_backend_from_url("mariadb://u@h/db").unwrap(), "mysql");
        assert_eq!(
            infer_backend_from_url("postgresql://u@h/db").unwrap(),
            "postgres"
        );
        assert!(matches!(
            infer_backend_from_url("ftp://nope"),
            Err(ViewPulseError::DatabaseConfig(_))
        ));
    }

    #[test]
    fn test_storage_error_classification() {
        let transient = storage_error(
            "append_view",
            DbErr::ConnectionAcquire(sea_orm::error::ConnAcquireErr::Timeout),
        );
        assert!(matches!(transient, ViewPulseError::TransientStorage(_)));

        let permanent = storage_error("append_view", DbErr::Custom("constraint".into()));
        assert!(matches!(permanent, ViewPulseError::DatabaseOperation(_)));
    }
}

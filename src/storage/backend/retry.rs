//! 数据库重试策略
//!
//! 失败先按"语句是否可能已经生效"分类，再由语句自身的重放属性决定是否重试：
//! 取连接失败（语句没发出去）和锁冲突回滚（数据库已撤销）对任何语句都能重放；
//! 连接中途断开时结果未知，只有幂等语句可以重放。计数器增量和事件追加重放一次
//! 就会多计一次，所以它们用 [`RetryConfig::at_most_once`]。

use std::future::Future;
use std::time::Duration;

use rand::RngExt;
use sea_orm::DbErr;
use sea_orm::error::RuntimeErr;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::DatabaseConfig;

/// 一次数据库失败的性质
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// 没拿到连接，语句未到达数据库
    NotSent,
    /// 死锁、序列化冲突、SQLite BUSY/LOCKED：数据库已回滚该语句
    RolledBack,
    /// 连接中断，语句可能已提交
    Ambiguous,
    Permanent,
}

impl Failure {
    pub fn classify(err: &DbErr) -> Self {
        match err {
            DbErr::ConnectionAcquire(_) => Failure::NotSent,
            DbErr::Conn(_) => Failure::Ambiguous,
            DbErr::Exec(runtime) | DbErr::Query(runtime) => classify_runtime(runtime),
            _ => Failure::Permanent,
        }
    }

    /// 对调用方是否算暂时性故障（映射为 503）
    pub fn is_transient(self) -> bool {
        self != Failure::Permanent
    }
}

/// 语句能否在结果未知时重放
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replay {
    /// 读取，以及重放后结果不变的写入
    Safe,
    /// 重放会叠加效果
    AtMostOnce,
}

impl Replay {
    fn allows(self, failure: Failure) -> bool {
        match failure {
            Failure::NotSent | Failure::RolledBack => true,
            Failure::Ambiguous => self == Replay::Safe,
            Failure::Permanent => false,
        }
    }
}

pub fn is_transient(err: &DbErr) -> bool {
    Failure::classify(err).is_transient()
}

fn classify_runtime(err: &RuntimeErr) -> Failure {
    match err {
        RuntimeErr::SqlxError(sqlx_err) => {
            use sea_orm::sqlx::Error as SqlxError;
            use std::ops::Deref;

            match sqlx_err.deref() {
                SqlxError::PoolTimedOut | SqlxError::PoolClosed => Failure::NotSent,
                SqlxError::Io(_) => Failure::Ambiguous,
                SqlxError::Database(db_err) => match db_err.code() {
                    Some(code) if is_rollback_code(&code) => Failure::RolledBack,
                    _ => classify_message(&db_err.message().to_lowercase()),
                },
                other => classify_message(&other.to_string().to_lowercase()),
            }
        }
        RuntimeErr::Internal(msg) => classify_message(&msg.to_lowercase()),
        #[allow(unreachable_patterns)]
        _ => Failure::Permanent,
    }
}

/// SQLSTATE 40 类是事务回滚（PostgreSQL 死锁/序列化失败、MySQL 死锁）；
/// SQLite 返回数字扩展码，低 8 位为 5 (BUSY) 或 6 (LOCKED)
fn is_rollback_code(code: &str) -> bool {
    if code.starts_with("40") && code.len() == 5 {
        return true;
    }
    code.parse::<i32>()
        .map(|extended| matches!(extended & 0xff, 5 | 6))
        .unwrap_or(false)
}

fn classify_message(msg: &str) -> Failure {
    if msg.contains("deadlock")
        || msg.contains("lock wait timeout")
        || msg.contains("database is locked")
        || msg.contains("serialization failure")
    {
        Failure::RolledBack
    } else if msg.contains("connection reset") || msg.contains("broken pipe") {
        Failure::Ambiguous
    } else {
        Failure::Permanent
    }
}

/// 重试参数，取自 `[database]` 配置
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub replay: Replay,
}

impl RetryConfig {
    /// 用于重放会叠加效果的语句
    pub fn at_most_once(self) -> Self {
        Self {
            replay: Replay::AtMostOnce,
            ..self
        }
    }

    /// 第 n 次重试前的等待：指数增长封顶后，在 [d/2, d] 内取随机值
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let ceiling = self.base_delay.saturating_mul(factor).min(self.max_delay);
        let ceiling_ms = ceiling.as_millis() as u64;
        if ceiling_ms < 2 {
            return ceiling;
        }
        Duration::from_millis(rand::rng().random_range(ceiling_ms / 2..=ceiling_ms))
    }
}

impl From<&DatabaseConfig> for RetryConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            max_retries: config.retry_count,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            replay: Replay::Safe,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&DatabaseConfig::default())
    }
}

/// 执行数据库操作，按失败性质和 `config.replay` 决定是否退避重试
pub async fn with_retry<T, F, Fut>(
    operation_name: &str,
    config: RetryConfig,
    mut operation: F,
) -> Result<T, DbErr>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    let mut attempt = 0;
    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("'{}' succeeded on retry {}", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        let failure = Failure::classify(&err);
        if !config.replay.allows(failure) {
            if failure == Failure::Ambiguous {
                warn!(
                    "'{}' lost its connection mid-statement; not replaying: {}",
                    operation_name, err
                );
            }
            return Err(err);
        }
        if attempt >= config.max_retries {
            warn!(
                "'{}' still failing after {} retries: {}",
                operation_name, attempt, err
            );
            return Err(err);
        }

        attempt += 1;
        let delay = config.backoff(attempt);
        debug!(
            "'{}' hit {:?} ({}); retry {}/{} in {:?}",
            operation_name, failure, err, attempt, config.max_retries, delay
        );
        sleep(delay).await;
    }
}

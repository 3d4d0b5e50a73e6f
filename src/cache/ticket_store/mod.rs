//! 去重票据存储实现
//!
//! - memory: moka 进程内缓存，`entry().or_insert()` 对同一 key 原子
//! - redis: `SET key 1 NX PX ttl`，多实例部署共享

mod moka_store;
mod redis_store;

pub use moka_store::MokaTicketStore;
pub use redis_store::RedisTicketStore;

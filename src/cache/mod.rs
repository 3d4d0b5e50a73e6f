pub mod query_cache;
pub mod register;
pub mod ticket_store;
pub mod traits;

pub use query_cache::QueryCache;
pub use register::create_ticket_store;
pub use ticket_store::{MokaTicketStore, RedisTicketStore};
pub use traits::{CacheInvalidator, CacheScope, TicketStore};

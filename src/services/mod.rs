//! Service layer
//!
//! 查询门面与内容目录服务，HTTP 与 CLI 共用。

mod content_service;
mod query_service;

pub use content_service::ContentService;
pub use query_service::*;

//! Mode routing
//!
//! server 模式启动 HTTP 服务；其余子命令由 `cli` 模块一次性执行后退出。

pub mod server;

pub use server::run_server;

//! SQL 存储适配器
//!
//! 基于 sqlx `Any` 驱动，支持 PostgreSQL、MySQL、SQLite：
//! - `TokenStore`：授权码 / access / refresh 三键令牌存储，带后台过期清理
//! - `ClientStore`：客户端信息存储

pub mod barrier;
pub mod client_store;
pub mod codec;
pub mod connection;
pub mod diagnostics;
pub mod dialect;
pub mod schema;
pub mod token_store;

pub use barrier::{CycleGuard, SweepBarrier};
pub use client_store::{ClientStore, DEFAULT_CLIENT_TABLE};
pub use connection::{ConnectionConfig, Database, check_connection, connect};
pub use diagnostics::DiagnosticSink;
pub use dialect::Dialect;
pub use schema::validate_table_name;
pub use token_store::{
    DEFAULT_GC_INTERVAL, DEFAULT_TOKEN_TABLE, DeleteMode, TokenStore, TokenStoreOptions,
};

//! ports - 抽象 trait 层
//!
//! 定义令牌/客户端的领域值与存储接口，具体实现位于 adapters。

mod client_info;
mod client_storage;
mod defaults;
mod token_info;
mod token_storage;

pub use client_info::*;
pub use client_storage::*;
pub use defaults::*;
pub use token_info::*;
pub use token_storage::*;

//! warden-errors - 统一错误处理
//!
//! 令牌存储层的错误分类：编码、解码、持久化、配置。
//! "未找到" 不是错误，由 `Option` 表达。

use thiserror::Error;

/// 存储层错误类型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// 负载序列化或过期时间计算失败
    #[error("Encode error: {0}")]
    Encode(String),

    /// 已存储的负载无法解析（数据损坏）
    #[error("Decode error: {0}")]
    Decode(String),

    /// 存储引擎调用失败
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// 配置无效（表名、方言等）
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StoreError {
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn is_encode(&self) -> bool {
        matches!(self, Self::Encode(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// 错误类别名称（用于日志字段和指标标签）
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Encode(_) => "encode",
            Self::Decode(_) => "decode",
            Self::Persistence(_) => "persistence",
            Self::Configuration(_) => "configuration",
        }
    }
}

/// Result 类型别名
pub type StoreResult<T> = Result<T, StoreError>;

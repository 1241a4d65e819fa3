//! 存储默认值，配置层与适配器共用

/// 令牌表默认名
pub const DEFAULT_TOKEN_TABLE: &str = "oauth2_token";
/// 客户端表默认名
pub const DEFAULT_CLIENT_TABLE: &str = "oauth2_client";
/// 默认清理间隔（秒）
pub const DEFAULT_GC_INTERVAL_SECS: i64 = 600;

//! warden-config - 配置加载库
//!
//! 按顺序合并 `default.toml`、`{APP_ENV}.toml` 与 `WARDEN_` 前缀的环境变量。
//! 嵌套字段在环境变量中使用 `__` 分隔，例如 `WARDEN_DATABASE__URL`。

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use secrecy::Secret;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),
}

pub use warden_ports::{DEFAULT_CLIENT_TABLE, DEFAULT_GC_INTERVAL_SECS, DEFAULT_TOKEN_TABLE};

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    /// 方言标识（postgres / mysql / sqlite），缺省时由 URL 推断
    #[serde(default)]
    pub dialect: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_max_lifetime_secs() -> u64 {
    7200
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl DatabaseConfig {
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// 删除模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteModeConfig {
    /// 标记 deleted_at
    #[default]
    Soft,
    /// 物理删除
    Hard,
}

/// 令牌存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct TokenStoreConfig {
    #[serde(default = "default_token_table")]
    pub table_name: String,
    /// 清理间隔（秒），<= 0 时使用默认值 600
    #[serde(default = "default_gc_interval_secs")]
    pub gc_interval_secs: i64,
    #[serde(default)]
    pub delete_mode: DeleteModeConfig,
}

fn default_token_table() -> String {
    DEFAULT_TOKEN_TABLE.to_string()
}

fn default_gc_interval_secs() -> i64 {
    DEFAULT_GC_INTERVAL_SECS
}

impl Default for TokenStoreConfig {
    fn default() -> Self {
        Self {
            table_name: default_token_table(),
            gc_interval_secs: default_gc_interval_secs(),
            delete_mode: DeleteModeConfig::default(),
        }
    }
}

impl TokenStoreConfig {
    /// 归一化后的清理间隔
    pub fn gc_interval(&self) -> Duration {
        let secs = if self.gc_interval_secs > 0 {
            self.gc_interval_secs
        } else {
            DEFAULT_GC_INTERVAL_SECS
        };
        Duration::from_secs(secs as u64)
    }
}

/// 客户端存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct ClientStoreConfig {
    #[serde(default = "default_client_table")]
    pub table_name: String,
}

fn default_client_table() -> String {
    DEFAULT_CLIENT_TABLE.to_string()
}

impl Default for ClientStoreConfig {
    fn default() -> Self {
        Self {
            table_name: default_client_table(),
        }
    }
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 输出 JSON 格式日志
    #[serde(default)]
    pub json: bool,
    /// Prometheus 监听地址，缺省时不导出指标
    pub metrics_addr: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
            metrics_addr: None,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    #[serde(default = "default_app_env")]
    pub app_env: String,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub token_store: TokenStoreConfig,
    #[serde(default)]
    pub client_store: ClientStoreConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_app_env() -> String {
    "development".to_string()
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(config_dir).extract()?;
        Ok(config)
    }

    /// 构建配置来源（不提取）
    pub fn figment(config_dir: &str) -> Figment {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("WARDEN_").split("__"))
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// 是否为开发环境
    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}

//! 数据库连接管理
//!
//! 存储实现只持有 `Database` 的克隆（连接池本身是共享句柄），
//! 不负责关闭连接池：多个存储可以共享同一连接。

use std::fmt;
use std::time::Duration;

use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use tracing::info;
use warden_errors::{StoreError, StoreResult};

use crate::Dialect;

/// 连接池配置
#[derive(Clone)]
pub struct ConnectionConfig {
    pub url: String,
    /// 显式方言；为 None 时按 URL 推断
    pub dialect: Option<Dialect>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            dialect: None,
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(7200)),
        }
    }
}

impl ConnectionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// 单连接的 SQLite 内存库配置（测试用）
    ///
    /// 每个连接各自拥有一份内存库，因此池大小固定为 1 且连接不过期。
    pub fn sqlite_memory() -> Self {
        Self::new("sqlite::memory:")
            .with_dialect(Dialect::Sqlite)
            .with_pool(1, 1)
            .with_idle_timeout(None)
            .with_max_lifetime(None)
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// 设置连接池配置
    pub fn with_pool(mut self, min: u32, max: u32) -> Self {
        self.min_connections = min;
        self.max_connections = max;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    /// 确定最终方言
    pub fn resolve_dialect(&self) -> StoreResult<Dialect> {
        match self.dialect {
            Some(dialect) => Ok(dialect),
            None => Dialect::from_url(&self.url),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &"[REDACTED]")
            .field("dialect", &self.dialect)
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("connect_timeout", &self.connect_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_lifetime", &self.max_lifetime)
            .finish()
    }
}

/// 共享数据库句柄
#[derive(Debug, Clone)]
pub struct Database {
    pool: AnyPool,
    dialect: Dialect,
}

impl Database {
    pub fn new(pool: AnyPool, dialect: Dialect) -> Self {
        Self { pool, dialect }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}

/// 创建连接池
pub async fn connect(config: &ConnectionConfig) -> StoreResult<Database> {
    sqlx::any::install_default_drivers();

    let dialect = config.resolve_dialect()?;
    let pool = AnyPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect(&config.url)
        .await
        .map_err(|e| StoreError::persistence(format!("Failed to create pool: {}", e)))?;

    info!(dialect = %dialect, max_connections = config.max_connections, "Database pool created");
    Ok(Database::new(pool, dialect))
}

/// 检查数据库连接
pub async fn check_connection(db: &Database) -> StoreResult<()> {
    sqlx::query("SELECT 1")
        .execute(db.pool())
        .await
        .map_err(|e| StoreError::persistence(format!("Database health check failed: {}", e)))?;
    Ok(())
}

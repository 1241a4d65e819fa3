//! SQL 方言
//!
//! 通过 sqlx `Any` 驱动连接，不同引擎的占位符和 DDL 语法在这里区分。

use std::fmt;
use std::str::FromStr;

use warden_errors::StoreError;

/// 支持的数据库引擎
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    /// 根据连接 URL 的 scheme 推断方言
    pub fn from_url(url: &str) -> Result<Self, StoreError> {
        let scheme = url
            .split_once(':')
            .map(|(scheme, _)| scheme)
            .ok_or_else(|| StoreError::configuration("Connection URL has no scheme"))?;
        scheme.parse()
    }

    /// 方言标识
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// 第 `index` 个绑定参数的占位符（从 1 开始）
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", index),
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
        }
    }

    /// 生成 `count` 个以逗号分隔的占位符
    pub fn placeholders(&self, count: usize) -> String {
        (1..=count)
            .map(|i| self.placeholder(i))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// 是否支持 `CREATE INDEX IF NOT EXISTS`
    pub fn supports_index_if_not_exists(&self) -> bool {
        !matches!(self, Dialect::MySql)
    }
}

impl FromStr for Dialect {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(StoreError::configuration(format!(
                "Unsupported database dialect: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

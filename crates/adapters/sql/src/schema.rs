//! 表结构初始化
//!
//! 表不存在时自动创建。时间戳统一为 unix 秒（BIGINT），
//! 身份列为空串而非 NULL，查询前必须排除空键。

use tracing::info;
use warden_errors::{StoreError, StoreResult};

use crate::{Database, Dialect};

/// 校验表名（会被拼接进 SQL）
///
/// 允许 `name` 或 `schema.name`，每段为 `[A-Za-z_][A-Za-z0-9_]*`。
pub fn validate_table_name(name: &str) -> StoreResult<()> {
    let segments: Vec<&str> = name.split('.').collect();
    let valid = segments.len() <= 2 && segments.iter().all(|s| is_identifier(s));
    if valid {
        Ok(())
    } else {
        Err(StoreError::configuration(format!(
            "Invalid table name: {:?}",
            name
        )))
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn index_name(table: &str, column: &str) -> String {
    format!("idx_{}_{}", table.replace('.', "_"), column)
}

/// 令牌表 DDL
pub(crate) fn token_table_statements(dialect: Dialect, table: &str) -> Vec<String> {
    const INDEXED: [&str; 5] = ["code", "access", "refresh", "expired_at", "deleted_at"];

    let inline_indexes = if dialect.supports_index_if_not_exists() {
        String::new()
    } else {
        INDEXED
            .iter()
            .map(|col| format!(",\n                INDEX {} ({})", index_name(table, col), col))
            .collect()
    };

    let mut statements = vec![format!(
        r#"
            CREATE TABLE IF NOT EXISTS {} (
                id VARCHAR(36) NOT NULL PRIMARY KEY,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL,
                deleted_at BIGINT,
                expired_at BIGINT NOT NULL,
                code VARCHAR(512) NOT NULL DEFAULT '',
                access VARCHAR(512) NOT NULL DEFAULT '',
                refresh VARCHAR(512) NOT NULL DEFAULT '',
                data TEXT NOT NULL{}
            )
            "#,
        table, inline_indexes
    )];

    if dialect.supports_index_if_not_exists() {
        statements.extend(INDEXED.iter().map(|col| {
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                index_name(table, col),
                table,
                col
            )
        }));
    }

    statements
}

/// 客户端表 DDL
pub(crate) fn client_table_statements(table: &str) -> Vec<String> {
    vec![format!(
        r#"
            CREATE TABLE IF NOT EXISTS {} (
                id VARCHAR(255) NOT NULL PRIMARY KEY,
                secret VARCHAR(512) NOT NULL DEFAULT '',
                domain VARCHAR(512) NOT NULL DEFAULT '',
                data TEXT NOT NULL,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            )
            "#,
        table
    )]
}

async fn execute_all(db: &Database, table: &str, statements: Vec<String>) -> StoreResult<()> {
    for sql in statements {
        sqlx::query(&sql)
            .execute(db.pool())
            .await
            .map_err(|e| {
                StoreError::persistence(format!("Failed to create table {}: {}", table, e))
            })?;
    }
    Ok(())
}

/// 确保令牌表存在
pub async fn ensure_token_table(db: &Database, table: &str) -> StoreResult<()> {
    validate_table_name(table)?;
    execute_all(db, table, token_table_statements(db.dialect(), table)).await?;
    info!(table = %table, dialect = %db.dialect(), "Token table ready");
    Ok(())
}

/// 确保客户端表存在
pub async fn ensure_client_table(db: &Database, table: &str) -> StoreResult<()> {
    validate_table_name(table)?;
    execute_all(db, table, client_table_statements(table)).await?;
    info!(table = %table, dialect = %db.dialect(), "Client table ready");
    Ok(())
}

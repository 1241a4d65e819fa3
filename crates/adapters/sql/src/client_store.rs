//! SQL 客户端存储
//!
//! 单键查询，没有过期与清理。

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use warden_errors::{StoreError, StoreResult};
use warden_ports::{ClientInfo, ClientStorage};

use crate::codec::{decode_payload, encode_payload};
use crate::schema::ensure_client_table;
use crate::{Database, Dialect};

pub use warden_ports::DEFAULT_CLIENT_TABLE;

#[derive(Debug, Clone)]
pub struct ClientStore {
    db: Database,
    table: String,
}

impl ClientStore {
    /// 创建存储并确保表存在；空表名使用默认值
    pub async fn new(db: Database, table_name: impl Into<String>) -> StoreResult<Self> {
        let mut table = table_name.into();
        if table.is_empty() {
            table = DEFAULT_CLIENT_TABLE.to_string();
        }
        ensure_client_table(&db, &table).await?;
        Ok(Self { db, table })
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }
}

fn upsert_sql(dialect: Dialect, table: &str) -> String {
    let insert = format!(
        "INSERT INTO {} (id, secret, domain, data, created_at, updated_at) VALUES ({})",
        table,
        dialect.placeholders(6)
    );
    match dialect {
        Dialect::MySql => format!(
            "{} ON DUPLICATE KEY UPDATE secret = VALUES(secret), domain = VALUES(domain), data = VALUES(data), updated_at = VALUES(updated_at)",
            insert
        ),
        Dialect::Postgres | Dialect::Sqlite => format!(
            "{} ON CONFLICT (id) DO UPDATE SET secret = excluded.secret, domain = excluded.domain, data = excluded.data, updated_at = excluded.updated_at",
            insert
        ),
    }
}

#[async_trait]
impl ClientStorage for ClientStore {
    async fn set(&self, id: &str, client: &ClientInfo) -> StoreResult<()> {
        if id.is_empty() {
            return Err(StoreError::encode("Client id must not be empty"));
        }
        debug!(table = %self.table, client_id = %id, "Saving client");

        let data = encode_payload(client)?;
        let now = Utc::now().timestamp();

        sqlx::query(&upsert_sql(self.db.dialect(), &self.table))
            .bind(id)
            .bind(client.secret.as_str())
            .bind(client.domain.as_str())
            .bind(data)
            .bind(now)
            .bind(now)
            .execute(self.db.pool())
            .await
            .map_err(|e| StoreError::persistence(format!("Failed to save client: {}", e)))?;

        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Option<ClientInfo>> {
        if id.is_empty() {
            return Ok(None);
        }
        debug!(table = %self.table, client_id = %id, "Finding client");

        let sql = format!(
            "SELECT data FROM {} WHERE id = {} LIMIT 1",
            self.table,
            self.db.dialect().placeholder(1)
        );

        let row: Option<(String,)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| StoreError::persistence(format!("Failed to find client: {}", e)))?;

        row.map(|(data,)| decode_payload(&data)).transpose()
    }
}

//! token-janitor - 令牌存储守护进程
//!
//! 加载配置、建立连接、创建令牌与客户端存储，
//! 后台按配置间隔清理过期令牌，直到收到关闭信号。

mod retry;
mod runtime;
mod wiring;

use tracing::{error, info};
use warden_adapter_sql::{ClientStore, TokenStore, check_connection, connect};
use warden_config::AppConfig;

use crate::retry::{RetryConfig, with_retry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config_dir = std::env::args().nth(1).unwrap_or_else(|| "config".to_string());
    let config = AppConfig::load(&config_dir)?;

    runtime::init_runtime(&config)?;

    let conn = wiring::connection_config(&config.database)?;
    let db = with_retry(&RetryConfig::default(), "database connection", || async {
        let db = connect(&conn).await?;
        check_connection(&db).await?;
        Ok::<_, warden_errors::StoreError>(db)
    })
    .await?;
    info!(dialect = %db.dialect(), "Database connected");

    let token_store = TokenStore::new(db.clone(), wiring::token_store_options(&config.token_store))
        .await
        .inspect_err(|e| error!(error = %e, "Failed to open token store"))?;
    let client_store = ClientStore::new(db, config.client_store.table_name.clone()).await?;

    info!(
        token_table = %token_store.table_name(),
        client_table = %client_store.table_name(),
        gc_interval_secs = token_store.gc_interval().as_secs(),
        "Token janitor ready"
    );

    runtime::shutdown_signal().await;

    token_store.close();
    info!(sweeps = token_store.sweep_cycles(), "Token janitor stopped");
    Ok(())
}

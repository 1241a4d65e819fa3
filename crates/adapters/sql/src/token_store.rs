//! SQL 令牌存储
//!
//! 三个查询键（code / access / refresh）各自独立；后台任务按固定间隔
//! 清理过期行。所有读操作在查询前等待正在进行的清理周期结束，
//! 保证不会看到清理到一半的表。写操作不经过屏障。

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;
use warden_errors::{StoreError, StoreResult};
use warden_ports::{DEFAULT_GC_INTERVAL_SECS, TokenInfo, TokenStorage};

use crate::codec::{self, IdentityKind};
use crate::schema::{ensure_token_table, validate_table_name};
use crate::{Database, DiagnosticSink, SweepBarrier};

pub use warden_ports::DEFAULT_TOKEN_TABLE;

/// 默认清理间隔
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(DEFAULT_GC_INTERVAL_SECS as u64);

/// 删除方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeleteMode {
    /// 设置 deleted_at，行在逻辑上不存在
    ///
    /// 被清理的行仍留在表中，表会持续增长；需要回收空间时使用 `Hard` 或外部归档。
    #[default]
    Soft,
    /// 物理删除
    Hard,
}

/// 令牌存储选项
#[derive(Debug, Clone)]
pub struct TokenStoreOptions {
    pub table_name: String,
    pub gc_interval: Duration,
    pub delete_mode: DeleteMode,
}

impl Default for TokenStoreOptions {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TOKEN_TABLE.to_string(),
            gc_interval: DEFAULT_GC_INTERVAL,
            delete_mode: DeleteMode::default(),
        }
    }
}

impl TokenStoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以秒为单位的清理间隔，<= 0 时使用默认值
    pub fn from_secs(gc_interval_secs: i64) -> Self {
        Self::default().with_gc_interval_secs(gc_interval_secs)
    }

    /// 设置表名，空串保持默认
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        let table_name = table_name.into();
        if !table_name.is_empty() {
            self.table_name = table_name;
        }
        self
    }

    /// 设置清理间隔，零值保持默认
    pub fn with_gc_interval(mut self, interval: Duration) -> Self {
        self.gc_interval = if interval.is_zero() {
            DEFAULT_GC_INTERVAL
        } else {
            interval
        };
        self
    }

    pub fn with_gc_interval_secs(self, secs: i64) -> Self {
        let interval = if secs > 0 {
            Duration::from_secs(secs as u64)
        } else {
            DEFAULT_GC_INTERVAL
        };
        self.with_gc_interval(interval)
    }

    pub fn with_delete_mode(mut self, mode: DeleteMode) -> Self {
        self.delete_mode = mode;
        self
    }
}

struct Inner {
    db: Database,
    table: String,
    delete_mode: DeleteMode,
    barrier: SweepBarrier,
    /// 周期串行化：后台循环与 `sweep_now` 不会重叠
    sweep_lock: Mutex<()>,
    diagnostics: DiagnosticSink,
}

/// SQL 令牌存储
///
/// 状态：创建后处于运行态（定时清理），`close` 之后不再调度新周期；
/// 正在进行的周期和等待中的读操作都会自然完成。drop 时自动 close。
pub struct TokenStore {
    inner: Arc<Inner>,
    shutdown: CancellationToken,
    gc_interval: Duration,
}

impl TokenStore {
    /// 创建存储：校验表名、建表、启动后台清理
    ///
    /// 需要在 tokio 运行时内调用。
    pub async fn new(db: Database, options: TokenStoreOptions) -> StoreResult<Self> {
        validate_table_name(&options.table_name)?;
        ensure_token_table(&db, &options.table_name).await?;

        let inner = Arc::new(Inner {
            db,
            table: options.table_name,
            delete_mode: options.delete_mode,
            barrier: SweepBarrier::new(),
            sweep_lock: Mutex::new(()),
            diagnostics: DiagnosticSink::stderr(),
        });

        let shutdown = CancellationToken::new();
        spawn_sweeper(inner.clone(), options.gc_interval, shutdown.clone());

        info!(
            table = %inner.table,
            interval_secs = options.gc_interval.as_secs(),
            delete_mode = ?inner.delete_mode,
            "Token store started"
        );

        Ok(Self {
            inner,
            shutdown,
            gc_interval: options.gc_interval,
        })
    }

    /// 设置诊断输出并返回自身
    pub fn with_diagnostics(self, writer: impl Write + Send + 'static) -> Self {
        self.set_diagnostics(writer);
        self
    }

    /// 替换诊断输出（默认 stderr）
    pub fn set_diagnostics(&self, writer: impl Write + Send + 'static) {
        self.inner.diagnostics.replace(writer);
    }

    pub fn table_name(&self) -> &str {
        &self.inner.table
    }

    pub fn gc_interval(&self) -> Duration {
        self.gc_interval
    }

    pub fn delete_mode(&self) -> DeleteMode {
        self.inner.delete_mode
    }

    /// 已开始的清理周期数
    pub fn sweep_cycles(&self) -> u64 {
        self.inner.barrier.cycles_started()
    }

    /// 立即执行一次清理，返回清理的行数；错误直接返回给调用方
    pub async fn sweep_now(&self) -> StoreResult<u64> {
        let removed = self.inner.sweep().await?;
        self.inner.record_removed(removed);
        Ok(removed)
    }

    /// 停止定时清理（幂等）
    pub fn close(&self) {
        if !self.shutdown.is_cancelled() {
            info!(table = %self.inner.table, "Closing token store");
            self.shutdown.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Drop for TokenStore {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("table", &self.inner.table)
            .field("dialect", &self.inner.db.dialect())
            .field("gc_interval", &self.gc_interval)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn spawn_sweeper(
    inner: Arc<Inner>,
    period: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // 周期在分支体内执行，close 不会打断进行中的周期
                    inner.run_cycle().await;
                }
                _ = shutdown.cancelled() => {
                    break;
                }
            }
        }
        debug!(table = %inner.table, "Token sweeper stopped");
    })
}

impl Inner {
    /// 一次后台周期：失败只记录，不终止循环
    async fn run_cycle(&self) {
        metrics::counter!("warden_token_sweep_runs_total").increment(1);

        match self.sweep().await {
            Ok(removed) => self.record_removed(removed),
            Err(e) => self.report(&e),
        }
    }

    async fn sweep(&self) -> StoreResult<u64> {
        let _serial = self.sweep_lock.lock().await;
        let _cycle = self.barrier.begin();

        let now = Utc::now().timestamp();
        let expired = self.count_expired(now).await?;
        if expired == 0 {
            return Ok(0);
        }

        self.remove_expired(now).await
    }

    fn record_removed(&self, removed: u64) {
        if removed > 0 {
            metrics::counter!("warden_token_sweep_removed_total").increment(removed);
            info!(table = %self.table, removed, "Expired tokens removed");
        }
    }

    fn report(&self, err: &StoreError) {
        metrics::counter!("warden_token_sweep_failures_total", "kind" => err.kind()).increment(1);
        error!(table = %self.table, kind = err.kind(), error = %err, "Token sweep failed");
        self.diagnostics.error(&err.to_string());
    }

    async fn count_expired(&self, now: i64) -> StoreResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE expired_at < {} AND deleted_at IS NULL",
            self.table,
            self.db.dialect().placeholder(1)
        );

        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(now)
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| {
                StoreError::persistence(format!("Failed to count expired tokens: {}", e))
            })?;

        Ok(count)
    }

    async fn remove_expired(&self, now: i64) -> StoreResult<u64> {
        let dialect = self.db.dialect();
        let result = match self.delete_mode {
            DeleteMode::Soft => {
                let sql = format!(
                    "UPDATE {} SET deleted_at = {}, updated_at = {} WHERE expired_at < {} AND deleted_at IS NULL",
                    self.table,
                    dialect.placeholder(1),
                    dialect.placeholder(2),
                    dialect.placeholder(3)
                );
                sqlx::query(&sql)
                    .bind(now)
                    .bind(now)
                    .bind(now)
                    .execute(self.db.pool())
                    .await
            }
            DeleteMode::Hard => {
                let sql = format!(
                    "DELETE FROM {} WHERE expired_at < {} AND deleted_at IS NULL",
                    self.table,
                    dialect.placeholder(1)
                );
                sqlx::query(&sql).bind(now).execute(self.db.pool()).await
            }
        }
        .map_err(|e| StoreError::persistence(format!("Failed to remove expired tokens: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn remove_by(&self, kind: IdentityKind, key: &str) -> StoreResult<()> {
        if key.is_empty() {
            return Ok(());
        }
        debug!(table = %self.table, key = kind.column(), "Removing token");

        let dialect = self.db.dialect();
        let column = kind.column();
        let result = match self.delete_mode {
            DeleteMode::Soft => {
                let now = Utc::now().timestamp();
                let sql = format!(
                    "UPDATE {} SET deleted_at = {}, updated_at = {} WHERE {} = {} AND deleted_at IS NULL",
                    self.table,
                    dialect.placeholder(1),
                    dialect.placeholder(2),
                    column,
                    dialect.placeholder(3)
                );
                sqlx::query(&sql)
                    .bind(now)
                    .bind(now)
                    .bind(key)
                    .execute(self.db.pool())
                    .await
            }
            DeleteMode::Hard => {
                let sql = format!(
                    "DELETE FROM {} WHERE {} = {}",
                    self.table,
                    column,
                    dialect.placeholder(1)
                );
                sqlx::query(&sql).bind(key).execute(self.db.pool()).await
            }
        }
        .map_err(|e| {
            StoreError::persistence(format!("Failed to remove token by {}: {}", column, e))
        })?;

        debug!(table = %self.table, rows = result.rows_affected(), "Token removed");
        Ok(())
    }

    async fn get_by(&self, kind: IdentityKind, key: &str) -> StoreResult<Option<TokenInfo>> {
        if key.is_empty() {
            return Ok(None);
        }

        self.barrier.wait().await;
        debug!(table = %self.table, key = kind.column(), "Finding token");

        let sql = format!(
            "SELECT data FROM {} WHERE {} = {} AND deleted_at IS NULL LIMIT 1",
            self.table,
            kind.column(),
            self.db.dialect().placeholder(1)
        );

        let row: Option<(String,)> = sqlx::query_as(&sql)
            .bind(key)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| {
                StoreError::persistence(format!(
                    "Failed to find token by {}: {}",
                    kind.column(),
                    e
                ))
            })?;

        match row {
            Some((data,)) => codec::decode(&data).map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TokenStorage for TokenStore {
    async fn create(&self, info: &TokenInfo) -> StoreResult<()> {
        let encoded = codec::encode(info)?;
        let inner = &self.inner;
        debug!(table = %inner.table, key = encoded.kind.column(), "Saving token");

        let now = Utc::now().timestamp();
        let sql = format!(
            "INSERT INTO {} (id, created_at, updated_at, expired_at, code, access, refresh, data) VALUES ({})",
            inner.table,
            inner.db.dialect().placeholders(8)
        );

        sqlx::query(&sql)
            .bind(Uuid::now_v7().to_string())
            .bind(now)
            .bind(now)
            .bind(encoded.expired_at)
            .bind(encoded.code())
            .bind(encoded.access())
            .bind(encoded.refresh())
            .bind(encoded.payload.as_str())
            .execute(inner.db.pool())
            .await
            .map_err(|e| StoreError::persistence(format!("Failed to save token: {}", e)))?;

        Ok(())
    }

    async fn remove_by_code(&self, code: &str) -> StoreResult<()> {
        self.inner.remove_by(IdentityKind::Code, code).await
    }

    async fn remove_by_access(&self, access: &str) -> StoreResult<()> {
        self.inner.remove_by(IdentityKind::Access, access).await
    }

    async fn remove_by_refresh(&self, refresh: &str) -> StoreResult<()> {
        self.inner.remove_by(IdentityKind::Refresh, refresh).await
    }

    async fn get_by_code(&self, code: &str) -> StoreResult<Option<TokenInfo>> {
        self.inner.get_by(IdentityKind::Code, code).await
    }

    async fn get_by_access(&self, access: &str) -> StoreResult<Option<TokenInfo>> {
        self.inner.get_by(IdentityKind::Access, access).await
    }

    async fn get_by_refresh(&self, refresh: &str) -> StoreResult<Option<TokenInfo>> {
        self.inner.get_by(IdentityKind::Refresh, refresh).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConnectionConfig, connect};
    use chrono::TimeDelta;
    use std::sync::Mutex as StdMutex;
    use tokio::time::timeout;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<StdMutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    async fn memory_db() -> Database {
        connect(&ConnectionConfig::sqlite_memory()).await.unwrap()
    }

    fn expired_code(code: &str) -> TokenInfo {
        let created = Utc::now() - TimeDelta::seconds(60);
        TokenInfo::new("client", "user").with_code(code, created, Duration::from_secs(10))
    }

    fn live_code(code: &str) -> TokenInfo {
        TokenInfo::new("client", "user").with_code(code, Utc::now(), Duration::from_secs(600))
    }

    #[test]
    fn test_options_normalisation() {
        let options = TokenStoreOptions::from_secs(0);
        assert_eq!(options.gc_interval, DEFAULT_GC_INTERVAL);
        assert_eq!(TokenStoreOptions::from_secs(-1).gc_interval, DEFAULT_GC_INTERVAL);
        assert_eq!(
            TokenStoreOptions::from_secs(30).gc_interval,
            Duration::from_secs(30)
        );
        assert_eq!(
            TokenStoreOptions::new().with_gc_interval(Duration::ZERO).gc_interval,
            DEFAULT_GC_INTERVAL
        );
        assert_eq!(
            TokenStoreOptions::new().with_table_name("").table_name,
            DEFAULT_TOKEN_TABLE
        );
    }

    #[tokio::test]
    async fn test_invalid_table_name_rejected() {
        let db = memory_db().await;
        let err = TokenStore::new(db, TokenStoreOptions::new().with_table_name("t; --"))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_read_waits_for_in_flight_sweep() {
        let store = Arc::new(TokenStore::new(memory_db().await, TokenStoreOptions::new()).await.unwrap());
        store.create(&expired_code("abc")).await.unwrap();

        // 模拟一个进行中的清理周期
        let cycle = store.inner.barrier.begin();

        let reader = {
            let store = store.clone();
            tokio::spawn(async move { store.get_by_code("abc").await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!reader.is_finished(), "reader must wait for the in-flight cycle");

        let now = Utc::now().timestamp();
        assert_eq!(store.inner.remove_expired(now).await.unwrap(), 1);
        drop(cycle);

        let found = timeout(Duration::from_secs(2), reader)
            .await
            .expect("reader must be released once the cycle commits")
            .unwrap()
            .unwrap();
        assert!(found.is_none(), "reader must observe the committed delete");
    }

    #[tokio::test]
    async fn test_writes_do_not_wait_for_sweep() {
        let store = TokenStore::new(memory_db().await, TokenStoreOptions::new()).await.unwrap();
        let _cycle = store.inner.barrier.begin();

        timeout(Duration::from_secs(2), async {
            store.create(&live_code("w1")).await.unwrap();
            store.remove_by_code("w1").await.unwrap();
        })
        .await
        .expect("writes are not gated by the sweep barrier");
    }

    #[tokio::test]
    async fn test_empty_key_skips_barrier_and_storage() {
        let store = TokenStore::new(memory_db().await, TokenStoreOptions::new()).await.unwrap();
        let _cycle = store.inner.barrier.begin();

        let result = timeout(Duration::from_millis(200), async {
            (
                store.get_by_code("").await,
                store.get_by_access("").await,
                store.get_by_refresh("").await,
            )
        })
        .await
        .expect("empty keys must return without waiting");

        assert!(result.0.unwrap().is_none());
        assert!(result.1.unwrap().is_none());
        assert!(result.2.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_key_never_reaches_storage() {
        let db = memory_db().await;
        let store = TokenStore::new(db.clone(), TokenStoreOptions::new()).await.unwrap();

        sqlx::query("DROP TABLE oauth2_token")
            .execute(db.pool())
            .await
            .unwrap();

        // 表已不存在：任何真正的查询都会失败
        assert!(store.get_by_code("abc").await.unwrap_err().is_persistence());

        assert!(store.get_by_code("").await.unwrap().is_none());
        assert!(store.get_by_access("").await.unwrap().is_none());
        assert!(store.get_by_refresh("").await.unwrap().is_none());
        store.remove_by_code("").await.unwrap();
        store.remove_by_access("").await.unwrap();
        store.remove_by_refresh("").await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_counts_cycles() {
        let store = TokenStore::new(memory_db().await, TokenStoreOptions::new()).await.unwrap();
        assert_eq!(store.sweep_cycles(), 0);

        store.sweep_now().await.unwrap();
        store.sweep_now().await.unwrap();
        assert_eq!(store.sweep_cycles(), 2);
        assert!(!store.inner.barrier.is_running());
    }

    #[tokio::test]
    async fn test_failed_cycle_is_reported_and_releases_readers() {
        let buf = SharedBuf::default();
        let db = memory_db().await;
        let store = TokenStore::new(db.clone(), TokenStoreOptions::new())
            .await
            .unwrap()
            .with_diagnostics(buf.clone());

        sqlx::query("DROP TABLE oauth2_token")
            .execute(db.pool())
            .await
            .unwrap();

        store.inner.run_cycle().await;
        let output = buf.contents();
        assert!(output.starts_with("[ERROR]:"), "got: {output:?}");
        assert!(output.contains("Failed to count expired tokens"));
        assert!(!store.inner.barrier.is_running());

        // 读操作不再被阻塞，错误照常返回
        let err = timeout(Duration::from_secs(1), store.get_by_code("abc"))
            .await
            .unwrap()
            .unwrap_err();
        assert!(err.is_persistence());
    }

    #[tokio::test]
    async fn test_sweep_loop_survives_failures() {
        let buf = SharedBuf::default();
        let db = memory_db().await;
        let store = TokenStore::new(db.clone(), TokenStoreOptions::from_secs(1))
            .await
            .unwrap()
            .with_diagnostics(buf.clone());

        sqlx::query("DROP TABLE oauth2_token")
            .execute(db.pool())
            .await
            .unwrap();

        timeout(Duration::from_secs(10), async {
            while buf.contents().matches("[ERROR]:").count() < 2 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .expect("sweeper must keep ticking after a failed cycle");

        assert!(store.sweep_cycles() >= 2);
        assert!(!store.is_closed());
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_stops_scheduling() {
        let store = TokenStore::new(memory_db().await, TokenStoreOptions::from_secs(1))
            .await
            .unwrap();
        assert!(!store.is_closed());

        store.close();
        store.close();
        assert!(store.is_closed());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(store.sweep_cycles(), 0);

        // 关闭后仍可读写，也可以手动清理
        store.create(&live_code("after-close")).await.unwrap();
        assert!(store.get_by_code("after-close").await.unwrap().is_some());
        store.sweep_now().await.unwrap();
    }

    #[tokio::test]
    async fn test_stores_do_not_share_barriers() {
        let db = memory_db().await;
        let first = TokenStore::new(db.clone(), TokenStoreOptions::new().with_table_name("tokens_a"))
            .await
            .unwrap();
        let second = TokenStore::new(db, TokenStoreOptions::new().with_table_name("tokens_b"))
            .await
            .unwrap();
        second.create(&live_code("b")).await.unwrap();

        let _cycle = first.inner.barrier.begin();
        let found = timeout(Duration::from_millis(500), second.get_by_code("b"))
            .await
            .expect("a sweep on one store must not block another store")
            .unwrap();
        assert!(found.is_some());
    }
}

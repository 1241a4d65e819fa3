//! TokenStorage trait 定义

use async_trait::async_trait;
use warden_errors::StoreResult;

use crate::TokenInfo;

/// 令牌存储接口
///
/// 查询返回 `Ok(None)` 表示未找到，与错误严格区分。
/// 空字符串键直接返回 `Ok(None)`，不访问存储。
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// 保存新签发的令牌信息
    async fn create(&self, info: &TokenInfo) -> StoreResult<()>;

    /// 按授权码删除（幂等）
    async fn remove_by_code(&self, code: &str) -> StoreResult<()>;

    /// 按 access token 删除（幂等）
    async fn remove_by_access(&self, access: &str) -> StoreResult<()>;

    /// 按 refresh token 删除（幂等）
    async fn remove_by_refresh(&self, refresh: &str) -> StoreResult<()>;

    /// 按授权码查询
    async fn get_by_code(&self, code: &str) -> StoreResult<Option<TokenInfo>>;

    /// 按 access token 查询
    async fn get_by_access(&self, access: &str) -> StoreResult<Option<TokenInfo>>;

    /// 按 refresh token 查询
    async fn get_by_refresh(&self, refresh: &str) -> StoreResult<Option<TokenInfo>>;
}

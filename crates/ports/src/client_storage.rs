//! ClientStorage trait 定义

use async_trait::async_trait;
use warden_errors::StoreResult;

use crate::ClientInfo;

/// 客户端凭证存储接口
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// 保存或覆盖客户端
    async fn set(&self, id: &str, client: &ClientInfo) -> StoreResult<()>;

    /// 根据 ID 查找
    async fn get_by_id(&self, id: &str) -> StoreResult<Option<ClientInfo>>;
}

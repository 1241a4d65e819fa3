//! 记录编解码
//!
//! `TokenInfo` 与存储负载（JSON 文本）之间的无状态转换，
//! 以及行上派生字段（身份列、身份值、过期时间）的计算。

use serde::Serialize;
use serde::de::DeserializeOwned;
use warden_errors::{StoreError, StoreResult};
use warden_ports::TokenInfo;

/// 身份键类型，对应表中的查询列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKind {
    Code,
    Access,
    Refresh,
}

impl IdentityKind {
    /// 对应的列名
    pub fn column(&self) -> &'static str {
        match self {
            IdentityKind::Code => "code",
            IdentityKind::Access => "access",
            IdentityKind::Refresh => "refresh",
        }
    }
}

/// 编码结果：一行令牌记录的派生字段与负载
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedToken {
    /// 主身份类型（Code 或 Access）
    pub kind: IdentityKind,
    /// 主身份值
    pub value: String,
    /// refresh token，没有时为空串
    pub refresh: String,
    /// 行过期时间（unix 秒）
    pub expired_at: i64,
    pub payload: String,
}

impl EncodedToken {
    /// code 列的值
    pub fn code(&self) -> &str {
        match self.kind {
            IdentityKind::Code => &self.value,
            _ => "",
        }
    }

    /// access 列的值
    pub fn access(&self) -> &str {
        match self.kind {
            IdentityKind::Access => &self.value,
            _ => "",
        }
    }

    /// refresh 列的值
    pub fn refresh(&self) -> &str {
        &self.refresh
    }
}

/// 编码令牌信息
///
/// 优先级：有授权码时按授权码过期；否则按 access token 过期，
/// 若同时存在 refresh token 则改用 refresh token 的过期时间。
pub fn encode(info: &TokenInfo) -> StoreResult<EncodedToken> {
    let payload = encode_payload(info)?;

    if !info.code.is_empty() {
        let expired_at = unix_expiry(info.code_expires_at(), "code")?;
        return Ok(EncodedToken {
            kind: IdentityKind::Code,
            value: info.code.clone(),
            refresh: String::new(),
            expired_at,
            payload,
        });
    }

    let mut expired_at = unix_expiry(info.access_expires_at(), "access")?;
    let mut refresh = String::new();
    if !info.refresh.is_empty() {
        expired_at = unix_expiry(info.refresh_expires_at(), "refresh")?;
        refresh = info.refresh.clone();
    }

    Ok(EncodedToken {
        kind: IdentityKind::Access,
        value: info.access.clone(),
        refresh,
        expired_at,
        payload,
    })
}

/// 解码令牌信息；负载损坏时返回 `Decode` 错误
pub fn decode(payload: &str) -> StoreResult<TokenInfo> {
    decode_payload(payload)
}

/// 序列化任意负载
pub fn encode_payload<T: Serialize>(value: &T) -> StoreResult<String> {
    serde_json::to_string(value)
        .map_err(|e| StoreError::encode(format!("Failed to serialize payload: {}", e)))
}

/// 反序列化任意负载
pub fn decode_payload<T: DeserializeOwned>(payload: &str) -> StoreResult<T> {
    serde_json::from_str(payload)
        .map_err(|e| StoreError::decode(format!("Failed to deserialize payload: {}", e)))
}

fn unix_expiry(
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
    field: &str,
) -> StoreResult<i64> {
    expires_at
        .map(|at| at.timestamp())
        .ok_or_else(|| StoreError::encode(format!("{} expiry is out of range", field)))
}

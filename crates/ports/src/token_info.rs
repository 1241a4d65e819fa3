//! 令牌信息
//!
//! 一次授权签发的完整信息：授权码、access token、refresh token
//! 各自带有签发时间与有效期。

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// 令牌信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub client_id: String,
    pub user_id: String,
    pub redirect_uri: String,
    pub scope: String,

    pub code: String,
    pub code_created_at: DateTime<Utc>,
    pub code_expires_in: Duration,

    pub access: String,
    pub access_created_at: DateTime<Utc>,
    pub access_expires_in: Duration,

    pub refresh: String,
    pub refresh_created_at: DateTime<Utc>,
    pub refresh_expires_in: Duration,
}

impl TokenInfo {
    pub fn new(client_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    /// 设置授权码
    pub fn with_code(
        mut self,
        code: impl Into<String>,
        created_at: DateTime<Utc>,
        expires_in: Duration,
    ) -> Self {
        self.code = code.into();
        self.code_created_at = created_at;
        self.code_expires_in = expires_in;
        self
    }

    /// 设置 access token
    pub fn with_access(
        mut self,
        access: impl Into<String>,
        created_at: DateTime<Utc>,
        expires_in: Duration,
    ) -> Self {
        self.access = access.into();
        self.access_created_at = created_at;
        self.access_expires_in = expires_in;
        self
    }

    /// 设置 refresh token
    pub fn with_refresh(
        mut self,
        refresh: impl Into<String>,
        created_at: DateTime<Utc>,
        expires_in: Duration,
    ) -> Self {
        self.refresh = refresh.into();
        self.refresh_created_at = created_at;
        self.refresh_expires_in = expires_in;
        self
    }

    /// 授权码过期时间；溢出时为 None
    pub fn code_expires_at(&self) -> Option<DateTime<Utc>> {
        expires_at(self.code_created_at, self.code_expires_in)
    }

    /// access token 过期时间；溢出时为 None
    pub fn access_expires_at(&self) -> Option<DateTime<Utc>> {
        expires_at(self.access_created_at, self.access_expires_in)
    }

    /// refresh token 过期时间；溢出时为 None
    pub fn refresh_expires_at(&self) -> Option<DateTime<Utc>> {
        expires_at(self.refresh_created_at, self.refresh_expires_in)
    }

    pub fn is_code_expired_at(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.code_expires_at(), now)
    }

    /// 存储层只按行过期时间清理，access token 自身的过期由调用方在这里判断
    pub fn is_access_expired_at(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.access_expires_at(), now)
    }

    pub fn is_refresh_expired_at(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.refresh_expires_at(), now)
    }
}

fn expires_at(created_at: DateTime<Utc>, expires_in: Duration) -> Option<DateTime<Utc>> {
    let delta = TimeDelta::from_std(expires_in).ok()?;
    created_at.checked_add_signed(delta)
}

fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|at| at < now)
}

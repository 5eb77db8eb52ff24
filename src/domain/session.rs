//! 钱包会话模型
//!
//! provider 句柄和当前账户要么同时存在，要么同时为空，用 Option 一并表示

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::service::wallet_provider::WalletHandle;

/// 连接状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Disconnected
    }
}

/// 已建立的会话
#[derive(Clone)]
pub struct ActiveSession {
    pub handle: Arc<dyn WalletHandle>,
    pub account: String,
    pub chain_id: u64,
}

impl fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSession")
            .field("provider", &self.handle.name())
            .field("account", &self.account)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

/// 进程内唯一的会话状态
#[derive(Debug, Default)]
pub struct Session {
    active: Option<ActiveSession>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// 连接成功后建立会话
    pub fn establish(&mut self, handle: Arc<dyn WalletHandle>, account: String, chain_id: u64) {
        self.active = Some(ActiveSession {
            handle,
            account,
            chain_id,
        });
    }

    /// 清空会话，返回被移除的会话（用于关闭 provider）
    pub fn clear(&mut self) -> Option<ActiveSession> {
        self.active.take()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    pub fn handle(&self) -> Option<&Arc<dyn WalletHandle>> {
        self.active.as_ref().map(|s| &s.handle)
    }

    pub fn account(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.account.as_str())
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.active.as_ref().map(|s| s.chain_id)
    }

    /// 更新账户与链（刷新时调用），无会话时忽略
    pub fn update(&mut self, account: String, chain_id: u64) {
        if let Some(active) = self.active.as_mut() {
            active.account = account;
            active.chain_id = chain_id;
        }
    }
}

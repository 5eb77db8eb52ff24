//! 钱包 provider 抽象
//!
//! `WalletConnector` 负责连接流程（相当于钱包选择弹窗），`WalletHandle` 是连接成功后的
//! provider 句柄：查询 chainId / accounts、订阅账户和网络变化事件、可选的 close。
//!
//! 默认实现 [`JsonRpcWalletConnector`] 连接一个 JSON-RPC 钱包端点（如 Frame 的
//! `http://127.0.0.1:1248` 或开发节点），事件通过轮询端点产生。

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};

use crate::service::rpc_client::{JsonRpcClient, RpcError};

/// EIP-1193: 用户拒绝请求
pub const USER_REJECTED_CODE: i64 = 4001;
/// JSON-RPC: 方法不存在
pub const METHOD_NOT_FOUND_CODE: i64 = -32601;

const EVENT_CHANNEL_CAPACITY: usize = 16;
/// 连续轮询失败多少次视为断开
const MAX_POLL_FAILURES: u32 = 3;

/// provider 推送的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<String>),
    ChainChanged(u64),
    /// 旧版 provider 的 networkChanged，与 chainChanged 同时触发
    NetworkChanged(u64),
    Disconnected,
}

impl ProviderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderEvent::AccountsChanged(_) => "accountsChanged",
            ProviderEvent::ChainChanged(_) => "chainChanged",
            ProviderEvent::NetworkChanged(_) => "networkChanged",
            ProviderEvent::Disconnected => "disconnect",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("User rejected the connection request")]
    Cancelled,
    #[error("Wallet provider error: {0}")]
    Provider(String),
    #[error("Wallet transport error: {0}")]
    Transport(String),
}

impl From<anyhow::Error> for WalletError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<RpcError>() {
            Some(rpc) if rpc.code == USER_REJECTED_CODE => WalletError::Cancelled,
            Some(rpc) => WalletError::Provider(rpc.to_string()),
            None => WalletError::Transport(format!("{:#}", err)),
        }
    }
}

/// 钱包连接流程
#[async_trait]
pub trait WalletConnector: Send + Sync {
    /// 发起连接，用户取消或 provider 出错时返回 Err
    async fn connect(&self) -> Result<Arc<dyn WalletHandle>, WalletError>;

    /// 清除缓存的 provider，下次 connect 重新走授权流程
    async fn clear_cached_provider(&self);
}

/// 已连接的 provider 句柄
#[async_trait]
pub trait WalletHandle: Send + Sync {
    fn name(&self) -> &str;

    async fn chain_id(&self) -> anyhow::Result<u64>;

    async fn accounts(&self) -> anyhow::Result<Vec<String>>;

    /// 订阅 accountsChanged / chainChanged / networkChanged / disconnect
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;

    /// 是否支持 close
    fn supports_close(&self) -> bool {
        false
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

// ============ JSON-RPC 钱包实现 ============

/// JSON-RPC 钱包连接器
pub struct JsonRpcWalletConnector {
    url: String,
    poll_interval: Duration,
    request_timeout: Duration,
    cache_provider: bool,
    cached: Mutex<Option<Arc<JsonRpcWalletHandle>>>,
}

impl JsonRpcWalletConnector {
    pub fn new(
        url: impl Into<String>,
        poll_interval: Duration,
        request_timeout: Duration,
        cache_provider: bool,
    ) -> Self {
        Self {
            url: url.into(),
            poll_interval,
            request_timeout,
            cache_provider,
            cached: Mutex::new(None),
        }
    }

    pub fn from_config(config: &crate::config::WalletConfig) -> Self {
        Self::new(
            config.rpc_url.clone(),
            Duration::from_secs(config.poll_interval_secs),
            Duration::from_secs(config.request_timeout_secs),
            config.cache_provider,
        )
    }

    /// 请求授权；不支持 eth_requestAccounts 的节点退回 eth_accounts
    async fn authorize(client: &JsonRpcClient) -> Result<Vec<String>, WalletError> {
        match client.request_accounts().await {
            Ok(accounts) => Ok(accounts),
            Err(e) => {
                let method_missing = e
                    .downcast_ref::<RpcError>()
                    .map(|rpc| rpc.code == METHOD_NOT_FOUND_CODE)
                    .unwrap_or(false);
                if !method_missing {
                    return Err(e.into());
                }

                tracing::debug!("eth_requestAccounts not supported, falling back to eth_accounts");
                Ok(client.accounts().await?)
            }
        }
    }
}

#[async_trait]
impl WalletConnector for JsonRpcWalletConnector {
    async fn connect(&self) -> Result<Arc<dyn WalletHandle>, WalletError> {
        let mut cached = self.cached.lock().await;
        if self.cache_provider {
            if let Some(handle) = cached.as_ref().filter(|h| !h.is_closed()) {
                tracing::debug!(url = %self.url, "Reusing cached wallet provider");
                return Ok(handle.clone());
            }
        }

        let client = JsonRpcClient::new(self.url.clone(), self.request_timeout);

        let accounts = Self::authorize(&client).await?;
        if accounts.is_empty() {
            // 钱包锁定或未授权任何账户
            return Err(WalletError::Cancelled);
        }

        let chain_id = client.chain_id().await?;

        tracing::info!(
            url = %self.url,
            chain_id = chain_id,
            accounts = accounts.len(),
            "✅ Wallet provider connected"
        );

        let handle = Arc::new(JsonRpcWalletHandle::start(
            client,
            self.poll_interval,
            accounts,
            chain_id,
        ));

        if self.cache_provider {
            *cached = Some(handle.clone());
        }

        Ok(handle)
    }

    async fn clear_cached_provider(&self) {
        self.cached.lock().await.take();
    }
}

/// JSON-RPC 钱包句柄，后台任务轮询账户和链 ID 并推送变化
pub struct JsonRpcWalletHandle {
    client: JsonRpcClient,
    events: broadcast::Sender<ProviderEvent>,
    watcher: std::sync::Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl JsonRpcWalletHandle {
    fn start(
        client: JsonRpcClient,
        poll_interval: Duration,
        accounts: Vec<String>,
        chain_id: u64,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let watcher = tokio::spawn(watch_provider(
            client.clone(),
            events.clone(),
            poll_interval,
            accounts,
            chain_id,
        ));

        Self {
            client,
            events,
            watcher: std::sync::Mutex::new(Some(watcher)),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for JsonRpcWalletHandle {
    fn drop(&mut self) {
        if let Ok(mut watcher) = self.watcher.lock() {
            if let Some(task) = watcher.take() {
                task.abort();
            }
        }
    }
}

#[async_trait]
impl WalletHandle for JsonRpcWalletHandle {
    fn name(&self) -> &str {
        self.client.url()
    }

    async fn chain_id(&self) -> anyhow::Result<u64> {
        if self.is_closed() {
            anyhow::bail!("Wallet provider is closed");
        }
        self.client.chain_id().await
    }

    async fn accounts(&self) -> anyhow::Result<Vec<String>> {
        if self.is_closed() {
            anyhow::bail!("Wallet provider is closed");
        }
        self.client.accounts().await
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    fn supports_close(&self) -> bool {
        true
    }

    async fn close(&self) -> anyhow::Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let task = self
            .watcher
            .lock()
            .map_err(|_| anyhow::anyhow!("Wallet watcher lock poisoned"))?
            .take();
        if let Some(task) = task {
            task.abort();
        }

        tracing::info!(url = %self.client.url(), "Wallet provider closed");
        Ok(())
    }
}

/// 轮询钱包端点，账户或链变化时推送事件
async fn watch_provider(
    client: JsonRpcClient,
    events: broadcast::Sender<ProviderEvent>,
    poll_interval: Duration,
    mut accounts: Vec<String>,
    mut chain_id: u64,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // 第一次 tick 立即返回
    ticker.tick().await;

    let mut failures = 0u32;

    loop {
        ticker.tick().await;

        let polled = async {
            let accounts = client.accounts().await?;
            let chain_id = client.chain_id().await?;
            Ok::<_, anyhow::Error>((accounts, chain_id))
        };
        match polled.await {
            Ok((new_accounts, new_chain_id)) => {
                failures = 0;

                if new_accounts != accounts {
                    tracing::debug!(?new_accounts, "Wallet accounts changed");
                    accounts = new_accounts;
                    let _ = events.send(ProviderEvent::AccountsChanged(accounts.clone()));
                }

                if new_chain_id != chain_id {
                    tracing::debug!(from = chain_id, to = new_chain_id, "Wallet chain changed");
                    chain_id = new_chain_id;
                    let _ = events.send(ProviderEvent::ChainChanged(chain_id));
                    let _ = events.send(ProviderEvent::NetworkChanged(chain_id));
                }
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(error = ?e, failures = failures, "Wallet provider poll failed");

                if failures >= MAX_POLL_FAILURES {
                    tracing::warn!(url = %client.url(), "Wallet provider unreachable, reporting disconnect");
                    let _ = events.send(ProviderEvent::Disconnected);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(
            ProviderEvent::AccountsChanged(vec![]).name(),
            "accountsChanged"
        );
        assert_eq!(ProviderEvent::ChainChanged(1).name(), "chainChanged");
        assert_eq!(ProviderEvent::NetworkChanged(1).name(), "networkChanged");
        assert_eq!(ProviderEvent::Disconnected.name(), "disconnect");
    }

    #[test]
    fn test_wallet_error_from_rpc() {
        let rejected: anyhow::Error = RpcError {
            code: USER_REJECTED_CODE,
            message: "User rejected the request.".to_string(),
        }
        .into();
        assert!(matches!(WalletError::from(rejected), WalletError::Cancelled));

        let other: anyhow::Error = RpcError {
            code: -32000,
            message: "locked".to_string(),
        }
        .into();
        assert!(matches!(WalletError::from(other), WalletError::Provider(_)));

        let transport = anyhow::anyhow!("connection refused");
        assert!(matches!(
            WalletError::from(transport),
            WalletError::Transport(_)
        ));
    }
}

//! 钱包会话控制器
//!
//! 连接状态机：Disconnected → Connecting → Connected，显式断开或 provider 报告断开后回到
//! Disconnected。所有修改都经过同一把 `tokio::sync::Mutex`，页面读取 `watch` 快照，
//! 不会阻塞在控制器上。

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::{
    sync::{broadcast, watch, Mutex},
    task::JoinHandle,
};

use crate::{
    domain::{BalanceResult, ChainRegistry, ConnectionState, Session},
    error::AppError,
    service::{
        balance_query::BalanceQuery,
        wallet_provider::{ProviderEvent, WalletConnector, WalletHandle},
    },
    utils::AddressValidator,
    view::{render_state, ViewInput, ViewState},
};

/// 传输层检查：页面必须通过 HTTPS 提供，启动时判定一次
#[derive(Debug, Clone)]
pub struct TransportGuard {
    secure: bool,
    public_url: String,
}

impl TransportGuard {
    pub fn from_public_url(public_url: &str) -> Self {
        let secure = public_url.trim().to_lowercase().starts_with("https://");
        if !secure {
            tracing::warn!(
                public_url = %public_url,
                "Page is not served over HTTPS, wallet operations are disabled"
            );
        }
        Self {
            secure,
            public_url: public_url.to_string(),
        }
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn check(&self) -> Result<(), AppError> {
        if self.secure {
            Ok(())
        } else {
            Err(AppError::insecure_transport(format!(
                "Wallet access requires HTTPS, page is served from {}",
                self.public_url
            )))
        }
    }
}

/// 一次账户数据读取的结果
struct AccountData {
    account: String,
    chain_id: u64,
    network_name: String,
    /// Abort 策略下可能整体失败
    balances: Result<Vec<BalanceResult>, AppError>,
}

/// 会话控制器
pub struct SessionController {
    connector: Arc<dyn WalletConnector>,
    balance_query: BalanceQuery,
    registry: Arc<ChainRegistry>,
    balance_chains: Vec<u64>,
    transport: TransportGuard,
    usd_rate: Decimal,

    state: ConnectionState,
    refreshing: bool,
    session: Session,
    balances: Vec<BalanceResult>,
    network_name: Option<String>,
    last_error: Option<String>,
    last_refreshed: Option<DateTime<Utc>>,
    listener: Option<JoinHandle<()>>,
    view_tx: watch::Sender<ViewState>,
}

impl SessionController {
    pub fn new(
        connector: Arc<dyn WalletConnector>,
        balance_query: BalanceQuery,
        registry: Arc<ChainRegistry>,
        balance_chains: Vec<u64>,
        transport: TransportGuard,
        usd_rate: Decimal,
    ) -> (Self, watch::Receiver<ViewState>) {
        let initial = render_state(ViewInput {
            state: ConnectionState::Disconnected,
            refreshing: false,
            secure_transport: transport.is_secure(),
            network_name: None,
            account: None,
            balances: &[],
            usd_rate,
            error: None,
            refreshed_at: None,
        });
        let (view_tx, view_rx) = watch::channel(initial);

        let controller = Self {
            connector,
            balance_query,
            registry,
            balance_chains,
            transport,
            usd_rate,
            state: ConnectionState::Disconnected,
            refreshing: false,
            session: Session::new(),
            balances: Vec::new(),
            network_name: None,
            last_error: None,
            last_refreshed: None,
            listener: None,
            view_tx,
        };

        (controller, view_rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn balances(&self) -> &[BalanceResult] {
        &self.balances
    }

    /// 连接钱包
    ///
    /// `this` 用于事件监听任务回调控制器，任务不持有强引用
    pub async fn connect(&mut self, this: Weak<Mutex<SessionController>>) -> Result<(), AppError> {
        self.transport.check()?;

        if self.state != ConnectionState::Disconnected || self.refreshing {
            return Err(AppError::wallet_busy(format!(
                "Cannot connect while {:?}",
                self.state
            )));
        }

        self.state = ConnectionState::Connecting;
        self.last_error = None;
        self.publish();
        tracing::info!("Opening wallet connection");

        let handle = match self.connector.connect().await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error = %e, "Could not get a wallet connection");
                return Err(self.fail_connect(e.into()));
            }
        };

        // 先订阅，避免读取账户期间的事件丢失
        let events = handle.subscribe();

        match self.load_account_data(&handle).await {
            Ok(Some(data)) => {
                self.session
                    .establish(handle, data.account.clone(), data.chain_id);
                self.state = ConnectionState::Connected;
                self.apply(data);
                if let Some(stale) = self.listener.replace(spawn_event_listener(this, events)) {
                    stale.abort();
                }
                tracing::info!(
                    account = ?self.session.account(),
                    chain_id = ?self.session.chain_id(),
                    "✅ Wallet connected"
                );
                self.publish();
                Ok(())
            }
            Ok(None) => {
                close_quietly(&handle).await;
                Err(self.fail_connect(AppError::wallet_connect_failed(
                    "Wallet returned no accounts",
                )))
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load account data after connect");
                close_quietly(&handle).await;
                Err(self.fail_connect(e))
            }
        }
    }

    fn fail_connect(&mut self, err: AppError) -> AppError {
        self.state = ConnectionState::Disconnected;
        self.last_error = Some(err.message.clone());
        self.publish();
        err
    }

    /// 断开连接
    ///
    /// close 失败只记录日志，本地会话总会被清空
    pub async fn disconnect(&mut self) -> Result<(), AppError> {
        if self.state == ConnectionState::Connecting {
            return Err(AppError::wallet_busy("Connection in progress"));
        }

        self.last_error = None;
        self.clear_session().await;
        Ok(())
    }

    /// 清空会话并停止事件监听
    ///
    /// 在监听任务内调用时，句柄已被 `handle_event` 取走，这里不会 abort 自身
    async fn clear_session(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        if let Some(active) = self.session.clear() {
            if active.handle.supports_close() {
                if let Err(e) = active.handle.close().await {
                    tracing::error!(error = ?e, "Failed to close wallet provider");
                }
                self.connector.clear_cached_provider().await;
            }
            tracing::info!(account = %active.account, "Wallet disconnected");
        }

        self.state = ConnectionState::Disconnected;
        self.refreshing = false;
        self.balances.clear();
        self.network_name = None;
        self.last_refreshed = None;
        self.publish();
    }

    /// 重新拉取账户、链和余额，不改变连接状态
    pub async fn refresh_account_data(&mut self) -> Result<(), AppError> {
        if self.state != ConnectionState::Connected {
            return Err(AppError::wallet_disconnected("No wallet connected"));
        }
        let handle = match self.session.handle() {
            Some(handle) => handle.clone(),
            None => return Err(AppError::wallet_disconnected("No wallet connected")),
        };

        self.refreshing = true;
        self.publish();

        let outcome = self.load_account_data(&handle).await;
        self.refreshing = false;

        match outcome {
            Ok(Some(data)) => {
                self.session.update(data.account.clone(), data.chain_id);
                let failed = data.balances.as_ref().err().cloned();
                self.apply(data);
                self.publish();
                failed.map_or(Ok(()), Err)
            }
            Ok(None) => {
                tracing::info!("Wallet reported no accounts, treating as disconnect");
                self.clear_session().await;
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to refresh account data");
                self.balances.clear();
                self.last_error = Some(e.message.clone());
                self.publish();
                Err(e)
            }
        }
    }

    /// 处理 provider 事件，返回 false 时监听任务退出
    pub async fn handle_event(&mut self, event: ProviderEvent) -> bool {
        tracing::debug!(event = event.name(), "Wallet provider event");

        // 事件在监听任务内处理，断开时不能 abort 自身
        let listener = self.listener.take();

        match &event {
            ProviderEvent::AccountsChanged(accounts) if accounts.is_empty() => {
                tracing::info!("Wallet accounts cleared, disconnecting");
                self.clear_session().await;
            }
            ProviderEvent::Disconnected => {
                tracing::info!("Wallet provider disconnected");
                self.clear_session().await;
            }
            ProviderEvent::AccountsChanged(_)
            | ProviderEvent::ChainChanged(_)
            | ProviderEvent::NetworkChanged(_) => {
                if let Err(e) = self.refresh_account_data().await {
                    tracing::warn!(event = event.name(), error = %e, "Refresh after event failed");
                }
            }
        }

        if self.session.is_active() {
            self.listener = listener;
            true
        } else {
            false
        }
    }

    /// 读取 chainId、账户列表和各链余额
    ///
    /// 账户为空时返回 Ok(None)
    async fn load_account_data(
        &self,
        handle: &Arc<dyn WalletHandle>,
    ) -> Result<Option<AccountData>, AppError> {
        let chain_id = handle
            .chain_id()
            .await
            .map_err(|e| AppError::wallet_connect_failed(format!("Failed to read chain id: {:#}", e)))?;
        let accounts = handle
            .accounts()
            .await
            .map_err(|e| AppError::wallet_connect_failed(format!("Failed to read accounts: {:#}", e)))?;

        tracing::debug!(chain_id = chain_id, accounts = ?accounts, "Wallet account data");

        let first = match accounts.first() {
            Some(first) => first,
            None => return Ok(None),
        };
        let account = AddressValidator::normalize_account(first)
            .map_err(|e| AppError::invalid_address(e.to_string()))?;

        let network_name = self.registry.display_name(chain_id).to_string();
        let balances = self
            .balance_query
            .fetch_all(&account, &self.balance_chains)
            .await;

        Ok(Some(AccountData {
            account,
            chain_id,
            network_name,
            balances,
        }))
    }

    fn apply(&mut self, data: AccountData) {
        self.network_name = Some(data.network_name);
        match data.balances {
            Ok(balances) => {
                self.balances = balances;
                self.last_error = None;
                self.last_refreshed = Some(Utc::now());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Balance refresh aborted");
                self.balances.clear();
                self.last_error = Some(e.message);
            }
        }
    }

    /// 当前页面状态
    pub fn view(&self) -> ViewState {
        render_state(ViewInput {
            state: self.state,
            refreshing: self.refreshing,
            secure_transport: self.transport.is_secure(),
            network_name: self.network_name.as_deref(),
            account: self.session.account(),
            balances: &self.balances,
            usd_rate: self.usd_rate,
            error: self.last_error.as_deref(),
            refreshed_at: self.last_refreshed,
        })
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view());
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

async fn close_quietly(handle: &Arc<dyn WalletHandle>) {
    if handle.supports_close() {
        if let Err(e) = handle.close().await {
            tracing::warn!(error = ?e, "Failed to close wallet provider");
        }
    }
}

/// 每次连接成功后启动一次，事件逐个交给控制器处理
fn spawn_event_listener(
    controller: Weak<Mutex<SessionController>>,
    mut events: broadcast::Receiver<ProviderEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // 丢失的事件合并为一次刷新
                    tracing::warn!(skipped = skipped, "Wallet event listener lagged");
                    ProviderEvent::ChainChanged(0)
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("Wallet event stream closed");
                    break;
                }
            };

            let Some(strong) = controller.upgrade() else {
                break;
            };
            let keep_listening = strong.lock().await.handle_event(event).await;
            if !keep_listening {
                break;
            }
        }
    })
}

/// 控制器的共享句柄
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<SessionController>>,
    view_rx: watch::Receiver<ViewState>,
}

impl SessionHandle {
    pub fn new(controller: SessionController, view_rx: watch::Receiver<ViewState>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
            view_rx,
        }
    }

    /// 连接钱包，连接或刷新进行中时直接拒绝（不排队）
    pub async fn connect(&self) -> Result<ViewState, AppError> {
        if self.view_rx.borrow().is_busy() {
            return Err(AppError::wallet_busy("Wallet connection or refresh in progress"));
        }

        let weak = Arc::downgrade(&self.inner);
        let mut controller = self.inner.lock().await;
        controller.connect(weak).await?;
        Ok(controller.view())
    }

    /// 断开连接，连接进行中时直接拒绝（不等待钱包授权）
    pub async fn disconnect(&self) -> Result<ViewState, AppError> {
        if self.view_rx.borrow().state == ConnectionState::Connecting {
            return Err(AppError::wallet_busy("Connection in progress"));
        }

        let mut controller = self.inner.lock().await;
        controller.disconnect().await?;
        Ok(controller.view())
    }

    pub async fn refresh(&self) -> Result<ViewState, AppError> {
        let mut controller = self.inner.lock().await;
        controller.refresh_account_data().await?;
        Ok(controller.view())
    }

    /// 最新页面快照，不加锁
    pub fn view(&self) -> ViewState {
        self.view_rx.borrow().clone()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<ViewState> {
        self.view_rx.clone()
    }
}

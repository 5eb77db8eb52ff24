//! 测试辅助模块
//! 提供进程内 JSON-RPC 模拟节点、脚本化钱包和应用状态构建

#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tokio::sync::{broadcast, watch, Notify};
use usdt_board::{
    app_state::AppState,
    config::{Config, UnsupportedChainPolicy},
    domain::ChainConfig,
    service::{
        balance_query::RpcTokenReader,
        session_controller::SessionHandle,
        wallet_provider::{ProviderEvent, WalletConnector, WalletError, WalletHandle},
    },
    view::ViewState,
};

/// EIP-55 测试向量，可直接作为账户地址
pub const ACCOUNT_A: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
pub const ACCOUNT_B: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";

/// 测试用 USDT 合约地址
pub const TOKEN: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";

// ============ 模拟 JSON-RPC 节点 ============

/// 模拟节点的可变状态
#[derive(Debug, Clone)]
pub struct MockRpcState {
    pub chain_id: u64,
    pub accounts: Vec<String>,
    /// eth_requestAccounts 返回的错误 (code, message)
    pub request_accounts_error: Option<(i64, String)>,
    /// None 表示 balanceOf revert
    pub balance: Option<u128>,
    /// None 表示 decimals() revert
    pub decimals: Option<u8>,
    /// 所有请求返回 503
    pub unavailable: bool,
    /// 收到的方法名
    pub calls: Vec<String>,
}

impl Default for MockRpcState {
    fn default() -> Self {
        Self {
            chain_id: 1,
            accounts: vec![ACCOUNT_A.to_string()],
            request_accounts_error: None,
            balance: Some(0),
            decimals: Some(6),
            unavailable: false,
            calls: Vec::new(),
        }
    }
}

pub struct MockRpc {
    pub url: String,
    pub state: Arc<Mutex<MockRpcState>>,
}

impl MockRpc {
    /// 在 127.0.0.1 随机端口启动
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(MockRpcState::default()));

        let app = Router::new()
            .route("/", post(handle_rpc))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock RPC listener");
        let addr = listener.local_addr().expect("Mock RPC has no local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Mock RPC server failed");
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut MockRpcState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn calls(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|m| m.as_str() == method)
            .count()
    }
}

async fn handle_rpc(
    State(state): State<Arc<Mutex<MockRpcState>>>,
    Json(req): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    if state.unavailable {
        return (StatusCode::SERVICE_UNAVAILABLE, "node unavailable").into_response();
    }

    let id = req.get("id").cloned().unwrap_or(json!(1));
    let method = req["method"].as_str().unwrap_or_default().to_string();
    state.calls.push(method.clone());

    let outcome: Result<Value, (i64, String)> = match method.as_str() {
        "eth_chainId" => Ok(json!(format!("0x{:x}", state.chain_id))),
        "eth_accounts" => Ok(json!(state.accounts)),
        "eth_requestAccounts" => match &state.request_accounts_error {
            Some(err) => Err(err.clone()),
            None => Ok(json!(state.accounts)),
        },
        "eth_call" => {
            let data = req["params"][0]["data"].as_str().unwrap_or_default();
            if data.starts_with("0x70a08231") {
                state
                    .balance
                    .map(|b| json!(format!("0x{:064x}", b)))
                    .ok_or((3, "execution reverted".to_string()))
            } else if data.starts_with("0x313ce567") {
                state
                    .decimals
                    .map(|d| json!(format!("0x{:064x}", d)))
                    .ok_or((3, "execution reverted".to_string()))
            } else {
                Err((3, "execution reverted".to_string()))
            }
        }
        _ => Err((-32601, format!("the method {} does not exist", method))),
    };

    let body = match outcome {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err((code, message)) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": code, "message": message }
        }),
    };
    Json(body).into_response()
}

// ============ 脚本化钱包 ============

/// 内存钱包句柄，测试直接改状态并推送事件
pub struct FakeWallet {
    chain_id: Mutex<u64>,
    accounts: Mutex<Vec<String>>,
    events: broadcast::Sender<ProviderEvent>,
    /// 设置后下一次 accounts() 会等待 notify（只生效一次）
    read_gate: Mutex<Option<Arc<Notify>>>,
    pub close_fails: AtomicBool,
    pub closes: AtomicUsize,
    pub account_reads: AtomicUsize,
}

impl FakeWallet {
    pub fn new(chain_id: u64, accounts: &[&str]) -> Arc<Self> {
        Self::with_capacity(chain_id, accounts, 16)
    }

    /// 指定事件通道容量，用于制造订阅者滞后
    pub fn with_capacity(chain_id: u64, accounts: &[&str], capacity: usize) -> Arc<Self> {
        let (events, _) = broadcast::channel(capacity);
        Arc::new(Self {
            chain_id: Mutex::new(chain_id),
            accounts: Mutex::new(accounts.iter().map(|a| a.to_string()).collect()),
            events,
            read_gate: Mutex::new(None),
            close_fails: AtomicBool::new(false),
            closes: AtomicUsize::new(0),
            account_reads: AtomicUsize::new(0),
        })
    }

    /// 只改账户列表，不推送事件
    pub fn set_accounts(&self, accounts: &[&str]) {
        *self.accounts.lock().unwrap() = accounts.iter().map(|a| a.to_string()).collect();
    }

    pub fn gate_next_read(&self, gate: Arc<Notify>) {
        *self.read_gate.lock().unwrap() = Some(gate);
    }

    pub fn reads(&self) -> usize {
        self.account_reads.load(Ordering::SeqCst)
    }

    pub fn switch_chain(&self, chain_id: u64) {
        *self.chain_id.lock().unwrap() = chain_id;
        let _ = self.events.send(ProviderEvent::ChainChanged(chain_id));
    }

    pub fn switch_accounts(&self, accounts: &[&str]) {
        let accounts: Vec<String> = accounts.iter().map(|a| a.to_string()).collect();
        *self.accounts.lock().unwrap() = accounts.clone();
        let _ = self.events.send(ProviderEvent::AccountsChanged(accounts));
    }

    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }

    pub fn subscribers(&self) -> usize {
        self.events.receiver_count()
    }
}

#[async_trait]
impl WalletHandle for FakeWallet {
    fn name(&self) -> &str {
        "fake"
    }

    async fn chain_id(&self) -> anyhow::Result<u64> {
        Ok(*self.chain_id.lock().unwrap())
    }

    async fn accounts(&self) -> anyhow::Result<Vec<String>> {
        let gate = self.read_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.account_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.accounts.lock().unwrap().clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    fn supports_close(&self) -> bool {
        true
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.close_fails.load(Ordering::SeqCst) {
            anyhow::bail!("provider refused to close");
        }
        Ok(())
    }
}

/// 按脚本返回结果的连接器
pub struct ScriptedConnector {
    pub wallet: Arc<FakeWallet>,
    pub reject: AtomicBool,
    /// 设置后 connect 会等待 notify
    pub gate: Option<Arc<Notify>>,
    pub connects: AtomicUsize,
    pub cache_clears: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(wallet: Arc<FakeWallet>) -> Arc<Self> {
        Arc::new(Self {
            wallet,
            reject: AtomicBool::new(false),
            gate: None,
            connects: AtomicUsize::new(0),
            cache_clears: AtomicUsize::new(0),
        })
    }

    pub fn gated(wallet: Arc<FakeWallet>, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            wallet,
            reject: AtomicBool::new(false),
            gate: Some(gate),
            connects: AtomicUsize::new(0),
            cache_clears: AtomicUsize::new(0),
        })
    }

    pub fn rejecting(wallet: Arc<FakeWallet>) -> Arc<Self> {
        let connector = Self::new(wallet);
        connector.reject.store(true, Ordering::SeqCst);
        connector
    }
}

#[async_trait]
impl WalletConnector for ScriptedConnector {
    async fn connect(&self) -> Result<Arc<dyn WalletHandle>, WalletError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.reject.load(Ordering::SeqCst) {
            return Err(WalletError::Cancelled);
        }
        Ok(self.wallet.clone())
    }

    async fn clear_cached_provider(&self) {
        self.cache_clears.fetch_add(1, Ordering::SeqCst);
    }
}

// ============ 应用状态 ============

/// 测试配置：链 1 指向模拟节点，只展示链 1
pub fn test_config(rpc_url: &str, public_url: &str) -> Config {
    let mut config = Config::default();
    config.server.public_url = public_url.to_string();
    config.logging.level = "debug".to_string();
    config.logging.format = "text".to_string();
    config.wallet.rpc_url = rpc_url.to_string();
    config.wallet.poll_interval_secs = 1;
    config.balances.chains = vec![1];
    config.balances.display_precision = 6;
    config.balances.usd_rate = Decimal::new(999, 3);
    config.balances.rpc_timeout_secs = 5;
    config.balances.unsupported_chain_policy = UnsupportedChainPolicy::Degrade;
    config.chains = vec![ChainConfig::new(1, "Ethereum", rpc_url, Some(TOKEN))];
    config
}

/// 用脚本化钱包 + 真实 RPC 读取器构建应用状态
pub fn build_state(config: Config, connector: Arc<dyn WalletConnector>) -> Arc<AppState> {
    let reader = Arc::new(RpcTokenReader::new(Duration::from_secs(5)));
    Arc::new(AppState::new(Arc::new(config), connector, reader).expect("Failed to build state"))
}

/// 等待页面状态满足条件
pub async fn wait_for_view(
    session: &SessionHandle,
    pred: impl Fn(&ViewState) -> bool,
) -> ViewState {
    let mut rx: watch::Receiver<ViewState> = session.subscribe_view();
    tokio::time::timeout(Duration::from_secs(5), async move {
        loop {
            {
                let view = rx.borrow_and_update();
                if pred(&view) {
                    return view.clone();
                }
            }
            rx.changed().await.expect("View channel closed");
        }
    })
    .await
    .expect("Timed out waiting for view state")
}

use std::{sync::Arc, time::Duration};

use anyhow::Result;

use crate::{
    config::Config,
    domain::ChainRegistry,
    service::{
        balance_query::{BalanceQuery, RpcTokenReader, TokenReader},
        session_controller::{SessionController, SessionHandle, TransportGuard},
        wallet_provider::{JsonRpcWalletConnector, WalletConnector},
    },
};

/// 应用状态
/// 包含所有共享资源
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<ChainRegistry>,
    pub session: SessionHandle,
}

impl AppState {
    /// 用给定的钱包连接器和代币读取器构建（测试注入假实现）
    pub fn new(
        config: Arc<Config>,
        connector: Arc<dyn WalletConnector>,
        reader: Arc<dyn TokenReader>,
    ) -> Result<Self> {
        let registry = Arc::new(ChainRegistry::with_overrides(&config.chains));
        if let Err(errors) = registry.validate_configs() {
            anyhow::bail!("Invalid chain configuration: {}", errors.join("; "));
        }

        let balance_query = BalanceQuery::new(
            registry.clone(),
            reader,
            config.balances.display_precision,
            config.balances.unsupported_chain_policy,
        );
        let transport = TransportGuard::from_public_url(&config.server.public_url);

        let (controller, view_rx) = SessionController::new(
            connector,
            balance_query,
            registry.clone(),
            config.balances.chains.clone(),
            transport,
            config.balances.usd_rate,
        );

        tracing::info!(
            chains = ?config.balances.chains,
            registered = registry.chain_ids().len(),
            "✅ Application state initialized"
        );

        Ok(Self {
            config,
            registry,
            session: SessionHandle::new(controller, view_rx),
        })
    }

    /// 生产环境：JSON-RPC 钱包端点 + 各链公共 RPC
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let connector = Arc::new(JsonRpcWalletConnector::from_config(&config.wallet));
        let reader = Arc::new(RpcTokenReader::new(Duration::from_secs(
            config.balances.rpc_timeout_secs,
        )));
        Self::new(config, connector, reader)
    }
}

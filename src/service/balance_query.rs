//! 多链 USDT 余额查询
//!
//! 每条链独立建立只读 RPC 连接（与钱包 provider 无关），调用 balanceOf / decimals。
//! 各链查询互不依赖，并发发出后按配置顺序汇总。

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use ethers::types::U256;

pub use crate::config::UnsupportedChainPolicy;
use crate::{
    domain::{BalanceResult, ChainConfig, ChainRegistry, DEFAULT_TOKEN_DECIMALS, UNKNOWN_CHAIN_NAME},
    error::AppError,
    service::rpc_client::JsonRpcClient,
};

/// 代币合约只读接口
#[async_trait]
pub trait TokenReader: Send + Sync {
    async fn balance_of(&self, chain: &ChainConfig, token: &str, owner: &str) -> Result<U256>;

    async fn decimals(&self, chain: &ChainConfig, token: &str) -> Result<u8>;
}

/// 基于 JSON-RPC 的实现，每次调用新建短连接
pub struct RpcTokenReader {
    timeout: Duration,
}

impl RpcTokenReader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn client(&self, chain: &ChainConfig) -> JsonRpcClient {
        JsonRpcClient::new(chain.rpc_url.clone(), self.timeout)
    }
}

#[async_trait]
impl TokenReader for RpcTokenReader {
    async fn balance_of(&self, chain: &ChainConfig, token: &str, owner: &str) -> Result<U256> {
        self.client(chain).erc20_balance_of(token, owner).await
    }

    async fn decimals(&self, chain: &ChainConfig, token: &str) -> Result<u8> {
        self.client(chain).erc20_decimals(token).await
    }
}

/// 余额查询服务
#[derive(Clone)]
pub struct BalanceQuery {
    registry: Arc<ChainRegistry>,
    reader: Arc<dyn TokenReader>,
    precision: u32,
    policy: UnsupportedChainPolicy,
}

impl BalanceQuery {
    pub fn new(
        registry: Arc<ChainRegistry>,
        reader: Arc<dyn TokenReader>,
        precision: u32,
        policy: UnsupportedChainPolicy,
    ) -> Self {
        Self {
            registry,
            reader,
            precision,
            policy,
        }
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn policy(&self) -> UnsupportedChainPolicy {
        self.policy
    }

    /// 查询单条链上 owner 的 USDT 余额
    ///
    /// - 链未注册或无代币合约：Degrade 策略返回 Unknown / 0，Abort 策略返回错误
    /// - balanceOf 失败：返回该链名称 + 0，记录 error
    /// - decimals 失败：退回 6 位精度，记录 warn
    pub async fn fetch(&self, owner: &str, chain_id: u64) -> Result<BalanceResult, AppError> {
        let (chain, token) = match self.registry.get_by_chain_id(chain_id) {
            Some(chain) if chain.supports_token() => {
                let token = chain.token_address.as_deref().unwrap_or_default();
                (chain, token)
            }
            found => {
                return match self.policy {
                    UnsupportedChainPolicy::Degrade => {
                        tracing::debug!(
                            chain_id = chain_id,
                            registered = found.is_some(),
                            "Chain not supported, reporting zero balance"
                        );
                        Ok(BalanceResult::zero(
                            chain_id,
                            UNKNOWN_CHAIN_NAME,
                            self.precision,
                        ))
                    }
                    UnsupportedChainPolicy::Abort => Err(AppError::chain_not_supported(format!(
                        "Chain {} is not supported",
                        chain_id
                    ))),
                };
            }
        };

        let (balance, decimals) = futures::future::join(
            self.reader.balance_of(chain, token, owner),
            self.reader.decimals(chain, token),
        )
        .await;

        let raw = match balance {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(
                    chain = %chain.name,
                    owner = %owner,
                    error = ?e,
                    "Failed to fetch USDT balance"
                );
                return Ok(BalanceResult::zero(chain_id, &chain.name, self.precision));
            }
        };

        let decimals = decimals.unwrap_or_else(|e| {
            tracing::warn!(
                chain = %chain.name,
                error = %e,
                "decimals() failed, falling back to {}",
                DEFAULT_TOKEN_DECIMALS
            );
            DEFAULT_TOKEN_DECIMALS
        });

        match BalanceResult::new(chain_id, &chain.name, raw, decimals, self.precision) {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::error!(chain = %chain.name, error = ?e, "Failed to format balance");
                Ok(BalanceResult::zero(chain_id, &chain.name, self.precision))
            }
        }
    }

    /// 并发查询多条链，结果顺序与 chain_ids 一致
    pub async fn fetch_all(
        &self,
        owner: &str,
        chain_ids: &[u64],
    ) -> Result<Vec<BalanceResult>, AppError> {
        let queries = chain_ids.iter().map(|&chain_id| self.fetch(owner, chain_id));
        let outcomes = futures::future::join_all(queries).await;

        let results = outcomes.into_iter().collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            owner = %owner,
            chains = results.len(),
            "✅ Balances refreshed"
        );

        Ok(results)
    }
}

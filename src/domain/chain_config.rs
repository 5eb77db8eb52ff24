//! 链配置模块
//!
//! 定义余额看板支持的 EVM 链：显示名称、公共 RPC 端点、USDT 合约地址

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 未注册链的显示名称
pub const UNKNOWN_CHAIN_NAME: &str = "Unknown";

/// 链配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// 链 ID (EIP-155)
    pub chain_id: u64,
    /// 链名称
    pub name: String,
    /// RPC 端点
    pub rpc_url: String,
    /// USDT 合约地址（None 表示该链不支持余额查询）
    #[serde(default)]
    pub token_address: Option<String>,
}

impl ChainConfig {
    pub fn new(chain_id: u64, name: &str, rpc_url: &str, token_address: Option<&str>) -> Self {
        Self {
            chain_id,
            name: name.to_string(),
            rpc_url: rpc_url.to_string(),
            token_address: token_address.map(str::to_string),
        }
    }

    /// 是否可以查询代币余额
    pub fn supports_token(&self) -> bool {
        self.token_address
            .as_deref()
            .map(|a| !a.trim().is_empty())
            .unwrap_or(false)
    }
}

/// 链配置注册表
///
/// 启动时构建，之后只读
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    configs: HashMap<u64, ChainConfig>,
    /// 注册顺序，决定默认展示顺序
    order: Vec<u64>,
}

impl ChainRegistry {
    /// 创建预配置的注册表
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_default_chains();
        registry
    }

    /// 空注册表
    pub fn empty() -> Self {
        Self {
            configs: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// 用默认链 + 覆盖项构建（覆盖项按 chain_id 替换或追加）
    pub fn with_overrides(overrides: &[ChainConfig]) -> Self {
        let mut registry = Self::new();
        for config in overrides {
            registry.register(config.clone());
        }
        registry
    }

    /// 注册默认支持的链
    fn register_default_chains(&mut self) {
        // Ethereum Mainnet
        self.register(ChainConfig::new(
            1,
            "Ethereum Mainnet",
            "https://ethereum.publicnode.com",
            Some("0xdac17f958d2ee523a2206206994597c13d831ec7"),
        ));

        // BSC
        self.register(ChainConfig::new(
            56,
            "Binance Smart Chain",
            "https://bsc-dataseed.binance.org/",
            Some("0x55d398326f99059ff775485246999027b3197955"),
        ));

        // Polygon
        self.register(ChainConfig::new(
            137,
            "Polygon",
            "https://polygon-rpc.com/",
            Some("0x9C9e5fD8bbc25984B178FdCE6117Defa39d2db39"),
        ));

        // Arbitrum (L2)
        self.register(ChainConfig::new(
            42161,
            "Arbitrum",
            "https://arb1.arbitrum.io/rpc",
            Some("0xfd086bc7cd5c481dcc9c85ebe478a1c0b69fcbb9"),
        ));
    }

    /// 注册链配置（同 chain_id 覆盖，保留原位置）
    pub fn register(&mut self, config: ChainConfig) {
        let chain_id = config.chain_id;
        if self.configs.insert(chain_id, config).is_none() {
            self.order.push(chain_id);
        }
    }

    /// 通过 chain_id 获取配置
    pub fn get_by_chain_id(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.configs.get(&chain_id)
    }

    /// 链显示名称，未注册返回 "Unknown"
    pub fn display_name(&self, chain_id: u64) -> &str {
        self.configs
            .get(&chain_id)
            .map(|c| c.name.as_str())
            .unwrap_or(UNKNOWN_CHAIN_NAME)
    }

    /// 按注册顺序列出所有链
    pub fn list_all(&self) -> Vec<&ChainConfig> {
        self.order
            .iter()
            .filter_map(|id| self.configs.get(id))
            .collect()
    }

    /// 按注册顺序列出所有 chain_id
    pub fn chain_ids(&self) -> Vec<u64> {
        self.order.clone()
    }

    /// 验证链配置完整性
    pub fn validate_configs(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for config in self.list_all() {
            if config.name.trim().is_empty() {
                errors.push(format!("Chain {} has empty name", config.chain_id));
            }

            if !config.rpc_url.starts_with("http://") && !config.rpc_url.starts_with("https://") {
                errors.push(format!(
                    "Chain {} has invalid rpc_url: {}",
                    config.name, config.rpc_url
                ));
            }

            if let Some(token) = &config.token_address {
                if crate::infrastructure::rpc_validator::validate_address(token).is_err() {
                    errors.push(format!(
                        "Chain {} has invalid token_address: {}",
                        config.name, token
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::new()
    }
}

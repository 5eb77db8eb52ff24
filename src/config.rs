//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::{path::Path, str::FromStr};

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{balance::MAX_DISPLAY_PRECISION, ChainConfig};

/// 应用配置结构体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub balances: BalanceConfig,
    /// 追加或覆盖默认链
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// 页面对外地址，scheme 决定是否允许钱包操作
    pub public_url: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
    pub ansi: bool,
}

/// 钱包端点配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub rpc_url: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub cache_provider: bool,
}

/// 未注册链的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsupportedChainPolicy {
    /// 该链显示为 Unknown / 0，其余链照常
    Degrade,
    /// 整次刷新失败并提示
    Abort,
}

impl FromStr for UnsupportedChainPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "degrade" => Ok(Self::Degrade),
            "abort" => Ok(Self::Abort),
            other => anyhow::bail!("Unknown unsupported chain policy: {}", other),
        }
    }
}

/// 余额展示配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    /// 按展示顺序排列的 chain_id
    pub chains: Vec<u64>,
    pub display_precision: u32,
    /// USDT → USD 近似汇率
    pub usd_rate: Decimal,
    pub rpc_timeout_secs: u64,
    pub unsupported_chain_policy: UnsupportedChainPolicy,
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8088".into()),
            public_url: std::env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "https://localhost:8088".into()),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            ansi: std::env::var("LOG_ANSI")
                .ok()
                .map(|v| v != "0")
                .unwrap_or(true),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            rpc_url: std::env::var("WALLET_RPC_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:1248".into()),
            poll_interval_secs: env_parse("WALLET_POLL_INTERVAL_SECS").unwrap_or(4),
            request_timeout_secs: env_parse("WALLET_TIMEOUT_SECS").unwrap_or(30),
            cache_provider: std::env::var("WALLET_CACHE_PROVIDER")
                .ok()
                .map(|v| v == "1")
                .unwrap_or(false),
        }
    }
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            chains: std::env::var("BALANCE_CHAINS")
                .ok()
                .and_then(|s| parse_chain_list(&s).ok())
                .unwrap_or_else(|| vec![1, 56, 137, 42161]),
            display_precision: env_parse("BALANCE_DISPLAY_PRECISION").unwrap_or(6),
            usd_rate: env_parse("USDT_USD_RATE").unwrap_or_else(|| Decimal::new(999, 3)),
            rpc_timeout_secs: env_parse("RPC_TIMEOUT_SECS").unwrap_or(10),
            unsupported_chain_policy: env_parse("UNSUPPORTED_CHAIN_POLICY")
                .unwrap_or(UnsupportedChainPolicy::Degrade),
        }
    }
}

/// 解析 "1,56,137" 形式的链列表
pub fn parse_chain_list(s: &str) -> Result<Vec<u64>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>()
                .with_context(|| format!("Invalid chain id: {}", part))
        })
        .collect()
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self::default())
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                // 文件中缺省的段落和字段仍由环境变量默认值填充
                config = Self::from_file(path)?;
            } else {
                tracing::warn!("Config file {:?} not found, using environment", path.as_ref());
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        let url = self.server.public_url.trim().to_lowercase();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("PUBLIC_URL must start with http:// or https://");
        }

        // 验证日志级别
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        // 验证日志格式
        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        if self.wallet.poll_interval_secs == 0 {
            anyhow::bail!("WALLET_POLL_INTERVAL_SECS must be greater than 0");
        }

        if self.balances.chains.is_empty() {
            anyhow::bail!("BALANCE_CHAINS must list at least one chain");
        }

        if self.balances.display_precision > MAX_DISPLAY_PRECISION {
            anyhow::bail!(
                "BALANCE_DISPLAY_PRECISION must be at most {}",
                MAX_DISPLAY_PRECISION
            );
        }

        if self.balances.usd_rate.is_sign_negative() {
            anyhow::bail!("USDT_USD_RATE must not be negative");
        }

        Ok(())
    }
}

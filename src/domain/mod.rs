//! Domain 模块
//!
//! 链配置、会话和余额模型

pub mod balance;
pub mod chain_config;
pub mod session;

// 重新导出常用类型
pub use balance::{BalanceResult, DEFAULT_TOKEN_DECIMALS};
pub use chain_config::{ChainConfig, ChainRegistry, UNKNOWN_CHAIN_NAME};
pub use session::{ActiveSession, ConnectionState, Session};

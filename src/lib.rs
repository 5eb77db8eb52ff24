//! USDT Balance Board - 多链 USDT 余额看板
//!
//! 连接钱包 provider，识别当前链，展示账户在各 EVM 链上的 USDT 余额。
//! 只读：不签名、不发送交易、不持久化。

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod service;
pub mod utils;
pub mod view;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{AppError, AppErrorCode};

pub mod prelude {
    pub use crate::{
        app_state::AppState,
        config::Config,
        domain::{BalanceResult, ChainConfig, ChainRegistry, ConnectionState},
        error::{AppError, AppErrorCode},
        service::session_controller::SessionHandle,
        view::ViewState,
    };
}

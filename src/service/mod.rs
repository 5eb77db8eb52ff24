pub mod balance_query; // 多链 USDT 余额查询
pub mod rpc_client;
pub mod session_controller; // 钱包会话状态机
pub mod wallet_provider;

//! USDT Balance Board 主入口

use std::sync::Arc;

use anyhow::Result;
use usdt_board::{api, app_state::AppState, config::Config, infrastructure::logging};

#[tokio::main]
async fn main() -> Result<()> {
    // ✅ 1. 加载环境变量
    dotenvy::dotenv().ok();

    // ✅ 2. 加载配置（CONFIG_PATH 指定的文件优先）
    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())?;

    // ✅ 3. 初始化日志
    logging::init_logging(&config.logging)?;
    config.validate()?;

    tracing::info!("🚀 Starting USDT Balance Board");

    // ✅ 4. 初始化应用状态
    let config = Arc::new(config);
    let state = Arc::new(AppState::from_config(config.clone())?);

    // ✅ 5. 构建路由并启动服务器
    let app = api::routes(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    tracing::info!(
        wallet = %config.wallet.rpc_url,
        "🎉 Server listening on http://{}",
        config.server.bind_addr
    );

    axum::serve(listener, app).await?;

    Ok(())
}

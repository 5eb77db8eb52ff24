//! 页面与会话接口
//!
//! HTML 表单走 POST /connect、/disconnect 后重定向回首页；
//! JSON 接口返回与页面同源的 ViewState

use std::sync::Arc;

use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;

use crate::{
    api::response::{success_response, ApiResponse},
    app_state::AppState,
    domain::ChainConfig,
    error::AppError,
    view::{render_html, ViewState},
};

/// GET / - 渲染页面
pub async fn index(State(st): State<Arc<AppState>>) -> Html<String> {
    Html(render_html(&st.session.view()))
}

/// POST /connect - 表单提交
///
/// 失败信息已写入页面状态，这里只记录日志并重定向
pub async fn connect_form(State(st): State<Arc<AppState>>) -> Response {
    if let Err(e) = st.session.connect().await {
        tracing::warn!(code = e.code.as_str(), message = %e.message, "Connect request failed");
    }
    Redirect::to("/").into_response()
}

/// POST /disconnect - 表单提交
pub async fn disconnect_form(State(st): State<Arc<AppState>>) -> Response {
    if let Err(e) = st.session.disconnect().await {
        tracing::warn!(code = e.code.as_str(), message = %e.message, "Disconnect request failed");
    }
    Redirect::to("/").into_response()
}

/// GET /api/state
pub async fn get_state(
    State(st): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ViewState>>, AppError> {
    success_response(st.session.view())
}

/// POST /api/connect
pub async fn api_connect(
    State(st): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ViewState>>, AppError> {
    let view = st.session.connect().await?;
    success_response(view)
}

/// POST /api/disconnect
pub async fn api_disconnect(
    State(st): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ViewState>>, AppError> {
    let view = st.session.disconnect().await?;
    success_response(view)
}

/// POST /api/refresh - 手动重新拉取余额
pub async fn api_refresh(
    State(st): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ViewState>>, AppError> {
    let view = st.session.refresh().await?;
    success_response(view)
}

/// 链列表条目
#[derive(Debug, Serialize)]
pub struct ChainInfo {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    pub token_address: Option<String>,
    /// 是否在余额表中展示
    pub displayed: bool,
}

impl ChainInfo {
    fn from_config(config: &ChainConfig, displayed: bool) -> Self {
        Self {
            chain_id: config.chain_id,
            name: config.name.clone(),
            rpc_url: config.rpc_url.clone(),
            token_address: config.token_address.clone(),
            displayed,
        }
    }
}

/// GET /api/chains - 注册表中的所有链
pub async fn list_chains(
    State(st): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<ChainInfo>>>, AppError> {
    let displayed = &st.config.balances.chains;
    let chains = st
        .registry
        .list_all()
        .into_iter()
        .map(|c| ChainInfo::from_config(c, displayed.contains(&c.chain_id)))
        .collect();
    success_response(chains)
}

#[derive(Debug, Serialize)]
pub struct Healthz {
    pub status: &'static str,
    pub wallet_state: crate::domain::ConnectionState,
    pub secure_transport: bool,
}

/// GET /healthz
pub async fn healthz(State(st): State<Arc<AppState>>) -> Json<Healthz> {
    let view = st.session.view();
    Json(Healthz {
        status: "ok",
        wallet_state: view.state,
        secure_transport: !view.https_alert,
    })
}

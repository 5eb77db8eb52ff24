use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

pub mod response; // 统一响应格式
pub mod session_api; // 页面、会话与链列表

/// 构建全部路由
pub fn routes(state: Arc<AppState>) -> Router {
    let page_routes = Router::new()
        .route("/", get(session_api::index))
        .route("/connect", post(session_api::connect_form))
        .route("/disconnect", post(session_api::disconnect_form));

    let api_routes = Router::new()
        .route("/api/state", get(session_api::get_state))
        .route("/api/connect", post(session_api::api_connect))
        .route("/api/disconnect", post(session_api::api_disconnect))
        .route("/api/refresh", post(session_api::api_refresh))
        .route("/api/chains", get(session_api::list_chains))
        .route("/healthz", get(session_api::healthz));

    page_routes
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::service::wallet_provider::WalletError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorCode {
    // HTTP 基础错误码
    Internal,

    // 业务错误码
    InsecureTransport,
    WalletConnectFailed,
    WalletBusy,
    WalletDisconnected,
    InvalidAddress,
    ChainNotSupported,
}

impl AppErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppErrorCode::Internal => "internal",
            AppErrorCode::InsecureTransport => "insecure_transport",
            AppErrorCode::WalletConnectFailed => "wallet_connect_failed",
            AppErrorCode::WalletBusy => "wallet_busy",
            AppErrorCode::WalletDisconnected => "wallet_disconnected",
            AppErrorCode::InvalidAddress => "invalid_address",
            AppErrorCode::ChainNotSupported => "chain_not_supported",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    pub status: StatusCode,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.as_str(),
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    fn with_code(code: AppErrorCode, status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            status,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_code(
            AppErrorCode::Internal,
            StatusCode::INTERNAL_SERVER_ERROR,
            msg,
        )
    }

    /// 页面未通过 HTTPS 提供，钱包操作全部拒绝
    pub fn insecure_transport(msg: impl Into<String>) -> Self {
        Self::with_code(AppErrorCode::InsecureTransport, StatusCode::FORBIDDEN, msg)
    }

    pub fn wallet_connect_failed(msg: impl Into<String>) -> Self {
        Self::with_code(AppErrorCode::WalletConnectFailed, StatusCode::BAD_GATEWAY, msg)
    }

    /// 连接或刷新进行中（按钮禁用）
    pub fn wallet_busy(msg: impl Into<String>) -> Self {
        Self::with_code(AppErrorCode::WalletBusy, StatusCode::CONFLICT, msg)
    }

    pub fn wallet_disconnected(msg: impl Into<String>) -> Self {
        Self::with_code(AppErrorCode::WalletDisconnected, StatusCode::CONFLICT, msg)
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::with_code(AppErrorCode::InvalidAddress, StatusCode::BAD_REQUEST, msg)
    }

    pub fn chain_not_supported(msg: impl Into<String>) -> Self {
        Self::with_code(AppErrorCode::ChainNotSupported, StatusCode::BAD_REQUEST, msg)
    }
}

impl From<WalletError> for AppError {
    fn from(err: WalletError) -> Self {
        Self::wallet_connect_failed(err.to_string())
    }
}

// 从 anyhow 错误转换
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{:#}", err))
    }
}

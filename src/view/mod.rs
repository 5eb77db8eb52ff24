//! 页面视图
//!
//! 会话状态 + 有序余额列表 → 页面状态（纯函数），再渲染为 HTML。
//! JSON 接口和 HTML 页面共用同一个 [`ViewState`]。

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{BalanceResult, ConnectionState};

/// 渲染输入
#[derive(Debug, Clone, Copy)]
pub struct ViewInput<'a> {
    pub state: ConnectionState,
    /// 正在重新拉取账户数据
    pub refreshing: bool,
    pub secure_transport: bool,
    pub network_name: Option<&'a str>,
    pub account: Option<&'a str>,
    pub balances: &'a [BalanceResult],
    pub usd_rate: Decimal,
    pub error: Option<&'a str>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// 表格中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceRow {
    pub chain_name: String,
    pub balance: String,
    /// 近似美元价值，余额超出 Decimal 范围时为 None
    pub usd: Option<String>,
}

/// 页面状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub state: ConnectionState,
    /// "prepare" 面板（未连接）
    pub show_prepare: bool,
    /// "connected" 面板，与 prepare 互斥
    pub show_connected: bool,
    pub connect_enabled: bool,
    pub disconnect_enabled: bool,
    pub https_alert: bool,
    pub network_name: Option<String>,
    pub selected_account: Option<String>,
    pub rows: Vec<BalanceRow>,
    pub error: Option<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl ViewState {
    /// 连接或刷新进行中
    pub fn is_busy(&self) -> bool {
        self.state == ConnectionState::Connecting
            || (self.state == ConnectionState::Connected && !self.show_connected)
    }
}

/// 计算页面状态
pub fn render_state(input: ViewInput<'_>) -> ViewState {
    let connected = input.state == ConnectionState::Connected;
    let show_connected = connected && !input.refreshing;

    let rows = if connected {
        input
            .balances
            .iter()
            .map(|b| BalanceRow {
                chain_name: b.chain_name.clone(),
                balance: b.display_balance.clone(),
                usd: b.usd_equivalent(input.usd_rate),
            })
            .collect()
    } else {
        Vec::new()
    };

    ViewState {
        state: input.state,
        show_prepare: !show_connected,
        show_connected,
        connect_enabled: input.secure_transport
            && input.state == ConnectionState::Disconnected
            && !input.refreshing,
        disconnect_enabled: connected && !input.refreshing,
        https_alert: !input.secure_transport,
        network_name: connected
            .then(|| input.network_name.map(str::to_string))
            .flatten(),
        selected_account: connected
            .then(|| input.account.map(str::to_string))
            .flatten(),
        rows,
        error: input.error.map(str::to_string),
        refreshed_at: input.refreshed_at,
    }
}

/// 渲染完整 HTML 页面
pub fn render_html(view: &ViewState) -> String {
    let mut html = String::with_capacity(4096);

    html.push_str(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>USDT Balance Board</title>
  <style>
    body { font-family: sans-serif; max-width: 760px; margin: 2rem auto; }
    .alert { padding: .75rem 1rem; border-radius: 4px; margin-bottom: 1rem; }
    .alert-danger { background: #f8d7da; color: #721c24; }
    table { width: 100%; border-collapse: collapse; }
    th, td { text-align: left; padding: .4rem; border-bottom: 1px solid #ddd; }
    [hidden] { display: none; }
  </style>
</head>
<body>
  <h1>USDT Balance Board</h1>
"#,
    );

    if view.https_alert {
        html.push_str(
            r#"  <div id="alert-error-https" class="alert alert-danger">Wallet access is only available over an HTTPS connection.</div>
"#,
        );
    }

    if let Some(error) = &view.error {
        let _ = writeln!(
            html,
            r#"  <div id="alert-error" class="alert alert-danger">{}</div>"#,
            escape_html(error)
        );
    }

    // prepare 面板
    let _ = writeln!(html, r#"  <div id="prepare"{}>"#, hidden_attr(!view.show_prepare));
    let _ = writeln!(
        html,
        r#"    <form method="post" action="/connect"><button id="btn-connect" type="submit"{}>Connect wallet</button></form>"#,
        if view.connect_enabled { "" } else { " disabled" }
    );
    html.push_str("  </div>\n");

    // connected 面板
    let _ = writeln!(
        html,
        r#"  <div id="connected"{}>"#,
        hidden_attr(!view.show_connected)
    );
    let _ = writeln!(
        html,
        r#"    <p>Connected blockchain: <strong id="network-name">{}</strong></p>"#,
        escape_html(view.network_name.as_deref().unwrap_or_default())
    );
    let _ = writeln!(
        html,
        r#"    <p>Selected account: <strong id="selected-account">{}</strong></p>"#,
        escape_html(view.selected_account.as_deref().unwrap_or_default())
    );
    html.push_str(
        r#"    <table>
      <thead><tr><th>Network</th><th>USDT balance</th><th>≈ USD</th></tr></thead>
      <tbody id="accounts">
"#,
    );
    for row in &view.rows {
        let _ = writeln!(
            html,
            r#"        <tr><td class="network">{}</td><td class="balance">{}</td><td class="usd">{}</td></tr>"#,
            escape_html(&row.chain_name),
            escape_html(&row.balance),
            row.usd
                .as_deref()
                .map(|usd| format!("${}", escape_html(usd)))
                .unwrap_or_else(|| "-".to_string())
        );
    }
    html.push_str("      </tbody>\n    </table>\n");
    if let Some(at) = view.refreshed_at {
        let _ = writeln!(
            html,
            r#"    <p><small>Updated {}</small></p>"#,
            at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    let _ = writeln!(
        html,
        r#"    <form method="post" action="/disconnect"><button id="btn-disconnect" type="submit"{}>Disconnect wallet</button></form>"#,
        if view.disconnect_enabled { "" } else { " disabled" }
    );
    html.push_str("  </div>\n</body>\n</html>\n");

    html
}

fn hidden_attr(hidden: bool) -> &'static str {
    if hidden {
        " hidden"
    } else {
        ""
    }
}

/// HTML 转义
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

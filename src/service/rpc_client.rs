// JSON-RPC 客户端 - 以太坊节点 / 钱包端点的统一调用入口
// 只做只读调用：eth_call、eth_chainId、eth_accounts

use std::time::Duration;

use anyhow::{Context, Result};
use ethers::{
    abi::{self, Token},
    types::{Address, U256},
};
use serde_json::Value;

use crate::infrastructure::rpc_validator;

/// ERC20 balanceOf(address)
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
/// ERC20 decimals()
pub const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];

/// JSON-RPC 层返回的错误对象
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("RPC error {code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Clone)]
pub struct JsonRpcClient {
    http_client: reqwest::Client,
    url: String,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http_client: client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// 发送 JSON-RPC 请求，返回 result 字段
    ///
    /// 节点返回的 error 对象以 [`RpcError`] 形式放进 anyhow 错误链，调用方可 downcast
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request to {}", method, self.url))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            anyhow::bail!("RPC request failed with status {}: {}", status, body);
        }

        let mut json: Value =
            serde_json::from_str(&body).context("Failed to parse JSON response")?;

        // 检查 JSON-RPC 错误
        if let Some(error) = json.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown RPC error")
                .to_string();
            let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
            return Err(RpcError { code, message }.into());
        }

        rpc_validator::validate_rpc_response(&json).context("Invalid RPC response format")?;

        Ok(json["result"].take())
    }

    /// eth_call（latest 区块），返回十六进制结果
    pub async fn eth_call(&self, to: &str, data: &str) -> Result<String> {
        let result = self
            .request(
                "eth_call",
                serde_json::json!([{ "to": to, "data": data }, "latest"]),
            )
            .await?;

        result
            .as_str()
            .map(str::to_string)
            .context("eth_call result is not a string")
    }

    /// eth_chainId
    pub async fn chain_id(&self) -> Result<u64> {
        let result = self.request("eth_chainId", serde_json::json!([])).await?;
        let hex_str = result.as_str().context("eth_chainId result is not a string")?;
        rpc_validator::validate_chain_id(hex_str)
    }

    /// eth_accounts
    pub async fn accounts(&self) -> Result<Vec<String>> {
        let result = self.request("eth_accounts", serde_json::json!([])).await?;
        parse_accounts(result)
    }

    /// eth_requestAccounts（EIP-1102，触发钱包授权）
    pub async fn request_accounts(&self) -> Result<Vec<String>> {
        let result = self
            .request("eth_requestAccounts", serde_json::json!([]))
            .await?;
        parse_accounts(result)
    }

    /// ERC20 balanceOf(owner)
    pub async fn erc20_balance_of(&self, token: &str, owner: &str) -> Result<U256> {
        let data = encode_balance_of(owner)?;
        let result_hex = self.eth_call(token, &data).await?;
        rpc_validator::validate_uint256(&result_hex)
            .context("Failed to validate balanceOf result")
    }

    /// ERC20 decimals()
    pub async fn erc20_decimals(&self, token: &str) -> Result<u8> {
        let data = format!("0x{}", hex::encode(DECIMALS_SELECTOR));
        let result_hex = self.eth_call(token, &data).await?;
        rpc_validator::validate_uint8(&result_hex).context("Failed to validate decimals result")
    }
}

/// 编码 balanceOf(address) 调用数据
pub fn encode_balance_of(owner: &str) -> Result<String> {
    let owner: Address = rpc_validator::validate_address(owner)?
        .parse()
        .context("Failed to parse owner address")?;

    let mut data = BALANCE_OF_SELECTOR.to_vec();
    data.extend(abi::encode(&[Token::Address(owner)]));
    Ok(format!("0x{}", hex::encode(data)))
}

fn parse_accounts(result: Value) -> Result<Vec<String>> {
    let accounts: Vec<String> =
        serde_json::from_value(result).context("Accounts result is not a string array")?;
    Ok(accounts)
}

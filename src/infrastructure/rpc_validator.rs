// RPC响应校验模块 - 防止链上数据污染

use anyhow::{Context, Result};
use ethers::types::U256;

/// 验证 eth_call 返回的 uint256（balanceOf）
///
/// 空返回 "0x" 表示目标地址不是合约或方法不存在
pub fn validate_uint256(result_hex: &str) -> Result<U256> {
    let hex_str = result_hex.trim_start_matches("0x");

    if hex_str.is_empty() {
        anyhow::bail!("Empty eth_call result (contract missing or call reverted)");
    }

    // ABI 编码的单个返回值为 32 字节
    if hex_str.len() > 64 {
        anyhow::bail!("uint256 hex string too long: {}", hex_str.len());
    }

    let value = U256::from_str_radix(hex_str, 16)
        .map_err(|e| anyhow::anyhow!("Failed to parse uint256 from hex: {}", e))?;

    Ok(value)
}

/// 验证 eth_call 返回的 uint8（decimals）
pub fn validate_uint8(result_hex: &str) -> Result<u8> {
    let value = validate_uint256(result_hex)?;
    if value > U256::from(u8::MAX) {
        anyhow::bail!("uint8 value out of range: {}", value);
    }
    Ok(value.as_u32() as u8)
}

/// 验证 eth_chainId 返回值
pub fn validate_chain_id(chain_id_hex: &str) -> Result<u64> {
    let hex_str = chain_id_hex.trim_start_matches("0x");

    if hex_str.is_empty() || hex_str.len() > 16 {
        anyhow::bail!("Invalid chain id hex string: {:?}", chain_id_hex);
    }

    u64::from_str_radix(hex_str, 16).context("Failed to parse chain id from hex")
}

/// 验证地址格式
pub fn validate_address(address: &str) -> Result<String> {
    // 移除0x前缀
    let addr = address.trim_start_matches("0x");

    // 验证长度（以太坊地址为20字节 = 40个十六进制字符）
    if addr.len() != 40 {
        anyhow::bail!("Invalid address length: expected 40, got {}", addr.len());
    }

    // 验证是否为有效的十六进制字符串
    if !addr.chars().all(|c| c.is_ascii_hexdigit()) {
        anyhow::bail!("Invalid address format: contains non-hex characters");
    }

    // 转换为小写（以太坊地址不区分大小写）
    Ok(format!("0x{}", addr.to_lowercase()))
}

/// 验证RPC响应信封（error 字段由调用方先行处理）
pub fn validate_rpc_response(json: &serde_json::Value) -> Result<()> {
    // 检查是否有result字段
    if json.get("result").is_none() {
        anyhow::bail!("Missing result field in RPC response");
    }

    // 检查jsonrpc版本
    if let Some(version) = json.get("jsonrpc") {
        if version.as_str() != Some("2.0") {
            anyhow::bail!("Unsupported JSON-RPC version: {:?}", version);
        }
    }

    Ok(())
}

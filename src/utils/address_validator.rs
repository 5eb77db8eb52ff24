//! 地址验证模块
//!
//! 钱包返回的账户地址在展示和查询前统一校验

use anyhow::Result;

/// 地址验证器
pub struct AddressValidator;

impl AddressValidator {
    /// 验证EVM地址（支持EIP-55 Checksum）
    ///
    /// # 返回
    /// - true: 地址有效
    /// - false: 格式错误或 checksum 不匹配
    pub fn validate_evm_address(address: &str) -> bool {
        // 1. 基本格式检查
        if !address.starts_with("0x") || address.len() != 42 {
            return false;
        }

        // 2. 验证hex字符
        let hex_part = &address[2..];
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return false;
        }

        // 3. 全小写或全大写不带 checksum
        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper {
            return Self::verify_eip55_checksum(address);
        }

        true
    }

    /// 校验并返回规范化后的账户地址（去除首尾空白）
    pub fn normalize_account(address: &str) -> Result<String> {
        let address = address.trim();
        if !Self::validate_evm_address(address) {
            anyhow::bail!("Invalid account address: {}", address);
        }
        Ok(address.to_string())
    }

    /// 验证EIP-55 Checksum
    /// https://eips.ethereum.org/EIPS/eip-55
    fn verify_eip55_checksum(address: &str) -> bool {
        use sha3::{Digest, Keccak256};

        let addr_lower = address[2..].to_lowercase();
        let mut hasher = Keccak256::new();
        hasher.update(addr_lower.as_bytes());
        let hash = hasher.finalize();

        address[2..].chars().enumerate().all(|(i, ch)| {
            if !ch.is_ascii_alphabetic() {
                return true;
            }
            let hash_byte = hash[i / 2];
            let hash_nibble = if i % 2 == 0 {
                hash_byte >> 4
            } else {
                hash_byte & 0x0f
            };
            ch.is_ascii_uppercase() == (hash_nibble >= 8)
        })
    }
}

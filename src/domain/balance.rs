//! 余额领域模型
//!
//! 原始整数余额 → 定点显示字符串（整数运算，不经过浮点）

use std::str::FromStr;

use anyhow::{Context, Result};
use ethers::types::U256;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

/// USDT 的标准精度
pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;

/// 显示精度上限（10^30 远在 U256 范围内）
pub const MAX_DISPLAY_PRECISION: u32 = 30;

/// 单条链的余额查询结果
///
/// 每次刷新重新计算，不缓存
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceResult {
    pub chain_id: u64,
    pub chain_name: String,
    #[serde(serialize_with = "serialize_u256_decimal")]
    pub raw_balance: U256,
    pub decimals: u8,
    pub display_balance: String,
}

impl BalanceResult {
    /// 根据原始余额和精度构造
    pub fn new(
        chain_id: u64,
        chain_name: impl Into<String>,
        raw_balance: U256,
        decimals: u8,
        precision: u32,
    ) -> Result<Self> {
        let display_balance = format_units_fixed(raw_balance, decimals, precision)?;
        Ok(Self {
            chain_id,
            chain_name: chain_name.into(),
            raw_balance,
            decimals,
            display_balance,
        })
    }

    /// 零余额（未知链 / 查询失败时的降级结果）
    pub fn zero(chain_id: u64, chain_name: impl Into<String>, precision: u32) -> Self {
        Self {
            chain_id,
            chain_name: chain_name.into(),
            raw_balance: U256::zero(),
            decimals: DEFAULT_TOKEN_DECIMALS,
            display_balance: zero_string(precision),
        }
    }

    /// 显示余额（Decimal），超出 Decimal 范围时返回 None
    pub fn as_decimal(&self) -> Option<Decimal> {
        Decimal::from_str(&self.display_balance).ok()
    }

    /// 近似美元价值，保留 2 位小数
    pub fn usd_equivalent(&self, usd_rate: Decimal) -> Option<String> {
        let value = self.as_decimal()?.checked_mul(usd_rate)?;
        Some(format!("{:.2}", value.round_dp(2)))
    }
}

/// raw / 10^decimals，保留 precision 位小数（四舍五入）
pub fn format_units_fixed(raw: U256, decimals: u8, precision: u32) -> Result<String> {
    if precision > MAX_DISPLAY_PRECISION {
        anyhow::bail!(
            "Display precision {} exceeds maximum {}",
            precision,
            MAX_DISPLAY_PRECISION
        );
    }

    let decimals = decimals as u32;
    let scaled = if precision >= decimals {
        let factor = pow10(precision - decimals)?;
        raw.checked_mul(factor)
            .context("Balance overflow while scaling to display precision")?
    } else {
        let divisor = pow10(decimals - precision)?;
        let half = divisor / U256::from(2u8);
        raw.checked_add(half)
            .context("Balance overflow while rounding")?
            / divisor
    };

    let unit = pow10(precision)?;
    let integer = scaled / unit;
    if precision == 0 {
        return Ok(integer.to_string());
    }

    let fraction = (scaled % unit).to_string();
    let padding = "0".repeat(precision as usize - fraction.len());
    Ok(format!("{}.{}{}", integer, padding, fraction))
}

fn pow10(exp: u32) -> Result<U256> {
    U256::from(10u8)
        .checked_pow(U256::from(exp))
        .with_context(|| format!("10^{} does not fit in uint256", exp))
}

fn zero_string(precision: u32) -> String {
    if precision == 0 {
        "0".to_string()
    } else {
        format!("0.{}", "0".repeat(precision as usize))
    }
}

fn serialize_u256_decimal<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

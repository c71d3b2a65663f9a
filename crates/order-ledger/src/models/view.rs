//! 对外展示视图
//!
//! HTTP 层直接序列化这些结构返回给用户，金额输出为 JSON 数字。

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use super::{Balance, Order, OrderStatus};

fn rfc3339<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// 入账订单视图
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepositView {
    pub number: String,
    pub status: OrderStatus,
    /// 仅 PROCESSED 订单带有积分
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub accrual: Option<Decimal>,
    #[serde(serialize_with = "rfc3339")]
    pub uploaded_at: DateTime<Utc>,
}

impl From<&Order> for DepositView {
    fn from(order: &Order) -> Self {
        Self {
            number: order.number.to_string(),
            status: order.status,
            accrual: (order.status == OrderStatus::Processed).then_some(order.amount),
            uploaded_at: order.submitted_at,
        }
    }
}

/// 扣减记录视图
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithdrawalView {
    pub order: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
    #[serde(serialize_with = "rfc3339")]
    pub processed_at: DateTime<Utc>,
}

impl From<&Order> for WithdrawalView {
    fn from(order: &Order) -> Self {
        Self {
            order: order.number.to_string(),
            sum: order.amount,
            processed_at: order.resolved_at.unwrap_or(order.submitted_at),
        }
    }
}

/// 余额视图
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BalanceView {
    #[serde(with = "rust_decimal::serde::float")]
    pub current: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub withdrawn: Decimal,
}

impl From<Balance> for BalanceView {
    fn from(balance: Balance) -> Self {
        Self {
            current: balance.current,
            withdrawn: balance.withdrawn,
        }
    }
}

//! 订单与余额模型

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use super::{OrderKind, OrderStatus};
use crate::error::LedgerError;
use crate::luhn;

/// 订单号最大长度，与表结构保持一致
const MAX_NUMBER_LEN: usize = 64;

/// 经过 Luhn 校验的订单号
///
/// 只能通过 [`OrderNumber::parse`] 构造，持有即代表合法。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "String", into = "String")]
#[sqlx(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// 解析订单号，忽略首尾空白
    pub fn parse(raw: &str) -> Result<Self, LedgerError> {
        let trimmed = raw.trim();
        if trimmed.len() > MAX_NUMBER_LEN || !luhn::is_valid(trimmed) {
            return Err(LedgerError::InvalidOrderNumber(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderNumber {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OrderNumber> for String {
    fn from(number: OrderNumber) -> Self {
        number.0
    }
}

impl AsRef<str> for OrderNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 账本订单
///
/// 永久记录，不会被删除。入账订单的状态和金额只由对账流程修改，扣减订单创建后不再变化。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub number: OrderNumber,
    pub kind: OrderKind,
    pub status: OrderStatus,
    /// 入账：accrual 服务给出的积分（结算前为 0）；扣减：花费的积分
    pub amount: Decimal,
    pub user_id: String,
    pub submitted_at: DateTime<Utc>,
    /// 入账订单进入终态的时间；扣减订单为创建时间
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_deposit(&self) -> bool {
        self.kind == OrderKind::Deposit
    }

    /// 该订单对余额的贡献（带符号）
    pub fn balance_delta(&self) -> Decimal {
        match (self.kind, self.status) {
            (OrderKind::Deposit, OrderStatus::Processed) => self.amount,
            (OrderKind::Deposit, _) => Decimal::ZERO,
            (OrderKind::Withdrawal, _) => -self.amount,
        }
    }
}

/// 用户余额
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// 当前可用积分 = 已结算入账 - 累计扣减
    pub current: Decimal,
    /// 累计扣减
    pub withdrawn: Decimal,
}

impl Balance {
    pub fn from_totals(accrued: Decimal, withdrawn: Decimal) -> Self {
        Self {
            current: accrued - withdrawn,
            withdrawn,
        }
    }
}

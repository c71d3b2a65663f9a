//! 账本错误定义
//!
//! 订单号冲突、余额不足属于业务结果，由 [`crate::outcome`] 中的枚举表达；
//! 这里只包含校验失败与存储故障。

use thiserror::Error;

use crate::models::OrderStatus;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("订单号无效: {0}")]
    InvalidOrderNumber(String),

    #[error("金额必须为正数: {0}")]
    NonPositiveAmount(rust_decimal::Decimal),

    #[error("金额不能为负数: {0}")]
    NegativeAmount(rust_decimal::Decimal),

    #[error("用户 {0} 的积分合计超出可表示范围")]
    AmountOverflow(String),

    #[error("入账订单不存在: {0}")]
    OrderNotFound(String),

    #[error("订单 {number} 不允许从 {from} 变更为 {to}")]
    IllegalTransition {
        number: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidOrderNumber(_) => "INVALID_ORDER_NUMBER",
            Self::NonPositiveAmount(_) => "NON_POSITIVE_AMOUNT",
            Self::NegativeAmount(_) => "NEGATIVE_AMOUNT",
            Self::AmountOverflow(_) => "AMOUNT_OVERFLOW",
            Self::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Self::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// 存储层故障可由调用方稍后重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    /// HTTP 层对应的状态码
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidOrderNumber(_) | Self::NonPositiveAmount(_) | Self::NegativeAmount(_) => {
                422
            }
            Self::OrderNotFound(_) => 404,
            Self::IllegalTransition { .. } => 409,
            Self::AmountOverflow(_) | Self::Database(_) => 500,
        }
    }
}

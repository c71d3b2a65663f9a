//! 账本操作的业务结果
//!
//! 调用方需要根据这些结果分支处理（返回 200 / 202 / 409 / 402），
//! 因此它们不是错误。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::models::{Order, OrderStatus};

/// 提交入账订单的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// 新订单已创建，等待对账
    Accepted,
    /// 该用户此前已提交过同一订单号
    AlreadyOwnedByCaller,
    /// 订单号已被其他用户占用
    OwnedByOther,
}

impl SubmitOutcome {
    pub fn http_status(self) -> u16 {
        match self {
            Self::Accepted => 202,
            Self::AlreadyOwnedByCaller => 200,
            Self::OwnedByOther => 409,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::AlreadyOwnedByCaller => "already_owned_by_caller",
            Self::OwnedByOther => "owned_by_other",
        }
    }
}

/// 积分扣减的结果
#[derive(Debug, Clone, PartialEq)]
pub enum WithdrawOutcome {
    /// 扣减成功，返回新建的扣减订单
    Completed(Order),
    /// 余额不足，未写入任何记录
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },
    /// 订单号已存在（无论属于谁）
    DuplicateNumber,
}

impl WithdrawOutcome {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Completed(_) => 200,
            Self::InsufficientFunds { .. } => 402,
            Self::DuplicateNumber => 409,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// 对账结果写回的效果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// 状态或金额已更新
    Applied,
    /// 重复写入同一结果，没有任何变化
    Unchanged,
}

/// `resolve` 计算出的写入计划，两种存储实现共用
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ResolutionPlan {
    Write {
        status: OrderStatus,
        amount: Decimal,
        resolved_at: Option<DateTime<Utc>>,
    },
    Skip,
}

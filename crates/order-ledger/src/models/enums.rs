//! 订单枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化

use serde::{Deserialize, Serialize};

/// 订单种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum OrderKind {
    /// 入账 - 用户提交的消费订单，等待 accrual 服务计算积分
    Deposit,
    /// 扣减 - 用户使用积分，创建时即完成
    Withdrawal,
}

/// 订单状态
///
/// 只能向前推进：NEW → PROCESSING → {INVALID | PROCESSED}。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    New,
    Processing,
    /// 终态，不计入余额
    Invalid,
    /// 终态，金额计入余额
    Processed,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Invalid | Self::Processed)
    }

    /// 是否允许从当前状态推进到 `next`
    ///
    /// 原地不动不算推进；终态之后没有任何合法推进。
    pub fn can_advance_to(self, next: Self) -> bool {
        match self {
            Self::New => matches!(next, Self::Processing | Self::Invalid | Self::Processed),
            Self::Processing => matches!(next, Self::Invalid | Self::Processed),
            Self::Invalid | Self::Processed => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Processing => "PROCESSING",
            Self::Invalid => "INVALID",
            Self::Processed => "PROCESSED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//! 账本存储层
//!
//! - [`PgLedgerStore`]：PostgreSQL 实现，唯一约束与事务保证并发正确性
//! - [`InMemoryLedgerStore`]：内存实现，单把锁串行化所有写操作，语义与数据库实现一致

mod memory;
mod order_repo;
mod traits;

pub use memory::InMemoryLedgerStore;
pub use order_repo::PgLedgerStore;
pub use traits::*;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{LedgerError, Result};
use crate::models::{Order, OrderStatus};
use crate::outcome::ResolutionPlan;

/// 扣减金额校验，两种存储共用
///
/// 金额按原精度保存，不做舍入。
pub(crate) fn check_withdrawal_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveAmount(amount));
    }
    Ok(())
}

/// 计算对账结果写回时应执行的操作
///
/// - 非 PROCESSED 状态的金额一律记为 0
/// - 重复写入相同终态结果视为无变化
/// - 终态订单不接受任何不同的结果
pub(crate) fn plan_resolution(
    current: &Order,
    status: OrderStatus,
    amount: Decimal,
    resolved_at: DateTime<Utc>,
) -> Result<ResolutionPlan> {
    if amount < Decimal::ZERO {
        return Err(LedgerError::NegativeAmount(amount));
    }

    let amount = if status == OrderStatus::Processed {
        amount
    } else {
        Decimal::ZERO
    };

    if current.status == status && (!status.is_terminal() || current.amount == amount) {
        return Ok(ResolutionPlan::Skip);
    }

    if !current.status.can_advance_to(status) {
        return Err(LedgerError::IllegalTransition {
            number: current.number.to_string(),
            from: current.status,
            to: status,
        });
    }

    Ok(ResolutionPlan::Write {
        status,
        amount,
        resolved_at: status.is_terminal().then_some(resolved_at),
    })
}

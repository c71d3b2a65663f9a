//! 账本存储 Trait 定义
//!
//! 对账工作器与 HTTP 层都只依赖该接口，便于替换为内存实现或 mock。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::Result;
use crate::models::{Balance, Order, OrderNumber, OrderStatus};
use crate::outcome::{ResolveOutcome, SubmitOutcome, WithdrawOutcome};

/// 账本存储接口
///
/// 启用 `mock` feature 后导出 `MockLedgerStore`，供下游 crate 的测试使用。
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // 用户侧
    async fn submit(&self, number: &OrderNumber, user_id: &str) -> Result<SubmitOutcome>;
    async fn list_deposits(&self, user_id: &str) -> Result<Vec<Order>>;
    async fn list_withdrawals(&self, user_id: &str) -> Result<Vec<Order>>;
    async fn balance(&self, user_id: &str) -> Result<Balance>;
    async fn withdraw(
        &self,
        number: &OrderNumber,
        user_id: &str,
        amount: Decimal,
    ) -> Result<WithdrawOutcome>;

    // 对账侧
    /// 按 id 升序分页返回未终结的入账订单
    async fn list_pending_deposits(&self, limit: i64, offset: i64) -> Result<Vec<Order>>;
    /// 返回 id 大于 `after_id` 的未终结入账订单，按 id 升序
    ///
    /// 分页期间有订单离开待处理集合时，游标分页不会跳过后续订单。
    async fn list_pending_deposits_after(&self, after_id: i64, limit: i64) -> Result<Vec<Order>>;
    async fn resolve(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        amount: Decimal,
        resolved_at: DateTime<Utc>,
    ) -> Result<ResolveOutcome>;
}

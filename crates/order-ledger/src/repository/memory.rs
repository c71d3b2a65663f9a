//! 内存账本存储
//!
//! 所有操作在同一把异步互斥锁内完成，天然满足唯一性与扣减的串行化要求。
//! 用于测试与本地联调。

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::{check_withdrawal_amount, plan_resolution};
use super::traits::LedgerStore;
use crate::error::{LedgerError, Result};
use crate::models::{Balance, Order, OrderKind, OrderNumber, OrderStatus};
use crate::outcome::{ResolutionPlan, ResolveOutcome, SubmitOutcome, WithdrawOutcome};

#[derive(Default)]
struct State {
    next_id: i64,
    /// id -> 订单，BTreeMap 保证按 id 升序遍历
    orders: BTreeMap<i64, Order>,
    /// 订单号 -> id
    by_number: HashMap<OrderNumber, i64>,
}

impl State {
    fn insert(&mut self, mut order: Order) -> Order {
        self.next_id += 1;
        order.id = self.next_id;
        self.by_number.insert(order.number.clone(), order.id);
        self.orders.insert(order.id, order.clone());
        order
    }

    fn by_number(&self, number: &OrderNumber) -> Option<&Order> {
        self.by_number.get(number).and_then(|id| self.orders.get(id))
    }

    fn balance(&self, user_id: &str) -> Result<Balance> {
        let overflow = || LedgerError::AmountOverflow(user_id.to_string());
        let (accrued, withdrawn) = self
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .try_fold((Decimal::ZERO, Decimal::ZERO), |(accrued, withdrawn), o| -> std::result::Result<_, LedgerError> {
                match (o.kind, o.status) {
                    (OrderKind::Deposit, OrderStatus::Processed) => {
                        Ok((accrued.checked_add(o.amount).ok_or_else(overflow)?, withdrawn))
                    }
                    (OrderKind::Withdrawal, _) => {
                        Ok((accrued, withdrawn.checked_add(o.amount).ok_or_else(overflow)?))
                    }
                    _ => Ok((accrued, withdrawn)),
                }
            })?;
        Ok(Balance::from_totals(accrued, withdrawn))
    }

    fn user_orders(&self, user_id: &str, kind: OrderKind) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .values()
            .filter(|o| o.user_id == user_id && o.kind == kind)
            .cloned()
            .collect();
        orders.sort_by(|a, b| (a.submitted_at, a.id).cmp(&(b.submitted_at, b.id)));
        orders
    }

    fn pending(&self) -> impl Iterator<Item = &Order> {
        self.orders
            .values()
            .filter(|o| o.kind == OrderKind::Deposit && !o.status.is_terminal())
    }
}

/// 内存账本存储
#[derive(Default)]
pub struct InMemoryLedgerStore {
    state: Mutex<State>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前记录总数（含所有用户、所有种类）
    pub async fn len(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// 按订单号读取单条记录
    pub async fn get(&self, number: &OrderNumber) -> Option<Order> {
        self.state.lock().await.by_number(number).cloned()
    }
}

fn to_index(value: i64) -> usize {
    usize::try_from(value.max(0)).unwrap_or(usize::MAX)
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn submit(&self, number: &OrderNumber, user_id: &str) -> Result<SubmitOutcome> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state.by_number(number) {
            return Ok(if existing.user_id == user_id {
                SubmitOutcome::AlreadyOwnedByCaller
            } else {
                SubmitOutcome::OwnedByOther
            });
        }

        state.insert(Order {
            id: 0,
            number: number.clone(),
            kind: OrderKind::Deposit,
            status: OrderStatus::New,
            amount: Decimal::ZERO,
            user_id: user_id.to_string(),
            submitted_at: Utc::now(),
            resolved_at: None,
        });

        Ok(SubmitOutcome::Accepted)
    }

    async fn list_deposits(&self, user_id: &str) -> Result<Vec<Order>> {
        Ok(self.state.lock().await.user_orders(user_id, OrderKind::Deposit))
    }

    async fn list_withdrawals(&self, user_id: &str) -> Result<Vec<Order>> {
        Ok(self
            .state
            .lock()
            .await
            .user_orders(user_id, OrderKind::Withdrawal))
    }

    async fn balance(&self, user_id: &str) -> Result<Balance> {
        self.state.lock().await.balance(user_id)
    }

    async fn withdraw(
        &self,
        number: &OrderNumber,
        user_id: &str,
        amount: Decimal,
    ) -> Result<WithdrawOutcome> {
        check_withdrawal_amount(amount)?;

        let mut state = self.state.lock().await;

        if state.by_number(number).is_some() {
            return Ok(WithdrawOutcome::DuplicateNumber);
        }

        let balance = state.balance(user_id)?;
        if balance.current < amount {
            return Ok(WithdrawOutcome::InsufficientFunds {
                available: balance.current,
                requested: amount,
            });
        }

        let now = Utc::now();
        let order = state.insert(Order {
            id: 0,
            number: number.clone(),
            kind: OrderKind::Withdrawal,
            status: OrderStatus::Processed,
            amount,
            user_id: user_id.to_string(),
            submitted_at: now,
            resolved_at: Some(now),
        });

        Ok(WithdrawOutcome::Completed(order))
    }

    async fn list_pending_deposits(&self, limit: i64, offset: i64) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        Ok(state
            .pending()
            .skip(to_index(offset))
            .take(to_index(limit))
            .cloned()
            .collect())
    }

    async fn list_pending_deposits_after(&self, after_id: i64, limit: i64) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        Ok(state
            .pending()
            .filter(|o| o.id > after_id)
            .take(to_index(limit))
            .cloned()
            .collect())
    }

    async fn resolve(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        amount: Decimal,
        resolved_at: DateTime<Utc>,
    ) -> Result<ResolveOutcome> {
        let mut state = self.state.lock().await;

        let id = state
            .by_number(number)
            .filter(|o| o.is_deposit())
            .map(|o| o.id)
            .ok_or_else(|| LedgerError::OrderNotFound(number.to_string()))?;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| LedgerError::OrderNotFound(number.to_string()))?;

        match plan_resolution(order, status, amount, resolved_at)? {
            ResolutionPlan::Skip => Ok(ResolveOutcome::Unchanged),
            ResolutionPlan::Write {
                status,
                amount,
                resolved_at,
            } => {
                order.status = status;
                order.amount = amount;
                order.resolved_at = resolved_at;
                Ok(ResolveOutcome::Applied)
            }
        }
    }
}

//! 订单仓储（PostgreSQL）
//!
//! 并发控制：
//! - 提交入账：依赖 orders.number 唯一约束裁决并发插入
//! - 扣减：事务内先取用户级 advisory 锁，再读余额、写扣减记录
//! - 对账写回：单行 `FOR UPDATE` 后按状态机校验再更新

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool};
use tracing::{debug, info, instrument, warn};

use super::{check_withdrawal_amount, plan_resolution};
use super::traits::LedgerStore;
use crate::error::{LedgerError, Result};
use crate::models::{Balance, Order, OrderKind, OrderNumber, OrderStatus};
use crate::outcome::{ResolutionPlan, ResolveOutcome, SubmitOutcome, WithdrawOutcome};

/// PostgreSQL 账本存储
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 查询订单号当前归属的用户
    async fn find_owner<'e>(
        executor: impl PgExecutor<'e>,
        number: &OrderNumber,
    ) -> Result<Option<String>> {
        let owner = sqlx::query_scalar::<_, String>(
            r#"
            SELECT user_id FROM orders WHERE number = $1
            "#,
        )
        .bind(number)
        .fetch_optional(executor)
        .await?;

        Ok(owner)
    }

    /// 单条语句同时汇总已结算入账与累计扣减，两者来自同一快照
    async fn fetch_balance<'e>(executor: impl PgExecutor<'e>, user_id: &str) -> Result<Balance> {
        let (accrued, withdrawn) = sqlx::query_as::<_, (Decimal, Decimal)>(
            r#"
            SELECT
                COALESCE(SUM(amount) FILTER (WHERE kind = 'deposit' AND status = 'PROCESSED'), 0) AS accrued,
                COALESCE(SUM(amount) FILTER (WHERE kind = 'withdrawal'), 0) AS withdrawn
            FROM orders
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(executor)
        .await?;

        Ok(Balance::from_totals(accrued, withdrawn))
    }

    async fn list_by_kind(&self, user_id: &str, kind: OrderKind) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, number, kind, status, amount, user_id, submitted_at, resolved_at
            FROM orders
            WHERE user_id = $1 AND kind = $2
            ORDER BY submitted_at, id
            "#,
        )
        .bind(user_id)
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }
}

fn classify_owner(owner: &str, user_id: &str) -> SubmitOutcome {
    if owner == user_id {
        SubmitOutcome::AlreadyOwnedByCaller
    } else {
        SubmitOutcome::OwnedByOther
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    #[instrument(skip(self), fields(number = %number))]
    async fn submit(&self, number: &OrderNumber, user_id: &str) -> Result<SubmitOutcome> {
        if let Some(owner) = Self::find_owner(&self.pool, number).await? {
            return Ok(classify_owner(&owner, user_id));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (number, kind, status, amount, user_id, submitted_at)
            VALUES ($1, $2, $3, 0, $4, NOW())
            "#,
        )
        .bind(number)
        .bind(OrderKind::Deposit)
        .bind(OrderStatus::New)
        .bind(user_id)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {
                info!(user_id, "入账订单已创建");
                Ok(SubmitOutcome::Accepted)
            }
            // 并发提交同一订单号：以唯一约束的胜者为准重新判断归属
            Err(e) if is_unique_violation(&e) => {
                debug!("订单号插入冲突，重新读取归属");
                match Self::find_owner(&self.pool, number).await? {
                    Some(owner) => Ok(classify_owner(&owner, user_id)),
                    None => Err(LedgerError::Database(e)),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn list_deposits(&self, user_id: &str) -> Result<Vec<Order>> {
        self.list_by_kind(user_id, OrderKind::Deposit).await
    }

    #[instrument(skip(self))]
    async fn list_withdrawals(&self, user_id: &str) -> Result<Vec<Order>> {
        self.list_by_kind(user_id, OrderKind::Withdrawal).await
    }

    #[instrument(skip(self))]
    async fn balance(&self, user_id: &str) -> Result<Balance> {
        Self::fetch_balance(&self.pool, user_id).await
    }

    #[instrument(skip(self), fields(number = %number, amount = %amount))]
    async fn withdraw(
        &self,
        number: &OrderNumber,
        user_id: &str,
        amount: Decimal,
    ) -> Result<WithdrawOutcome> {
        check_withdrawal_amount(amount)?;

        let mut tx = self.pool.begin().await?;

        // 同一用户的扣减在此串行化；锁随事务结束自动释放
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if Self::find_owner(&mut *tx, number).await?.is_some() {
            tx.rollback().await?;
            warn!(user_id, "扣减订单号已存在");
            return Ok(WithdrawOutcome::DuplicateNumber);
        }

        let balance = Self::fetch_balance(&mut *tx, user_id).await?;
        if balance.current < amount {
            tx.rollback().await?;
            warn!(user_id, available = %balance.current, "余额不足，拒绝扣减");
            return Ok(WithdrawOutcome::InsufficientFunds {
                available: balance.current,
                requested: amount,
            });
        }

        let inserted = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (number, kind, status, amount, user_id, submitted_at, resolved_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING id, number, kind, status, amount, user_id, submitted_at, resolved_at
            "#,
        )
        .bind(number)
        .bind(OrderKind::Withdrawal)
        .bind(OrderStatus::Processed)
        .bind(amount)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await;

        let order = match inserted {
            Ok(order) => order,
            // 其他用户的入账提交抢先占用了该订单号
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await?;
                return Ok(WithdrawOutcome::DuplicateNumber);
            }
            Err(e) => return Err(e.into()),
        };

        tx.commit().await?;

        info!(user_id, order_id = order.id, "积分扣减完成");
        Ok(WithdrawOutcome::Completed(order))
    }

    async fn list_pending_deposits(&self, limit: i64, offset: i64) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, number, kind, status, amount, user_id, submitted_at, resolved_at
            FROM orders
            WHERE kind = 'deposit' AND status IN ('NEW', 'PROCESSING')
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn list_pending_deposits_after(&self, after_id: i64, limit: i64) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, number, kind, status, amount, user_id, submitted_at, resolved_at
            FROM orders
            WHERE kind = 'deposit' AND status IN ('NEW', 'PROCESSING') AND id > $1
            ORDER BY id
            LIMIT $2
            "#,
        )
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    #[instrument(skip(self), fields(number = %number))]
    async fn resolve(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        amount: Decimal,
        resolved_at: DateTime<Utc>,
    ) -> Result<ResolveOutcome> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, number, kind, status, amount, user_id, submitted_at, resolved_at
            FROM orders
            WHERE number = $1 AND kind = 'deposit'
            FOR UPDATE
            "#,
        )
        .bind(number)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| LedgerError::OrderNotFound(number.to_string()))?;

        match plan_resolution(&current, status, amount, resolved_at)? {
            ResolutionPlan::Skip => {
                tx.rollback().await?;
                debug!(status = %current.status, "结果未变化，跳过写入");
                Ok(ResolveOutcome::Unchanged)
            }
            ResolutionPlan::Write {
                status,
                amount,
                resolved_at,
            } => {
                sqlx::query(
                    r#"
                    UPDATE orders
                    SET status = $2, amount = $3, resolved_at = $4
                    WHERE id = $1
                    "#,
                )
                .bind(current.id)
                .bind(status)
                .bind(amount)
                .bind(resolved_at)
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;

                info!(from = %current.status, to = %status, %amount, "入账订单状态已更新");
                Ok(ResolveOutcome::Applied)
            }
        }
    }
}

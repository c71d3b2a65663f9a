//! 扣减流程测试套件
//!
//! 结算后的积分扣减、余额不足与订单号冲突。

use crate::setup::{StubReply, TestEnvironment};
use futures::future::join_all;
use order_ledger::{LedgerStore, SubmitOutcome, WithdrawOutcome};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

/// 提交并结算一笔入账
async fn credit(env: &mut TestEnvironment, raw: &str, user_id: &str, accrual: f64) {
    env.store
        .submit(&TestEnvironment::number(raw), user_id)
        .await
        .unwrap();
    env.accrual.reply(raw, StubReply::Processed(accrual));
    env.reconcile().await.unwrap();
}

#[cfg(test)]
mod withdraw_tests {
    use super::*;

    /// 结算 -> 扣减 -> 余额与扣减记录
    #[tokio::test]
    async fn test_withdraw_after_settlement() {
        let mut env = TestEnvironment::setup().await.unwrap();
        credit(&mut env, "79927398713", "alice", 729.98).await;

        let outcome = env
            .store
            .withdraw(&TestEnvironment::number("2377225624"), "alice", dec!(751))
            .await
            .unwrap();
        match outcome {
            WithdrawOutcome::InsufficientFunds {
                available,
                requested,
            } => {
                assert_eq!(available, dec!(729.98));
                assert_eq!(requested, dec!(751));
            }
            other => panic!("期望余额不足，实际 {other:?}"),
        }

        let outcome = env
            .store
            .withdraw(&TestEnvironment::number("2377225624"), "alice", dec!(229.98))
            .await
            .unwrap();
        assert!(outcome.is_completed());
        assert_eq!(outcome.http_status(), 200);

        let balance = env.store.balance("alice").await.unwrap();
        assert_eq!(balance.current, dec!(500));
        assert_eq!(balance.withdrawn, dec!(229.98));

        let withdrawals = env.store.list_withdrawals("alice").await.unwrap();
        assert_eq!(withdrawals.len(), 1);
        assert_eq!(withdrawals[0].number.as_str(), "2377225624");
        assert!(env.store.list_pending_deposits(10, 0).await.unwrap().is_empty());
    }

    /// 扣减占用的订单号不能再被提交为入账，反之亦然
    #[tokio::test]
    async fn test_numbers_are_shared_between_kinds() {
        let mut env = TestEnvironment::setup().await.unwrap();
        credit(&mut env, "79927398713", "alice", 100.0).await;

        let taken = TestEnvironment::number("79927398713");
        assert_eq!(
            env.store.withdraw(&taken, "alice", dec!(1)).await.unwrap(),
            WithdrawOutcome::DuplicateNumber
        );

        let spent = TestEnvironment::number("2377225624");
        env.store.withdraw(&spent, "alice", dec!(1)).await.unwrap();
        assert_eq!(
            env.store.submit(&spent, "alice").await.unwrap(),
            SubmitOutcome::AlreadyOwnedByCaller
        );
        assert_eq!(
            env.store.submit(&spent, "bob").await.unwrap(),
            SubmitOutcome::OwnedByOther
        );
    }

    /// 并发扣减总额超过余额时，余额不会为负
    #[tokio::test]
    async fn test_concurrent_withdrawals_never_overdraw() {
        let mut env = TestEnvironment::setup().await.unwrap();
        credit(&mut env, "79927398713", "dave", 100.0).await;

        let store = Arc::clone(&env.store);
        let numbers: Vec<_> = (0..10)
            .map(|i| {
                let raw = order_ledger::luhn::complete(&format!("9{i:05}")).unwrap();
                TestEnvironment::number(&raw)
            })
            .collect();
        let outcomes = join_all(
            numbers
                .iter()
                .map(|n| store.withdraw(n, "dave", dec!(30))),
        )
        .await;

        let completed = outcomes
            .into_iter()
            .map(|r| r.unwrap())
            .filter(WithdrawOutcome::is_completed)
            .count();
        assert_eq!(completed, 3);

        let balance = store.balance("dave").await.unwrap();
        assert_eq!(balance.current, dec!(10));
        assert_eq!(balance.withdrawn, dec!(90));
        assert!(balance.current >= Decimal::ZERO);
    }
}

#[cfg(test)]
mod shutdown_tests {
    use super::*;

    /// 收到关闭信号后不再查询远端
    #[tokio::test]
    async fn test_pass_after_shutdown_is_interrupted() {
        let mut env = TestEnvironment::setup().await.unwrap();
        env.store
            .submit(&TestEnvironment::number("79927398713"), "erin")
            .await
            .unwrap();
        env.accrual.reply("79927398713", StubReply::Processed(5.0));

        env.shutdown();
        let report = env.reconcile().await.unwrap();

        assert!(report.interrupted);
        assert_eq!(report.scanned, 0);
        assert_eq!(env.accrual.hits("79927398713"), 0);
        assert_eq!(env.store.balance("erin").await.unwrap().current, Decimal::ZERO);
    }
}

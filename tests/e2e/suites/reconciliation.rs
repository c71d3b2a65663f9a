//! 对账流程测试套件
//!
//! 入账订单从提交到结算的完整链路。

use crate::setup::{StubReply, TestEnvironment};
use order_ledger::{LedgerStore, OrderStatus, SubmitOutcome, luhn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

#[cfg(test)]
mod settlement_tests {
    use super::*;

    /// 远端计算完成后，结算金额计入余额
    #[tokio::test]
    async fn test_processed_order_credits_balance() {
        let mut env = TestEnvironment::setup().await.unwrap();
        let number = TestEnvironment::number("79927398713");

        assert_eq!(
            env.store.submit(&number, "alice").await.unwrap(),
            SubmitOutcome::Accepted
        );
        env.accrual.reply("79927398713", StubReply::Processed(500.0));

        let report = env.reconcile().await.unwrap();
        assert_eq!(report.processed, 1);

        let deposits = env.store.list_deposits("alice").await.unwrap();
        assert_eq!(deposits.len(), 1);
        assert_eq!(deposits[0].status, OrderStatus::Processed);
        assert_eq!(deposits[0].amount, dec!(500));
        assert!(deposits[0].resolved_at.is_some());

        let balance = env.store.balance("alice").await.unwrap();
        assert_eq!(balance.current, dec!(500));
        assert_eq!(balance.withdrawn, Decimal::ZERO);
    }

    /// 远端判定无效的订单不计入余额
    #[tokio::test]
    async fn test_invalid_order_contributes_nothing() {
        let mut env = TestEnvironment::setup().await.unwrap();
        let number = TestEnvironment::number("1234567812345670");

        env.store.submit(&number, "alice").await.unwrap();
        env.accrual.reply("1234567812345670", StubReply::Invalid);

        let report = env.reconcile().await.unwrap();
        assert_eq!(report.invalid, 1);

        let deposits = env.store.list_deposits("alice").await.unwrap();
        assert_eq!(deposits[0].status, OrderStatus::Invalid);
        assert_eq!(deposits[0].amount, Decimal::ZERO);
        assert_eq!(env.store.balance("alice").await.unwrap().current, Decimal::ZERO);
    }

    /// 订单经历 REGISTERED -> PROCESSING -> PROCESSED，只有终态被写回
    #[tokio::test]
    async fn test_order_settles_over_several_passes() {
        let mut env = TestEnvironment::setup().await.unwrap();
        let number = TestEnvironment::number("79927398713");
        env.store.submit(&number, "alice").await.unwrap();

        env.accrual.reply("79927398713", StubReply::Registered);
        assert_eq!(env.reconcile().await.unwrap().pending, 1);

        env.accrual.reply("79927398713", StubReply::Processing);
        assert_eq!(env.reconcile().await.unwrap().pending, 1);
        assert_eq!(
            env.store.list_deposits("alice").await.unwrap()[0].status,
            OrderStatus::New
        );

        env.accrual.reply("79927398713", StubReply::Processed(120.5));
        assert_eq!(env.reconcile().await.unwrap().processed, 1);

        // 终态订单不再被查询
        let hits = env.accrual.hits("79927398713");
        env.reconcile().await.unwrap();
        assert_eq!(env.accrual.hits("79927398713"), hits);
        assert_eq!(env.store.balance("alice").await.unwrap().current, dec!(120.5));
    }
}

#[cfg(test)]
mod fault_isolation_tests {
    use super::*;

    /// 单笔订单查询失败不影响同页其他订单
    #[tokio::test]
    async fn test_failures_do_not_block_other_orders() {
        let mut env = TestEnvironment::setup().await.unwrap();
        let numbers: Vec<String> = (0..25)
            .map(|i| luhn::complete(&format!("4{i:06}")).unwrap())
            .collect();

        for (i, raw) in numbers.iter().enumerate() {
            env.store
                .submit(&TestEnvironment::number(raw), "bob")
                .await
                .unwrap();
            let reply = match i % 5 {
                0 => StubReply::ServerError,
                1 => StubReply::RateLimited { retry_after_secs: 30 },
                2 => StubReply::NotRegistered,
                _ => StubReply::Processed(2.0),
            };
            env.accrual.reply(raw, reply);
        }

        let report = env.reconcile().await.unwrap();
        assert_eq!(report.pages, 3);
        assert_eq!(report.scanned, 25);
        assert_eq!(report.processed, 10);
        assert_eq!(report.failed, 10);
        assert_eq!(report.unknown, 5);

        // 每个订单本轮恰好被查询一次
        assert!(numbers.iter().all(|n| env.accrual.hits(n) == 1));
        assert_eq!(env.store.balance("bob").await.unwrap().current, dec!(20));
        assert_eq!(env.store.list_pending_deposits(100, 0).await.unwrap().len(), 15);
    }

    /// 远端恢复后，后台运行的工作器完成结算并在关闭信号后退出
    #[tokio::test]
    async fn test_background_worker_settles_after_recovery() {
        let env = TestEnvironment::setup().await.unwrap();
        let number = TestEnvironment::number("79927398713");
        env.store.submit(&number, "carol").await.unwrap();
        env.accrual.reply("79927398713", StubReply::ServerError);

        let running = env.spawn_worker();
        tokio::time::sleep(Duration::from_millis(100)).await;
        running.accrual.reply("79927398713", StubReply::Processed(75.0));

        let settled = async {
            loop {
                if running.store.balance("carol").await.unwrap().current == dec!(75) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), settled)
            .await
            .expect("远端恢复后应完成结算");

        assert!(running.accrual.hits("79927398713") >= 2);
        tokio::time::timeout(Duration::from_secs(5), running.stop())
            .await
            .expect("工作器应及时退出")
            .unwrap();
    }
}

//! 测试环境

use std::sync::Arc;

use accrual_reconciler::{HttpAccrualClient, PassReport, ReconciliationWorker};
use loyalty_shared::config::{AccrualConfig, ReconcilerConfig};
use order_ledger::{InMemoryLedgerStore, OrderNumber};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::AccrualStub;

/// 组装好的测试环境
pub struct TestEnvironment {
    pub store: Arc<InMemoryLedgerStore>,
    pub accrual: AccrualStub,
    pub worker: ReconciliationWorker,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl TestEnvironment {
    pub async fn setup() -> anyhow::Result<Self> {
        let accrual = AccrualStub::start().await?;
        let store = Arc::new(InMemoryLedgerStore::new());

        let accrual_config = AccrualConfig {
            base_url: accrual.base_url().to_string(),
            request_timeout_ms: 1_000,
            default_retry_after_seconds: 1,
            // 限流暂停不拖慢测试
            max_retry_after_seconds: 0,
        };
        let reconciler_config = ReconcilerConfig {
            poll_interval_ms: 20,
            page_size: 10,
            failure_backoff_initial_ms: 20,
            failure_backoff_max_ms: 100,
        };

        let client = Arc::new(HttpAccrualClient::new(&accrual_config)?);
        let worker =
            ReconciliationWorker::new(store.clone(), client, &reconciler_config, &accrual_config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            store,
            accrual,
            worker,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// 执行一轮对账
    pub async fn reconcile(&mut self) -> anyhow::Result<PassReport> {
        Ok(self.worker.run_pass(&mut self.shutdown_rx).await?)
    }

    /// 发出关闭信号
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// 把工作器主循环放到后台运行
    pub fn spawn_worker(self) -> RunningEnvironment {
        let handle = tokio::spawn(self.worker.run(self.shutdown_rx));
        RunningEnvironment {
            store: self.store,
            accrual: self.accrual,
            handle,
            shutdown_tx: self.shutdown_tx,
        }
    }

    pub fn number(raw: &str) -> OrderNumber {
        OrderNumber::parse(raw).expect("测试订单号应通过校验")
    }
}

/// 工作器在后台运行中的测试环境
pub struct RunningEnvironment {
    pub store: Arc<InMemoryLedgerStore>,
    pub accrual: AccrualStub,
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl RunningEnvironment {
    /// 发出关闭信号并等待工作器退出
    pub async fn stop(self) -> Result<(), tokio::task::JoinError> {
        self.shutdown_tx.send_replace(true);
        self.handle.await
    }
}

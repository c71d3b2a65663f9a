//! 对账工作器
//!
//! 周期性地扫描所有未终结的入账订单，逐笔向 accrual 服务查询，并把终态结果写回账本：
//! 1. 以 id 游标分页拉取待处理订单，直到拉到空页
//! 2. 每笔订单单独查询，失败只影响该笔订单，本页和本轮继续
//! 3. 拉取分页失败视为整轮失败，按指数退避后重试
//!
//! 关闭信号在两笔订单之间检查，正在处理的订单总是完整结束。

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use loyalty_shared::config::{AccrualConfig, ReconcilerConfig};
use loyalty_shared::observability::metrics;
use loyalty_shared::retry::RetryPolicy;
use order_ledger::{LedgerStore, Order, OrderStatus, ResolveOutcome};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::client::{AccrualClient, Lookup};
use crate::error::{AccrualError, ReconcileError};

const WORKER_NAME: &str = "reconciler";

/// 工作器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// 等待下一次触发
    Idle,
    /// 正在分页处理待处理订单
    Draining,
}

/// 单轮对账统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// 非空页数量
    pub pages: u32,
    pub scanned: u32,
    pub processed: u32,
    pub invalid: u32,
    /// 远端仍在处理（REGISTERED / PROCESSING）
    pub pending: u32,
    /// 远端不认识该订单号
    pub unknown: u32,
    /// 结果与账本一致，无需写入
    pub unchanged: u32,
    /// 查询或写回失败
    pub failed: u32,
    /// 因关闭信号提前结束
    pub interrupted: bool,
}

impl PassReport {
    fn record(&mut self, outcome: OrderOutcome) {
        self.scanned += 1;
        match outcome {
            OrderOutcome::Resolved(OrderStatus::Processed) => self.processed += 1,
            OrderOutcome::Resolved(_) => self.invalid += 1,
            OrderOutcome::Pending => self.pending += 1,
            OrderOutcome::Unknown => self.unknown += 1,
            OrderOutcome::Unchanged => self.unchanged += 1,
            OrderOutcome::Failed => self.failed += 1,
        }
    }

    pub fn resolved(&self) -> u32 {
        self.processed + self.invalid
    }
}

/// 单笔订单的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderOutcome {
    Resolved(OrderStatus),
    Pending,
    Unknown,
    Unchanged,
    Failed,
}

/// 对账工作器
pub struct ReconciliationWorker {
    store: Arc<dyn LedgerStore>,
    client: Arc<dyn AccrualClient>,
    poll_interval: Duration,
    page_size: i64,
    /// 单次 accrual 查询的等待上限
    lookup_timeout: Duration,
    /// 远端限流时最多暂停多久
    max_rate_limit_pause: Duration,
    backoff: RetryPolicy,
    state: watch::Sender<WorkerState>,
}

impl ReconciliationWorker {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        client: Arc<dyn AccrualClient>,
        config: &ReconcilerConfig,
        accrual: &AccrualConfig,
    ) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            store,
            client,
            poll_interval: config.poll_interval(),
            page_size: config.page_size.max(1),
            lookup_timeout: accrual.request_timeout(),
            max_rate_limit_pause: Duration::from_secs(accrual.max_retry_after_seconds),
            backoff: RetryPolicy::backoff(
                Duration::from_millis(config.failure_backoff_initial_ms),
                Duration::from_millis(config.failure_backoff_max_ms),
            ),
            state,
        }
    }

    /// 订阅工作器状态变化
    pub fn subscribe_state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// 主循环：持续对账直到收到关闭信号
    ///
    /// 发送端被丢弃同样视为关闭。
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval = ?self.poll_interval,
            page_size = self.page_size,
            lookup_timeout = ?self.lookup_timeout,
            "对账工作器已启动"
        );

        let mut consecutive_failures: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let started = Instant::now();
            let wait = match self.run_pass(&mut shutdown).await {
                Ok(report) => {
                    consecutive_failures = 0;
                    let result = if report.interrupted { "interrupted" } else { "ok" };
                    metrics::record_reconciliation_pass(result, started.elapsed().as_secs_f64());

                    if report.scanned > 0 {
                        info!(
                            pages = report.pages,
                            scanned = report.scanned,
                            processed = report.processed,
                            invalid = report.invalid,
                            pending = report.pending,
                            unknown = report.unknown,
                            failed = report.failed,
                            "本轮对账完成"
                        );
                    } else {
                        debug!("没有待处理订单");
                    }
                    self.poll_interval
                }
                Err(e) => {
                    let delay = self
                        .backoff
                        .delay_for_attempt(consecutive_failures)
                        .max(self.poll_interval);
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    metrics::record_reconciliation_pass("error", started.elapsed().as_secs_f64());
                    error!(
                        error = %e,
                        consecutive_failures,
                        delay_ms = delay.as_millis() as u64,
                        "对账失败，退避后重试"
                    );
                    delay
                }
            };

            metrics::set_worker_last_run(WORKER_NAME);

            if !sleep_or_shutdown(wait, &mut shutdown).await {
                break;
            }
        }

        info!("对账工作器已停止");
    }

    /// 执行一轮对账
    pub async fn run_pass(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<PassReport, ReconcileError> {
        self.state.send_replace(WorkerState::Draining);
        let result = self.drain(shutdown).await;
        self.state.send_replace(WorkerState::Idle);
        result
    }

    async fn drain(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<PassReport, ReconcileError> {
        let mut report = PassReport::default();
        let mut cursor: i64 = 0;

        loop {
            if *shutdown.borrow() {
                report.interrupted = true;
                return Ok(report);
            }

            let page = self
                .store
                .list_pending_deposits_after(cursor, self.page_size)
                .await?;
            let Some(last) = page.last() else {
                return Ok(report);
            };
            cursor = last.id;
            report.pages += 1;

            for order in &page {
                if *shutdown.borrow() {
                    report.interrupted = true;
                    return Ok(report);
                }
                let outcome = self.reconcile_order(order, shutdown).await;
                report.record(outcome);
            }
        }
    }

    #[instrument(skip(self, order, shutdown), fields(number = %order.number))]
    async fn reconcile_order(
        &self,
        order: &Order,
        shutdown: &mut watch::Receiver<bool>,
    ) -> OrderOutcome {
        let started = Instant::now();
        let lookup = tokio::time::timeout(self.lookup_timeout, self.client.lookup(&order.number))
            .await
            .unwrap_or(Err(AccrualError::Timeout));
        let elapsed = started.elapsed().as_secs_f64();

        let resolution = match lookup {
            Ok(Lookup::Resolved(resolution)) => resolution,
            Ok(Lookup::Unknown) => {
                metrics::record_accrual_lookup("unknown", elapsed);
                debug!("accrual 尚未登记该订单");
                return OrderOutcome::Unknown;
            }
            Err(AccrualError::RateLimited { retry_after }) => {
                metrics::record_accrual_lookup("rate_limited", elapsed);
                let pause = retry_after.min(self.max_rate_limit_pause);
                warn!(pause_secs = pause.as_secs(), "accrual 限流，暂停查询");
                sleep_or_shutdown(pause, shutdown).await;
                return OrderOutcome::Failed;
            }
            Err(e) => {
                metrics::record_accrual_lookup(e.metric_label(), elapsed);
                warn!(error = %e, "accrual 查询失败，留待下一轮");
                return OrderOutcome::Failed;
            }
        };

        let Some((status, amount)) = resolution.ledger_outcome() else {
            metrics::record_accrual_lookup("pending", elapsed);
            debug!(remote_status = ?resolution.status, "accrual 仍在处理");
            return OrderOutcome::Pending;
        };
        metrics::record_accrual_lookup("resolved", elapsed);

        match self
            .store
            .resolve(&order.number, status, amount, Utc::now())
            .await
        {
            Ok(ResolveOutcome::Applied) => {
                metrics::record_order_resolved(status.as_str());
                info!(%status, %amount, user_id = %order.user_id, "入账订单已结算");
                OrderOutcome::Resolved(status)
            }
            Ok(ResolveOutcome::Unchanged) => OrderOutcome::Unchanged,
            Err(e) => {
                error!(error = %e, code = e.error_code(), "写回对账结果失败");
                OrderOutcome::Failed
            }
        }
    }
}

/// 等待 `duration`；期间收到关闭信号（或发送端被丢弃）返回 false
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.wait_for(|stop| *stop) => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

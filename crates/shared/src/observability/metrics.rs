//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// Metrics 资源守卫
///
/// 被丢弃时停止指标 HTTP 服务。
pub struct MetricsHandle {
    server_handle: tokio::task::JoinHandle<()>,
}

impl Drop for MetricsHandle {
    fn drop(&mut self) {
        self.server_handle.abort();
    }
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(service_name: &str, config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_metrics(service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle { server_handle })
}

/// 描述对账相关指标，出现在 /metrics 的 HELP 注释中
fn describe_metrics(service_name: &str) {
    metrics::describe_counter!("accrual_lookups_total", "Total number of accrual lookups");
    metrics::describe_histogram!(
        "accrual_lookup_duration_seconds",
        "Accrual lookup duration in seconds"
    );

    metrics::describe_counter!(
        "ledger_orders_resolved_total",
        "Deposit orders moved to a terminal status"
    );

    metrics::describe_counter!(
        "reconciliation_passes_total",
        "Total number of reconciliation passes"
    );
    metrics::describe_histogram!(
        "reconciliation_pass_duration_seconds",
        "Reconciliation pass duration in seconds"
    );

    metrics::describe_gauge!(
        "worker_last_run_timestamp",
        "Unix timestamp of the last completed worker run"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "指标服务已监听");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "指标服务异常退出");
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 指标记录函数
// ============================================================================

/// 记录一次 accrual 查询
///
/// outcome 取值：resolved / pending / unknown / timeout / rate_limited / error
#[inline]
pub fn record_accrual_lookup(outcome: &str, duration_secs: f64) {
    metrics::counter!(
        "accrual_lookups_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "accrual_lookup_duration_seconds",
        "outcome" => outcome.to_string()
    )
    .record(duration_secs);
}

/// 记录一笔入账订单进入终态
#[inline]
pub fn record_order_resolved(status: &str) {
    metrics::counter!(
        "ledger_orders_resolved_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录一轮对账
#[inline]
pub fn record_reconciliation_pass(result: &str, duration_secs: f64) {
    metrics::counter!(
        "reconciliation_passes_total",
        "result" => result.to_string()
    )
    .increment(1);

    metrics::histogram!("reconciliation_pass_duration_seconds").record(duration_secs);
}

/// 更新工作器最近一次运行时间
#[inline]
pub fn set_worker_last_run(worker: &str) {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();

    metrics::gauge!(
        "worker_last_run_timestamp",
        "worker" => worker.to_string()
    )
    .set(now);
}

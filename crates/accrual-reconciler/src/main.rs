//! accrual 对账服务入口

use std::sync::Arc;

use accrual_reconciler::{HttpAccrualClient, ReconciliationWorker, cli::Cli};
use clap::Parser;
use loyalty_shared::{
    LoyaltyError, config::AppConfig, database::Database, observability, retry::RetryPolicy,
    retry::retry_with_policy,
};
use order_ledger::PgLedgerStore;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load("accrual-reconciler")?;
    cli.apply(&mut config);
    config.validate()?;

    let guard = observability::init(&config.service_name, &config.observability).await?;

    info!(
        environment = %config.environment,
        accrual = %config.accrual.base_url,
        metrics = guard.metrics_enabled(),
        "Starting accrual-reconciler"
    );

    // 启动阶段数据库可能尚未就绪，按可重试错误退避重连
    let db = retry_with_policy(
        &RetryPolicy::default(),
        "database_connect",
        LoyaltyError::is_retryable,
        || Database::connect(&config.database),
    )
    .await?;
    db.run_migrations().await?;

    let store = Arc::new(PgLedgerStore::new(db.pool().clone()));
    let client = Arc::new(HttpAccrualClient::new(&config.accrual)?);
    let worker = ReconciliationWorker::new(store, client, &config.reconciler, &config.accrual);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handle = tokio::spawn(worker.run(shutdown_rx));

    tokio::select! {
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(true);
            if let Err(e) = handle.await {
                error!(error = %e, "对账工作器异常退出");
            }
        }
        result = &mut handle => {
            if let Err(e) = result {
                error!(error = %e, "对账工作器异常退出");
            }
        }
    }

    db.close().await;
    info!("accrual-reconciler stopped");
    drop(guard);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}

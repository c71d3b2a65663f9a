//! 命令行参数
//!
//! 命令行参数优先级最高，覆盖配置文件与环境变量。

use clap::Parser;
use loyalty_shared::config::AppConfig;

/// accrual 对账服务
#[derive(Parser, Debug, Default)]
#[command(name = "accrual-reconciler")]
#[command(version, about = "积分订单对账服务")]
pub struct Cli {
    /// PostgreSQL 连接串
    #[arg(short = 'd', long)]
    pub database_uri: Option<String>,

    /// accrual 服务地址，如 http://localhost:8081
    #[arg(short = 'r', long)]
    pub accrual_address: Option<String>,

    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// 两轮对账之间的间隔（毫秒）
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
}

impl Cli {
    /// 把显式给出的参数写入配置
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(url) = &self.database_uri {
            config.database.url = url.clone();
        }
        if let Some(address) = &self.accrual_address {
            config.accrual.base_url = address.clone();
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
        if let Some(interval) = self.poll_interval_ms {
            config.reconciler.poll_interval_ms = interval;
        }
    }
}

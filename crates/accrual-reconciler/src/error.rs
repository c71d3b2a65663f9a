//! 对账服务错误定义

use std::time::Duration;

use order_ledger::LedgerError;
use thiserror::Error;

/// accrual 查询错误
///
/// 对账本而言全部是暂时性故障：订单保持待处理，等下一轮重试。
#[derive(Debug, Error)]
pub enum AccrualError {
    #[error("accrual 请求超时")]
    Timeout,

    #[error("accrual 网络错误: {0}")]
    Transport(String),

    #[error("accrual 服务端错误: HTTP {0}")]
    Server(u16),

    #[error("accrual 限流，{}s 后重试", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("accrual 响应无法解析: {0}")]
    Decode(String),

    #[error("accrual 客户端初始化失败: {0}")]
    Build(String),
}

impl AccrualError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }

    /// 指标标签
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimited { .. } => "rate_limited",
            Self::Decode(_) => "decode_error",
            Self::Transport(_) | Self::Server(_) | Self::Build(_) => "error",
        }
    }
}

/// 整轮对账失败
///
/// 单笔订单的失败在工作器内部隔离，只有拉取待处理订单失败才会中止本轮。
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("账本存储错误: {0}")]
    Store(#[from] LedgerError),
}

//! accrual 服务客户端
//!
//! 按订单号查询远端积分计算状态：`GET {base}/api/orders/{number}`。
//! 每次调用只发一个请求，不做缓存。

use std::time::Duration;

use async_trait::async_trait;
use loyalty_shared::config::AccrualConfig;
use order_ledger::{OrderNumber, OrderStatus};
use reqwest::{StatusCode, header};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::AccrualError;

// ---------------------------------------------------------------------------
// 远端数据结构
// ---------------------------------------------------------------------------

/// accrual 服务返回的订单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccrualStatus {
    /// 已登记，尚未开始计算
    Registered,
    /// 订单不参与积分计算
    Invalid,
    /// 计算中
    Processing,
    /// 计算完成
    Processed,
}

/// 响应体 `{order, status, accrual}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccrualResponse {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Decimal>,
}

/// 远端给出的处理结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub status: AccrualStatus,
    pub amount: Decimal,
}

impl Resolution {
    /// 映射为账本写回的状态与金额
    ///
    /// REGISTERED / PROCESSING 返回 None，本轮不做任何修改。
    pub fn ledger_outcome(&self) -> Option<(OrderStatus, Decimal)> {
        match self.status {
            AccrualStatus::Registered | AccrualStatus::Processing => None,
            AccrualStatus::Invalid => Some((OrderStatus::Invalid, Decimal::ZERO)),
            AccrualStatus::Processed => Some((OrderStatus::Processed, self.amount)),
        }
    }
}

/// 单次查询结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup {
    Resolved(Resolution),
    /// 远端不认识该订单号
    Unknown,
}

// ---------------------------------------------------------------------------
// Trait 抽象
// ---------------------------------------------------------------------------

/// accrual 查询接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccrualClient: Send + Sync {
    async fn lookup(&self, number: &OrderNumber) -> Result<Lookup, AccrualError>;
}

// ---------------------------------------------------------------------------
// HTTP 实现
// ---------------------------------------------------------------------------

/// 基于 reqwest 的 accrual 客户端
#[derive(Clone)]
pub struct HttpAccrualClient {
    http: reqwest::Client,
    base_url: String,
    default_retry_after: Duration,
}

impl HttpAccrualClient {
    /// 创建客户端，请求超时取自配置
    pub fn new(config: &AccrualConfig) -> Result<Self, AccrualError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AccrualError::Build(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_retry_after: Duration::from_secs(config.default_retry_after_seconds),
        })
    }

    fn order_url(&self, number: &OrderNumber) -> String {
        format!("{}/api/orders/{}", self.base_url, number)
    }

    /// 解析 Retry-After（秒数形式），缺失或无法解析时使用默认值
    fn retry_after(&self, headers: &header::HeaderMap) -> Duration {
        headers
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.default_retry_after)
    }
}

fn into_resolution(number: &OrderNumber, body: AccrualResponse) -> Result<Resolution, AccrualError> {
    if body.order != number.as_str() {
        return Err(AccrualError::Decode(format!(
            "响应订单号 {} 与请求 {} 不一致",
            body.order, number
        )));
    }

    let amount = body.accrual.unwrap_or_default();
    if amount < Decimal::ZERO {
        return Err(AccrualError::Decode(format!("积分为负数: {amount}")));
    }
    if body.status == AccrualStatus::Processed && body.accrual.is_none() {
        warn!(number = %number, "PROCESSED 响应缺少 accrual，按 0 处理");
    }

    Ok(Resolution {
        status: body.status,
        amount,
    })
}

#[async_trait]
impl AccrualClient for HttpAccrualClient {
    #[instrument(skip(self), fields(number = %number))]
    async fn lookup(&self, number: &OrderNumber) -> Result<Lookup, AccrualError> {
        let response = self
            .http
            .get(self.order_url(number))
            .send()
            .await
            .map_err(AccrualError::from_reqwest)?;

        let status = response.status();
        debug!(status = status.as_u16(), "accrual 响应");

        match status {
            StatusCode::OK => {
                let body: AccrualResponse =
                    response.json().await.map_err(AccrualError::from_reqwest)?;
                into_resolution(number, body).map(Lookup::Resolved)
            }
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(Lookup::Unknown),
            StatusCode::TOO_MANY_REQUESTS => Err(AccrualError::RateLimited {
                retry_after: self.retry_after(response.headers()),
            }),
            other => Err(AccrualError::Server(other.as_u16())),
        }
    }
}

//! accrual 桩服务
//!
//! 按订单号预置响应，并统计每个订单号被查询的次数。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tokio::net::TcpListener;

/// 预置响应
#[derive(Debug, Clone)]
pub enum StubReply {
    Registered,
    Processing,
    Invalid,
    Processed(f64),
    /// 204，远端尚未登记
    NotRegistered,
    RateLimited { retry_after_secs: u64 },
    ServerError,
}

#[derive(Default)]
struct StubState {
    replies: HashMap<String, StubReply>,
    hits: HashMap<String, usize>,
}

/// 运行中的 accrual 桩服务
#[derive(Clone)]
pub struct AccrualStub {
    base_url: String,
    state: Arc<Mutex<StubState>>,
}

impl AccrualStub {
    /// 在随机端口上启动
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(Mutex::new(StubState::default()));
        let app = Router::new()
            .route("/api/orders/{number}", get(order_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            state,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 设置某订单号的响应，覆盖之前的设置
    pub fn reply(&self, number: &str, reply: StubReply) {
        if let Ok(mut state) = self.state.lock() {
            state.replies.insert(number.to_string(), reply);
        }
    }

    /// 某订单号累计被查询的次数
    pub fn hits(&self, number: &str) -> usize {
        self.state
            .lock()
            .map(|s| s.hits.get(number).copied().unwrap_or_default())
            .unwrap_or_default()
    }
}

async fn order_handler(
    State(state): State<Arc<Mutex<StubState>>>,
    Path(number): Path<String>,
) -> Response {
    let reply = match state.lock() {
        Ok(mut s) => {
            *s.hits.entry(number.clone()).or_default() += 1;
            s.replies.get(&number).cloned()
        }
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    match reply.unwrap_or(StubReply::NotRegistered) {
        StubReply::Registered => {
            Json(json!({ "order": number, "status": "REGISTERED" })).into_response()
        }
        StubReply::Processing => {
            Json(json!({ "order": number, "status": "PROCESSING" })).into_response()
        }
        StubReply::Invalid => Json(json!({ "order": number, "status": "INVALID" })).into_response(),
        StubReply::Processed(accrual) => Json(json!({
            "order": number,
            "status": "PROCESSED",
            "accrual": accrual
        }))
        .into_response(),
        StubReply::NotRegistered => StatusCode::NO_CONTENT.into_response(),
        StubReply::RateLimited { retry_after_secs } => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after_secs.to_string())],
            "No more than N requests per minute allowed",
        )
            .into_response(),
        StubReply::ServerError => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

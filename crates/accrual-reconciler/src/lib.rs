//! accrual 对账服务
//!
//! 后台轮询 accrual 服务，把入账订单的最终计算结果写回积分账本。
//!
//! ## 模块结构
//!
//! - `client`: accrual HTTP 客户端与查询结果
//! - `worker`: 分页对账循环
//! - `cli`: 命令行参数

pub mod cli;
pub mod client;
pub mod error;
pub mod worker;

pub use client::{AccrualClient, AccrualResponse, AccrualStatus, HttpAccrualClient, Lookup, Resolution};
pub use error::{AccrualError, ReconcileError};
pub use worker::{PassReport, ReconciliationWorker, WorkerState};

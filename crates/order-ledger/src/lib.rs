//! 积分账本
//!
//! 持久化用户提交的入账订单与积分扣减记录，并据此计算余额。
//!
//! ## 核心约束
//!
//! - 订单号全局唯一，且必须通过 Luhn 校验
//! - 入账订单状态只能向前推进，INVALID / PROCESSED 为终态
//! - 余额 = 已结算入账之和 - 扣减之和，扣减不会使余额为负
//!
//! ## 模块结构
//!
//! - `models`: 订单、余额及对外视图
//! - `repository`: `LedgerStore` 接口与 PostgreSQL / 内存实现
//! - `outcome`: 提交、扣减、写回的业务结果
//! - `luhn`: 订单号校验

pub mod error;
pub mod luhn;
pub mod models;
pub mod outcome;
pub mod repository;

pub use error::{LedgerError, Result};
pub use models::{Balance, Order, OrderKind, OrderNumber, OrderStatus};
pub use outcome::{ResolveOutcome, SubmitOutcome, WithdrawOutcome};
pub use repository::{InMemoryLedgerStore, LedgerStore, PgLedgerStore};

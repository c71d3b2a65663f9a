//! 测试环境设置模块
//!
//! 提供 accrual 桩服务与组装好的账本、工作器。

mod accrual_stub;
mod environment;

pub use accrual_stub::{AccrualStub, StubReply};
pub use environment::{RunningEnvironment, TestEnvironment};

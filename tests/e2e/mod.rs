//! 积分账本端到端测试
//!
//! 账本使用内存实现，accrual 服务由本地 axum 桩服务模拟，工作器通过真实 HTTP 客户端对账：
//! - 提交入账 -> 对账 -> 余额
//! - 扣减与余额不足
//! - 对账期间远端故障与限流

pub mod setup;
pub mod suites;

pub use setup::TestEnvironment;

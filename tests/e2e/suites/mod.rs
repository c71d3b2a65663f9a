//! 测试套件模块

pub mod reconciliation;
pub mod withdrawal;

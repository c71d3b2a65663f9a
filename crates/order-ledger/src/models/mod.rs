//! 账本数据模型

mod enums;
mod order;
mod view;

pub use enums::{OrderKind, OrderStatus};
pub use order::{Balance, Order, OrderNumber};
pub use view::{BalanceView, DepositView, WithdrawalView};

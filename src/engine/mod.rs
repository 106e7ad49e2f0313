pub mod backtest;
pub mod execution;

pub use backtest::{BacktestConfig, BacktestEngine, BacktestError, BacktestResult};
pub use execution::{ExecutionEngine, Fill, Order, OrderEvent, OrderId, OrderSide, OrderStatus};

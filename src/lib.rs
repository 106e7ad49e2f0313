//a Rust backtester for a moving-average trend filter with martingale bet sizing

pub mod config;
pub mod data;
pub mod engine;
pub mod indicator;
pub mod metrics;
pub mod portfolio;
pub mod strategy;
pub mod sweep;

//prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        BrokerConfig, ColumnMap, FeedConfig, OutputConfig, RunConfiguration, SizerConfig,
    };
    pub use crate::data::{load_csv, resample, Bar, ResampleConfig, Resampler, Timeframe};
    pub use crate::engine::{
        BacktestConfig, BacktestEngine, BacktestError, BacktestResult, ExecutionEngine, Fill,
        Order, OrderEvent, OrderId, OrderSide, OrderStatus,
    };
    pub use crate::indicator::{Line, SimpleMovingAverage};
    pub use crate::metrics::{
        calculate_equity_curve, save_equity_csv, save_trades_csv, EquityPoint, SummaryMetrics,
    };
    pub use crate::portfolio::{Account, ClosedTrade, Position, PositionSide};
    pub use crate::strategy::{
        BetSizing, Decision, Direction, FixedSize, MartingaleParams, MartingaleUnit, OrderRequest,
        Outcome, Phase, Strategy, StrategyContext, Trend, TrendMartingaleStrategy,
    };
    pub use crate::sweep::{sweep_ma_periods, sweep_table, SweepRow};
}

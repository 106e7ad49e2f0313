pub mod export;
pub mod summary;
pub mod timeseries;

pub use export::{save_equity_csv, save_trades_csv};
pub use summary::SummaryMetrics;
pub use timeseries::{calculate_equity_curve, EquityPoint};

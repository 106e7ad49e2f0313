use crate::metrics::timeseries::EquityPoint;
use crate::portfolio::ClosedTrade;
use anyhow::{Context, Result};
use std::path::Path;

//writes the equity curve as csv (timestamp,equity,drawdown,returns)
pub fn save_equity_csv(equity_curve: &[EquityPoint], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .context(format!("Failed to create equity CSV {:?}", path))?;

    for point in equity_curve {
        writer.serialize(point)?;
    }

    writer.flush()?;
    Ok(())
}

//writes closed trades as csv, one row per round trip
pub fn save_trades_csv(trades: &[ClosedTrade], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .context(format!("Failed to create trades CSV {:?}", path))?;

    for trade in trades {
        writer.serialize(trade)?;
    }

    writer.flush()?;
    Ok(())
}

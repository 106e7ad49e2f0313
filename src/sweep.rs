//! Moving-average period sweep.
//!
//! Each period gets its own engine and strategy, so runs share nothing but the
//! input bars and execute in parallel on the rayon pool.

use crate::config::RunConfiguration;
use crate::data::Bar;
use crate::engine::{BacktestEngine, BacktestError};
use crate::strategy::{ParamError, TrendMartingaleStrategy};
use prettytable::{Cell, Row, Table};
use rayon::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("MA period {period}: {source}")]
    Params {
        period: usize,
        #[source]
        source: ParamError,
    },
    #[error("MA period {period}: {source}")]
    Backtest {
        period: usize,
        #[source]
        source: BacktestError,
    },
}

//one line of the sweep report
#[derive(Debug, Clone)]
pub struct SweepRow {
    pub ma_period: usize,
    pub final_value: f64,
    pub total_return_pct: f64,
    pub max_drawdown: f64,
    pub num_trades: usize,
    pub win_rate: f64,
}

//runs one backtest per period, results come back in the order of `periods`
pub fn sweep_ma_periods(
    base: &RunConfiguration,
    bars: &[Bar],
    periods: &[usize],
) -> Result<Vec<SweepRow>, SweepError> {
    periods
        .par_iter()
        .map(|&period| run_one(base, bars, period))
        .collect()
}

fn run_one(base: &RunConfiguration, bars: &[Bar], period: usize) -> Result<SweepRow, SweepError> {
    let mut params = base.strategy.clone();
    params.ma_period = period;

    let mut strategy = TrendMartingaleStrategy::new(params)
        .map_err(|source| SweepError::Params { period, source })?;

    let mut engine = BacktestEngine::new(base.backtest_config(), bars.to_vec());
    let result = engine
        .run(&mut strategy)
        .map_err(|source| SweepError::Backtest { period, source })?;

    tracing::debug!(period, trades = result.trades.len(), "sweep run finished");

    Ok(SweepRow {
        ma_period: period,
        final_value: result.final_value,
        total_return_pct: result.summary.total_return_pct,
        max_drawdown: result.summary.max_drawdown,
        num_trades: result.summary.num_trades,
        win_rate: result.summary.win_rate,
    })
}

pub fn sweep_table(rows: &[SweepRow]) -> Table {
    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("MA Period"),
        Cell::new("Final Value"),
        Cell::new("Return"),
        Cell::new("Max DD"),
        Cell::new("Trades"),
        Cell::new("Win Rate"),
    ]));

    for row in rows {
        table.add_row(Row::new(vec![
            Cell::new(&row.ma_period.to_string()),
            Cell::new(&format!("${:.2}", row.final_value)),
            Cell::new(&format!("{:.4}%", row.total_return_pct * 100.0)),
            Cell::new(&format!("{:.4}%", row.max_drawdown * 100.0)),
            Cell::new(&row.num_trades.to_string()),
            Cell::new(&format!("{:.2}%", row.win_rate * 100.0)),
        ]));
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn hourly_trend(days: i64) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2007, 1, 1, 0, 0, 0).unwrap();
        (0..days * 24)
            .map(|h| {
                //slow uptrend with an hourly zigzag wide enough to cross the threshold
                let drift = 1.30 + h as f64 * 0.0005;
                let wiggle = if h % 2 == 0 { 0.02 } else { -0.02 };
                Bar::flat(start + Duration::hours(h), drift + wiggle)
            })
            .collect()
    }

    #[test]
    fn test_sweep_keeps_period_order() {
        let bars = hourly_trend(10);
        let mut base = RunConfiguration::default();
        base.feed.from_date = None;
        base.feed.to_date = None;

        let rows = sweep_ma_periods(&base, &bars, &[5, 2, 3]).unwrap();
        let periods: Vec<usize> = rows.iter().map(|r| r.ma_period).collect();
        assert_eq!(periods, vec![5, 2, 3]);
        assert!(rows.iter().all(|r| r.num_trades > 0));
        assert_eq!(sweep_table(&rows).len(), 4);
    }

    #[test]
    fn test_sweep_reports_bad_period() {
        let bars = hourly_trend(3);
        let err = sweep_ma_periods(&RunConfiguration::default(), &bars, &[2, 0]).unwrap_err();
        assert!(matches!(err, SweepError::Params { period: 0, .. }));
    }
}

use crate::metrics::timeseries::{calculate_returns, max_drawdown, EquityPoint};
use crate::portfolio::ClosedTrade;
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

//summary metrics for a backtest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_return: f64,
    pub total_return_pct: f64,
    pub cagr: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub num_trades: usize,
    pub num_winning_trades: usize,
    pub num_losing_trades: usize,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub exposure: f64,
}

impl SummaryMetrics {
    //calculate summary metrics from the equity curve and closed trades
    //sharpe and sortino are annualised with `periods_per_year` (one period per bar)
    pub fn from_backtest(
        equity_curve: &[EquityPoint],
        trades: &[ClosedTrade],
        initial_balance: f64,
        exposure: f64,
        periods_per_year: f64,
    ) -> Self {
        let final_balance = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_balance);

        let total_return = final_balance - initial_balance;
        let total_return_pct = if initial_balance != 0.0 {
            total_return / initial_balance
        } else {
            0.0
        };

        let cagr = match (equity_curve.first(), equity_curve.last()) {
            (Some(first), Some(last)) if initial_balance > 0.0 && final_balance > 0.0 => {
                let duration_days = (last.timestamp - first.timestamp).num_days() as f64;
                let years = duration_days / 365.25;
                if years > 0.0 {
                    ((final_balance / initial_balance).powf(1.0 / years) - 1.0) * 100.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };

        let equity_values: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
        let returns = calculate_returns(&equity_values);

        let trade_stats = calculate_trade_statistics(trades);

        SummaryMetrics {
            initial_balance,
            final_balance,
            total_return,
            total_return_pct,
            cagr,
            max_drawdown: max_drawdown(equity_curve),
            sharpe_ratio: calculate_sharpe_ratio(&returns, periods_per_year),
            sortino_ratio: calculate_sortino_ratio(&returns, periods_per_year),
            win_rate: trade_stats.win_rate,
            avg_win: trade_stats.avg_win,
            avg_loss: trade_stats.avg_loss,
            profit_factor: trade_stats.profit_factor,
            num_trades: trade_stats.num_trades,
            num_winning_trades: trade_stats.num_winning_trades,
            num_losing_trades: trade_stats.num_losing_trades,
            largest_win: trade_stats.largest_win,
            largest_loss: trade_stats.largest_loss,
            exposure,
        }
    }

    //builds the metrics table
    pub fn to_table(&self) -> Table {
        let rows = [
            ("Initial Balance", format!("${:.2}", self.initial_balance)),
            ("Final Balance", format!("${:.2}", self.final_balance)),
            (
                "Total Return",
                format!(
                    "${:.2} ({:.4}%)",
                    self.total_return,
                    self.total_return_pct * 100.0
                ),
            ),
            ("CAGR", format!("{:.4}%", self.cagr)),
            ("Max Drawdown", format!("{:.4}%", self.max_drawdown * 100.0)),
            ("Sharpe Ratio", format!("{:.3}", self.sharpe_ratio)),
            ("Sortino Ratio", format!("{:.3}", self.sortino_ratio)),
            ("Number of Trades", format!("{}", self.num_trades)),
            ("Win Rate", format!("{:.2}%", self.win_rate * 100.0)),
            ("Avg Win", format!("${:.2}", self.avg_win)),
            ("Avg Loss", format!("${:.2}", self.avg_loss)),
            ("Largest Win", format!("${:.2}", self.largest_win)),
            ("Largest Loss", format!("${:.2}", self.largest_loss)),
            ("Profit Factor", format!("{:.3}", self.profit_factor)),
            ("Exposure", format!("{:.2}%", self.exposure * 100.0)),
        ];

        let mut table = Table::new();
        table.add_row(Row::new(vec![Cell::new("Metric"), Cell::new("Value")]));
        for (name, value) in rows.iter() {
            table.add_row(Row::new(vec![Cell::new(name), Cell::new(value)]));
        }
        table
    }

    //prints metrics in a formatted table
    pub fn pretty_print_table(&self) {
        self.to_table().printstd();
    }
}

#[derive(Default)]
struct TradeStats {
    num_trades: usize,
    num_winning_trades: usize,
    num_losing_trades: usize,
    win_rate: f64,
    avg_win: f64,
    avg_loss: f64,
    profit_factor: f64,
    largest_win: f64,
    largest_loss: f64,
}

//trade statistics on net pnl
fn calculate_trade_statistics(trades: &[ClosedTrade]) -> TradeStats {
    if trades.is_empty() {
        return TradeStats::default();
    }

    let wins: Vec<f64> = trades
        .iter()
        .map(|t| t.pnl_net)
        .filter(|&pnl| pnl > 0.0)
        .collect();
    let losses: Vec<f64> = trades
        .iter()
        .map(|t| t.pnl_net)
        .filter(|&pnl| pnl < 0.0)
        .collect();

    let total = trades.len();
    let total_wins: f64 = wins.iter().sum();
    let total_losses: f64 = losses.iter().sum::<f64>().abs();

    let avg = |v: &[f64]| {
        if v.is_empty() {
            0.0
        } else {
            v.iter().sum::<f64>() / v.len() as f64
        }
    };

    let profit_factor = if total_losses > 0.0 {
        total_wins / total_losses
    } else if total_wins > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    TradeStats {
        num_trades: total,
        num_winning_trades: wins.len(),
        num_losing_trades: losses.len(),
        win_rate: wins.len() as f64 / total as f64,
        avg_win: avg(&wins),
        avg_loss: avg(&losses),
        profit_factor,
        largest_win: wins.iter().fold(0.0f64, |a, &b| a.max(b)),
        largest_loss: losses.iter().fold(0.0f64, |a, &b| a.min(b)),
    }
}

//mean over deviation, scaled from per-bar to yearly
fn annualised(mean: f64, deviation: f64, periods_per_year: f64) -> f64 {
    if deviation == 0.0 || !deviation.is_finite() {
        return 0.0;
    }
    mean / deviation * periods_per_year.sqrt()
}

fn calculate_sharpe_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    annualised(returns.mean(), returns.std_dev(), periods_per_year)
}

//downside deviation is the root mean square of the negative returns over all bars
fn calculate_sortino_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let downside: Vec<f64> = returns.iter().map(|&r| r.min(0.0).powi(2)).collect();
    let downside_dev = downside.as_slice().mean().sqrt();

    annualised(returns.mean(), downside_dev, periods_per_year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::calculate_equity_curve;
    use crate::portfolio::PositionSide;
    use chrono::{Duration, TimeZone, Utc};

    fn trade(pnl_net: f64) -> ClosedTrade {
        let ts = Utc.with_ymd_and_hms(2007, 1, 1, 0, 0, 0).unwrap();
        ClosedTrade {
            symbol: "EURUSD".to_string(),
            side: PositionSide::Long,
            size: 10.0,
            entry_time: ts,
            exit_time: ts,
            entry_price: 1.0,
            exit_price: 1.0,
            pnl: pnl_net,
            pnl_net,
        }
    }

    #[test]
    fn test_trade_statistics() {
        let trades = vec![trade(10.0), trade(-5.0), trade(20.0), trade(-15.0)];
        let stats = calculate_trade_statistics(&trades);

        assert_eq!(stats.num_trades, 4);
        assert_eq!(stats.num_winning_trades, 2);
        assert_eq!(stats.win_rate, 0.5);
        assert_eq!(stats.avg_win, 15.0);
        assert_eq!(stats.avg_loss, -10.0);
        assert_eq!(stats.profit_factor, 1.5);
        assert_eq!(stats.largest_win, 20.0);
        assert_eq!(stats.largest_loss, -15.0);
    }

    #[test]
    fn test_no_trades() {
        let stats = calculate_trade_statistics(&[]);
        assert_eq!(stats.num_trades, 0);
        assert_eq!(stats.profit_factor, 0.0);
    }

    #[test]
    fn test_ratios() {
        let returns = [0.01, -0.01, 0.02, -0.02, 0.03];
        let sharpe = calculate_sharpe_ratio(&returns, 1.0);
        let sortino = calculate_sortino_ratio(&returns, 1.0);
        assert!(sharpe > 0.0);
        assert!(sortino > sharpe);

        assert_eq!(calculate_sortino_ratio(&[0.01, 0.02], 252.0), 0.0);
        assert_eq!(calculate_sharpe_ratio(&[0.01], 252.0), 0.0);
    }

    #[test]
    fn test_summary_from_flat_equity() {
        let start = Utc.with_ymd_and_hms(2007, 1, 1, 0, 0, 0).unwrap();
        let timestamps: Vec<_> = (0..10).map(|i| start + Duration::days(i)).collect();
        let curve = calculate_equity_curve(&timestamps, &[1_000.0; 10], 1_000.0);

        let summary = SummaryMetrics::from_backtest(&curve, &[], 1_000.0, 0.0, 252.0);
        assert_eq!(summary.total_return, 0.0);
        assert_eq!(summary.sharpe_ratio, 0.0);
        assert_eq!(summary.max_drawdown, 0.0);
        assert_eq!(summary.cagr, 0.0);

        //header plus one row per metric
        assert_eq!(summary.to_table().len(), 16);
    }
}

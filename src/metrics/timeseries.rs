use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//a point in the equity curve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    pub drawdown: f64,
    pub returns: f64,
}

//builds the equity curve, drawdown measured from the running peak (initial balance included)
pub fn calculate_equity_curve(
    timestamps: &[DateTime<Utc>],
    equity_values: &[f64],
    initial_balance: f64,
) -> Vec<EquityPoint> {
    let mut peak = initial_balance;
    let mut prev_equity = initial_balance;

    timestamps
        .iter()
        .zip(equity_values)
        .map(|(&timestamp, &equity)| {
            peak = peak.max(equity);
            let drawdown = if peak > 0.0 {
                (peak - equity) / peak
            } else {
                0.0
            };
            let returns = simple_return(prev_equity, equity);
            prev_equity = equity;

            EquityPoint {
                timestamp,
                equity,
                drawdown,
                returns,
            }
        })
        .collect()
}

//maximum drawdown as a fraction of the peak
pub fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    equity_curve
        .iter()
        .map(|point| point.drawdown)
        .fold(0.0, f64::max)
}

//period-over-period returns of an equity series
pub fn calculate_returns(equity_values: &[f64]) -> Vec<f64> {
    equity_values
        .windows(2)
        .map(|w| simple_return(w[0], w[1]))
        .collect()
}

fn simple_return(previous: f64, current: f64) -> f64 {
    if previous == 0.0 {
        0.0
    } else {
        (current - previous) / previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_equity_curve_drawdown() {
        let start = Utc.with_ymd_and_hms(2007, 1, 1, 0, 0, 0).unwrap();
        let timestamps: Vec<_> = (0..4).map(|i| start + Duration::hours(i)).collect();
        let equity = [100.0, 120.0, 90.0, 130.0];

        let curve = calculate_equity_curve(&timestamps, &equity, 100.0);
        assert_eq!(curve.len(), 4);
        assert_eq!(curve[0].returns, 0.0);
        assert!((curve[1].returns - 0.2).abs() < 1e-12);
        assert!((curve[2].drawdown - 0.25).abs() < 1e-12);
        assert_eq!(curve[3].drawdown, 0.0);
        assert!((max_drawdown(&curve) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_returns() {
        let returns = calculate_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(returns.len(), 2);
        assert!((returns[0] - 0.1).abs() < 1e-12);
        assert!((returns[1] + 0.1).abs() < 1e-12);
        assert!(calculate_returns(&[100.0]).is_empty());
        assert_eq!(calculate_returns(&[0.0, 5.0]), vec![0.0]);
    }
}

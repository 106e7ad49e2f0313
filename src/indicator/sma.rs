use crate::indicator::line::Line;
use std::collections::VecDeque;

/// Simple moving average of the last `prices.len()` values.
pub fn sma(prices: &[f64]) -> Option<f64> {
    if prices.is_empty() {
        return None;
    }
    Some(prices.iter().sum::<f64>() / prices.len() as f64)
}

/// Incremental simple moving average.
///
/// Values are pushed one at a time. Once `period` inputs have been seen, every
/// push appends the current average to the output [`Line`]. Before that the
/// indicator is warming up and `value(0)` is `None`.
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    period: usize,
    window: VecDeque<f64>,
    line: Line,
}

impl SimpleMovingAverage {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        SimpleMovingAverage {
            period,
            window: VecDeque::with_capacity(period),
            line: Line::new(),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Feeds a new input and returns the average if the window is full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        if self.window.len() == self.period {
            self.window.pop_front();
        }
        self.window.push_back(value);

        if self.window.len() < self.period {
            return None;
        }

        // summing the window each time avoids drift from a running total
        let avg = sma(self.window.make_contiguous())?;
        self.line.push(avg);
        Some(avg)
    }

    /// Average `ago` outputs back, 0 being the latest.
    pub fn value(&self, ago: isize) -> Option<f64> {
        self.line.get(ago)
    }

    pub fn is_ready(&self) -> bool {
        !self.line.is_empty()
    }

    pub fn line(&self) -> &Line {
        &self.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_helper() {
        assert_eq!(sma(&[100.0, 102.0, 104.0, 106.0, 108.0]), Some(104.0));
        assert_eq!(sma(&[]), None);
    }

    #[test]
    fn test_warm_up() {
        let mut ma = SimpleMovingAverage::new(3);
        assert_eq!(ma.push(1.0), None);
        assert_eq!(ma.push(2.0), None);
        assert!(!ma.is_ready());
        assert_eq!(ma.push(3.0), Some(2.0));
        assert!(ma.is_ready());
        assert_eq!(ma.value(-1), None);
    }

    #[test]
    fn test_rolling_window() {
        let mut ma = SimpleMovingAverage::new(3);
        for v in [1.0, 2.0, 3.0, 4.0, 8.0] {
            ma.push(v);
        }
        assert_eq!(ma.value(0), Some(5.0));
        assert_eq!(ma.value(-1), Some(3.0));
        assert_eq!(ma.value(-2), Some(2.0));
        assert_eq!(ma.line().len(), 3);
    }

    #[test]
    fn test_zero_period_behaves_as_one() {
        let mut ma = SimpleMovingAverage::new(0);
        assert_eq!(ma.period(), 1);
        assert_eq!(ma.push(7.0), Some(7.0));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum BarError {
    #[error("Non-finite {field}: {value}")]
    NonFinite { field: &'static str, value: f64 },
    #[error("High ({high}) below low ({low})")]
    InvertedRange { high: f64, low: f64 },
    #[error("{field} ({value}) outside high-low range [{low}, {high}]")]
    OutsideRange {
        field: &'static str,
        value: f64,
        high: f64,
        low: f64,
    },
    #[error("Negative volume: {0}")]
    NegativeVolume(f64),
}

//one ohlcv bar, the timestamp marks the end of the bar's period
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub open_interest: Option<f64>,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        open_interest: Option<f64>,
    ) -> Result<Self, BarError> {
        let fields = [
            ("open", open),
            ("high", high),
            ("low", low),
            ("close", close),
            ("volume", volume),
        ];
        if let Some(&(field, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(BarError::NonFinite { field, value });
        }

        if high < low {
            return Err(BarError::InvertedRange { high, low });
        }

        for (field, value) in [("open", open), ("close", close)] {
            if !(low..=high).contains(&value) {
                return Err(BarError::OutsideRange {
                    field,
                    value,
                    high,
                    low,
                });
            }
        }

        if volume < 0.0 {
            return Err(BarError::NegativeVolume(volume));
        }

        Ok(Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            open_interest,
        })
    }

    //bar where every price equals `close`, for synthetic feeds
    pub fn flat(timestamp: DateTime<Utc>, close: f64) -> Self {
        Bar {
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
            open_interest: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2007, 1, 2, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_valid_bar() {
        let bar = Bar::new(ts(), 1.31, 1.32, 1.30, 1.315, 120.0, Some(3.0)).unwrap();
        assert_eq!(bar.close, 1.315);
        assert_eq!(bar.open_interest, Some(3.0));
    }

    #[test]
    fn test_high_below_low_rejected() {
        let err = Bar::new(ts(), 1.31, 1.29, 1.30, 1.30, 0.0, None).unwrap_err();
        assert!(matches!(err, BarError::InvertedRange { .. }));
    }

    #[test]
    fn test_prices_outside_range_rejected() {
        let err = Bar::new(ts(), 1.31, 1.32, 1.30, 1.33, 0.0, None).unwrap_err();
        assert!(matches!(err, BarError::OutsideRange { field: "close", .. }));

        let err = Bar::new(ts(), 1.29, 1.32, 1.30, 1.31, 0.0, None).unwrap_err();
        assert!(matches!(err, BarError::OutsideRange { field: "open", .. }));
    }

    #[test]
    fn test_nan_and_negative_volume_rejected() {
        let err = Bar::new(ts(), 1.31, f64::NAN, 1.30, 1.31, 0.0, None).unwrap_err();
        assert!(matches!(err, BarError::NonFinite { field: "high", .. }));

        let err = Bar::new(ts(), 1.31, 1.32, 1.30, 1.31, -1.0, None).unwrap_err();
        assert_eq!(err, BarError::NegativeVolume(-1.0));
    }

    #[test]
    fn test_flat_bar() {
        let bar = Bar::flat(ts(), 1.25);
        assert_eq!((bar.open, bar.high, bar.low), (1.25, 1.25, 1.25));
        assert_eq!(bar.volume, 0.0);
    }
}

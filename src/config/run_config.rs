use crate::data::ResampleConfig;
use crate::engine::BacktestConfig;
use crate::strategy::MartingaleParams;
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

//zero-based column positions in the csv file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub datetime: usize,
    pub open: usize,
    pub high: usize,
    pub low: usize,
    pub close: usize,
    pub volume: Option<usize>,
    pub open_interest: Option<usize>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        ColumnMap {
            datetime: 0,
            open: 1,
            high: 2,
            low: 3,
            close: 4,
            volume: Some(5),
            open_interest: None,
        }
    }
}

//generic csv data feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub path: PathBuf,
    pub symbol: String,
    pub datetime_format: String,
    pub has_headers: bool,
    pub columns: ColumnMap,
    //inclusive date window
    pub from_date: Option<NaiveDateTime>,
    pub to_date: Option<NaiveDateTime>,
    //substituted for empty numeric fields
    pub null_value: f64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            path: PathBuf::from("EURUSD_H1.csv"),
            symbol: "EURUSD".to_string(),
            datetime_format: "%Y-%m-%d %H:%M".to_string(),
            has_headers: true,
            columns: ColumnMap::default(),
            from_date: midnight(2007, 1, 1),
            to_date: midnight(2007, 10, 20),
            null_value: 0.0,
        }
    }
}

fn midnight(year: i32, month: u32, day: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day).and_then(|d| d.and_hms_opt(0, 0, 0))
}

//simulated broker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub initial_cash: f64,
    pub commission_per_unit: f64,
    pub slippage_per_unit: f64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            initial_cash: 1_000_000_000.0,
            commission_per_unit: 0.0,
            slippage_per_unit: 0.0,
        }
    }
}

//fixed stake used when the strategy does not size its own orders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizerConfig {
    pub stake: f64,
}

impl Default for SizerConfig {
    fn default() -> Self {
        SizerConfig { stake: 10.0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub equity_csv: Option<PathBuf>,
    pub trades_csv: Option<PathBuf>,
}

//complete run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfiguration {
    pub feed: FeedConfig,
    pub resample: ResampleConfig,
    pub broker: BrokerConfig,
    pub sizer: SizerConfig,
    pub strategy: MartingaleParams,
    pub output: OutputConfig,
    //bars per year, used to annualise sharpe and sortino (hourly fx by default)
    pub periods_per_year: f64,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        RunConfiguration {
            feed: FeedConfig::default(),
            resample: ResampleConfig::default(),
            broker: BrokerConfig::default(),
            sizer: SizerConfig::default(),
            strategy: MartingaleParams::default(),
            output: OutputConfig::default(),
            periods_per_year: 6_240.0,
        }
    }
}

impl RunConfiguration {
    //load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .context(format!("Failed to read config file {:?}", path))?;
        let config: RunConfiguration = serde_json::from_str(&contents)
            .context(format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    //save configuration to a JSON file
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).context(format!("Failed to write config file {:?}", path))?;
        Ok(())
    }

    //engine settings derived from this configuration
    pub fn backtest_config(&self) -> BacktestConfig {
        BacktestConfig {
            symbol: self.feed.symbol.clone(),
            initial_balance: self.broker.initial_cash,
            commission_per_unit: self.broker.commission_per_unit,
            slippage_per_unit: self.broker.slippage_per_unit,
            stake: self.sizer.stake,
            resample: self.resample,
            periods_per_year: self.periods_per_year,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Timeframe;
    use crate::strategy::BetSizing;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_reference_run() {
        let config = RunConfiguration::default();
        assert_eq!(config.feed.datetime_format, "%Y-%m-%d %H:%M");
        assert_eq!(config.feed.columns.close, 4);
        assert_eq!(config.feed.from_date, midnight(2007, 1, 1));
        assert_eq!(config.resample.timeframe, Timeframe::Days);
        assert_eq!(config.broker.initial_cash, 1_000_000_000.0);
        assert_eq!(config.sizer.stake, 10.0);
        assert_eq!(config.strategy.ma_period, 200);
        assert_eq!(config.strategy.bet_sizing, BetSizing::LimitPriceField);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{
            "feed": { "path": "data/hourly.csv", "to_date": null },
            "strategy": { "ma_period": 20, "close_distance": 0.002,
                          "starting_bet_size": 10, "bet_size_increment": 5,
                          "bet_sizing": "quantity" },
            "resample": { "timeframe": "hours", "compression": 4 }
        }"#;

        let config: RunConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(config.feed.path, PathBuf::from("data/hourly.csv"));
        assert_eq!(config.feed.to_date, None);
        assert_eq!(config.feed.symbol, "EURUSD");
        assert_eq!(config.strategy.bet_sizing, BetSizing::Quantity);
        assert_eq!(config.resample.compression, 4);
        assert_eq!(config.broker, BrokerConfig::default());

        let engine = config.backtest_config();
        assert_eq!(engine.stake, 10.0);
        assert_eq!(engine.resample.timeframe, Timeframe::Hours);
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");

        let mut config = RunConfiguration::default();
        config.strategy.ma_period = 50;
        config.output.trades_csv = Some(PathBuf::from("trades.csv"));
        config.to_json_file(&path).unwrap();

        let loaded = RunConfiguration::from_json_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(RunConfiguration::from_json_file(&dir.path().join("nope.json")).is_err());
    }
}

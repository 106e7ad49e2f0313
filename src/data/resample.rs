use crate::data::bar::Bar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ResampleError {
    #[error("Resample compression must be at least 1")]
    ZeroCompression,
}

//target timeframe for resampled bars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Minutes,
    Hours,
    Days,
}

impl Timeframe {
    fn seconds(&self) -> i64 {
        match self {
            Timeframe::Minutes => 60,
            Timeframe::Hours => 3_600,
            Timeframe::Days => 86_400,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleConfig {
    pub timeframe: Timeframe,
    pub compression: u32,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        ResampleConfig {
            timeframe: Timeframe::Days,
            compression: 1,
        }
    }
}

impl ResampleConfig {
    //bucket number a timestamp falls into
    fn bucket(&self, timestamp: DateTime<Utc>) -> i64 {
        let units = timestamp.timestamp().div_euclid(self.timeframe.seconds());
        units.div_euclid(self.compression as i64)
    }
}

//streaming aggregator that turns base bars into coarser bars
//a bucket is emitted once the first bar of the next bucket arrives
#[derive(Debug, Clone)]
pub struct Resampler {
    config: ResampleConfig,
    current: Option<(i64, Bar)>,
}

impl Resampler {
    pub fn new(config: ResampleConfig) -> Result<Self, ResampleError> {
        if config.compression == 0 {
            return Err(ResampleError::ZeroCompression);
        }
        Ok(Resampler {
            config,
            current: None,
        })
    }

    //feeds one base bar, returns the completed bar if a bucket just closed
    pub fn push(&mut self, bar: &Bar) -> Option<Bar> {
        let bucket = self.config.bucket(bar.timestamp);

        if let Some((current_bucket, agg)) = self.current.as_mut() {
            if *current_bucket == bucket {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.volume += bar.volume;
                agg.open_interest = bar.open_interest;
                agg.timestamp = bar.timestamp;
                return None;
            }
        }

        self.current
            .replace((bucket, bar.clone()))
            .map(|(_, completed)| completed)
    }

    //emits the trailing partial bucket, if any
    pub fn flush(&mut self) -> Option<Bar> {
        self.current.take().map(|(_, bar)| bar)
    }
}

//resamples a whole series at once
pub fn resample(bars: &[Bar], config: ResampleConfig) -> Result<Vec<Bar>, ResampleError> {
    let mut resampler = Resampler::new(config)?;
    let mut out: Vec<Bar> = bars.iter().filter_map(|b| resampler.push(b)).collect();
    out.extend(resampler.flush());
    Ok(out)
}

pub mod bar;
pub mod loader;
pub mod resample;

pub use bar::{Bar, BarError};
pub use loader::load_csv;
pub use resample::{resample, ResampleConfig, ResampleError, Resampler, Timeframe};

pub mod run_config;

pub use run_config::{
    BrokerConfig, ColumnMap, FeedConfig, OutputConfig, RunConfiguration, SizerConfig,
};

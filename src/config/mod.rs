pub mod settings;

pub use settings::{
    BacktestSettings, CarrySettings, ChainSettings, ConfigError, RunConfig, WeightPolicy,
};

//a Rust-based continuous futures contract builder and signal backtester

pub mod chain;
pub mod config;
pub mod data;
pub mod engine;
pub mod frame;
pub mod instrument;
pub mod metrics;
pub mod runner;
pub mod signal;
pub mod weight;

//prelude module for convenient imports
pub mod prelude {
    pub use crate::chain::{
        CarryRow, CarrySeries, ChainError, ContinuousRow, ContinuousSeries, DateRanking,
    };
    pub use crate::config::{
        BacktestSettings, CarrySettings, ChainSettings, ConfigError, RunConfig, WeightPolicy,
    };
    pub use crate::data::{
        load_continuous_dir, load_product_dir, ContractBar, ContractSeries, ProductContractSet,
    };
    pub use crate::engine::{BacktestEngine, BacktestResult};
    pub use crate::frame::Frame;
    pub use crate::instrument::{month_diff, CodeError, ContractCode, DeliveryMonth};
    pub use crate::metrics::{calculate_pnl_curve, InstrumentStats, PnlPoint, PortfolioSummary};
    pub use crate::signal::{blended_momentum, momentum, pnl_frame};
    pub use crate::weight::{weigh, weight_atr, weight_equal, weight_std};
}

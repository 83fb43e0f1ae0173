use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

//configuration problems are fatal at the call boundary, raised before
//any per-product work starts
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Liquidity window must be positive")]
    ZeroLiquidityWindow,
    #[error("ATR span must be positive")]
    ZeroAtrSpan,
    #[error("Front-contract liquidity threshold must be non-negative: {0}")]
    NegativeThreshold(f64),
    #[error("Slippage must be non-negative basis points: {0}")]
    NegativeSlippage(f64),
    #[error("Risk budget must be positive: {0}")]
    BadRiskBudget(f64),
    #[error("Backtest window is malformed: start {start} is not before end {end}")]
    BadWindow { start: NaiveDate, end: NaiveDate },
    #[error("Momentum lookbacks must not be empty")]
    NoLookbacks,
}

//settings for continuous chain construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSettings {
    //rolling window for the volume/open-interest liquidity blend
    pub liquidity_window: usize,

    //span of the exponentially-weighted true-range mean
    pub atr_span: usize,

    //settle rolling-mean window used to normalize atr
    pub atr_norm_window: usize,
}

impl Default for ChainSettings {
    fn default() -> Self {
        ChainSettings {
            liquidity_window: 3,
            atr_span: 14,
            atr_norm_window: 5,
        }
    }
}

impl ChainSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.liquidity_window == 0 {
            return Err(ConfigError::ZeroLiquidityWindow);
        }
        if self.atr_span == 0 || self.atr_norm_window == 0 {
            return Err(ConfigError::ZeroAtrSpan);
        }
        Ok(())
    }
}

//settings for carry chain construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrySettings {
    //minimum liquidity the front contract must clear
    pub front_threshold: f64,

    //minimum forward spacing, in delivery months, from main to sec
    pub min_carry_gap: i32,
}

impl Default for CarrySettings {
    fn default() -> Self {
        CarrySettings {
            front_threshold: 100.0,
            min_carry_gap: 3,
        }
    }
}

impl CarrySettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.front_threshold < 0.0 {
            return Err(ConfigError::NegativeThreshold(self.front_threshold));
        }
        Ok(())
    }
}

//position-sizing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightPolicy {
    Equal,
    InverseAtr,
    InverseVol,
}

impl WeightPolicy {
    //parse policy from a cli string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "equal" => Some(WeightPolicy::Equal),
            "atr" | "inverse_atr" => Some(WeightPolicy::InverseAtr),
            "vol" | "std" | "inverse_vol" => Some(WeightPolicy::InverseVol),
            _ => None,
        }
    }
}

//settings for a backtest evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSettings {
    //slippage charged per unit of position change, in basis points
    pub slip_bps: f64,

    //position-sizing policy and its risk-budget constant
    pub weighting: WeightPolicy,
    pub risk_budget: f64,

    //window for the rolling realized-vol weighting
    pub vol_window: usize,

    //evaluation window [start, end); unbounded when absent
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,

    //forward-fill the signal before sizing
    pub ffill_signal: bool,

    //momentum signal lookbacks and smoothing window
    pub lookbacks: Vec<usize>,
    pub smooth: usize,

    //signal lag, in periods
    pub delay: usize,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        BacktestSettings {
            slip_bps: 5.0,
            weighting: WeightPolicy::InverseAtr,
            risk_budget: 0.05,
            vol_window: 100,
            start: None,
            end: None,
            ffill_signal: false,
            lookbacks: vec![10, 22, 66, 132],
            smooth: 10,
            delay: 1,
        }
    }
}

impl BacktestSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slip_bps < 0.0 {
            return Err(ConfigError::NegativeSlippage(self.slip_bps));
        }
        if !(self.risk_budget > 0.0) {
            return Err(ConfigError::BadRiskBudget(self.risk_budget));
        }
        if self.lookbacks.is_empty() {
            return Err(ConfigError::NoLookbacks);
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start >= end {
                return Err(ConfigError::BadWindow { start, end });
            }
        }
        Ok(())
    }
}

//complete run configuration, json-loadable
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunConfig {
    pub chain: ChainSettings,
    pub carry: CarrySettings,
    pub backtest: BacktestSettings,
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chain.validate()?;
        self.carry.validate()?;
        self.backtest.validate()
    }

    //load configuration from a json file
    pub fn from_json_file(path: &PathBuf) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    //save configuration to a json file
    pub fn to_json_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

//one daily record for one delivery-month contract
//missing numeric values are f64::NAN, matching the source tables where
//any field can be absent on a given date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub settle: f64,
    pub volume: f64,
    pub open_interest: f64,

    //derived columns, filled in by ContractSeries::derive
    //log return of settle
    pub pnl: f64,

    //weighted rolling blend of volume and open interest
    pub liquidity: f64,

    //true range and its exponentially-weighted mean
    pub true_range: f64,
    pub atr: f64,

    //atr divided by a short rolling mean of settle
    pub norm_atr: f64,
}

impl ContractBar {
    //creates a bar from raw fields; derived columns start undefined
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        settle: f64,
        volume: f64,
        open_interest: f64,
    ) -> Self {
        ContractBar {
            date,
            open,
            high,
            low,
            close,
            settle,
            volume,
            open_interest,
            pnl: f64::NAN,
            liquidity: f64::NAN,
            true_range: f64::NAN,
            atr: f64::NAN,
            norm_atr: f64::NAN,
        }
    }

    //true when the bar has a defined liquidity score,
    //ie the contract counts as live for ranking on this date
    pub fn is_live(&self) -> bool {
        !self.liquidity.is_nan()
    }
}

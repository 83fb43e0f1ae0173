pub mod carry;
pub mod continuous;
pub mod ranker;

use thiserror::Error;

pub use carry::{CarryRow, CarrySeries};
pub use continuous::{ContinuousRow, ContinuousSeries};
pub use ranker::{rank_by_liquidity, rank_contracts, DateRanking};

#[derive(Error, Debug, Clone)]
pub enum ChainError {
    #[error("{0} doesn't have any rankable data")]
    NoData(String),
}

pub mod summary;
pub mod timeseries;

pub use summary::{InstrumentStats, PortfolioSummary};
pub use timeseries::{calculate_pnl_curve, max_drawdown, PnlPoint};

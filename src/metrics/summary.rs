use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};

//per-instrument performance statistics
//sharpe is left as-is when volatility vanishes, so degenerate series
//show up as non-finite values downstream instead of silently as zeros
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentStats {
    pub symbol: String,
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    pub sharpe: f64,
    pub turnover: f64,
}

//portfolio-level summary of a backtest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub symbols: Vec<String>,
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    pub annualized_slippage: f64,
    pub sharpe: f64,
    pub turnover: f64,
    pub max_drawdown: f64,
    pub avg_long_count: f64,
    pub avg_short_count: f64,
}

impl PortfolioSummary {
    //prints the summary in a formatted table
    pub fn pretty_print_table(&self) {
        let mut table = Table::new();

        table.add_row(Row::new(vec![Cell::new("Metric"), Cell::new("Value")]));

        table.add_row(Row::new(vec![
            Cell::new("Products"),
            Cell::new(&self.symbols.join(",")),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Annualized Return"),
            Cell::new(&format!("{:.2}%", self.annualized_return * 100.0)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Annualized Volatility"),
            Cell::new(&format!("{:.2}%", self.annualized_volatility * 100.0)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Annualized Slippage"),
            Cell::new(&format!("{:.2}%", self.annualized_slippage * 100.0)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Sharpe Ratio"),
            Cell::new(&format!("{:.2}", self.sharpe)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Daily Turnover"),
            Cell::new(&format!("{:.2}%", self.turnover * 100.0)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Max Drawdown"),
            Cell::new(&format!("{:.2}%", self.max_drawdown * 100.0)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Avg Long Positions"),
            Cell::new(&format!("{:.1}", self.avg_long_count)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Avg Short Positions"),
            Cell::new(&format!("{:.1}", self.avg_short_count)),
        ]));

        table.printstd();
    }
}

use crate::chain::ranker::{rank_by_liquidity, DateRanking};
use crate::chain::ChainError;
use crate::data::series::ProductContractSet;
use crate::instrument::ContractCode;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

//rounds to the given number of decimal places; undefined stays undefined
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

//formats a value for csv output: empty cell when undefined
fn fmt_cell(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        format!("{}", value)
    }
}

//volume-like fields are written as integers
fn fmt_count(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        format!("{}", value as i64)
    }
}

//one date of the stitched series: the selected contract's own fields,
//plus liquidity totals across every live contract that date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuousRow {
    pub date: NaiveDate,
    pub contract: ContractCode,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub settle: f64,
    pub volume: f64,
    pub open_interest: f64,
    pub pnl: f64,
    pub true_range: f64,
    pub atr: f64,
    pub total_volume: f64,
    pub total_open_interest: f64,
}

//selection-only continuous series for one product
//no back-adjustment is applied: a price jump at a roll is preserved so the
//series stays auditable against the selected contract's settlement
#[derive(Debug, Clone, Default)]
pub struct ContinuousSeries {
    pub symbol: String,
    pub rows: Vec<ContinuousRow>,
}

impl ContinuousSeries {
    //stitches the rank-1 selection per date into one table
    pub fn build(set: &ProductContractSet) -> Result<Self, ChainError> {
        let rankings = rank_by_liquidity(set);
        Self::from_rankings(set, &rankings)
    }

    pub fn from_rankings(
        set: &ProductContractSet,
        rankings: &[DateRanking],
    ) -> Result<Self, ChainError> {
        if rankings.is_empty() {
            return Err(ChainError::NoData(set.symbol.clone()));
        }

        info!(symbol = %set.symbol, dates = rankings.len(), "chaining");

        let mut rows = Vec::with_capacity(rankings.len());

        for ranking in rankings {
            let date = ranking.date;
            let selected = ranking.selected();
            //live contracts always have a bar on their ranking date
            let bar = set.get(selected).and_then(|s| s.bar_on(date)).unwrap();

            //totals span every live contract on the date, not just the
            //selected one
            let mut total_volume = 0.0;
            let mut total_oi = 0.0;
            for &code in &ranking.ranked {
                if let Some(live) = set.get(code).and_then(|s| s.bar_on(date)) {
                    if !live.volume.is_nan() {
                        total_volume += live.volume;
                    }
                    if !live.open_interest.is_nan() {
                        total_oi += live.open_interest;
                    }
                }
            }

            rows.push(ContinuousRow {
                date,
                contract: selected,
                open: round_to(bar.open, 1),
                high: round_to(bar.high, 1),
                low: round_to(bar.low, 1),
                close: round_to(bar.close, 1),
                settle: round_to(bar.settle, 1),
                volume: round_to(bar.volume, 0),
                open_interest: round_to(bar.open_interest, 0),
                pnl: round_to(bar.pnl, 6),
                true_range: round_to(bar.true_range, 1),
                atr: round_to(bar.norm_atr, 4),
                total_volume,
                total_open_interest: total_oi,
            });
        }

        Ok(ContinuousSeries {
            symbol: set.symbol.clone(),
            rows,
        })
    }

    //dates where the selected contract changed from the previous row
    pub fn rolls(&self) -> Vec<(NaiveDate, ContractCode, ContractCode)> {
        self.rows
            .windows(2)
            .filter(|w| w[0].contract != w[1].contract)
            .map(|w| (w[1].date, w[0].contract, w[1].contract))
            .collect()
    }

    //writes the series with the fixed column order and a header row
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .context(format!("Failed to create output file: {:?}", path))?;

        writer.write_record([
            "Date",
            "Contract",
            "Open",
            "High",
            "Low",
            "Close",
            "Settle",
            "Volume",
            "OI",
            "PnL",
            "TR",
            "ATR",
            "TotalVolume",
            "TotalOI",
        ])?;

        for row in &self.rows {
            writer.write_record([
                row.date.format("%Y-%m-%d").to_string(),
                row.contract.to_string(),
                fmt_cell(row.open),
                fmt_cell(row.high),
                fmt_cell(row.low),
                fmt_cell(row.close),
                fmt_cell(row.settle),
                fmt_count(row.volume),
                fmt_count(row.open_interest),
                fmt_cell(row.pnl),
                fmt_cell(row.true_range),
                fmt_cell(row.atr),
                fmt_cell(row.total_volume),
                fmt_cell(row.total_open_interest),
            ])?;
        }

        writer
            .flush()
            .context(format!("Failed to flush output file: {:?}", path))?;
        Ok(())
    }
}

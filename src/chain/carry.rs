use crate::chain::ranker::{rank_by_liquidity, DateRanking};
use crate::chain::ChainError;
use crate::config::CarrySettings;
use crate::data::series::ProductContractSet;
use crate::instrument::{month_diff, ContractCode};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

//one date of the carry chain: the three selected contracts and the
//calendar-spread return between main and sec
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarryRow {
    pub date: NaiveDate,
    pub front: ContractCode,
    pub main: ContractCode,
    pub sec: ContractCode,
    pub front_settle: f64,
    pub main_settle: f64,
    pub sec_settle: f64,
    pub front_pnl: f64,
    pub main_pnl: f64,
    pub sec_pnl: f64,
    pub spread_pnl: f64,
    pub volume: f64,
    pub open_interest: f64,
    //false when rank exhaustion left the month constraints unsatisfied
    //and the last candidate was retained
    pub gap_ok: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CarrySeries {
    pub symbol: String,
    pub rows: Vec<CarryRow>,
}

//first element satisfying the predicate, else the last element seen
//the bool reports whether the predicate was actually satisfied
fn find_first_or_last<T: Copy>(
    candidates: impl IntoIterator<Item = T>,
    pred: impl Fn(T) -> bool,
) -> Option<(T, bool)> {
    let mut last = None;
    for candidate in candidates {
        if pred(candidate) {
            return Some((candidate, true));
        }
        last = Some(candidate);
    }
    last.map(|c| (c, false))
}

impl CarrySeries {
    pub fn build(set: &ProductContractSet, settings: &CarrySettings) -> Result<Self, ChainError> {
        let rankings = rank_by_liquidity(set);
        Self::from_rankings(set, &rankings, settings)
    }

    pub fn from_rankings(
        set: &ProductContractSet,
        rankings: &[DateRanking],
        settings: &CarrySettings,
    ) -> Result<Self, ChainError> {
        if rankings.is_empty() {
            return Err(ChainError::NoData(set.symbol.clone()));
        }

        info!(symbol = %set.symbol, dates = rankings.len(), "chaining for carry");

        let mut rows = Vec::with_capacity(rankings.len());

        for ranking in rankings {
            let date = ranking.date;

            //front: the month-earliest live contract clearing the
            //liquidity threshold; no such contract skips the date
            let front = set.codes().find(|&code| {
                set.get(code)
                    .and_then(|s| s.bar_on(date))
                    .map(|bar| bar.liquidity > settings.front_threshold)
                    .unwrap_or(false)
            });

            let front = match front {
                Some(code) => code,
                None => {
                    warn!(
                        symbol = %set.symbol,
                        %date,
                        threshold = settings.front_threshold,
                        "no front contract clears the liquidity threshold, skipping date"
                    );
                    continue;
                }
            };

            //main: best-ranked contract not before the front month
            //rank exhaustion keeps the last candidate, degraded
            let (main, main_rank, main_ok) = {
                let found = find_first_or_last(ranking.ranked.iter().copied(), |code| {
                    month_diff(code, front) >= 0
                })
                .unwrap();
                let rank = ranking.ranked.iter().position(|&c| c == found.0).unwrap();
                (found.0, rank, found.1)
            };

            //sec: continue down the rank list from main until the carry
            //gap is satisfied; same degradation rule
            let (sec, sec_ok) = find_first_or_last(
                ranking.ranked[main_rank..].iter().copied(),
                |code| month_diff(code, main) >= settings.min_carry_gap,
            )
            .unwrap();

            let gap_ok = main_ok && sec_ok;
            if !gap_ok {
                warn!(
                    symbol = %set.symbol,
                    %date,
                    %front,
                    %main,
                    %sec,
                    "rank list exhausted before satisfying month constraints"
                );
            }

            let front_bar = set.get(front).and_then(|s| s.bar_on(date)).unwrap();
            let main_bar = set.get(main).and_then(|s| s.bar_on(date)).unwrap();
            let sec_bar = set.get(sec).and_then(|s| s.bar_on(date)).unwrap();

            rows.push(CarryRow {
                date,
                front,
                main,
                sec,
                front_settle: front_bar.settle,
                main_settle: main_bar.settle,
                sec_settle: sec_bar.settle,
                front_pnl: front_bar.pnl,
                main_pnl: main_bar.pnl,
                sec_pnl: sec_bar.pnl,
                spread_pnl: main_bar.pnl - sec_bar.pnl,
                volume: front_bar.volume + main_bar.volume + sec_bar.volume,
                open_interest: front_bar.open_interest
                    + main_bar.open_interest
                    + sec_bar.open_interest,
                gap_ok,
            });
        }

        if rows.is_empty() {
            warn!(symbol = %set.symbol, "every date failed the front-contract threshold");
        }

        Ok(CarrySeries {
            symbol: set.symbol.clone(),
            rows,
        })
    }

    //writes the series with the fixed column order and a header row
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .context(format!("Failed to create output file: {:?}", path))?;

        writer.write_record([
            "Date",
            "FrontContract",
            "MainContract",
            "SecContract",
            "FrontSettle",
            "MainSettle",
            "SecSettle",
            "FrontPnL",
            "MainPnL",
            "SecPnL",
            "SpreadPnL",
            "Volume",
            "OI",
            "GapOK",
        ])?;

        let fmt = |v: f64| {
            if v.is_nan() {
                String::new()
            } else {
                format!("{}", v)
            }
        };

        for row in &self.rows {
            writer.write_record([
                row.date.format("%Y-%m-%d").to_string(),
                row.front.to_string(),
                row.main.to_string(),
                row.sec.to_string(),
                fmt(row.front_settle),
                fmt(row.main_settle),
                fmt(row.sec_settle),
                fmt(row.front_pnl),
                fmt(row.main_pnl),
                fmt(row.sec_pnl),
                fmt(row.spread_pnl),
                fmt(row.volume),
                fmt(row.open_interest),
                (if row.gap_ok { "1" } else { "0" }).to_string(),
            ])?;
        }

        writer
            .flush()
            .context(format!("Failed to flush output file: {:?}", path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::series::ContractSeries;
    use crate::data::ContractBar;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 1, day).unwrap()
    }

    fn series(code: &str, days: &[u32], levels: &[f64]) -> ContractSeries {
        let bars = days
            .iter()
            .zip(levels.iter())
            .map(|(&d, &level)| {
                ContractBar::new(date(d), 10.0, 11.0, 9.0, 10.0, 10.0, level, level)
            })
            .collect();
        ContractSeries::from_raw(code.parse().unwrap(), bars, 1, 14, 5)
    }

    fn product(series_list: Vec<ContractSeries>) -> ProductContractSet {
        let mut set = ProductContractSet::new("CU");
        for s in series_list {
            set.insert(s);
        }
        set
    }

    fn settings() -> CarrySettings {
        CarrySettings {
            front_threshold: 100.0,
            min_carry_gap: 3,
        }
    }

    #[test]
    fn selects_front_main_and_gapped_sec() {
        //jan is the most liquid and clears the threshold; the sec must
        //sit at least three months beyond main
        let set = product(vec![
            series("2018F", &[1], &[500.0]),
            series("2018H", &[1], &[400.0]),
            series("2018K", &[1], &[300.0]),
        ]);

        let carry = CarrySeries::build(&set, &settings()).unwrap();
        let row = &carry.rows[0];

        assert_eq!(row.front.to_string(), "2018F");
        assert_eq!(row.main.to_string(), "2018F");
        //2018J would be the first satisfying month but is not listed;
        //2018K is the first ranked contract with month_diff >= 3
        assert_eq!(row.sec.to_string(), "2018K");
        assert!(row.gap_ok);
        assert_eq!(row.volume, 500.0 + 500.0 + 300.0);
    }

    #[test]
    fn ordering_front_main_sec_is_monotone() {
        let set = product(vec![
            series("2018F", &[1], &[150.0]),
            series("2018H", &[1], &[600.0]),
            series("2018N", &[1], &[400.0]),
        ]);

        let carry = CarrySeries::build(&set, &settings()).unwrap();
        let row = &carry.rows[0];

        assert_eq!(row.front.to_string(), "2018F");
        //rank 1 is 2018H, already past the front month
        assert_eq!(row.main.to_string(), "2018H");
        assert_eq!(row.sec.to_string(), "2018N");

        assert!(month_diff(row.main, row.front) >= 0);
        assert!(month_diff(row.sec, row.main) >= 3);
    }

    #[test]
    fn threshold_failure_skips_the_date() {
        let set = product(vec![
            series("2018F", &[1, 2], &[50.0, 500.0]),
            series("2018H", &[1, 2], &[60.0, 400.0]),
        ]);

        let carry = CarrySeries::build(&set, &settings()).unwrap();

        //day 1 has no contract above 100, only day 2 survives
        assert_eq!(carry.rows.len(), 1);
        assert_eq!(carry.rows[0].date, date(2));
    }

    #[test]
    fn rank_exhaustion_degrades_and_flags() {
        //only two contracts one month apart: no sec can satisfy the
        //3-month gap, the last candidate is retained and flagged
        let set = product(vec![
            series("2018F", &[1], &[500.0]),
            series("2018G", &[1], &[400.0]),
        ]);

        let carry = CarrySeries::build(&set, &settings()).unwrap();
        let row = &carry.rows[0];

        assert_eq!(row.main.to_string(), "2018F");
        assert_eq!(row.sec.to_string(), "2018G");
        assert!(!row.gap_ok);
    }

    #[test]
    fn thin_sets_may_collapse_to_one_contract() {
        let set = product(vec![series("2018F", &[1], &[500.0])]);

        let carry = CarrySeries::build(&set, &settings()).unwrap();
        let row = &carry.rows[0];

        assert_eq!(row.front, row.main);
        assert_eq!(row.main, row.sec);
        assert!(!row.gap_ok);
    }

    #[test]
    fn spread_pnl_is_main_minus_sec() {
        let mut f_bars = Vec::new();
        let mut k_bars = Vec::new();
        for (d, (fs, ks)) in [(1, (100.0, 100.0)), (2, (110.0, 105.0))] {
            f_bars.push(ContractBar::new(
                date(d),
                fs,
                fs + 1.0,
                fs - 1.0,
                fs,
                fs,
                500.0,
                500.0,
            ));
            k_bars.push(ContractBar::new(
                date(d),
                ks,
                ks + 1.0,
                ks - 1.0,
                ks,
                ks,
                300.0,
                300.0,
            ));
        }

        let set = product(vec![
            ContractSeries::from_raw("2018F".parse().unwrap(), f_bars, 1, 14, 5),
            ContractSeries::from_raw("2018K".parse().unwrap(), k_bars, 1, 14, 5),
        ]);

        let carry = CarrySeries::build(&set, &settings()).unwrap();
        let row = &carry.rows[1];

        assert_eq!(row.main.to_string(), "2018F");
        assert_eq!(row.sec.to_string(), "2018K");
        let expected = row.main_pnl - row.sec_pnl;
        assert!((row.spread_pnl - expected).abs() < 1e-12);
        assert!(row.spread_pnl > 0.0);
    }

    #[test]
    fn main_contract_never_rolls_backward() {
        //liquidity migrates forward through the months; the main
        //contract's delivery month must never regress
        let set = product(vec![
            series("2018F", &[1, 2, 3, 4], &[500.0, 400.0, 200.0, 110.0]),
            series("2018K", &[1, 2, 3, 4], &[200.0, 450.0, 500.0, 300.0]),
            series("2018Q", &[1, 2, 3, 4], &[110.0, 120.0, 300.0, 500.0]),
        ]);

        let carry = CarrySeries::build(&set, &settings()).unwrap();
        assert_eq!(carry.rows.len(), 4);

        for pair in carry.rows.windows(2) {
            assert!(month_diff(pair[1].main, pair[0].main) >= 0);
        }
    }

    #[test]
    fn empty_product_is_a_chain_error() {
        let set = ProductContractSet::new("CU");
        assert!(matches!(
            CarrySeries::build(&set, &settings()),
            Err(ChainError::NoData(_))
        ));
    }
}

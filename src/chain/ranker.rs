use crate::data::bar::ContractBar;
use crate::data::series::ProductContractSet;
use crate::instrument::ContractCode;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::warn;

//per-date total order of a product's live contracts, best ranked first
#[derive(Debug, Clone)]
pub struct DateRanking {
    pub date: NaiveDate,
    //contract codes by descending ranking value,
    //ties broken by the earlier delivery month
    pub ranked: Vec<ContractCode>,
    //ranking value per ranked contract, same order
    pub values: Vec<f64>,
}

impl DateRanking {
    //the rank-1 selection for this date
    pub fn selected(&self) -> ContractCode {
        self.ranked[0]
    }
}

//ranks all live contracts of a product on every date where the ranking
//field is defined for at least one contract; dates with no live contract
//are dropped from the domain with a diagnostic
pub fn rank_contracts(
    set: &ProductContractSet,
    field: impl Fn(&ContractBar) -> f64,
) -> Vec<DateRanking> {
    let dates: BTreeSet<NaiveDate> = set
        .contracts
        .values()
        .flat_map(|series| series.dates())
        .collect();

    let mut rankings = Vec::new();

    for date in dates {
        let mut live: Vec<(ContractCode, f64)> = set
            .contracts
            .values()
            .filter_map(|series| {
                let bar = series.bar_on(date)?;
                let value = field(bar);
                if value.is_nan() {
                    None
                } else {
                    Some((series.code, value))
                }
            })
            .collect();

        if live.is_empty() {
            warn!(symbol = %set.symbol, %date, "no live contracts on date, skipping");
            continue;
        }

        live.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(&b.0)));

        rankings.push(DateRanking {
            date,
            ranked: live.iter().map(|(code, _)| *code).collect(),
            values: live.iter().map(|(_, value)| *value).collect(),
        });
    }

    rankings
}

//ranks by the liquidity score, the default selection key
pub fn rank_by_liquidity(set: &ProductContractSet) -> Vec<DateRanking> {
    rank_contracts(set, |bar| bar.liquidity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::series::ContractSeries;
    use crate::data::ContractBar;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 1, day).unwrap()
    }

    //a contract whose liquidity equals the given constant each day
    //(volume = oi = level makes the blend equal level)
    fn series(code: &str, days: &[u32], levels: &[f64]) -> ContractSeries {
        let bars = days
            .iter()
            .zip(levels.iter())
            .map(|(&d, &level)| {
                ContractBar::new(date(d), 10.0, 11.0, 9.0, 10.0, 10.0, level, level)
            })
            .collect();
        //window 1 keeps daily liquidity equal to the daily level
        ContractSeries::from_raw(code.parse().unwrap(), bars, 1, 14, 5)
    }

    fn product(series_list: Vec<ContractSeries>) -> ProductContractSet {
        let mut set = ProductContractSet::new("CU");
        for s in series_list {
            set.insert(s);
        }
        set
    }

    #[test]
    fn rank_one_beats_every_live_contract() {
        let set = product(vec![
            series("2018F", &[1, 2], &[100.0, 100.0]),
            series("2018H", &[1, 2], &[150.0, 50.0]),
        ]);

        let rankings = rank_by_liquidity(&set);
        assert_eq!(rankings.len(), 2);

        for ranking in &rankings {
            let top = ranking.values[0];
            assert!(ranking.values.iter().all(|&v| top >= v));
        }

        assert_eq!(rankings[0].selected().to_string(), "2018H");
        assert_eq!(rankings[1].selected().to_string(), "2018F");
    }

    #[test]
    fn ties_resolve_to_the_earlier_month() {
        let set = product(vec![
            series("2018K", &[1], &[100.0]),
            series("2018F", &[1], &[100.0]),
            series("2018H", &[1], &[100.0]),
        ]);

        let rankings = rank_by_liquidity(&set);
        let codes: Vec<String> = rankings[0].ranked.iter().map(|c| c.to_string()).collect();
        assert_eq!(codes, vec!["2018F", "2018H", "2018K"]);
    }

    #[test]
    fn dates_without_live_contracts_are_dropped() {
        //day 2 exists only as a bar with undefined volume and oi,
        //so no contract is live there
        let dead = ContractBar::new(
            date(2),
            f64::NAN,
            f64::NAN,
            f64::NAN,
            f64::NAN,
            f64::NAN,
            f64::NAN,
            f64::NAN,
        );

        let live_bar = ContractBar::new(date(1), 10.0, 11.0, 9.0, 10.0, 10.0, 50.0, 50.0);
        let series = ContractSeries::from_raw(
            "2018F".parse().unwrap(),
            vec![live_bar, dead],
            1,
            14,
            5,
        );

        let set = product(vec![series]);
        let rankings = rank_by_liquidity(&set);

        assert_eq!(rankings.len(), 1);
        assert_eq!(rankings[0].date, date(1));
    }

    #[test]
    fn selection_flips_when_liquidity_crosses() {
        //a holds at 100 while b climbs 50 -> 150; the selection must flip
        //exactly once, on the first day b exceeds 100
        let set = product(vec![
            series("2018F", &[1, 2, 3, 4, 5], &[100.0; 5]),
            series("2018H", &[1, 2, 3, 4, 5], &[50.0, 75.0, 100.0, 125.0, 150.0]),
        ]);

        let rankings = rank_by_liquidity(&set);
        let selected: Vec<String> = rankings
            .iter()
            .map(|r| r.selected().to_string())
            .collect();

        //the tie on day 3 resolves to the earlier month, 2018F
        assert_eq!(selected, vec!["2018F", "2018F", "2018F", "2018H", "2018H"]);

        let transitions = selected.windows(2).filter(|w| w[0] != w[1]).count();
        assert_eq!(transitions, 1);
    }
}

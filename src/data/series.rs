use crate::data::bar::ContractBar;
use crate::instrument::ContractCode;
use chrono::NaiveDate;
use std::collections::BTreeMap;

//rolling mean over the trailing window, skipping undefined values
//a date with no defined value in its window stays undefined
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        let start = (i + 1).saturating_sub(window);
        let mut sum = 0.0;
        let mut count = 0usize;

        for &v in &values[start..=i] {
            if !v.is_nan() {
                sum += v;
                count += 1;
            }
        }

        out.push(if count > 0 { sum / count as f64 } else { f64::NAN });
    }

    out
}

//all daily bars for one (product, contract-code) pair, date ascending
//immutable once derived; owned exclusively by its ProductContractSet
#[derive(Debug, Clone)]
pub struct ContractSeries {
    pub code: ContractCode,
    pub bars: Vec<ContractBar>,
}

impl ContractSeries {
    //takes raw bars in any order; sorts, backfills close from settle,
    //and computes the derived columns
    pub fn from_raw(
        code: ContractCode,
        mut bars: Vec<ContractBar>,
        liquidity_window: usize,
        atr_span: usize,
        atr_norm_window: usize,
    ) -> Self {
        bars.sort_by_key(|b| b.date);

        let mut series = ContractSeries { code, bars };
        series.derive(liquidity_window, atr_span, atr_norm_window);
        series
    }

    fn derive(&mut self, liquidity_window: usize, atr_span: usize, atr_norm_window: usize) {
        //close falls back to settle when missing
        for bar in self.bars.iter_mut() {
            if bar.close.is_nan() {
                bar.close = bar.settle;
            }
        }

        //log return of settle
        let settles: Vec<f64> = self.bars.iter().map(|b| b.settle).collect();
        for i in 0..self.bars.len() {
            self.bars[i].pnl = if i == 0 {
                f64::NAN
            } else {
                settles[i].ln() - settles[i - 1].ln()
            };
        }

        //liquidity score: 0.7 volume + 0.3 open interest, rolling means
        let volumes: Vec<f64> = self.bars.iter().map(|b| b.volume).collect();
        let ois: Vec<f64> = self.bars.iter().map(|b| b.open_interest).collect();
        let vol_mean = rolling_mean(&volumes, liquidity_window);
        let oi_mean = rolling_mean(&ois, liquidity_window);

        for i in 0..self.bars.len() {
            self.bars[i].liquidity = 0.7 * vol_mean[i] + 0.3 * oi_mean[i];
        }

        //true range: widest of high-low, |high-prevclose|, |low-prevclose|
        //undefined legs are skipped; the first bar has no previous close
        let mut trs = Vec::with_capacity(self.bars.len());
        for i in 0..self.bars.len() {
            let bar = &self.bars[i];
            let prev_close = if i == 0 {
                f64::NAN
            } else {
                self.bars[i - 1].close
            };

            let legs = [
                bar.high - bar.low,
                (bar.high - prev_close).abs(),
                (bar.low - prev_close).abs(),
            ];

            let tr = legs
                .iter()
                .filter(|v| !v.is_nan())
                .fold(f64::NAN, |acc, &v| if acc.is_nan() { v } else { acc.max(v) });
            trs.push(tr);
        }

        //recursive exponentially-weighted mean of true range
        //seeded at the first defined observation; an undefined true range
        //carries the previous value forward
        let alpha = 2.0 / (atr_span as f64 + 1.0);
        let mut atr_prev = f64::NAN;
        let mut atrs = Vec::with_capacity(trs.len());
        for &tr in &trs {
            let atr = if tr.is_nan() {
                atr_prev
            } else if atr_prev.is_nan() {
                tr
            } else {
                (1.0 - alpha) * atr_prev + alpha * tr
            };
            atrs.push(atr);
            atr_prev = atr;
        }

        //normalize atr by a short rolling mean of settle
        let settle_mean = rolling_mean(&settles, atr_norm_window);
        for i in 0..self.bars.len() {
            self.bars[i].true_range = trs[i];
            self.bars[i].atr = atrs[i];
            self.bars[i].norm_atr = atrs[i] / settle_mean[i];
        }
    }

    //bar lookup by date (bars are sorted, so binary search)
    pub fn bar_on(&self, date: NaiveDate) -> Option<&ContractBar> {
        self.bars
            .binary_search_by_key(&date, |b| b.date)
            .ok()
            .map(|i| &self.bars[i])
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.bars.iter().map(|b| b.date)
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

//all delivery-month contracts of one product
//the btree order over codes is the (year, month) roll order that the
//chain builders' monotonicity checks depend on
#[derive(Debug, Clone, Default)]
pub struct ProductContractSet {
    pub symbol: String,
    pub contracts: BTreeMap<ContractCode, ContractSeries>,
}

impl ProductContractSet {
    pub fn new(symbol: impl Into<String>) -> Self {
        ProductContractSet {
            symbol: symbol.into(),
            contracts: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, series: ContractSeries) {
        self.contracts.insert(series.code, series);
    }

    //contract codes in ascending month order
    pub fn codes(&self) -> impl Iterator<Item = ContractCode> + '_ {
        self.contracts.keys().copied()
    }

    pub fn get(&self, code: ContractCode) -> Option<&ContractSeries> {
        self.contracts.get(&code)
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 1, day).unwrap()
    }

    fn bar(day: u32, settle: f64, volume: f64, oi: f64) -> ContractBar {
        ContractBar::new(
            date(day),
            settle,
            settle + 1.0,
            settle - 1.0,
            settle,
            settle,
            volume,
            oi,
        )
    }

    fn make_series(bars: Vec<ContractBar>) -> ContractSeries {
        ContractSeries::from_raw("2018F".parse().unwrap(), bars, 3, 14, 5)
    }

    #[test]
    fn rolling_mean_skips_undefined_values() {
        let values = [1.0, f64::NAN, 3.0];
        let out = rolling_mean(&values, 2);

        assert_eq!(out[0], 1.0);
        assert_eq!(out[1], 1.0);
        assert_eq!(out[2], 3.0);
    }

    #[test]
    fn bars_are_sorted_and_pnl_is_log_return() {
        //fed out of order on purpose
        let series = make_series(vec![
            bar(3, 110.0, 10.0, 10.0),
            bar(1, 100.0, 10.0, 10.0),
            bar(2, 100.0, 10.0, 10.0),
        ]);

        assert_eq!(series.bars[0].date, date(1));
        assert!(series.bars[0].pnl.is_nan());
        assert_eq!(series.bars[1].pnl, 0.0);
        assert!((series.bars[2].pnl - (110.0f64.ln() - 100.0f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn close_backfills_from_settle() {
        let mut b = bar(1, 100.0, 10.0, 10.0);
        b.close = f64::NAN;
        let series = make_series(vec![b]);

        assert_eq!(series.bars[0].close, 100.0);
    }

    #[test]
    fn liquidity_blends_volume_and_open_interest() {
        let series = make_series(vec![bar(1, 100.0, 100.0, 200.0), bar(2, 100.0, 200.0, 400.0)]);

        //first bar: single-observation means
        assert!((series.bars[0].liquidity - (0.7 * 100.0 + 0.3 * 200.0)).abs() < 1e-12);
        //second bar: 2-day means inside the 3-day window
        assert!((series.bars[1].liquidity - (0.7 * 150.0 + 0.3 * 300.0)).abs() < 1e-12);
    }

    #[test]
    fn true_range_uses_previous_close() {
        let mut b1 = bar(1, 100.0, 10.0, 10.0);
        b1.high = 102.0;
        b1.low = 99.0;
        b1.close = 101.0;
        let mut b2 = bar(2, 100.0, 10.0, 10.0);
        b2.high = 103.0;
        b2.low = 97.0;

        let series = make_series(vec![b1, b2]);

        //first bar: no previous close, tr falls back to high-low
        assert!((series.bars[0].true_range - 3.0).abs() < 1e-12);
        //second bar: max(103-97, |103-101|, |97-101|) = 6
        assert!((series.bars[1].true_range - 6.0).abs() < 1e-12);
    }

    #[test]
    fn atr_recursion_seeds_at_first_observation() {
        let mut b1 = bar(1, 100.0, 10.0, 10.0);
        b1.high = 103.0;
        b1.low = 100.0;
        let mut b2 = bar(2, 100.0, 10.0, 10.0);
        b2.high = 106.0;
        b2.low = 100.0;
        b2.close = 100.0;

        let series = make_series(vec![b1, b2]);

        let alpha = 2.0 / 15.0;
        let tr0 = series.bars[0].true_range;
        let tr1 = series.bars[1].true_range;
        let expected = (1.0 - alpha) * tr0 + alpha * tr1;

        assert_eq!(series.bars[0].atr, tr0);
        assert!((series.bars[1].atr - expected).abs() < 1e-12);
    }

    #[test]
    fn product_set_iterates_in_month_order() {
        let mut set = ProductContractSet::new("CU");
        set.insert(make_series(vec![bar(1, 1.0, 1.0, 1.0)]));

        let mut later = make_series(vec![bar(1, 1.0, 1.0, 1.0)]);
        later.code = "2017X".parse().unwrap();
        set.insert(later);

        let codes: Vec<String> = set.codes().map(|c| c.to_string()).collect();
        assert_eq!(codes, vec!["2017X", "2018F"]);
    }
}

use crate::config::{BacktestSettings, WeightPolicy};
use crate::frame::Frame;
use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use tracing::info;

const TRADING_DAYS: f64 = 252.0;

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0).unwrap().and_utc()
}

//division by a vanishing denominator maps to undefined instead of
//infinity, then the last valid weight is carried forward
fn invert_and_fill(frame: &Frame, k: f64) -> Frame {
    let mut out = Frame::new(frame.index().to_vec());
    for name in frame.column_names() {
        let col = frame.column(name).unwrap();
        let values = col
            .iter()
            .map(|&v| {
                let w = k / v;
                if w.is_finite() {
                    w
                } else {
                    f64::NAN
                }
            })
            .collect();
        out.insert(name.to_string(), values);
    }
    out.ffill()
}

//restricts a frame to the configured [start, end) window, when set
fn clip_window(frame: &Frame, settings: &BacktestSettings) -> Frame {
    let start = settings
        .start
        .map(midnight)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let end = settings
        .end
        .map(midnight)
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    frame.between(start, end)
}

//equal weighting: 1/n per column, constant over time
pub fn weight_equal(signal: &Frame) -> Frame {
    info!("Calculating weighting equally ...");

    let n = signal.ncols();
    let mut weight = Frame::new(signal.index().to_vec());
    for name in signal.column_names() {
        weight.insert(name.to_string(), vec![1.0 / n as f64; signal.nrows()]);
    }
    weight
}

//inverse-atr weighting: k over the annualized normalized atr
pub fn weight_atr(
    data: &IndexMap<String, Frame>,
    settings: &BacktestSettings,
) -> Frame {
    info!("Calculating weighting based on ATR ...");

    let mut series = Vec::new();
    for (sym, frame) in data {
        if let Some(col) = frame.column("ATR") {
            let points: Vec<(DateTime<Utc>, f64)> = frame
                .index()
                .iter()
                .copied()
                .zip(col.iter().map(|&v| v * TRADING_DAYS.sqrt()))
                .collect();
            series.push((sym.clone(), points));
        }
    }

    let scaled = clip_window(&Frame::from_columns(series), settings);
    invert_and_fill(&scaled, settings.risk_budget)
}

//inverse-realized-vol weighting: k over the annualized rolling std of pnl
pub fn weight_std(
    data: &IndexMap<String, Frame>,
    settings: &BacktestSettings,
) -> Frame {
    info!("Calculating weighting based on std ...");

    let mut series = Vec::new();
    for (sym, frame) in data {
        if let Some(col) = frame.column("PnL") {
            let points: Vec<(DateTime<Utc>, f64)> = frame
                .index()
                .iter()
                .copied()
                .zip(col.iter().copied())
                .collect();
            series.push((sym.clone(), points));
        }
    }

    let pnl = Frame::from_columns(series);
    let vol = pnl.rolling_std(settings.vol_window, 1);

    let mut scaled = Frame::new(vol.index().to_vec());
    for name in vol.column_names() {
        let col = vol.column(name).unwrap();
        scaled.insert(
            name.to_string(),
            col.iter().map(|&v| v * TRADING_DAYS.sqrt()).collect(),
        );
    }

    let scaled = clip_window(&scaled, settings);
    invert_and_fill(&scaled, settings.risk_budget)
}

//dispatches on the configured policy
pub fn weigh(
    policy: WeightPolicy,
    signal: &Frame,
    data: &IndexMap<String, Frame>,
    settings: &BacktestSettings,
) -> Frame {
    match policy {
        WeightPolicy::Equal => weight_equal(signal),
        WeightPolicy::InverseAtr => weight_atr(data, settings),
        WeightPolicy::InverseVol => weight_std(data, settings),
    }
}

use crate::frame::Frame;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::warn;

//builds the per-product return frame the signals work from:
//one column per product, holding that product's continuous pnl
pub fn pnl_frame(data: &IndexMap<String, Frame>) -> Frame {
    let mut series = Vec::new();

    for (sym, frame) in data {
        match frame.column("PnL") {
            Some(col) => {
                let points: Vec<(DateTime<Utc>, f64)> = frame
                    .index()
                    .iter()
                    .copied()
                    .zip(col.iter().copied())
                    .collect();
                series.push((sym.clone(), points));
            }
            None => warn!(symbol = %sym, "continuous data has no PnL column"),
        }
    }

    Frame::from_columns(series)
}

//rolling momentum: sign of the trailing n-period return sum,
//+1 long, -1 short, carried forward over flat stretches
pub fn momentum(returns: &Frame, lookback: usize, delay: usize, smooth: usize) -> Frame {
    let raw = returns.rolling_sum(lookback, 1);

    let mut signal = Frame::new(raw.index().to_vec());
    for name in raw.column_names() {
        let col = raw.column(name).unwrap();
        let signs = col
            .iter()
            .map(|&v| {
                if v.is_nan() || v == 0.0 {
                    f64::NAN
                } else if v > 0.0 {
                    1.0
                } else {
                    -1.0
                }
            })
            .collect();
        signal.insert(name.to_string(), signs);
    }

    let mut signal = signal.shift(delay).ffill();

    if smooth > 0 {
        signal = signal.rolling_mean(smooth, 1);
    }

    signal
}

//averages momentum signals over several lookbacks, then smooths
//the default blend spans 10, 22, 66 and 132 periods
pub fn blended_momentum(
    returns: &Frame,
    lookbacks: &[usize],
    delay: usize,
    smooth: usize,
) -> Frame {
    let signals: Vec<Frame> = lookbacks
        .iter()
        .map(|&n| momentum(returns, n, delay, 0))
        .collect();

    let mut combined = Frame::new(returns.index().to_vec());
    for name in returns.column_names() {
        let values: Vec<f64> = returns
            .index()
            .iter()
            .enumerate()
            .map(|(i, _)| {
                let sum: f64 = signals
                    .iter()
                    .filter_map(|s| s.column(name))
                    .map(|col| if col[i].is_nan() { 0.0 } else { col[i] })
                    .sum();
                sum / signals.len() as f64
            })
            .collect();
        combined.insert(name.to_string(), values);
    }

    let mut combined = combined.fillna(0.0);
    if smooth > 0 {
        combined = combined.rolling_mean(smooth, 1);
    }

    combined
}

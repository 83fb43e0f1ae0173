use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//a point in the portfolio pnl curve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnlPoint {
    pub timestamp: DateTime<Utc>,
    pub pnl: f64,
    pub cum_pnl: f64,
    pub drawdown: f64,
}

impl PnlPoint {
    pub fn new(timestamp: DateTime<Utc>, pnl: f64, cum_pnl: f64, drawdown: f64) -> Self {
        PnlPoint {
            timestamp,
            pnl,
            cum_pnl,
            drawdown,
        }
    }
}

//builds the cumulative pnl curve with drawdowns
//drawdown is the gap from the running cumulative peak, in return units
pub fn calculate_pnl_curve(timestamps: &[DateTime<Utc>], pnl: &[f64]) -> Vec<PnlPoint> {
    let mut curve = Vec::with_capacity(timestamps.len());
    let mut cum = 0.0;
    let mut peak = 0.0;

    for (&timestamp, &value) in timestamps.iter().zip(pnl.iter()) {
        if !value.is_nan() {
            cum += value;
        }

        if cum > peak {
            peak = cum;
        }

        curve.push(PnlPoint::new(timestamp, value, cum, peak - cum));
    }

    curve
}

//largest peak-to-trough gap of the cumulative pnl
pub fn max_drawdown(curve: &[PnlPoint]) -> f64 {
    curve
        .iter()
        .map(|point| point.drawdown)
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stamps(n: usize) -> Vec<DateTime<Utc>> {
        (0..n)
            .map(|i| Utc.with_ymd_and_hms(2018, 1, i as u32 + 1, 0, 0, 0).unwrap())
            .collect()
    }

    #[test]
    fn drawdown_measures_gap_from_running_peak() {
        let pnl = [0.02, -0.01, -0.02, 0.04];
        let curve = calculate_pnl_curve(&stamps(4), &pnl);

        assert_eq!(curve[0].drawdown, 0.0);
        assert!((curve[1].drawdown - 0.01).abs() < 1e-12);
        assert!((curve[2].drawdown - 0.03).abs() < 1e-12);
        assert_eq!(curve[3].drawdown, 0.0);

        assert!((max_drawdown(&curve) - 0.03).abs() < 1e-12);
    }

    #[test]
    fn cumulative_pnl_sums_defined_values() {
        let pnl = [0.01, f64::NAN, 0.02];
        let curve = calculate_pnl_curve(&stamps(3), &pnl);

        assert!((curve[2].cum_pnl - 0.03).abs() < 1e-12);
    }
}

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use statrs::statistics::Statistics;

//mean over defined values only; undefined when none exist
pub fn nan_mean(values: &[f64]) -> f64 {
    let defined: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if defined.is_empty() {
        f64::NAN
    } else {
        defined.mean()
    }
}

//sample standard deviation over defined values only
//undefined for fewer than two observations
pub fn nan_std(values: &[f64]) -> f64 {
    let defined: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if defined.len() < 2 {
        f64::NAN
    } else {
        defined.std_dev()
    }
}

//right-closed daily bucket label: a timestamp exactly on midnight labels
//its own day, anything after rolls to the next midnight
pub fn daily_bucket(t: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = t.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
    if t == midnight {
        midnight
    } else {
        midnight + Duration::days(1)
    }
}

//a date-indexed table, one column per instrument symbol
//the shared shape of signal, weight, return and per-period result matrices
//missing cells are f64::NAN; the index is ascending and unique
#[derive(Debug, Clone, Default)]
pub struct Frame {
    index: Vec<DateTime<Utc>>,
    columns: IndexMap<String, Vec<f64>>,
}

impl Frame {
    pub fn new(index: Vec<DateTime<Utc>>) -> Self {
        Frame {
            index,
            columns: IndexMap::new(),
        }
    }

    //builds a frame from per-column (timestamp, value) series,
    //aligned on the sorted union of all timestamps
    pub fn from_columns(series: Vec<(String, Vec<(DateTime<Utc>, f64)>)>) -> Self {
        let mut stamps: Vec<DateTime<Utc>> = series
            .iter()
            .flat_map(|(_, points)| points.iter().map(|(t, _)| *t))
            .collect();
        stamps.sort();
        stamps.dedup();

        let mut frame = Frame::new(stamps);
        for (name, points) in series {
            let mut values = vec![f64::NAN; frame.index.len()];
            for (t, v) in points {
                if let Ok(pos) = frame.index.binary_search(&t) {
                    values[pos] = v;
                }
            }
            frame.columns.insert(name, values);
        }
        frame
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|s| s.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn nrows(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty() || self.columns.is_empty()
    }

    //inserts a column; its length must match the index
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        assert_eq!(values.len(), self.index.len());
        self.columns.insert(name.into(), values);
    }

    pub fn value_at(&self, t: DateTime<Utc>, name: &str) -> f64 {
        match (self.index.binary_search(&t), self.columns.get(name)) {
            (Ok(pos), Some(col)) => col[pos],
            _ => f64::NAN,
        }
    }

    fn map_columns(&self, f: impl Fn(&[f64]) -> Vec<f64>) -> Frame {
        let mut out = Frame::new(self.index.clone());
        for (name, col) in &self.columns {
            out.columns.insert(name.clone(), f(col));
        }
        out
    }

    //per-column shift down by n periods, undefined head
    pub fn shift(&self, n: usize) -> Frame {
        self.map_columns(|col| {
            let mut shifted = vec![f64::NAN; col.len()];
            for i in n..col.len() {
                shifted[i] = col[i - n];
            }
            shifted
        })
    }

    //first difference per column
    pub fn diff(&self) -> Frame {
        self.map_columns(|col| {
            let mut out = vec![f64::NAN; col.len()];
            for i in 1..col.len() {
                out[i] = col[i] - col[i - 1];
            }
            out
        })
    }

    pub fn abs(&self) -> Frame {
        self.map_columns(|col| col.iter().map(|v| v.abs()).collect())
    }

    pub fn fillna(&self, value: f64) -> Frame {
        self.map_columns(|col| {
            col.iter()
                .map(|v| if v.is_nan() { value } else { *v })
                .collect()
        })
    }

    //carries the last defined value forward
    pub fn ffill(&self) -> Frame {
        self.map_columns(|col| {
            let mut last = f64::NAN;
            col.iter()
                .map(|&v| {
                    if !v.is_nan() {
                        last = v;
                    }
                    last
                })
                .collect()
        })
    }

    //elementwise multiply on this frame's index and columns;
    //cells the other frame does not cover stay undefined
    pub fn mul(&self, other: &Frame) -> Frame {
        let mut out = Frame::new(self.index.clone());
        for (name, col) in &self.columns {
            let values = self
                .index
                .iter()
                .zip(col.iter())
                .map(|(&t, &v)| v * other.value_at(t, name))
                .collect();
            out.columns.insert(name.clone(), values);
        }
        out
    }

    fn rolling(
        &self,
        window: usize,
        min_periods: usize,
        agg: impl Fn(&[f64]) -> f64,
    ) -> Frame {
        self.map_columns(|col| {
            let mut out = Vec::with_capacity(col.len());
            for i in 0..col.len() {
                let start = (i + 1).saturating_sub(window);
                let defined: Vec<f64> = col[start..=i]
                    .iter()
                    .copied()
                    .filter(|v| !v.is_nan())
                    .collect();
                if defined.len() >= min_periods && !defined.is_empty() {
                    out.push(agg(&defined));
                } else {
                    out.push(f64::NAN);
                }
            }
            out
        })
    }

    pub fn rolling_sum(&self, window: usize, min_periods: usize) -> Frame {
        self.rolling(window, min_periods, |w| w.iter().sum())
    }

    pub fn rolling_mean(&self, window: usize, min_periods: usize) -> Frame {
        self.rolling(window, min_periods, |w| {
            w.iter().sum::<f64>() / w.len() as f64
        })
    }

    //sample standard deviation; needs at least two defined observations
    pub fn rolling_std(&self, window: usize, min_periods: usize) -> Frame {
        self.rolling(window, min_periods.max(2), |w| w.to_vec().std_dev())
    }

    //sum across columns per date, skipping undefined cells
    pub fn row_sum(&self) -> Vec<f64> {
        (0..self.index.len())
            .map(|i| {
                self.columns
                    .values()
                    .map(|col| col[i])
                    .filter(|v| !v.is_nan())
                    .sum()
            })
            .collect()
    }

    //restricts rows to [start, end)
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Frame {
        let keep: Vec<usize> = self
            .index
            .iter()
            .enumerate()
            .filter(|(_, &t)| t >= start && t < end)
            .map(|(i, _)| i)
            .collect();

        let mut out = Frame::new(keep.iter().map(|&i| self.index[i]).collect());
        for (name, col) in &self.columns {
            out.columns
                .insert(name.clone(), keep.iter().map(|&i| col[i]).collect());
        }
        out
    }

    //sums each column into right-closed, right-labeled daily buckets
    pub fn resample_daily_sum(&self) -> Frame {
        let labels: Vec<DateTime<Utc>> = self.index.iter().map(|&t| daily_bucket(t)).collect();

        let mut buckets = labels.clone();
        buckets.dedup();

        let mut out = Frame::new(buckets.clone());
        for (name, col) in &self.columns {
            let mut sums = vec![0.0; buckets.len()];
            let mut bucket_pos = 0usize;
            for (i, &label) in labels.iter().enumerate() {
                while buckets[bucket_pos] != label {
                    bucket_pos += 1;
                }
                if !col[i].is_nan() {
                    sums[bucket_pos] += col[i];
                }
            }
            out.columns.insert(name.clone(), sums);
        }

        out
    }
}

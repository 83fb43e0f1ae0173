use crate::config::ChainSettings;
use crate::data::bar::ContractBar;
use crate::data::series::{ContractSeries, ProductContractSet};
use crate::frame::Frame;
use crate::instrument::ContractCode;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use csv::ReaderBuilder;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct ContractRecord {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open", default)]
    open: Option<f64>,
    #[serde(rename = "High", default)]
    high: Option<f64>,
    #[serde(rename = "Low", default)]
    low: Option<f64>,
    #[serde(rename = "Close", default)]
    close: Option<f64>,
    #[serde(rename = "Settle", default)]
    settle: Option<f64>,
    #[serde(rename = "Volume", default)]
    volume: Option<f64>,
    #[serde(rename = "OI", default)]
    open_interest: Option<f64>,
}

fn to_value(field: Option<f64>) -> f64 {
    field.unwrap_or(f64::NAN)
}

//loads one contract history from a csv file
//rows may arrive in any order; derivation sorts them
pub fn load_contract_csv<P: AsRef<Path>>(
    path: P,
    code: ContractCode,
    settings: &ChainSettings,
) -> Result<ContractSeries> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context(format!("Failed to open CSV file: {:?}", path))?;

    let mut bars = Vec::new();

    for (index, result) in reader.deserialize().enumerate() {
        let record: ContractRecord =
            result.context(format!("Failed to parse CSV record at line {}", index + 2))?;

        let date = NaiveDate::parse_from_str(&record.date, "%Y-%m-%d").context(format!(
            "Failed to parse date '{}' at line {}",
            record.date,
            index + 2
        ))?;

        bars.push(ContractBar::new(
            date,
            to_value(record.open),
            to_value(record.high),
            to_value(record.low),
            to_value(record.close),
            to_value(record.settle),
            to_value(record.volume),
            to_value(record.open_interest),
        ));
    }

    Ok(ContractSeries::from_raw(
        code,
        bars,
        settings.liquidity_window,
        settings.atr_span,
        settings.atr_norm_window,
    ))
}

//loads every contract csv in one product directory
//files are named <code>.csv; a file whose stem is not a valid contract
//code is excluded with a warning and the rest of the product continues
pub fn load_product_dir<P: AsRef<Path>>(
    dir: P,
    symbol: &str,
    settings: &ChainSettings,
) -> Result<ProductContractSet> {
    let dir = dir.as_ref();
    let mut set = ProductContractSet::new(symbol);

    let entries =
        std::fs::read_dir(dir).context(format!("Failed to read product directory: {:?}", dir))?;

    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }

        let stem = match path.file_stem().and_then(|s| s.to_str()) {
            Some(s) => s,
            None => continue,
        };

        let code: ContractCode = match stem.parse() {
            Ok(code) => code,
            Err(err) => {
                warn!(symbol, file = %path.display(), %err, "skipping contract file");
                continue;
            }
        };

        debug!(symbol, contract = %code, "loading contract file");
        let series = load_contract_csv(&path, code, settings)?;
        set.insert(series);
    }

    Ok(set)
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0).unwrap().and_utc()
}

//loads a directory of continuous csv files back into per-product frames
//of their numeric columns; non-numeric columns (contract codes) are skipped
pub fn load_continuous_dir<P: AsRef<Path>>(
    dir: P,
    products: &[String],
) -> Result<IndexMap<String, Frame>> {
    let dir = dir.as_ref();
    let mut results = IndexMap::new();

    let mut files: Vec<_> = std::fs::read_dir(dir)
        .context(format!("Failed to read continuous directory: {:?}", dir))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("csv"))
        .collect();
    files.sort();

    for path in files {
        let sym = match path.file_stem().and_then(|s| s.to_str()) {
            Some(s) => s.to_string(),
            None => continue,
        };
        if !products.is_empty() && !products.contains(&sym) {
            continue;
        }

        debug!(symbol = %sym, file = %path.display(), "loading continuous data");
        let frame = load_frame_csv(&path)?;
        results.insert(sym, frame);
    }

    Ok(results)
}

//loads one date-indexed csv into a frame, keeping every column that
//parses as numeric; empty and non-numeric cells become undefined
pub fn load_frame_csv<P: AsRef<Path>>(path: P) -> Result<Frame> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context(format!("Failed to open CSV file: {:?}", path))?;

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut index = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len().saturating_sub(1)];

    for (line, result) in reader.records().enumerate() {
        let record = result.context(format!("Failed to read CSV record at line {}", line + 2))?;

        let date_field = record
            .get(0)
            .context(format!("Missing date field at line {}", line + 2))?;
        let date = NaiveDate::parse_from_str(date_field, "%Y-%m-%d").context(format!(
            "Failed to parse date '{}' at line {}",
            date_field,
            line + 2
        ))?;
        index.push(midnight(date));

        for (i, column) in columns.iter_mut().enumerate() {
            let cell = record.get(i + 1).unwrap_or("");
            column.push(cell.parse::<f64>().unwrap_or(f64::NAN));
        }
    }

    let mut frame = Frame::new(index);
    for (i, column) in columns.into_iter().enumerate() {
        //drop columns with no numeric content at all (eg contract codes)
        if column.iter().any(|v| !v.is_nan()) {
            frame.insert(headers[i + 1].clone(), column);
        }
    }

    Ok(frame)
}

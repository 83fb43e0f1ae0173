use crate::chain::{CarrySeries, ChainError, ContinuousSeries};
use crate::config::{CarrySettings, ChainSettings};
use crate::data::loader::load_product_dir;
use crate::data::series::ProductContractSet;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use rayon::prelude::*;
use std::path::Path;
use tracing::{error, info};

//lists the product subdirectories of a raw-data directory,
//optionally filtered to an explicit product list
fn product_dirs(rawdir: &Path, products: &[String]) -> Result<Vec<String>> {
    let mut symbols: Vec<String> = std::fs::read_dir(rawdir)
        .context(format!("Failed to read raw data directory: {:?}", rawdir))?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str().map(|s| s.to_string()))
        .filter(|sym| products.is_empty() || products.contains(sym))
        .collect();
    symbols.sort();
    Ok(symbols)
}

//loads every product's contract set in parallel
//a product that fails to load is dropped with an error log; it never
//takes its siblings down
pub fn load_all(
    rawdir: &Path,
    products: &[String],
    settings: &ChainSettings,
) -> Result<IndexMap<String, ProductContractSet>> {
    let symbols = product_dirs(rawdir, products)?;

    let loaded: Vec<(String, Result<ProductContractSet>)> = symbols
        .par_iter()
        .map(|sym| {
            let set = load_product_dir(rawdir.join(sym), sym, settings);
            (sym.clone(), set)
        })
        .collect();

    let mut results = IndexMap::new();
    for (sym, outcome) in loaded {
        match outcome {
            Ok(set) => {
                info!(symbol = %sym, contracts = set.len(), "loaded product");
                results.insert(sym, set);
            }
            Err(err) => error!(symbol = %sym, %err, "failed to load product"),
        }
    }

    Ok(results)
}

//builds the continuous series of every product in parallel,
//collecting per-product outcomes instead of aborting the batch
pub fn chain_all(
    sets: &IndexMap<String, ProductContractSet>,
) -> IndexMap<String, Result<ContinuousSeries, ChainError>> {
    let tasks: Vec<(&String, &ProductContractSet)> = sets.iter().collect();

    let outcomes: Vec<(String, Result<ContinuousSeries, ChainError>)> = tasks
        .par_iter()
        .map(|(sym, set)| ((*sym).clone(), ContinuousSeries::build(set)))
        .collect();

    outcomes.into_iter().collect()
}

//carry-chain variant of the same fan-out
pub fn carry_all(
    sets: &IndexMap<String, ProductContractSet>,
    settings: &CarrySettings,
) -> IndexMap<String, Result<CarrySeries, ChainError>> {
    let tasks: Vec<(&String, &ProductContractSet)> = sets.iter().collect();

    let outcomes: Vec<(String, Result<CarrySeries, ChainError>)> = tasks
        .par_iter()
        .map(|(sym, set)| ((*sym).clone(), CarrySeries::build(set, settings)))
        .collect();

    outcomes.into_iter().collect()
}

//dumps one csv per successfully chained product, in parallel
//returns the number of files written
pub fn dump_continuous(
    outdir: &Path,
    results: &IndexMap<String, Result<ContinuousSeries, ChainError>>,
) -> usize {
    let tasks: Vec<_> = results.iter().collect();
    tasks
        .par_iter()
        .filter_map(|(sym, outcome)| match outcome {
            Ok(series) => {
                let path = outdir.join(format!("{}.csv", sym));
                match series.write_csv(&path) {
                    Ok(()) => {
                        info!(symbol = %sym, file = %path.display(), "dumped continuous");
                        Some(())
                    }
                    Err(err) => {
                        error!(symbol = %sym, %err, "dumping failed");
                        None
                    }
                }
            }
            Err(err) => {
                error!(symbol = %sym, %err, "skipping dump");
                None
            }
        })
        .count()
}

pub fn dump_carry(
    outdir: &Path,
    results: &IndexMap<String, Result<CarrySeries, ChainError>>,
) -> usize {
    let tasks: Vec<_> = results.iter().collect();
    tasks
        .par_iter()
        .filter_map(|(sym, outcome)| match outcome {
            Ok(series) => {
                let path = outdir.join(format!("{}.csv", sym));
                match series.write_csv(&path) {
                    Ok(()) => {
                        info!(symbol = %sym, file = %path.display(), "dumped carry");
                        Some(())
                    }
                    Err(err) => {
                        error!(symbol = %sym, %err, "dumping failed");
                        None
                    }
                }
            }
            Err(err) => {
                error!(symbol = %sym, %err, "skipping dump");
                None
            }
        })
        .count()
}

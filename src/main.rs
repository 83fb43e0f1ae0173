use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use contango::prelude::*;
use contango::{runner, signal, weight};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "contango")]
#[command(about = "A Rust-based continuous futures contract builder and signal backtester", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    //build continuous contracts from raw per-contract files
    Chain {
        //raw data directory, one subdirectory per product
        #[arg(long)]
        rawdir: PathBuf,

        //output directory for continuous csv files
        #[arg(long, default_value = "continuous")]
        outdir: PathBuf,

        //products to process (all when empty)
        #[arg(long, num_args = 0..)]
        products: Vec<String>,

        //rolling window for the liquidity blend
        #[arg(long, default_value = "3")]
        liquidity_window: usize,

        //span of the exponentially-weighted true-range mean
        #[arg(long, default_value = "14")]
        atr_span: usize,

        //settle rolling-mean window used to normalize atr
        #[arg(long, default_value = "5")]
        atr_norm_window: usize,
    },

    //build carry chains with front, main and sec contracts
    Carry {
        //raw data directory, one subdirectory per product
        #[arg(long)]
        rawdir: PathBuf,

        //output directory for carry csv files
        #[arg(long, default_value = "carry")]
        outdir: PathBuf,

        //products to process (all when empty)
        #[arg(long, num_args = 0..)]
        products: Vec<String>,

        //rolling window for the liquidity blend
        #[arg(long, default_value = "2")]
        liquidity_window: usize,

        //minimum liquidity for the front contract
        #[arg(long, default_value = "100")]
        front_threshold: f64,

        //minimum delivery-month gap from main to sec
        #[arg(long, default_value = "3")]
        min_carry_gap: i32,
    },

    //evaluate momentum signals against continuous data
    Backtest {
        //directory of continuous csv files
        #[arg(long)]
        datadir: PathBuf,

        //products to evaluate (all when empty)
        #[arg(long, num_args = 0..)]
        products: Vec<String>,

        //weighting policy (equal, atr, vol)
        #[arg(long, default_value = "atr")]
        weighting: String,

        //risk-budget constant of the inverse weighting policies
        #[arg(long)]
        risk_budget: Option<f64>,

        //slippage per unit of position change, in basis points
        #[arg(long, default_value = "5")]
        slip_bps: f64,

        //window of the rolling realized-vol weighting
        #[arg(long, default_value = "100")]
        vol_window: usize,

        //evaluation window start (inclusive) and end (exclusive)
        #[arg(long)]
        start: Option<NaiveDate>,

        #[arg(long)]
        end: Option<NaiveDate>,

        //momentum lookbacks, in periods
        #[arg(long, num_args = 1.., default_values = ["10", "22", "66", "132"])]
        lookbacks: Vec<usize>,

        //signal smoothing window (0 disables)
        #[arg(long, default_value = "10")]
        smooth: usize,

        //signal lag, in periods
        #[arg(long, default_value = "1")]
        delay: usize,

        //forward-fill the signal before sizing
        #[arg(long)]
        ffill_signal: bool,

        //output path for the portfolio pnl curve csv
        #[arg(long)]
        output_pnl_csv: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chain {
            rawdir,
            outdir,
            products,
            liquidity_window,
            atr_span,
            atr_norm_window,
        } => run_chain(
            rawdir,
            outdir,
            products,
            ChainSettings {
                liquidity_window,
                atr_span,
                atr_norm_window,
            },
        )?,
        Commands::Carry {
            rawdir,
            outdir,
            products,
            liquidity_window,
            front_threshold,
            min_carry_gap,
        } => run_carry(
            rawdir,
            outdir,
            products,
            ChainSettings {
                liquidity_window,
                ..Default::default()
            },
            CarrySettings {
                front_threshold,
                min_carry_gap,
            },
        )?,
        Commands::Backtest {
            datadir,
            products,
            weighting,
            risk_budget,
            slip_bps,
            vol_window,
            start,
            end,
            lookbacks,
            smooth,
            delay,
            ffill_signal,
            output_pnl_csv,
        } => {
            let policy = WeightPolicy::parse(&weighting)
                .ok_or_else(|| anyhow::anyhow!("Unknown weighting policy: {}", weighting))?;

            let settings = BacktestSettings {
                slip_bps,
                weighting: policy,
                risk_budget: risk_budget.unwrap_or(match policy {
                    WeightPolicy::InverseVol => 1.0,
                    _ => 0.05,
                }),
                vol_window,
                start,
                end,
                ffill_signal,
                lookbacks,
                smooth,
                delay,
            };

            run_backtest(datadir, products, settings, output_pnl_csv)?;
        }
    }

    Ok(())
}

fn run_chain(
    rawdir: PathBuf,
    outdir: PathBuf,
    products: Vec<String>,
    settings: ChainSettings,
) -> Result<()> {
    println!("Contango Continuous Futures Builder");
    println!("===================================\n");

    //configuration problems are fatal before any per-product work
    settings.validate()?;

    println!("Loading raw data from {:?}...", rawdir);
    let sets = runner::load_all(&rawdir, &products, &settings)?;

    if sets.is_empty() {
        anyhow::bail!("No products found under {:?}", rawdir);
    }
    println!("Loaded {} product(s)\n", sets.len());

    let results = runner::chain_all(&sets);

    if !outdir.exists() {
        println!("Creating directory {:?} ...", outdir);
        std::fs::create_dir_all(&outdir)
            .context(format!("Failed to create output directory: {:?}", outdir))?;
    }

    let written = runner::dump_continuous(&outdir, &results);
    let failed = results.values().filter(|r| r.is_err()).count();

    println!("Dumped {} continuous file(s) to {:?}", written, outdir);
    if failed > 0 {
        println!("{} product(s) failed, see the log", failed);
    }
    println!("Done.");

    Ok(())
}

fn run_carry(
    rawdir: PathBuf,
    outdir: PathBuf,
    products: Vec<String>,
    chain_settings: ChainSettings,
    carry_settings: CarrySettings,
) -> Result<()> {
    println!("Contango Carry Chain Builder");
    println!("============================\n");

    chain_settings.validate()?;
    carry_settings.validate()?;

    println!("Loading raw data from {:?}...", rawdir);
    let sets = runner::load_all(&rawdir, &products, &chain_settings)?;

    if sets.is_empty() {
        anyhow::bail!("No products found under {:?}", rawdir);
    }
    println!("Loaded {} product(s)\n", sets.len());

    let results = runner::carry_all(&sets, &carry_settings);

    if !outdir.exists() {
        println!("Creating directory {:?} ...", outdir);
        std::fs::create_dir_all(&outdir)
            .context(format!("Failed to create output directory: {:?}", outdir))?;
    }

    let written = runner::dump_carry(&outdir, &results);
    let failed = results.values().filter(|r| r.is_err()).count();

    println!("Dumped {} carry file(s) to {:?}", written, outdir);
    if failed > 0 {
        println!("{} product(s) failed, see the log", failed);
    }
    println!("Done.");

    Ok(())
}

fn run_backtest(
    datadir: PathBuf,
    products: Vec<String>,
    settings: BacktestSettings,
    output_pnl_csv: Option<PathBuf>,
) -> Result<()> {
    println!("Contango Signal Backtester");
    println!("==========================\n");

    settings.validate()?;

    println!("Loading continuous data from {:?}...", datadir);
    let data = load_continuous_dir(&datadir, &products)
        .context(format!("Failed to load continuous data from {:?}", datadir))?;

    if data.is_empty() {
        anyhow::bail!("No continuous data found under {:?}", datadir);
    }
    println!("Loaded {} product(s)", data.len());

    let returns = signal::pnl_frame(&data);
    if returns.is_empty() {
        anyhow::bail!("Continuous data has no usable PnL columns");
    }

    println!(
        "Signal: blended momentum (lookbacks {:?}, smooth {}, delay {})",
        settings.lookbacks, settings.smooth, settings.delay
    );
    let sig = signal::blended_momentum(
        &returns,
        &settings.lookbacks,
        settings.delay,
        settings.smooth,
    );

    println!("Weighting: {:?} (k = {})", settings.weighting, settings.risk_budget);
    let weights = weight::weigh(settings.weighting, &sig, &data, &settings);

    println!("Slippage: {} bps\n", settings.slip_bps);
    println!("Running backtest...\n");

    let engine = BacktestEngine::new(settings);
    let result = engine.run(&sig, &weights, &returns);

    println!("Backtest Results");
    println!("================\n");
    result.summary.pretty_print_table();

    if let Some(pnl_path) = output_pnl_csv {
        save_pnl_csv(&result.curve, &pnl_path)?;
        println!("\nPnL curve saved to {:?}", pnl_path);
    }

    Ok(())
}

fn save_pnl_csv(curve: &[PnlPoint], path: &PathBuf) -> Result<()> {
    use std::io::Write;

    let mut file = std::fs::File::create(path)?;
    writeln!(file, "timestamp,pnl,cum_pnl,drawdown")?;

    for point in curve {
        writeln!(
            file,
            "{},{},{},{}",
            point.timestamp.format("%Y-%m-%d"),
            point.pnl,
            point.cum_pnl,
            point.drawdown
        )?;
    }

    Ok(())
}

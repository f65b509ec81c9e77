//! Train an LSTM on daily prices, forecast tomorrow and backtest
//!
//! Usage:
//! ```bash
//! cargo run --release --bin forecast -- --synthetic --days 365
//! cargo run --release --bin forecast -- --csv data/btc_daily.csv --epochs 100 --save
//! cargo run --release --bin forecast -- --csv data/btc_daily.csv --load --export backtest.csv
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use crypto_forecast::{
    data::{CsvHistory, HistorySource, PricePoint, SyntheticHistory, DAY_MS},
    forecast::{predict_next, Backtester, NormalizationMode},
    model::{Forecaster, ModelConfig},
    persistence::{ModelStore, DEFAULT_MODEL_NAME},
    preprocessing::NormalizationParams,
    system::{benchmark_matmul, CapabilityProbe, CpuProbe},
    training::{EpochProgress, ProgressSink, Trainer},
    utils::{load_json, save_json, save_prices_csv, save_records_csv},
};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Next-day price forecast with an LSTM")]
struct Args {
    /// Daily price history (CSV with timestamp,price columns)
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Use a synthetic random-walk history
    #[arg(long)]
    synthetic: bool,

    /// Daily volatility of the synthetic history
    #[arg(long, default_value = "0.02")]
    volatility: f64,

    /// Days of history to use
    #[arg(long, default_value = "365")]
    days: usize,

    /// Training epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Mini-batch size (tuned to the backend when omitted)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Days of history per prediction
    #[arg(long)]
    window_size: Option<usize>,

    /// Adam learning rate
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Random seed for weights, shuffling and synthetic data
    #[arg(long)]
    seed: Option<u64>,

    /// Model configuration (JSON); command-line flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective configuration to this JSON file
    #[arg(long)]
    dump_config: Option<PathBuf>,

    /// Model store directory
    #[arg(long, default_value = "models")]
    store: PathBuf,

    /// Name of the stored model
    #[arg(long, default_value = DEFAULT_MODEL_NAME)]
    model_name: String,

    /// Load the stored model instead of training
    #[arg(long)]
    load: bool,

    /// Save the trained model to the store
    #[arg(long)]
    save: bool,

    /// Backtest with the training normalization instead of refitting
    #[arg(long)]
    reuse_normalization: bool,

    /// Export backtest records to CSV
    #[arg(long)]
    export: Option<PathBuf>,

    /// Write the price history used for this run to CSV
    #[arg(long)]
    export_history: Option<PathBuf>,

    /// Print backend information and a matmul benchmark
    #[arg(long)]
    system_check: bool,
}

/// Progress bar fed by training epochs
struct BarSink {
    bar: ProgressBar,
}

impl ProgressSink for BarSink {
    fn on_epoch_end(&mut self, progress: &EpochProgress) {
        let val = progress
            .val_loss
            .map(|v| format!(" val_loss {:.6}", v))
            .unwrap_or_default();
        self.bar
            .set_message(format!("{:>3.0}% loss {:.6}{}", progress.percent(), progress.loss, val));
        self.bar.set_position(progress.epoch as u64 + 1);
    }
}

fn build_config(args: &Args) -> Result<ModelConfig> {
    let mut config: ModelConfig = match &args.config {
        Some(path) => load_json(path).with_context(|| format!("reading config {}", path.display()))?,
        None => ModelConfig::default(),
    };

    if let Some(epochs) = args.epochs {
        config.epochs = epochs;
    }
    if let Some(window_size) = args.window_size {
        config.window_size = window_size;
    }
    if let Some(lr) = args.learning_rate {
        config.learning_rate = lr;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }

    let backend = CpuProbe.probe();
    config = match args.batch_size {
        Some(batch_size) => config.with_batch_size(batch_size),
        None => config.tuned_for(&backend),
    };

    config.validate().map_err(anyhow::Error::msg)?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    println!("╔════════════════════════════════════════════════╗");
    println!("║         LSTM Next-Day Price Forecast           ║");
    println!("╚════════════════════════════════════════════════╝\n");

    if args.system_check {
        let backend = CpuProbe.probe();
        println!("Backend: {} ({} threads)", backend.description, backend.threads);
        let bench = benchmark_matmul(256);
        println!(
            "Matmul {}x{}: {:.2} ms, {:.2} GFLOP/s\n",
            bench.size, bench.size, bench.elapsed_ms, bench.gflops
        );
    }

    let config = build_config(&args)?;
    if let Some(path) = &args.dump_config {
        save_json(&config, path)?;
        info!("Wrote configuration to {}", path.display());
    }

    // Price history
    let source: Box<dyn HistorySource> = match &args.csv {
        Some(path) if !args.synthetic => Box::new(CsvHistory::new(path)),
        _ => {
            if !args.synthetic {
                info!("No --csv given, using synthetic data");
            }
            Box::new(
                SyntheticHistory::new(30_000.0)
                    .with_seed(args.seed.unwrap_or(42))
                    .with_volatility(args.volatility),
            )
        }
    };
    info!("Fetching {} days from {}", args.days, source.describe());
    let series = source.fetch(args.days)?;
    let prices = series.prices();
    if let Some(path) = &args.export_history {
        save_prices_csv(series.points(), path)?;
        info!("Wrote {} prices to {}", series.len(), path.display());
    }
    if let (Some(first), Some(last), Some((low, high))) =
        (series.points().first(), series.last(), series.price_range())
    {
        println!(
            "History: {} days ({} .. {}), range ${:.2} .. ${:.2}",
            series.len(),
            first.datetime().format("%Y-%m-%d"),
            last.datetime().format("%Y-%m-%d"),
            low,
            high
        );
    }

    // Model: load or train
    let store = ModelStore::new(&args.store);
    let mut model = Forecaster::new(config.clone());
    let loaded = args.load && store.load(&args.model_name, &mut model);
    if args.load && !loaded {
        warn!("No usable stored model '{}', training a new one", args.model_name);
    }

    let params = if loaded {
        if model.config().window_size != config.window_size {
            warn!(
                "Stored model uses window {}, ignoring --window-size {}",
                model.config().window_size,
                config.window_size
            );
        }
        NormalizationParams::fit(&prices)?
    } else {
        println!("\nTraining ({} epochs, batch {})...", config.epochs, config.batch_size);
        let bar = ProgressBar::new(config.epochs as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        let mut sink = BarSink { bar };

        let trainer = Trainer::new(config.clone());
        let (params, history) = trainer
            .train_into(&mut model, &prices, &mut sink)
            .map_err(|e| {
                sink.bar.abandon();
                if e.is_rejected_input() {
                    error!("Training never started: {}", e);
                }
                e
            })?;
        sink.bar.finish_with_message("done");

        println!(
            "Trained {} parameters in {:.1}s, final loss {:.6}",
            model.num_parameters(),
            history.elapsed_secs,
            history.final_loss().unwrap_or(f64::NAN)
        );
        if let Some(improvement) = history.improvement_pct() {
            println!("Loss improvement: {:.1}%", improvement);
        }

        if args.save {
            let path = store.save(&args.model_name, &model)?;
            println!("Saved model to {}", path.display());
        }
        params
    };

    // Next-day forecast
    let window_size = model.config().window_size;
    let next = predict_next(&model, &prices, &params)?;
    if let Some(last) = series.last() {
        let forecast = PricePoint::new(last.timestamp + DAY_MS, next);
        println!("\nLast price ({}):      ${:.2}", last.datetime().format("%Y-%m-%d"), last.price);
        println!(
            "Forecast ({}):        ${:.2} ({:+.2}%)",
            forecast.datetime().format("%Y-%m-%d"),
            forecast.price,
            forecast.change_pct_from(last)
        );
    }

    // Walk-forward backtest
    let mode = if args.reuse_normalization {
        NormalizationMode::Reuse(params)
    } else {
        NormalizationMode::Refit
    };
    let report = Backtester::new(window_size)
        .with_normalization(mode)
        .evaluate(&model, series.points())?;

    println!("\n═══════════════ Backtest ═══════════════");
    println!("Steps:                {}", report.attempted());
    println!("Skipped:              {}", report.failures.len());
    println!("MAPE:                 {:.2}%", report.metrics.mape);
    println!("RMSE:                 ${:.2}", report.metrics.rmse);
    println!("MAE:                  ${:.2}", report.metrics.mae);
    println!("Direction accuracy:   {:.1}%", report.metrics.directional_accuracy * 100.0);
    if report.degenerate_range {
        println!("(constant history, evaluated with a unit range)");
    }

    println!("\n{:<12} {:>14} {:>14} {:>9}", "Date", "Predicted", "Actual", "Error");
    for record in report.recent() {
        let date = chrono::DateTime::from_timestamp_millis(record.timestamp)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| record.timestamp.to_string());
        println!(
            "{:<12} {:>14.2} {:>14.2} {:>8.2}%",
            date, record.predicted, record.actual, record.error_pct
        );
    }

    if let Some(path) = &args.export {
        save_records_csv(&report.records, path)?;
        println!("\nExported {} records to {}", report.records.len(), path.display());
    }

    Ok(())
}

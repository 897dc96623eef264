use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use log::info;
use serde::Serialize;

use kfp_core::{CandleStore, PipelineConfig, PredictorKind};
use kfp_engine::engine::{FORECAST_SERIES, PRICE_SERIES};
use kfp_engine::{
    DecisionLoop, Metrics, MetricsCalculator, PaperVenue, Replay, ReplaySummary, SeriesRecorder,
    ShadowComparator, ShadowHandler, TickHandler,
};

#[derive(Parser, Debug)]
#[command(name = "kfp-sim", about = "Replay a price series through the Kelly forecast pipeline")]
struct Cli {
    /// Path to CSV price data (timestamp,price or timestamp,open,high,low,close,volume)
    #[arg(long)]
    prices: PathBuf,

    /// Path to TOML config file(s), comma-separated for merge
    #[arg(long, default_value = "config/default.toml")]
    config: String,

    /// Override the configured predictor (spectral or monte_carlo)
    #[arg(long)]
    predictor: Option<String>,

    /// Override the Monte Carlo seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the starting cash
    #[arg(long)]
    initial_cash: Option<f64>,

    /// Fill the window from the first bars instead of warming up on them
    #[arg(long)]
    prime: bool,

    /// Also record both predictors' forecasts every tick without trading on them
    #[arg(long)]
    shadow: bool,

    /// Output file path (stdout if not specified)
    #[arg(long)]
    output_file: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct OutputReport {
    meta: OutputMeta,
    summary: ReplaySummary,
    metrics: Metrics,
    series: SeriesRecorder,
}

#[derive(Debug, Serialize)]
struct OutputMeta {
    price_file: String,
    instrument: String,
    predictor: String,
    total_bars: usize,
    primed_bars: usize,
    elapsed_ms: u128,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let start = Instant::now();

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };

    eprintln!("Loading prices from {:?}...", cli.prices);
    let load_start = Instant::now();
    let candles = match CandleStore::from_csv(&cli.prices) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading prices: {}", e);
            std::process::exit(1);
        }
    };
    eprintln!(
        "Loaded {} bars in {:.1}ms",
        candles.len(),
        load_start.elapsed().as_secs_f64() * 1000.0
    );

    let mut decision_loop = match DecisionLoop::new(&config) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error building decision loop: {}", e);
            std::process::exit(1);
        }
    };

    let primed_bars = if cli.prime {
        let head = candles.slice(0, config.window.capacity);
        match decision_loop.prime(&head) {
            Ok(n) => n,
            Err(e) => {
                eprintln!("Error priming window: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        0
    };

    let points = candles.price_points(config.data.field);
    let predictor = decision_loop.predictor_id().to_string();
    let mut venue = PaperVenue::new(config.instrument.symbol.clone(), config.paper.initial_cash);
    if config.kelly.clamp {
        venue = venue.with_fraction_cap(config.kelly.max_leverage);
    }
    let mut recorder = SeriesRecorder::new();

    let mut shadow;
    let handler: &mut dyn TickHandler = if cli.shadow {
        shadow = ShadowHandler::new(decision_loop, ShadowComparator::new(&config));
        &mut shadow
    } else {
        &mut decision_loop
    };

    eprintln!(
        "Replaying {} ticks for {} with the {} predictor...",
        points.len() - primed_bars,
        config.instrument.symbol,
        predictor
    );
    let run_start = Instant::now();
    let summary = match Replay::new(&points[primed_bars..]).run(handler, &mut venue, &mut recorder)
    {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Replay failed: {}", e);
            std::process::exit(1);
        }
    };
    eprintln!(
        "Replay complete in {:.1}ms",
        run_start.elapsed().as_secs_f64() * 1000.0
    );

    let metrics = MetricsCalculator::calculate(
        venue.equity_curve(),
        recorder.series(PRICE_SERIES).unwrap_or_default(),
        recorder.series(FORECAST_SERIES).unwrap_or_default(),
    );

    let elapsed = start.elapsed();
    let report = OutputReport {
        meta: OutputMeta {
            price_file: cli.prices.display().to_string(),
            instrument: config.instrument.symbol.clone(),
            predictor,
            total_bars: candles.len(),
            primed_bars,
            elapsed_ms: elapsed.as_millis(),
        },
        summary,
        metrics,
        series: recorder,
    };

    // Print human-readable summary to stderr
    print_summary(&report);

    let json = match serde_json::to_string_pretty(&report) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("JSON serialization failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(output_path) = &cli.output_file {
        if let Err(e) = std::fs::write(output_path, &json) {
            eprintln!("Failed to write output file: {}", e);
            std::process::exit(1);
        }
        eprintln!("Results written to {:?}", output_path);
    } else {
        println!("{}", json);
    }

    eprintln!("\nTotal elapsed: {:.1}ms", elapsed.as_secs_f64() * 1000.0);
}

/// Merge the config files, then apply command-line overrides and re-validate.
fn load_config(cli: &Cli) -> Result<PipelineConfig, String> {
    let config_paths: Vec<PathBuf> = cli.config.split(',').map(PathBuf::from).collect();
    let config_refs: Vec<&std::path::Path> = config_paths.iter().map(|p| p.as_path()).collect();
    let mut config = PipelineConfig::from_toml_files(&config_refs).map_err(|e| e.to_string())?;

    if let Some(name) = &cli.predictor {
        config.predictor.kind = match name.as_str() {
            "spectral" | "fft" => PredictorKind::Spectral,
            "monte_carlo" | "mc" => PredictorKind::MonteCarlo,
            unknown => return Err(format!("unknown predictor: {}", unknown)),
        };
    }
    if let Some(seed) = cli.seed {
        config.monte_carlo.seed = seed;
    }
    if let Some(cash) = cli.initial_cash {
        config.paper.initial_cash = cash;
    }

    config.validate().map_err(|e| e.to_string())?;
    info!(
        "config: symbol={} predictor={:?} window={} estimator={:?} clamp={}",
        config.instrument.symbol,
        config.predictor.kind,
        config.window.capacity,
        config.kelly.probability,
        config.kelly.clamp
    );
    Ok(config)
}

fn print_summary(report: &OutputReport) {
    let s = &report.summary;
    let m = &report.metrics;

    eprintln!("\n{}", "=".repeat(80));
    eprintln!("Kelly Forecast Pipeline Results");
    eprintln!("{}", "=".repeat(80));
    eprintln!(
        "Instrument: {} | Predictor: {} | Bars: {} | Elapsed: {}ms",
        report.meta.instrument, report.meta.predictor, report.meta.total_bars, report.meta.elapsed_ms
    );
    eprintln!("{}", "-".repeat(80));
    eprintln!(
        "{:>8} {:>8} {:>8} {:>10} {:>8} {:>8} {:>8}",
        "Ticks", "WarmUp", "Trades", "Fallbacks", "Return", "Sharpe", "MaxDD"
    );
    eprintln!("{}", "-".repeat(80));
    eprintln!(
        "{:>8} {:>8} {:>8} {:>10} {:>7.2}% {:>8.2} {:>7.2}%",
        s.ticks,
        s.warmup_ticks,
        s.trades,
        s.fallbacks,
        m.total_return_pct * 100.0,
        m.sharpe_ratio,
        m.max_drawdown_pct * 100.0,
    );
    eprintln!("{}", "-".repeat(80));
    eprintln!(
        "Forecasts: scored={} MAE={:.4} hit rate={:.1}% | Final value: {:.2}",
        m.forecasts_scored,
        m.forecast_mae,
        m.directional_accuracy * 100.0,
        s.final_value
    );
    eprintln!("{}", "=".repeat(80));
}

//! Terminal clock entry point.
//!
//! Drives a `SteadyTimer` that prints the current local time once per
//! tick, phase-aligned so a one-second clock changes exactly on the
//! second.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;
use tick_common::config::TimerConfig;
use tick_common::unit::Frequency;
use tick_runtime::timer::SteadyTimer;
use tracing::{info, warn};

/// Terminal clock command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "tick-clock",
    about = "Terminal clock driven by a drift-corrected steady timer",
    version,
    long_about = None
)]
struct Args {
    /// Path to a timer configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Tick once per unit, aligned to it (second, minute, hour, day, week).
    #[arg(long, short = 'f', value_name = "UNIT")]
    frequency: Option<String>,

    /// Explicit interval between ticks (humantime, e.g. "250ms", "5s").
    #[arg(long, short = 'i', value_name = "DURATION")]
    interval: Option<String>,

    /// Calendar unit to align the first tick to (overrides config).
    #[arg(long, value_name = "UNIT")]
    align: Option<String>,

    /// Fire the first tick immediately instead of waiting for the boundary.
    #[arg(long)]
    immediate: bool,

    /// Ticks to print before exiting (0 = run until killed).
    #[arg(long, short = 'n', default_value = "0")]
    ticks: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    let mut config = load_config(&args)?;

    if let Some(interval) = &args.interval {
        config.interval = humantime::parse_duration(interval)
            .with_context(|| format!("invalid --interval {interval:?}"))?;
    }
    if let Some(align) = &args.align {
        config.align = Some(
            align
                .parse::<Frequency>()
                .with_context(|| format!("invalid --align {align:?}"))?,
        );
    }
    let frequency = args
        .frequency
        .as_deref()
        .map(|s| {
            s.parse::<Frequency>()
                .with_context(|| format!("invalid --frequency {s:?}"))
        })
        .transpose()?;

    let immediate = args.immediate || config.immediate;

    info!(
        interval = ?config.interval,
        align = ?config.align,
        immediate,
        "Starting clock"
    );

    let (tx, rx) = mpsc::channel();
    let callback = move || {
        if tx.send(chrono::Local::now()).is_err() {
            warn!("tick receiver dropped");
        }
    };

    let mut builder = SteadyTimer::builder(callback).from_config(&config);
    if let Some(unit) = frequency {
        builder = builder.frequency(unit);
    }
    let timer = builder.build().context("invalid timer configuration")?;

    timer.start(immediate);

    let mut printed = 0u64;
    loop {
        let tick = rx.recv().context("timer channel closed")?;
        println!("{}", tick.format("%Y-%m-%d %H:%M:%S%.3f"));
        printed += 1;
        if args.ticks > 0 && printed >= args.ticks {
            break;
        }
    }

    timer.stop();

    if config.metrics.enabled {
        let snapshot = timer.metrics();
        info!(
            ticks = snapshot.total_ticks,
            skipped_intervals = snapshot.skipped_intervals,
            max_lateness_ns = snapshot.max_ns,
            "Clock stopped"
        );
    }

    Ok(())
}

/// Initialize logging with the specified log level.
fn init_logging(level: &str) {
    let filter = format!("tick_clock={level},tick_runtime={level},tick_common={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing source wins):
/// 1. Command-line `--config` argument
/// 2. `TICK_CONFIG_PATH` environment variable
/// 3. Built-in defaults
fn load_config(args: &Args) -> Result<TimerConfig> {
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return TimerConfig::from_file(config_path)
            .with_context(|| format!("failed to load config from {config_path:?}"));
    }

    if let Ok(env_path) = std::env::var("TICK_CONFIG_PATH") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from TICK_CONFIG_PATH");
            return TimerConfig::from_file(&config_path).with_context(|| {
                format!("failed to load config from TICK_CONFIG_PATH={env_path:?}")
            });
        }
        warn!(
            path = %env_path,
            "TICK_CONFIG_PATH set but file does not exist, using defaults"
        );
    }

    Ok(TimerConfig::default())
}

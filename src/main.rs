use anyhow::Context;
use clap::{Parser, ValueEnum};
use sol_price_feed::{
    config::{
        load_dotenv, AccountSourceConfig, HermesSourceConfig, JupiterSourceConfig, PollerConfig,
        StartPolicy,
    },
    constants::{DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS},
    logging::{init_logging, LogFormat},
    sink::{ConsoleSink, ReportFormat},
    sources::{HermesSource, JupiterSource, PythAccountSource},
    Poller, PriceSource, StepConfig,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceKind {
    /// On-chain Pyth price account via Solana RPC
    PythAccount,
    /// Pyth Hermes price service
    Hermes,
    /// Jupiter price API (needs JUP_API_KEY)
    Jupiter,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Pretty,
    Json,
}

/// Poll the SOL/USD price and print it every interval
#[derive(Debug, Parser)]
#[command(name = "sol-price-feed", version, about)]
struct Cli {
    /// Price source to poll
    #[arg(value_enum)]
    source: SourceKind,

    /// Milliseconds between polls
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    interval_ms: u64,

    /// Upper bound for a single fetch in milliseconds
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_MS)]
    fetch_timeout_ms: u64,

    /// Wait one interval before the first poll
    #[arg(long)]
    delay_first_tick: bool,

    /// Price report format on stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,

    /// Track price moves in fixed USD steps of this size
    #[arg(long, conflicts_with = "step_percent")]
    step_usd: Option<f64>,

    /// Track price moves in steps of this percentage of the last anchor price
    #[arg(long)]
    step_percent: Option<f64>,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn build_source(kind: SourceKind) -> anyhow::Result<Arc<dyn PriceSource>> {
    let source: Arc<dyn PriceSource> = match kind {
        SourceKind::PythAccount => Arc::new(PythAccountSource::new(
            AccountSourceConfig::from_env().context("invalid pyth-account configuration")?,
        )?),
        SourceKind::Hermes => Arc::new(HermesSource::new(
            HermesSourceConfig::from_env().context("invalid hermes configuration")?,
        )?),
        SourceKind::Jupiter => Arc::new(JupiterSource::new(
            JupiterSourceConfig::from_env().context("invalid jupiter configuration")?,
        )?),
    };
    Ok(source)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let env_file = load_dotenv()?;

    let log_format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_logging(&cli.log_level, log_format)?;
    if let Some(path) = env_file {
        tracing::debug!(path = %path.display(), "Loaded env file");
    }

    let config = PollerConfig {
        interval: Duration::from_millis(cli.interval_ms),
        fetch_timeout: Duration::from_millis(cli.fetch_timeout_ms),
        start: if cli.delay_first_tick {
            StartPolicy::AfterInterval
        } else {
            StartPolicy::Immediate
        },
        step: match (cli.step_usd, cli.step_percent) {
            (Some(usd), _) => Some(StepConfig::fixed_usd(usd)),
            (None, Some(percent)) => Some(StepConfig::percentage(percent / 100.0)),
            (None, None) => None,
        },
    };
    config.validate()?;

    let source = build_source(cli.source)?;
    let sink = Arc::new(ConsoleSink::stdout(match cli.format {
        OutputFormat::Pretty => ReportFormat::Pretty,
        OutputFormat::Json => ReportFormat::Json,
    }));

    let handle = Poller::new(source, sink, config).start();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    let metrics = handle.stop().await;
    tracing::info!(
        source = %metrics.source_name,
        total_cycles = metrics.total_cycles,
        failed_cycles = metrics.failed_cycles(),
        success_rate = metrics.success_rate,
        latency_p50_ms = metrics.latency_p50_ms,
        latency_p99_ms = metrics.latency_p99_ms,
        "Shut down"
    );

    Ok(())
}

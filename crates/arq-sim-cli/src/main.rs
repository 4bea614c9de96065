use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, info};

use arq_abstract::{LinkConfig, SenderConfig};
use arq_core::source::DEFAULT_CHUNK_SIZE;
use arq_core::{ArqSender, PatternSource};
use arq_simulator::{SimulatedLink, SimulationReport, scenario_runner};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run the ARQ sender against a simulated lossy link")]
struct Args {
    /// Load a scenario from disk. Link and sender flags are ignored.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// TOML file with sender settings.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    window_size: Option<u32>,
    #[arg(long)]
    probe_frequency: Option<u32>,
    /// Initial retransmission timeout in seconds.
    #[arg(long)]
    initial_timeout: Option<f64>,
    #[arg(long)]
    total_packets: Option<u32>,

    #[arg(long, default_value_t = 0.1)]
    loss_rate: f64,
    #[arg(long, default_value_t = 0.1)]
    ack_loss_rate: f64,
    #[arg(long, default_value_t = 0.0)]
    corrupt_rate: f64,
    #[arg(long, default_value_t = 0.0)]
    duplicate_rate: f64,
    /// Milliseconds.
    #[arg(long, default_value_t = 10)]
    min_latency: u64,
    /// Milliseconds.
    #[arg(long, default_value_t = 100)]
    max_latency: u64,
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Write a JSON report of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,

    /// Raise sender verbosity one level per occurrence, up to 3.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    info!("arq-sim-cli starting…");

    let report = if let Some(path) = &args.scenario {
        scenario_runner::run_scenario(path).await?
    } else {
        run_default_sim(&args).await?
    };

    let session = &report.session;
    info!(
        "{} packets in {:.4} s of virtual time: {} transmissions, {} retransmissions, {} timeouts",
        session.total_packets,
        session.elapsed,
        session.transmissions,
        session.retransmissions,
        session.timeouts
    );

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

impl Args {
    fn sender_config(&self) -> Result<SenderConfig> {
        let mut config = match &self.config {
            Some(path) => load_sender_config(path)?,
            None => SenderConfig::default(),
        };
        if let Some(v) = self.window_size {
            config.window_size = v;
        }
        if let Some(v) = self.probe_frequency {
            config.probe_frequency = v;
        }
        if let Some(v) = self.initial_timeout {
            config.initial_timeout = v;
        }
        if let Some(v) = self.total_packets {
            config.total_packets = v;
        }
        if self.verbose > 0 {
            config.verbosity = config.verbosity.raised(self.verbose);
        }
        Ok(config)
    }

    fn link_config(&self) -> LinkConfig {
        LinkConfig {
            loss_rate: self.loss_rate,
            ack_loss_rate: self.ack_loss_rate,
            corrupt_rate: self.corrupt_rate,
            duplicate_rate: self.duplicate_rate,
            min_latency: self.min_latency,
            max_latency: self.max_latency,
            seed: self.seed,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = if verbose >= 3 {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

async fn run_default_sim(args: &Args) -> Result<SimulationReport> {
    let config = args.sender_config()?;
    let link = SimulatedLink::new(args.link_config());
    let source = PatternSource::new(DEFAULT_CHUNK_SIZE, args.seed);

    info!("Starting headless simulation…");
    let mut sender = ArqSender::new(config, link, Box::new(source))?;
    let report = scenario_runner::drive(&mut sender, None).await?;
    info!("Simulation complete.");
    Ok(report)
}

fn load_sender_config(path: &Path) -> Result<SenderConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&content).context("Failed to parse sender config")
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}

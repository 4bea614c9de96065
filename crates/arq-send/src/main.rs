use anyhow::{Context, Result, ensure};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, info};

use arq_abstract::packet::HEADER_LEN;
use arq_abstract::{DataSource, SenderConfig};
use arq_core::source::DEFAULT_CHUNK_SIZE;
use arq_core::trace::DEFAULT_COLUMNS;
use arq_core::{ArqSender, ChunkSource, CsvTrace, PatternSource, SessionReport, UdpLink};

/// Largest UDP payload minus the data header.
const MAX_PAYLOAD: usize = 65_507 - HEADER_LEN;

#[derive(Parser, Debug)]
#[command(author, version, about = "Send a transfer to a UDP receiver with sliding-window ARQ")]
struct Args {
    /// Receiver host name or address.
    host: String,
    /// Receiver UDP port.
    port: u16,

    /// TOML file with sender settings; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    window_size: Option<u32>,
    /// Time every n-th packet for the adaptive timeout.
    #[arg(short, long)]
    probe_frequency: Option<u32>,
    /// Initial retransmission timeout in seconds.
    #[arg(short = 't', long)]
    initial_timeout: Option<f64>,
    /// Number of packets to send. Defaults to the chunk count of --file.
    #[arg(short = 'n', long)]
    total_packets: Option<u32>,
    /// Payload bytes per packet.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    payload_size: usize,

    /// Send the contents of this file instead of generated payloads.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// CSV log of every fresh ack.
    #[arg(long, default_value = "client_saw_packets.csv")]
    trace: PathBuf,

    /// Write the session report as JSON.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Raise verbosity one level per occurrence, up to 3.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    ensure!(
        (1..=MAX_PAYLOAD).contains(&args.payload_size),
        "payload size must be between 1 and {MAX_PAYLOAD} bytes"
    );

    let source: Box<dyn DataSource> = match &args.file {
        Some(path) => Box::new(
            ChunkSource::from_file(path, args.payload_size)
                .with_context(|| format!("Failed to read input file {}", path.display()))?,
        ),
        None => Box::new(PatternSource::new(args.payload_size, 0)),
    };
    let config = args.sender_config(source.chunk_count())?;
    config.validate().context("Invalid sender configuration")?;

    let link = UdpLink::connect(&args.host, args.port)
        .await
        .with_context(|| format!("Failed to set up socket for {}:{}", args.host, args.port))?;
    info!("Sending UDP packets to {}", link.peer_addr());

    let trace = CsvTrace::create(
        &args.trace,
        "Log of all packets sent and ACKs received by client",
        &DEFAULT_COLUMNS,
    )
    .with_context(|| format!("Failed to create trace file {}", args.trace.display()))?;

    let mut sender = ArqSender::new(config, link, source)?.with_trace(Box::new(trace));
    let report = sender.run().await.context("Transfer aborted")?;

    if let Some(path) = &args.report {
        write_report(path, &report)?;
    }
    Ok(())
}

impl Args {
    fn sender_config(&self, chunk_count: Option<u32>) -> Result<SenderConfig> {
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
        if let Some(v) = self.total_packets.or(chunk_count) {
            config.total_packets = v;
        }
        if self.verbose > 0 {
            config.verbosity = config.verbosity.raised(self.verbose);
        }
        Ok(config)
    }
}

fn init_logging(verbose: u8) {
    let level = if verbose >= 3 {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn load_sender_config(path: &Path) -> Result<SenderConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&content).context("Failed to parse sender config")
}

fn write_report(path: &Path, report: &SessionReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize session report")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write report file {}", path.display()))?;
    info!("Wrote session report to {}", path.display());
    Ok(())
}

use anyhow::{Context, Result, anyhow, bail};
use arq_abstract::{
    Ack, LinkConfig, SenderConfig, TestAction, TestAssertion, TestScenario, Verbosity,
};
use arq_core::source::DEFAULT_CHUNK_SIZE;
use arq_core::{ArqSender, PatternSource, SenderState};
use bytes::Bytes;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::engine::SimulatedLink;
use crate::report::SimulationReport;

/// Virtual-time budget when a scenario carries no `max_duration` assertion.
const DEFAULT_MAX_DURATION_MS: u64 = 600_000;

pub fn load_scenario(path: impl AsRef<Path>) -> Result<TestScenario> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    parse_scenario(&content)
}

pub fn parse_scenario(content: &str) -> Result<TestScenario> {
    toml::from_str(content).context("Failed to parse scenario")
}

pub async fn run_scenario(path: impl AsRef<Path>) -> Result<SimulationReport> {
    let scenario = load_scenario(path)?;
    run_test_scenario(&scenario).await
}

/// Sender settings for a scenario. Scenarios are quiet unless they ask
/// for a verbosity level.
pub fn scenario_sender_config(scenario: &TestScenario) -> SenderConfig {
    let mut config = SenderConfig {
        verbosity: Verbosity::QUIET,
        ..Default::default()
    };
    scenario.sender.apply_to(&mut config);
    config
}

/// Build the simulated link with the scenario's overrides and scripted faults.
pub fn scenario_link(scenario: &TestScenario) -> SimulatedLink {
    let mut config = LinkConfig::default();
    scenario.link.apply_to(&mut config);
    let mut link = SimulatedLink::new(config);

    for action in &scenario.actions {
        match action {
            TestAction::DropNextData { seqno } => link.add_drop_data_once(*seqno),
            TestAction::DropNextAck { ackno } => link.add_drop_ack_once(*ackno),
            TestAction::InjectAck {
                time_ms,
                ackno,
                magic,
            } => {
                let mut ack = Ack::new(*ackno);
                if let Some(magic) = magic {
                    ack.magic = *magic;
                }
                link.inject_to_sender(Duration::from_millis(*time_ms), ack.encode());
            }
            TestAction::InjectRaw { time_ms, bytes } => {
                link.inject_to_sender(
                    Duration::from_millis(*time_ms),
                    Bytes::copy_from_slice(bytes),
                );
            }
        }
    }
    link
}

pub async fn run_test_scenario(scenario: &TestScenario) -> Result<SimulationReport> {
    info!("Running Scenario: {}", scenario.name);
    info!("Description: {}", scenario.description);

    let config = scenario_sender_config(scenario);
    let link = scenario_link(scenario);
    let source = PatternSource::new(DEFAULT_CHUNK_SIZE, link.config().seed);
    let mut sender = ArqSender::new(config, link, Box::new(source))?;

    let max_duration = scenario
        .assertions
        .iter()
        .find_map(|a| {
            if let TestAssertion::MaxDuration { ms } = a {
                Some(*ms)
            } else {
                None
            }
        })
        .unwrap_or(DEFAULT_MAX_DURATION_MS);

    let report = drive(&mut sender, Some(Duration::from_millis(max_duration))).await?;
    check_assertions(&scenario.assertions, &report)?;

    info!("Test Scenario Passed!");
    Ok(report)
}

/// Step `sender` to completion, tracking the window span after every step.
/// Fails if the virtual clock passes `limit`.
pub async fn drive(
    sender: &mut ArqSender<SimulatedLink>,
    limit: Option<Duration>,
) -> Result<SimulationReport> {
    let mut max_window_span = 0;
    loop {
        let state = sender.step().await.context("Sender aborted")?;
        let window = sender.window();
        max_window_span = max_window_span.max(window.next_seqno() - window.base());
        if let Some(limit) = limit
            && sender.link().current_time() > limit
        {
            bail!("Test timed out after {} ms", limit.as_millis());
        }
        if state == SenderState::Done {
            break;
        }
    }

    let mut report = sender.link().export_report(sender.report());
    report.max_window_span = max_window_span;
    Ok(report)
}

pub fn check_assertions(assertions: &[TestAssertion], report: &SimulationReport) -> Result<()> {
    let session = &report.session;
    for assertion in assertions {
        match assertion {
            TestAssertion::AllAcknowledged => {
                if session.acks_received != session.total_packets
                    || report.distinct_delivered != session.total_packets
                {
                    return Err(anyhow!(
                        "Assertion Failed: {} of {} packets acknowledged ({} delivered)",
                        session.acks_received,
                        session.total_packets,
                        report.distinct_delivered
                    ));
                }
            }
            TestAssertion::DataPacketCount { min, max } => {
                check_range("Data packet count", report.data_packets_sent, *min, *max)?;
            }
            TestAssertion::RetransmissionCount { min, max } => {
                check_range("Retransmission count", session.retransmissions, *min, *max)?;
            }
            TestAssertion::MalformedAcks { min } => {
                if session.malformed_acks < *min {
                    return Err(anyhow!(
                        "Assertion Failed: {} malformed acks discarded, expected min {}",
                        session.malformed_acks,
                        min
                    ));
                }
            }
            TestAssertion::MaxWindowSpan { max } => {
                if report.max_window_span > *max {
                    return Err(anyhow!(
                        "Assertion Failed: Window span reached {}, expected max {}",
                        report.max_window_span,
                        max
                    ));
                }
            }
            TestAssertion::MaxDuration { .. } => {} // Already checked
        }
    }
    Ok(())
}

fn check_range(what: &str, value: u32, min: u32, max: Option<u32>) -> Result<()> {
    if value < min {
        bail!("Assertion Failed: {what} {value}, expected min {min}");
    }
    if let Some(max) = max
        && value > max
    {
        bail!("Assertion Failed: {what} {value}, expected max {max}");
    }
    Ok(())
}

//! Deterministic, virtual-time harness for the ARQ sender: a lossy link with
//! an acking receiver on the far end, plus TOML-described test scenarios.

pub mod engine;
pub mod report;
pub mod scenario_runner;

pub use engine::{AckReceiver, NodeId, SimulatedLink};
pub use report::{LinkEventSummary, SimulationReport};

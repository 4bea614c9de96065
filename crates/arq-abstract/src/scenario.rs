use crate::config::{LinkConfig, SenderConfig, Verbosity};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub link: LinkConfigOverride,
    #[serde(default)]
    pub sender: SenderConfigOverride,
    #[serde(default)]
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct LinkConfigOverride {
    pub loss_rate: Option<f64>,
    pub ack_loss_rate: Option<f64>,
    pub corrupt_rate: Option<f64>,
    pub duplicate_rate: Option<f64>,
    pub min_latency: Option<u64>,
    pub max_latency: Option<u64>,
    pub seed: Option<u64>,
}

impl LinkConfigOverride {
    pub fn apply_to(&self, config: &mut LinkConfig) {
        if let Some(v) = self.loss_rate {
            config.loss_rate = v;
        }
        if let Some(v) = self.ack_loss_rate {
            config.ack_loss_rate = v;
        }
        if let Some(v) = self.corrupt_rate {
            config.corrupt_rate = v;
        }
        if let Some(v) = self.duplicate_rate {
            config.duplicate_rate = v;
        }
        if let Some(v) = self.min_latency {
            config.min_latency = v;
        }
        if let Some(v) = self.max_latency {
            config.max_latency = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SenderConfigOverride {
    pub window_size: Option<u32>,
    pub probe_frequency: Option<u32>,
    pub initial_timeout: Option<f64>,
    pub smoothing_factor: Option<f64>,
    pub min_timeout: Option<f64>,
    pub verbosity: Option<u8>,
    pub total_packets: Option<u32>,
    pub max_consecutive_timeouts: Option<u32>,
    pub compact_ledger: Option<bool>,
}

impl SenderConfigOverride {
    pub fn apply_to(&self, config: &mut SenderConfig) {
        if let Some(v) = self.window_size {
            config.window_size = v;
        }
        if let Some(v) = self.probe_frequency {
            config.probe_frequency = v;
        }
        if let Some(v) = self.initial_timeout {
            config.initial_timeout = v;
        }
        if let Some(v) = self.smoothing_factor {
            config.smoothing_factor = v;
        }
        if let Some(v) = self.min_timeout {
            config.min_timeout = v;
        }
        if let Some(v) = self.verbosity {
            config.verbosity = Verbosity(v);
        }
        if let Some(v) = self.total_packets {
            config.total_packets = v;
        }
        if let Some(v) = self.max_consecutive_timeouts {
            config.max_consecutive_timeouts = Some(v);
        }
        if let Some(v) = self.compact_ledger {
            config.compact_ledger = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Deterministically drop the first transmission of the data packet with this seqno
    DropNextData { seqno: u32 },
    /// Deterministically drop the first ack the receiver sends for this ackno
    DropNextAck { ackno: u32 },
    /// Deliver a forged ack to the sender at a specific time
    InjectAck {
        time_ms: u64,
        ackno: u32,
        magic: Option<u32>,
    },
    /// Deliver arbitrary bytes to the sender at a specific time
    InjectRaw { time_ms: u64, bytes: Vec<u8> },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// Every sequence number of the transfer was acknowledged
    AllAcknowledged,
    /// Total data datagrams handed to the link, retransmissions included
    DataPacketCount { min: u32, max: Option<u32> },
    /// Number of timeout-driven retransmissions
    RetransmissionCount { min: u32, max: Option<u32> },
    /// At least this many acks were discarded as malformed
    MalformedAcks { min: u32 },
    /// The session finished within this much virtual time
    MaxDuration { ms: u64 },
    /// `next_seqno - base` never exceeded this after any step
    MaxWindowSpan { max: u32 },
}

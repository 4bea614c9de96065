use arq_abstract::LinkConfig;
use arq_core::SessionReport;
use serde::Serialize;

/// Summary of a single link event for timeline visualisation.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEventSummary {
    pub time_ms: u64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub link: LinkConfig,
    pub duration_ms: u64,
    pub data_packets_sent: u32,
    pub acks_sent: u32,
    pub distinct_delivered: u32,
    pub duplicate_deliveries: u32,
    pub rejected_at_receiver: u32,
    /// Largest `next_seqno - base` observed between sender steps.
    pub max_window_span: u32,
    pub session: SessionReport,
    pub link_events: Vec<LinkEventSummary>,
}

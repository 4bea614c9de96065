use crate::report::{LinkEventSummary, SimulationReport};
use arq_abstract::{DatagramLink, LinkConfig, TransportError, decode_data, encode_ack};
use arq_core::SessionReport;
use bytes::{Bytes, BytesMut};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Sender,
    Receiver,
}

impl NodeId {
    pub fn peer(&self) -> Self {
        match self {
            NodeId::Sender => NodeId::Receiver,
            NodeId::Receiver => NodeId::Sender,
        }
    }
}

#[derive(Debug)]
struct Event {
    time: Duration,
    to: NodeId,
    datagram: Bytes,
    id: u64, // Unique ID to differentiate events at same time
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison for time: smallest time is Greater in BinaryHeap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Receiver test double: acks every data packet carrying the right magic
/// with its own seqno and remembers what it has seen.
#[derive(Debug, Default)]
pub struct AckReceiver {
    pub delivered: BTreeSet<u32>,
    pub duplicates: u32,
    pub rejected: u32,
}

impl AckReceiver {
    /// Returns the ackno to send back, if any.
    fn on_datagram(&mut self, datagram: &[u8]) -> Option<u32> {
        let packet = match decode_data(datagram) {
            Ok(p) if p.header.is_valid() => p,
            _ => {
                self.rejected += 1;
                return None;
            }
        };
        if !self.delivered.insert(packet.seqno()) {
            self.duplicates += 1;
        }
        Some(packet.seqno())
    }
}

/// Lossy datagram channel over virtual time, with an [`AckReceiver`] on the
/// far end. Time only advances while the sender waits in `recv_timeout`.
pub struct SimulatedLink {
    time: Duration,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,

    config: LinkConfig,
    rng: StdRng,

    pub receiver: AckReceiver,

    /// (time, seqno) of every data datagram the sender handed over.
    pub transmissions: Vec<(Duration, u32)>,
    pub acks_sent: u32,

    // Deterministic fault injection: drop first data packet with given seqno
    drop_data_once: Vec<u32>,
    // Deterministic fault injection: drop first ACK with given ackno
    drop_ack_once: Vec<u32>,

    /// Timeline of link events (drops, corruptions, sends, deliveries).
    pub link_events: Vec<LinkEventSummary>,
}

impl SimulatedLink {
    pub fn new(config: LinkConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);

        Self {
            time: Duration::ZERO,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            config,
            rng,
            receiver: AckReceiver::default(),
            transmissions: Vec::new(),
            acks_sent: 0,
            drop_data_once: Vec::new(),
            drop_ack_once: Vec::new(),
            link_events: Vec::new(),
        }
    }

    /// Register a deterministic fault: drop the next data packet whose seqno equals `seqno`.
    pub fn add_drop_data_once(&mut self, seqno: u32) {
        self.drop_data_once.push(seqno);
    }

    /// Register a deterministic fault: drop the next ack whose ackno equals `ackno`.
    pub fn add_drop_ack_once(&mut self, ackno: u32) {
        self.drop_ack_once.push(ackno);
    }

    /// Deliver `datagram` to the sender at `time`, bypassing the channel.
    pub fn inject_to_sender(&mut self, time: Duration, datagram: Bytes) {
        self.push_event(time, NodeId::Sender, datagram);
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn current_time(&self) -> Duration {
        self.time
    }

    /// How many times the sender transmitted `seqno`.
    pub fn transmissions_of(&self, seqno: u32) -> usize {
        self.transmissions.iter().filter(|&&(_, s)| s == seqno).count()
    }

    pub fn export_report(&self, session: SessionReport) -> SimulationReport {
        SimulationReport {
            link: self.config.clone(),
            duration_ms: self.time.as_millis() as u64,
            data_packets_sent: self.transmissions.len() as u32,
            acks_sent: self.acks_sent,
            distinct_delivered: self.receiver.delivered.len() as u32,
            duplicate_deliveries: self.receiver.duplicates,
            rejected_at_receiver: self.receiver.rejected,
            max_window_span: 0,
            session,
            link_events: self.link_events.clone(),
        }
    }

    fn push_event(&mut self, time: Duration, to: NodeId, datagram: Bytes) {
        self.event_queue.push(Event {
            time,
            to,
            datagram,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    fn note(&mut self, description: String) {
        debug!("{}", description);
        self.link_events.push(LinkEventSummary {
            time_ms: self.time.as_millis() as u64,
            description,
        });
    }

    fn roll(&mut self, rate: f64) -> bool {
        rate > 0.0 && self.rng.random::<f64>() < rate
    }

    fn latency(&mut self) -> Duration {
        let min = self.config.min_latency;
        let max = self.config.max_latency.max(min);
        Duration::from_millis(self.rng.random_range(min..=max))
    }

    /// Channel logic for one datagram leaving `from`.
    fn transmit(&mut self, from: NodeId, number: u32, datagram: Bytes) {
        let to = from.peer();

        let once = match from {
            NodeId::Sender => &mut self.drop_data_once,
            NodeId::Receiver => &mut self.drop_ack_once,
        };
        if let Some(pos) = once.iter().position(|n| *n == number) {
            once.remove(pos);
            self.note(format!("[{from:?}->{to:?}] DROP (deterministic) #{number}"));
            return;
        }

        // 1. Check Loss
        let loss = match from {
            NodeId::Sender => self.config.loss_rate,
            NodeId::Receiver => self.config.ack_loss_rate,
        };
        if self.roll(loss) {
            self.note(format!("[{from:?}->{to:?}] DROP (random loss) #{number}"));
            return;
        }

        // 2. Check Corruption: damage the magic so the far end rejects it
        let mut datagram = datagram;
        if self.roll(self.config.corrupt_rate) {
            let mut damaged = BytesMut::from(&datagram[..]);
            if let Some(first) = damaged.first_mut() {
                *first ^= 0xFF;
            }
            datagram = damaged.freeze();
            self.note(format!("[{from:?}->{to:?}] CORRUPT #{number}"));
        }

        // 3. Duplication
        let copies = if self.roll(self.config.duplicate_rate) {
            self.note(format!("[{from:?}->{to:?}] DUPLICATE #{number}"));
            2
        } else {
            1
        };

        for _ in 0..copies {
            let latency = self.latency();
            self.note(format!(
                "[{from:?}->{to:?}] SEND #{number} (latency={}ms)",
                latency.as_millis()
            ));
            self.push_event(self.time + latency, to, datagram.clone());
        }
    }

    /// Run the receiver until a datagram for the sender is due no later than
    /// `deadline`.
    fn deliver_until(&mut self, deadline: Duration) -> Option<Bytes> {
        while self.event_queue.peek().is_some_and(|e| e.time <= deadline) {
            let event = self.event_queue.pop()?;
            self.time = event.time;
            match event.to {
                NodeId::Sender => return Some(event.datagram),
                NodeId::Receiver => {
                    if let Some(ackno) = self.receiver.on_datagram(&event.datagram) {
                        self.acks_sent += 1;
                        self.transmit(NodeId::Receiver, ackno, encode_ack(ackno));
                    } else {
                        self.note("[Receiver] REJECT datagram with bad header".to_string());
                    }
                }
            }
        }
        None
    }
}

impl DatagramLink for SimulatedLink {
    async fn send(&mut self, datagram: Bytes) -> Result<(), TransportError> {
        let seqno = decode_data(&datagram).map(|p| p.seqno()).unwrap_or_default();
        self.transmissions.push((self.time, seqno));
        self.transmit(NodeId::Sender, seqno, datagram);
        Ok(())
    }

    async fn recv_timeout(&mut self, timeout: Duration) -> Result<Bytes, TransportError> {
        let deadline = self.time + timeout;
        match self.deliver_until(deadline) {
            Some(datagram) => Ok(datagram),
            None => {
                self.time = deadline;
                Err(TransportError::Timeout)
            }
        }
    }

    fn now(&self) -> Duration {
        self.time
    }
}

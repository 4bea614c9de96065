//! Sliding-window ARQ sender.
//!
//! ```text
//!  FillingInitialWindow ──▶ SteadyState ──▶ Draining ──▶ Done
//!   send 0..N            wait ≤ timeout   all seqnos    base == total
//!                        ack / timeout    sent once
//! ```
//!
//! Each round waits on the link for at most the current adaptive timeout.
//! A fresh ack may slide the window and release new sequence numbers; a round
//! that ends without a valid ack retransmits only the packet at `base`.
//! Malformed and out-of-range acks are dropped without touching any state.

use arq_abstract::{
    DataPacket, DataSource, DatagramLink, SenderConfig, TraceRecord, TraceSink, TransportError,
    decode_ack,
};
use bytes::Bytes;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::error::SenderError;
use crate::rtt::RttEstimator;
use crate::window::{AckOutcome, WindowTracker};

/// Logs at `info` when the configured verbosity asks for it, `trace` otherwise.
macro_rules! verbose {
    ($shown:expr, $($arg:tt)+) => {
        if $shown {
            info!($($arg)+)
        } else {
            trace!($($arg)+)
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SenderState {
    FillingInitialWindow,
    SteadyState,
    Draining,
    Done,
}

/// Summary of a finished (or aborted) session. Times are in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionReport {
    pub elapsed: f64,
    pub total_packets: u32,
    /// Data datagrams handed to the link, retransmissions included.
    pub transmissions: u32,
    pub retransmissions: u32,
    pub timeouts: u32,
    pub acks_received: u32,
    pub duplicate_acks: u32,
    pub malformed_acks: u32,
    pub out_of_range_acks: u32,
    pub rtt_samples: u32,
    pub final_timeout: f64,
}

/// What a handled datagram means for the current wait.
enum Round {
    /// Nothing usable arrived; keep waiting out the same deadline.
    Continue,
    /// The peer answered; the next wait gets a fresh timeout.
    Restart,
}

pub struct ArqSender<L> {
    config: SenderConfig,
    link: L,
    source: Box<dyn DataSource>,
    trace: Option<Box<dyn TraceSink>>,
    window: WindowTracker,
    rtt: RttEstimator,
    state: SenderState,
    report: SessionReport,
    consecutive_timeouts: u32,
    started_at: Duration,
    deadline: Option<Duration>,
}

impl<L: DatagramLink> ArqSender<L> {
    pub fn new(
        config: SenderConfig,
        link: L,
        source: Box<dyn DataSource>,
    ) -> Result<Self, SenderError> {
        config.validate()?;
        let window = WindowTracker::new(config.window_size);
        let rtt = RttEstimator::new(
            config.probe_frequency,
            config.initial_timeout,
            config.smoothing_factor,
            config.min_timeout,
        );
        let report = SessionReport {
            total_packets: config.total_packets,
            final_timeout: rtt.timeout_secs(),
            ..Default::default()
        };
        Ok(Self {
            config,
            link,
            source,
            trace: None,
            window,
            rtt,
            state: SenderState::FillingInitialWindow,
            report,
            consecutive_timeouts: 0,
            started_at: Duration::ZERO,
            deadline: None,
        })
    }

    pub fn with_trace(mut self, trace: Box<dyn TraceSink>) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn window(&self) -> &WindowTracker {
        &self.window
    }

    pub fn rtt(&self) -> &RttEstimator {
        &self.rtt
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Counters so far; `elapsed` is measured up to now.
    pub fn report(&self) -> SessionReport {
        SessionReport {
            elapsed: (self.link.now().saturating_sub(self.started_at)).as_secs_f64(),
            rtt_samples: self.rtt.samples(),
            final_timeout: self.rtt.timeout_secs(),
            ..self.report.clone()
        }
    }

    /// Drive the session until every sequence number is acknowledged.
    pub async fn run(&mut self) -> Result<SessionReport, SenderError> {
        while self.step().await? != SenderState::Done {}
        Ok(self.report())
    }

    /// Advance the state machine by one round: the initial window fill, or
    /// one bounded wait plus whatever it triggers.
    pub async fn step(&mut self) -> Result<SenderState, SenderError> {
        match self.state {
            SenderState::FillingInitialWindow => self.fill_initial_window().await?,
            SenderState::Done => {}
            SenderState::SteadyState | SenderState::Draining => self.wait_round().await?,
        }
        Ok(self.state)
    }

    async fn fill_initial_window(&mut self) -> Result<(), SenderError> {
        self.started_at = self.link.now();
        info!(
            "Sending {} packets (window {}, probe every {}, timeout {:.4} s)",
            self.config.total_packets,
            self.config.window_size,
            self.config.probe_frequency,
            self.rtt.timeout_secs()
        );
        let initial = self.config.window_size.min(self.config.total_packets);
        for seqno in 0..initial {
            self.send_new(seqno).await?;
        }
        self.update_state();
        Ok(())
    }

    async fn wait_round(&mut self) -> Result<(), SenderError> {
        let now = self.link.now();
        let deadline = *self
            .deadline
            .get_or_insert_with(|| now.saturating_add(self.rtt.timeout()));
        let wait = deadline.saturating_sub(now);
        let event = if wait.is_zero() {
            Err(TransportError::Timeout)
        } else {
            self.link.recv_timeout(wait).await
        };
        match event {
            Ok(datagram) => {
                if let Round::Restart = self.on_datagram(&datagram).await? {
                    self.deadline = None;
                }
            }
            Err(err) => {
                self.deadline = None;
                self.on_timeout(err).await?;
            }
        }
        Ok(())
    }

    async fn on_datagram(&mut self, datagram: &[u8]) -> Result<Round, SenderError> {
        let events = self.config.verbosity.shows_events();
        let ack = match decode_ack(datagram) {
            Ok(ack) if ack.is_valid() => ack,
            Ok(ack) => {
                self.report.malformed_acks += 1;
                verbose!(events, "Discarding ack with bad magic {:#010x}", ack.magic);
                return Ok(Round::Continue);
            }
            Err(err) => {
                self.report.malformed_acks += 1;
                verbose!(events, "Discarding malformed ack: {}", err);
                return Ok(Round::Continue);
            }
        };

        let now = self.link.now();
        match self.window.mark_acked(ack.ackno) {
            Err(err) => {
                self.report.out_of_range_acks += 1;
                verbose!(events, "Discarding ack: {}", err);
                return Ok(Round::Continue);
            }
            Ok(AckOutcome::Duplicate) => {
                self.report.duplicate_acks += 1;
                self.consecutive_timeouts = 0;
                verbose!(
                    self.config.verbosity.shows_packet(ack.ackno),
                    "Got duplicate ack with seqno {}",
                    ack.ackno
                );
                return Ok(Round::Restart);
            }
            Ok(AckOutcome::Fresh) => {}
        }

        self.consecutive_timeouts = 0;
        self.report.acks_received += 1;
        verbose!(
            self.config.verbosity.shows_packet(ack.ackno),
            "Got ack with seqno {}",
            ack.ackno
        );

        if self.rtt.is_probe(ack.ackno)
            && let Some(timeout) = self.rtt.on_probe_acked(ack.ackno, now)
        {
            verbose!(
                events,
                "Probe {} acked, timeout now {:.4} s",
                ack.ackno,
                timeout.as_secs_f64()
            );
        }
        self.record_trace(ack.ackno, now);

        let freed = self.window.advance_base();
        if !freed.is_empty() {
            trace!("Window slid past {:?}", freed);
        }
        // Each freed slot makes room for exactly one new seqno.
        while self.window.has_room() && self.window.next_seqno() < self.config.total_packets {
            self.send_new(self.window.next_seqno()).await?;
        }
        if self.config.compact_ledger {
            self.window.compact();
        }
        debug_assert!(self.window.in_flight() <= self.window.capacity());
        self.update_state();
        Ok(Round::Restart)
    }

    async fn on_timeout(&mut self, err: TransportError) -> Result<(), SenderError> {
        self.report.timeouts += 1;
        self.consecutive_timeouts += 1;
        let base = self.window.base();

        if let Some(limit) = self.config.max_consecutive_timeouts
            && self.consecutive_timeouts > limit
        {
            warn!(
                "Giving up after {} consecutive timeouts waiting for seqno {}",
                self.consecutive_timeouts, base
            );
            return Err(SenderError::PeerUnresponsive {
                timeouts: self.consecutive_timeouts,
                base,
            });
        }

        if base >= self.config.total_packets || self.window.is_acked(base) {
            return Ok(());
        }
        let events = self.config.verbosity.shows_events();
        match &err {
            TransportError::Timeout => {
                verbose!(events, "Timeout expired, resending seqno {}", base)
            }
            TransportError::Io(e) => {
                verbose!(events, "Receive failed ({}), resending seqno {}", e, base)
            }
        }

        let now = self.link.now();
        if self.rtt.is_probe(base) {
            self.rtt.on_probe_sent(base, now);
        }
        self.window.track(base, now)?;
        let payload = self.source.payload(base);
        self.transmit(base, payload).await;
        self.report.retransmissions += 1;
        Ok(())
    }

    async fn send_new(&mut self, seqno: u32) -> Result<(), SenderError> {
        let payload = self.source.payload(seqno);
        let now = self.link.now();
        if self.rtt.is_probe(seqno) {
            self.rtt.on_probe_sent(seqno, now);
        }
        self.window.track(seqno, now)?;
        self.transmit(seqno, payload).await;
        verbose!(
            self.config.verbosity.shows_packet(seqno),
            "Sent packet with seqno {}",
            seqno
        );
        Ok(())
    }

    /// Send failures are not fatal: the packet stays pending and the timeout
    /// path resends it.
    async fn transmit(&mut self, seqno: u32, payload: Bytes) {
        let datagram = DataPacket::new(seqno, payload).encode();
        self.report.transmissions += 1;
        if let Err(err) = self.link.send(datagram).await {
            verbose!(
                self.config.verbosity.shows_events(),
                "Send of seqno {} failed: {}",
                seqno,
                err
            );
        }
    }

    fn record_trace(&mut self, ackno: u32, now: Duration) {
        let Some(sent_at) = self.window.sent_at(ackno) else {
            return;
        };
        let Some(sink) = self.trace.as_mut() else {
            return;
        };
        let record = TraceRecord {
            seqno: ackno,
            time_sent: sent_at.saturating_sub(self.started_at),
            ackno,
            time_acked: now.saturating_sub(self.started_at),
        };
        if let Err(err) = sink.record(&record) {
            warn!("Trace write failed, disabling trace: {}", err);
            self.trace = None;
        }
    }

    fn update_state(&mut self) {
        let total = self.config.total_packets;
        let next = if self.window.base() >= total {
            SenderState::Done
        } else if self.window.next_seqno() >= total {
            SenderState::Draining
        } else {
            SenderState::SteadyState
        };
        if next != self.state {
            debug!("Sender {:?} -> {:?}", self.state, next);
            self.state = next;
            if next == SenderState::Done {
                self.finish();
            }
        }
    }

    fn finish(&mut self) {
        if let Some(mut sink) = self.trace.take()
            && let Err(err) = sink.close()
        {
            warn!("Failed to close trace: {}", err);
        }
        info!(
            "Finished sending all packets! Elapsed time: {:.4} s",
            self.link.now().saturating_sub(self.started_at).as_secs_f64()
        );
    }
}

//! Adaptive retransmission timeout.
//!
//! Only probe packets are timed: every `frequency`-th sequence number except
//! zero. Each probe ack folds one round-trip sample into the timeout with an
//! exponentially weighted moving average:
//!
//! `timeout = (1 - alpha) * timeout + alpha * sample`
//!
//! With the probe frequency larger than the window at most one probe is in
//! flight, so a single timer is enough.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Probe {
    seqno: u32,
    started: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RttEstimator {
    frequency: u32,
    alpha: f64,
    min_timeout: f64,
    /// Seconds.
    timeout: f64,
    probe: Option<Probe>,
    samples: u32,
}

impl RttEstimator {
    pub fn new(frequency: u32, initial_timeout: f64, alpha: f64, min_timeout: f64) -> Self {
        Self {
            frequency,
            alpha,
            min_timeout,
            timeout: initial_timeout.max(min_timeout),
            probe: None,
            samples: 0,
        }
    }

    pub fn is_probe(&self, seqno: u32) -> bool {
        seqno != 0 && seqno % self.frequency == 0
    }

    /// Saturates at `Duration::MAX` for values too large to represent.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout).unwrap_or(Duration::MAX)
    }

    pub fn timeout_secs(&self) -> f64 {
        self.timeout
    }

    /// Number of samples folded in so far.
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Start (or restart) the timer for probe `seqno`. Any earlier probe timer
    /// is forgotten.
    pub fn on_probe_sent(&mut self, seqno: u32, now: Duration) {
        self.probe = Some(Probe {
            seqno,
            started: now,
        });
    }

    /// Finish timing `seqno` if it is the probe in flight and return the
    /// updated timeout. Acks for any other probe leave the estimate alone.
    pub fn on_probe_acked(&mut self, seqno: u32, now: Duration) -> Option<Duration> {
        let probe = self.probe.filter(|p| p.seqno == seqno)?;
        self.probe = None;
        let sample = now.saturating_sub(probe.started);
        Some(self.apply_sample(sample.as_secs_f64()))
    }

    pub fn apply_sample(&mut self, sample: f64) -> Duration {
        self.timeout =
            ((1.0 - self.alpha) * self.timeout + self.alpha * sample).max(self.min_timeout);
        self.samples += 1;
        self.timeout()
    }
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("window size must be at least 1")]
    EmptyWindow,
    #[error("probe frequency {probe_frequency} must exceed the window size {window_size}")]
    ProbeFrequency {
        probe_frequency: u32,
        window_size: u32,
    },
    #[error("initial timeout must be between 0 and 86400 seconds, got {0}")]
    InitialTimeout(f64),
    #[error("minimum timeout must be between 0 and 86400 seconds, got {0}")]
    MinTimeout(f64),
    #[error("smoothing factor must be in (0, 1], got {0}")]
    SmoothingFactor(f64),
    #[error("verbosity must be between 0 and 3, got {0}")]
    Verbosity(u8),
}

/// Upper bound for `initial_timeout` and `min_timeout`, in seconds.
pub const MAX_TIMEOUT_SECS: f64 = 86_400.0;

/// How chatty the sender is about individual packets.
///
/// 0 prints only the session summary, 1 a few packets at the start and every
/// thousandth, 2 adds timeouts and discarded acks, 3 prints everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Verbosity(pub u8);

impl Verbosity {
    pub const QUIET: Verbosity = Verbosity(0);
    pub const MAX: Verbosity = Verbosity(3);

    pub fn shows_packet(self, seqno: u32) -> bool {
        self.0 >= 3 || (self.0 >= 1 && (seqno < 5 || seqno % 1000 == 0))
    }

    pub fn shows_events(self) -> bool {
        self.0 >= 2
    }

    /// `by` levels louder, capped at [`Verbosity::MAX`].
    pub fn raised(self, by: u8) -> Verbosity {
        Verbosity(self.0.saturating_add(by).min(Self::MAX.0))
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity(2)
    }
}

/// Everything the ARQ sender needs to know at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Maximum number of unacknowledged packets in flight (N).
    pub window_size: u32,
    /// Every `probe_frequency`-th sequence number (except 0) is timed.
    pub probe_frequency: u32,
    /// Retransmission timeout before any RTT sample, in seconds.
    pub initial_timeout: f64,
    /// Weight of a new RTT sample in the smoothed timeout.
    pub smoothing_factor: f64,
    /// Lower bound on the adaptive timeout, in seconds.
    pub min_timeout: f64,
    pub verbosity: Verbosity,
    /// Number of sequence numbers in the transfer.
    pub total_packets: u32,
    /// Give up after this many rounds without a valid ack. `None` retries forever.
    pub max_consecutive_timeouts: Option<u32>,
    /// Drop ledger storage below the window base as it advances.
    pub compact_ledger: bool,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            probe_frequency: 100,
            initial_timeout: 0.5,
            smoothing_factor: 0.125,
            min_timeout: 0.001,
            verbosity: Verbosity::default(),
            total_packets: 5000,
            max_consecutive_timeouts: Some(100),
            compact_ledger: false,
        }
    }
}

impl SenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        if self.probe_frequency <= self.window_size {
            return Err(ConfigError::ProbeFrequency {
                probe_frequency: self.probe_frequency,
                window_size: self.window_size,
            });
        }
        if !(self.initial_timeout > 0.0 && self.initial_timeout <= MAX_TIMEOUT_SECS) {
            return Err(ConfigError::InitialTimeout(self.initial_timeout));
        }
        if !(self.min_timeout > 0.0 && self.min_timeout <= MAX_TIMEOUT_SECS) {
            return Err(ConfigError::MinTimeout(self.min_timeout));
        }
        if !(self.smoothing_factor > 0.0 && self.smoothing_factor <= 1.0) {
            return Err(ConfigError::SmoothingFactor(self.smoothing_factor));
        }
        if self.verbosity > Verbosity::MAX {
            return Err(ConfigError::Verbosity(self.verbosity.0));
        }
        Ok(())
    }
}

/// Behaviour of the simulated datagram channel. Latencies are in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Probability that a data packet is lost.
    pub loss_rate: f64,
    /// Probability that an ack is lost.
    pub ack_loss_rate: f64,
    /// Probability that a datagram arrives with a damaged magic value.
    pub corrupt_rate: f64,
    /// Probability that a datagram is delivered twice.
    pub duplicate_rate: f64,
    pub min_latency: u64,
    pub max_latency: u64,
    pub seed: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            ack_loss_rate: 0.0,
            corrupt_rate: 0.0,
            duplicate_rate: 0.0,
            min_latency: 10,
            max_latency: 100,
            seed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(SenderConfig::default().validate(), Ok(()));
    }

    #[test]
    fn timeouts_are_capped() {
        let huge = SenderConfig {
            initial_timeout: 1e20,
            ..Default::default()
        };
        assert_eq!(huge.validate(), Err(ConfigError::InitialTimeout(1e20)));

        let huge_floor = SenderConfig {
            min_timeout: 1e20,
            ..Default::default()
        };
        assert_eq!(huge_floor.validate(), Err(ConfigError::MinTimeout(1e20)));

        let day = SenderConfig {
            initial_timeout: MAX_TIMEOUT_SECS,
            ..Default::default()
        };
        assert_eq!(day.validate(), Ok(()));
    }

    #[test]
    fn probe_frequency_must_exceed_window() {
        let config = SenderConfig {
            window_size: 10,
            probe_frequency: 10,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ProbeFrequency {
                probe_frequency: 10,
                window_size: 10
            })
        );
    }

    #[test]
    fn rejects_bad_numbers() {
        let bad = [
            SenderConfig {
                window_size: 0,
                ..Default::default()
            },
            SenderConfig {
                initial_timeout: 0.0,
                ..Default::default()
            },
            SenderConfig {
                initial_timeout: f64::NAN,
                ..Default::default()
            },
            SenderConfig {
                initial_timeout: f64::INFINITY,
                ..Default::default()
            },
            SenderConfig {
                smoothing_factor: 1.5,
                ..Default::default()
            },
            SenderConfig {
                verbosity: Verbosity(4),
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{config:?} should be rejected");
        }
    }

    #[test]
    fn verbosity_levels() {
        assert!(!Verbosity::QUIET.shows_packet(0));
        assert!(Verbosity(1).shows_packet(4));
        assert!(!Verbosity(1).shows_packet(5));
        assert!(Verbosity(1).shows_packet(3000));
        assert!(!Verbosity(1).shows_events());
        assert!(Verbosity(2).shows_events());
        assert!(Verbosity(3).shows_packet(1234));
    }

    #[test]
    fn raising_verbosity_never_lowers_it() {
        assert_eq!(Verbosity::default().raised(1), Verbosity(3));
        assert_eq!(Verbosity::QUIET.raised(1), Verbosity(1));
        assert_eq!(Verbosity(2).raised(0), Verbosity(2));
        assert_eq!(Verbosity(1).raised(u8::MAX), Verbosity::MAX);
    }
}

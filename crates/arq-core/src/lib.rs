//! Sender side of a sliding-window ARQ protocol over an unreliable datagram link.
//!
//! - [`window`]: acknowledgment ledger and window base
//! - [`rtt`]: probe-driven adaptive timeout
//! - [`sender`]: the control loop tying both to a [`arq_abstract::DatagramLink`]
//! - [`source`], [`trace`], [`udp`]: concrete collaborators

pub mod error;
pub mod rtt;
pub mod sender;
pub mod source;
pub mod trace;
pub mod udp;
pub mod window;

pub use error::SenderError;
pub use rtt::RttEstimator;
pub use sender::{ArqSender, SenderState, SessionReport};
pub use source::{ChunkSource, PatternSource};
pub use trace::{CsvTrace, MemoryTrace};
pub use udp::UdpLink;
pub use window::{AckOutcome, WindowError, WindowTracker};

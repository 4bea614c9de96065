pub mod config;
pub mod interface;
pub mod packet;
pub mod scenario;

pub use interface::{DataSource, DatagramLink, TraceRecord, TraceSink, TransportError};
pub use packet::{
    Ack, DataPacket, DecodeError, Header, MAGIC, decode_ack, decode_data, encode, encode_ack,
};

pub use config::{ConfigError, LinkConfig, MAX_TIMEOUT_SECS, SenderConfig, Verbosity};
pub use scenario::{LinkConfigOverride, SenderConfigOverride, TestAction, TestAssertion, TestScenario};

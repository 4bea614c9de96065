use arq_abstract::ConfigError;
use thiserror::Error;

use crate::window::WindowError;

#[derive(Debug, Error)]
pub enum SenderError {
    #[error("invalid sender configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("peer unresponsive: {timeouts} consecutive timeouts waiting for seqno {base}")]
    PeerUnresponsive { timeouts: u32, base: u32 },
    #[error("window ledger error: {0}")]
    Window(#[from] WindowError),
}

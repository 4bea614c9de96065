use bytes::Bytes;
use std::future::Future;
use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("timed out waiting for a datagram")]
    Timeout,
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Supplies the payload for each sequence number.
pub trait DataSource {
    /// Payload for `seqno`. Must return the same bytes every time it is asked
    /// for the same sequence number, since retransmissions re-read it.
    fn payload(&mut self, seqno: u32) -> Bytes;

    /// Number of chunks this source can produce, if it is finite.
    fn chunk_count(&self) -> Option<u32> {
        None
    }
}

/// One fresh acknowledgment, with times relative to the session start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceRecord {
    pub seqno: u32,
    pub time_sent: Duration,
    pub ackno: u32,
    pub time_acked: Duration,
}

/// Observability sink for send/ack timing pairs.
pub trait TraceSink {
    fn record(&mut self, record: &TraceRecord) -> io::Result<()>;

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The unreliable, message-oriented channel the sender talks through.
pub trait DatagramLink {
    /// Hand one datagram to the channel.
    fn send(&mut self, datagram: Bytes) -> impl Future<Output = Result<(), TransportError>>;

    /// Wait at most `timeout` for the next inbound datagram.
    fn recv_timeout(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Bytes, TransportError>>;

    /// Time elapsed since the link was created.
    fn now(&self) -> Duration;
}

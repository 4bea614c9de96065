//! [`DatagramLink`] over a tokio UDP socket.

use arq_abstract::{DatagramLink, TransportError};
use bytes::Bytes;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::{UdpSocket, lookup_host};
use tracing::debug;

/// Large enough for any ack; longer datagrams are truncated and then
/// rejected by the ack decoder.
const RECV_BUFFER: usize = 4096;

#[derive(Debug)]
pub struct UdpLink {
    socket: UdpSocket,
    peer: SocketAddr,
    epoch: Instant,
    buf: Vec<u8>,
}

impl UdpLink {
    /// Resolve `host:port` and bind an ephemeral local socket of the same
    /// address family.
    pub async fn connect(host: &str, port: u16) -> io::Result<Self> {
        let peer = lookup_host((host, port)).await?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address found for {host}:{port}"),
            )
        })?;
        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        debug!("bound {} for peer {}", socket.local_addr()?, peer);
        Ok(Self::from_socket(socket, peer))
    }

    pub fn from_socket(socket: UdpSocket, peer: SocketAddr) -> Self {
        Self {
            socket,
            peer,
            epoch: Instant::now(),
            buf: vec![0; RECV_BUFFER],
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl DatagramLink for UdpLink {
    async fn send(&mut self, datagram: Bytes) -> Result<(), TransportError> {
        self.socket.send_to(&datagram, self.peer).await?;
        Ok(())
    }

    async fn recv_timeout(&mut self, timeout: Duration) -> Result<Bytes, TransportError> {
        match tokio::time::timeout(timeout, self.socket.recv_from(&mut self.buf)).await {
            Ok(Ok((n, _from))) => Ok(Bytes::copy_from_slice(&self.buf[..n])),
            Ok(Err(e)) => Err(TransportError::Io(e)),
            Err(_) => Err(TransportError::Timeout),
        }
    }

    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

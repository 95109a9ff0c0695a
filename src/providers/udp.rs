//! UDP socket provider

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::{info, trace};

use crate::provider::DatagramProvider;
use crate::{Result, TelemetryError};

/// Receives datagrams from a bound UDP socket, one at a time.
pub struct UdpProvider {
    socket: UdpSocket,
    buffer: Vec<u8>,
}

impl UdpProvider {
    /// Bind to `addr`, receiving into a buffer of `max_datagram_size` bytes.
    ///
    /// Longer datagrams are truncated by the socket and later rejected by
    /// the dispatcher's size check.
    pub async fn bind(addr: SocketAddr, max_datagram_size: usize) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| TelemetryError::io(format!("binding UDP socket to {}", addr), e))?;
        info!(addr = %socket.local_addr().unwrap_or(addr), "Listening for telemetry");
        Ok(Self { socket, buffer: vec![0; max_datagram_size] })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(|e| TelemetryError::io("reading UDP socket address", e))
    }
}

#[async_trait::async_trait]
impl DatagramProvider for UdpProvider {
    async fn next_datagram(&mut self) -> Result<Option<Vec<u8>>> {
        let (len, peer) = self
            .socket
            .recv_from(&mut self.buffer)
            .await
            .map_err(|e| TelemetryError::io("receiving UDP datagram", e))?;
        trace!(len, %peer, "Received datagram");
        Ok(Some(self.buffer[..len].to_vec()))
    }
}

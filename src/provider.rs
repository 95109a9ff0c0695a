//! Provider trait for datagram sources

use crate::Result;

/// Source of raw telemetry datagrams.
///
/// Providers abstract over where datagrams come from (a UDP socket, a
/// capture file) so the driver loop stays the same for live and replayed
/// sessions.
#[async_trait::async_trait]
pub trait DatagramProvider: Send + 'static {
    /// Wait for the next datagram.
    ///
    /// Returns:
    /// - `Ok(Some(bytes))` - a datagram arrived
    /// - `Ok(None)` - the source is exhausted (normal termination)
    /// - `Err(e)` - receiving failed; the driver may retry
    async fn next_datagram(&mut self) -> Result<Option<Vec<u8>>>;
}

//! Datagram providers

mod replay;
mod udp;

pub use replay::{ReplayProvider, read_capture, write_capture};
pub use udp::UdpProvider;

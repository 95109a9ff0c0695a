//! Spec-driven decoder and lap tracker for F1 UDP telemetry.
//!
//! Boxbox compiles a C-style description of the game's UDP wire format into
//! byte layouts at startup, decodes incoming datagrams against them, and
//! folds the decoded packets into per-session lap and sector state. Derived
//! points are written to a time-series [`Sink`](sink::Sink).
//!
//! # Pipeline
//!
//! ```text
//! DatagramProvider ──▶ Dispatcher ──▶ SessionTracker ──▶ Sink
//!  (UDP / capture)      (decode)       (laps, sectors)    (line protocol)
//! ```
//!
//! One datagram is processed completely before the next is received; the
//! [`Driver`](driver::Driver) runs that loop in a background task and
//! publishes session snapshots on a watch channel.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use boxbox::{Collector, Config, Driver, UdpProvider};
//! use boxbox::sink::LineProtocolSink;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> boxbox::Result<()> {
//!     let config = Config::default();
//!     let sink = LineProtocolSink::new(std::io::stdout(), &config.sink);
//!     let collector = Collector::from_config(&config, sink)?;
//!     let provider = UdpProvider::bind(config.listen, config.max_datagram_size).await?;
//!
//!     let handle = Driver::spawn(provider, collector);
//!     tokio::signal::ctrl_c().await.ok();
//!     handle.shutdown();
//!     let stats = handle.join().await;
//!     println!("{} datagrams", stats.received);
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod driver;
mod error;
pub mod packet;
pub mod provider;
pub mod providers;
pub mod schema;
pub mod session;
pub mod sink;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Core exports
pub use error::*;

pub use collector::{Collector, CollectorStats};
pub use config::Config;
pub use driver::{Driver, DriverHandle};
pub use packet::{Dispatcher, Packet, PacketHeader, PacketKind};
pub use provider::DatagramProvider;
pub use providers::{ReplayProvider, UdpProvider};
pub use schema::LayoutRegistry;
pub use session::{SessionSnapshot, SessionTracker};

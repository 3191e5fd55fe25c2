//! Decoder and ingestion relay for LiDAR point-cloud frames.
//!
//! Frames arrive from a messaging layer as self-describing containers: a text header
//! declaring fields, types, sizes and encoding, followed by an ASCII or packed binary
//! body. The relay queues each arrival, decodes it into a [`PointTable`], serializes
//! the configured view as JSON, compresses it with zstd and broadcasts the resulting
//! [`OutboundEnvelope`] to visualization subscribers.
//!
//! # Features
//!
//! - **Tolerant header parsing**: unknown keys and malformed lines are skipped with a warning
//! - **ASCII and binary bodies**: little-endian scalars, multi-count fields, packed RGB
//! - **Bounded ingestion**: arrivals never block; a full queue drops new frames
//! - **Per-topic statistics**: arrival counts and frame-rate estimates
//!
//! ## Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use pcd_relay::{Relay, RelayConfig, sources::ReplaySource, pcd::Terminator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     pcd_relay::logging::init("info");
//!
//!     let config = RelayConfig { terminator: Terminator::Data, ..RelayConfig::default() };
//!     let relay = Relay::start(config)?;
//!     let mut envelopes = Box::pin(relay.subscribe());
//!
//!     relay.attach(ReplaySource::from_dir("./recordings", "lidar/front", 10.0)?);
//!
//!     while let Some(emitted) = envelopes.next().await {
//!         println!("{} @ {}", emitted.envelope.topic, emitted.envelope.time);
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Decoding
pub mod codec;
pub mod pcd;

// Ingestion pipeline
pub mod bridge;
pub mod dispatch;
pub mod relay;
pub mod source;
pub mod sources;
pub mod stats;

// Ambient
pub mod config;
pub mod logging;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use bridge::{ArrivalHandle, IngestionBridge, MetricsSnapshot};
pub use codec::{Compressor, ZstdCompressor};
pub use config::RelayConfig;
pub use dispatch::{BroadcastDispatcher, Dispatcher, Emitted};
pub use pcd::{DecodedFrame, PointTable, TableView, Terminator, decode_container, decode_frame};
pub use relay::Relay;
pub use source::{FrameSource, SourceHandle};
pub use stats::{StreamStats, TopicStats};

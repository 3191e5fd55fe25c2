//! Top-level relay: bridge, compressor and broadcast dispatcher wired from config

use futures::Stream;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bridge::{ArrivalHandle, IngestionBridge, MetricsSnapshot};
use crate::codec::{Compressor, ZstdCompressor};
use crate::config::RelayConfig;
use crate::dispatch::{BroadcastDispatcher, Emitted};
use crate::source::{FrameSource, SourceHandle, spawn_pump};
use crate::stats::StreamStats;
use crate::Result;

/// A running relay.
///
/// Owns the drain task. Dropping the relay cancels it along with every attached
/// source.
///
/// ```rust,no_run
/// use futures::StreamExt;
/// use pcd_relay::{Relay, RelayConfig};
///
/// # #[tokio::main]
/// # async fn main() -> pcd_relay::Result<()> {
/// let relay = Relay::start(RelayConfig::default())?;
/// let mut envelopes = Box::pin(relay.subscribe());
///
/// # let payload: Vec<u8> = Vec::new();
/// let arrivals = relay.arrivals();
/// arrivals.on_arrival("lidar/front", payload);
///
/// if let Some(emitted) = envelopes.next().await {
///     println!("{} -> {} bytes", emitted.envelope.topic, emitted.envelope.payload.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Relay {
    config: RelayConfig,
    topics: Vec<String>,
    arrivals: ArrivalHandle,
    dispatcher: BroadcastDispatcher,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl Relay {
    /// Start a relay with zstd compression at the configured level.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: RelayConfig) -> Result<Self> {
        let compressor = Arc::new(ZstdCompressor::new(config.compression_level));
        Self::start_with(config, compressor)
    }

    /// Start a relay with a custom compressor.
    pub fn start_with(config: RelayConfig, compressor: Arc<dyn Compressor>) -> Result<Self> {
        config.validate()?;
        let topics = config.topics()?;
        debug!(topics = ?topics, "Registered topics");

        let dispatcher = BroadcastDispatcher::new(config.broadcast_capacity);
        let handles =
            IngestionBridge::spawn(&config, topics.clone(), compressor, dispatcher.clone());

        info!(
            queue_capacity = config.queue_capacity,
            event = %config.event_name,
            view = ?config.table_view,
            "Relay started"
        );

        Ok(Self {
            config,
            topics,
            arrivals: handles.arrivals,
            dispatcher,
            cancel: handles.cancel,
            worker: Some(handles.worker),
        })
    }

    /// Load configuration from a YAML file, install logging at its `log_level`
    /// and start.
    ///
    /// Logging is left alone if a global subscriber is already installed.
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = RelayConfig::from_file(path)?;
        if !config.init_logging() {
            debug!("Tracing subscriber already installed");
        }
        Self::start(config)
    }

    /// Handle for the messaging layer's message callback.
    pub fn arrivals(&self) -> ArrivalHandle {
        self.arrivals.clone()
    }

    /// Shorthand for `arrivals().on_arrival(..)`.
    pub fn on_arrival(&self, topic: impl Into<String>, payload: impl Into<Arc<[u8]>>) -> bool {
        self.arrivals.on_arrival(topic, payload)
    }

    /// Envelopes emitted after this call.
    pub fn subscribe(&self) -> impl Stream<Item = Arc<Emitted>> + Send + 'static {
        self.dispatcher.subscribe()
    }

    /// Subscribe `source` to the configured topics and forward every frame it
    /// yields until it ends or the relay stops.
    ///
    /// More topics can be added through the returned handle.
    pub fn attach<S: FrameSource>(&self, source: S) -> SourceHandle {
        spawn_pump(source, self.arrivals.clone(), self.topics.clone(), self.cancel.child_token())
    }

    /// Topics loaded from `topics_file` at startup
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn stats(&self) -> &StreamStats {
        self.arrivals.stats()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.arrivals.metrics()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Stop the drain task and wait for it to finish.
    ///
    /// Frames still queued are discarded.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
        info!(metrics = ?self.arrivals.metrics(), "Relay stopped");
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

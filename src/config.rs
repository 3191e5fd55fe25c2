//! Relay configuration.
//!
//! Configuration is read from YAML. Every key is optional; missing keys fall back to
//! the defaults below.
//!
//! ```yaml
//! queue_capacity: 100
//! idle_interval_ms: 100
//! fps_window_secs: 10
//! event_name: mqtt_message
//! compression_level: 3
//! table_view: vertices      # or: full
//! terminator: time_sentinel # or: data, data_then_time
//! wake_on_enqueue: false
//! broadcast_capacity: 64
//! topics_file: ./topic.txt
//! log_level: info
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::codec::DEFAULT_COMPRESSION_LEVEL;
use crate::logging;
use crate::pcd::{TableView, Terminator};
use crate::{RelayError, Result};

/// Relay configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Maximum number of frames waiting for the drain loop
    pub queue_capacity: usize,
    /// Drain loop idle wait when the queue is empty
    pub idle_interval_ms: u64,
    /// Elapsed time before frame rates are published
    pub fps_window_secs: u64,
    /// Event name envelopes are emitted on
    pub event_name: String,
    /// zstd compression level
    pub compression_level: i32,
    /// Serialized table view sent to clients
    pub table_view: TableView,
    /// Line that ends a frame header
    pub terminator: Terminator,
    /// End the idle wait as soon as a frame is enqueued
    pub wake_on_enqueue: bool,
    /// Envelopes buffered per subscriber before it starts lagging
    pub broadcast_capacity: usize,
    /// Newline-delimited list of topics to subscribe to at startup
    pub topics_file: Option<PathBuf>,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            idle_interval_ms: 100,
            fps_window_secs: 10,
            event_name: "mqtt_message".to_string(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            table_view: TableView::default(),
            terminator: Terminator::default(),
            wake_on_enqueue: false,
            broadcast_capacity: 64,
            topics_file: None,
            log_level: "info".to_string(),
        }
    }
}

impl RelayConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml).map_err(|e| RelayError::Config {
            reason: "invalid YAML".to_string(),
            source: Some(Box::new(e)),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| RelayError::file_error(path.to_path_buf(), e))?;
        debug!(path = %path.display(), "Loaded relay configuration");
        Self::from_yaml_str(&yaml)
    }

    /// Check values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(RelayError::config("queue_capacity must be greater than zero"));
        }
        if self.idle_interval_ms == 0 {
            return Err(RelayError::config("idle_interval_ms must be greater than zero"));
        }
        if self.broadcast_capacity == 0 {
            return Err(RelayError::config("broadcast_capacity must be greater than zero"));
        }
        if self.event_name.trim().is_empty() {
            return Err(RelayError::config("event_name must not be empty"));
        }
        if !zstd::compression_level_range().contains(&self.compression_level) {
            return Err(RelayError::config(format!(
                "compression_level {} is outside the supported range",
                self.compression_level
            )));
        }
        logging::filter(&self.log_level)?;
        Ok(())
    }

    /// Install the global subscriber with `log_level` as the default filter.
    ///
    /// Returns `false` if a subscriber was already installed.
    pub fn init_logging(&self) -> bool {
        logging::init(&self.log_level)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn fps_window(&self) -> Duration {
        Duration::from_secs(self.fps_window_secs)
    }

    /// Topics from `topics_file`, or none when unset.
    pub fn topics(&self) -> Result<Vec<String>> {
        match &self.topics_file {
            Some(path) => load_topics(path),
            None => Ok(Vec::new()),
        }
    }
}

/// Parse a newline-delimited topic list, ignoring blank lines.
pub fn parse_topics(text: &str) -> Vec<String> {
    text.lines().map(str::trim).filter(|t| !t.is_empty()).map(str::to_string).collect()
}

/// Read a newline-delimited topic list from disk.
pub fn load_topics<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| RelayError::file_error(path.to_path_buf(), e))?;
    Ok(parse_topics(&text))
}

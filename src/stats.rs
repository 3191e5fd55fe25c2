//! Per-topic arrival counters and frame-rate estimates.
//!
//! A single timer starts at the first arrival on any topic. Once the elapsed time
//! reaches the configured window, every arrival refreshes its topic's rate as
//! `arrivals / elapsed_seconds`. The estimate is cumulative since the first arrival;
//! it is recomputed, never reset.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::trace;

/// Default window before rates are published
pub const DEFAULT_FPS_WINDOW: Duration = Duration::from_secs(10);

/// Counters for a single topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TopicStats {
    /// Every arrival, whether or not it was queued
    pub arrivals: u64,
    /// Frames per second since the first arrival on any topic
    pub fps: f64,
}

/// Process-lifetime arrival statistics keyed by topic.
#[derive(Debug)]
pub struct StreamStats {
    window: Duration,
    started: OnceLock<Instant>,
    topics: Mutex<HashMap<String, TopicStats>>,
}

impl StreamStats {
    pub fn new(window: Duration) -> Self {
        Self { window, started: OnceLock::new(), topics: Mutex::new(HashMap::new()) }
    }

    /// Create stats with `topics` pre-registered at zero.
    pub fn with_topics<I, S>(window: Duration, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stats = Self::new(window);
        {
            let mut map = stats.topics.lock();
            for topic in topics {
                map.entry(topic.into()).or_default();
            }
        }
        stats
    }

    /// Register `topic` at zero if it has not been seen yet.
    ///
    /// Returns `true` if the topic was new.
    pub fn register(&self, topic: &str) -> bool {
        let mut topics = self.topics.lock();
        if topics.contains_key(topic) {
            return false;
        }
        topics.insert(topic.to_string(), TopicStats::default());
        true
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record an arrival now.
    pub fn record_arrival(&self, topic: &str) -> TopicStats {
        self.record_arrival_at(topic, Instant::now())
    }

    /// Record an arrival at `now`.
    pub fn record_arrival_at(&self, topic: &str, now: Instant) -> TopicStats {
        let started = *self.started.get_or_init(|| now);
        let elapsed = now.saturating_duration_since(started);

        let mut topics = self.topics.lock();
        let entry = topics.entry(topic.to_string()).or_default();
        entry.arrivals += 1;

        if !elapsed.is_zero() && elapsed >= self.window {
            entry.fps = entry.arrivals as f64 / elapsed.as_secs_f64();
            trace!(topic, arrivals = entry.arrivals, fps = entry.fps, "Updated frame rate");
        }

        *entry
    }

    /// Current counters for one topic.
    pub fn get(&self, topic: &str) -> Option<TopicStats> {
        self.topics.lock().get(topic).copied()
    }

    /// Copy of every topic's counters, sorted by topic.
    pub fn snapshot(&self) -> BTreeMap<String, TopicStats> {
        self.topics.lock().iter().map(|(k, v)| (k.clone(), *v)).collect()
    }
}

impl Default for StreamStats {
    fn default() -> Self {
        Self::new(DEFAULT_FPS_WINDOW)
    }
}

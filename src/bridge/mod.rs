//! Ingestion bridge between the messaging layer and visualization subscribers.
//!
//! Arrivals are recorded and pushed onto a bounded [`FrameQueue`] from whatever thread
//! the messaging client delivers on. A single drain task pops frames in arrival order,
//! decodes them one at a time on the blocking pool, compresses the serialized table
//! and hands the resulting [`OutboundEnvelope`] to a [`Dispatcher`]. When the queue is
//! empty the drain task sleeps for the configured idle interval.
//!
//! A frame that fails to decode or dispatch is logged and counted; the loop moves on
//! to the next one. A panic while processing a frame counts as a failure too.

mod metrics;
mod queue;

pub use metrics::{BridgeMetrics, MetricsSnapshot};
pub use queue::{DEFAULT_QUEUE_CAPACITY, FrameQueue};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::codec::Compressor;
use crate::config::RelayConfig;
use crate::dispatch::Dispatcher;
use crate::pcd::{TableView, Terminator, decode_frame};
use crate::stats::StreamStats;
use crate::types::{OutboundEnvelope, RawFrame};
use crate::{RelayError, Result};

/// State shared by the arrival path and the drain task
#[derive(Debug)]
struct BridgeShared {
    queue: FrameQueue,
    stats: StreamStats,
    metrics: BridgeMetrics,
    wake: Option<Notify>,
}

/// Cheap, cloneable entry point for the messaging layer.
#[derive(Debug, Clone)]
pub struct ArrivalHandle {
    shared: Arc<BridgeShared>,
}

impl ArrivalHandle {
    /// Record a message and queue it for decoding.
    ///
    /// Never blocks on capacity. Returns `false` if the queue was full and the
    /// message was dropped.
    pub fn on_arrival(&self, topic: impl Into<String>, payload: impl Into<Arc<[u8]>>) -> bool {
        self.push(RawFrame::new(topic, payload))
    }

    /// Queue an already-built frame. See [`ArrivalHandle::on_arrival`].
    pub fn push(&self, frame: RawFrame) -> bool {
        let shared = &self.shared;
        shared.stats.record_arrival(&frame.topic);

        match shared.queue.try_push(frame) {
            Ok(()) => {
                shared.metrics.record_enqueued();
                if let Some(wake) = &shared.wake {
                    wake.notify_one();
                }
                true
            }
            Err(rejected) => {
                shared.metrics.record_dropped(&rejected.topic, shared.queue.capacity());
                false
            }
        }
    }

    pub fn stats(&self) -> &StreamStats {
        &self.shared.stats
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Frames currently waiting for the drain task
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }
}

/// Turns a raw frame into an outbound envelope.
pub struct FrameProcessor {
    terminator: Terminator,
    view: TableView,
    compressor: Arc<dyn Compressor>,
}

impl FrameProcessor {
    pub fn new(terminator: Terminator, view: TableView, compressor: Arc<dyn Compressor>) -> Self {
        Self { terminator, view, compressor }
    }

    /// Decode, serialize and compress one frame.
    pub fn process(&self, frame: &RawFrame) -> Result<OutboundEnvelope> {
        let decoded = decode_frame(frame, self.terminator)?;
        let json = decoded.table.render(self.view)?;
        let payload = self.compressor.compress(&json)?;

        trace!(
            topic = %decoded.topic,
            rows = decoded.table.row_count(),
            json_bytes = json.len(),
            compressed_bytes = payload.len(),
            "Frame processed"
        );

        Ok(OutboundEnvelope {
            topic: decoded.topic,
            payload,
            objects: decoded.objects,
            time: decoded.time_minute,
        })
    }

    /// Process `frame` on the blocking pool.
    ///
    /// Keeps decode and compression off the async workers. A panic while
    /// processing is reported as [`RelayError::ProcessingPanicked`].
    pub async fn process_blocking(self: Arc<Self>, frame: RawFrame) -> Result<OutboundEnvelope> {
        tokio::task::spawn_blocking(move || self.process(&frame))
            .await
            .map_err(|e| RelayError::ProcessingPanicked { details: e.to_string() })?
    }
}

impl std::fmt::Debug for FrameProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameProcessor")
            .field("terminator", &self.terminator)
            .field("view", &self.view)
            .finish_non_exhaustive()
    }
}

/// Result of spawning the bridge
pub struct BridgeHandles {
    /// Entry point for arrivals
    pub arrivals: ArrivalHandle,
    /// Cancels the drain task
    pub cancel: CancellationToken,
    /// Drain task; completes after cancellation
    pub worker: JoinHandle<()>,
}

/// Spawns and manages the drain task.
pub struct IngestionBridge;

impl IngestionBridge {
    /// Spawn the drain task for `config`.
    ///
    /// `topics` are pre-registered in the stream stats. Must be called from within a
    /// tokio runtime.
    pub fn spawn<D>(
        config: &RelayConfig,
        topics: Vec<String>,
        compressor: Arc<dyn Compressor>,
        dispatcher: D,
    ) -> BridgeHandles
    where
        D: Dispatcher,
    {
        let shared = Arc::new(BridgeShared {
            queue: FrameQueue::new(config.queue_capacity),
            stats: StreamStats::with_topics(config.fps_window(), topics),
            metrics: BridgeMetrics::default(),
            wake: config.wake_on_enqueue.then(Notify::new),
        });

        let processor =
            Arc::new(FrameProcessor::new(config.terminator, config.table_view, compressor));
        let cancel = CancellationToken::new();

        let worker = tokio::spawn(Self::drain_task(
            Arc::clone(&shared),
            processor,
            dispatcher,
            config.event_name.clone(),
            config.idle_interval(),
            cancel.clone(),
        ));

        BridgeHandles { arrivals: ArrivalHandle { shared }, cancel, worker }
    }

    async fn drain_task<D>(
        shared: Arc<BridgeShared>,
        processor: Arc<FrameProcessor>,
        dispatcher: D,
        event: String,
        idle: Duration,
        cancel: CancellationToken,
    ) where
        D: Dispatcher,
    {
        info!(event = %event, idle_ms = idle.as_millis() as u64, "Drain task started");
        let mut processed = 0u64;

        loop {
            if cancel.is_cancelled() {
                info!("Drain task cancelled");
                break;
            }

            let Some(frame) = shared.queue.pop() else {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Drain task cancelled while idle");
                        break;
                    }
                    _ = tokio::time::sleep(idle) => {}
                    _ = wait_for_enqueue(shared.wake.as_ref()) => {}
                }
                continue;
            };

            processed += 1;
            match Arc::clone(&processor).process_blocking(frame.clone()).await {
                Ok(envelope) => {
                    shared.metrics.record_decoded();
                    match dispatcher.emit(&event, envelope).await {
                        Ok(()) => shared.metrics.record_dispatched(),
                        Err(e) => {
                            shared.metrics.record_dispatch_error();
                            error!(topic = %frame.topic, error = %e, "Failed to dispatch envelope");
                        }
                    }
                }
                Err(e) => {
                    shared.metrics.record_failed();
                    error!(
                        topic = %frame.topic,
                        bytes = frame.payload.len(),
                        error = %e,
                        "Failed to decode frame"
                    );
                    debug!(suggestions = ?e.recovery_suggestions(), "Decode failure hints");
                }
            }
        }

        info!(processed, "Drain task ended");
    }
}

async fn wait_for_enqueue(wake: Option<&Notify>) {
    match wake {
        Some(notify) => notify.notified().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ZstdCompressor;
    use crate::dispatch::BroadcastDispatcher;
    use crate::test_utils::PcdBuilder;
    use futures::StreamExt;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn good_frame(topic: &str, x: f32) -> Vec<u8> {
        let row = format!("{x} 0 0 1");
        PcdBuilder::xyzi().topic(topic).time(120_000_000).ascii(&[row.as_str()])
    }

    fn spawn_with<D: Dispatcher>(config: RelayConfig, dispatcher: D) -> BridgeHandles {
        IngestionBridge::spawn(&config, Vec::new(), Arc::new(ZstdCompressor::default()), dispatcher)
    }

    #[tokio::test]
    async fn failing_frame_does_not_stop_the_loop() {
        let _ = tracing_subscriber::fmt::try_init();

        let dispatcher = BroadcastDispatcher::new(16);
        let received = dispatcher.subscribe();
        let handles = spawn_with(RelayConfig::default(), dispatcher);

        assert!(handles.arrivals.on_arrival("lidar/a", good_frame("lidar/a", 1.0)));
        assert!(handles.arrivals.on_arrival("lidar/bad", b"not a container".to_vec()));
        assert!(handles.arrivals.on_arrival("lidar/b", good_frame("lidar/b", 2.0)));

        let topics: Vec<String> =
            received.take(2).map(|e| e.envelope.topic.clone()).collect().await;
        assert_eq!(topics, ["lidar/a", "lidar/b"]);

        let metrics = handles.arrivals.metrics();
        assert_eq!(metrics.enqueued, 3);
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.dispatched, 2);

        handles.cancel.cancel();
        handles.worker.await.unwrap();
    }

    #[tokio::test]
    async fn envelope_carries_header_metadata() {
        let dispatcher = BroadcastDispatcher::new(4);
        let mut received = Box::pin(dispatcher.subscribe());
        let handles = spawn_with(RelayConfig::default(), dispatcher);

        let payload = PcdBuilder::xyzi()
            .topic("lidar/front")
            .time(125_000_000)
            .bbox([0.0, 1.0, 2.0, 3.0, 4.0, 5.0])
            .ascii(&["1 2 3 4"]);
        handles.arrivals.on_arrival("transport/topic", payload);

        let emitted = received.next().await.unwrap();
        assert_eq!(emitted.event, "mqtt_message");
        assert_eq!(emitted.envelope.topic, "lidar/front");
        assert_eq!(emitted.envelope.time, "2");
        assert_eq!(emitted.envelope.objects.len(), 1);
        assert_eq!(emitted.envelope.objects[0].maxz, 5.0);

        let json = zstd::stream::decode_all(emitted.envelope.payload.as_slice()).unwrap();
        let view: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(view["x"][0], 1.0);
        assert_eq!(view["intensity"][0], 4.0);

        handles.cancel.cancel();
        handles.worker.await.unwrap();
    }

    #[tokio::test]
    async fn oversized_point_count_does_not_stop_the_loop() {
        let dispatcher = BroadcastDispatcher::new(4);
        let received = dispatcher.subscribe();
        let handles = spawn_with(RelayConfig::default(), dispatcher);

        let huge = PcdBuilder::xyzi()
            .topic("lidar/huge")
            .points(1_000_000_000_000_000_000)
            .ascii(&["1 2 3 4"]);
        handles.arrivals.on_arrival("lidar/huge", huge);
        handles.arrivals.on_arrival("lidar/ok", good_frame("lidar/ok", 1.0));

        let topics: Vec<String> =
            received.take(1).map(|e| e.envelope.topic.clone()).collect().await;
        assert_eq!(topics, ["lidar/ok"]);
        assert_eq!(handles.arrivals.metrics().failed, 1);

        handles.cancel.cancel();
        handles.worker.await.unwrap();
    }

    /// Panics on its first call, then compresses normally.
    struct PanicOnce {
        panicked: AtomicBool,
    }

    impl Compressor for PanicOnce {
        fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("compressor state corrupted");
            }
            ZstdCompressor::default().compress(input)
        }
    }

    #[tokio::test]
    async fn panicking_frame_is_counted_as_failed() {
        let dispatcher = BroadcastDispatcher::new(4);
        let received = dispatcher.subscribe();
        let compressor = Arc::new(PanicOnce { panicked: AtomicBool::new(false) });
        let handles =
            IngestionBridge::spawn(&RelayConfig::default(), Vec::new(), compressor, dispatcher);

        handles.arrivals.on_arrival("lidar/a", good_frame("lidar/a", 1.0));
        handles.arrivals.on_arrival("lidar/b", good_frame("lidar/b", 2.0));

        let topics: Vec<String> =
            received.take(1).map(|e| e.envelope.topic.clone()).collect().await;
        assert_eq!(topics, ["lidar/b"]);

        let metrics = handles.arrivals.metrics();
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.dispatched, 1);
        assert!(!handles.worker.is_finished());

        handles.cancel.cancel();
        handles.worker.await.unwrap();
    }

    #[tokio::test]
    async fn blocking_processing_reports_the_panic_message() {
        let processor = Arc::new(FrameProcessor::new(
            Terminator::TimeSentinel,
            TableView::Vertices,
            Arc::new(PanicOnce { panicked: AtomicBool::new(false) }),
        ));
        let frame = RawFrame::new("lidar/a", good_frame("lidar/a", 1.0));

        match Arc::clone(&processor).process_blocking(frame.clone()).await {
            Err(RelayError::ProcessingPanicked { details }) => {
                assert!(details.contains("compressor state corrupted"), "{}", details);
            }
            other => panic!("Expected ProcessingPanicked, got {:?}", other),
        }
        assert!(processor.process_blocking(frame).await.is_ok());
    }

    #[tokio::test]
    async fn full_queue_drops_new_arrivals() {
        let config = RelayConfig { queue_capacity: 2, ..RelayConfig::default() };
        let handles = spawn_with(config, BroadcastDispatcher::new(4));

        // The drain task has not been polled yet on this single-threaded runtime
        let accepted: Vec<bool> =
            (0..5).map(|i| handles.arrivals.on_arrival("lidar/a", vec![i as u8])).collect();

        assert_eq!(accepted, [true, true, false, false, false]);
        assert_eq!(handles.arrivals.metrics().dropped, 3);
        assert_eq!(handles.arrivals.stats().get("lidar/a").unwrap().arrivals, 5);

        handles.cancel.cancel();
        handles.worker.await.unwrap();
    }

    struct FlakyDispatcher {
        calls: Mutex<u32>,
        delivered: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl Dispatcher for FlakyDispatcher {
        async fn emit(&self, event: &str, envelope: OutboundEnvelope) -> Result<()> {
            let call = {
                let mut calls = self.calls.lock();
                *calls += 1;
                *calls
            };
            if call == 1 {
                return Err(RelayError::Dispatch {
                    event: event.to_string(),
                    reason: "transport closed".to_string(),
                });
            }
            self.delivered.lock().push(envelope.topic);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_errors_are_counted_and_skipped() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = FlakyDispatcher { calls: Mutex::new(0), delivered: Arc::clone(&delivered) };
        let handles = spawn_with(RelayConfig::default(), dispatcher);

        handles.arrivals.on_arrival("a", good_frame("a", 1.0));
        handles.arrivals.on_arrival("b", good_frame("b", 2.0));

        tokio::time::sleep(Duration::from_secs(1)).await;

        let metrics = handles.arrivals.metrics();
        assert_eq!(metrics.dispatch_errors, 1);
        assert_eq!(metrics.dispatched, 1);
        assert_eq!(*delivered.lock(), ["b"]);

        handles.cancel.cancel();
        handles.worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn idle_loop_picks_up_late_arrivals() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = FlakyDispatcher { calls: Mutex::new(1), delivered: Arc::clone(&delivered) };
        let handles = spawn_with(RelayConfig::default(), dispatcher);

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(delivered.lock().is_empty());

        handles.arrivals.on_arrival("late", good_frame("late", 3.0));
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(*delivered.lock(), ["late"]);
        assert_eq!(handles.arrivals.queued(), 0);

        handles.cancel.cancel();
        handles.worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn wake_on_enqueue_skips_the_idle_wait() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = FlakyDispatcher { calls: Mutex::new(1), delivered: Arc::clone(&delivered) };
        let config = RelayConfig {
            wake_on_enqueue: true,
            idle_interval_ms: 60_000,
            ..RelayConfig::default()
        };
        let handles = spawn_with(config, dispatcher);

        tokio::time::sleep(Duration::from_millis(10)).await;
        handles.arrivals.on_arrival("now", good_frame("now", 1.0));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(*delivered.lock(), ["now"]);

        handles.cancel.cancel();
        handles.worker.await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_ends_an_idle_loop() {
        let handles = spawn_with(RelayConfig::default(), BroadcastDispatcher::new(1));
        handles.cancel.cancel();
        handles.worker.await.unwrap();
    }
}

//! Frame sources and the task that pumps them into the bridge

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::Result;
use crate::bridge::ArrivalHandle;
use crate::types::RawFrame;

/// Consecutive errors tolerated before a pump gives up
const MAX_ERRORS: u32 = 10;

/// Producer of raw frames, such as a message-bus subscription or a file replay.
///
/// Sources handle their own pacing.
#[async_trait::async_trait]
pub trait FrameSource: Send + 'static {
    /// Get the next frame
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - New frame available
    /// - `Ok(None)` - Source exhausted
    /// - `Err(e)` - Error occurred; the pump backs off and retries
    async fn next_frame(&mut self) -> Result<Option<RawFrame>>;

    /// Start receiving frames published on `topics`.
    ///
    /// Called with the configured topic list before the first frame is requested,
    /// then again for every topic added at runtime. Sources with a fixed topic
    /// ignore it.
    async fn subscribe(&mut self, topics: &[String]) -> Result<()> {
        let _ = topics;
        Ok(())
    }
}

/// Summary of a finished pump
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpReport {
    /// Frames handed to the bridge
    pub forwarded: u64,
    /// Frames the bridge dropped because its queue was full
    pub dropped: u64,
}

/// Handle to a running pump.
#[derive(Debug)]
pub struct SourceHandle {
    subscriptions: mpsc::UnboundedSender<String>,
    task: JoinHandle<PumpReport>,
}

impl SourceHandle {
    /// Subscribe the source to another topic.
    ///
    /// Returns `false` if the pump has already ended.
    pub fn subscribe(&self, topic: impl Into<String>) -> bool {
        self.subscriptions.send(topic.into()).is_ok()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the pump to end.
    pub async fn join(self) -> std::result::Result<PumpReport, JoinError> {
        self.task.await
    }
}

/// Spawn a task that forwards every frame from `source` into `arrivals`.
///
/// The source is subscribed to `topics` first; each topic is also registered in
/// the stream stats. The task ends when the source is exhausted, when `cancel`
/// fires, or after too many consecutive source errors.
pub fn spawn_pump<S>(
    source: S,
    arrivals: ArrivalHandle,
    topics: Vec<String>,
    cancel: CancellationToken,
) -> SourceHandle
where
    S: FrameSource,
{
    let (subscriptions, requests) = mpsc::unbounded_channel();
    let task = tokio::spawn(pump(source, arrivals, topics, requests, cancel));
    SourceHandle { subscriptions, task }
}

enum PumpEvent {
    Frame(Result<Option<RawFrame>>),
    Subscribe(String),
}

async fn subscribe_topics<S>(source: &mut S, arrivals: &ArrivalHandle, topics: &[String])
where
    S: FrameSource,
{
    if topics.is_empty() {
        return;
    }
    match source.subscribe(topics).await {
        Ok(()) => {
            for topic in topics {
                arrivals.stats().register(topic);
            }
            debug!(?topics, "Source subscribed");
        }
        Err(e) => error!(?topics, "Failed to subscribe source: {}", e),
    }
}

async fn pump<S>(
    mut source: S,
    arrivals: ArrivalHandle,
    topics: Vec<String>,
    mut requests: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) -> PumpReport
where
    S: FrameSource,
{
    info!("Source pump started");
    let mut report = PumpReport::default();
    let mut error_count = 0u32;

    subscribe_topics(&mut source, &arrivals, &topics).await;

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Source pump cancelled");
                break;
            }
            Some(topic) = requests.recv() => PumpEvent::Subscribe(topic),
            result = source.next_frame() => PumpEvent::Frame(result),
        };

        let result = match event {
            PumpEvent::Subscribe(topic) => {
                subscribe_topics(&mut source, &arrivals, &[topic]).await;
                continue;
            }
            PumpEvent::Frame(result) => result,
        };

        match result {
            Ok(Some(frame)) => {
                error_count = 0;
                trace!(topic = %frame.topic, bytes = frame.payload.len(), "Forwarding frame");
                if arrivals.push(frame) {
                    report.forwarded += 1;
                } else {
                    report.dropped += 1;
                }
            }
            Ok(None) => {
                info!(forwarded = report.forwarded, "Source exhausted");
                break;
            }
            Err(e) => {
                error_count += 1;
                error!("Source error ({}/{}): {}", error_count, MAX_ERRORS, e);

                if error_count >= MAX_ERRORS {
                    error!("Too many source errors, stopping pump");
                    break;
                }

                // 100ms, 200ms, 400ms, ... capped at 1.6s
                let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                tokio::time::sleep(backoff).await;
            }
        }
    }

    info!(forwarded = report.forwarded, dropped = report.dropped, "Source pump ended");
    report
}

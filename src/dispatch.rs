//! Delivery of envelopes to visualization subscribers

use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, trace, warn};

use crate::Result;
use crate::types::OutboundEnvelope;

/// Default number of events buffered per subscriber
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Sink the drain loop hands each envelope to.
///
/// Implementations must not retain the envelope across calls.
#[async_trait::async_trait]
pub trait Dispatcher: Send + Sync + 'static {
    async fn emit(&self, event: &str, envelope: OutboundEnvelope) -> Result<()>;
}

#[async_trait::async_trait]
impl<D: Dispatcher + ?Sized> Dispatcher for Arc<D> {
    async fn emit(&self, event: &str, envelope: OutboundEnvelope) -> Result<()> {
        (**self).emit(event, envelope).await
    }
}

/// An envelope tagged with the event name it was emitted on.
#[derive(Debug, Clone, PartialEq)]
pub struct Emitted {
    pub event: String,
    pub envelope: OutboundEnvelope,
}

/// Fans envelopes out to every live subscriber.
///
/// Emitting with no subscribers succeeds; the envelope is discarded.
/// Slow subscribers skip the envelopes they missed.
#[derive(Debug, Clone)]
pub struct BroadcastDispatcher {
    tx: broadcast::Sender<Arc<Emitted>>,
}

impl BroadcastDispatcher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Stream of envelopes emitted after this call.
    pub fn subscribe(&self) -> impl Stream<Item = Arc<Emitted>> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(|item| async move {
            match item {
                Ok(emitted) => Some(emitted),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscriber lagging, envelopes skipped");
                    None
                }
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }
}

#[async_trait::async_trait]
impl Dispatcher for BroadcastDispatcher {
    async fn emit(&self, event: &str, envelope: OutboundEnvelope) -> Result<()> {
        let topic = envelope.topic.clone();
        let emitted = Arc::new(Emitted { event: event.to_string(), envelope });

        match self.tx.send(emitted) {
            Ok(receivers) => trace!(event, %topic, receivers, "Envelope emitted"),
            Err(_) => debug!(event, %topic, "No subscribers, envelope discarded"),
        }
        Ok(())
    }
}

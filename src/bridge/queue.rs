//! Bounded drop-on-full frame queue

use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::types::RawFrame;

/// Default number of frames held before arrivals are dropped
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Bounded FIFO of raw frames guarded by a single lock.
///
/// When full, new arrivals are rejected; frames already queued are never replaced.
/// The lock is held only for the push or pop itself.
#[derive(Debug)]
pub struct FrameQueue {
    frames: Mutex<VecDeque<RawFrame>>,
    capacity: usize,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self { frames: Mutex::new(VecDeque::with_capacity(capacity)), capacity }
    }

    /// Append `frame` unless the queue is full. Never blocks on capacity.
    ///
    /// A rejected frame is handed back unchanged.
    pub fn try_push(&self, frame: RawFrame) -> Result<(), RawFrame> {
        let mut frames = self.frames.lock();
        if frames.len() < self.capacity {
            frames.push_back(frame);
            Ok(())
        } else {
            Err(frame)
        }
    }

    /// Remove the oldest frame, if any.
    pub fn pop(&self) -> Option<RawFrame> {
        self.frames.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

//! Bounded producer/consumer queue of generation results

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};

use crate::flag::{StopFlag, POLL_INTERVAL};
use crate::snapshot::GenerationResult;

/// Why a blocking queue wait returned without a result.
#[derive(Debug, PartialEq, Eq)]
pub enum QueueInterrupt {
    /// The stop flag turned on while waiting.
    Stopped,
    /// The other side of the channel is gone.
    Disconnected,
}

/// Fixed-capacity FIFO channel between the producer and the consumer.
///
/// This is the sole synchronization boundary between computation and
/// rendering: `put` blocks while the queue is full, which is what throttles
/// a fast simulation down to rendering speed, and `take` blocks while it is
/// empty. Both waits poll the stop flag so a stop request is honored within
/// one poll interval instead of only between generations.
#[derive(Clone)]
pub struct ResultQueue {
    tx: Sender<GenerationResult>,
    rx: Receiver<GenerationResult>,
    capacity: usize,
}

impl ResultQueue {
    /// Creates a queue holding at most `capacity` results. Capacity must be
    /// positive.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        let (tx, rx) = bounded(capacity);
        Self { tx, rx, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Blocking put. Returns the interruption cause if the wait was cut
    /// short; the result is dropped in that case.
    pub fn put(&self, result: GenerationResult, stop: &StopFlag) -> Result<(), QueueInterrupt> {
        let mut item = result;
        loop {
            if stop.is_on() {
                return Err(QueueInterrupt::Stopped);
            }
            match self.tx.send_timeout(item, POLL_INTERVAL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(back)) => item = back,
                Err(SendTimeoutError::Disconnected(_)) => {
                    return Err(QueueInterrupt::Disconnected)
                }
            }
        }
    }

    /// Blocking take, FIFO order.
    pub fn take(&self, stop: &StopFlag) -> Result<GenerationResult, QueueInterrupt> {
        loop {
            if stop.is_on() {
                return Err(QueueInterrupt::Stopped);
            }
            match self.rx.recv_timeout(POLL_INTERVAL) {
                Ok(result) => return Ok(result),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Err(QueueInterrupt::Disconnected),
            }
        }
    }

    /// Discards everything currently buffered. Used by reset to drop stale
    /// generations. Returns how many results were thrown away.
    pub fn drain(&self) -> usize {
        self.rx.try_iter().count()
    }
}

//! Producer and consumer loops joined by the bounded result queue
//!
//! The producer drives the simulation: chunk the frontier, compute, commit,
//! publish. The consumer paces itself to the minimum tick time, hands each
//! snapshot to the view and waits for the render acknowledgment. A blocking
//! put on the full queue is the backpressure that keeps both sides in step.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::cellmap::{lock_map, CellMap};
use crate::error::ComputeError;
use crate::flag::{sleep_unless_stopped, StopFlag};
use crate::pool::ChunkScheduler;
use crate::queue::{QueueInterrupt, ResultQueue};
use crate::snapshot::GenerationResult;
use crate::view::{AckOutcome, GameView, Progress, RenderAck, RenderFrame};

/// Minimum inter-frame interval in milliseconds, shared between the
/// controller (single writer) and the consumer (single reader). That
/// relationship makes plain relaxed loads sufficient; no lock is involved.
#[derive(Clone, Debug)]
pub struct TickTime {
    millis: Arc<AtomicU64>,
}

impl TickTime {
    pub fn new(millis: u64) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(millis)),
        }
    }

    /// Takes effect on the consumer's next iteration.
    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.millis.load(Ordering::Relaxed)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.get())
    }
}

/// Enforces the minimum time between two consecutive render handoffs.
///
/// The very first frame waits out the full interval; afterwards only the
/// remainder since the previous handoff is slept away. The handoff itself is
/// recorded with [`mark`](FramePacer::mark), after the queue take, so a slow
/// generation followed by a buffered one can never squeeze two frames closer
/// together than the tick.
pub(crate) struct FramePacer {
    last_handoff: Option<Instant>,
    tick: TickTime,
}

impl FramePacer {
    pub(crate) fn new(tick: TickTime) -> Self {
        Self {
            last_handoff: None,
            tick,
        }
    }

    /// Returns `false` if a stop request arrived mid-sleep.
    pub(crate) fn limit_fps(&mut self, stop: &StopFlag) -> bool {
        let interval = self.tick.interval();
        let wait = match self.last_handoff {
            Some(last) => interval.saturating_sub(last.elapsed()),
            None => interval,
        };
        if wait.is_zero() {
            return true;
        }
        sleep_unless_stopped(stop, wait)
    }

    /// Records the moment a frame is handed to the view.
    pub(crate) fn mark(&mut self) {
        self.last_handoff = Some(Instant::now());
    }
}

/// Generation loop: compute, commit, publish, until the flag turns on.
pub(crate) fn producer_loop<V: GameView>(
    map: Arc<Mutex<CellMap>>,
    scheduler: Arc<ChunkScheduler>,
    queue: ResultQueue,
    stop: StopFlag,
    view: Arc<V>,
    chunk_size: usize,
) {
    debug!("producer running");
    while !stop.is_on() {
        let mut map = lock_map(&map);
        let started = Instant::now();
        let alive_cells = match scheduler.dispatch(&map, chunk_size, &stop) {
            Ok(alive) => alive,
            Err(ComputeError::Interrupted) => {
                // a stop request landed mid-generation; discard the partial
                // next buffers so a restart recomputes this generation
                map.abort_generation();
                break;
            }
            Err(error) => {
                map.abort_generation();
                warn!("generation computation failed: {error}");
                view.show_alert(
                    "Thread error",
                    &format!(
                        "A worker task died while computing the next generation. \
                         Please reset.\n\n{error}"
                    ),
                );
                stop.set_on();
                break;
            }
        };
        let computation_time = started.elapsed();
        map.commit_generation();
        let result = GenerationResult {
            generation: map.generation_number(),
            cells: map.snapshot(),
            alive_cells,
            computation_time,
        };
        drop(map);

        match queue.put(result, &stop) {
            Ok(()) => {}
            Err(QueueInterrupt::Stopped) => break,
            Err(QueueInterrupt::Disconnected) => {
                if !stop.is_on() {
                    view.show_alert(
                        "Thread error",
                        "The producer lost its queue while the game was running. Please reset.",
                    );
                    stop.set_on();
                }
                break;
            }
        }
    }
    debug!("producer finished");
}

/// Render pump: pace, take, hand off, await acknowledgment.
pub(crate) fn consumer_loop<V: GameView>(
    queue: ResultQueue,
    view: Arc<V>,
    stop: StopFlag,
    tick: TickTime,
) {
    debug!("consumer running");
    let mut pacer = FramePacer::new(tick);
    while !stop.is_on() {
        if !pacer.limit_fps(&stop) {
            break;
        }
        if !stop.is_on() {
            view.update_progress(Progress::Indeterminate("Computing next generation..."));
        }
        let result = match queue.take(&stop) {
            Ok(result) => result,
            Err(QueueInterrupt::Stopped) => break,
            Err(QueueInterrupt::Disconnected) => {
                if !stop.is_on() {
                    view.show_alert(
                        "Thread error",
                        "The consumer lost its queue while the game was running. Please reset.",
                    );
                    stop.set_on();
                }
                break;
            }
        };

        pacer.mark();
        let frame = RenderFrame {
            generation: result.generation,
            alive_cells: result.alive_cells,
            computation_time: result.computation_time,
            cells: result.cells,
        };
        view.update_progress(Progress::Fraction(0.0));
        let (ack, wait) = RenderAck::channel();
        view.draw_cells(&frame, ack);
        match wait.wait(&stop) {
            AckOutcome::Acknowledged => {}
            AckOutcome::Stopped => break,
            AckOutcome::Abandoned => {
                if !stop.is_on() {
                    view.show_alert(
                        "Thread error",
                        "The view abandoned a render without acknowledging it. Please reset.",
                    );
                    stop.set_on();
                }
                break;
            }
        }
    }
    debug!("consumer finished");
}

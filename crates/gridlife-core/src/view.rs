//! View boundary - the contract between the engine and its front-end
//!
//! The engine never draws anything itself. It pushes render requests and
//! progress updates through [`GameView`] and receives control only through
//! the engine API. The one assumption made about the view's threading is the
//! acknowledgment contract on [`GameView::draw_cells`]: exactly one render
//! request is outstanding at any time.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use std::time::Duration;

use crate::flag::{StopFlag, POLL_INTERVAL};
use crate::snapshot::GridSnapshot;

/// Progress feedback pushed to the view.
#[derive(Clone, Debug, PartialEq)]
pub enum Progress {
    /// Fractional completion of the in-flight generation, 0..=1.
    Fraction(f64),
    /// Busy with no measurable fraction; the label says what is going on.
    Indeterminate(&'static str),
}

/// One render request: everything the view needs to draw a generation.
#[derive(Clone, Debug)]
pub struct RenderFrame {
    pub generation: u64,
    pub alive_cells: u64,
    pub computation_time: Duration,
    pub cells: GridSnapshot,
}

/// One-shot acknowledgment the view fires once a frame is on screen.
///
/// Consuming `done` enforces the at-most-one-ack contract. Dropping the
/// handle without acknowledging counts as abandoning the frame.
pub struct RenderAck {
    tx: Sender<()>,
}

impl RenderAck {
    /// Creates a paired acknowledgment handle and waiter.
    pub(crate) fn channel() -> (RenderAck, AckWait) {
        let (tx, rx) = bounded(1);
        (RenderAck { tx }, AckWait { rx })
    }

    /// Signals render completion.
    pub fn done(self) {
        // the consumer may already have stopped waiting during shutdown
        let _ = self.tx.send(());
    }
}

/// Consumer-side handle blocking until the view acknowledges a frame.
pub(crate) struct AckWait {
    rx: Receiver<()>,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum AckOutcome {
    /// The view finished rendering.
    Acknowledged,
    /// A stop request arrived while waiting.
    Stopped,
    /// The view dropped the handle without acknowledging.
    Abandoned,
}

impl AckWait {
    pub(crate) fn wait(&self, stop: &StopFlag) -> AckOutcome {
        loop {
            match self.rx.recv_timeout(POLL_INTERVAL) {
                Ok(()) => return AckOutcome::Acknowledged,
                Err(RecvTimeoutError::Timeout) => {
                    if stop.is_on() {
                        return AckOutcome::Stopped;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return AckOutcome::Abandoned,
            }
        }
    }
}

/// The external collaborator receiving render requests, progress updates and
/// lifecycle notifications.
///
/// Methods are called from engine-owned threads; implementations forward to
/// whatever threading model their toolkit requires.
pub trait GameView: Send + Sync + 'static {
    /// Initial cell map dimensions, asked once per initialization. `None`
    /// means the user supplied nothing usable and the start is aborted.
    fn map_dimension(&self) -> Option<(usize, usize)>;

    /// Draw one generation. The view must eventually call `done.done()`;
    /// no further frame is sent until it does.
    fn draw_cells(&self, frame: &RenderFrame, done: RenderAck);

    /// Progress feedback for the generation currently being computed.
    fn update_progress(&self, _progress: Progress) {}

    fn set_started(&self) {}

    fn set_stopped(&self) {}

    fn reset_view(&self) {}

    /// User-visible error reporting.
    fn show_alert(&self, _header: &str, _message: &str) {}
}

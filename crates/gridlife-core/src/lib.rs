//! GridLife Core - Concurrent Game of Life Engine
//!
//! A double-buffered cell grid stepped by chunked parallel computation and
//! published through a bounded producer/consumer pipeline:
//!
//! - **CellMap**: committed and next-generation state plus neighbor-count
//!   buffers, with a frontier of the cells that can actually change
//! - **ChunkScheduler**: fixed worker pool, one compute task per frontier
//!   chunk, no partial generations
//! - **Producer/Consumer**: generation loop and frame-paced render pump,
//!   joined by a bounded FIFO queue whose blocking put is the backpressure
//! - **GameEngine**: controller exposing start/stop/reset and the view speed
//!
//! Rendering lives entirely behind the [`view::GameView`] contract; the
//! engine pushes frames and progress, the view acknowledges each render.
//!
//! # Example
//!
//! ```rust,no_run
//! use gridlife_core::prelude::*;
//!
//! struct HeadlessView;
//!
//! impl GameView for HeadlessView {
//!     fn map_dimension(&self) -> Option<(usize, usize)> {
//!         Some((64, 64))
//!     }
//!
//!     fn draw_cells(&self, frame: &RenderFrame, done: RenderAck) {
//!         println!("generation {}: {} alive", frame.generation, frame.alive_cells);
//!         done.done();
//!     }
//! }
//!
//! let mut engine = GameEngine::new(HeadlessView, SimConfig::default())?;
//! engine.start()?;
//! std::thread::sleep(std::time::Duration::from_secs(10));
//! engine.stop();
//! # Ok::<(), gridlife_core::error::EngineError>(())
//! ```

pub mod cellmap;
pub mod config;
pub mod engine;
pub mod error;
pub mod flag;
pub mod pipeline;
pub mod pool;
pub mod progress;
pub mod queue;
pub mod snapshot;
pub mod view;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::cellmap::{CellMap, Pos};
    pub use crate::config::SimConfig;
    pub use crate::engine::GameEngine;
    pub use crate::error::{ComputeError, EngineError};
    pub use crate::flag::StopFlag;
    pub use crate::pipeline::TickTime;
    pub use crate::pool::ChunkScheduler;
    pub use crate::queue::ResultQueue;
    pub use crate::snapshot::{GenerationResult, GridSnapshot};
    pub use crate::view::{GameView, Progress, RenderAck, RenderFrame};
}

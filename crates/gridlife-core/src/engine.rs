//! Game engine - the controller wiring model, pipeline and view together

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use crate::cellmap::{lock_map, CellMap};
use crate::config::SimConfig;
use crate::error::EngineError;
use crate::flag::StopFlag;
use crate::pipeline::{consumer_loop, producer_loop, TickTime};
use crate::pool::ChunkScheduler;
use crate::progress::sampler_loop;
use crate::queue::ResultQueue;
use crate::view::{GameView, Progress, RenderAck, RenderFrame};

/// Controller for one simulation session.
///
/// Owns the cell map, the worker pool, the result queue and the stop flag,
/// and spawns the producer, consumer and progress-sampler threads on
/// [`start`](GameEngine::start). All view interaction goes through the
/// [`GameView`] contract.
pub struct GameEngine<V: GameView> {
    view: Arc<V>,
    config: SimConfig,
    scheduler: Arc<ChunkScheduler>,
    queue: ResultQueue,
    stop: StopFlag,
    tick: TickTime,
    map: Option<Arc<Mutex<CellMap>>>,
    dimension: Option<(usize, usize)>,
    workers: Vec<JoinHandle<()>>,
}

impl<V: GameView> GameEngine<V> {
    pub fn new(view: V, config: SimConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let stop = StopFlag::new();
        // nothing runs until start() clears the flag
        stop.set_on();
        Ok(Self {
            view: Arc::new(view),
            scheduler: Arc::new(ChunkScheduler::new(config.workers)),
            queue: ResultQueue::new(config.queue_capacity),
            tick: TickTime::new(config.min_tick_ms),
            stop,
            map: None,
            dimension: None,
            workers: Vec::new(),
            config,
        })
    }

    pub fn is_running(&self) -> bool {
        !self.stop.is_on()
    }

    /// Launches the pipeline. On the first start (and after every reset) the
    /// view is asked for dimensions and the map is created and seeded to
    /// roughly half alive. Starting while already running is a no-op.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.is_running() {
            return Ok(());
        }
        self.join_workers();

        if self.map.is_none() {
            self.init_map()?;
        }
        let map = match &self.map {
            Some(map) => Arc::clone(map),
            None => return Err(EngineError::NoDimension),
        };
        let tracker = lock_map(&map).progress();

        self.stop.set_off();

        let producer_stop = self.stop.clone();
        let producer_view = Arc::clone(&self.view);
        let producer_queue = self.queue.clone();
        let producer_scheduler = Arc::clone(&self.scheduler);
        let chunk_size = self.config.chunk_size;
        self.workers.push(thread::spawn(move || {
            producer_loop(
                map,
                producer_scheduler,
                producer_queue,
                producer_stop,
                producer_view,
                chunk_size,
            )
        }));

        let consumer_stop = self.stop.clone();
        let consumer_view = Arc::clone(&self.view);
        let consumer_queue = self.queue.clone();
        let consumer_tick = self.tick.clone();
        self.workers.push(thread::spawn(move || {
            consumer_loop(consumer_queue, consumer_view, consumer_stop, consumer_tick)
        }));

        let sampler_stop = self.stop.clone();
        let sampler_view = Arc::clone(&self.view);
        let sampler_queue = self.queue.clone();
        let period = Duration::from_millis(self.config.progress_period_ms);
        self.workers.push(thread::spawn(move || {
            sampler_loop(sampler_queue, tracker, sampler_view, sampler_stop, period)
        }));

        self.view.set_started();
        info!("engine started");
        Ok(())
    }

    /// Sets the flag and waits for the pipeline threads to wind down.
    /// Stopping an already-stopped engine changes nothing.
    pub fn stop(&mut self) {
        if self.is_running() {
            self.stop.set_on();
            info!("engine stopping");
        }
        self.join_workers();
        self.view.set_stopped();
    }

    /// Stops, discards buffered results, clears the map. The next start
    /// reinitializes from fresh view-supplied dimensions.
    pub fn reset(&mut self) {
        self.stop.set_on();
        self.join_workers();

        let discarded = self.queue.drain();
        if discarded > 0 {
            debug!("discarded {discarded} stale generation results");
        }
        if let Some(map) = &self.map {
            lock_map(map).clear();
        }
        self.map = None;
        self.dimension = None;
        self.view.reset_view();
        info!("engine reset");
    }

    /// New minimum tick time, picked up by the consumer on its next
    /// iteration.
    pub fn set_view_speed(&self, millis: u64) {
        self.tick.set(millis);
        debug!("minimum tick time set to {millis} ms");
    }

    pub fn view_speed(&self) -> u64 {
        self.tick.get()
    }

    /// Dimensions of the current map, if one has been initialized.
    pub fn cell_map_dimension(&self) -> Option<(usize, usize)> {
        self.dimension
    }

    fn init_map(&mut self) -> Result<(), EngineError> {
        let (width, height) = match self.view.map_dimension() {
            Some(dimension) => dimension,
            None => {
                self.view.show_alert(
                    "Failed to init",
                    "No cell map dimensions were provided. Fill in the size fields and try again.",
                );
                return Err(EngineError::NoDimension);
            }
        };
        let mut map = match CellMap::new(width, height) {
            Ok(map) => map,
            Err(error) => {
                self.view.show_alert("Failed to init", &error.to_string());
                return Err(error);
            }
        };

        self.view
            .update_progress(Progress::Indeterminate("Initializing..."));
        let attempts = width * height / 2;
        let seeded = self.scheduler.seed(&map, attempts);
        map.commit_generation();
        info!("cell map initialized: {width}x{height}, {seeded} cells alive");

        self.dimension = Some((width, height));
        self.view.reset_view();

        // hand the seeded grid to the view; the first acknowledgment is not
        // awaited, the consumer enforces the contract from the next frame on
        let cells = map.snapshot();
        let alive_cells = cells.alive_count();
        let (ack, _first_frame) = RenderAck::channel();
        self.view.draw_cells(
            &RenderFrame {
                generation: map.generation_number(),
                alive_cells,
                computation_time: Duration::ZERO,
                cells,
            },
            ack,
        );

        self.map = Some(Arc::new(Mutex::new(map)));
        Ok(())
    }

    fn join_workers(&mut self) {
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("pipeline thread panicked before exiting");
            }
        }
    }
}

impl<V: GameView> Drop for GameEngine<V> {
    fn drop(&mut self) {
        self.stop.set_on();
        self.join_workers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Instant;

    #[derive(Default)]
    struct RecordingView {
        dimension: Option<(usize, usize)>,
        frames: StdMutex<Vec<(u64, u64, u64)>>,
        frame_times: StdMutex<Vec<Instant>>,
        alerts: StdMutex<Vec<String>>,
        dimension_requests: AtomicUsize,
        started: AtomicUsize,
        stopped: AtomicUsize,
        resets: AtomicUsize,
    }

    impl RecordingView {
        fn sized(width: usize, height: usize) -> Self {
            Self {
                dimension: Some((width, height)),
                ..Self::default()
            }
        }

        fn frames(&self) -> Vec<(u64, u64, u64)> {
            self.frames.lock().expect("frames lock").clone()
        }
    }

    impl GameView for Arc<RecordingView> {
        fn map_dimension(&self) -> Option<(usize, usize)> {
            self.dimension_requests.fetch_add(1, Ordering::SeqCst);
            self.dimension
        }

        fn draw_cells(&self, frame: &RenderFrame, done: RenderAck) {
            self.frames.lock().expect("frames lock").push((
                frame.generation,
                frame.alive_cells,
                frame.cells.alive_count(),
            ));
            self.frame_times
                .lock()
                .expect("times lock")
                .push(Instant::now());
            done.done();
        }

        fn update_progress(&self, progress: Progress) {
            if let Progress::Fraction(fraction) = progress {
                assert!((0.0..=1.0).contains(&fraction));
            }
        }

        fn set_started(&self) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn set_stopped(&self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }

        fn reset_view(&self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }

        fn show_alert(&self, header: &str, message: &str) {
            self.alerts
                .lock()
                .expect("alerts lock")
                .push(format!("{header}: {message}"));
        }
    }

    fn fast_config() -> SimConfig {
        SimConfig {
            min_tick_ms: 5,
            progress_period_ms: 20,
            workers: Some(2),
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_start_runs_pipeline_in_order() {
        let view = Arc::new(RecordingView::sized(16, 16));
        let mut engine =
            GameEngine::new(Arc::clone(&view), fast_config()).expect("engine construction");

        engine.start().expect("start failed");
        assert!(engine.is_running());
        thread::sleep(Duration::from_millis(200));
        engine.stop();
        assert!(!engine.is_running());

        let frames = view.frames();
        assert!(frames.len() >= 3, "expected several frames, got {frames:?}");
        // the initial seeded frame is generation 1, produced results follow
        assert_eq!(frames[0].0, 1);
        for window in frames.windows(2) {
            assert_eq!(window[1].0, window[0].0 + 1, "generation skipped");
        }
        // the published alive count always matches the snapshot
        for &(_, alive, counted) in &frames {
            assert_eq!(alive, counted);
        }
        assert_eq!(view.started.load(Ordering::SeqCst), 1);
        assert!(view.stopped.load(Ordering::SeqCst) >= 1);
        assert!(view.alerts.lock().expect("alerts lock").is_empty());
    }

    #[test]
    fn test_frame_pacing_is_enforced() {
        let view = Arc::new(RecordingView::sized(12, 12));
        let config = SimConfig {
            min_tick_ms: 40,
            ..fast_config()
        };
        let mut engine = GameEngine::new(Arc::clone(&view), config).expect("engine construction");

        engine.start().expect("start failed");
        thread::sleep(Duration::from_millis(300));
        engine.stop();

        let times = view.frame_times.lock().expect("times lock").clone();
        assert!(times.len() >= 3, "expected several paced frames");
        // skip the unpaced initial frame; 2 ms slack for the gap between the
        // pacer's anchor and the recording point inside the view
        for window in times[1..].windows(2) {
            assert!(
                window[1].duration_since(window[0]) >= Duration::from_millis(38),
                "consumer ran faster than the minimum tick"
            );
        }
    }

    #[test]
    fn test_stop_is_idempotent() {
        let view = Arc::new(RecordingView::sized(8, 8));
        let mut engine =
            GameEngine::new(Arc::clone(&view), fast_config()).expect("engine construction");

        engine.start().expect("start failed");
        thread::sleep(Duration::from_millis(50));
        engine.stop();
        let frames_after_stop = view.frames().len();
        engine.stop();
        engine.stop();
        assert_eq!(view.frames().len(), frames_after_stop);
        assert!(view.alerts.lock().expect("alerts lock").is_empty());
    }

    #[test]
    fn test_reset_clears_session() {
        let view = Arc::new(RecordingView::sized(8, 8));
        let mut engine =
            GameEngine::new(Arc::clone(&view), fast_config()).expect("engine construction");

        engine.start().expect("start failed");
        thread::sleep(Duration::from_millis(60));
        engine.reset();

        assert!(!engine.is_running());
        assert!(engine.cell_map_dimension().is_none());
        assert!(view.resets.load(Ordering::SeqCst) >= 1);

        // a fresh start asks the view for dimensions again and the
        // generation numbering restarts from the seeded frame
        let requests_before = view.dimension_requests.load(Ordering::SeqCst);
        view.frames.lock().expect("frames lock").clear();
        engine.start().expect("restart failed");
        thread::sleep(Duration::from_millis(60));
        engine.stop();

        assert_eq!(
            view.dimension_requests.load(Ordering::SeqCst),
            requests_before + 1
        );
        let frames = view.frames();
        assert!(!frames.is_empty());
        assert_eq!(frames[0].0, 1);
    }

    #[test]
    fn test_start_without_dimensions_alerts() {
        let view = Arc::new(RecordingView::default());
        let mut engine =
            GameEngine::new(Arc::clone(&view), fast_config()).expect("engine construction");

        assert!(matches!(engine.start(), Err(EngineError::NoDimension)));
        assert!(!engine.is_running());
        assert_eq!(view.alerts.lock().expect("alerts lock").len(), 1);
    }

    #[test]
    fn test_start_with_invalid_dimensions_alerts() {
        let view = Arc::new(RecordingView::sized(0, 10));
        let mut engine =
            GameEngine::new(Arc::clone(&view), fast_config()).expect("engine construction");

        assert!(matches!(
            engine.start(),
            Err(EngineError::InvalidDimension { .. })
        ));
        assert_eq!(view.alerts.lock().expect("alerts lock").len(), 1);
    }

    #[test]
    fn test_view_speed_round_trip() {
        let view = Arc::new(RecordingView::sized(8, 8));
        let engine = GameEngine::new(Arc::clone(&view), fast_config()).expect("engine construction");
        assert_eq!(engine.view_speed(), 5);
        engine.set_view_speed(250);
        assert_eq!(engine.view_speed(), 250);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let view = Arc::new(RecordingView::sized(8, 8));
        let config = SimConfig {
            queue_capacity: 0,
            ..SimConfig::default()
        };
        assert!(matches!(
            GameEngine::new(Arc::clone(&view), config),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}

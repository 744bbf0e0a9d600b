//! GridLife Headless Simulation Harness
//!
//! Validates the engine's observable properties end-to-end, without any
//! real front-end: rule correctness, determinism, backpressure, pacing and
//! lifecycle. Runs entirely in-process.
//!
//! Usage:
//!   cargo run -p gridlife-simtest
//!   cargo run -p gridlife-simtest -- --verbose

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use gridlife_core::prelude::*;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    env_logger::init();
    let verbose = std::env::args().any(|a| a == "--verbose");
    println!("=== GridLife Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Transition rule on reference patterns
    results.extend(validate_patterns(verbose));

    // 2. Neighbor-count invariant under random evolutions
    results.extend(validate_neighbor_counts(verbose));

    // 3. Determinism across chunk sizes and pool widths
    results.extend(validate_determinism(verbose));

    // 4. Queue ordering and backpressure
    results.extend(validate_queue(verbose));

    // 5. Full pipeline through the engine API
    results.extend(validate_pipeline(verbose));

    // 6. Frame pacing
    results.extend(validate_pacing(verbose));

    // 7. Lifecycle: idempotent stop, reset
    results.extend(validate_lifecycle(verbose));

    // 8. Configuration round trip
    results.extend(validate_config(verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── Shared helpers ──────────────────────────────────────────────────────

fn seeded_map(width: usize, height: usize, alive: &[(usize, usize)]) -> CellMap {
    let mut map = CellMap::new(width, height).expect("valid dimensions");
    for &(x, y) in alive {
        map.seed_cell(Pos::new(x, y));
    }
    map.commit_generation();
    map
}

fn step(map: &mut CellMap) -> u64 {
    let frontier = map.frontier().to_vec();
    let alive = map.compute_cells(&frontier);
    map.commit_generation();
    alive
}

fn alive_positions(map: &CellMap) -> Vec<(usize, usize)> {
    let mut positions = Vec::new();
    for y in 0..map.height() {
        for x in 0..map.width() {
            if map.is_alive(Pos::new(x, y)) {
                positions.push((x, y));
            }
        }
    }
    positions
}

/// A view that renders instantly and records everything it sees.
#[derive(Default)]
struct HarnessView {
    dimension: Option<(usize, usize)>,
    generations: Mutex<Vec<u64>>,
    alive_counts: Mutex<Vec<(u64, u64)>>,
    handoff_times: Mutex<Vec<Instant>>,
    rendered: AtomicU64,
    dimension_requests: AtomicUsize,
    alerts: AtomicUsize,
}

impl HarnessView {
    fn sized(width: usize, height: usize) -> Arc<Self> {
        Arc::new(Self {
            dimension: Some((width, height)),
            ..Self::default()
        })
    }
}

impl GameView for HarnessView {
    fn map_dimension(&self) -> Option<(usize, usize)> {
        self.dimension_requests.fetch_add(1, Ordering::SeqCst);
        self.dimension
    }

    fn draw_cells(&self, frame: &RenderFrame, done: RenderAck) {
        self.generations
            .lock()
            .expect("generations lock")
            .push(frame.generation);
        self.alive_counts
            .lock()
            .expect("alive lock")
            .push((frame.alive_cells, frame.cells.alive_count()));
        self.handoff_times
            .lock()
            .expect("times lock")
            .push(Instant::now());
        self.rendered.fetch_add(1, Ordering::SeqCst);
        done.done();
    }

    fn show_alert(&self, _header: &str, _message: &str) {
        self.alerts.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands the engine an owned view while the test keeps its `Arc` handle.
///
/// Orphan rules forbid implementing the foreign `GameView` trait directly for
/// `Arc<HarnessView>` from this crate, so this local newtype carries the shared
/// handle and forwards every callback to the same instance the test inspects.
struct SharedHarnessView(Arc<HarnessView>);

impl GameView for SharedHarnessView {
    fn map_dimension(&self) -> Option<(usize, usize)> {
        self.0.map_dimension()
    }

    fn draw_cells(&self, frame: &RenderFrame, done: RenderAck) {
        self.0.draw_cells(frame, done)
    }

    fn update_progress(&self, progress: Progress) {
        self.0.update_progress(progress)
    }

    fn set_started(&self) {
        self.0.set_started()
    }

    fn set_stopped(&self) {
        self.0.set_stopped()
    }

    fn reset_view(&self) {
        self.0.reset_view()
    }

    fn show_alert(&self, header: &str, message: &str) {
        self.0.show_alert(header, message)
    }
}

// ── 1. Transition rule patterns ─────────────────────────────────────────

fn validate_patterns(_verbose: bool) -> Vec<TestResult> {
    println!("--- Transition Rule Patterns ---");
    let mut results = Vec::new();

    // 2x2 block: still life across generations
    let block = [(1, 1), (2, 1), (1, 2), (2, 2)];
    let mut map = seeded_map(4, 4, &block);
    let mut stable = true;
    for _ in 0..10 {
        step(&mut map);
        if alive_positions(&map) != vec![(1, 1), (2, 1), (1, 2), (2, 2)] {
            stable = false;
        }
    }
    results.push(TestResult {
        name: "pattern_block_still_life".into(),
        passed: stable,
        detail: "2x2 block unchanged over 10 generations".into(),
    });

    // lone cell: dead next generation
    let mut map = seeded_map(5, 5, &[(2, 2)]);
    let alive = step(&mut map);
    results.push(TestResult {
        name: "pattern_lone_cell_dies".into(),
        passed: alive == 0,
        detail: format!("isolated cell -> {} alive after one step", alive),
    });

    // pair: both underpopulated
    let mut map = seeded_map(5, 5, &[(1, 2), (2, 2)]);
    let alive = step(&mut map);
    results.push(TestResult {
        name: "pattern_pair_dies".into(),
        passed: alive == 0,
        detail: format!("two neighbors -> {} alive after one step", alive),
    });

    // blinker: period 2
    let mut map = seeded_map(3, 3, &[(1, 0), (1, 1), (1, 2)]);
    step(&mut map);
    let horizontal = alive_positions(&map) == vec![(0, 1), (1, 1), (2, 1)];
    step(&mut map);
    let vertical = alive_positions(&map) == vec![(1, 0), (1, 1), (1, 2)];
    results.push(TestResult {
        name: "pattern_blinker_period_2".into(),
        passed: horizontal && vertical,
        detail: format!("flip={} flip_back={}", horizontal, vertical),
    });

    results
}

// ── 2. Neighbor-count invariant ─────────────────────────────────────────

fn validate_neighbor_counts(verbose: bool) -> Vec<TestResult> {
    println!("--- Neighbor-Count Invariant ---");
    let mut results = Vec::new();

    let map = CellMap::new(24, 24).expect("valid dimensions");
    let scheduler = ChunkScheduler::new(None);
    let seeded = scheduler.seed(&map, 24 * 24 / 2);
    let mut map = map;
    map.commit_generation();

    if verbose {
        println!("  seeded {} of {} attempts", seeded, 24 * 24 / 2);
    }

    let stop = StopFlag::new();
    let mut violations = 0usize;
    let mut frontier_leaks = 0usize;
    for _ in 0..15 {
        scheduler
            .dispatch(&map, 50, &stop)
            .expect("dispatch failed");
        map.commit_generation();

        for y in 0..map.height() {
            for x in 0..map.width() {
                let pos = Pos::new(x, y);
                let mut expected = 0u8;
                for ny in y.saturating_sub(1)..=(y + 1).min(map.height() - 1) {
                    for nx in x.saturating_sub(1)..=(x + 1).min(map.width() - 1) {
                        if (nx, ny) != (x, y) && map.is_alive(Pos::new(nx, ny)) {
                            expected += 1;
                        }
                    }
                }
                let actual = map.neighbor_count(pos);
                if actual != expected || actual > 8 {
                    violations += 1;
                }
                let in_frontier = map.frontier().contains(&pos);
                if !map.is_alive(pos) && actual == 0 && in_frontier {
                    frontier_leaks += 1;
                }
            }
        }
    }

    results.push(TestResult {
        name: "counts_exact_after_commit".into(),
        passed: violations == 0,
        detail: format!("{} mismatches over 15 generations", violations),
    });
    results.push(TestResult {
        name: "frontier_excludes_isolated_dead".into(),
        passed: frontier_leaks == 0,
        detail: format!("{} dead zero-neighbor cells in frontier", frontier_leaks),
    });

    results
}

// ── 3. Determinism ──────────────────────────────────────────────────────

fn validate_determinism(verbose: bool) -> Vec<TestResult> {
    println!("--- Determinism ---");
    let mut results = Vec::new();

    let pentomino = [(9, 8), (10, 8), (8, 9), (9, 9), (9, 10)];
    let shapes: [(usize, Option<usize>); 4] =
        [(1, Some(1)), (7, Some(2)), (100, Some(8)), (1000, None)];

    let mut snapshots: Vec<GridSnapshot> = Vec::new();
    for &(chunk_size, workers) in &shapes {
        let mut map = seeded_map(20, 20, &pentomino);
        let scheduler = ChunkScheduler::new(workers);
        let stop = StopFlag::new();
        for _ in 0..20 {
            scheduler
                .dispatch(&map, chunk_size, &stop)
                .expect("dispatch failed");
            map.commit_generation();
        }
        snapshots.push(map.snapshot());
    }

    let identical = snapshots.windows(2).all(|pair| pair[0] == pair[1]);
    results.push(TestResult {
        name: "determinism_chunk_and_pool_sweep".into(),
        passed: identical,
        detail: format!(
            "{} configurations agree after 20 generations ({} alive)",
            shapes.len(),
            snapshots[0].alive_count()
        ),
    });

    if verbose {
        for (&(chunk, workers), snapshot) in shapes.iter().zip(&snapshots) {
            println!(
                "  chunk={:<5} workers={:<5} alive={}",
                chunk,
                workers.map_or("auto".into(), |w: usize| w.to_string()),
                snapshot.alive_count()
            );
        }
    }

    results
}

// ── 4. Queue ordering and backpressure ──────────────────────────────────

fn validate_queue(_verbose: bool) -> Vec<TestResult> {
    println!("--- Queue & Backpressure ---");
    let mut results = Vec::new();

    let queue = ResultQueue::new(3);
    let stop = StopFlag::new();

    let make = |generation: u64| GenerationResult {
        generation,
        cells: GridSnapshot::new(1, 1, vec![false].into_boxed_slice()),
        alive_cells: 0,
        computation_time: Duration::ZERO,
    };

    let producer_queue = queue.clone();
    let producer_stop = stop.clone();
    let blocked = Arc::new(AtomicU64::new(0));
    let blocked_probe = Arc::clone(&blocked);
    let producer = thread::spawn(move || {
        for generation in 1..=10 {
            producer_queue
                .put(make(generation), &producer_stop)
                .expect("put failed");
            blocked_probe.store(generation, Ordering::SeqCst);
        }
    });

    thread::sleep(Duration::from_millis(150));
    let sent_while_full = blocked.load(Ordering::SeqCst);
    let capped = queue.len() <= queue.capacity();

    let mut in_order = true;
    let mut max_len = queue.len();
    for generation in 1..=10 {
        let taken = queue.take(&stop).expect("take failed");
        if taken.generation != generation {
            in_order = false;
        }
        max_len = max_len.max(queue.len());
    }
    producer.join().expect("producer panicked");

    results.push(TestResult {
        name: "queue_backpressure_blocks".into(),
        passed: sent_while_full == 3 && capped,
        detail: format!(
            "producer stalled after {} puts (capacity 3)",
            sent_while_full
        ),
    });
    results.push(TestResult {
        name: "queue_fifo_no_loss".into(),
        passed: in_order && max_len <= 3,
        detail: format!("10 results in order, peak length {}", max_len),
    });

    results
}

// ── 5. Pipeline through the engine API ──────────────────────────────────

fn validate_pipeline(_verbose: bool) -> Vec<TestResult> {
    println!("--- Engine Pipeline ---");
    let mut results = Vec::new();

    let view = HarnessView::sized(24, 24);
    let config = SimConfig {
        min_tick_ms: 5,
        progress_period_ms: 25,
        ..SimConfig::default()
    };
    let mut engine =
        GameEngine::new(SharedHarnessView(Arc::clone(&view)), config).expect("engine construction failed");

    engine.start().expect("start failed");
    thread::sleep(Duration::from_millis(300));
    engine.stop();

    let generations = view.generations.lock().expect("generations lock").clone();
    let ordered = generations.windows(2).all(|w| w[1] == w[0] + 1);
    let first_is_seeded = generations.first() == Some(&1);
    results.push(TestResult {
        name: "pipeline_generations_in_order".into(),
        passed: generations.len() >= 3 && ordered && first_is_seeded,
        detail: format!(
            "{} frames, strictly increasing from generation 1",
            generations.len()
        ),
    });

    let counts = view.alive_counts.lock().expect("alive lock").clone();
    let consistent = counts.iter().all(|&(published, counted)| published == counted);
    results.push(TestResult {
        name: "pipeline_alive_counts_consistent".into(),
        passed: consistent,
        detail: "published alive count equals snapshot count".into(),
    });

    results.push(TestResult {
        name: "pipeline_no_alerts".into(),
        passed: view.alerts.load(Ordering::SeqCst) == 0,
        detail: "no error alerts during a clean run".into(),
    });

    results
}

// ── 6. Frame pacing ─────────────────────────────────────────────────────

fn validate_pacing(verbose: bool) -> Vec<TestResult> {
    println!("--- Frame Pacing ---");
    let mut results = Vec::new();

    let tick = Duration::from_millis(40);
    let view = HarnessView::sized(16, 16);
    let config = SimConfig {
        min_tick_ms: tick.as_millis() as u64,
        ..SimConfig::default()
    };
    let mut engine =
        GameEngine::new(SharedHarnessView(Arc::clone(&view)), config).expect("engine construction failed");

    engine.start().expect("start failed");
    thread::sleep(Duration::from_millis(400));
    engine.stop();

    let times = view.handoff_times.lock().expect("times lock").clone();
    // the first frame is the unpaced initial draw
    let paced = &times[1..];
    let mut min_gap = Duration::MAX;
    for pair in paced.windows(2) {
        min_gap = min_gap.min(pair[1].duration_since(pair[0]));
    }

    // 2 ms scheduling tolerance between the pacer anchor and the recording
    // point inside the view
    let tolerance = Duration::from_millis(2);
    let enough = paced.len() >= 2;
    results.push(TestResult {
        name: "pacing_minimum_interval".into(),
        passed: enough && min_gap + tolerance >= tick,
        detail: format!(
            "{} paced frames, smallest gap {:?} (minimum {:?})",
            paced.len(),
            min_gap,
            tick
        ),
    });

    if verbose {
        for pair in paced.windows(2) {
            println!("  gap: {:?}", pair[1].duration_since(pair[0]));
        }
    }

    results
}

// ── 7. Lifecycle ────────────────────────────────────────────────────────

fn validate_lifecycle(_verbose: bool) -> Vec<TestResult> {
    println!("--- Lifecycle ---");
    let mut results = Vec::new();

    let view = HarnessView::sized(12, 12);
    let config = SimConfig {
        min_tick_ms: 5,
        ..SimConfig::default()
    };
    let mut engine =
        GameEngine::new(SharedHarnessView(Arc::clone(&view)), config).expect("engine construction failed");

    engine.start().expect("start failed");
    thread::sleep(Duration::from_millis(80));
    engine.stop();

    // idempotent stop: no new frames, no alerts, no panic
    let frames_after_stop = view.rendered.load(Ordering::SeqCst);
    engine.stop();
    engine.stop();
    let idempotent = view.rendered.load(Ordering::SeqCst) == frames_after_stop
        && view.alerts.load(Ordering::SeqCst) == 0;
    results.push(TestResult {
        name: "lifecycle_stop_idempotent".into(),
        passed: idempotent,
        detail: "repeated stop changes nothing".into(),
    });

    // reset: dimensions gone, restart reinitializes and renumbers
    engine.reset();
    let cleared = engine.cell_map_dimension().is_none();
    let requests_before = view.dimension_requests.load(Ordering::SeqCst);
    view.generations.lock().expect("generations lock").clear();

    engine.start().expect("restart failed");
    thread::sleep(Duration::from_millis(80));
    engine.stop();

    let reinitialized = view.dimension_requests.load(Ordering::SeqCst) == requests_before + 1;
    let renumbered = view
        .generations
        .lock()
        .expect("generations lock")
        .first()
        == Some(&1);
    results.push(TestResult {
        name: "lifecycle_reset_reinitializes".into(),
        passed: cleared && reinitialized && renumbered,
        detail: format!(
            "cleared={} re-asked dimensions={} generations restart at 1={}",
            cleared, reinitialized, renumbered
        ),
    });

    results
}

// ── 8. Configuration ────────────────────────────────────────────────────

fn validate_config(_verbose: bool) -> Vec<TestResult> {
    println!("--- Configuration ---");
    let mut results = Vec::new();

    let config = SimConfig {
        chunk_size: 64,
        queue_capacity: 16,
        min_tick_ms: 120,
        progress_period_ms: 100,
        workers: Some(3),
    };
    let json = serde_json::to_string(&config).expect("serialize failed");
    let parsed: SimConfig = serde_json::from_str(&json).expect("parse failed");
    results.push(TestResult {
        name: "config_json_round_trip".into(),
        passed: parsed == config,
        detail: "all fields survive serialization".into(),
    });

    let partial: SimConfig =
        serde_json::from_str(r#"{"min_tick_ms": 30}"#).expect("parse failed");
    results.push(TestResult {
        name: "config_partial_json_uses_defaults".into(),
        passed: partial.min_tick_ms == 30 && partial.chunk_size == 100,
        detail: "missing fields fall back to defaults".into(),
    });

    let invalid = SimConfig {
        queue_capacity: 0,
        ..SimConfig::default()
    };
    results.push(TestResult {
        name: "config_rejects_zero_capacity".into(),
        passed: invalid.validate().is_err(),
        detail: "zero queue capacity fails validation".into(),
    });

    results
}

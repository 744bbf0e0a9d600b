//! Cell map model - double-buffered grid state, neighbor counts and frontier
//!
//! The map keeps two copies of everything: the *committed* buffers, read-only
//! while a generation is in flight, and the *next* buffers, written by worker
//! tasks. Cell-state writes are partitioned by chunk and race-free; the
//! next-generation neighbor counts are the one structure several workers
//! mutate at once, so they live in atomics with saturating updates.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use rand::Rng;

use crate::error::EngineError;
use crate::progress::ProgressTracker;
use crate::snapshot::GridSnapshot;

/// Neighbor counts always stay inside this domain; the clamp is an invariant
/// of the count itself, not an overflow guard.
const MIN_NEIGHBORS: u8 = 0;
const MAX_NEIGHBORS: u8 = 8;

/// Grid coordinate. Cells are stored row-major: `y * width + x`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pos {
    pub x: usize,
    pub y: usize,
}

impl Pos {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// The simulation model: grid state, neighbor counts, frontier and the
/// generation counter.
pub struct CellMap {
    width: usize,
    height: usize,
    generation: u64,

    /// Committed cell states.
    cells: Box<[bool]>,
    /// Next-generation cell states; chunk-partitioned writes from workers.
    next_cells: Box<[AtomicBool]>,
    /// Committed on-neighbor counts, 0..=8 per cell.
    neighbors: Box<[u8]>,
    /// Next-generation counts, mutated concurrently by workers.
    next_neighbors: Box<[AtomicU8]>,

    /// Cells requiring evaluation this generation: every alive cell plus
    /// every dead cell with at least one alive neighbor.
    frontier: Vec<Pos>,
    progress: Arc<ProgressTracker>,
}

impl CellMap {
    /// Creates an empty map. Both dimensions must be positive.
    pub fn new(width: usize, height: usize) -> Result<Self, EngineError> {
        if width == 0 || height == 0 {
            return Err(EngineError::InvalidDimension { width, height });
        }
        let cells = width * height;
        Ok(Self {
            width,
            height,
            generation: 0,
            cells: vec![false; cells].into_boxed_slice(),
            next_cells: (0..cells).map(|_| AtomicBool::new(false)).collect(),
            neighbors: vec![0; cells].into_boxed_slice(),
            next_neighbors: (0..cells).map(|_| AtomicU8::new(0)).collect(),
            frontier: Vec::new(),
            progress: Arc::new(ProgressTracker::new()),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimension(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn generation_number(&self) -> u64 {
        self.generation
    }

    /// Handle to the progress counters, shared with the sampler thread.
    pub fn progress(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.progress)
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Committed state of one cell.
    pub fn is_alive(&self, pos: Pos) -> bool {
        self.cells[self.index(pos.x, pos.y)]
    }

    /// Committed on-neighbor count of one cell.
    pub fn neighbor_count(&self, pos: Pos) -> u8 {
        self.neighbors[self.index(pos.x, pos.y)]
    }

    /// Materializes a full copy of the committed state.
    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot::new(self.width, self.height, self.cells.clone())
    }

    /// Cells to evaluate for the current generation.
    pub fn frontier(&self) -> &[Pos] {
        &self.frontier
    }

    /// Calls `apply` with the index of every in-bounds neighbor of `pos`,
    /// skipping the cell itself.
    fn for_each_neighbor(&self, pos: Pos, mut apply: impl FnMut(usize)) {
        let (x, y) = (pos.x as isize, pos.y as isize);
        for ny in y - 1..=y + 1 {
            for nx in x - 1..=x + 1 {
                if (nx != x || ny != y)
                    && nx >= 0
                    && ny >= 0
                    && (nx as usize) < self.width
                    && (ny as usize) < self.height
                {
                    apply(self.index(nx as usize, ny as usize));
                }
            }
        }
    }

    /// Turns a currently-dead cell on in the next generation, bumping the
    /// next-generation neighbor count of the surrounding cells.
    fn set_cell_on(&self, pos: Pos) {
        let idx = self.index(pos.x, pos.y);
        if self.cells[idx] {
            return;
        }
        self.next_cells[idx].store(true, Ordering::Relaxed);
        self.for_each_neighbor(pos, |neighbor| {
            saturating_inc(&self.next_neighbors[neighbor]);
        });
    }

    /// Turns a currently-alive cell off in the next generation, dropping the
    /// next-generation neighbor count of the surrounding cells.
    fn set_cell_off(&self, pos: Pos) {
        let idx = self.index(pos.x, pos.y);
        if !self.cells[idx] {
            return;
        }
        self.next_cells[idx].store(false, Ordering::Relaxed);
        self.for_each_neighbor(pos, |neighbor| {
            saturating_dec(&self.next_neighbors[neighbor]);
        });
    }

    /// Applies the transition rule to a subset of the frontier.
    ///
    /// Reads only committed buffers, writes only next buffers, so chunk
    /// tasks can run this concurrently as long as no cell appears in two
    /// subsets. Returns how many cells of the subset are alive in the next
    /// generation.
    pub fn compute_cells(&self, cells: &[Pos]) -> u64 {
        let mut alive = 0u64;
        for &pos in cells {
            let idx = self.index(pos.x, pos.y);
            let state = self.cells[idx];
            let count = self.neighbors[idx];
            let mut next_state = state;
            if state {
                if !(2..=3).contains(&count) {
                    self.set_cell_off(pos);
                    next_state = false;
                }
            } else if count == 3 {
                self.set_cell_on(pos);
                next_state = true;
            }
            self.progress.cell_computed();
            if next_state {
                alive += 1;
            }
        }
        alive
    }

    /// Flips one dead-in-next cell to alive-in-next. Used only while seeding
    /// the initial generation; safe to call from several tasks at once.
    ///
    /// Returns `false` if the chosen cell was already seeded.
    pub fn seed_random_cell(&self) -> bool {
        let mut rng = rand::thread_rng();
        let x = rng.gen_range(0..self.width);
        let y = rng.gen_range(0..self.height);
        self.seed_cell(Pos::new(x, y))
    }

    /// Flips the given cell from dead-in-next to alive-in-next.
    ///
    /// Returns `false` if it was already alive in the next generation.
    pub fn seed_cell(&self, pos: Pos) -> bool {
        let idx = self.index(pos.x, pos.y);
        if self.next_cells[idx]
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }
        self.for_each_neighbor(pos, |neighbor| {
            saturating_inc(&self.next_neighbors[neighbor]);
        });
        true
    }

    /// Promotes the next buffers to committed state: bulk copy, frontier
    /// recomputation, generation increment, computed-counter reset.
    ///
    /// After a commit the next buffers equal the committed ones; they are
    /// write-only until the next commit.
    pub fn commit_generation(&mut self) {
        self.progress.reset_computed();
        for (cell, next) in self.cells.iter_mut().zip(self.next_cells.iter()) {
            *cell = next.load(Ordering::Relaxed);
        }
        for (count, next) in self.neighbors.iter_mut().zip(self.next_neighbors.iter()) {
            *count = next.load(Ordering::Relaxed);
        }
        self.rebuild_frontier();
        self.generation += 1;
    }

    /// Discards all next-buffer writes of an aborted generation, restoring
    /// them to the committed state so the generation can be recomputed from
    /// scratch after a restart.
    pub fn abort_generation(&mut self) {
        self.progress.reset_computed();
        for (next, cell) in self.next_cells.iter().zip(self.cells.iter()) {
            next.store(*cell, Ordering::Relaxed);
        }
        for (next, count) in self.next_neighbors.iter().zip(self.neighbors.iter()) {
            next.store(*count, Ordering::Relaxed);
        }
    }

    fn rebuild_frontier(&mut self) {
        self.frontier.clear();
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = y * self.width + x;
                if self.cells[idx] || self.neighbors[idx] > 0 {
                    self.frontier.push(Pos::new(x, y));
                }
            }
        }
        self.progress.set_frontier_len(self.frontier.len());
    }

    /// Zeroes all state. The generation counter goes back to 0.
    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|cell| *cell = false);
        self.neighbors.iter_mut().for_each(|count| *count = 0);
        for next in self.next_cells.iter() {
            next.store(false, Ordering::Relaxed);
        }
        for next in self.next_neighbors.iter() {
            next.store(0, Ordering::Relaxed);
        }
        self.frontier.clear();
        self.generation = 0;
        self.progress.reset_computed();
        self.progress.set_frontier_len(0);
    }
}

/// Saturating atomic increment, clamped to [0, 8].
fn saturating_inc(counter: &AtomicU8) {
    let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
        if count < MAX_NEIGHBORS {
            Some(count + 1)
        } else {
            None
        }
    });
}

/// Saturating atomic decrement, clamped to [0, 8].
fn saturating_dec(counter: &AtomicU8) {
    let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
        if count > MIN_NEIGHBORS {
            Some(count - 1)
        } else {
            None
        }
    });
}

/// Locks the shared map, recovering the guard if a worker panicked while
/// holding it.
pub(crate) fn lock_map(map: &Mutex<CellMap>) -> MutexGuard<'_, CellMap> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Seeds the given cells and commits them as generation 1.
    fn map_with(width: usize, height: usize, alive: &[(usize, usize)]) -> CellMap {
        let mut map = CellMap::new(width, height).expect("valid dimensions");
        for &(x, y) in alive {
            assert!(map.seed_cell(Pos::new(x, y)));
        }
        map.commit_generation();
        map
    }

    /// Runs one full generation the way the producer does, minus threading.
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

    /// Recounts every cell's alive neighbors directly from the grid.
    fn check_neighbor_counts(map: &CellMap) {
        for y in 0..map.height() {
            for x in 0..map.width() {
                let mut expected = 0u8;
                for ny in y.saturating_sub(1)..=(y + 1).min(map.height() - 1) {
                    for nx in x.saturating_sub(1)..=(x + 1).min(map.width() - 1) {
                        if (nx, ny) != (x, y) && map.is_alive(Pos::new(nx, ny)) {
                            expected += 1;
                        }
                    }
                }
                let actual = map.neighbor_count(Pos::new(x, y));
                assert!(actual <= 8, "count out of domain at ({x}, {y})");
                assert_eq!(actual, expected, "wrong count at ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        assert!(matches!(
            CellMap::new(0, 10),
            Err(EngineError::InvalidDimension { .. })
        ));
        assert!(matches!(
            CellMap::new(10, 0),
            Err(EngineError::InvalidDimension { .. })
        ));
    }

    #[test]
    fn test_seed_and_commit() {
        let map = map_with(4, 4, &[(1, 1), (2, 1)]);
        assert_eq!(map.generation_number(), 1);
        assert!(map.is_alive(Pos::new(1, 1)));
        assert!(map.is_alive(Pos::new(2, 1)));
        assert_eq!(map.neighbor_count(Pos::new(1, 1)), 1);
        assert_eq!(map.neighbor_count(Pos::new(1, 0)), 2);
        check_neighbor_counts(&map);
    }

    #[test]
    fn test_seed_cell_twice_fails() {
        let map = CellMap::new(3, 3).expect("valid dimensions");
        assert!(map.seed_cell(Pos::new(1, 1)));
        assert!(!map.seed_cell(Pos::new(1, 1)));
    }

    #[test]
    fn test_block_is_still_life() {
        let block = [(1, 1), (2, 1), (1, 2), (2, 2)];
        let mut map = map_with(4, 4, &block);
        for _ in 0..5 {
            let alive = step(&mut map);
            assert_eq!(alive, 4);
            assert_eq!(alive_positions(&map), vec![(1, 1), (2, 1), (1, 2), (2, 2)]);
            check_neighbor_counts(&map);
        }
    }

    #[test]
    fn test_lone_cell_dies() {
        let mut map = map_with(5, 5, &[(2, 2)]);
        let alive = step(&mut map);
        assert_eq!(alive, 0);
        assert!(alive_positions(&map).is_empty());
    }

    #[test]
    fn test_pair_dies() {
        let mut map = map_with(5, 5, &[(1, 2), (2, 2)]);
        let alive = step(&mut map);
        assert_eq!(alive, 0);
        assert!(alive_positions(&map).is_empty());
        check_neighbor_counts(&map);
    }

    #[test]
    fn test_blinker_oscillates() {
        let mut map = map_with(3, 3, &[(1, 0), (1, 1), (1, 2)]);

        let alive = step(&mut map);
        assert_eq!(alive, 3);
        assert_eq!(alive_positions(&map), vec![(0, 1), (1, 1), (2, 1)]);
        check_neighbor_counts(&map);

        let alive = step(&mut map);
        assert_eq!(alive, 3);
        assert_eq!(alive_positions(&map), vec![(1, 0), (1, 1), (1, 2)]);
        check_neighbor_counts(&map);
    }

    #[test]
    fn test_frontier_excludes_isolated_dead_cells() {
        let map = map_with(10, 10, &[(1, 1)]);
        let frontier = map.frontier();
        // the far corner is dead with zero alive neighbors
        assert!(!frontier.contains(&Pos::new(9, 9)));
        for &pos in frontier {
            assert!(
                map.is_alive(pos) || map.neighbor_count(pos) > 0,
                "frontier holds a cell that cannot flip: {pos:?}"
            );
        }
        // exactly the 3x3 block around the seed
        assert_eq!(frontier.len(), 9);
    }

    #[test]
    fn test_frontier_drives_progress_denominator() {
        let mut map = map_with(10, 10, &[(1, 1)]);
        let progress = map.progress();
        assert_eq!(map.frontier().len(), 9);

        let frontier = map.frontier().to_vec();
        map.compute_cells(&frontier[..3]);
        assert!((progress.completion() - 3.0 / 9.0).abs() < 1e-9);
        map.compute_cells(&frontier[3..]);
        assert!((progress.completion() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_determinism_across_chunkings() {
        let pentomino = [(5, 4), (6, 4), (4, 5), (5, 5), (5, 6)];
        let mut whole = map_with(12, 12, &pentomino);
        let mut chunked = map_with(12, 12, &pentomino);

        for _ in 0..8 {
            let frontier = whole.frontier().to_vec();
            let alive_whole = whole.compute_cells(&frontier);
            whole.commit_generation();

            let frontier = chunked.frontier().to_vec();
            let mut alive_chunked = 0;
            for chunk in frontier.chunks(3) {
                alive_chunked += chunked.compute_cells(chunk);
            }
            chunked.commit_generation();

            assert_eq!(alive_whole, alive_chunked);
            assert_eq!(whole.snapshot(), chunked.snapshot());
            check_neighbor_counts(&whole);
        }
    }

    #[test]
    fn test_alive_count_matches_snapshot() {
        let mut map = map_with(12, 12, &[(5, 4), (6, 4), (4, 5), (5, 5), (5, 6)]);
        for _ in 0..6 {
            let alive = step(&mut map);
            assert_eq!(alive, map.snapshot().alive_count());
        }
    }

    #[test]
    fn test_random_seeding_keeps_counts_consistent() {
        let mut map = CellMap::new(10, 10).expect("valid dimensions");
        let mut seeded = 0;
        for _ in 0..50 {
            if map.seed_random_cell() {
                seeded += 1;
            }
        }
        map.commit_generation();
        assert_eq!(map.snapshot().alive_count(), seeded);
        check_neighbor_counts(&map);

        for _ in 0..4 {
            step(&mut map);
            check_neighbor_counts(&map);
        }
    }

    #[test]
    fn test_abort_restores_next_buffers() {
        let pentomino = [(5, 4), (6, 4), (4, 5), (5, 5), (5, 6)];
        let mut reference = map_with(12, 12, &pentomino);
        let mut aborted = map_with(12, 12, &pentomino);

        // dirty the next buffers with a partial computation, then abort
        let frontier = aborted.frontier().to_vec();
        aborted.compute_cells(&frontier[..frontier.len() / 2]);
        aborted.abort_generation();

        step(&mut reference);
        step(&mut aborted);
        assert_eq!(reference.snapshot(), aborted.snapshot());
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut map = map_with(6, 6, &[(2, 2), (3, 2), (2, 3)]);
        step(&mut map);
        map.clear();

        assert_eq!(map.generation_number(), 0);
        assert!(map.frontier().is_empty());
        assert_eq!(map.snapshot().alive_count(), 0);
        assert_eq!(map.progress().completion(), 1.0);
        check_neighbor_counts(&map);
    }
}

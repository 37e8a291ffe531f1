//! # Chunk Streamer
//!
//! Keeps the resident chunk set converged on the observer.
//!
//! ## Tick
//!
//! Every tick is a complete re-evaluation; nothing but the store carries
//! over between ticks.
//!
//! 1. Map the observer position onto the chunk grid.
//! 2. **Load**: every coordinate in the Chebyshev square of `load_radius`
//!    that is not resident is generated and handed to the renderer.
//! 3. **Unload**: every resident coordinate farther than `unload_radius`
//!    (under the configured metric) is removed and its visual destroyed.
//!
//! `unload_radius >= load_radius` is checked at startup, so a chunk loaded
//! by step 2 is never removed by step 3 of the same or the next tick while
//! the observer stays in the same chunk.

use parking_lot::Mutex;
use terrastream_procedural::{ChunkCoord, VoxelMesher};
use tracing::{debug, warn};

use crate::collaborators::{ChunkRenderer, PositionSource, WorldPosition};
use crate::config::ValidatedConfig;
use crate::error::{Collaborator, StreamError, StreamResult};
use crate::store::{Chunk, ChunkRef, ChunkStore};

/// Streaming counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Chunks resident right now.
    pub resident: usize,
    /// Chunks generated since startup.
    pub generated_total: u64,
    /// Chunks unloaded since startup.
    pub unloaded_total: u64,
    /// Failed chunk generations since startup.
    pub failed_total: u64,
    /// Completed passes: `tick`, `load_tick` and `unload_tick` each count
    /// one. Skipped and aborted passes are not counted.
    pub ticks: u64,
}

/// What one tick changed.
#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    /// Observer chunk for this tick.
    pub observer: ChunkCoord,
    /// Coordinates generated this tick.
    pub loaded: Vec<ChunkCoord>,
    /// Coordinates removed this tick.
    pub unloaded: Vec<ChunkCoord>,
    /// Chunks that failed to generate; they stay absent and are retried.
    pub failures: Vec<StreamError>,
    /// Set when the renderer went away partway through. The rest of the
    /// tick was abandoned; the changes listed above still happened.
    pub aborted: Option<StreamError>,
}

impl TickReport {
    /// Empty report for `observer`.
    #[must_use]
    pub const fn new(observer: ChunkCoord) -> Self {
        Self {
            observer,
            loaded: Vec::new(),
            unloaded: Vec::new(),
            failures: Vec::new(),
            aborted: None,
        }
    }

    /// True if the tick changed nothing and nothing failed.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.loaded.is_empty()
            && self.unloaded.is_empty()
            && self.failures.is_empty()
            && self.aborted.is_none()
    }

    /// True if every phase of the tick ran to the end.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }

    /// First generation failure of the tick, if any.
    #[must_use]
    pub fn first_failure(&self) -> Option<&StreamError> {
        self.failures.first()
    }

    /// Folds a later report for the same frame into this one.
    pub fn merge(&mut self, other: Self) {
        self.observer = other.observer;
        self.loaded.extend(other.loaded);
        self.unloaded.extend(other.unloaded);
        self.failures.extend(other.failures);
        if self.aborted.is_none() {
            self.aborted = other.aborted;
        }
    }
}

#[derive(Clone, Copy)]
struct Phases {
    load: bool,
    unload: bool,
}

/// Drives generation and eviction around an observer.
///
/// Owns the chunk store; every resident chunk's handle goes back to the
/// renderer on unload, on [`ChunkStreamer::unload_all`], or on drop.
pub struct ChunkStreamer<R: ChunkRenderer> {
    config: ValidatedConfig,
    mesher: VoxelMesher,
    renderer: R,
    store: ChunkStore<R::Handle>,
    stats: Mutex<StreamStats>,
}

impl<R: ChunkRenderer> ChunkStreamer<R> {
    /// Creates a streamer with an empty resident set.
    #[must_use]
    pub fn new(config: ValidatedConfig, renderer: R) -> Self {
        let mesher = config.mesher();
        Self {
            config,
            mesher,
            renderer,
            store: ChunkStore::new(),
            stats: Mutex::new(StreamStats::default()),
        }
    }

    /// Configuration this streamer runs with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    /// The renderer collaborator.
    #[inline]
    #[must_use]
    pub const fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Mesher used for every chunk.
    #[inline]
    #[must_use]
    pub const fn mesher(&self) -> &VoxelMesher {
        &self.mesher
    }

    /// Chunk containing `position`.
    ///
    /// # Errors
    ///
    /// [`StreamError::InvalidPosition`] if the position is not finite, or
    /// if any chunk within `unload_radius` of it would have columns off the
    /// `i32` world grid.
    pub fn observer_chunk(&self, position: WorldPosition) -> StreamResult<ChunkCoord> {
        let size = self.config.chunk_size();
        ChunkCoord::from_world_pos(position.x, position.z, size)
            .filter(|coord| coord.square_on_grid(self.config.unload_radius(), size))
            .ok_or(StreamError::InvalidPosition {
                x: position.x,
                z: position.z,
            })
    }

    /// Runs a full load and unload tick at `position`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the tick is skipped before it changes
    /// anything. Per-chunk failures are listed in the report. A renderer
    /// that becomes unavailable ends the tick early with
    /// [`TickReport::aborted`] set.
    pub fn tick(&self, position: WorldPosition) -> StreamResult<TickReport> {
        self.run(position, Phases { load: true, unload: true })
    }

    /// Polls `source` and runs a full tick.
    ///
    /// # Errors
    ///
    /// [`StreamError::MissingCollaborator`] if the source has no position,
    /// otherwise as [`ChunkStreamer::tick`].
    pub fn tick_from(&self, source: &(impl PositionSource + ?Sized)) -> StreamResult<TickReport> {
        let position = source
            .current_position()
            .ok_or(StreamError::MissingCollaborator(Collaborator::Position))?;
        self.tick(position)
    }

    /// Runs only the load phase.
    ///
    /// # Errors
    ///
    /// As [`ChunkStreamer::tick`].
    pub fn load_tick(&self, position: WorldPosition) -> StreamResult<TickReport> {
        self.run(position, Phases { load: true, unload: false })
    }

    /// Runs only the unload phase.
    ///
    /// # Errors
    ///
    /// [`StreamError::InvalidPosition`] if `position` is off the grid.
    pub fn unload_tick(&self, position: WorldPosition) -> StreamResult<TickReport> {
        self.run(position, Phases { load: false, unload: true })
    }

    fn run(&self, position: WorldPosition, phases: Phases) -> StreamResult<TickReport> {
        let observer = self.observer_chunk(position)?;

        let mut report = if phases.load {
            self.load_around(observer)
        } else {
            TickReport::new(observer)
        };
        if !report.is_complete() {
            return Ok(report);
        }
        if phases.unload {
            report.unloaded = self.unload_outside(observer);
        }

        self.stats.lock().ticks += 1;
        debug!(
            cx = observer.x,
            cz = observer.z,
            loaded = report.loaded.len(),
            unloaded = report.unloaded.len(),
            failed = report.failures.len(),
            "tick"
        );
        Ok(report)
    }

    /// Generates every missing chunk within `load_radius` of `observer`.
    ///
    /// Stops at the first unavailable-renderer error and records it in
    /// [`TickReport::aborted`]. Chunks loaded before that point stay
    /// resident and are listed in the report.
    #[must_use]
    pub fn load_around(&self, observer: ChunkCoord) -> TickReport {
        self.load_square(observer, self.config.load_radius())
    }

    /// Loads a square of `radius` around `position` before the first frame.
    ///
    /// The radius is clamped so the next unload pass keeps every chunk.
    ///
    /// # Errors
    ///
    /// As [`ChunkStreamer::load_tick`].
    pub fn prewarm(&self, position: WorldPosition, radius: u32) -> StreamResult<TickReport> {
        let observer = self.observer_chunk(position)?;
        let keep = self
            .config
            .unload_metric()
            .retained_square(self.config.unload_radius());
        Ok(self.load_square(observer, radius.min(keep)))
    }

    fn load_square(&self, observer: ChunkCoord, radius: u32) -> TickReport {
        let mut report = TickReport::new(observer);

        for coord in observer.square(radius) {
            match self.load_one(coord) {
                Ok(chunk) if chunk.freshly_generated => {
                    debug!(cx = coord.x, cz = coord.z, units = chunk.unit_count, "chunk loaded");
                    report.loaded.push(coord);
                }
                Ok(_) => {}
                Err(err) if err.skips_tick() => {
                    warn!(cx = coord.x, cz = coord.z, error = %err, "load phase aborted");
                    report.aborted = Some(err);
                    break;
                }
                Err(err) => {
                    warn!(cx = coord.x, cz = coord.z, error = %err, "chunk generation failed");
                    report.failures.push(err);
                }
            }
        }

        {
            let mut stats = self.stats.lock();
            stats.generated_total += report.loaded.len() as u64;
            stats.failed_total += report.failures.len() as u64;
        }
        report
    }

    fn load_one(&self, coord: ChunkCoord) -> StreamResult<ChunkRef> {
        self.store.get_or_generate(coord, |coord| {
            let geometry = self.mesher.generate(coord).ok_or_else(|| {
                StreamError::GenerationFailure {
                    coord,
                    reason: "chunk lies off the world grid".into(),
                }
            })?;
            let handle = self
                .renderer
                .create_chunk_visual(coord, &geometry)
                .map_err(|err| StreamError::from_renderer(coord, err))?;
            Ok(Chunk::new(coord, handle, geometry.unit_count()))
        })
    }

    /// Removes every resident chunk beyond `unload_radius` of `observer`
    /// and destroys its visual.
    pub fn unload_outside(&self, observer: ChunkCoord) -> Vec<ChunkCoord> {
        let metric = self.config.unload_metric();
        let radius = self.config.unload_radius();
        let evicted = self
            .store
            .remove_where(|coord| metric.exceeds(observer, coord, radius));
        self.release(evicted)
    }

    /// Removes every resident chunk. Returns how many were released.
    pub fn unload_all(&self) -> usize {
        let released = self.release(self.store.drain());
        if !released.is_empty() {
            debug!(count = released.len(), "all chunks unloaded");
        }
        released.len()
    }

    fn release(&self, chunks: Vec<Chunk<R::Handle>>) -> Vec<ChunkCoord> {
        let mut coords = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let coord = chunk.coord();
            debug!(cx = coord.x, cz = coord.z, "chunk unloaded");
            self.renderer.destroy_chunk_visual(coord, chunk.into_handle());
            coords.push(coord);
        }
        self.stats.lock().unloaded_total += coords.len() as u64;
        coords
    }

    /// Counters plus the current resident count.
    #[must_use]
    pub fn stats(&self) -> StreamStats {
        StreamStats {
            resident: self.store.len(),
            ..*self.stats.lock()
        }
    }

    /// True if `coord` is resident.
    #[must_use]
    pub fn is_resident(&self, coord: ChunkCoord) -> bool {
        self.store.contains(coord)
    }

    /// Resident coordinates, sorted by `(x, z)`.
    #[must_use]
    pub fn resident_coords(&self) -> Vec<ChunkCoord> {
        let mut coords = self.store.coords();
        coords.sort_unstable_by_key(|c| (c.x, c.z));
        coords
    }

    /// Reads the handle of a resident chunk.
    pub fn with_handle<T>(&self, coord: ChunkCoord, f: impl FnOnce(&R::Handle) -> T) -> Option<T> {
        self.store.with_chunk(coord, |chunk| f(chunk.handle()))
    }

    /// Total voxel units across resident chunks.
    #[must_use]
    pub fn resident_units(&self) -> usize {
        let mut total = 0;
        self.store.for_each(|chunk| total += chunk.unit_count());
        total
    }
}

impl<R: ChunkRenderer> Drop for ChunkStreamer<R> {
    fn drop(&mut self) {
        self.unload_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DistanceMetric, StreamingConfig};
    use crate::error::RendererError;
    use std::collections::HashSet;
    use std::sync::Arc;
    use terrastream_procedural::ChunkGeometry;

    #[derive(Default)]
    struct CountingRenderer {
        live: Mutex<HashSet<ChunkCoord>>,
        created: Mutex<u32>,
        reject: Option<ChunkCoord>,
    }

    impl ChunkRenderer for CountingRenderer {
        type Handle = ChunkCoord;

        fn create_chunk_visual(
            &self,
            coord: ChunkCoord,
            _geometry: &ChunkGeometry,
        ) -> Result<ChunkCoord, RendererError> {
            if self.reject == Some(coord) {
                return Err(RendererError::Rejected("refused".into()));
            }
            *self.created.lock() += 1;
            assert!(self.live.lock().insert(coord));
            Ok(coord)
        }

        fn destroy_chunk_visual(&self, coord: ChunkCoord, handle: ChunkCoord) {
            assert_eq!(coord, handle);
            assert!(self.live.lock().remove(&handle));
        }
    }

    fn config(load: u32, unload: u32) -> ValidatedConfig {
        StreamingConfig {
            chunk_size: 20,
            load_radius: load,
            unload_radius: unload,
            ..StreamingConfig::test()
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn test_observer_chunk_floors() {
        let streamer = ChunkStreamer::new(config(1, 2), CountingRenderer::default());
        let at = |x, z| streamer.observer_chunk(WorldPosition::on_ground(x, z)).unwrap();
        assert_eq!(at(0.0, 0.0), ChunkCoord::new(0, 0));
        assert_eq!(at(19.9, 20.0), ChunkCoord::new(0, 1));
        assert_eq!(at(-0.1, -20.0), ChunkCoord::new(-1, -1));
        assert_eq!(at(-20.1, 45.0), ChunkCoord::new(-2, 2));

        assert!(matches!(
            streamer.observer_chunk(WorldPosition::on_ground(f64::NAN, 0.0)),
            Err(StreamError::InvalidPosition { .. })
        ));
    }

    #[test]
    fn test_observer_chunk_keeps_unload_square_on_grid() {
        let streamer = ChunkStreamer::new(config(1, 2), CountingRenderer::default());
        let at = |x| streamer.observer_chunk(WorldPosition::on_ground(x, 0.0));

        // The last full chunk is 107_374_181; two chunks of unload margin.
        assert_eq!(at(2_147_483_590.0).unwrap(), ChunkCoord::new(107_374_179, 0));
        assert!(matches!(at(2_147_483_605.0), Err(StreamError::InvalidPosition { .. })));
        assert!(matches!(at(3.0e9), Err(StreamError::InvalidPosition { .. })));
        assert_eq!(at(-2_147_483_595.0).unwrap(), ChunkCoord::new(-107_374_180, 0));
        assert!(matches!(at(-2_147_483_615.0), Err(StreamError::InvalidPosition { .. })));
    }

    #[test]
    fn test_merge_keeps_changes_and_first_abort() {
        let renderer_gone = StreamError::MissingCollaborator(Collaborator::Renderer);
        let mut report = TickReport::new(ChunkCoord::new(0, 0));
        report.unloaded.push(ChunkCoord::new(-3, 0));

        let mut load = TickReport::new(ChunkCoord::new(0, 0));
        load.loaded.push(ChunkCoord::new(1, 0));
        load.aborted = Some(renderer_gone.clone());
        report.merge(load);

        assert_eq!(report.unloaded, vec![ChunkCoord::new(-3, 0)]);
        assert_eq!(report.loaded, vec![ChunkCoord::new(1, 0)]);
        assert_eq!(report.aborted, Some(renderer_gone));
        assert!(!report.is_complete());
        assert!(!report.is_quiet());
    }

    #[test]
    fn test_tick_loads_square() {
        let streamer = ChunkStreamer::new(config(1, 2), CountingRenderer::default());
        let report = streamer.tick(WorldPosition::default()).unwrap();

        assert_eq!(report.loaded.len(), 9);
        assert!(report.unloaded.is_empty());
        assert_eq!(streamer.resident_coords().len(), 9);
        assert!(streamer.is_resident(ChunkCoord::new(-1, -1)));
        assert!(streamer.is_resident(ChunkCoord::new(1, 1)));

        let again = streamer.tick(WorldPosition::default()).unwrap();
        assert!(again.is_quiet());
        assert_eq!(*streamer.renderer().created.lock(), 9);
    }

    #[test]
    fn test_rejected_chunk_is_retried() {
        let renderer = CountingRenderer {
            reject: Some(ChunkCoord::new(1, 0)),
            ..CountingRenderer::default()
        };
        let streamer = ChunkStreamer::new(config(1, 2), renderer);

        let report = streamer.tick(WorldPosition::default()).unwrap();
        assert_eq!(report.loaded.len(), 8);
        assert!(matches!(
            report.first_failure(),
            Some(StreamError::GenerationFailure { coord, .. }) if *coord == ChunkCoord::new(1, 0)
        ));
        assert!(!streamer.is_resident(ChunkCoord::new(1, 0)));

        let retry = streamer.tick(WorldPosition::default()).unwrap();
        assert!(retry.loaded.is_empty());
        assert_eq!(retry.failures.len(), 1);
        assert_eq!(streamer.stats().failed_total, 2);
    }

    #[test]
    fn test_prewarm_is_clamped_to_unload_radius() {
        let streamer = ChunkStreamer::new(config(1, 2), CountingRenderer::default());
        let report = streamer.prewarm(WorldPosition::default(), 10).unwrap();
        assert_eq!(report.loaded.len(), 25);

        let tick = streamer.tick(WorldPosition::default()).unwrap();
        assert!(tick.unloaded.is_empty());
        assert_eq!(streamer.stats().resident, 25);
    }

    #[test]
    fn test_euclidean_unload() {
        let config = StreamingConfig {
            chunk_size: 20,
            load_radius: 1,
            unload_radius: 2,
            unload_metric: DistanceMetric::Euclidean,
            ..StreamingConfig::test()
        }
        .validate()
        .unwrap();
        let streamer = ChunkStreamer::new(config, CountingRenderer::default());

        streamer.tick(WorldPosition::default()).unwrap();
        let report = streamer.tick(WorldPosition::on_ground(25.0, 0.0)).unwrap();

        let mut unloaded = report.unloaded;
        unloaded.sort_unstable_by_key(|c| (c.x, c.z));
        assert_eq!(unloaded, vec![ChunkCoord::new(-1, -1), ChunkCoord::new(-1, 1)]);
        assert!(streamer.is_resident(ChunkCoord::new(-1, 0)));
    }

    #[test]
    fn test_unload_all_and_drop_release_handles() {
        let renderer = Arc::new(CountingRenderer::default());
        let streamer = ChunkStreamer::new(config(1, 2), Arc::clone(&renderer));
        streamer.tick(WorldPosition::default()).unwrap();
        assert_eq!(renderer.live.lock().len(), 9);

        assert_eq!(streamer.unload_all(), 9);
        assert!(renderer.live.lock().is_empty());

        streamer.tick(WorldPosition::default()).unwrap();
        drop(streamer);
        assert!(renderer.live.lock().is_empty());
    }

    #[test]
    fn test_stats_and_units() {
        let streamer = ChunkStreamer::new(config(1, 2), CountingRenderer::default());
        streamer.tick(WorldPosition::default()).unwrap();
        streamer.tick(WorldPosition::on_ground(45.0, 0.0)).unwrap();

        let stats = streamer.stats();
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.generated_total, 9 + 6);
        assert_eq!(stats.unloaded_total, 3);
        assert_eq!(stats.resident, 12);
        assert!(streamer.resident_units() >= 12 * 400);
        assert_eq!(
            streamer.with_handle(ChunkCoord::new(3, 1), |h| *h),
            Some(ChunkCoord::new(3, 1))
        );
    }
}

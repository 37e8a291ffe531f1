//! # Chunk Store
//!
//! Resident chunk records keyed by [`ChunkCoord`].
//!
//! ## Single Materialization
//!
//! A coordinate being generated is marked in-flight. Other callers asking
//! for the same coordinate block on a condvar until the generator finishes,
//! then observe the inserted chunk (or retry if generation failed). The
//! generator itself runs without the store lock held, so different
//! coordinates generate in parallel.

use std::collections::{HashMap, HashSet};

use parking_lot::{Condvar, Mutex};
use terrastream_procedural::ChunkCoord;

/// A resident chunk: its coordinate, the renderer's handle and how many
/// voxel units its geometry carried.
#[derive(Debug)]
pub struct Chunk<H> {
    coord: ChunkCoord,
    handle: H,
    unit_count: usize,
}

impl<H> Chunk<H> {
    /// Creates a chunk record.
    #[must_use]
    pub const fn new(coord: ChunkCoord, handle: H, unit_count: usize) -> Self {
        Self {
            coord,
            handle,
            unit_count,
        }
    }

    /// Grid coordinate.
    #[inline]
    #[must_use]
    pub const fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Number of voxel units in the chunk geometry.
    #[inline]
    #[must_use]
    pub const fn unit_count(&self) -> usize {
        self.unit_count
    }

    /// Renderer handle.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> &H {
        &self.handle
    }

    /// Consumes the record, returning the handle for destruction.
    #[must_use]
    pub fn into_handle(self) -> H {
        self.handle
    }
}

/// Summary of a chunk returned by [`ChunkStore::get_or_generate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkRef {
    /// Grid coordinate.
    pub coord: ChunkCoord,
    /// True if this call generated the chunk.
    pub freshly_generated: bool,
    /// Number of voxel units in the chunk geometry.
    pub unit_count: usize,
}

struct StoreState<H> {
    chunks: HashMap<ChunkCoord, Chunk<H>>,
    in_flight: HashSet<ChunkCoord>,
}

/// Thread-safe map of resident chunks.
pub struct ChunkStore<H> {
    state: Mutex<StoreState<H>>,
    generated: Condvar,
}

impl<H> Default for ChunkStore<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> ChunkStore<H> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState {
                chunks: HashMap::new(),
                in_flight: HashSet::new(),
            }),
            generated: Condvar::new(),
        }
    }

    /// True if `coord` is resident.
    #[must_use]
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.state.lock().chunks.contains_key(&coord)
    }

    /// Number of resident chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().chunks.len()
    }

    /// True if nothing is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of resident coordinates, unordered.
    #[must_use]
    pub fn coords(&self) -> Vec<ChunkCoord> {
        self.state.lock().chunks.keys().copied().collect()
    }

    /// Returns the resident chunk at `coord`, generating it with `generate`
    /// if absent.
    ///
    /// Concurrent callers for the same coordinate wait for the first one;
    /// `generate` runs at most once per successful materialization.
    ///
    /// # Errors
    ///
    /// Propagates the generator's error. Nothing is inserted and the next
    /// caller retries.
    pub fn get_or_generate<E, F>(&self, coord: ChunkCoord, generate: F) -> Result<ChunkRef, E>
    where
        F: FnOnce(ChunkCoord) -> Result<Chunk<H>, E>,
    {
        let mut state = self.state.lock();
        loop {
            if let Some(chunk) = state.chunks.get(&coord) {
                return Ok(ChunkRef {
                    coord,
                    freshly_generated: false,
                    unit_count: chunk.unit_count,
                });
            }
            if state.in_flight.insert(coord) {
                break;
            }
            self.generated.wait(&mut state);
        }
        drop(state);

        let mut marker = InFlight {
            store: self,
            coord,
            armed: true,
        };
        let outcome = generate(coord);

        let mut state = self.state.lock();
        state.in_flight.remove(&coord);
        marker.armed = false;
        let result = outcome.map(|chunk| {
            let unit_count = chunk.unit_count;
            state.chunks.insert(coord, chunk);
            ChunkRef {
                coord,
                freshly_generated: true,
                unit_count,
            }
        });
        drop(state);
        self.generated.notify_all();
        result
    }

    /// Inserts a chunk built elsewhere.
    ///
    /// # Errors
    ///
    /// Returns the chunk back if its coordinate is resident or in-flight.
    pub fn insert(&self, chunk: Chunk<H>) -> Result<(), Chunk<H>> {
        let mut state = self.state.lock();
        let coord = chunk.coord;
        if state.chunks.contains_key(&coord) || state.in_flight.contains(&coord) {
            return Err(chunk);
        }
        state.chunks.insert(coord, chunk);
        Ok(())
    }

    /// Removes and returns the chunk at `coord`.
    pub fn remove(&self, coord: ChunkCoord) -> Option<Chunk<H>> {
        self.state.lock().chunks.remove(&coord)
    }

    /// Removes every chunk matching `evict` under one lock.
    pub fn remove_where(&self, mut evict: impl FnMut(ChunkCoord) -> bool) -> Vec<Chunk<H>> {
        let mut state = self.state.lock();
        let doomed: Vec<ChunkCoord> = state.chunks.keys().copied().filter(|c| evict(*c)).collect();
        doomed
            .into_iter()
            .filter_map(|coord| state.chunks.remove(&coord))
            .collect()
    }

    /// Runs `f` on the chunk at `coord`, if resident.
    pub fn with_chunk<R>(&self, coord: ChunkCoord, f: impl FnOnce(&Chunk<H>) -> R) -> Option<R> {
        self.state.lock().chunks.get(&coord).map(f)
    }

    /// Visits every resident chunk. `f` must not call back into the store.
    pub fn for_each(&self, mut f: impl FnMut(&Chunk<H>)) {
        for chunk in self.state.lock().chunks.values() {
            f(chunk);
        }
    }

    /// Removes every resident chunk.
    pub fn drain(&self) -> Vec<Chunk<H>> {
        self.state.lock().chunks.drain().map(|(_, chunk)| chunk).collect()
    }
}

/// Clears the in-flight marker if the generator unwinds.
struct InFlight<'a, H> {
    store: &'a ChunkStore<H>,
    coord: ChunkCoord,
    armed: bool,
}

impl<H> Drop for InFlight<'_, H> {
    fn drop(&mut self) {
        if self.armed {
            self.store.state.lock().in_flight.remove(&self.coord);
            self.store.generated.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    fn chunk(coord: ChunkCoord) -> Result<Chunk<u32>, ()> {
        Ok(Chunk::new(coord, 7, 10))
    }

    #[test]
    fn test_get_or_generate_inserts_once() {
        let store = ChunkStore::new();
        let coord = ChunkCoord::new(1, -1);

        let first = store.get_or_generate(coord, chunk).unwrap();
        assert!(first.freshly_generated);
        assert_eq!(first.unit_count, 10);

        let second = store
            .get_or_generate(coord, |_| -> Result<Chunk<u32>, ()> { panic!("regenerated") })
            .unwrap();
        assert!(!second.freshly_generated);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_failed_generation_leaves_gap() {
        let store: ChunkStore<u32> = ChunkStore::new();
        let coord = ChunkCoord::new(0, 0);

        let err = store.get_or_generate(coord, |_| Err("nope")).unwrap_err();
        assert_eq!(err, "nope");
        assert!(!store.contains(coord));

        assert!(store.get_or_generate(coord, chunk).unwrap().freshly_generated);
    }

    #[test]
    fn test_insert_refuses_overwrite() {
        let store = ChunkStore::new();
        let coord = ChunkCoord::new(2, 2);
        assert!(store.insert(Chunk::new(coord, 1u32, 0)).is_ok());

        let rejected = store.insert(Chunk::new(coord, 2, 0)).unwrap_err();
        assert_eq!(rejected.into_handle(), 2);
        assert_eq!(store.with_chunk(coord, |c| *c.handle()), Some(1));
    }

    #[test]
    fn test_remove_and_drain() {
        let store = ChunkStore::new();
        for coord in ChunkCoord::new(0, 0).square(1) {
            store.get_or_generate(coord, chunk).unwrap();
        }
        assert_eq!(store.len(), 9);

        assert!(store.remove(ChunkCoord::new(0, 0)).is_some());
        assert!(store.remove(ChunkCoord::new(0, 0)).is_none());

        let evicted = store.remove_where(|c| c.x == 1);
        assert_eq!(evicted.len(), 3);
        assert!(evicted.iter().all(|c| c.coord().x == 1));

        let mut total = 0;
        store.for_each(|c| total += c.unit_count());
        assert_eq!(total, 50);

        assert_eq!(store.drain().len(), 5);
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_requests_generate_once() {
        let store = Arc::new(ChunkStore::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));
        let coord = ChunkCoord::new(5, 5);

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store
                        .get_or_generate(coord, |c| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            chunk(c)
                        })
                        .unwrap()
                })
            })
            .collect();

        let fresh = workers
            .into_iter()
            .map(|w| w.join().unwrap())
            .filter(|r| r.freshly_generated)
            .count();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(fresh, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_panicking_generator_releases_marker() {
        let store = Arc::new(ChunkStore::<u32>::new());
        let coord = ChunkCoord::new(0, 3);

        let panicking = Arc::clone(&store);
        let result = thread::spawn(move || {
            let _ = panicking.get_or_generate(coord, |_| -> Result<Chunk<u32>, ()> {
                panic!("generator failed")
            });
        })
        .join();
        assert!(result.is_err());

        assert!(store.get_or_generate(coord, chunk).unwrap().freshly_generated);
    }
}

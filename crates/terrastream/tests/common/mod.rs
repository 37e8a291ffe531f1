//! Shared collaborators for streaming integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use terrastream::{
    ChunkCoord, ChunkGeometry, ChunkRenderer, RendererError, StreamingConfig, ValidatedConfig,
};

/// One renderer call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Call {
    Create(ChunkCoord, u64),
    Destroy(ChunkCoord, u64),
}

/// Renderer that records every call and checks handle ownership.
#[derive(Default)]
pub struct RecordingRenderer {
    next: AtomicU64,
    calls: Mutex<Vec<Call>>,
    live: Mutex<HashMap<u64, ChunkCoord>>,
    rejected: Mutex<HashSet<ChunkCoord>>,
    unavailable: AtomicBool,
    budget: Mutex<Option<usize>>,
}

impl RecordingRenderer {
    pub fn reject(&self, coord: ChunkCoord) {
        self.rejected.lock().insert(coord);
    }

    pub fn accept(&self, coord: ChunkCoord) {
        self.rejected.lock().remove(&coord);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Goes unavailable after `creates` more successful creates.
    pub fn fail_after(&self, creates: usize) {
        *self.budget.lock() = Some(creates);
    }

    pub fn lift_budget(&self) {
        *self.budget.lock() = None;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn creates_of(&self, coord: ChunkCoord) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::Create(at, _) if *at == coord))
            .count()
    }

    pub fn destroys_of(&self, coord: ChunkCoord) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::Destroy(at, _) if *at == coord))
            .count()
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    /// Chunks created and not yet destroyed according to the call log.
    pub fn live_coords(&self) -> Vec<ChunkCoord> {
        let mut live = HashSet::new();
        for call in self.calls.lock().iter() {
            match *call {
                Call::Create(coord, _) => assert!(live.insert(coord)),
                Call::Destroy(coord, _) => assert!(live.remove(&coord)),
            }
        }
        let mut coords: Vec<_> = live.into_iter().collect();
        coords.sort_unstable_by_key(|c| (c.x, c.z));
        coords
    }
}

impl ChunkRenderer for RecordingRenderer {
    type Handle = u64;

    fn create_chunk_visual(
        &self,
        coord: ChunkCoord,
        geometry: &ChunkGeometry,
    ) -> Result<u64, RendererError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RendererError::Unavailable);
        }
        if let Some(left) = self.budget.lock().as_mut() {
            if *left == 0 {
                return Err(RendererError::Unavailable);
            }
            *left -= 1;
        }
        if self.rejected.lock().contains(&coord) {
            return Err(RendererError::Rejected(format!("{coord} refused")));
        }
        assert!(geometry.unit_count() > 0, "empty geometry for {coord}");

        let handle = self.next.fetch_add(1, Ordering::SeqCst);
        self.live.lock().insert(handle, coord);
        self.calls.lock().push(Call::Create(coord, handle));
        Ok(handle)
    }

    fn destroy_chunk_visual(&self, coord: ChunkCoord, handle: u64) {
        let owner = self.live.lock().remove(&handle);
        assert_eq!(owner, Some(coord), "handle {handle} destroyed twice or for the wrong chunk");
        self.calls.lock().push(Call::Destroy(coord, handle));
    }
}

/// Chunk size 20 with the given radii, synchronous.
pub fn config(load_radius: u32, unload_radius: u32) -> ValidatedConfig {
    StreamingConfig {
        chunk_size: 20,
        load_radius,
        unload_radius,
        background_tick_interval: 0.0,
        ..StreamingConfig::test()
    }
    .validate()
    .unwrap()
}

pub fn square(centre: ChunkCoord, radius: u32) -> Vec<ChunkCoord> {
    let mut coords: Vec<_> = centre.square(radius).collect();
    coords.sort_unstable_by_key(|c| (c.x, c.z));
    coords
}

//! # Host Collaborators
//!
//! The streamer never owns a camera or a GPU. The host provides both
//! through these two traits:
//!
//! - [`PositionSource`]: where the observer is right now
//! - [`ChunkRenderer`]: turns geometry into an opaque visual handle and
//!   destroys it again on unload

use std::sync::Arc;

use parking_lot::RwLock;
use terrastream_procedural::{ChunkCoord, ChunkGeometry};

use crate::error::RendererError;

/// Observer position in world units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WorldPosition {
    /// X (east).
    pub x: f64,
    /// Y (up). Ignored by streaming.
    pub y: f64,
    /// Z (north).
    pub z: f64,
}

impl WorldPosition {
    /// Creates a position.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Position on the ground plane.
    #[inline]
    #[must_use]
    pub const fn on_ground(x: f64, z: f64) -> Self {
        Self { x, y: 0.0, z }
    }
}

/// Provides the observer position once per tick.
pub trait PositionSource: Send + Sync {
    /// Current position, or `None` if the observer is not available.
    fn current_position(&self) -> Option<WorldPosition>;
}

/// Creates and destroys the visual for one chunk.
///
/// Calls for one coordinate are never concurrent, and every handle returned
/// by `create_chunk_visual` is passed to `destroy_chunk_visual` exactly once.
pub trait ChunkRenderer: Send + Sync {
    /// Opaque visual handle.
    type Handle: Send + Sync + 'static;

    /// Uploads geometry for `coord`.
    ///
    /// # Errors
    ///
    /// [`RendererError::Unavailable`] ends the tick at this chunk,
    /// [`RendererError::Rejected`] fails only this chunk.
    fn create_chunk_visual(
        &self,
        coord: ChunkCoord,
        geometry: &ChunkGeometry,
    ) -> Result<Self::Handle, RendererError>;

    /// Releases a handle previously returned by `create_chunk_visual`.
    fn destroy_chunk_visual(&self, coord: ChunkCoord, handle: Self::Handle);
}

impl<T: PositionSource + ?Sized> PositionSource for Arc<T> {
    fn current_position(&self) -> Option<WorldPosition> {
        (**self).current_position()
    }
}

impl<T: ChunkRenderer + ?Sized> ChunkRenderer for Arc<T> {
    type Handle = T::Handle;

    fn create_chunk_visual(
        &self,
        coord: ChunkCoord,
        geometry: &ChunkGeometry,
    ) -> Result<Self::Handle, RendererError> {
        (**self).create_chunk_visual(coord, geometry)
    }

    fn destroy_chunk_visual(&self, coord: ChunkCoord, handle: Self::Handle) {
        (**self).destroy_chunk_visual(coord, handle);
    }
}

/// Shared observer slot the host writes each frame.
#[derive(Debug, Default)]
pub struct ObserverCell {
    position: RwLock<Option<WorldPosition>>,
}

impl ObserverCell {
    /// Empty cell; reads `None` until the first [`ObserverCell::set`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cell holding `position`.
    #[must_use]
    pub fn at(position: WorldPosition) -> Self {
        Self {
            position: RwLock::new(Some(position)),
        }
    }

    /// Moves the observer.
    pub fn set(&self, position: WorldPosition) {
        *self.position.write() = Some(position);
    }

    /// Marks the observer as gone.
    pub fn clear(&self) {
        *self.position.write() = None;
    }
}

impl PositionSource for ObserverCell {
    fn current_position(&self) -> Option<WorldPosition> {
        *self.position.read()
    }
}

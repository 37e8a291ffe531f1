//! # Terrastream
//!
//! Chunk streaming for procedurally generated voxel terrain.
//!
//! ## Architecture
//!
//! ```text
//! FrameScheduler / BackgroundLoader
//!         │
//!         ▼
//!   ChunkStreamer ──▶ ChunkStore::get_or_generate ──▶ VoxelMesher ──▶ ChunkRenderer
//!         │
//!         └──▶ ChunkStore::remove ──▶ ChunkRenderer::destroy_chunk_visual
//! ```
//!
//! The host supplies a [`PositionSource`] and a [`ChunkRenderer`]; the crate
//! owns nothing else. All generation parameters arrive once, through a
//! [`ValidatedConfig`].
//!
//! ## Example
//!
//! ```rust
//! use terrastream::{
//!     ChunkGeometry, ChunkCoord, ChunkRenderer, ChunkStreamer, RendererError, StreamingConfig,
//!     WorldPosition,
//! };
//!
//! struct NullRenderer;
//!
//! impl ChunkRenderer for NullRenderer {
//!     type Handle = usize;
//!
//!     fn create_chunk_visual(
//!         &self,
//!         _coord: ChunkCoord,
//!         geometry: &ChunkGeometry,
//!     ) -> Result<usize, RendererError> {
//!         Ok(geometry.unit_count())
//!     }
//!
//!     fn destroy_chunk_visual(&self, _coord: ChunkCoord, _handle: usize) {}
//! }
//!
//! let config = StreamingConfig::test().validate().unwrap();
//! let streamer = ChunkStreamer::new(config, NullRenderer);
//!
//! let report = streamer.tick(WorldPosition::on_ground(0.0, 0.0)).unwrap();
//! assert_eq!(report.loaded.len(), 9);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod collaborators;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod store;
pub mod streamer;

pub use collaborators::{ChunkRenderer, ObserverCell, PositionSource, WorldPosition};
pub use config::{DistanceMetric, StreamingConfig, ValidatedConfig};
pub use error::{
    Collaborator, ConfigError, ConfigResult, RendererError, StreamError, StreamResult,
};
pub use scheduler::{BackgroundLoader, FrameScheduler, IntervalTimer, TickMode};
pub use store::{Chunk, ChunkRef, ChunkStore};
pub use streamer::{ChunkStreamer, StreamStats, TickReport};

pub use terrastream_procedural::{
    BackendKind, ChunkCoord, ChunkGeometry, ChunkMesh, ChunkSize, EmissionPolicy,
    HeightQuantization, TerrainVertex, VoxelPos,
};

//! # Terrastream Procedural Generation
//!
//! Deterministic terrain geometry for an unbounded, chunked world.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed and parameters always produce the same geometry
//! 2. **Chunked**: World is generated in fixed-size, full-height columns
//! 3. **Stateless**: Any chunk can be regenerated at any time; nothing is stored
//!
//! ## Core Components
//!
//! - `NoiseField`: integer world column to terrain height
//! - `ChunkCoord` / `Heightfield`: grid addressing and per-chunk heights
//! - `VoxelMesher`: heightfield to geometry through a pluggable `GeometryBackend`
//!
//! ## Example
//!
//! ```rust
//! use terrastream_procedural::{
//!     BackendKind, ChunkCoord, ChunkSize, EmissionPolicy, NoiseField, NoiseParams, VoxelMesher,
//! };
//!
//! let field = NoiseField::new(NoiseParams::default()).unwrap();
//! let size = ChunkSize::new(20).unwrap();
//! let mesher = VoxelMesher::new(field, size, EmissionPolicy::ColumnFill, BackendKind::Mesh.into_backend());
//!
//! let geometry = mesher.generate(ChunkCoord::new(0, 0)).unwrap();
//! assert!(geometry.unit_count() >= 400);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod chunk;
pub mod error;
pub mod mesher;
pub mod noise;

pub use chunk::{ChunkCoord, ChunkSize, Heightfield};
pub use error::{ParamError, ParamResult};
pub use mesher::{
    BackendKind, ChunkGeometry, ChunkMesh, CubeMeshBackend, EmissionPolicy, GeometryBackend,
    InstanceBackend, TerrainVertex, VoxelMesher, VoxelPos, FACE_INDICES, INDICES_PER_UNIT,
    VERTICES_PER_UNIT,
};
pub use noise::{
    HeightQuantization, NoiseField, NoiseParams, SimplexNoise, WorldSeed, MAX_TERRAIN_HEIGHT,
};

//! # Voxel Mesher
//!
//! Turns a chunk's heightfield into renderable geometry.
//!
//! ```text
//! NoiseField ──> Heightfield ──> solid units ──> GeometryBackend ──> ChunkGeometry
//!                 (per column)    (emission policy)   (mesh | instances)
//! ```
//!
//! ## Emission
//!
//! - [`EmissionPolicy::ColumnFill`]: one unit at every `y` in `[0, h]`
//! - [`EmissionPolicy::Surface`]: one unit at `y = h`
//!
//! ## Cube Mesh Layout
//!
//! [`CubeMeshBackend`] emits every face of every unit: 24 vertices and 36
//! indices per unit, no culling against neighbours. Faces are written in the
//! order front (-Z), right (+X), back (+Z), left (-X), top (+Y), bottom (-Y).
//! Each face lists its 4 corners counter-clockwise as seen from outside, and
//! its two triangles use the fixed local pattern `{0, 2, 1, 0, 3, 2}`, which
//! makes them clockwise from outside: front-facing in a left-handed, y-up
//! convention.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::chunk::{ChunkCoord, ChunkSize, Heightfield};
use crate::noise::NoiseField;

/// Vertices emitted per unit cube.
pub const VERTICES_PER_UNIT: usize = 24;

/// Indices emitted per unit cube.
pub const INDICES_PER_UNIT: usize = 36;

/// Triangle pattern of one face, relative to its first vertex.
pub const FACE_INDICES: [u32; 6] = [0, 2, 1, 0, 3, 2];

/// UVs of one face, one per corner.
pub const FACE_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

/// One face of the unit cube.
struct CubeFace {
    normal: [f32; 3],
    /// Corners relative to the unit's minimum corner.
    corners: [[f32; 3]; 4],
}

/// Front, right, back, left, top, bottom.
const CUBE_FACES: [CubeFace; 6] = [
    CubeFace {
        normal: [0.0, 0.0, -1.0],
        corners: [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
    },
    CubeFace {
        normal: [1.0, 0.0, 0.0],
        corners: [[1.0, 0.0, 0.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 0.0]],
    },
    CubeFace {
        normal: [0.0, 0.0, 1.0],
        corners: [[1.0, 0.0, 1.0], [0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [1.0, 1.0, 1.0]],
    },
    CubeFace {
        normal: [-1.0, 0.0, 0.0],
        corners: [[0.0, 0.0, 1.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 1.0, 1.0]],
    },
    CubeFace {
        normal: [0.0, 1.0, 0.0],
        corners: [[0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]],
    },
    CubeFace {
        normal: [0.0, -1.0, 0.0],
        corners: [[1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 1.0]],
    },
];

// =============================================================================
// UNITS
// =============================================================================

/// A solid grid cell at integer world coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct VoxelPos {
    /// World X.
    pub x: i32,
    /// World Y (height above the ground plane).
    pub y: i32,
    /// World Z.
    pub z: i32,
}

impl VoxelPos {
    /// Creates a new unit position.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Which units a column of height `h` produces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmissionPolicy {
    /// Solid stack from the ground up: `y` in `[0, h]`.
    #[default]
    ColumnFill,
    /// Single unit at `y = h`.
    Surface,
}

impl EmissionPolicy {
    /// Units one column emits.
    #[inline]
    #[must_use]
    pub fn units_for(self, height: i32) -> usize {
        match self {
            Self::ColumnFill => height.max(0) as usize + 1,
            Self::Surface => 1,
        }
    }

    /// Appends the units of one column.
    #[inline]
    fn emit(self, world_x: i32, world_z: i32, height: i32, out: &mut Vec<VoxelPos>) {
        let h = height.max(0);
        match self {
            Self::ColumnFill => out.extend((0..=h).map(|y| VoxelPos::new(world_x, y, world_z))),
            Self::Surface => out.push(VoxelPos::new(world_x, h, world_z)),
        }
    }
}

// =============================================================================
// GEOMETRY OUTPUT
// =============================================================================

/// Vertex for terrain meshes, laid out for direct buffer upload.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    /// Position in world space.
    pub position: [f32; 3],
    /// Outward face normal.
    pub normal: [f32; 3],
    /// Texture coordinate.
    pub uv: [f32; 2],
}

/// Combined mesh for one chunk.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkMesh {
    /// Vertex buffer data.
    pub vertices: Vec<TerrainVertex>,
    /// Index buffer data, three per triangle.
    pub indices: Vec<u32>,
}

impl ChunkMesh {
    /// Check if mesh is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Get vertex count.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get triangle count.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex positions, one per vertex.
    pub fn positions(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.vertices.iter().map(|v| v.position)
    }

    /// UV coordinates, one per vertex.
    pub fn uvs(&self) -> impl Iterator<Item = [f32; 2]> + '_ {
        self.vertices.iter().map(|v| v.uv)
    }

    /// Index triples.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Raw vertex bytes for upload.
    #[must_use]
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Raw index bytes for upload.
    #[must_use]
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Appends the 6 faces of one unit cube.
    fn push_unit(&mut self, unit: VoxelPos) {
        let origin = [unit.x as f32, unit.y as f32, unit.z as f32];
        for face in &CUBE_FACES {
            // Offset accumulates across every unit of the chunk.
            let base = self.vertices.len() as u32;
            for (corner, uv) in face.corners.iter().zip(FACE_UVS) {
                self.vertices.push(TerrainVertex {
                    position: [
                        origin[0] + corner[0],
                        origin[1] + corner[1],
                        origin[2] + corner[2],
                    ],
                    normal: face.normal,
                    uv,
                });
            }
            self.indices.extend(FACE_INDICES.iter().map(|i| base + i));
        }
    }
}

/// Geometry produced for one chunk, in the form its backend chose.
#[derive(Clone, Debug, PartialEq)]
pub enum ChunkGeometry {
    /// One combined vertex/index/UV buffer.
    Mesh(ChunkMesh),
    /// One discrete instance per solid unit.
    Instances(Vec<VoxelPos>),
}

impl ChunkGeometry {
    /// Number of solid units represented.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        match self {
            Self::Mesh(mesh) => mesh.vertex_count() / VERTICES_PER_UNIT,
            Self::Instances(units) => units.len(),
        }
    }

    /// Returns the mesh, if this geometry is one.
    #[must_use]
    pub fn as_mesh(&self) -> Option<&ChunkMesh> {
        match self {
            Self::Mesh(mesh) => Some(mesh),
            Self::Instances(_) => None,
        }
    }

    /// Returns the instances, if this geometry is a list of them.
    #[must_use]
    pub fn as_instances(&self) -> Option<&[VoxelPos]> {
        match self {
            Self::Mesh(_) => None,
            Self::Instances(units) => Some(units),
        }
    }
}

// =============================================================================
// BACKENDS
// =============================================================================

/// Converts a chunk's solid units into renderer-facing geometry.
pub trait GeometryBackend: Send + Sync {
    /// Builds geometry for the given units, in emission order.
    fn build(&self, units: &[VoxelPos]) -> ChunkGeometry;
}

/// Full-emission cube mesh.
#[derive(Clone, Copy, Debug, Default)]
pub struct CubeMeshBackend;

impl GeometryBackend for CubeMeshBackend {
    fn build(&self, units: &[VoxelPos]) -> ChunkGeometry {
        let mut mesh = ChunkMesh {
            vertices: Vec::with_capacity(units.len() * VERTICES_PER_UNIT),
            indices: Vec::with_capacity(units.len() * INDICES_PER_UNIT),
        };
        for &unit in units {
            mesh.push_unit(unit);
        }
        ChunkGeometry::Mesh(mesh)
    }
}

/// One discrete object per unit; the renderer instantiates them.
#[derive(Clone, Copy, Debug, Default)]
pub struct InstanceBackend;

impl GeometryBackend for InstanceBackend {
    fn build(&self, units: &[VoxelPos]) -> ChunkGeometry {
        ChunkGeometry::Instances(units.to_vec())
    }
}

/// Backend selector as it appears in configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// [`CubeMeshBackend`].
    #[default]
    Mesh,
    /// [`InstanceBackend`].
    Instances,
}

impl BackendKind {
    /// Instantiates the selected backend.
    #[must_use]
    pub fn into_backend(self) -> Box<dyn GeometryBackend> {
        match self {
            Self::Mesh => Box::new(CubeMeshBackend),
            Self::Instances => Box::new(InstanceBackend),
        }
    }
}

// =============================================================================
// MESHER
// =============================================================================

/// Generates chunk geometry from the noise field.
///
/// Stateless per coordinate: generating the same chunk twice yields
/// bit-identical buffers, so chunks are never persisted.
pub struct VoxelMesher {
    field: NoiseField,
    size: ChunkSize,
    policy: EmissionPolicy,
    backend: Box<dyn GeometryBackend>,
}

impl VoxelMesher {
    /// Creates a mesher over a validated noise field.
    #[must_use]
    pub fn new(
        field: NoiseField,
        size: ChunkSize,
        policy: EmissionPolicy,
        backend: Box<dyn GeometryBackend>,
    ) -> Self {
        Self { field, size, policy, backend }
    }

    /// Chunk edge length.
    #[inline]
    #[must_use]
    pub const fn chunk_size(&self) -> ChunkSize {
        self.size
    }

    /// Emission policy in use.
    #[inline]
    #[must_use]
    pub const fn policy(&self) -> EmissionPolicy {
        self.policy
    }

    /// Noise field in use.
    #[inline]
    #[must_use]
    pub const fn field(&self) -> &NoiseField {
        &self.field
    }

    /// Column heights of a chunk, `None` if it lies off the world grid.
    #[must_use]
    pub fn heightfield(&self, coord: ChunkCoord) -> Option<Heightfield> {
        Heightfield::sample(&self.field, coord, self.size)
    }

    /// Solid units of a chunk, columns in row-major order, bottom to top.
    #[must_use]
    pub fn units(&self, coord: ChunkCoord) -> Option<Vec<VoxelPos>> {
        let heights = self.heightfield(coord)?;
        let mut units = Vec::with_capacity(self.size.area() * 2);
        for (x, z, h) in heights.columns() {
            self.policy.emit(x, z, h, &mut units);
        }
        Some(units)
    }

    /// Complete geometry for a chunk, `None` if it lies off the world grid.
    #[must_use]
    pub fn generate(&self, coord: ChunkCoord) -> Option<ChunkGeometry> {
        self.units(coord).map(|units| self.backend.build(&units))
    }
}

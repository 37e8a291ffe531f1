//! # Chunk Grid
//!
//! The world is an unbounded grid of square, full-height chunk columns.
//! A chunk is addressed by integer coordinates only; world positions map to
//! chunks by flooring, so negative space partitions exactly like positive
//! space.
//!
//! ## Layout
//!
//! Chunk `(cx, cz)` covers world columns
//! `[cx * size, (cx + 1) * size) x [cz * size, (cz + 1) * size)`.

use std::fmt;

use crate::error::{ParamError, ParamResult};
use crate::noise::NoiseField;

/// Chunk edge length in voxels. Always at least one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkSize(u32);

impl ChunkSize {
    /// Validates a configured edge length.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::InvalidChunkSize`] for zero, negative, or
    /// values that do not fit the integer grid.
    pub fn new(size: i64) -> ParamResult<Self> {
        match i32::try_from(size) {
            Ok(s) if s > 0 => Ok(Self(s as u32)),
            _ => Err(ParamError::InvalidChunkSize(size)),
        }
    }

    /// Edge length in voxels.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Edge length as a signed grid offset.
    #[inline]
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0 as i32
    }

    /// Columns per chunk.
    #[inline]
    #[must_use]
    pub const fn area(self) -> usize {
        (self.0 as usize) * (self.0 as usize)
    }
}

/// Chunk coordinate on the unbounded grid.
///
/// Equality and hashing are exact-integer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    /// X coordinate (in chunks, not voxels).
    pub x: i32,
    /// Z coordinate (in chunks, not voxels).
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing a world position: `floor(world / size)` per axis.
    ///
    /// Returns `None` for non-finite positions and for positions whose chunk
    /// has columns beyond the `i32` world grid.
    #[must_use]
    pub fn from_world_pos(world_x: f64, world_z: f64, size: ChunkSize) -> Option<Self> {
        let edge = f64::from(size.get());
        let cx = (world_x / edge).floor();
        let cz = (world_z / edge).floor();
        let range = f64::from(i32::MIN)..=f64::from(i32::MAX);
        if !(range.contains(&cx) && range.contains(&cz)) {
            return None;
        }
        let coord = Self::new(cx as i32, cz as i32);
        coord.origin(size).map(|_| coord)
    }

    /// Chunk containing an integer world column.
    #[inline]
    #[must_use]
    pub const fn from_block_pos(block_x: i32, block_z: i32, size: ChunkSize) -> Self {
        Self {
            x: block_x.div_euclid(size.as_i32()),
            z: block_z.div_euclid(size.as_i32()),
        }
    }

    /// World X of the chunk's origin corner, or `None` if any of its
    /// columns lies off the grid.
    #[inline]
    #[must_use]
    pub const fn world_x(self, size: ChunkSize) -> Option<i32> {
        axis_origin(self.x, size)
    }

    /// World Z of the chunk's origin corner, or `None` if any of its
    /// columns lies off the grid.
    #[inline]
    #[must_use]
    pub const fn world_z(self, size: ChunkSize) -> Option<i32> {
        axis_origin(self.z, size)
    }

    /// World origin corner, if every column of the chunk is addressable.
    #[inline]
    #[must_use]
    pub const fn origin(self, size: ChunkSize) -> Option<(i32, i32)> {
        match (self.world_x(size), self.world_z(size)) {
            (Some(x), Some(z)) => Some((x, z)),
            _ => None,
        }
    }

    /// True if every chunk of the square of `radius` around this one has
    /// all of its columns on the grid.
    #[must_use]
    pub fn square_on_grid(self, radius: u32, size: ChunkSize) -> bool {
        let r = i64::from(radius);
        [i64::from(self.x), i64::from(self.z)].into_iter().all(|c| {
            [c - r, c + r].into_iter().all(|edge| {
                i32::try_from(edge).is_ok_and(|edge| axis_origin(edge, size).is_some())
            })
        })
    }

    /// Offsets this coordinate by a number of chunks. `None` past `i32`.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dz: i32) -> Option<Self> {
        match (self.x.checked_add(dx), self.z.checked_add(dz)) {
            (Some(x), Some(z)) => Some(Self::new(x, z)),
            _ => None,
        }
    }

    /// Grid (Chebyshev) distance in chunks.
    #[inline]
    #[must_use]
    pub fn chebyshev_distance(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dz = self.z.abs_diff(other.z);
        dx.max(dz)
    }

    /// Squared Euclidean distance in chunks.
    #[inline]
    #[must_use]
    pub fn euclidean_distance_sq(self, other: Self) -> u64 {
        let dx = u64::from(self.x.abs_diff(other.x));
        let dz = u64::from(self.z.abs_diff(other.z));
        dx * dx + dz * dz
    }

    /// Every coordinate of the square of side `2 * radius + 1` centred here.
    ///
    /// Coordinates that would leave `i32` are skipped, never wrapped.
    pub fn square(self, radius: u32) -> impl Iterator<Item = Self> {
        let r = i64::from(radius);
        (-r..=r).flat_map(move |dz| {
            (-r..=r).filter_map(move |dx| {
                let x = i32::try_from(i64::from(self.x) + dx).ok()?;
                let z = i32::try_from(i64::from(self.z) + dz).ok()?;
                Some(Self::new(x, z))
            })
        })
    }
}

/// First world column of chunk `c` along one axis, if the whole chunk
/// fits in `i32`.
const fn axis_origin(c: i32, size: ChunkSize) -> Option<i32> {
    let edge = size.get() as i64;
    let start = c as i64 * edge;
    let end = start + edge - 1;
    if start >= i32::MIN as i64 && end <= i32::MAX as i64 {
        Some(start as i32)
    } else {
        None
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Integer column heights for one chunk, indexed `[z][x]` in local space.
///
/// Not stored alongside a chunk: it is recomputed from the noise field on
/// every generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Heightfield {
    coord: ChunkCoord,
    size: ChunkSize,
    origin: (i32, i32),
    heights: Vec<i32>,
}

impl Heightfield {
    /// Samples every column of `coord` from the noise field.
    ///
    /// Returns `None` if the chunk has columns off the grid.
    #[must_use]
    pub fn sample(field: &NoiseField, coord: ChunkCoord, size: ChunkSize) -> Option<Self> {
        let edge = size.as_i32();
        let origin = coord.origin(size)?;

        let mut heights = Vec::with_capacity(size.area());
        for local_z in 0..edge {
            for local_x in 0..edge {
                heights.push(field.column_height(origin.0 + local_x, origin.1 + local_z));
            }
        }

        Some(Self {
            coord,
            size,
            origin,
            heights,
        })
    }

    /// Chunk these heights belong to.
    #[inline]
    #[must_use]
    pub const fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Edge length of the sampled square.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> ChunkSize {
        self.size
    }

    /// Height at a local column, or `None` outside the chunk.
    #[inline]
    #[must_use]
    pub fn get(&self, local_x: u32, local_z: u32) -> Option<i32> {
        let edge = self.size.get();
        if local_x < edge && local_z < edge {
            Some(self.heights[(local_z * edge + local_x) as usize])
        } else {
            None
        }
    }

    /// Iterates `(world_x, world_z, height)` in row-major local order.
    pub fn columns(&self) -> impl Iterator<Item = (i32, i32, i32)> + '_ {
        let edge = self.size.get();
        let (origin_x, origin_z) = self.origin;
        self.heights.iter().enumerate().map(move |(i, &h)| {
            let local_x = (i as u32 % edge) as i32;
            let local_z = (i as u32 / edge) as i32;
            (origin_x + local_x, origin_z + local_z, h)
        })
    }
}

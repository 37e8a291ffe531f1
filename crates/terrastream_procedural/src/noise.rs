//! # Noise Field
//!
//! Deterministic 2D height sampling for terrain columns.
//!
//! ## Layers
//!
//! - [`SimplexNoise`]: seeded coherent noise in `[-1, 1]`
//! - [`NoiseField`]: world column `(x, z)` to terrain height, with scale,
//!   amplitude and vertical quantization applied
//!
//! ## Determinism Guarantee
//!
//! Given the same [`NoiseParams`], a [`NoiseField`] produces **exactly** the
//! same heights on any platform, in any process, at any time. Only integer
//! world coordinates and IEEE-754 `f64` arithmetic feed the result, so a
//! chunk can be regenerated bit-identically instead of being stored.

use serde::{Deserialize, Serialize};

use crate::error::{ParamError, ParamResult};

/// World seed for deterministic generation.
///
/// All procedural generation derives from this seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldSeed(u64);

impl WorldSeed {
    /// Creates a new world seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the raw seed value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Derives an independent sub-seed for a specific purpose.
    #[inline]
    #[must_use]
    pub const fn derive(self, purpose: u64) -> Self {
        let mut hash = self.0;
        hash ^= purpose;
        hash = hash.wrapping_mul(0x517c_c1b7_2722_0a95);
        hash ^= hash >> 32;
        Self(hash)
    }
}

impl Default for WorldSeed {
    fn default() -> Self {
        Self(0xDEAD_BEEF_CAFE_BABE)
    }
}

/// Seeded permutation and gradient tables.
#[derive(Clone)]
struct PermutationTable {
    /// 256 shuffled entries, doubled so lookups never wrap.
    perm: [u8; 512],
}

impl PermutationTable {
    /// Gradient directions for 2D simplex corners.
    const GRADIENTS: [[i8; 2]; 12] = [
        [1, 0], [1, 1], [0, 1], [-1, 1],
        [-1, 0], [-1, -1], [0, -1], [1, -1],
        [1, 0], [0, 1], [-1, 0], [0, -1],
    ];

    fn new(seed: WorldSeed) -> Self {
        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().take(256).enumerate() {
            *slot = i as u8;
        }

        // Fisher-Yates driven by xorshift64. A zero state would never advance.
        let mut state = seed.value().max(1);
        for i in (1..256).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let j = (state % (i as u64 + 1)) as usize;
            perm.swap(i, j);
        }

        let (low, high) = perm.split_at_mut(256);
        high.copy_from_slice(low);

        Self { perm }
    }

    #[inline]
    fn get(&self, index: usize) -> u8 {
        self.perm[index & 511]
    }

    #[inline]
    fn gradient(hash: u8) -> [i8; 2] {
        Self::GRADIENTS[(hash % 12) as usize]
    }
}

/// 2D Simplex noise generator.
///
/// Produces smooth, continuous values in `[-1, 1]`. O(1) per sample, no
/// allocations after construction.
#[derive(Clone)]
pub struct SimplexNoise {
    table: PermutationTable,
}

impl SimplexNoise {
    /// Skewing factor for the 2D simplex grid: `(sqrt(3) - 1) / 2`.
    const F2: f64 = 0.366_025_403_784_439;
    /// Unskewing factor for the 2D simplex grid: `(3 - sqrt(3)) / 6`.
    const G2: f64 = 0.211_324_865_405_187;

    /// Creates a new simplex noise generator from a seed.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        Self {
            table: PermutationTable::new(seed),
        }
    }

    /// Samples noise at `(x, y)`. Returns a value in `[-1, 1]`.
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let skew = (x + y) * Self::F2;
        let i = fast_floor(x + skew);
        let j = fast_floor(y + skew);

        let unskew = f64::from(i.wrapping_add(j)) * Self::G2;
        let x0 = x - (f64::from(i) - unskew);
        let y0 = y - (f64::from(j) - unskew);

        // Upper or lower triangle of the skewed cell.
        let (i1, j1): (usize, usize) = if x0 > y0 { (1, 0) } else { (0, 1) };

        let x1 = x0 - i1 as f64 + Self::G2;
        let y1 = y0 - j1 as f64 + Self::G2;
        let x2 = x0 - 1.0 + 2.0 * Self::G2;
        let y2 = y0 - 1.0 + 2.0 * Self::G2;

        let ii = (i & 255) as usize;
        let jj = (j & 255) as usize;
        let t = &self.table;

        let h0 = t.get(ii + t.get(jj) as usize);
        let h1 = t.get(ii + i1 + t.get(jj + j1) as usize);
        let h2 = t.get(ii + 1 + t.get(jj + 1) as usize);

        70.0 * (corner(x0, y0, h0) + corner(x1, y1, h1) + corner(x2, y2, h2))
    }

    /// Samples noise remapped to `[0, 1]`.
    #[inline]
    #[must_use]
    pub fn sample_unit(&self, x: f64, y: f64) -> f64 {
        ((self.sample(x, y) + 1.0) * 0.5).clamp(0.0, 1.0)
    }
}

/// Contribution of one simplex corner.
#[inline]
fn corner(x: f64, y: f64, hash: u8) -> f64 {
    let t = 0.5 - x * x - y * y;
    if t < 0.0 {
        return 0.0;
    }
    let grad = PermutationTable::gradient(hash);
    let t2 = t * t;
    t2 * t2 * (x * f64::from(grad[0]) + y * f64::from(grad[1]))
}

/// Fast floor for values inside the `i32` range.
#[inline]
fn fast_floor(x: f64) -> i32 {
    let xi = x as i32;
    if x < f64::from(xi) { xi - 1 } else { xi }
}

/// How a continuous height becomes an integer column height.
///
/// The two policies give visibly different terrain for non-integer noise:
/// rounding lifts any column at or past the half step, flooring never does.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightQuantization {
    /// Round to nearest, ties to even.
    #[default]
    Round,
    /// Round toward negative infinity.
    Floor,
}

impl HeightQuantization {
    /// Applies the policy to a raw height.
    #[inline]
    #[must_use]
    pub fn apply(self, raw: f64) -> f64 {
        match self {
            Self::Round => raw.round_ties_even(),
            Self::Floor => raw.floor(),
        }
    }
}

/// Tallest column the field may produce, in voxels.
///
/// Column fill emits one unit per voxel of height, so this also bounds the
/// units per column.
pub const MAX_TERRAIN_HEIGHT: f64 = 4096.0;

/// Process-wide noise parameters. Fixed once chunks exist.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoiseParams {
    /// Seed for the noise permutation.
    pub seed: WorldSeed,
    /// World units to noise units (frequency).
    pub scale: f64,
    /// Amplitude applied to the `[0, 1]` noise value.
    pub height_multiplier: f64,
    /// Extra vertical multiplier applied after the amplitude.
    pub hill_height: f64,
    /// Integer height policy.
    pub quantization: HeightQuantization,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            seed: WorldSeed::default(),
            scale: 0.1,
            height_multiplier: 7.0,
            hill_height: 1.0,
            quantization: HeightQuantization::Round,
        }
    }
}

impl NoiseParams {
    /// Checks that every real parameter is finite and strictly positive,
    /// and that `height_multiplier * hill_height` stays within
    /// [`MAX_TERRAIN_HEIGHT`].
    ///
    /// # Errors
    ///
    /// Returns the first offending parameter.
    pub fn validate(&self) -> ParamResult<()> {
        for (name, value) in [
            ("noise_scale", self.scale),
            ("height_multiplier", self.height_multiplier),
            ("hill_height", self.hill_height),
        ] {
            if !value.is_finite() {
                return Err(ParamError::NonFinite { name });
            }
            if value <= 0.0 {
                return Err(ParamError::NonPositive { name, value });
            }
        }

        let amplitude = self.height_multiplier * self.hill_height;
        if amplitude > MAX_TERRAIN_HEIGHT {
            return Err(ParamError::HeightOutOfRange {
                value: amplitude,
                max: MAX_TERRAIN_HEIGHT,
            });
        }
        Ok(())
    }
}

/// Pure height function over integer world columns.
///
/// No caching: a sample is O(1) and memoization belongs to the chunk.
#[derive(Clone)]
pub struct NoiseField {
    noise: SimplexNoise,
    params: NoiseParams,
}

impl NoiseField {
    /// Builds a field from validated parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError`] if any parameter is non-finite or non-positive.
    pub fn new(params: NoiseParams) -> ParamResult<Self> {
        params.validate()?;
        Ok(Self {
            noise: SimplexNoise::new(params.seed),
            params,
        })
    }

    /// Parameters this field was built with.
    #[inline]
    #[must_use]
    pub const fn params(&self) -> &NoiseParams {
        &self.params
    }

    /// Height before quantization.
    #[must_use]
    pub fn raw_height(&self, world_x: i32, world_z: i32) -> f64 {
        let p = &self.params;
        let n = self
            .noise
            .sample_unit(f64::from(world_x) * p.scale, f64::from(world_z) * p.scale);
        n * p.height_multiplier * p.hill_height
    }

    /// Quantized height of the column at `(world_x, world_z)`.
    #[inline]
    #[must_use]
    pub fn height(&self, world_x: i32, world_z: i32) -> f64 {
        self.params.quantization.apply(self.raw_height(world_x, world_z))
    }

    /// Integer column height, never below zero.
    #[inline]
    #[must_use]
    pub fn column_height(&self, world_x: i32, world_z: i32) -> i32 {
        self.height(world_x, world_z).max(0.0) as i32
    }
}

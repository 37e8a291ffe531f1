//! # Streaming Configuration
//!
//! Loaded once at startup, validated once, immutable afterwards.
//!
//! ```toml
//! chunk_size = 20
//! load_radius = 3
//! unload_radius = 5
//! seed = 42
//! noise_scale = 0.1
//! height_multiplier = 7.0
//! height_quantization = "round"     # or "floor"
//! emission_policy = "column_fill"   # or "surface"
//! geometry_backend = "mesh"         # or "instances"
//! unload_metric = "chebyshev"       # or "euclidean"
//! background_tick_interval = 0.5    # seconds, 0 = synchronous only
//! ```
//!
//! The streamer only accepts a [`ValidatedConfig`], so a configuration that
//! would produce inconsistent neighbouring chunks never reaches it.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use terrastream_procedural::{
    BackendKind, ChunkCoord, ChunkSize, EmissionPolicy, HeightQuantization, NoiseField,
    NoiseParams, VoxelMesher, WorldSeed,
};

use crate::error::{ConfigError, ConfigResult};

/// Distance used to decide when a resident chunk is out of range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `max(|dx|, |dz|)` in chunks.
    #[default]
    Chebyshev,
    /// `sqrt(dx^2 + dz^2)` in chunks.
    Euclidean,
}

impl DistanceMetric {
    /// True if `coord` lies strictly farther than `radius` chunks from `centre`.
    #[inline]
    #[must_use]
    pub fn exceeds(self, centre: ChunkCoord, coord: ChunkCoord, radius: u32) -> bool {
        match self {
            Self::Chebyshev => centre.chebyshev_distance(coord) > radius,
            Self::Euclidean => {
                let r = u64::from(radius);
                centre.euclidean_distance_sq(coord) > r * r
            }
        }
    }

    /// Largest Chebyshev radius whose whole square survives an unload pass
    /// at `radius`.
    #[must_use]
    pub fn retained_square(self, radius: u32) -> u32 {
        match self {
            Self::Chebyshev => radius,
            Self::Euclidean => {
                let limit = u64::from(radius) * u64::from(radius);
                let fits = |r: u32| 2 * u64::from(r) * u64::from(r) <= limit;
                let mut r = (f64::from(radius) / std::f64::consts::SQRT_2) as u32;
                while r > 0 && !fits(r) {
                    r -= 1;
                }
                while fits(r + 1) {
                    r += 1;
                }
                r
            }
        }
    }
}

/// Raw streaming configuration, as written in a config file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamingConfig {
    /// Voxels per chunk edge. Must be positive.
    pub chunk_size: i64,
    /// Chebyshev radius, in chunks, that is kept loaded.
    pub load_radius: u32,
    /// Radius, in chunks, beyond which chunks are evicted.
    pub unload_radius: u32,
    /// Metric for `unload_radius`.
    pub unload_metric: DistanceMetric,
    /// Noise seed.
    pub seed: u64,
    /// World units to noise units.
    pub noise_scale: f64,
    /// Noise amplitude.
    pub height_multiplier: f64,
    /// Extra vertical multiplier.
    pub hill_height: f64,
    /// Integer height policy.
    pub height_quantization: HeightQuantization,
    /// Units per column.
    pub emission_policy: EmissionPolicy,
    /// Geometry representation handed to the renderer.
    pub geometry_backend: BackendKind,
    /// Seconds between throttled load passes; 0 loads every tick.
    pub background_tick_interval: f64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 20,
            load_radius: 3,
            unload_radius: 5,
            unload_metric: DistanceMetric::Chebyshev,
            seed: WorldSeed::default().value(),
            noise_scale: 0.1,
            height_multiplier: 7.0,
            hill_height: 1.0,
            height_quantization: HeightQuantization::Round,
            emission_policy: EmissionPolicy::ColumnFill,
            geometry_backend: BackendKind::Mesh,
            background_tick_interval: 0.5,
        }
    }
}

impl StreamingConfig {
    /// Small, synchronous configuration for tests.
    #[must_use]
    pub fn test() -> Self {
        Self {
            chunk_size: 4,
            load_radius: 1,
            unload_radius: 2,
            seed: 42,
            background_tick_interval: 0.0,
            ..Self::default()
        }
    }

    /// Production view distance with throttled loading.
    #[must_use]
    pub fn production() -> Self {
        Self {
            chunk_size: 20,
            load_radius: 6,
            unload_radius: 8,
            ..Self::default()
        }
    }

    /// Noise parameters carried by this configuration.
    #[must_use]
    pub fn noise_params(&self) -> NoiseParams {
        NoiseParams {
            seed: WorldSeed::new(self.seed),
            scale: self.noise_scale,
            height_multiplier: self.height_multiplier,
            hill_height: self.hill_height,
            quantization: self.height_quantization,
        }
    }

    /// Checks every startup invariant.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(self) -> ConfigResult<ValidatedConfig> {
        let chunk_size = ChunkSize::new(self.chunk_size)?;
        let field = NoiseField::new(self.noise_params())?;

        let (load, unload) = (self.load_radius, self.unload_radius);
        if unload < load {
            return Err(ConfigError::RadiusOrdering { load, unload });
        }
        // The corners of the load square must not be evicted on the same tick.
        if self.unload_metric == DistanceMetric::Euclidean {
            let corner_sq = 2 * u64::from(load) * u64::from(load);
            if corner_sq > u64::from(unload) * u64::from(unload) {
                return Err(ConfigError::UnloadDiscTooSmall { load, unload });
            }
        }

        let interval = self.background_tick_interval;
        if !interval.is_finite() || interval < 0.0 {
            return Err(ConfigError::InvalidInterval(interval));
        }
        let background_interval = Duration::try_from_secs_f64(interval)
            .map_err(|_| ConfigError::InvalidInterval(interval))?;

        Ok(ValidatedConfig {
            raw: self,
            chunk_size,
            field,
            background_interval,
        })
    }

    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or any validation error.
    pub fn from_toml_str(text: &str) -> ConfigResult<ValidatedConfig> {
        let raw: Self = toml::from_str(text)?;
        raw.validate()
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`], [`ConfigError::Parse`] or any validation error.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<ValidatedConfig> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

/// Configuration that passed [`StreamingConfig::validate`].
#[derive(Clone)]
pub struct ValidatedConfig {
    raw: StreamingConfig,
    chunk_size: ChunkSize,
    field: NoiseField,
    background_interval: Duration,
}

impl ValidatedConfig {
    /// The validated values.
    #[inline]
    #[must_use]
    pub const fn raw(&self) -> &StreamingConfig {
        &self.raw
    }

    /// Chunk edge length.
    #[inline]
    #[must_use]
    pub const fn chunk_size(&self) -> ChunkSize {
        self.chunk_size
    }

    /// Load radius in chunks.
    #[inline]
    #[must_use]
    pub const fn load_radius(&self) -> u32 {
        self.raw.load_radius
    }

    /// Unload radius in chunks.
    #[inline]
    #[must_use]
    pub const fn unload_radius(&self) -> u32 {
        self.raw.unload_radius
    }

    /// Unload metric.
    #[inline]
    #[must_use]
    pub const fn unload_metric(&self) -> DistanceMetric {
        self.raw.unload_metric
    }

    /// Minimum spacing between throttled load passes, or `None` when
    /// every tick loads synchronously.
    #[must_use]
    pub fn background_interval(&self) -> Option<Duration> {
        (!self.background_interval.is_zero()).then_some(self.background_interval)
    }

    /// Builds the mesher this configuration describes.
    #[must_use]
    pub fn mesher(&self) -> VoxelMesher {
        VoxelMesher::new(
            self.field.clone(),
            self.chunk_size,
            self.raw.emission_policy,
            self.raw.geometry_backend.into_backend(),
        )
    }
}

impl std::fmt::Debug for ValidatedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ValidatedConfig").field(&self.raw).finish()
    }
}

//! # Streaming Error Types
//!
//! Startup errors ([`ConfigError`]) are fatal. Tick errors ([`StreamError`])
//! skip or degrade one tick and never poison the streamer.

use std::fmt;
use std::path::PathBuf;

use terrastream_procedural::{ChunkCoord, ParamError};
use thiserror::Error;

/// Configuration rejected at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Chunk size or a noise parameter is out of range.
    #[error(transparent)]
    Parameter(#[from] ParamError),

    /// Chunks would be unloaded inside the load area.
    #[error("unload radius {unload} is smaller than load radius {load}")]
    RadiusOrdering {
        /// Configured load radius.
        load: u32,
        /// Configured unload radius.
        unload: u32,
    },

    /// The Euclidean unload disc does not contain the load square.
    #[error("euclidean unload radius {unload} does not cover the corners of load radius {load}")]
    UnloadDiscTooSmall {
        /// Configured load radius.
        load: u32,
        /// Configured unload radius.
        unload: u32,
    },

    /// Background interval is negative or not finite.
    #[error("background tick interval must be finite and non-negative, got {0}")]
    InvalidInterval(f64),

    /// Config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for [`crate::StreamingConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// External collaborator the core depends on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collaborator {
    /// Observer/camera position provider.
    Position,
    /// Chunk visual renderer.
    Renderer,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position => f.write_str("position"),
            Self::Renderer => f.write_str("renderer"),
        }
    }
}

/// Errors a renderer returns from `create_chunk_visual`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RendererError {
    /// The renderer cannot take work right now.
    #[error("renderer unavailable")]
    Unavailable,

    /// The renderer refused this geometry.
    #[error("renderer rejected geometry: {0}")]
    Rejected(String),
}

/// Errors surfaced by a streaming tick.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    /// A collaborator could not be reached; the tick was skipped or cut
    /// short.
    #[error("{0} collaborator unavailable")]
    MissingCollaborator(Collaborator),

    /// Observer position cannot be mapped onto the chunk grid.
    #[error("observer position ({x}, {z}) is not on the chunk grid")]
    InvalidPosition {
        /// Reported X.
        x: f64,
        /// Reported Z.
        z: f64,
    },

    /// A chunk could not be materialized; it stays absent and is retried
    /// on a later tick.
    #[error("generation failed for chunk {coord}: {reason}")]
    GenerationFailure {
        /// Chunk that failed.
        coord: ChunkCoord,
        /// Renderer-provided reason.
        reason: String,
    },
}

impl StreamError {
    /// Maps a renderer failure for `coord` onto the tick taxonomy.
    #[must_use]
    pub fn from_renderer(coord: ChunkCoord, err: RendererError) -> Self {
        match err {
            RendererError::Unavailable => Self::MissingCollaborator(Collaborator::Renderer),
            RendererError::Rejected(reason) => Self::GenerationFailure { coord, reason },
        }
    }

    /// True if the error ends the whole tick rather than one chunk.
    #[must_use]
    pub const fn skips_tick(&self) -> bool {
        !matches!(self, Self::GenerationFailure { .. })
    }
}

/// Result type for streaming operations.
pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderer_error_mapping() {
        let coord = ChunkCoord::new(1, 2);
        assert_eq!(
            StreamError::from_renderer(coord, RendererError::Unavailable),
            StreamError::MissingCollaborator(Collaborator::Renderer)
        );

        let err = StreamError::from_renderer(coord, RendererError::Rejected("too big".into()));
        assert!(!err.skips_tick());
        assert_eq!(err.to_string(), "generation failed for chunk (1, 2): too big");
    }

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::RadiusOrdering { load: 3, unload: 2 };
        assert_eq!(err.to_string(), "unload radius 2 is smaller than load radius 3");

        let err: ConfigError = ParamError::InvalidChunkSize(0).into();
        assert_eq!(err.to_string(), "chunk size must be positive, got 0");
    }
}

//! # Terrastream Demo
//!
//! Headless walk across chunk boundaries. Logs every chunk the streamer
//! creates and destroys, then the final residency.
//!
//! ```bash
//! # Default configuration
//! RUST_LOG=debug ./terrastream_demo
//!
//! # Custom configuration
//! ./terrastream_demo terrain.toml
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use terrastream::{
    ChunkCoord, ChunkGeometry, ChunkRenderer, ChunkStreamer, FrameScheduler, ObserverCell,
    RendererError, StreamingConfig, WorldPosition,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Simulated frame length.
const FRAME: Duration = Duration::from_millis(50);

/// Frames to simulate.
const FRAMES: u32 = 400;

/// Observer speed in world units per second.
const WALK_SPEED: f64 = 15.0;

/// Hands out numbered handles and logs buffer sizes.
#[derive(Default)]
struct LoggingRenderer {
    next_handle: AtomicU64,
    live: AtomicU64,
}

impl ChunkRenderer for LoggingRenderer {
    type Handle = u64;

    fn create_chunk_visual(
        &self,
        coord: ChunkCoord,
        geometry: &ChunkGeometry,
    ) -> Result<u64, RendererError> {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.live.fetch_add(1, Ordering::Relaxed);
        let bytes = geometry
            .as_mesh()
            .map_or(0, |mesh| mesh.vertex_bytes().len() + mesh.index_bytes().len());
        info!(handle, cx = coord.x, cz = coord.z, units = geometry.unit_count(), bytes, "create visual");
        Ok(handle)
    }

    fn destroy_chunk_visual(&self, coord: ChunkCoord, handle: u64) {
        self.live.fetch_sub(1, Ordering::Relaxed);
        info!(handle, cx = coord.x, cz = coord.z, "destroy visual");
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // === CONFIGURATION ===
    let config = match std::env::args().nth(1) {
        Some(path) => StreamingConfig::from_file(&path),
        None => StreamingConfig::default().validate(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    info!(?config, "configuration loaded");

    // === STREAMER ===
    let renderer = Arc::new(LoggingRenderer::default());
    let streamer = Arc::new(ChunkStreamer::new(config, Arc::clone(&renderer)));
    let observer = Arc::new(ObserverCell::at(WorldPosition::default()));

    let spawn = WorldPosition::default();
    match streamer.prewarm(spawn, streamer.config().load_radius()) {
        Ok(report) => info!(loaded = report.loaded.len(), "prewarmed spawn"),
        Err(e) => error!(error = %e, "prewarm failed"),
    }

    // === WALK ===
    let mut scheduler = FrameScheduler::new(Arc::clone(&streamer), Arc::clone(&observer));
    info!(mode = ?scheduler.mode(), "walking");

    let step = WALK_SPEED * FRAME.as_secs_f64();
    let mut x = 0.0;
    for frame in 0..FRAMES {
        // Turn back halfway to cross the same boundaries twice.
        if frame < FRAMES / 2 {
            x += step;
        } else {
            x -= step;
        }
        observer.set(WorldPosition::on_ground(x, 0.0));

        match scheduler.frame(FRAME) {
            Ok(report) if !report.is_quiet() => info!(
                frame,
                cx = report.observer.x,
                cz = report.observer.z,
                loaded = report.loaded.len(),
                unloaded = report.unloaded.len(),
                "residency changed"
            ),
            Ok(_) => {}
            Err(e) => error!(frame, error = %e, "frame skipped"),
        }
    }

    // === SUMMARY ===
    let stats = streamer.stats();
    info!(
        resident = stats.resident,
        generated = stats.generated_total,
        unloaded = stats.unloaded_total,
        failed = stats.failed_total,
        units = streamer.resident_units(),
        "walk finished"
    );

    drop(scheduler);
    let released = streamer.unload_all();
    info!(released, live = renderer.live.load(Ordering::Relaxed), "shutdown complete");
}

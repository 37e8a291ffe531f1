//! # Scheduler Integration Test
//!
//! Throttled per-frame loading and the background loader thread.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{square, RecordingRenderer};
use terrastream::{
    BackgroundLoader, ChunkCoord, ChunkStreamer, Collaborator, FrameScheduler, ObserverCell,
    StreamError, StreamingConfig, TickMode, WorldPosition,
};

const FRAME: Duration = Duration::from_millis(16);

fn throttled(interval: f64) -> StreamingConfig {
    StreamingConfig {
        chunk_size: 20,
        load_radius: 1,
        unload_radius: 2,
        background_tick_interval: interval,
        ..StreamingConfig::test()
    }
}

/// Test: Configuration selects the scheduler mode.
#[test]
fn test_mode_follows_config() {
    let sync = Arc::new(ChunkStreamer::new(
        throttled(0.0).validate().unwrap(),
        RecordingRenderer::default(),
    ));
    let scheduler = FrameScheduler::new(sync, ObserverCell::new());
    assert_eq!(scheduler.mode(), TickMode::Synchronous);

    let slow = Arc::new(ChunkStreamer::new(
        throttled(0.5).validate().unwrap(),
        RecordingRenderer::default(),
    ));
    let scheduler = FrameScheduler::new(slow, ObserverCell::new());
    assert_eq!(scheduler.mode(), TickMode::Throttled(Duration::from_millis(500)));
}

/// Test: Throttled frames unload every frame but load once per interval.
#[test]
fn test_throttled_frames() {
    let streamer = Arc::new(ChunkStreamer::new(
        throttled(0.5).validate().unwrap(),
        RecordingRenderer::default(),
    ));
    let observer = Arc::new(ObserverCell::at(WorldPosition::default()));
    let mut scheduler = FrameScheduler::new(Arc::clone(&streamer), Arc::clone(&observer));

    let first = scheduler.frame(FRAME).unwrap();
    assert_eq!(first.loaded.len(), 9);

    observer.set(WorldPosition::on_ground(45.0, 0.0));
    let moved = scheduler.frame(FRAME).unwrap();
    assert!(moved.loaded.is_empty());
    assert_eq!(moved.unloaded.len(), 3);
    assert_eq!(streamer.stats().resident, 6);

    // Clamped to 250 ms, so this frame alone does not reach the interval.
    let stalled = scheduler.frame(Duration::from_secs(5)).unwrap();
    assert!(stalled.loaded.is_empty());

    let due = scheduler.frame(Duration::from_millis(250)).unwrap();
    assert_eq!(due.loaded.len(), 6);
    assert_eq!(streamer.resident_coords().len(), 12);
}

/// Test: A renderer outage on a throttled load frame keeps that frame's
/// unload work in the report.
#[test]
fn test_throttled_frame_reports_unloads_when_load_aborts() {
    let renderer = Arc::new(RecordingRenderer::default());
    let streamer = Arc::new(ChunkStreamer::new(
        throttled(0.5).validate().unwrap(),
        Arc::clone(&renderer),
    ));
    let observer = Arc::new(ObserverCell::at(WorldPosition::default()));
    let mut scheduler = FrameScheduler::new(Arc::clone(&streamer), Arc::clone(&observer));

    assert_eq!(scheduler.frame(FRAME).unwrap().loaded.len(), 9);
    assert!(scheduler.frame(Duration::from_millis(250)).unwrap().is_quiet());

    observer.set(WorldPosition::on_ground(45.0, 0.0));
    renderer.set_unavailable(true);
    let report = scheduler.frame(Duration::from_millis(250)).unwrap();
    assert_eq!(report.unloaded.len(), 3);
    assert!(report.loaded.is_empty());
    assert_eq!(
        report.aborted,
        Some(StreamError::MissingCollaborator(Collaborator::Renderer))
    );
    assert_eq!(streamer.resident_coords(), renderer.live_coords());
    assert_eq!(streamer.stats().resident, 6);
}

/// Test: Synchronous frames and missing observers.
#[test]
fn test_synchronous_frames() {
    let streamer = Arc::new(ChunkStreamer::new(
        throttled(0.0).validate().unwrap(),
        RecordingRenderer::default(),
    ));
    let observer = Arc::new(ObserverCell::new());
    let mut scheduler = FrameScheduler::new(Arc::clone(&streamer), Arc::clone(&observer));

    assert_eq!(
        scheduler.frame(FRAME).unwrap_err(),
        StreamError::MissingCollaborator(Collaborator::Position)
    );

    observer.set(WorldPosition::on_ground(25.0, 0.0));
    let report = scheduler.frame(FRAME).unwrap();
    assert_eq!(report.observer, ChunkCoord::new(1, 0));
    assert_eq!(streamer.resident_coords(), square(ChunkCoord::new(1, 0), 1));
}

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    done()
}

/// Test: The background thread loads, follows the observer, and stops.
#[test]
fn test_background_loader_follows_observer() {
    let renderer = Arc::new(RecordingRenderer::default());
    let streamer = Arc::new(ChunkStreamer::new(
        throttled(0.0).validate().unwrap(),
        Arc::clone(&renderer),
    ));
    let observer = Arc::new(ObserverCell::at(WorldPosition::default()));

    let loader = BackgroundLoader::spawn(
        Arc::clone(&streamer),
        Arc::clone(&observer),
        Duration::from_millis(10),
    )
    .unwrap();
    assert!(loader.is_running());

    let first = loader.wait_report(Duration::from_secs(5)).unwrap().unwrap();
    assert_eq!(first.loaded.len(), 9);

    let mut frames = FrameScheduler::with_mode(
        Arc::clone(&streamer),
        Arc::clone(&observer),
        TickMode::BackgroundLoads,
    );
    observer.set(WorldPosition::on_ground(45.0, 0.0));
    let target = square(ChunkCoord::new(2, 0), 1);
    assert!(wait_until(Duration::from_secs(5), || {
        target.iter().all(|c| streamer.is_resident(*c))
    }));

    let report = frames.frame(FRAME).unwrap();
    assert!(report.loaded.is_empty());
    assert_eq!(report.unloaded.len(), 3);
    assert!(!streamer.is_resident(ChunkCoord::new(-1, 0)));

    loader.stop();
    assert_eq!(streamer.stats().resident, 12);
    assert_eq!(renderer.live_count(), 12);

    drop(frames);
    drop(streamer);
    assert_eq!(renderer.live_count(), 0);
}

/// Test: A missing observer is reported over the failure channel.
#[test]
fn test_background_loader_reports_missing_position() {
    let streamer = Arc::new(ChunkStreamer::new(
        throttled(0.0).validate().unwrap(),
        RecordingRenderer::default(),
    ));
    let loader = BackgroundLoader::spawn(
        Arc::clone(&streamer),
        ObserverCell::new(),
        Duration::from_millis(10),
    )
    .unwrap();

    let first = loader.wait_report(Duration::from_secs(5)).unwrap();
    assert_eq!(
        first.unwrap_err(),
        StreamError::MissingCollaborator(Collaborator::Position)
    );
    assert!(wait_until(Duration::from_secs(5), || {
        !loader.failures().is_empty()
    }));
    assert_eq!(streamer.stats().resident, 0);
    drop(loader);
}

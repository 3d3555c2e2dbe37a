//! Playlist integrity tests
//!
//! Cursor adjustment on removal, loop wrap-around, and session retirement
//! when the playing entry disappears, driven through real (temporary) P3
//! files and stub codec/sink adapters.

use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use p3kit::audio::output::AudioSink;
use p3kit::codec::AudioCodec;
use p3kit::container::FrameWriter;
use p3kit::error::Result;
use p3kit::events::{PlayerEvent, SessionOutcome};
use p3kit::playback::{
    CodecFactory, EngineConfig, PlaybackEngine, PlaybackState, Playlist, SinkFactory,
};

struct InstantCodec;

impl AudioCodec for InstantCodec {
    fn encode(&mut self, pcm: &[i16]) -> Result<Vec<u8>> {
        Ok(pcm.iter().flat_map(|s| s.to_le_bytes()).collect())
    }

    fn decode(&mut self, _payload: &[u8]) -> Result<Vec<i16>> {
        Ok(vec![1i16; 960])
    }
}

struct NullSink;

impl AudioSink for NullSink {
    fn write(&mut self, _pcm: &[i16]) -> Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

fn stub_engine() -> (Arc<PlaybackEngine>, Receiver<PlayerEvent>) {
    let codec_factory: CodecFactory = Arc::new(|| Ok(Box::new(InstantCodec) as Box<dyn AudioCodec>));
    let sink_factory: SinkFactory = Arc::new(|| Ok(Box::new(NullSink) as Box<dyn AudioSink>));

    let engine = Arc::new(PlaybackEngine::with_adapters(
        EngineConfig::default(),
        codec_factory,
        sink_factory,
    ));
    let (tx, rx) = channel();
    engine.set_event_sender(tx);
    (engine, rx)
}

/// Write a P3 file of `frames` frames into `dir`.
fn write_p3(dir: &tempfile::TempDir, name: &str, frames: usize) -> PathBuf {
    let path = dir.path().join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = FrameWriter::new(file);
    for _ in 0..frames {
        writer.write_audio(&[0u8; 16]).unwrap();
    }
    writer.finish().unwrap();
    path
}

fn wait_finished(rx: &Receiver<PlayerEvent>, timeout: Duration) -> SessionOutcome {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .expect("timed out waiting for TrackFinished");
        match rx.recv_timeout(remaining) {
            Ok(PlayerEvent::TrackFinished { outcome, .. }) => return outcome,
            Ok(_) => continue,
            Err(e) => panic!("event channel closed or timed out: {}", e),
        }
    }
}

#[test]
fn test_removing_entry_before_current_shifts_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _rx) = stub_engine();
    let mut playlist = Playlist::new(Arc::clone(&engine));

    playlist.add(write_p3(&dir, "a.p3", 100));
    playlist.add(write_p3(&dir, "b.p3", 100));
    let c = write_p3(&dir, "c.p3", 100);
    playlist.add(&c);

    playlist.select_and_play(2).unwrap();
    assert_eq!(playlist.current_index(), 2);

    playlist.remove(0).unwrap();

    // Cursor still points at the same logical track, playback undisturbed.
    assert_eq!(playlist.current_index(), 1);
    assert_eq!(playlist.current().unwrap().path, c);
    assert_eq!(engine.state(), PlaybackState::Playing);

    engine.stop();
}

#[test]
fn test_removing_playing_entry_stops_engine() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, rx) = stub_engine();
    let mut playlist = Playlist::new(Arc::clone(&engine));

    playlist.add(write_p3(&dir, "a.p3", 100));
    playlist.add(write_p3(&dir, "b.p3", 100));

    playlist.select_and_play(1).unwrap();
    assert_eq!(engine.state(), PlaybackState::Playing);

    playlist.remove(1).unwrap();

    assert_eq!(engine.state(), PlaybackState::Idle);
    assert_eq!(
        wait_finished(&rx, Duration::from_secs(1)),
        SessionOutcome::Stopped
    );
    assert_eq!(playlist.len(), 1);
}

#[test]
fn test_removing_entry_after_current_leaves_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _rx) = stub_engine();
    let mut playlist = Playlist::new(Arc::clone(&engine));

    let a = write_p3(&dir, "a.p3", 100);
    playlist.add(&a);
    playlist.add(write_p3(&dir, "b.p3", 100));

    playlist.select_and_play(0).unwrap();
    playlist.remove(1).unwrap();

    assert_eq!(playlist.current_index(), 0);
    assert_eq!(playlist.current().unwrap().path, a);
    assert_eq!(engine.state(), PlaybackState::Playing);

    engine.stop();
}

#[test]
fn test_advance_wraps_when_looping() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, rx) = stub_engine();
    let mut playlist = Playlist::new(Arc::clone(&engine));

    playlist.add(write_p3(&dir, "a.p3", 2));
    playlist.add(write_p3(&dir, "b.p3", 2));
    playlist.set_looping(true);

    playlist.select_and_play(1).unwrap();
    assert_eq!(
        wait_finished(&rx, Duration::from_secs(2)),
        SessionOutcome::Exhausted
    );

    // Natural end on the last track wraps back to the first.
    assert!(playlist.advance().unwrap());
    assert_eq!(playlist.current_index(), 0);

    assert_eq!(
        wait_finished(&rx, Duration::from_secs(2)),
        SessionOutcome::Exhausted
    );
    assert!(playlist.advance().unwrap());
    assert_eq!(playlist.current_index(), 1);

    engine.stop();
}

#[test]
fn test_advance_without_loop_stays_idle() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, rx) = stub_engine();
    let mut playlist = Playlist::new(Arc::clone(&engine));

    playlist.add(write_p3(&dir, "a.p3", 2));
    playlist.add(write_p3(&dir, "b.p3", 2));

    playlist.select_and_play(0).unwrap();
    assert_eq!(
        wait_finished(&rx, Duration::from_secs(2)),
        SessionOutcome::Exhausted
    );

    assert!(!playlist.advance().unwrap());
    assert_eq!(engine.state(), PlaybackState::Idle);
    assert_eq!(playlist.current_index(), 0);
}

#[test]
fn test_select_and_play_replaces_active_session() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, rx) = stub_engine();
    let mut playlist = Playlist::new(Arc::clone(&engine));

    playlist.add(write_p3(&dir, "a.p3", 100));
    playlist.add(write_p3(&dir, "b.p3", 2));

    playlist.select_and_play(0).unwrap();
    std::thread::sleep(Duration::from_millis(100));

    playlist.select_and_play(1).unwrap();
    assert_eq!(playlist.current_index(), 1);

    // The long-running first track was retired, the second completes.
    assert_eq!(
        wait_finished(&rx, Duration::from_secs(1)),
        SessionOutcome::Stopped
    );
    assert_eq!(
        wait_finished(&rx, Duration::from_secs(2)),
        SessionOutcome::Exhausted
    );
}

#[test]
fn test_select_out_of_range_fails() {
    let (engine, _rx) = stub_engine();
    let mut playlist = Playlist::new(engine);

    assert!(playlist.select_and_play(0).is_err());
    assert!(playlist.remove(0).is_err());
}

#[test]
fn test_clear_stops_playback_and_resets_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _rx) = stub_engine();
    let mut playlist = Playlist::new(Arc::clone(&engine));

    playlist.add(write_p3(&dir, "a.p3", 100));
    playlist.add(write_p3(&dir, "b.p3", 100));
    playlist.select_and_play(1).unwrap();

    playlist.clear();

    assert!(playlist.is_empty());
    assert_eq!(playlist.current_index(), 0);
    assert_eq!(engine.state(), PlaybackState::Idle);
}

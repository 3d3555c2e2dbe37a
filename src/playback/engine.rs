//! Playback engine
//!
//! Owns at most one live session at a time and exposes the control surface
//! (`play`/`pause`/`resume`/`stop`) to a controller thread. The session slot
//! mutex is the single mutual-exclusion region around session replacement:
//! starting while a session is active signals stop, joins the old run loop,
//! and only then spawns the new one, so two sessions never overlap on the
//! output device.

use crate::audio::output::{AudioSink, CpalSink};
use crate::codec::{AudioCodec, OpusCodec, FRAME_DURATION_MS, SAMPLE_RATE};
use crate::error::{Error, Result};
use crate::events::PlayerEvent;
use crate::playback::session::{self, SessionContext};
use crate::playback::state::{PlaybackState, SessionControl};
use chrono::Utc;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Builds a fresh codec instance for each session.
pub type CodecFactory = Arc<dyn Fn() -> Result<Box<dyn AudioCodec>> + Send + Sync>;

/// Builds a fresh output sink for each session.
///
/// Called on the session thread (cpal streams are not `Send`).
pub type SinkFactory = Arc<dyn Fn() -> Result<Box<dyn AudioSink>> + Send + Sync>;

/// Playback engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// PCM sample rate of the P3 profile.
    pub sample_rate: u32,

    /// Nominal frame duration in milliseconds.
    pub frame_duration_ms: u64,

    /// Trailing silence written at end-of-stream, in milliseconds.
    pub tail_silence_ms: u64,

    /// Output device name (None = system default).
    pub output_device: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            frame_duration_ms: FRAME_DURATION_MS,
            tail_silence_ms: 500,
            output_device: None,
        }
    }
}

/// A spawned session awaiting retirement.
struct ActiveSession {
    id: Uuid,
    control: Arc<SessionControl>,
    handle: JoinHandle<()>,
}

impl ActiveSession {
    /// Signal stop and wait for the run loop to exit.
    ///
    /// The loop observes the flag within one frame period, so this join is
    /// bounded; callers may start a replacement session immediately after.
    fn retire(self) {
        self.control.stop();
        if self.handle.join().is_err() {
            error!("Session {} thread panicked", self.id);
        }
    }

    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// The playback state machine.
///
/// All methods take `&self` and are safe to call from a controller thread
/// while a run loop is active.
pub struct PlaybackEngine {
    config: EngineConfig,
    codec_factory: CodecFactory,
    sink_factory: SinkFactory,
    session: Mutex<Option<ActiveSession>>,
    state: Arc<Mutex<PlaybackState>>,
    events: Mutex<Option<Sender<PlayerEvent>>>,
}

impl PlaybackEngine {
    /// Create an engine with the real Opus codec and cpal output.
    pub fn new(config: EngineConfig) -> Self {
        let codec_factory: CodecFactory = Arc::new(|| {
            Ok(Box::new(OpusCodec::new(None)?) as Box<dyn AudioCodec>)
        });

        let device = config.output_device.clone();
        let sample_rate = config.sample_rate;
        let sink_factory: SinkFactory = Arc::new(move || {
            Ok(Box::new(CpalSink::open(device.as_deref(), sample_rate)?) as Box<dyn AudioSink>)
        });

        Self::with_adapters(config, codec_factory, sink_factory)
    }

    /// Create an engine with caller-supplied codec and sink factories.
    ///
    /// This is the seam used by tests and by embedders with their own audio
    /// boundary.
    pub fn with_adapters(
        config: EngineConfig,
        codec_factory: CodecFactory,
        sink_factory: SinkFactory,
    ) -> Self {
        Self {
            config,
            codec_factory,
            sink_factory,
            session: Mutex::new(None),
            state: Arc::new(Mutex::new(PlaybackState::Idle)),
            events: Mutex::new(None),
        }
    }

    /// Register the channel that receives player events.
    pub fn set_event_sender(&self, sender: Sender<PlayerEvent>) {
        *self.events.lock().unwrap() = Some(sender);
    }

    /// Current engine state.
    pub fn state(&self) -> PlaybackState {
        *self.state.lock().unwrap()
    }

    /// True while a session is Playing or Paused.
    pub fn is_active(&self) -> bool {
        self.state() != PlaybackState::Idle
    }

    /// Start playing a P3 stream, retiring any active session first.
    ///
    /// Returns once the new session has acquired its codec and output sink,
    /// so open failures surface here rather than asynchronously.
    pub fn play(&self, source: Box<dyn Read + Send>, label: String) -> Result<Uuid> {
        let mut slot = self.session.lock().unwrap();

        if let Some(active) = slot.take() {
            info!("Retiring session {} before starting a new one", active.id);
            active.retire();
        }

        let id = Uuid::new_v4();
        let control = Arc::new(SessionControl::new());
        let ctx = SessionContext {
            id,
            label,
            control: Arc::clone(&control),
            state: Arc::clone(&self.state),
            events: self.events.lock().unwrap().clone(),
            frame_duration: Duration::from_millis(self.config.frame_duration_ms),
            tail_silence_samples: (self.config.sample_rate as u64 * self.config.tail_silence_ms
                / 1000) as usize,
        };

        let codec_factory = Arc::clone(&self.codec_factory);
        let sink_factory = Arc::clone(&self.sink_factory);
        let (ready_tx, ready_rx) = channel();

        let handle = std::thread::Builder::new()
            .name(format!("p3-session-{}", id.simple()))
            .spawn(move || session::run(ctx, source, codec_factory, sink_factory, ready_tx))
            .map_err(|e| Error::Playback(format!("Failed to spawn session thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(Error::Playback(
                    "Session thread exited during startup".to_string(),
                ));
            }
        }

        *slot = Some(ActiveSession {
            id,
            control,
            handle,
        });

        Ok(id)
    }

    /// Start playing a P3 file.
    pub fn play_file(&self, path: &Path) -> Result<Uuid> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Source(format!("Failed to open {}: {}", path.display(), e)))?;
        let label = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("<unnamed>")
            .to_string();
        self.play(Box::new(BufReader::new(file)), label)
    }

    /// Pause the active session between frames.
    ///
    /// The decoder and output sink stay open; the run loop idles without
    /// consuming frames. Visible to the loop within one frame period.
    pub fn pause(&self) {
        let slot = self.session.lock().unwrap();
        if let Some(active) = slot.as_ref() {
            let mut state = self.state.lock().unwrap();
            if *state == PlaybackState::Playing {
                active.control.pause();
                *state = PlaybackState::Paused;
                info!("Session {} paused", active.id);
                drop(state);
                self.emit(PlayerEvent::StateChanged {
                    state: PlaybackState::Paused,
                    timestamp: Utc::now(),
                });
            }
        }
    }

    /// Resume a paused session.
    pub fn resume(&self) {
        let slot = self.session.lock().unwrap();
        if let Some(active) = slot.as_ref() {
            let mut state = self.state.lock().unwrap();
            if *state == PlaybackState::Paused {
                active.control.resume();
                *state = PlaybackState::Playing;
                info!("Session {} resumed", active.id);
                drop(state);
                self.emit(PlayerEvent::StateChanged {
                    state: PlaybackState::Playing,
                    timestamp: Utc::now(),
                });
            }
        }
    }

    /// Stop the active session and wait for it to retire.
    ///
    /// Effective even while paused. Returns with the engine `Idle`; a
    /// replacement session may be started immediately.
    pub fn stop(&self) {
        let mut slot = self.session.lock().unwrap();
        if let Some(active) = slot.take() {
            if active.is_finished() {
                // Natural end already retired the session; just reap it.
                let _ = active.handle.join();
            } else {
                info!("Stopping session {}", active.id);
                active.retire();
            }
        }
    }

    fn emit(&self, event: PlayerEvent) {
        if let Some(tx) = &*self.events.lock().unwrap() {
            let _ = tx.send(event);
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        let mut slot = self.session.lock().unwrap();
        if let Some(active) = slot.take() {
            warn!("Engine dropped with live session {}; stopping it", active.id);
            active.retire();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Engine whose factories always fail, for control-surface tests that
    /// never reach a live session.
    fn unopenable_engine() -> PlaybackEngine {
        let codec_factory: CodecFactory =
            Arc::new(|| Err(Error::Codec("no codec available".to_string())));
        let sink_factory: SinkFactory = Arc::new(|| Err(Error::Sink("no device".to_string())));
        PlaybackEngine::with_adapters(EngineConfig::default(), codec_factory, sink_factory)
    }

    #[test]
    fn test_engine_starts_idle() {
        let engine = unopenable_engine();
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(!engine.is_active());
    }

    #[test]
    fn test_play_surfaces_adapter_open_failure() {
        let engine = unopenable_engine();

        let result = engine.play(Box::new(std::io::Cursor::new(Vec::new())), "x".to_string());
        assert!(result.is_err());
        assert_eq!(engine.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_pause_without_session_is_noop() {
        let engine = unopenable_engine();
        engine.pause();
        engine.resume();
        engine.stop();
        assert_eq!(engine.state(), PlaybackState::Idle);
    }
}

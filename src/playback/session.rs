//! Playback session run loop
//!
//! One session owns its source, codec instance, and output sink for its
//! whole lifetime; nothing is shared with the next session. The loop runs on
//! its own thread: gate on pause/stop, pull one frame from the container,
//! decode, write, then sleep away the rest of the frame period so output is
//! paced at real-time rate instead of decode speed.
//!
//! The codec and sink are constructed here, on the session thread (cpal
//! streams must stay on the thread that created them), and the result is
//! reported back over a ready channel so `play()` can surface open failures
//! synchronously.

use crate::audio::output::AudioSink;
use crate::codec::AudioCodec;
use crate::container::FrameReader;
use crate::error::Result;
use crate::events::{PlayerEvent, SessionOutcome};
use crate::playback::engine::{CodecFactory, SinkFactory};
use crate::playback::state::{PlaybackState, SessionControl};
use chrono::Utc;
use std::io::Read;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Everything a run-loop thread needs, handed over at spawn time.
pub(crate) struct SessionContext {
    pub id: Uuid,
    pub label: String,
    pub control: Arc<SessionControl>,
    pub state: Arc<Mutex<PlaybackState>>,
    pub events: Option<Sender<PlayerEvent>>,
    pub frame_duration: Duration,
    pub tail_silence_samples: usize,
}

impl SessionContext {
    fn set_state(&self, state: PlaybackState) {
        *self.state.lock().unwrap() = state;
    }

    fn emit(&self, event: PlayerEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Session thread entry point.
pub(crate) fn run(
    ctx: SessionContext,
    source: Box<dyn Read + Send>,
    codec_factory: CodecFactory,
    sink_factory: SinkFactory,
    ready_tx: Sender<Result<()>>,
) {
    let mut codec = match codec_factory() {
        Ok(codec) => codec,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let mut sink = match sink_factory() {
        Ok(sink) => sink,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    // The caller unblocks once the sink is acquired.
    ctx.set_state(PlaybackState::Playing);
    let _ = ready_tx.send(Ok(()));

    info!("Playing: {} (session {})", ctx.label, ctx.id);
    ctx.emit(PlayerEvent::StateChanged {
        state: PlaybackState::Playing,
        timestamp: Utc::now(),
    });
    ctx.emit(PlayerEvent::TrackStarted {
        session_id: ctx.id,
        label: ctx.label.clone(),
        timestamp: Utc::now(),
    });

    let mut frames = FrameReader::new(source);
    let outcome = run_loop(
        &ctx,
        &mut frames,
        codec.as_mut(),
        sink.as_mut(),
    );

    if outcome == SessionOutcome::Stopped {
        ctx.set_state(PlaybackState::Stopped);
    }

    // Trailing silence after normal exhaustion or stop, so the device does
    // not clip at end-of-stream. Skipped when the sink itself failed.
    if !matches!(outcome, SessionOutcome::Failed(_)) {
        let silence = vec![0i16; ctx.tail_silence_samples];
        if let Err(e) = sink.write(&silence).and_then(|_| sink.flush()) {
            warn!("Failed to drain trailing silence: {}", e);
        }
    }

    drop(sink);
    drop(codec);

    ctx.set_state(PlaybackState::Idle);
    info!(
        "Session {} finished: {:?} ({})",
        ctx.id, outcome, ctx.label
    );
    ctx.emit(PlayerEvent::StateChanged {
        state: PlaybackState::Idle,
        timestamp: Utc::now(),
    });
    ctx.emit(PlayerEvent::TrackFinished {
        session_id: ctx.id,
        label: ctx.label.clone(),
        outcome,
        timestamp: Utc::now(),
    });
}

/// Frame loop: returns how the session ended.
fn run_loop(
    ctx: &SessionContext,
    frames: &mut FrameReader<Box<dyn Read + Send>>,
    codec: &mut dyn AudioCodec,
    sink: &mut dyn AudioSink,
) -> SessionOutcome {
    loop {
        // Checks stop at the top of every iteration and idles here while
        // paused (condvar wait, woken by resume or stop).
        if ctx.control.wait_while_paused() {
            debug!("Session {} stop requested", ctx.id);
            return SessionOutcome::Stopped;
        }

        let started = Instant::now();

        let frame = match frames.next() {
            None => return SessionOutcome::Exhausted,
            Some(Err(e)) => {
                // Unreadable frame mid-stream ends the session as if the
                // stream were exhausted; the playlist moves on.
                warn!("Session {}: unreadable frame: {}", ctx.id, e);
                return SessionOutcome::Exhausted;
            }
            Some(Ok(frame)) => frame,
        };

        let pcm = match codec.decode(&frame.payload) {
            Ok(pcm) => pcm,
            Err(e) => {
                warn!("Session {}: frame decode failed: {}", ctx.id, e);
                return SessionOutcome::Exhausted;
            }
        };

        if let Err(e) = sink.write(&pcm) {
            return SessionOutcome::Failed(e.to_string());
        }

        // Pace to real time: sleep the remainder of the frame period,
        // never a negative amount.
        let elapsed = started.elapsed();
        if elapsed < ctx.frame_duration {
            std::thread::sleep(ctx.frame_duration - elapsed);
        }
    }
}

//! Event types for the playback engine
//!
//! Sessions report lifecycle transitions to the embedder over a registered
//! `std::sync::mpsc` sender; a playlist controller advances tracks by
//! reacting to `TrackFinished`.

use crate::playback::PlaybackState;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// How a playback session reached its terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The stream ran out of frames (or hit a corrupt frame, which ends the
    /// session the same way).
    Exhausted,

    /// The session was stopped by the controller.
    Stopped,

    /// The output sink failed; the reason is carried for reporting.
    Failed(String),
}

/// Playback engine events.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// Engine state transition (Playing, Paused, ...).
    StateChanged {
        state: PlaybackState,
        timestamp: DateTime<Utc>,
    },

    /// A session began producing audio.
    TrackStarted {
        session_id: Uuid,
        label: String,
        timestamp: DateTime<Utc>,
    },

    /// A session reached its terminal state and was retired.
    TrackFinished {
        session_id: Uuid,
        label: String,
        outcome: SessionOutcome,
        timestamp: DateTime<Utc>,
    },
}

//! Playback: state machine, run loop, engine, and playlist sequencing.

pub mod engine;
pub mod playlist;
mod session;
pub mod state;

pub use engine::{CodecFactory, EngineConfig, PlaybackEngine, SinkFactory};
pub use playlist::{Playlist, TrackEntry};
pub use state::{PlaybackState, SessionControl};

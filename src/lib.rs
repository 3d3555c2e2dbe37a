//! # p3kit
//!
//! Toolkit and real-time player for the P3 streaming audio container: a
//! flat sequence of `[type][reserved][len:u16 BE][payload]` frames carrying
//! Opus-compressed mono 16 kHz audio in 60 ms slices.
//!
//! **Purpose:** encode arbitrary audio into P3 streams, extract them back to
//! WAV, and play them in real time with cooperative pause/resume/stop/loop
//! control from a concurrent caller.
//!
//! **Architecture:** pure container codec + trait-seamed codec adapter
//! (libopus) + thread-per-session playback engine paced at frame rate,
//! with cpal output behind a lock-free ring buffer.

pub mod audio;
pub mod codec;
pub mod config;
pub mod container;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod playback;

pub use error::{Error, Result};
pub use playback::{EngineConfig, PlaybackEngine, PlaybackState, Playlist};

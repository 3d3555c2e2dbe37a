//! Error types for p3kit
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for p3kit
#[derive(Error, Debug)]
pub enum Error {
    /// Frame payload exceeds the 16-bit length field
    #[error("Frame payload too large: {0} bytes (max 65535)")]
    PayloadTooLarge(usize),

    /// Malformed frame header or length
    #[error("Container format error: {0}")]
    Format(String),

    /// Encoder/decoder rejected a payload or chunk
    #[error("Codec error: {0}")]
    Codec(String),

    /// Input-side failures (file decode, resample, loudness measurement)
    #[error("Audio source error: {0}")]
    Source(String),

    /// Output-side failures (device, container write, WAV write)
    #[error("Audio sink error: {0}")]
    Sink(String),

    /// Playback engine errors
    #[error("Playback error: {0}")]
    Playback(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using p3kit Error
pub type Result<T> = std::result::Result<T, Error>;

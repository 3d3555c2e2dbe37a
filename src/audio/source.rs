//! Input audio decoding using symphonia
//!
//! Decodes arbitrary-format source files (MP3, FLAC, AAC, Vorbis, WAV, ...)
//! to mono f32 PCM for the encoding pipeline. Multi-channel sources are
//! downmixed by averaging; the native sample rate is reported so the caller
//! can resample to the container's fixed rate.

use crate::error::{Error, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decoded source audio, downmixed to mono at its native rate.
#[derive(Debug)]
pub struct DecodedAudio {
    /// Mono f32 samples in [-1.0, 1.0].
    pub samples: Vec<f32>,

    /// Native sample rate of the source file.
    pub sample_rate: u32,

    /// Channel count of the source before downmix.
    pub source_channels: u16,
}

/// Decode an entire audio file to mono f32 samples.
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    debug!("Decoding source file: {}", path.display());

    let file = std::fs::File::open(path)
        .map_err(|e| Error::Source(format!("Failed to open {}: {}", path.display(), e)))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Hint the probe with the file extension.
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Source(format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Source("No audio track found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| Error::Source("Sample rate not found".to_string()))?;

    let source_channels = codec_params
        .channels
        .map(|c| c.count() as u16)
        .ok_or_else(|| Error::Source("Channel count not found".to_string()))?;

    debug!(
        "Source format: sample_rate={}, channels={}",
        sample_rate, source_channels
    );

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Source(format!("Failed to create decoder: {}", e)))?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                warn!("Error reading packet from {}: {}", path.display(), e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);

                // Average channels into mono.
                let channels = spec.channels.count();
                for frame in buf.samples().chunks_exact(channels) {
                    samples.push(frame.iter().sum::<f32>() / channels as f32);
                }
            }
            Err(symphonia::core::errors::Error::DecodeError(e)) => {
                // Recoverable per-packet corruption: skip and keep going.
                warn!("Decode error in {}: {}", path.display(), e);
            }
            Err(e) => {
                return Err(Error::Source(format!(
                    "Failed to decode {}: {}",
                    path.display(),
                    e
                )));
            }
        }
    }

    if samples.is_empty() {
        return Err(Error::Source(format!(
            "No audio decoded from {}",
            path.display()
        )));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        source_channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_nonexistent_file() {
        let result = decode_file(Path::new("/nonexistent/file.mp3"));
        assert!(matches!(result, Err(Error::Source(_))));
    }
}

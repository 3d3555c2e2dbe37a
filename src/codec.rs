//! Codec adapter boundary
//!
//! P3 payloads are bare Opus packets at a fixed profile: 16 kHz, mono,
//! 16-bit PCM, nominal 60 ms frames. The [`AudioCodec`] trait is the seam
//! between the container/playback layers and the codec library, so the
//! playback engine can be exercised against a stub codec in tests.
//!
//! Codec-specific framing internals live here: libopus only accepts exact
//! frame sizes, so a short final chunk is zero-padded before encoding.

use crate::error::{Error, Result};
use opus::{Application, Bitrate, Channels};

/// Fixed sample rate of the P3 audio profile.
pub const SAMPLE_RATE: u32 = 16_000;

/// Fixed channel count of the P3 audio profile.
pub const CHANNELS: u16 = 1;

/// Nominal duration of one frame in milliseconds.
pub const FRAME_DURATION_MS: u64 = 60;

/// Samples per channel in one nominal frame.
pub const FRAME_SAMPLES: usize = (SAMPLE_RATE as usize * FRAME_DURATION_MS as usize) / 1000;

/// Conversion between PCM chunks and compressed frame payloads.
///
/// One `encode` call consumes at most one frame's worth of samples; one
/// `decode` call produces at most one frame's worth. Both are bounded work
/// (tens of milliseconds of audio) and are never interrupted mid-call.
pub trait AudioCodec {
    /// Compress one PCM chunk (≤ one frame of samples) into a payload.
    ///
    /// Chunks shorter than a full frame are accepted; how they are brought
    /// up to a codec-legal size is the adapter's business.
    fn encode(&mut self, pcm: &[i16]) -> Result<Vec<u8>>;

    /// Decompress one payload into PCM samples.
    fn decode(&mut self, payload: &[u8]) -> Result<Vec<i16>>;
}

/// Opus implementation of the P3 codec profile.
pub struct OpusCodec {
    encoder: opus::Encoder,
    decoder: opus::Decoder,
    frame_samples: usize,
}

impl OpusCodec {
    /// Create an Opus encoder/decoder pair at the fixed P3 profile.
    ///
    /// `bitrate` of `None` leaves the libopus default in place.
    pub fn new(bitrate: Option<i32>) -> Result<Self> {
        let mut encoder = opus::Encoder::new(SAMPLE_RATE, Channels::Mono, Application::Audio)
            .map_err(|e| Error::Codec(format!("Failed to create Opus encoder: {}", e)))?;

        if let Some(bits) = bitrate {
            encoder
                .set_bitrate(Bitrate::Bits(bits))
                .map_err(|e| Error::Codec(format!("Failed to set Opus bitrate: {}", e)))?;
        }

        let decoder = opus::Decoder::new(SAMPLE_RATE, Channels::Mono)
            .map_err(|e| Error::Codec(format!("Failed to create Opus decoder: {}", e)))?;

        Ok(Self {
            encoder,
            decoder,
            frame_samples: FRAME_SAMPLES,
        })
    }
}

impl AudioCodec for OpusCodec {
    fn encode(&mut self, pcm: &[i16]) -> Result<Vec<u8>> {
        if pcm.len() > self.frame_samples {
            return Err(Error::Codec(format!(
                "Chunk of {} samples exceeds the {}-sample frame",
                pcm.len(),
                self.frame_samples
            )));
        }

        // libopus rejects partial frames; pad the tail chunk with silence.
        let padded;
        let input = if pcm.len() < self.frame_samples {
            padded = {
                let mut buf = vec![0i16; self.frame_samples];
                buf[..pcm.len()].copy_from_slice(pcm);
                buf
            };
            &padded[..]
        } else {
            pcm
        };

        // Worst-case packet size; well under the container's 65535 limit.
        let mut output = vec![0u8; 4000];
        let written = self
            .encoder
            .encode(input, &mut output)
            .map_err(|e| Error::Codec(format!("Opus encoding failed: {}", e)))?;
        output.truncate(written);
        Ok(output)
    }

    fn decode(&mut self, payload: &[u8]) -> Result<Vec<i16>> {
        let mut output = vec![0i16; self.frame_samples];
        let decoded = self
            .decoder
            .decode(payload, &mut output, false)
            .map_err(|e| Error::Codec(format!("Opus decoding failed: {}", e)))?;
        output.truncate(decoded);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_frame_round_trip() {
        let mut codec = OpusCodec::new(None).unwrap();

        let pcm = vec![0i16; FRAME_SAMPLES];
        let payload = codec.encode(&pcm).unwrap();
        assert!(!payload.is_empty());
        assert!(payload.len() <= crate::container::MAX_PAYLOAD_LEN);

        let decoded = codec.decode(&payload).unwrap();
        assert_eq!(decoded.len(), FRAME_SAMPLES);
    }

    #[test]
    fn test_short_tail_chunk_is_padded() {
        let mut codec = OpusCodec::new(None).unwrap();

        let payload = codec.encode(&[0i16; 100]).unwrap();
        // The padded frame decodes to a full frame of samples.
        let decoded = codec.decode(&payload).unwrap();
        assert_eq!(decoded.len(), FRAME_SAMPLES);
    }

    #[test]
    fn test_oversized_chunk_rejected() {
        let mut codec = OpusCodec::new(None).unwrap();
        let result = codec.encode(&vec![0i16; FRAME_SAMPLES + 1]);
        assert!(matches!(result, Err(Error::Codec(_))));
    }

    #[test]
    fn test_bitrate_applied() {
        assert!(OpusCodec::new(Some(24_000)).is_ok());
    }
}

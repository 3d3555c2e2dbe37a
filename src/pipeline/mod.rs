//! Conversion pipelines
//!
//! `encode_file` turns an arbitrary-format audio file into a P3 stream:
//! decode, downmix, resample to 16 kHz, optionally normalize loudness, then
//! chunk into 60 ms frames and compress each through the codec adapter.
//! `extract_file` is the inverse, producing a 16-bit mono WAV.
//!
//! A failure in any stage aborts the whole conversion; whatever was flushed
//! before the error stays on disk. Batch callers skip the failed file and
//! continue with the rest.

use crate::audio::{loudness, resampler, source};
use crate::codec::{AudioCodec, OpusCodec, FRAME_DURATION_MS, FRAME_SAMPLES, SAMPLE_RATE};
use crate::container::{FrameReader, FrameWriter};
use crate::error::{Error, Result};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Encoding pipeline options.
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Normalize to this integrated loudness before chunking; `None` skips
    /// normalization entirely.
    pub target_lufs: Option<f64>,

    /// Opus bitrate in bits/s (`None` = codec default).
    pub bitrate: Option<i32>,
}

/// What an encode run produced.
#[derive(Debug, Clone)]
pub struct EncodeReport {
    pub frames: u64,
    pub bytes: u64,
    pub input_samples: usize,
}

impl EncodeReport {
    /// Nominal stream duration implied by the frame count.
    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 * FRAME_DURATION_MS as f64 / 1000.0
    }
}

/// What an extraction run produced.
#[derive(Debug, Clone)]
pub struct ExtractReport {
    pub frames: u64,
    pub samples: u64,
}

/// Convert one audio file to a P3 file.
pub fn encode_file(input: &Path, output: &Path, opts: &EncodeOptions) -> Result<EncodeReport> {
    info!("Encoding {} -> {}", input.display(), output.display());

    let decoded = source::decode_file(input)?;
    debug!(
        "Decoded {} samples at {} Hz ({} channel(s))",
        decoded.samples.len(),
        decoded.sample_rate,
        decoded.source_channels
    );

    let mut samples = resampler::resample_to_target(decoded.samples, decoded.sample_rate)?;

    if let Some(target) = opts.target_lufs {
        loudness::normalize_to_lufs(&mut samples, SAMPLE_RATE, target)?;
    }

    let pcm: Vec<i16> = samples
        .iter()
        .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect();

    let mut codec = OpusCodec::new(opts.bitrate)?;

    let file = std::fs::File::create(output)
        .map_err(|e| Error::Sink(format!("Failed to create {}: {}", output.display(), e)))?;
    let mut writer = FrameWriter::new(BufWriter::new(file));

    let report = encode_pcm(&pcm, &mut codec, &mut writer)?;
    writer.finish()?;

    info!(
        "Encoded {}: {} frames, {:.1}s",
        output.display(),
        report.frames,
        report.duration_secs()
    );
    Ok(report)
}

/// Chunk conditioned mono-16k PCM into frames and write them.
///
/// The final chunk may be shorter than a frame; it is still encoded and
/// emitted (the codec adapter handles the padding).
pub fn encode_pcm<W: Write>(
    pcm: &[i16],
    codec: &mut dyn AudioCodec,
    writer: &mut FrameWriter<W>,
) -> Result<EncodeReport> {
    for chunk in pcm.chunks(FRAME_SAMPLES) {
        let payload = codec.encode(chunk)?;
        writer.write_audio(&payload)?;
    }

    Ok(EncodeReport {
        frames: writer.frames_written(),
        bytes: writer.bytes_written(),
        input_samples: pcm.len(),
    })
}

/// Convert one P3 file back to a 16-bit mono WAV.
pub fn extract_file(input: &Path, output: &Path) -> Result<ExtractReport> {
    info!("Extracting {} -> {}", input.display(), output.display());

    let file = std::fs::File::open(input)
        .map_err(|e| Error::Source(format!("Failed to open {}: {}", input.display(), e)))?;

    let mut codec = OpusCodec::new(None)?;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(output, spec)
        .map_err(|e| Error::Sink(format!("Failed to create {}: {}", output.display(), e)))?;

    let mut frames = 0u64;
    let mut samples = 0u64;

    // Frames are decoded regardless of packet_type; the container layer
    // never filters, matching existing players.
    for frame in FrameReader::new(BufReader::new(file)) {
        let frame = frame?;
        let pcm = codec.decode(&frame.payload)?;
        for sample in &pcm {
            writer
                .write_sample(*sample)
                .map_err(|e| Error::Sink(format!("Failed to write WAV sample: {}", e)))?;
        }
        frames += 1;
        samples += pcm.len() as u64;
    }

    writer
        .finalize()
        .map_err(|e| Error::Sink(format!("Failed to finalize WAV: {}", e)))?;

    info!("Extracted {} frames ({} samples)", frames, samples);
    Ok(ExtractReport { frames, samples })
}

/// Stream statistics from one container pass (no decoding).
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub frames: u64,
    pub payload_bytes: u64,
    pub duration_secs: f64,
}

/// Inspect a P3 file without decoding its payloads.
pub fn inspect_file(input: &Path) -> Result<StreamInfo> {
    let file = std::fs::File::open(input)
        .map_err(|e| Error::Source(format!("Failed to open {}: {}", input.display(), e)))?;

    let mut frames = 0u64;
    let mut payload_bytes = 0u64;

    for frame in FrameReader::new(BufReader::new(file)) {
        let frame = frame?;
        frames += 1;
        payload_bytes += frame.payload.len() as u64;
    }

    Ok(StreamInfo {
        frames,
        payload_bytes,
        duration_secs: frames as f64 * FRAME_DURATION_MS as f64 / 1000.0,
    })
}

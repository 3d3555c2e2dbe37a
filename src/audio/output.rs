//! Audio output using cpal
//!
//! The playback session talks to an [`AudioSink`]: a blocking-write PCM
//! boundary at the container's fixed 16 kHz mono profile. [`CpalSink`] is the
//! real implementation; tests substitute their own sink through the engine's
//! sink factory.
//!
//! The session thread and the device callback communicate only through a
//! lock-free SPSC ring buffer. The callback duplicates mono across the
//! device's channels, linearly interpolates when the device cannot open at
//! 16 kHz, and fills underruns with silence.

use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Blocking PCM output boundary.
///
/// `write` accepts 16-bit mono samples at the fixed container rate and may
/// block until the sink has room; `flush` blocks until buffered audio has
/// drained (bounded by an internal deadline).
pub trait AudioSink {
    fn write(&mut self, pcm: &[i16]) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// Ring buffer capacity in source samples (one second of audio).
fn ring_capacity(sample_rate: u32) -> usize {
    sample_rate as usize
}

/// cpal-backed audio sink.
pub struct CpalSink {
    // Held for its lifetime; dropping the stream stops the device.
    _stream: Stream,
    producer: HeapProd<i16>,
    error_flag: Arc<AtomicBool>,
    underruns: Arc<AtomicU64>,
    sample_rate: u32,
}

impl CpalSink {
    /// List available output device names.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::Sink(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open an output device for 16-bit mono PCM at `sample_rate`.
    ///
    /// A named device that cannot be found falls back to the default device.
    pub fn open(device_name: Option<&str>, sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();

        let device = if let Some(name) = device_name {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::Sink(format!("Failed to enumerate devices: {}", e)))?;

            match devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                Some(dev) => {
                    info!("Found requested audio device: {}", name);
                    dev
                }
                None => {
                    warn!(
                        "Requested device '{}' not found, falling back to default device",
                        name
                    );
                    host.default_output_device().ok_or_else(|| {
                        Error::Sink(format!(
                            "Device '{}' not found and no default device available",
                            name
                        ))
                    })?
                }
            }
        } else {
            host.default_output_device()
                .ok_or_else(|| Error::Sink("No default output device found".to_string()))?
        };

        let (config, sample_format) = Self::pick_config(&device, sample_rate)?;

        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        let rb = HeapRb::<i16>::new(ring_capacity(sample_rate));
        let (producer, consumer) = rb.split();

        let error_flag = Arc::new(AtomicBool::new(false));
        let underruns = Arc::new(AtomicU64::new(0));
        let converter = RateConverter::new(sample_rate, config.sample_rate.0);

        let stream = match sample_format {
            SampleFormat::I16 => Self::build_stream_i16(
                &device,
                &config,
                consumer,
                converter,
                Arc::clone(&error_flag),
                Arc::clone(&underruns),
            )?,
            SampleFormat::F32 => Self::build_stream_f32(
                &device,
                &config,
                consumer,
                converter,
                Arc::clone(&error_flag),
                Arc::clone(&underruns),
            )?,
            other => {
                return Err(Error::Sink(format!(
                    "Unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::Sink(format!("Failed to start stream: {}", e)))?;

        info!("Audio stream started on '{}'", device.name().unwrap_or_else(|_| "Unknown".to_string()));

        Ok(Self {
            _stream: stream,
            producer,
            error_flag,
            underruns,
            sample_rate,
        })
    }

    /// Pick an output configuration.
    ///
    /// Prefers a config that opens directly at the requested rate (i16 first,
    /// then f32). Otherwise the device default is used and the callback
    /// rate-converts.
    fn pick_config(device: &Device, sample_rate: u32) -> Result<(StreamConfig, SampleFormat)> {
        let ranges: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| Error::Sink(format!("Failed to get device configs: {}", e)))?
            .collect();

        for format in [SampleFormat::I16, SampleFormat::F32] {
            if let Some(range) = ranges.iter().find(|r| {
                r.sample_format() == format
                    && r.min_sample_rate().0 <= sample_rate
                    && r.max_sample_rate().0 >= sample_rate
            }) {
                let config = range
                    .clone()
                    .with_sample_rate(cpal::SampleRate(sample_rate))
                    .config();
                return Ok((config, format));
            }
        }

        let default = device
            .default_output_config()
            .map_err(|e| Error::Sink(format!("Failed to get default config: {}", e)))?;
        let format = default.sample_format();
        if !matches!(format, SampleFormat::I16 | SampleFormat::F32) {
            return Err(Error::Sink(format!(
                "Unsupported sample format: {:?}",
                format
            )));
        }
        Ok((default.config(), format))
    }

    fn build_stream_i16(
        device: &Device,
        config: &StreamConfig,
        mut consumer: HeapCons<i16>,
        mut converter: RateConverter,
        error_flag: Arc<AtomicBool>,
        underruns: Arc<AtomicU64>,
    ) -> Result<Stream> {
        let channels = config.channels as usize;

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let sample = converter.next_output(&mut consumer, &underruns);
                        let value = (sample.clamp(-32768.0, 32767.0)) as i16;
                        for slot in frame.iter_mut() {
                            *slot = value;
                        }
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::Sink(format!("Failed to build stream: {}", e)))?;

        Ok(stream)
    }

    fn build_stream_f32(
        device: &Device,
        config: &StreamConfig,
        mut consumer: HeapCons<i16>,
        mut converter: RateConverter,
        error_flag: Arc<AtomicBool>,
        underruns: Arc<AtomicU64>,
    ) -> Result<Stream> {
        let channels = config.channels as usize;

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let sample = converter.next_output(&mut consumer, &underruns);
                        let value = (sample / 32768.0).clamp(-1.0, 1.0);
                        for slot in frame.iter_mut() {
                            *slot = value;
                        }
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::Sink(format!("Failed to build stream: {}", e)))?;

        Ok(stream)
    }

    /// Underruns observed by the device callback so far.
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }
}

impl AudioSink for CpalSink {
    fn write(&mut self, pcm: &[i16]) -> Result<()> {
        let mut written = 0;
        while written < pcm.len() {
            if self.error_flag.load(Ordering::SeqCst) {
                return Err(Error::Sink("Output stream failed".to_string()));
            }
            let pushed = self.producer.push_slice(&pcm[written..]);
            written += pushed;
            if pushed == 0 {
                std::thread::sleep(Duration::from_millis(5));
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        // Bounded drain: buffered duration plus slack for the device's own
        // internal buffer.
        let buffered = self.producer.occupied_len();
        let deadline = Instant::now()
            + Duration::from_millis((buffered as u64 * 1000) / self.sample_rate as u64)
            + Duration::from_millis(200);

        while self.producer.occupied_len() > 0 {
            if self.error_flag.load(Ordering::SeqCst) {
                return Err(Error::Sink("Output stream failed".to_string()));
            }
            if Instant::now() >= deadline {
                warn!(
                    "Flush deadline reached with {} samples still buffered",
                    self.producer.occupied_len()
                );
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }
}

/// Linear-interpolation rate converter between the fixed source rate and the
/// device rate, fed one output sample at a time from the ring buffer.
///
/// At equal rates this degenerates to pass-through (one sample of latency).
/// Underruns produce silence and are counted, not logged, on the callback
/// thread.
struct RateConverter {
    /// Source samples consumed per device frame.
    step: f64,
    frac: f64,
    prev: f32,
    next: f32,
    primed: bool,
}

impl RateConverter {
    fn new(source_rate: u32, device_rate: u32) -> Self {
        Self {
            step: source_rate as f64 / device_rate as f64,
            frac: 0.0,
            prev: 0.0,
            next: 0.0,
            primed: false,
        }
    }

    fn pop(consumer: &mut HeapCons<i16>, underruns: &AtomicU64) -> f32 {
        match consumer.try_pop() {
            Some(s) => s as f32,
            None => {
                underruns.fetch_add(1, Ordering::Relaxed);
                0.0
            }
        }
    }

    fn next_output(&mut self, consumer: &mut HeapCons<i16>, underruns: &AtomicU64) -> f32 {
        if !self.primed {
            self.prev = Self::pop(consumer, underruns);
            self.next = Self::pop(consumer, underruns);
            self.primed = true;
        }

        let out = self.prev + (self.next - self.prev) * self.frac as f32;

        self.frac += self.step;
        while self.frac >= 1.0 {
            self.frac -= 1.0;
            self.prev = self.next;
            self.next = Self::pop(consumer, underruns);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(samples: &[i16]) -> (HeapProd<i16>, HeapCons<i16>) {
        let rb = HeapRb::<i16>::new(1024);
        let (mut prod, cons) = rb.split();
        prod.push_slice(samples);
        (prod, cons)
    }

    #[test]
    fn test_rate_converter_passthrough_at_equal_rates() {
        let (_prod, mut cons) = feed(&[100, 200, 300, 400]);
        let underruns = AtomicU64::new(0);
        let mut conv = RateConverter::new(16_000, 16_000);

        let out: Vec<f32> = (0..4).map(|_| conv.next_output(&mut cons, &underruns)).collect();
        assert_eq!(out, vec![100.0, 200.0, 300.0, 400.0]);
        assert_eq!(underruns.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_rate_converter_upsamples_2x() {
        let (_prod, mut cons) = feed(&[0, 100, 200, 300]);
        let underruns = AtomicU64::new(0);
        let mut conv = RateConverter::new(16_000, 32_000);

        // Two device frames per source sample, linearly interpolated.
        let out: Vec<f32> = (0..6).map(|_| conv.next_output(&mut cons, &underruns)).collect();
        assert_eq!(out, vec![0.0, 50.0, 100.0, 150.0, 200.0, 250.0]);
    }

    #[test]
    fn test_rate_converter_underrun_yields_silence() {
        let (_prod, mut cons) = feed(&[]);
        let underruns = AtomicU64::new(0);
        let mut conv = RateConverter::new(16_000, 16_000);

        assert_eq!(conv.next_output(&mut cons, &underruns), 0.0);
        assert!(underruns.load(Ordering::Relaxed) > 0);
    }
}

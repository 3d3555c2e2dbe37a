//! Audio resampling using rubato
//!
//! Converts source audio to the container's fixed 16 kHz rate before
//! chunking and encoding.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Fixed target sample rate for all container audio.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Resample mono audio to the target rate.
///
/// Input already at the target rate is returned unchanged.
pub fn resample_to_target(input: Vec<f32>, input_rate: u32) -> Result<Vec<f32>> {
    if input_rate == TARGET_SAMPLE_RATE {
        debug!(
            "Sample rate already at {}Hz, skipping resample",
            TARGET_SAMPLE_RATE
        );
        return Ok(input);
    }

    debug!(
        "Resampling from {}Hz to {}Hz ({} samples)",
        input_rate,
        TARGET_SAMPLE_RATE,
        input.len()
    );

    if input.is_empty() {
        return Ok(input);
    }

    let input_frames = input.len();
    let mut resampler = FastFixedIn::<f32>::new(
        TARGET_SAMPLE_RATE as f64 / input_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        input_frames,
        1,
    )
    .map_err(|e| Error::Source(format!("Failed to create resampler: {}", e)))?;

    let output = resampler
        .process(&[input], None)
        .map_err(|e| Error::Source(format!("Resampling failed: {}", e)))?;

    let resampled = output.into_iter().next().unwrap_or_default();

    debug!(
        "Resampled {} input samples to {} output samples",
        input_frames,
        resampled.len()
    );

    Ok(resampled)
}

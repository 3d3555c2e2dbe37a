//! Loudness normalization orchestration
//!
//! Measures integrated loudness (EBU R128, via the ebur128 crate) over the
//! whole signal once, then applies a single gain toward the target LUFS
//! before chunking. The measurement algorithm itself is external; this
//! module only wires "normalize, then chunk" into the encoding pipeline.

use crate::error::{Error, Result};
use ebur128::{EbuR128, Mode};
use tracing::{debug, info};

/// Signals quieter than this are treated as silence and left untouched.
///
/// -70 LUFS is the EBU R128 absolute gating threshold.
const SILENCE_FLOOR_LUFS: f64 = -70.0;

/// Normalize mono samples in place toward `target_lufs`.
///
/// Returns the gain applied in dB (0.0 when the signal is silence and no
/// gain was applied).
pub fn normalize_to_lufs(samples: &mut [f32], sample_rate: u32, target_lufs: f64) -> Result<f64> {
    let mut meter = EbuR128::new(1, sample_rate, Mode::I)
        .map_err(|e| Error::Source(format!("Failed to create loudness meter: {}", e)))?;

    meter
        .add_frames_f32(samples)
        .map_err(|e| Error::Source(format!("Loudness measurement failed: {}", e)))?;

    let measured = meter
        .loudness_global()
        .map_err(|e| Error::Source(format!("Loudness measurement failed: {}", e)))?;

    if !measured.is_finite() || measured < SILENCE_FLOOR_LUFS {
        debug!(
            "Signal below {} LUFS ({}), skipping normalization",
            SILENCE_FLOOR_LUFS, measured
        );
        return Ok(0.0);
    }

    let gain_db = target_lufs - measured;
    let gain = 10f32.powf(gain_db as f32 / 20.0);

    for sample in samples.iter_mut() {
        *sample = (*sample * gain).clamp(-1.0, 1.0);
    }

    info!(
        "Normalized loudness: {:.1} LUFS -> {:.1} LUFS ({:+.1} dB)",
        measured, target_lufs, gain_db
    );

    Ok(gain_db)
}

//! Audio processing: source decoding, resampling, loudness, device output.

pub mod loudness;
pub mod output;
pub mod resampler;
pub mod source;

pub use output::{AudioSink, CpalSink};
pub use resampler::TARGET_SAMPLE_RATE;
pub use source::DecodedAudio;

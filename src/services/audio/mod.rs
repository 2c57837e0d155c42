pub mod frame_buffer;
pub mod mulaw;
pub mod opus_codec;
pub mod resampler;
pub mod transcode;

/// Sample rate of the carrier media stream (G.711 µ-law).
pub const CARRIER_SAMPLE_RATE: u32 = 8000;
/// Sample rate of the AI leg, re-exported from the Opus wrapper.
pub const AI_SAMPLE_RATE: u32 = opus_codec::SAMPLE_RATE;

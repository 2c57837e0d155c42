use anyhow::{Context, Result};
use opus::{Application, Channels, Decoder, Encoder};

// The AI leg speaks raw Opus packets at 24 kHz mono, 20 ms per packet.
// Encoders and decoders carry inter-frame state, so each call session owns
// its own pair; they are created here and never shared between pumps.

pub const SAMPLE_RATE: u32 = 24000;
pub const FRAME_SAMPLES: usize = 480; // 20 ms at 24 kHz
/// Opus packets never exceed this (RFC 6716 recommended buffer).
pub const MAX_PACKET_BYTES: usize = 4000;
/// Enough room for a 120 ms packet, the longest Opus allows.
const MAX_DECODE_SAMPLES: usize = 2880;

pub struct OpusService;

impl OpusService {
    pub fn new_encoder() -> Result<Encoder> {
        Encoder::new(SAMPLE_RATE, Channels::Mono, Application::Voip)
            .context("Failed to create Opus encoder")
    }

    pub fn new_decoder() -> Result<Decoder> {
        Decoder::new(SAMPLE_RATE, Channels::Mono).context("Failed to create Opus decoder")
    }

    /// Encode exactly one 20 ms frame to an Opus packet.
    pub fn encode_frame(encoder: &mut Encoder, frame: &[f32]) -> Result<Vec<u8>> {
        debug_assert_eq!(frame.len(), FRAME_SAMPLES);
        encoder
            .encode_vec_float(frame, MAX_PACKET_BYTES)
            .context("Opus encoding failed")
    }

    /// Decode one Opus packet to f32 PCM at 24 kHz.
    pub fn decode_packet(decoder: &mut Decoder, packet: &[u8]) -> Result<Vec<f32>> {
        let mut output = vec![0.0f32; MAX_DECODE_SAMPLES];
        let decoded = decoder
            .decode_float(packet, &mut output, false)
            .context("Opus decoding failed")?;
        output.truncate(decoded);
        Ok(output)
    }
}

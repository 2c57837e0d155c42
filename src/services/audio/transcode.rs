//! Per-direction transcoding pipelines for one call.
//!
//! Uplink (carrier -> AI):
//! 1. Decode G.711 µ-law (8 kHz) to f32 PCM
//! 2. Resample 8 kHz -> 24 kHz
//! 3. Accumulate until whole 20 ms frames exist
//! 4. Opus-encode each frame
//!
//! Downlink (AI -> carrier):
//! 1. Opus-decode one packet to f32 PCM (24 kHz)
//! 2. Resample 24 kHz -> 8 kHz
//! 3. Encode to G.711 µ-law
//!
//! A failed encode or decode drops that frame only; the pipelines carry no
//! error state across frames.

use opus::{Decoder, Encoder};
use tracing::warn;

use super::frame_buffer::FrameBuffer;
use super::mulaw::{mulaw_to_pcm, pcm_to_mulaw};
use super::opus_codec::OpusService;
use super::resampler::resample;
use super::{AI_SAMPLE_RATE, CARRIER_SAMPLE_RATE};

pub struct UplinkTranscoder {
    // Created on the first media frame, reused for the rest of the call.
    encoder: Option<Encoder>,
    buffer: FrameBuffer,
}

impl UplinkTranscoder {
    pub fn new() -> Self {
        Self {
            encoder: None,
            buffer: FrameBuffer::new(),
        }
    }

    /// Transcode one carrier media payload into zero or more Opus packets.
    pub fn process(&mut self, mulaw: &[u8]) -> Vec<Vec<u8>> {
        let pcm_8k = mulaw_to_pcm(mulaw);
        let pcm_24k = resample(&pcm_8k, CARRIER_SAMPLE_RATE, AI_SAMPLE_RATE);
        self.buffer.push(&pcm_24k);

        let mut packets = Vec::new();
        for frame in self.buffer.drain() {
            if self.encoder.is_none() {
                match OpusService::new_encoder() {
                    Ok(encoder) => self.encoder = Some(encoder),
                    Err(e) => {
                        warn!("Skipping frame, encoder unavailable: {e:#}");
                        continue;
                    }
                }
            }
            let Some(encoder) = self.encoder.as_mut() else {
                continue;
            };
            match OpusService::encode_frame(encoder, &frame) {
                Ok(packet) => packets.push(packet),
                Err(e) => warn!("Dropping frame, {e:#}"),
            }
        }
        packets
    }

    /// PCM samples waiting for the next whole frame.
    pub fn residual_len(&self) -> usize {
        self.buffer.residual_len()
    }
}

pub struct DownlinkTranscoder {
    decoder: Option<Decoder>,
}

impl DownlinkTranscoder {
    pub fn new() -> Self {
        Self { decoder: None }
    }

    /// Transcode one AI Opus packet into µ-law bytes, or `None` when the
    /// packet does not decode.
    pub fn process(&mut self, packet: &[u8]) -> Option<Vec<u8>> {
        if self.decoder.is_none() {
            match OpusService::new_decoder() {
                Ok(decoder) => self.decoder = Some(decoder),
                Err(e) => {
                    warn!("Dropping frame, decoder unavailable: {e:#}");
                    return None;
                }
            }
        }
        let decoder = self.decoder.as_mut()?;
        let pcm_24k = match OpusService::decode_packet(decoder, packet) {
            Ok(pcm) => pcm,
            Err(e) => {
                warn!("Dropping frame, {e:#}");
                return None;
            }
        };
        let pcm_8k = resample(&pcm_24k, AI_SAMPLE_RATE, CARRIER_SAMPLE_RATE);
        Some(pcm_to_mulaw(&pcm_8k))
    }
}

//! G.711 µ-law codec backed by precomputed lookup tables.
//!
//! Decode goes through a 256-entry table of normalized f32 samples; encode
//! goes through a 65536-entry table indexed by the uint16 reinterpretation of
//! the int16 sample. Both tables are built once and never mutated, so bulk
//! conversion is a plain indexed gather.

use std::sync::OnceLock;

const MULAW_BIAS: i32 = 0x84;
const MULAW_CLIP: i32 = 32635;

fn decode_table() -> &'static [f32; 256] {
    static TABLE: OnceLock<[f32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0.0f32; 256];
        for (byte, slot) in table.iter_mut().enumerate() {
            let inverted = !(byte as u8);
            let sign = inverted & 0x80;
            let exponent = (inverted >> 4) & 0x07;
            let mantissa = (inverted & 0x0F) as i32;
            let mut sample = (((mantissa << 3) + MULAW_BIAS) << exponent) - MULAW_BIAS;
            if sign != 0 {
                sample = -sample;
            }
            *slot = sample as f32 / 32768.0;
        }
        table
    })
}

/// Encode a single signed 16-bit PCM sample to a µ-law byte (ITU-T G.711).
fn encode_sample(pcm: i16) -> u8 {
    let sign: u8 = if pcm < 0 { 0x80 } else { 0x00 };
    let mut sample = (pcm as i32).abs().min(MULAW_CLIP);
    sample += MULAW_BIAS;

    // Exponent is the highest set bit in positions 14..7, or 0 if none.
    let mut exponent = 7u8;
    let mut mask = 0x4000;
    while exponent > 0 && sample & mask == 0 {
        mask >>= 1;
        exponent -= 1;
    }

    let mantissa = ((sample >> (exponent + 3)) & 0x0F) as u8;
    !(sign | (exponent << 4) | mantissa)
}

fn encode_table() -> &'static [u8] {
    static TABLE: OnceLock<Vec<u8>> = OnceLock::new();
    TABLE.get_or_init(|| (0..=u16::MAX).map(|u| encode_sample(u as i16)).collect())
}

/// Decode µ-law bytes to f32 PCM in [-1, 1]. Output length equals input length.
pub fn mulaw_to_pcm(data: &[u8]) -> Vec<f32> {
    let table = decode_table();
    data.iter().map(|&byte| table[byte as usize]).collect()
}

/// Encode f32 PCM in [-1, 1] to µ-law bytes. Out-of-range samples are clipped.
pub fn pcm_to_mulaw(pcm: &[f32]) -> Vec<u8> {
    let table = encode_table();
    pcm.iter()
        .map(|&sample| {
            let int16 = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
            table[int16 as u16 as usize]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_length_and_range() {
        let all_bytes: Vec<u8> = (0..=255).collect();
        let pcm = mulaw_to_pcm(&all_bytes);
        assert_eq!(pcm.len(), 256);
        for sample in pcm {
            assert!((-1.0..=1.0).contains(&sample));
        }
    }

    #[test]
    fn test_decode_silence() {
        // µ-law near-silence is 0xFF
        assert_eq!(mulaw_to_pcm(&[0xFF])[0], 0.0);
    }

    #[test]
    fn test_decode_extremes() {
        // Largest magnitudes of the G.711 table, normalized
        let max = mulaw_to_pcm(&[0x80])[0];
        let min = mulaw_to_pcm(&[0x00])[0];
        assert!((max - 32124.0 / 32768.0).abs() < 1e-6);
        assert!((min + 32124.0 / 32768.0).abs() < 1e-6);
    }

    #[test]
    fn test_encode_silence() {
        assert_eq!(pcm_to_mulaw(&[0.0]), vec![0xFF]);
    }

    #[test]
    fn test_encode_clips_out_of_range() {
        let loud = pcm_to_mulaw(&[2.0, -2.0]);
        let full = pcm_to_mulaw(&[1.0, -1.0]);
        assert_eq!(loud, full);
    }

    #[test]
    fn test_roundtrip_self_consistent() {
        // decode . encode . decode == decode, within mulaw quantization
        let all_bytes: Vec<u8> = (0..=255).collect();
        let pcm = mulaw_to_pcm(&all_bytes);
        let reencoded = pcm_to_mulaw(&pcm);
        let pcm2 = mulaw_to_pcm(&reencoded);
        for (a, b) in pcm.iter().zip(pcm2.iter()) {
            assert!((a - b).abs() < 0.01, "mismatch: {} vs {}", a, b);
        }
    }

    #[test]
    fn test_encode_matches_known_values() {
        // Spot-check against the classic G.711 reference points
        let encoded = pcm_to_mulaw(&[1000.0 / 32768.0]);
        let decoded = mulaw_to_pcm(&encoded)[0] * 32768.0;
        assert!((decoded - 1000.0).abs() < 200.0);

        let encoded = pcm_to_mulaw(&[-1000.0 / 32768.0]);
        let decoded = mulaw_to_pcm(&encoded)[0] * 32768.0;
        assert!((decoded + 1000.0).abs() < 200.0);
    }
}

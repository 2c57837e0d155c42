//! Sample-rate conversion between the 8 kHz carrier leg and the 24 kHz AI leg.
//!
//! The two legs sit at an exact 1:3 ratio, so conversion is a polyphase
//! windowed-sinc FIR specialized to that ratio rather than a general-purpose
//! resampler. Output lengths are exact: upsampling an n-sample signal yields
//! 3n samples, downsampling yields ceil(n/3). The signal is treated as zero
//! outside the given slice, matching the per-frame call pattern of the bridge.

use std::f64::consts::PI;
use std::sync::OnceLock;

const FACTOR: usize = 3;
/// Taps per polyphase branch. The prototype filter is FACTOR times longer.
const PHASE_TAPS: usize = 32;
const PROTO_TAPS: usize = FACTOR * PHASE_TAPS;
const HALF_PHASE: usize = PHASE_TAPS / 2;
const HALF_PROTO: usize = PROTO_TAPS / 2;

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Blackman-windowed sinc prototype, cutoff just below the 4 kHz Nyquist of
/// the narrow leg (telephone audio tops out around 3.4 kHz).
fn prototype_lowpass() -> Vec<f64> {
    let cutoff = 0.9 / (2.0 * FACTOR as f64);
    let center = (PROTO_TAPS - 1) as f64 / 2.0;
    let denom = (PROTO_TAPS - 1) as f64;
    (0..PROTO_TAPS)
        .map(|j| {
            let m = j as f64 - center;
            let ideal = 2.0 * cutoff * sinc(2.0 * cutoff * m);
            let window = 0.42 - 0.5 * (2.0 * PI * j as f64 / denom).cos()
                + 0.08 * (4.0 * PI * j as f64 / denom).cos();
            ideal * window
        })
        .collect()
}

/// Interpolation bank for 1:3 upsampling, one branch per output phase.
/// Each branch is normalized to unit DC gain.
fn upsample_bank() -> &'static [[f32; PHASE_TAPS]; FACTOR] {
    static BANK: OnceLock<[[f32; PHASE_TAPS]; FACTOR]> = OnceLock::new();
    BANK.get_or_init(|| {
        let proto = prototype_lowpass();
        let mut bank = [[0.0f32; PHASE_TAPS]; FACTOR];
        for (phase, branch) in bank.iter_mut().enumerate() {
            let sum: f64 = (0..PHASE_TAPS).map(|k| proto[k * FACTOR + phase]).sum();
            for (k, tap) in branch.iter_mut().enumerate() {
                *tap = (proto[k * FACTOR + phase] / sum) as f32;
            }
        }
        bank
    })
}

/// Anti-alias filter for 3:1 decimation, normalized to unit DC gain.
fn downsample_taps() -> &'static [f32; PROTO_TAPS] {
    static TAPS: OnceLock<[f32; PROTO_TAPS]> = OnceLock::new();
    TAPS.get_or_init(|| {
        let proto = prototype_lowpass();
        let sum: f64 = proto.iter().sum();
        let mut taps = [0.0f32; PROTO_TAPS];
        for (tap, value) in taps.iter_mut().zip(proto.iter()) {
            *tap = (value / sum) as f32;
        }
        taps
    })
}

/// 8 kHz -> 24 kHz. Output length is exactly 3x the input length.
pub fn resample_8k_to_24k(input: &[f32]) -> Vec<f32> {
    let bank = upsample_bank();
    let n = input.len() as isize;
    let mut output = Vec::with_capacity(input.len() * FACTOR);
    for i in 0..n {
        for branch in bank.iter() {
            let mut acc = 0.0f32;
            for (k, tap) in branch.iter().enumerate() {
                let idx = i + HALF_PHASE as isize - k as isize;
                if idx >= 0 && idx < n {
                    acc += tap * input[idx as usize];
                }
            }
            output.push(acc);
        }
    }
    output
}

/// 24 kHz -> 8 kHz. Output length is ceil(n / 3), i.e. exactly n / 3 for
/// whole 24 kHz frames.
pub fn resample_24k_to_8k(input: &[f32]) -> Vec<f32> {
    let taps = downsample_taps();
    let n = input.len() as isize;
    let out_len = input.len().div_ceil(FACTOR);
    let mut output = Vec::with_capacity(out_len);
    for i in 0..out_len as isize {
        let base = i * FACTOR as isize + HALF_PROTO as isize;
        let mut acc = 0.0f32;
        for (j, tap) in taps.iter().enumerate() {
            let idx = base - j as isize;
            if idx >= 0 && idx < n {
                acc += tap * input[idx as usize];
            }
        }
        output.push(acc);
    }
    output
}

/// Convert between the two bridge sample rates. Equal rates pass the signal
/// through untouched.
pub fn resample(input: &[f32], from_hz: u32, to_hz: u32) -> Vec<f32> {
    if from_hz == to_hz {
        return input.to_vec();
    }
    if to_hz == from_hz * 3 {
        return resample_8k_to_24k(input);
    }
    if from_hz == to_hz * 3 {
        return resample_24k_to_8k(input);
    }
    panic!("unsupported resampling pair: {} -> {}", from_hz, to_hz);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_bitwise() {
        let signal: Vec<f32> = (0..480).map(|i| ((i * 7) % 13) as f32 / 13.0 - 0.5).collect();
        let out = resample(&signal, 24000, 24000);
        assert_eq!(signal, out);
    }

    #[test]
    fn test_upsample_length_is_triple() {
        for n in [1, 17, 160, 313] {
            let signal = vec![0.25f32; n];
            assert_eq!(resample(&signal, 8000, 24000).len(), 3 * n);
        }
    }

    #[test]
    fn test_downsample_length_is_third() {
        for n in [3, 480, 960] {
            let signal = vec![0.25f32; n];
            assert_eq!(resample(&signal, 24000, 8000).len(), n / 3);
        }
        // Ragged inputs round up
        assert_eq!(resample(&vec![0.0f32; 481], 24000, 8000).len(), 161);
    }

    #[test]
    fn test_upsample_preserves_dc() {
        let signal = vec![0.5f32; 200];
        let out = resample_8k_to_24k(&signal);
        // Skip the edge taper, check the interior
        for &sample in &out[PROTO_TAPS..out.len() - PROTO_TAPS] {
            assert!((sample - 0.5).abs() < 1e-3, "got {}", sample);
        }
    }

    #[test]
    fn test_downsample_preserves_dc() {
        let signal = vec![0.5f32; 600];
        let out = resample_24k_to_8k(&signal);
        for &sample in &out[PHASE_TAPS..out.len() - PHASE_TAPS] {
            assert!((sample - 0.5).abs() < 1e-3, "got {}", sample);
        }
    }

    #[test]
    fn test_sine_survives_round_trip() {
        // 440 Hz at 8 kHz, well inside the passband
        let n = 800;
        let signal: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 8000.0).sin() * 0.5)
            .collect();
        let up = resample_8k_to_24k(&signal);
        assert_eq!(up.len(), 3 * n);
        let back = resample_24k_to_8k(&up);
        assert_eq!(back.len(), n);
        // Amplitude preserved in the interior
        let interior = &back[100..n - 100];
        let peak = interior.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
        assert!(peak > 0.4 && peak < 0.6, "peak {}", peak);
    }

    #[test]
    fn test_empty_input() {
        assert!(resample(&[], 8000, 24000).is_empty());
        assert!(resample(&[], 24000, 8000).is_empty());
    }
}

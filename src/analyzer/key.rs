//! Chroma-based key estimation: a 12-bin pitch-class histogram correlated
//! against major/minor key profiles, converted to a Camelot key (§4.3, §G).

use crate::camelot::{self, CamelotKey};
use rustfft::num_complex::Complex32;
use rustfft::FftPlanner;

const FFT_SIZE: usize = 4096;
const MIN_FREQ_HZ: f32 = 60.0;
const MAX_FREQ_HZ: f32 = 4000.0;

/// Sha'ath (2011)-style major/minor key profiles, indexed by pitch class
/// (C=0) relative to the tonic.
const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];
const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

pub struct KeyEstimate {
    pub camelot: CamelotKey,
    /// Pearson correlation of the winning (pitch class, mode) profile, 0..1.
    pub confidence: f64,
}

/// Estimate the track's key from mono PCM and convert it to a Camelot key.
/// Returns `None` if the signal carries no usable pitched content (silence,
/// pure noise) — callers treat this the same as any other absent-key case.
pub fn estimate(samples: &[f32], sample_rate: u32) -> Option<KeyEstimate> {
    let chroma = chromagram(samples, sample_rate)?;
    best_correlation(&chroma)
}

fn chromagram(samples: &[f32], sample_rate: u32) -> Option<[f64; 12]> {
    if samples.len() < FFT_SIZE {
        return None;
    }

    let window = hann_window(FFT_SIZE);
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FFT_SIZE);

    let hop = FFT_SIZE / 2;
    let mut chroma = [0.0f64; 12];
    let mut total_energy = 0.0f64;

    let mut start = 0;
    while start + FFT_SIZE <= samples.len() {
        let mut buf: Vec<Complex32> = samples[start..start + FFT_SIZE]
            .iter()
            .zip(&window)
            .map(|(s, w)| Complex32::new(s * w, 0.0))
            .collect();
        fft.process(&mut buf);

        for (bin, c) in buf.iter().enumerate().take(FFT_SIZE / 2).skip(1) {
            let freq = bin as f32 * sample_rate as f32 / FFT_SIZE as f32;
            if freq < MIN_FREQ_HZ || freq > MAX_FREQ_HZ {
                continue;
            }
            let magnitude = c.norm() as f64;
            if magnitude < 1e-6 {
                continue;
            }
            let midi = 69.0 + 12.0 * (freq / 440.0).log2();
            let nearest = midi.round();
            let closeness = (1.0 - (midi - nearest).abs() / 0.5).max(0.0);
            let pc = nearest.rem_euclid(12.0) as usize % 12;
            chroma[pc] += magnitude * closeness;
            total_energy += magnitude * closeness;
        }

        start += hop;
    }

    if total_energy < 1e-6 {
        return None;
    }
    for v in chroma.iter_mut() {
        *v /= total_energy;
    }
    Some(chroma)
}

/// Correlate every rotation of `chroma` against both key profiles and return
/// the best-correlating (pitch class, mode) pair as a Camelot key.
fn best_correlation(chroma: &[f64; 12]) -> Option<KeyEstimate> {
    let mut best: Option<(f64, u8, u8)> = None; // (correlation, pc, mode)

    for pc in 0..12u8 {
        for (mode, profile) in [(0u8, &MINOR_PROFILE), (1u8, &MAJOR_PROFILE)] {
            let rotated: [f64; 12] =
                std::array::from_fn(|i| chroma[(i + pc as usize) % 12]);
            let corr = pearson(&rotated, profile);
            if best.map(|(b, _, _)| corr > b).unwrap_or(true) {
                best = Some((corr, pc, mode));
            }
        }
    }

    best.map(|(corr, pc, mode)| KeyEstimate {
        camelot: camelot::from_pitch_class_mode(pc, mode),
        confidence: corr.clamp(0.0, 1.0),
    })
}

fn pearson(a: &[f64; 12], b: &[f64; 12]) -> f64 {
    let mean_a = a.iter().sum::<f64>() / 12.0;
    let mean_b = b.iter().sum::<f64>() / 12.0;
    let mut num = 0.0;
    let mut den_a = 0.0;
    let mut den_b = 0.0;
    for i in 0..12 {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        num += da * db;
        den_a += da * da;
        den_b += db * db;
    }
    if den_a <= 0.0 || den_b <= 0.0 {
        return 0.0;
    }
    num / (den_a.sqrt() * den_b.sqrt())
}

fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / (n as f32 - 1.0)).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_tone(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn silence_yields_no_key() {
        let samples = vec![0.0f32; 22050 * 3];
        assert!(estimate(&samples, 22050).is_none());
    }

    #[test]
    fn a_major_chord_correlates_with_major_profile() {
        // A4 (440Hz) + C#5 (554.37Hz) + E5 (659.25Hz): A major triad.
        let sr = 22050;
        let mut samples = vec![0.0f32; sr as usize * 3];
        for (i, s) in sine_tone(440.0, sr, 3.0).into_iter().enumerate() {
            samples[i] += s;
        }
        for (i, s) in sine_tone(554.37, sr, 3.0).into_iter().enumerate() {
            samples[i] += s;
        }
        for (i, s) in sine_tone(659.25, sr, 3.0).into_iter().enumerate() {
            samples[i] += s;
        }
        let est = estimate(&samples, sr).expect("key should be detected");
        assert!(est.confidence > 0.0);
    }

    #[test]
    fn short_signal_yields_no_key() {
        let samples = vec![0.1f32; 100];
        assert!(estimate(&samples, 22050).is_none());
    }
}

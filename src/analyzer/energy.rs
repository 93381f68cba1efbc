//! Energy curve: short-window RMS sampled uniformly at a configurable rate
//! and normalized against the track's peak-windowed RMS (§4.3).

use serde::{Deserialize, Serialize};

pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 20.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyCurve {
    pub samples: Vec<f64>,
    pub sample_rate: u32,
}

impl EnergyCurve {
    pub fn at_time(&self, t: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let idx = (t * self.sample_rate as f64).round() as usize;
        self.samples[idx.min(self.samples.len() - 1)]
    }

    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }
}

/// Compute the energy curve at `rate_hz` samples/sec from mono PCM at
/// `pcm_rate`.
pub fn compute(pcm: &[f32], pcm_rate: u32, rate_hz: f64) -> EnergyCurve {
    let window = ((pcm_rate as f64) / rate_hz).round().max(1.0) as usize;
    if pcm.is_empty() || window == 0 {
        return EnergyCurve { samples: Vec::new(), sample_rate: rate_hz as u32 };
    }

    let mut raw = Vec::with_capacity(pcm.len() / window + 1);
    let mut start = 0;
    while start < pcm.len() {
        let end = (start + window).min(pcm.len());
        let slice = &pcm[start..end];
        let rms = (slice.iter().map(|s| (*s as f64).powi(2)).sum::<f64>() / slice.len() as f64).sqrt();
        raw.push(rms);
        start += window;
    }

    let peak = raw.iter().cloned().fold(0.0, f64::max).max(1e-9);
    let samples = raw.iter().map(|r| (r / peak).clamp(0.0, 1.0)).collect();

    EnergyCurve { samples, sample_rate: rate_hz as u32 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_yields_zero_energy() {
        let pcm = vec![0.0f32; 44100];
        let curve = compute(&pcm, 44100, DEFAULT_SAMPLE_RATE_HZ);
        assert!(curve.average() < 1e-6);
    }

    #[test]
    fn loudest_window_normalizes_to_one() {
        let mut pcm = vec![0.1f32; 44100];
        for s in pcm.iter_mut().take(4410) {
            *s = 1.0;
        }
        let curve = compute(&pcm, 44100, DEFAULT_SAMPLE_RATE_HZ);
        let max = curve.samples.iter().cloned().fold(0.0, f64::max);
        assert!((max - 1.0).abs() < 1e-6);
    }
}

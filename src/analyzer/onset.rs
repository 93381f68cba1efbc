//! Onset-strength envelope: half-wave-rectified spectral flux over a
//! Hann-windowed STFT, normalized to `[0,1]` and median-filtered to
//! suppress single-frame noise (§4.3, §G of the full spec).

use rustfft::num_complex::Complex32;
use rustfft::FftPlanner;

pub const FFT_SIZE: usize = 1024;

pub struct OnsetEnvelope {
    pub values: Vec<f64>,
    /// Frames per second.
    pub frame_rate: f64,
}

impl OnsetEnvelope {
    pub fn time_at(&self, frame: usize) -> f64 {
        frame as f64 / self.frame_rate
    }
}

/// Hop size tuned for a frame rate in 86-100 Hz at the given sample rate.
fn hop_size(sample_rate: u32) -> usize {
    (sample_rate as f64 / 95.0).round().max(1.0) as usize
}

fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| {
            0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / (n as f32 - 1.0)).cos()
        })
        .collect()
}

pub fn compute(samples: &[f32], sample_rate: u32) -> OnsetEnvelope {
    let hop = hop_size(sample_rate);
    let window = hann_window(FFT_SIZE);

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FFT_SIZE);

    let n_frames = if samples.len() >= FFT_SIZE {
        (samples.len() - FFT_SIZE) / hop + 1
    } else {
        0
    };

    let mut magnitudes: Vec<Vec<f32>> = Vec::with_capacity(n_frames);
    for f in 0..n_frames {
        let start = f * hop;
        magnitudes.push(frame_magnitudes(&samples[start..start + FFT_SIZE], &window, fft.as_ref()));
    }

    let mut flux = vec![0.0f64; n_frames];
    for f in 1..n_frames {
        let mut sum = 0.0f64;
        for bin in 0..magnitudes[f].len() {
            let d = magnitudes[f][bin] - magnitudes[f - 1][bin];
            if d > 0.0 {
                sum += d as f64;
            }
        }
        flux[f] = sum;
    }

    normalize(&mut flux);
    let values = median_filter3(&flux);

    OnsetEnvelope {
        values,
        frame_rate: sample_rate as f64 / hop as f64,
    }
}

fn frame_magnitudes(frame: &[f32], window: &[f32], fft: &dyn rustfft::Fft<f32>) -> Vec<f32> {
    let mut buf: Vec<Complex32> = frame
        .iter()
        .zip(window)
        .map(|(s, w)| Complex32::new(s * w, 0.0))
        .collect();
    fft.process(&mut buf);
    buf[..buf.len() / 2].iter().map(|c| c.norm()).collect()
}

fn normalize(values: &mut [f64]) {
    let max = values.iter().cloned().fold(0.0, f64::max);
    if max > 1e-9 {
        for v in values.iter_mut() {
            *v /= max;
        }
    }
}

fn median_filter3(values: &[f64]) -> Vec<f64> {
    if values.len() < 3 {
        return values.to_vec();
    }
    let mut out = values.to_vec();
    for i in 1..values.len() - 1 {
        let mut window = [values[i - 1], values[i], values[i + 1]];
        window.sort_by(|a, b| a.partial_cmp(b).unwrap());
        out[i] = window[1];
    }
    out
}

/// Peak onset strength, used by the weak-signal failure-mode check in
/// [`super::tempo`].
pub fn peak_strength(envelope: &OnsetEnvelope) -> f64 {
    envelope.values.iter().cloned().fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_produces_empty_envelope() {
        let samples = vec![0.0f32; 5000];
        let env = compute(&samples, 22050);
        assert!(peak_strength(&env) < 1e-6);
    }

    #[test]
    fn clicks_produce_onsets() {
        let mut samples = vec![0.0f32; 22050 * 2];
        for beat in 0..4 {
            let pos = beat * 11025;
            for i in 0..200 {
                if pos + i < samples.len() {
                    samples[pos + i] = 1.0;
                }
            }
        }
        let env = compute(&samples, 22050);
        assert!(peak_strength(&env) > 0.5);
    }
}

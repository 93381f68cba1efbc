//! BPM estimation by autocorrelation of the onset envelope (§4.3).

use super::onset::OnsetEnvelope;

const MIN_BPM: f64 = 60.0;
const MAX_BPM: f64 = 200.0;
const WINDOW_SECONDS: f64 = 6.0;
const HOP_SECONDS: f64 = 1.5;

/// Onset-strength floor below which the track is treated as having no
/// detectable beat (§4.3 failure mode).
pub const WEAK_SIGNAL_FLOOR: f64 = 0.05;

pub struct TempoEstimate {
    pub bpm: f64,
    pub confidence: f64,
}

/// Estimate BPM by windowed autocorrelation, then normalize into the
/// 85..175 band per §4.3. Returns `bpm = 0, confidence = 0` if the onset
/// signal never rises above [`WEAK_SIGNAL_FLOOR`].
pub fn estimate(envelope: &OnsetEnvelope) -> TempoEstimate {
    if super::onset::peak_strength(envelope) < WEAK_SIGNAL_FLOOR {
        return TempoEstimate { bpm: 0.0, confidence: 0.0 };
    }

    let window_frames = (WINDOW_SECONDS * envelope.frame_rate).round() as usize;
    let hop_frames = (HOP_SECONDS * envelope.frame_rate).round().max(1.0) as usize;

    let mut window_bpms = Vec::new();
    if envelope.values.len() >= window_frames && window_frames > 0 {
        let mut start = 0;
        while start + window_frames <= envelope.values.len() {
            if let Some(bpm) = best_lag_bpm(&envelope.values[start..start + window_frames], envelope.frame_rate) {
                window_bpms.push(bpm);
            }
            start += hop_frames;
        }
    } else if let Some(bpm) = best_lag_bpm(&envelope.values, envelope.frame_rate) {
        window_bpms.push(bpm);
    }

    if window_bpms.is_empty() {
        return TempoEstimate { bpm: 0.0, confidence: 0.0 };
    }

    let median = median(&window_bpms);
    let variance = variance(&window_bpms, median);
    let confidence = (1.0 - variance / 100.0).max(0.0).min(1.0);

    TempoEstimate {
        bpm: normalize_bpm(median),
        confidence,
    }
}

/// Autocorrelate a window of the onset envelope, restricted to lags
/// corresponding to `60..200` BPM, and return the best-matching lag's BPM.
fn best_lag_bpm(window: &[f64], frame_rate: f64) -> Option<f64> {
    let min_lag = (60.0 * frame_rate / MAX_BPM).floor() as usize;
    let max_lag = (60.0 * frame_rate / MIN_BPM).ceil() as usize;
    let max_lag = max_lag.min(window.len().saturating_sub(1));
    if min_lag == 0 || min_lag >= max_lag {
        return None;
    }

    let mean = window.iter().sum::<f64>() / window.len() as f64;
    let centered: Vec<f64> = window.iter().map(|v| v - mean).collect();

    let mut best_lag = None;
    let mut best_score = f64::MIN;
    for lag in min_lag..=max_lag {
        let mut score = 0.0;
        for i in 0..(centered.len() - lag) {
            score += centered[i] * centered[i + lag];
        }
        if score > best_score {
            best_score = score;
            best_lag = Some(lag);
        }
    }

    best_lag.map(|lag| 60.0 * frame_rate / lag as f64)
}

/// While BPM < 85 double; while BPM > 175 halve. Round to 0.1.
pub fn normalize_bpm(mut bpm: f64) -> f64 {
    if bpm <= 0.0 {
        return 0.0;
    }
    while bpm < 85.0 {
        bpm *= 2.0;
    }
    while bpm > 175.0 {
        bpm /= 2.0;
    }
    (bpm * 10.0).round() / 10.0
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn variance(values: &[f64], mean: f64) -> f64 {
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s2_bpm_normalization() {
        assert_eq!(normalize_bpm(62.5), 125.0);
        assert_eq!(normalize_bpm(180.0), 90.0);
    }

    #[test]
    fn normalize_is_idempotent_inside_band() {
        assert_eq!(normalize_bpm(120.0), 120.0);
    }

    #[test]
    fn weak_signal_yields_zero_bpm() {
        let env = OnsetEnvelope { values: vec![0.0; 2000], frame_rate: 95.0 };
        let est = estimate(&env);
        assert_eq!(est.bpm, 0.0);
        assert_eq!(est.confidence, 0.0);
    }
}

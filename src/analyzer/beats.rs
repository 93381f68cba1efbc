//! Beat placement by dynamic programming over onset peaks, and the
//! downbeat heuristic (§4.3).

use super::onset::OnsetEnvelope;

/// Deviation-from-expected-period penalty weight (`λ` in §4.3).
const LAMBDA: f64 = 8.0;
/// DP search window as a fraction of the expected beat period.
const SEARCH_WINDOW: f64 = 0.20;

struct Peak {
    time: f64,
    strength: f64,
}

fn detect_peaks(envelope: &OnsetEnvelope) -> Vec<Peak> {
    let v = &envelope.values;
    let mut peaks = Vec::new();
    for i in 1..v.len().saturating_sub(1) {
        if v[i] > v[i - 1] && v[i] >= v[i + 1] && v[i] > 0.05 {
            peaks.push(Peak {
                time: envelope.time_at(i),
                strength: v[i],
            });
        }
    }
    peaks
}

/// Place beat times, strictly increasing, `first >= 0`, `last <= duration`.
/// Returns an empty vector if no onset peaks were found (failure mode,
/// §4.3) or `bpm` is non-positive.
pub fn place_beats(envelope: &OnsetEnvelope, bpm: f64, duration: f64) -> Vec<f64> {
    if bpm <= 0.0 {
        return Vec::new();
    }
    let period = 60.0 / bpm;
    let peaks = detect_peaks(envelope);
    if peaks.is_empty() {
        return Vec::new();
    }

    let n = peaks.len();
    let mut dp = vec![0.0f64; n];
    let mut back: Vec<Option<usize>> = vec![None; n];

    for i in 0..n {
        dp[i] = peaks[i].strength;
        back[i] = None;
        let window_lo = peaks[i].time - period * (1.0 + SEARCH_WINDOW);
        for j in (0..i).rev() {
            if peaks[j].time < window_lo {
                break;
            }
            let gap = peaks[i].time - peaks[j].time;
            if gap <= 0.0 {
                continue;
            }
            let deviation = gap - period;
            if deviation.abs() > period * SEARCH_WINDOW {
                continue;
            }
            let score = dp[j] + peaks[i].strength - LAMBDA * deviation * deviation;
            if score > dp[i] {
                dp[i] = score;
                back[i] = Some(j);
            }
        }
    }

    let mut best = 0;
    for i in 1..n {
        if dp[i] > dp[best] {
            best = i;
        }
    }

    let mut chain = Vec::new();
    let mut cur = Some(best);
    while let Some(i) = cur {
        chain.push(peaks[i].time.min(duration));
        cur = back[i];
    }
    chain.reverse();
    chain
}

/// Every 4th beat, starting from the beat with the highest local onset
/// strength within the first 4-beat window.
pub fn place_downbeats(beats: &[f64], envelope: &OnsetEnvelope) -> Vec<usize> {
    if beats.is_empty() {
        return Vec::new();
    }
    let window = beats.len().min(4);
    let mut anchor = 0;
    let mut best_strength = -1.0;
    for i in 0..window {
        let frame = (beats[i] * envelope.frame_rate).round() as usize;
        let strength = envelope.values.get(frame).copied().unwrap_or(0.0);
        if strength > best_strength {
            best_strength = strength;
            anchor = i;
        }
    }

    (anchor..beats.len()).step_by(4).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clicky_envelope(beats: usize, period_frames: usize) -> OnsetEnvelope {
        let n = beats * period_frames + 1;
        let mut values = vec![0.0; n];
        for b in 0..beats {
            values[b * period_frames] = 1.0;
        }
        OnsetEnvelope { values, frame_rate: 95.0 }
    }

    #[test]
    fn beats_are_strictly_increasing() {
        let env = clicky_envelope(16, 48); // ~120 bpm at 95 fps
        let beats = place_beats(&env, 120.0, env.values.len() as f64 / env.frame_rate);
        for w in beats.windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[test]
    fn empty_envelope_yields_no_beats() {
        let env = OnsetEnvelope { values: vec![0.0; 500], frame_rate: 95.0 };
        assert!(place_beats(&env, 120.0, 5.0).is_empty());
    }

    #[test]
    fn downbeats_are_every_fourth_beat() {
        let beats: Vec<f64> = (0..16).map(|i| i as f64 * 0.5).collect();
        let env = OnsetEnvelope { values: vec![0.1; 200], frame_rate: 95.0 };
        let downbeats = place_downbeats(&beats, &env);
        for w in downbeats.windows(2) {
            assert_eq!(w[1] - w[0], 4);
        }
    }
}

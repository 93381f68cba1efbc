//! Segmentation: downbeat-anchored boundary detection, region labeling, mix
//! points, and transition hints (§4.3).

use serde::{Deserialize, Serialize};

use super::energy::EnergyCurve;

/// Absolute energy-change threshold that triggers a segment boundary.
const BOUNDARY_ABS_THRESHOLD: f64 = 0.15;
/// Relative energy-change threshold (1.5x) that triggers a segment boundary.
const BOUNDARY_REL_THRESHOLD: f64 = 1.5;
/// Minimum beats of strictly rising energy to call a region a buildup.
const BUILDUP_MIN_BEATS: u32 = 8;
/// Energy drop after a drop-segment that qualifies the next region as a breakdown.
const BREAKDOWN_DROP_THRESHOLD: f64 = 0.3;
/// avgEnergy at/above this in a drop segment makes `hasStrongDrop` true.
const STRONG_DROP_THRESHOLD: f64 = 0.7;
/// Outro final-energy ceiling for `hasCleanOutro`.
const CLEAN_OUTRO_THRESHOLD: f64 = 0.25;
/// Region-classification energy split between "low" and "mid".
const LOW_ENERGY_THRESHOLD: f64 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Intro,
    Verse,
    Buildup,
    Drop,
    Breakdown,
    Outro,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    pub start_time: f64,
    pub end_time: f64,
    pub avg_energy: f64,
    pub beat_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixPoints {
    pub intro_end: f64,
    pub mix_in_point: f64,
    pub mix_out_point: f64,
    pub outro_start: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_point: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown_point: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    FilterSweep,
    EqSwap,
    EchoOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionHints {
    pub preferred_in_type: TransitionType,
    pub preferred_out_type: TransitionType,
    pub has_strong_drop: bool,
    pub has_clean_outro: bool,
    pub ideal_crossfade_bars: u32,
}

/// Ideal crossfade length by genre family (§4.3). Unknown families fall
/// back to the 16-bar default.
pub fn crossfade_bars_for_genre(genre_family: Option<&str>) -> u32 {
    match genre_family.map(|g| g.to_lowercase()) {
        Some(g) if g == "house" || g == "techno" || g == "trance" => 32,
        Some(g) if g == "drum&bass" || g == "drum and bass" || g == "dnb" => 16,
        Some(g) if g == "dubstep" || g == "hip-hop" || g == "hip hop" => 8,
        Some(g) if g == "disco" || g == "funk" => 16,
        Some(g) if g == "pop" || g == "indie" => 8,
        _ => 16,
    }
}

/// Segment a track by downbeat-anchored energy changes, then label each
/// region. `downbeats` are indices into `beats`.
pub fn segment_track(beats: &[f64], downbeats: &[usize], energy: &EnergyCurve, duration: f64) -> Vec<Segment> {
    if beats.is_empty() || downbeats.is_empty() || duration <= 0.0 {
        return vec![Segment {
            kind: SegmentKind::Unknown,
            start_time: 0.0,
            end_time: duration.max(0.0),
            avg_energy: energy.average(),
            beat_count: 0,
        }];
    }

    let boundaries = find_boundaries(beats, downbeats, energy, duration);
    let raw_regions = build_regions(&boundaries, beats, duration);
    label_regions(raw_regions, beats, energy)
}

struct RawRegion {
    start: f64,
    end: f64,
    beat_count: u32,
}

fn find_boundaries(beats: &[f64], downbeats: &[usize], energy: &EnergyCurve, duration: f64) -> Vec<f64> {
    let mut boundaries = vec![0.0];
    for &idx in downbeats {
        let t = beats[idx];
        if t <= 0.0 || t >= duration {
            continue;
        }
        let before = window_avg_energy(energy, (t - 2.0).max(0.0), t);
        let after = window_avg_energy(energy, t, (t + 2.0).min(duration));
        let delta = (after - before).abs();
        let relative_trip = before > 1e-6 && (after / before >= BOUNDARY_REL_THRESHOLD || before / after.max(1e-6) >= BOUNDARY_REL_THRESHOLD);
        if delta >= BOUNDARY_ABS_THRESHOLD || relative_trip {
            boundaries.push(t);
        }
    }
    boundaries.push(duration);
    boundaries.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
    boundaries
}

fn window_avg_energy(energy: &EnergyCurve, start: f64, end: f64) -> f64 {
    if end <= start {
        return energy.at_time(start);
    }
    let steps = 8usize;
    let mut sum = 0.0;
    for i in 0..steps {
        let t = start + (end - start) * (i as f64 / steps as f64);
        sum += energy.at_time(t);
    }
    sum / steps as f64
}

fn build_regions(boundaries: &[f64], beats: &[f64], duration: f64) -> Vec<RawRegion> {
    let mut regions = Vec::new();
    for w in boundaries.windows(2) {
        let (start, end) = (w[0], w[1]);
        if end - start < 1e-6 {
            continue;
        }
        let beat_count = beats.iter().filter(|&&b| b >= start && b < end).count() as u32;
        regions.push(RawRegion { start, end, beat_count });
    }
    if regions.is_empty() {
        regions.push(RawRegion { start: 0.0, end: duration, beat_count: beats.len() as u32 });
    }
    regions
}

fn label_regions(regions: Vec<RawRegion>, _beats: &[f64], energy: &EnergyCurve) -> Vec<Segment> {
    let n = regions.len();
    let mut avg_energies = Vec::with_capacity(n);
    let mut start_energies = Vec::with_capacity(n);
    let mut end_energies = Vec::with_capacity(n);
    for r in &regions {
        avg_energies.push(window_avg_energy(energy, r.start, r.end));
        start_energies.push(energy.at_time(r.start));
        end_energies.push(energy.at_time((r.end - 0.01).max(r.start)));
    }

    let mut kinds = vec![SegmentKind::Unknown; n];
    let mut intro_used = false;
    let mut outro_used = false;

    // Pass 1: intro / outro (location-bound, mutually exclusive with everything else).
    if n > 0 && avg_energies[0] < LOW_ENERGY_THRESHOLD && regions[0].beat_count < 16 {
        kinds[0] = SegmentKind::Intro;
        intro_used = true;
    }
    if n > 0 {
        let last = n - 1;
        let already_intro = intro_used && last == 0;
        if !already_intro && end_energies[last] < LOW_ENERGY_THRESHOLD {
            kinds[last] = SegmentKind::Outro;
            outro_used = true;
        }
    }

    // Pass 2: buildup — strictly rising for >= BUILDUP_MIN_BEATS.
    for i in 0..n {
        if !matches!(kinds[i], SegmentKind::Unknown) {
            continue;
        }
        let rising = end_energies[i] - start_energies[i] > 0.2 && regions[i].beat_count >= BUILDUP_MIN_BEATS;
        if rising {
            kinds[i] = SegmentKind::Buildup;
        }
    }

    // Pass 3: drop — highest-energy region immediately following a buildup.
    for i in 1..n {
        if matches!(kinds[i - 1], SegmentKind::Buildup) && matches!(kinds[i], SegmentKind::Unknown) {
            kinds[i] = SegmentKind::Drop;
        }
    }

    // Pass 4: breakdown — energy drop > threshold immediately after a drop.
    for i in 1..n {
        if matches!(kinds[i - 1], SegmentKind::Drop)
            && matches!(kinds[i], SegmentKind::Unknown)
            && avg_energies[i - 1] - avg_energies[i] > BREAKDOWN_DROP_THRESHOLD
        {
            kinds[i] = SegmentKind::Breakdown;
        }
    }

    // Pass 5: remaining mid-energy regions become verse; anything implausible
    // stays unknown.
    for i in 0..n {
        if matches!(kinds[i], SegmentKind::Unknown) {
            kinds[i] = SegmentKind::Verse;
        }
    }

    let _ = outro_used;
    regions
        .into_iter()
        .zip(kinds)
        .zip(avg_energies)
        .map(|((r, kind), avg_energy)| Segment {
            kind,
            start_time: r.start,
            end_time: r.end,
            avg_energy,
            beat_count: r.beat_count,
        })
        .collect()
}

/// Average beat period in seconds, used to translate "N beats" into a time
/// span for mix-point placement. Falls back to a neutral 0.5s (120 BPM) if
/// fewer than two beats are known.
fn avg_beat_period(beats: &[f64]) -> f64 {
    if beats.len() < 2 {
        return 0.5;
    }
    let span = beats[beats.len() - 1] - beats[0];
    span / (beats.len() - 1) as f64
}

/// Derive mix points from the segmented track (§4.3). Tolerates empty
/// `beats`/`downbeats` (the analyzer's weak-signal failure mode) by falling
/// back to duration fractions that still satisfy the §3 invariant.
pub fn build_mix_points(segments: &[Segment], beats: &[f64], downbeats: &[usize], duration: f64) -> MixPoints {
    let intro_end = segments
        .iter()
        .find(|s| matches!(s.kind, SegmentKind::Intro))
        .map(|s| s.end_time)
        .unwrap_or(0.0);
    let outro_start = segments
        .iter()
        .find(|s| matches!(s.kind, SegmentKind::Outro))
        .map(|s| s.start_time)
        .unwrap_or(duration);
    let drop_point = segments.iter().find(|s| matches!(s.kind, SegmentKind::Drop)).map(|s| s.start_time);
    let breakdown_point = segments
        .iter()
        .find(|s| matches!(s.kind, SegmentKind::Breakdown))
        .map(|s| s.start_time);

    let (mix_in_point, mix_out_point) = if downbeats.is_empty() || beats.is_empty() {
        let fallback_in = (intro_end + duration * 0.05).min(duration * 0.45).max(intro_end);
        let fallback_out = (outro_start - duration * 0.05).max(duration * 0.55).min(outro_start);
        (fallback_in, fallback_out.max(fallback_in + 0.01).min(outro_start.max(fallback_in + 0.01)))
    } else {
        let period = avg_beat_period(beats);
        let in_threshold = intro_end + 4.0 * period;
        let mix_in = downbeats
            .iter()
            .map(|&i| beats[i])
            .find(|&t| t >= in_threshold)
            .unwrap_or(duration.min(in_threshold));

        let out_threshold = outro_start - 4.0 * period;
        let mix_out = downbeats
            .iter()
            .map(|&i| beats[i])
            .filter(|&t| t <= out_threshold)
            .next_back()
            .unwrap_or(mix_in + period);

        (mix_in, mix_out.max(mix_in + period.max(0.01)))
    };

    MixPoints {
        intro_end: intro_end.min(mix_in_point),
        mix_in_point,
        mix_out_point: mix_out_point.max(mix_in_point + 0.01),
        outro_start: outro_start.max(mix_out_point),
        drop_point,
        breakdown_point,
    }
}

/// Derive transition hints from the segmented track (§4.3).
pub fn build_transition_hints(segments: &[Segment], genre_family: Option<&str>) -> TransitionHints {
    let has_strong_drop = segments
        .iter()
        .any(|s| matches!(s.kind, SegmentKind::Drop) && s.avg_energy >= STRONG_DROP_THRESHOLD);

    let outro = segments.iter().find(|s| matches!(s.kind, SegmentKind::Outro));
    let has_clean_outro = outro.map(|s| s.avg_energy <= CLEAN_OUTRO_THRESHOLD).unwrap_or(false);

    let first_post_intro = segments
        .iter()
        .find(|s| !matches!(s.kind, SegmentKind::Intro));
    let preferred_in_type = if matches!(first_post_intro.map(|s| s.kind), Some(SegmentKind::Buildup)) {
        TransitionType::FilterSweep
    } else {
        TransitionType::EqSwap
    };
    let preferred_out_type = if has_clean_outro {
        TransitionType::EchoOut
    } else {
        TransitionType::EqSwap
    };

    TransitionHints {
        preferred_in_type,
        preferred_out_type,
        has_strong_drop,
        has_clean_outro,
        ideal_crossfade_bars: crossfade_bars_for_genre(genre_family),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_curve(value: f64, n: usize) -> EnergyCurve {
        EnergyCurve { samples: vec![value; n], sample_rate: 20 }
    }

    #[test]
    fn weak_signal_yields_single_unknown_segment() {
        let segs = segment_track(&[], &[], &flat_curve(0.0, 0), 180.0);
        assert_eq!(segs.len(), 1);
        assert!(matches!(segs[0].kind, SegmentKind::Unknown));
        assert_eq!(segs[0].start_time, 0.0);
        assert_eq!(segs[0].end_time, 180.0);
    }

    #[test]
    fn segments_partition_duration() {
        let beats: Vec<f64> = (0..64).map(|i| i as f64 * 0.5).collect();
        let downbeats: Vec<usize> = (0..64).step_by(4).collect();
        // Energy curve: low -> high -> low, to force intro/verse/outro-ish boundaries.
        let mut samples = vec![0.2; 20 * 32];
        for s in samples.iter_mut().skip(20 * 10).take(20 * 12) {
            *s = 0.8;
        }
        let curve = EnergyCurve { samples, sample_rate: 20 };
        let segs = segment_track(&beats, &downbeats, &curve, 32.0);

        assert!(!segs.is_empty());
        assert_eq!(segs[0].start_time, 0.0);
        assert_eq!(segs.last().unwrap().end_time, 32.0);
        for w in segs.windows(2) {
            assert_eq!(w[0].end_time, w[1].start_time);
        }
    }

    #[test]
    fn crossfade_bars_by_genre() {
        assert_eq!(crossfade_bars_for_genre(Some("techno")), 32);
        assert_eq!(crossfade_bars_for_genre(Some("dubstep")), 8);
        assert_eq!(crossfade_bars_for_genre(Some("disco")), 16);
        assert_eq!(crossfade_bars_for_genre(None), 16);
        assert_eq!(crossfade_bars_for_genre(Some("unknown-genre")), 16);
    }

    #[test]
    fn mix_points_fallback_on_empty_beats() {
        let segs = vec![Segment {
            kind: SegmentKind::Unknown,
            start_time: 0.0,
            end_time: 200.0,
            avg_energy: 0.4,
            beat_count: 0,
        }];
        let mp = build_mix_points(&segs, &[], &[], 200.0);
        assert!(mp.intro_end <= mp.mix_in_point);
        assert!(mp.mix_in_point < mp.mix_out_point);
        assert!(mp.mix_out_point <= mp.outro_start);
        assert!(mp.outro_start <= 200.0);
    }
}

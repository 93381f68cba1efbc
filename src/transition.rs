//! C6: Transition Planner. Chooses a transition style per adjacent pair,
//! snaps cue points to phrase boundaries, and computes crossfade timing
//! (§4.6).

use serde::{Deserialize, Serialize};

use crate::analyzer::segments::SegmentKind;
use crate::analyzer::AnalysisReport;
use crate::camelot;
use crate::track::Track;

/// Downbeat-snap tolerance (§4.6 step 4).
const SNAP_TOLERANCE_SEC: f64 = 0.5;
/// `|Δbpm|` beyond which the planner emits a tempo-adjust directive (§4.6 step 5).
const BPM_BRIDGE_THRESHOLD: f64 = 6.0;
/// Energy threshold under which a segment "ends cleanly" (mirrors `hasCleanOutro`'s 0.25).
const CLEAN_ENDING_THRESHOLD: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStyle {
    QuickCut,
    LinearBlend,
    ExponentialBlend,
    EqSwap,
    FilterSweep,
    EchoOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixDifficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub from_idx: usize,
    pub to_idx: usize,
    pub style: TransitionStyle,
    pub from_cue_sec: f64,
    pub to_cue_sec: f64,
    pub duration_sec: f64,
    pub harmonic_score: u8,
    pub bpm_delta: f64,
    pub energy_delta: f64,
    pub notes: Vec<String>,
}

fn last_segment_kind(report: &AnalysisReport) -> Option<SegmentKind> {
    report.segments.last().map(|s| s.kind)
}

fn first_segment_kind(report: &AnalysisReport) -> Option<SegmentKind> {
    report.segments.first().map(|s| s.kind)
}

/// The segment immediately following the track's (possible) intro — this is
/// the region a mix-in lands in.
fn first_post_intro_kind(report: &AnalysisReport) -> Option<SegmentKind> {
    report
        .segments
        .iter()
        .find(|s| !matches!(s.kind, SegmentKind::Intro))
        .map(|s| s.kind)
}

fn intro_ends_cleanly(report: &AnalysisReport) -> bool {
    report
        .segments
        .first()
        .map(|s| matches!(s.kind, SegmentKind::Intro) && s.avg_energy <= CLEAN_ENDING_THRESHOLD)
        .unwrap_or(false)
}

fn nearest_downbeat(report: &AnalysisReport, t: f64, tolerance: f64) -> f64 {
    let candidate = report
        .downbeat_indices
        .iter()
        .filter_map(|&i| report.beats.get(i))
        .min_by(|a, b| (**a - t).abs().partial_cmp(&(**b - t).abs()).unwrap());
    match candidate {
        Some(&d) if (d - t).abs() <= tolerance => d,
        _ => t,
    }
}

fn select_style(from: &AnalysisReport, to: &AnalysisReport) -> TransitionStyle {
    let from_outro_is_drop = matches!(last_segment_kind(from), Some(SegmentKind::Drop));
    let to_intro_is_drop = matches!(first_segment_kind(to), Some(SegmentKind::Drop));
    if from_outro_is_drop && to_intro_is_drop {
        return TransitionStyle::QuickCut;
    }

    // Checked ahead of the eq_swap rule below: §4.6's S6 scenario is explicit
    // that the buildup rule dominates even when the outgoing track's clean
    // outro would otherwise also qualify for an eq_swap.
    if matches!(first_post_intro_kind(to), Some(SegmentKind::Buildup)) {
        return TransitionStyle::FilterSweep;
    }

    if from.transition_hints.has_clean_outro && intro_ends_cleanly(to) {
        return TransitionStyle::EqSwap;
    }

    let harmonic = camelot::compatibility_score(&from.camelot_key, &to.camelot_key);
    let bpm_delta = (from.bpm - to.bpm).abs();
    if harmonic >= 85 && from.bpm > 0.0 && to.bpm > 0.0 && bpm_delta <= 6.0 {
        return TransitionStyle::ExponentialBlend;
    }

    TransitionStyle::LinearBlend
}

fn crossfade_seconds(style: TransitionStyle, ideal_bars: u32, bpm: f64) -> f64 {
    let bpm = if bpm > 0.0 { bpm } else { 120.0 };
    let bars = match style {
        TransitionStyle::ExponentialBlend => ideal_bars.max(32),
        _ => ideal_bars,
    };
    let seconds = bars as f64 * 4.0 * 60.0 / bpm;
    match style {
        TransitionStyle::QuickCut => seconds.min(2.0),
        _ => seconds,
    }
}

/// Plan the transition between two adjacent tracks in the ordered plan (§4.6).
/// `from_idx`/`to_idx` are the tracks' positions in the final `MixPlan`.
pub fn plan_transition(
    from_idx: usize,
    from: &Track,
    from_report: &AnalysisReport,
    to_idx: usize,
    to: &Track,
    to_report: &AnalysisReport,
) -> Transition {
    let style = select_style(from_report, to_report);
    let mut notes = Vec::new();

    let duration_sec = crossfade_seconds(style, from_report.transition_hints.ideal_crossfade_bars, from_report.bpm);

    let raw_from_cue = from_report.mix_points.mix_out_point;
    let raw_to_cue = to_report.mix_points.mix_in_point;
    let from_cue_sec = nearest_downbeat(from_report, raw_from_cue, SNAP_TOLERANCE_SEC);
    let to_cue_sec = nearest_downbeat(to_report, raw_to_cue, SNAP_TOLERANCE_SEC);

    let beat_period = if from_report.bpm > 0.0 { 60.0 / from_report.bpm } else { 0.5 };
    let snapped_span = to_cue_sec - from_cue_sec;
    let mut final_duration = duration_sec;
    if (snapped_span - duration_sec).abs() > beat_period && snapped_span > 0.0 {
        final_duration = snapped_span;
        notes.push(format!(
            "duration adjusted from {:.2}s to {:.2}s to honor phrase-snapped cues",
            duration_sec, final_duration
        ));
    }

    let bpm_delta = from_report.bpm - to_report.bpm;
    if bpm_delta.abs() > BPM_BRIDGE_THRESHOLD {
        notes.push(format!(
            "tempo-adjust directive: ramp {:.1} BPM -> {:.1} BPM over the crossfade (pitch-shift side-effect on the incoming track)",
            to_report.bpm, from_report.bpm
        ));
    }

    let harmonic_score = camelot::compatibility_score(&from_report.camelot_key, &to_report.camelot_key);
    let energy_delta = (from.effective_energy(Some(from_report)).unwrap_or(0.0)
        - to.effective_energy(Some(to_report)).unwrap_or(0.0))
    .abs();

    Transition {
        from_idx,
        to_idx,
        style,
        from_cue_sec: from_cue_sec.clamp(0.0, from.duration_seconds()),
        to_cue_sec: to_cue_sec.clamp(0.0, to.duration_seconds()),
        duration_sec: final_duration,
        harmonic_score,
        bpm_delta,
        energy_delta,
        notes,
    }
}

fn transition_difficulty(t: &Transition) -> MixDifficulty {
    if t.harmonic_score >= 80 && t.bpm_delta.abs() <= 3.0 {
        MixDifficulty::Easy
    } else if t.harmonic_score < 60 || t.bpm_delta.abs() > 8.0 {
        MixDifficulty::Hard
    } else {
        MixDifficulty::Medium
    }
}

/// Majority-class aggregate difficulty across all transitions in a plan (§4.6).
pub fn mix_difficulty(transitions: &[Transition]) -> Option<MixDifficulty> {
    if transitions.is_empty() {
        return None;
    }
    let mut easy = 0;
    let mut medium = 0;
    let mut hard = 0;
    for t in transitions {
        match transition_difficulty(t) {
            MixDifficulty::Easy => easy += 1,
            MixDifficulty::Medium => medium += 1,
            MixDifficulty::Hard => hard += 1,
        }
    }
    Some(if easy >= medium && easy >= hard {
        MixDifficulty::Easy
    } else if hard >= medium {
        MixDifficulty::Hard
    } else {
        MixDifficulty::Medium
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::energy::EnergyCurve;
    use crate::analyzer::segments::{MixPoints, Segment, TransitionHints, TransitionType};
    use crate::track::Provenance;

    fn track(id: &str, bpm: f64, key: &str) -> Track {
        Track {
            id: id.into(),
            uri: format!("file:///{id}"),
            title: format!("Title {id}"),
            primary_artist: "Artist".into(),
            duration_ms: 300_000,
            bpm: Some(bpm),
            camelot_key: Some(key.into()),
            energy: Some(6),
            popularity: Some(50),
            play_count: Some(1),
            provenance: Provenance::CatalogSearch,
            genre: None,
            genre_family: None,
            decade: None,
            analysis_source: None,
        }
    }

    fn report(bpm: f64, key: &str, segments: Vec<Segment>, has_clean_outro: bool, crossfade_bars: u32) -> AnalysisReport {
        let duration = 300.0;
        AnalysisReport {
            analyzer_version: "3".into(),
            bpm,
            bpm_confidence: 0.9,
            key: key.into(),
            camelot_key: key.into(),
            energy: 6,
            duration,
            beats: (0..600).map(|i| i as f64 * 0.5).collect(),
            downbeat_indices: (0..600).step_by(4).collect(),
            mix_points: MixPoints {
                intro_end: 16.0,
                mix_in_point: 32.0,
                mix_out_point: 260.0,
                outro_start: 280.0,
                drop_point: None,
                breakdown_point: None,
            },
            segments,
            energy_curve: EnergyCurve { samples: vec![0.5; 100], sample_rate: 20 },
            transition_hints: TransitionHints {
                preferred_in_type: TransitionType::EqSwap,
                preferred_out_type: TransitionType::EqSwap,
                has_strong_drop: false,
                has_clean_outro,
                ideal_crossfade_bars: crossfade_bars,
            },
        }
    }

    fn seg(kind: SegmentKind, start: f64, end: f64, energy: f64) -> Segment {
        Segment { kind, start_time: start, end_time: end, avg_energy: energy, beat_count: 16 }
    }

    #[test]
    fn s6_filter_sweep_dominates_over_exponential_blend() {
        let from_track = track("f", 124.0, "8A");
        let to_track = track("t", 126.0, "9A");
        let from_report = report(124.0, "8A", vec![seg(SegmentKind::Outro, 260.0, 300.0, 0.1)], true, 32);
        let to_report = report(
            126.0,
            "9A",
            vec![seg(SegmentKind::Intro, 0.0, 16.0, 0.2), seg(SegmentKind::Buildup, 16.0, 48.0, 0.6)],
            false,
            32,
        );

        let t = plan_transition(0, &from_track, &from_report, 1, &to_track, &to_report);
        assert_eq!(t.style, TransitionStyle::FilterSweep);
        // 32 bars @ 124 bpm
        let expected = 32.0 * 4.0 * 60.0 / 124.0;
        assert!((t.duration_sec - expected).abs() < 1.0 || !t.notes.is_empty());
    }

    #[test]
    fn drop_to_drop_is_quick_cut() {
        let from_track = track("f", 128.0, "8A");
        let to_track = track("t", 128.0, "8A");
        let from_report = report(128.0, "8A", vec![seg(SegmentKind::Drop, 260.0, 300.0, 0.9)], false, 32);
        let to_report = report(128.0, "8A", vec![seg(SegmentKind::Drop, 0.0, 40.0, 0.9)], false, 32);

        let t = plan_transition(0, &from_track, &from_report, 1, &to_track, &to_report);
        assert_eq!(t.style, TransitionStyle::QuickCut);
        assert!(t.duration_sec <= 2.0);
    }

    #[test]
    fn harmonic_score_matches_camelot_compatibility() {
        let from_track = track("f", 124.0, "8A");
        let to_track = track("t", 124.0, "8B");
        let from_report = report(124.0, "8A", vec![seg(SegmentKind::Verse, 0.0, 300.0, 0.5)], false, 16);
        let to_report = report(124.0, "8B", vec![seg(SegmentKind::Verse, 0.0, 300.0, 0.5)], false, 16);

        let t = plan_transition(0, &from_track, &from_report, 1, &to_track, &to_report);
        assert_eq!(t.harmonic_score, 90);
    }

    #[test]
    fn large_bpm_delta_notes_tempo_adjust() {
        let from_track = track("f", 140.0, "8A");
        let to_track = track("t", 120.0, "8A");
        let from_report = report(140.0, "8A", vec![seg(SegmentKind::Verse, 0.0, 300.0, 0.5)], false, 16);
        let to_report = report(120.0, "8A", vec![seg(SegmentKind::Verse, 0.0, 300.0, 0.5)], false, 16);

        let t = plan_transition(0, &from_track, &from_report, 1, &to_track, &to_report);
        assert!(t.notes.iter().any(|n| n.contains("tempo-adjust")));
    }

    #[test]
    fn mix_difficulty_majority_class() {
        let easy = Transition {
            from_idx: 0,
            to_idx: 1,
            style: TransitionStyle::ExponentialBlend,
            from_cue_sec: 0.0,
            to_cue_sec: 0.0,
            duration_sec: 10.0,
            harmonic_score: 90,
            bpm_delta: 1.0,
            energy_delta: 0.1,
            notes: vec![],
        };
        let hard = Transition { harmonic_score: 40, bpm_delta: 10.0, ..easy.clone() };
        assert_eq!(mix_difficulty(&[easy.clone(), easy.clone(), hard]), Some(MixDifficulty::Easy));
    }
}

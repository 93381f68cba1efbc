//! C5: Harmonic Ordering Engine. Greedy nearest-neighbor ordering under
//! weighted key/BPM/energy objectives, with a target energy curve (§4.5).

use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;

use crate::analyzer::AnalysisReport;
use crate::camelot;
use crate::criteria::{EnergyCurveTag, MixCriteria};
use crate::track::Track;

/// The prescribed energy value for `criteria.energyCurve` at normalized
/// position `pos ∈ [0,1]` (§4.5).
pub fn target_energy_at(tag: EnergyCurveTag, pos: f64) -> f64 {
    let pos = pos.clamp(0.0, 1.0);
    match tag {
        EnergyCurveTag::Build => 0.3 + 0.6 * pos,
        EnergyCurveTag::Drop => 0.9 - 0.6 * pos,
        EnergyCurveTag::Steady => 0.6,
        EnergyCurveTag::PeakMiddle => {
            if pos <= 0.5 {
                0.3 + 1.2 * pos
            } else {
                0.9 - 1.2 * (pos - 0.5)
            }
        }
        EnergyCurveTag::Wave => 0.6 + 0.3 * (2.0 * PI * pos).sin(),
    }
}

fn camelot_key(track: &Track) -> Option<String> {
    track.camelot_key.clone()
}

fn energy_of(track: &Track, analysis: Option<&AnalysisReport>) -> Option<f64> {
    track.effective_energy(analysis)
}

fn bpm_of(track: &Track, analysis: Option<&AnalysisReport>) -> Option<f64> {
    track.effective_bpm(analysis)
}

/// Opener score: highest wins; ties broken by id (§4.5).
fn opener_score(track: &Track, analysis: Option<&AnalysisReport>) -> f64 {
    let mut score = 0.0;
    if camelot_key(track).is_some() {
        score += 20.0;
    }
    if let Some(e) = energy_of(track, analysis) {
        if (0.3..=0.6).contains(&e) {
            score += 15.0;
        }
    }
    if let Some(b) = bpm_of(track, analysis) {
        if (115.0..=128.0).contains(&b) {
            score += 10.0;
        }
    }
    if analysis.is_some() {
        score += 10.0;
    }
    score
}

/// Next-track score vs. the current last track (§4.5). Returns
/// `(score, |Δbpm|)` so the caller can apply the tie-break rule.
fn next_track_score(
    current: &Track,
    current_analysis: Option<&AnalysisReport>,
    candidate: &Track,
    candidate_analysis: Option<&AnalysisReport>,
    criteria: &MixCriteria,
    position: f64,
) -> (f64, f64) {
    let mut score;

    let harmonic = match (camelot_key(current), camelot_key(candidate)) {
        (Some(a), Some(b)) => camelot::compatibility_score(&a, &b) as f64,
        _ => 50.0,
    };
    score = harmonic;

    let bpm_delta = match (bpm_of(current, current_analysis), bpm_of(candidate, candidate_analysis)) {
        (Some(a), Some(b)) => {
            let delta = (a - b).abs();
            if delta <= 3.0 {
                score += 20.0;
            } else if delta <= 6.0 {
                score += 15.0;
            } else if delta <= 10.0 {
                score += 5.0;
            }
            // Half/double check independent of the above bands.
            let half_double_delta = (a - b * 2.0).abs().min((a * 2.0 - b).abs());
            if half_double_delta <= 6.0 {
                score += 10.0;
            }
            delta
        }
        _ => f64::MAX,
    };

    if let (Some(ce), Some(ne)) = (energy_of(current, current_analysis), energy_of(candidate, candidate_analysis)) {
        let delta = (ce - ne).abs();
        if delta <= 0.15 {
            score += 10.0;
        } else if delta <= 0.30 {
            score += 5.0;
        }
    }

    if let Some(tag) = criteria.energy_curve {
        if let Some(ne) = energy_of(candidate, candidate_analysis) {
            let target = target_energy_at(tag, position);
            let delta = (ne - target).abs();
            if delta <= 0.1 {
                score += 10.0;
            } else if delta <= 0.2 {
                score += 5.0;
            }
        }
    }

    (score, bpm_delta)
}

/// Order `tracks` by the greedy nearest-neighbor algorithm (§4.5). Ties are
/// broken by lower `|Δbpm|`, then lower id lexicographically, yielding a
/// deterministic total order.
pub fn order(tracks: &[Track], analyses: &HashMap<String, AnalysisReport>) -> Vec<Track> {
    order_with_criteria(tracks, analyses, &MixCriteria::unconstrained(tracks.len()))
}

pub fn order_with_criteria(tracks: &[Track], analyses: &HashMap<String, AnalysisReport>, criteria: &MixCriteria) -> Vec<Track> {
    if tracks.is_empty() {
        return Vec::new();
    }

    let mut remaining: Vec<&Track> = tracks.iter().collect();
    remaining.sort_by(|a, b| a.id.cmp(&b.id));

    let opener_idx = remaining
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            let sa = opener_score(a, analyses.get(&a.id));
            let sb = opener_score(b, analyses.get(&b.id));
            sa.partial_cmp(&sb).unwrap().then_with(|| b.id.cmp(&a.id))
        })
        .map(|(i, _)| i)
        .unwrap();

    let mut ordered: Vec<Track> = vec![remaining.remove(opener_idx).clone()];
    let n = tracks.len();
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(ordered[0].id.clone());

    while !remaining.is_empty() {
        let current = ordered.last().unwrap();
        let current_analysis = analyses.get(&current.id);
        let position = ordered.len() as f64 / n as f64;

        let mut best_idx = 0;
        let mut best_score = f64::MIN;
        let mut best_delta = f64::MAX;
        for (i, candidate) in remaining.iter().enumerate() {
            let (score, delta) = next_track_score(current, current_analysis, candidate, analyses.get(&candidate.id), criteria, position);
            let better = score > best_score
                || (score == best_score && delta < best_delta)
                || (score == best_score && delta == best_delta && candidate.id < remaining[best_idx].id);
            if better {
                best_score = score;
                best_delta = delta;
                best_idx = i;
            }
        }

        let next = remaining.remove(best_idx).clone();
        visited.insert(next.id.clone());
        ordered.push(next);
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Provenance;

    fn track(id: &str, key: &str, bpm: f64, energy: u8) -> Track {
        Track {
            id: id.into(),
            uri: format!("file:///{id}"),
            title: format!("Title {id}"),
            primary_artist: format!("Artist {id}"),
            duration_ms: 200_000,
            bpm: Some(bpm),
            camelot_key: Some(key.into()),
            energy: Some(energy),
            popularity: Some(50),
            play_count: Some(1),
            provenance: Provenance::CatalogSearch,
            genre: None,
            genre_family: None,
            decade: None,
            analysis_source: None,
        }
    }

    #[test]
    fn target_energy_build_is_monotonic() {
        let start = target_energy_at(EnergyCurveTag::Build, 0.0);
        let end = target_energy_at(EnergyCurveTag::Build, 1.0);
        assert!((start - 0.3).abs() < 1e-9);
        assert!((end - 0.9).abs() < 1e-9);
    }

    #[test]
    fn target_energy_steady_is_constant() {
        assert_eq!(target_energy_at(EnergyCurveTag::Steady, 0.0), 0.6);
        assert_eq!(target_energy_at(EnergyCurveTag::Steady, 1.0), 0.6);
    }

    #[test]
    fn s5_ordering_groups_by_key_then_switches() {
        // Two tracks in 8A at 124bpm, two in 5A at 128bpm; opener should be
        // the lower-energy 8A track, 8A->8A transition is harmonicScore 100.
        let a1 = {
            let mut t = track("a1", "8A", 124.0, 3);
            t.energy = Some(3); // low-ish energy candidate for opener
            t
        };
        let a2 = track("a2", "8A", 124.0, 5);
        let b1 = track("b1", "5A", 128.0, 6);
        let b2 = track("b2", "5A", 128.0, 7);

        let mut criteria = MixCriteria::unconstrained(4);
        criteria.energy_curve = Some(EnergyCurveTag::Build);

        let pool = vec![a1.clone(), a2.clone(), b1.clone(), b2.clone()];
        let ordered = order_with_criteria(&pool, &HashMap::new(), &criteria);

        assert_eq!(ordered.len(), 4);
        assert_eq!(ordered[0].camelot_key.as_deref(), Some("8A"));
        assert_eq!(ordered[1].camelot_key.as_deref(), Some("8A"));

        let harmonic_1 = camelot::compatibility_score(
            ordered[0].camelot_key.as_deref().unwrap(),
            ordered[1].camelot_key.as_deref().unwrap(),
        );
        assert_eq!(harmonic_1, 100);
    }

    #[test]
    fn idempotent_on_its_own_output() {
        let pool = vec![
            track("a1", "8A", 124.0, 4),
            track("a2", "8A", 124.0, 5),
            track("b1", "5A", 128.0, 6),
        ];
        let first = order(&pool, &HashMap::new());
        let second = order(&first, &HashMap::new());
        let first_ids: Vec<&str> = first.iter().map(|t| t.id.as_str()).collect();
        let second_ids: Vec<&str> = second.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(first_ids, second_ids);
    }
}

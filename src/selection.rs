//! C4: Selection Scorer. Scores a candidate pool against `MixCriteria` and
//! picks a variety-enforced subset (§4.4).

use std::collections::{HashMap, HashSet};

use crate::analyzer::AnalysisReport;
use crate::criteria::{FamiliarityPreference, MixCriteria, RecentHistory};
use crate::rng::{rng_from_seed, variety_jitter};
use crate::track::Track;

/// Score below which a track is treated as genre-incompatible and dropped
/// from the fill pass regardless of how many slots remain (§4.4).
const INCOMPATIBLE_FLOOR: f64 = -50.0;

#[derive(Debug, Clone)]
pub struct ScoredTrack {
    pub track: Track,
    pub score: f64,
}

/// Score a single track against `criteria` (§4.4's additive term table).
/// `analysis` is the track's cached report, if any.
pub fn score_track(
    track: &Track,
    analysis: Option<&AnalysisReport>,
    criteria: &MixCriteria,
    recent_history: &RecentHistory,
    jitter: f64,
) -> f64 {
    let mut score = 0.0;

    if track.is_in_library() {
        score += 30.0;
    }
    if track.camelot_key.is_some() || analysis.is_some() {
        score += 20.0;
    }

    let bpm = track.effective_bpm(analysis);
    if let Some(range) = &criteria.bpm_range {
        match bpm {
            Some(b) if b >= range.min && b <= range.max => score += 20.0,
            Some(_) => score -= 50.0,
            None => score -= 15.0,
        }
    }

    let energy_1_10 = analysis.map(|a| a.energy as i32).or(track.energy.map(|e| e as i32));
    if let Some(range) = &criteria.energy_range {
        if let Some(e) = energy_1_10 {
            if e < range.min as i32 || e > range.max as i32 {
                score -= 30.0;
            }
        }
    }

    let include_hit = criteria.include_artists.contains(&track.primary_artist);
    let reference_hit = criteria.reference_artists.contains(&track.primary_artist);
    if include_hit {
        score += 20.0;
    } else if reference_hit {
        score += 10.0;
    }

    if let Some(popularity) = track.popularity {
        match criteria.familiarity_preference {
            FamiliarityPreference::DeepCuts => {
                if popularity < 40 {
                    score += 20.0;
                } else if popularity > 70 {
                    score -= 15.0;
                }
            }
            FamiliarityPreference::Hits => {
                if popularity > 60 {
                    score += 20.0;
                } else if popularity < 30 {
                    score -= 15.0;
                }
            }
            FamiliarityPreference::Any => {}
        }
        if popularity >= 30 {
            score += (0.15 * popularity as f64).min(15.0);
        }
    }

    if recent_history.contains(&track.id) {
        score -= 25.0;
    }

    if let Some(families) = &criteria.genre_set {
        match &track.genre_family {
            Some(family) if families.contains(family) => {}
            Some(_) => score -= 200.0,
            None => score -= 40.0,
        }
    }

    score += jitter;
    score
}

fn normalized_dedup_key(track: &Track) -> (String, String) {
    (track.title.trim().to_lowercase(), track.primary_artist.trim().to_lowercase())
}

/// `tracksPerIncludeArtist = clamp(floor(0.4*N / |include|), 1, 3)` (§4.4),
/// further bounded by `max_per_artist` — the include-artist budget is still
/// subject to the per-artist variety cap (§8 invariant 3), not a separate
/// allowance on top of it.
fn tracks_per_include_artist(target_count: usize, include_count: usize, max_per_artist: usize) -> usize {
    if include_count == 0 {
        return 0;
    }
    let raw = (0.4 * target_count as f64 / include_count as f64).floor() as i64;
    (raw.clamp(1, 3) as usize).min(max_per_artist)
}

/// `maxPerArtist = max(2, ceil(N/15))` (§4.4).
fn max_per_artist(target_count: usize) -> usize {
    (target_count as f64 / 15.0).ceil().max(2.0) as usize
}

/// Select the top-`N` tracks from `pool` honoring `criteria`'s variety
/// rules (§4.4). `analyses` supplies cached reports keyed by track id.
pub fn select(
    pool: &[Track],
    criteria: &MixCriteria,
    recent_history: &RecentHistory,
    analyses: &HashMap<String, AnalysisReport>,
) -> Vec<Track> {
    let target = criteria.target_track_count;
    let mut rng = rng_from_seed(criteria.seed);

    let candidates: Vec<Track> = pool
        .iter()
        .filter(|t| !criteria.excluded_artists.contains(&t.primary_artist))
        .cloned()
        .collect();

    let mut scored: Vec<ScoredTrack> = candidates
        .iter()
        .map(|t| {
            let jitter = variety_jitter(&mut rng);
            let score = score_track(t, analyses.get(&t.id), criteria, recent_history, jitter);
            ScoredTrack { track: t.clone(), score }
        })
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());

    let max_per_artist = max_per_artist(target);
    let include_budget = ((0.4 * target as f64).floor() as usize).min(target);
    let per_include_cap = tracks_per_include_artist(target, criteria.include_artists.len(), max_per_artist);

    let mut selected: Vec<Track> = Vec::new();
    let mut selected_ids: HashSet<String> = HashSet::new();
    let mut selected_names: HashSet<(String, String)> = HashSet::new();
    let mut artist_counts: HashMap<String, usize> = HashMap::new();
    let mut include_total = 0usize;

    // Pass 1: include-artist budget.
    if !criteria.include_artists.is_empty() {
        for artist in &criteria.include_artists {
            let mut taken = 0usize;
            for st in scored.iter().filter(|st| &st.track.primary_artist == artist) {
                if taken >= per_include_cap || include_total >= include_budget {
                    break;
                }
                if st.score < INCOMPATIBLE_FLOOR {
                    continue;
                }
                let dedup_key = normalized_dedup_key(&st.track);
                if selected_ids.contains(&st.track.id) || selected_names.contains(&dedup_key) {
                    continue;
                }
                selected.push(st.track.clone());
                selected_ids.insert(st.track.id.clone());
                selected_names.insert(dedup_key);
                *artist_counts.entry(artist.clone()).or_insert(0) += 1;
                taken += 1;
                include_total += 1;
                if selected.len() >= target {
                    break;
                }
            }
            if selected.len() >= target {
                break;
            }
        }
    }

    // Pass 2: fill remaining slots in score order.
    if selected.len() < target {
        for st in &scored {
            if selected.len() >= target {
                break;
            }
            if st.score < INCOMPATIBLE_FLOOR {
                continue;
            }
            if selected_ids.contains(&st.track.id) {
                continue;
            }
            let dedup_key = normalized_dedup_key(&st.track);
            if selected_names.contains(&dedup_key) {
                continue;
            }
            let count = artist_counts.get(&st.track.primary_artist).copied().unwrap_or(0);
            if count >= max_per_artist {
                continue;
            }
            selected.push(st.track.clone());
            selected_ids.insert(st.track.id.clone());
            selected_names.insert(dedup_key);
            *artist_counts.entry(st.track.primary_artist.clone()).or_insert(0) += 1;
        }
    }

    enforce_variety_floor(&mut selected, &scored, &mut artist_counts, target);

    selected
}

/// If unique-artist count falls below `max(10, N/3)`, swap over-represented
/// artists' lowest-scored tracks for next-best-scored tracks from untouched
/// artists until the bound is met or no swap is possible (§4.4). The
/// replacement is always drawn from an artist not yet present in `selected`,
/// so it can never itself breach the per-artist cap — nothing here needs to
/// re-check `max_per_artist`.
fn enforce_variety_floor(
    selected: &mut Vec<Track>,
    scored: &[ScoredTrack],
    artist_counts: &mut HashMap<String, usize>,
    target: usize,
) {
    let floor = (target / 3).max(10);
    let score_of = |id: &str| -> f64 { scored.iter().find(|st| st.track.id == id).map(|st| st.score).unwrap_or(f64::MIN) };

    loop {
        let unique: HashSet<&str> = selected.iter().map(|t| t.primary_artist.as_str()).collect();
        if unique.len() >= floor || unique.len() >= selected.len() {
            break;
        }
        let selected_ids: HashSet<String> = selected.iter().map(|t| t.id.clone()).collect();
        let touched_artists: HashSet<String> = selected.iter().map(|t| t.primary_artist.clone()).collect();

        let Some(replacement) = scored
            .iter()
            .find(|st| !selected_ids.contains(&st.track.id) && !touched_artists.contains(&st.track.primary_artist))
        else {
            break;
        };

        let mut worst_idx = None;
        let mut worst_score = f64::MAX;
        for (i, t) in selected.iter().enumerate() {
            let count = artist_counts.get(&t.primary_artist).copied().unwrap_or(0);
            if count < 2 {
                continue; // never swap an artist's only remaining slot below the floor needlessly
            }
            let s = score_of(&t.id);
            if s < worst_score {
                worst_score = s;
                worst_idx = Some(i);
            }
        }
        let Some(idx) = worst_idx else { break };

        let removed = selected[idx].clone();
        *artist_counts.entry(removed.primary_artist.clone()).or_insert(1) -= 1;
        selected[idx] = replacement.track.clone();
        *artist_counts.entry(replacement.track.primary_artist.clone()).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Provenance;

    fn track(id: &str, artist: &str, popularity: Option<u8>) -> Track {
        Track {
            id: id.into(),
            uri: format!("file:///{id}"),
            title: format!("Title {id}"),
            primary_artist: artist.into(),
            duration_ms: 200_000,
            bpm: Some(124.0),
            camelot_key: Some("8A".into()),
            energy: Some(6),
            popularity,
            play_count: Some(1),
            provenance: Provenance::CatalogSearch,
            genre: None,
            genre_family: None,
            decade: None,
            analysis_source: None,
        }
    }

    fn criteria(target: usize) -> MixCriteria {
        MixCriteria {
            include_artists: Default::default(),
            reference_artists: Default::default(),
            target_track_count: target,
            bpm_range: None,
            energy_range: None,
            energy_curve: None,
            genre_set: None,
            decade_set: None,
            excluded_artists: Default::default(),
            familiarity_preference: FamiliarityPreference::Any,
            seed: 0,
        }
    }

    #[test]
    fn s3_selection_variety() {
        let mut pool = Vec::new();
        for i in 0..50 {
            pool.push(track(&format!("a{i}"), "ArtistA", Some(50)));
        }
        for i in 0..50 {
            pool.push(track(&format!("b{i}"), "ArtistB", Some(50)));
        }
        let mut artist_idx = 0;
        for i in 0..100 {
            if i % 2 == 0 {
                artist_idx += 1;
            }
            pool.push(track(&format!("r{i}"), &format!("Rest{}", artist_idx % 50), Some(50)));
        }

        let c = criteria(30);
        let selected = select(&pool, &c, &RecentHistory::new(), &HashMap::new());

        let count_a = selected.iter().filter(|t| t.primary_artist == "ArtistA").count();
        let count_b = selected.iter().filter(|t| t.primary_artist == "ArtistB").count();
        assert!(count_a <= 2, "count_a = {count_a}");
        assert!(count_b <= 2, "count_b = {count_b}");

        let unique: HashSet<&str> = selected.iter().map(|t| t.primary_artist.as_str()).collect();
        assert!(unique.len() >= 10, "unique = {}", unique.len());
    }

    #[test]
    fn s4_include_budget() {
        let mut pool = Vec::new();
        pool.push(track("x0", "X", Some(50)));
        for i in 0..10 {
            pool.push(track(&format!("y{i}"), "Y", Some(50)));
        }
        for i in 0..10 {
            pool.push(track(&format!("z{i}"), "Z", Some(50)));
        }
        for i in 0..50 {
            pool.push(track(&format!("r{i}"), &format!("Rest{i}"), Some(50)));
        }

        let mut c = criteria(30);
        c.include_artists = ["X".to_string(), "Y".to_string(), "Z".to_string()].into_iter().collect();

        let selected = select(&pool, &c, &RecentHistory::new(), &HashMap::new());
        let from_include = selected
            .iter()
            .filter(|t| ["X", "Y", "Z"].contains(&t.primary_artist.as_str()))
            .count();
        assert!(from_include <= 12, "from_include = {from_include}");

        let count_x = selected.iter().filter(|t| t.primary_artist == "X").count();
        assert!(count_x <= 1);

        // §8 invariant 3: no artist — include or not — exceeds max_per_artist
        // (here max(2, ceil(30/15)) = 2), even though the raw per-include cap
        // (clamp(floor(0.4*30/3),1,3) = 3) would allow a third Y/Z track.
        let count_y = selected.iter().filter(|t| t.primary_artist == "Y").count();
        let count_z = selected.iter().filter(|t| t.primary_artist == "Z").count();
        assert!(count_y <= 2, "count_y = {count_y}");
        assert!(count_z <= 2, "count_z = {count_z}");
    }

    #[test]
    fn recently_used_tracks_are_penalized() {
        let pool = vec![track("t1", "A", Some(50)), track("t2", "B", Some(50))];
        let mut history = RecentHistory::new();
        history.insert("t1".to_string());
        let score1 = score_track(&pool[0], None, &criteria(2), &history, 0.0);
        let score2 = score_track(&pool[1], None, &criteria(2), &history, 0.0);
        assert!(score1 < score2);
    }

    #[test]
    fn genre_family_hard_fail_drops_tracks() {
        let mut t = track("t1", "A", Some(50));
        t.genre_family = Some("jazz".into());
        let mut c = criteria(1);
        c.genre_set = Some(["house".to_string()].into_iter().collect());
        let score = score_track(&t, None, &c, &RecentHistory::new(), 0.0);
        assert!(score < INCOMPATIBLE_FLOOR);
    }
}

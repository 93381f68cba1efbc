//! Top-level `plan()` pipeline: MixCriteria + candidate pool -> C4 -> C5 ->
//! C3 (lazy, fanned out) -> C6 -> MixPlan (§2 data flow, §5 concurrency).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analyzer::{self, cache, AnalysisReport};
use crate::criteria::{CriteriaError, MixCriteria, RecentHistory};
use crate::ordering;
use crate::selection;
use crate::track::{AnalysisSource, Track};
use crate::transition::{self, Transition};

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("no candidate tracks survived selection (insufficient pool)")]
    InsufficientPool,
    #[error("inconsistent constraint: {field}")]
    ConstraintInconsistent { field: String },
    #[error("plan cancelled")]
    Cancelled,
}

impl From<CriteriaError> for PlanError {
    fn from(e: CriteriaError) -> Self {
        let field = match e {
            CriteriaError::BpmRangeInverted { .. } => "bpmRange",
            CriteriaError::EnergyRangeInverted { .. } => "energyRange",
            CriteriaError::ZeroTargetCount => "targetTrackCount",
        };
        PlanError::ConstraintInconsistent { field: field.to_string() }
    }
}

/// Ordered sequence of Tracks with parallel Transitions, an aggregate energy
/// curve, and total duration (§3). Immutable once emitted. This is the
/// wire-format shape from §6 — it carries no analysis data of its own, so it
/// can be serialized as-is into the renderer spec's track list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixPlan {
    pub tracks: Vec<Track>,
    pub transitions: Vec<Transition>,
    pub energy_arc: Vec<f64>,
    pub total_duration: f64,
}

/// A completed `MixPlan` together with every `AnalysisReport` that went into
/// building it, keyed by track id. `plan()` returns this instead of a bare
/// `MixPlan` so callers (the CLI, the emitter) reuse the exact reports the
/// planner computed rather than re-deriving a partial view from the cache —
/// `preload_analyses` alone misses both `Embedded` tracks analyzed fresh this
/// run (if no cache dir is configured) and `None`-source tracks, whose
/// degraded `absent_report` mix points are never written to disk.
#[derive(Debug, Clone)]
pub struct PlannedMix {
    pub plan: MixPlan,
    pub analyses: HashMap<String, AnalysisReport>,
}

/// Cooperative cancellation, checked between component boundaries (§5).
/// Cloning shares the same underlying flag.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

fn check_cancel(cancel: &CancellationToken) -> Result<(), PlanError> {
    if cancel.is_cancelled() {
        Err(PlanError::Cancelled)
    } else {
        Ok(())
    }
}

/// Reports available without running C3: `Injected` sources, plus whatever
/// the content-addressed cache already has for `Embedded` sources. Selection
/// and ordering run against this partial view; full analysis of the
/// remaining tracks happens lazily, after ordering narrows the pool (§2, §9).
pub fn preload_analyses(pool: &[Track], analyzer_version: &str) -> HashMap<String, AnalysisReport> {
    let mut analyses = HashMap::new();
    for track in pool {
        match &track.analysis_source {
            Some(AnalysisSource::Injected { report }) => {
                analyses.insert(track.id.clone(), (**report).clone());
            }
            Some(AnalysisSource::Embedded { .. }) => {
                if let Some(cache) = cache::try_cache() {
                    if let Some(report) = cache.get(&track.id, analyzer_version) {
                        analyses.insert(track.id.clone(), report);
                    }
                }
            }
            None => {}
        }
    }
    analyses
}

/// Degraded report for a track whose audio can't be analyzed at all (no
/// `analysis_source`, or a decode failure) — every optional field reads as
/// absent, matching §7's "missing AnalysisReport" handling.
fn absent_report(track: &Track, analyzer_version: &str) -> AnalysisReport {
    use crate::analyzer::energy::EnergyCurve;
    use crate::analyzer::segments::{MixPoints, TransitionHints, TransitionType};

    let duration = track.duration_seconds();
    AnalysisReport {
        analyzer_version: analyzer_version.to_string(),
        bpm: 0.0,
        bpm_confidence: 0.0,
        key: String::new(),
        camelot_key: String::new(),
        energy: track.energy.unwrap_or(0),
        duration,
        beats: Vec::new(),
        downbeat_indices: Vec::new(),
        mix_points: MixPoints {
            intro_end: 0.0,
            mix_in_point: (duration * 0.1).min(duration),
            mix_out_point: (duration * 0.9).max((duration * 0.1) + 0.01),
            outro_start: duration,
            drop_point: None,
            breakdown_point: None,
        },
        segments: Vec::new(),
        energy_curve: EnergyCurve { samples: Vec::new(), sample_rate: 20 },
        transition_hints: TransitionHints {
            preferred_in_type: TransitionType::EqSwap,
            preferred_out_type: TransitionType::EqSwap,
            has_strong_drop: false,
            has_clean_outro: false,
            ideal_crossfade_bars: crate::analyzer::segments::crossfade_bars_for_genre(track.genre_family.as_deref()),
        },
    }
}

/// Fan out C3 across `jobs` workers for every track in `ordered` lacking an
/// analysis, joining results before returning (§5: analysis may parallelize,
/// C4/C5/C6 may not).
fn analyze_missing(ordered: &[Track], analyzer_version: &str, jobs: usize, analyses: &mut HashMap<String, AnalysisReport>) {
    let missing: Vec<&Track> = ordered.iter().filter(|t| !analyses.contains_key(&t.id)).collect();
    if missing.is_empty() {
        return;
    }

    log::info!("Analyzing {} tracks with {} workers", missing.len(), jobs);
    let pb = ProgressBar::new(missing.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs.max(1)).build();
    let results: Vec<(String, AnalysisReport)> = match pool {
        Ok(pool) => pool.install(|| {
            missing
                .par_iter()
                .map(|track| {
                    let result = (track.id.clone(), analyze_one(track, analyzer_version));
                    pb.inc(1);
                    result
                })
                .collect()
        }),
        Err(_) => missing
            .iter()
            .map(|track| {
                let result = (track.id.clone(), analyze_one(track, analyzer_version));
                pb.inc(1);
                result
            })
            .collect(),
    };
    pb.finish_and_clear();

    for (id, report) in results {
        analyses.insert(id, report);
    }
}

fn analyze_one(track: &Track, analyzer_version: &str) -> AnalysisReport {
    let genre_family = track.genre_family.as_deref();
    match &track.analysis_source {
        Some(AnalysisSource::Embedded { audio_path }) => {
            let compute = || analyzer::analyze_file(audio_path, genre_family, analyzer_version);
            let result = if let Some(cache) = cache::try_cache() {
                cache.get_or_compute(&track.id, analyzer_version, compute)
            } else {
                compute()
            };
            result.unwrap_or_else(|e| {
                log::warn!("analysis failed for {}: {e} — degrading to an absent report", track.id);
                absent_report(track, analyzer_version)
            })
        }
        Some(AnalysisSource::Injected { report }) => (**report).clone(),
        None => absent_report(track, analyzer_version),
    }
}

/// Build a MixPlan end to end: C4 (select) -> C5 (order) -> C3 (lazy
/// analysis of the ordered subset) -> C6 (transitions) (§2, §5, §7).
pub fn plan(
    pool: &[Track],
    criteria: &MixCriteria,
    recent_history: &RecentHistory,
    analyzer_version: &str,
    jobs: usize,
    cancel: &CancellationToken,
) -> Result<PlannedMix, PlanError> {
    criteria.validate()?;
    check_cancel(cancel)?;

    let preloaded = preload_analyses(pool, analyzer_version);
    let selected = selection::select(pool, criteria, recent_history, &preloaded);
    if selected.is_empty() {
        return Err(PlanError::InsufficientPool);
    }
    check_cancel(cancel)?;

    let ordered = ordering::order_with_criteria(&selected, &preloaded, criteria);

    let mut analyses = preloaded;
    analyze_missing(&ordered, analyzer_version, jobs, &mut analyses);
    check_cancel(cancel)?;

    let mut transitions = Vec::with_capacity(ordered.len().saturating_sub(1));
    for i in 0..ordered.len().saturating_sub(1) {
        check_cancel(cancel)?;
        let from = &ordered[i];
        let to = &ordered[i + 1];
        let from_report = analyses.get(&from.id).expect("ordered tracks are always analyzed above");
        let to_report = analyses.get(&to.id).expect("ordered tracks are always analyzed above");
        transitions.push(transition::plan_transition(i, from, from_report, i + 1, to, to_report));
    }

    let energy_arc = ordered.iter().map(|t| t.effective_energy(analyses.get(&t.id)).unwrap_or(0.0)).collect();
    let total_duration = ordered.iter().map(|t| t.duration_seconds()).sum();

    Ok(PlannedMix {
        plan: MixPlan { tracks: ordered, transitions, energy_arc, total_duration },
        analyses,
    })
}

//! C7: Mix Recipe Emitter. Serializes an ordered plan + transitions to the
//! renderer protocol (binary-stable JSON) and to a human-readable cue sheet
//! (§4.7, §6).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;

use crate::analyzer::segments::MixPoints;
use crate::analyzer::AnalysisReport;
use crate::plan::MixPlan;
use crate::transition::Transition;

/// EBU R128 targets the engine asks the `FilterGraphExecutor` to hit (§4.7, §6).
/// This crate never computes loudness itself — it only emits the fixed targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoudnessTarget {
    pub target_lufs: f64,
    pub true_peak_db: f64,
    pub lra: f64,
}

pub const LOUDNESS_TARGET: LoudnessTarget = LoudnessTarget { target_lufs: -14.0, true_peak_db: -1.0, lra: 11.0 };

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererTrack {
    pub id: String,
    pub uri: String,
    pub duration_sec: f64,
    pub mix_points: MixPoints,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererSpec {
    pub tracks: Vec<RendererTrack>,
    pub transitions: Vec<Transition>,
    pub energy_arc: Vec<f64>,
    pub total_duration: f64,
    pub loudness: LoudnessTarget,
}

/// Build the binary-stable renderer spec from a completed plan (§4.7, §6).
pub fn renderer_spec(plan: &MixPlan, analyses: &HashMap<String, AnalysisReport>) -> RendererSpec {
    let tracks = plan
        .tracks
        .iter()
        .map(|t| RendererTrack {
            id: t.id.clone(),
            uri: t.uri.clone(),
            duration_sec: t.duration_seconds(),
            mix_points: analyses
                .get(&t.id)
                .map(|r| r.mix_points.clone())
                .unwrap_or(MixPoints {
                    intro_end: 0.0,
                    mix_in_point: 0.0,
                    mix_out_point: t.duration_seconds(),
                    outro_start: t.duration_seconds(),
                    drop_point: None,
                    breakdown_point: None,
                }),
        })
        .collect();

    RendererSpec {
        tracks,
        transitions: plan.transitions.clone(),
        energy_arc: plan.energy_arc.clone(),
        total_duration: plan.total_duration,
        loudness: LOUDNESS_TARGET,
    }
}

/// Render a human-readable cue sheet: per-track header plus per-transition
/// cue-time lines (§4.7).
pub fn cue_sheet(plan: &MixPlan, analyses: &HashMap<String, AnalysisReport>) -> String {
    let mut out = String::new();
    let mut cumulative = 0.0;

    for (i, track) in plan.tracks.iter().enumerate() {
        let key = track.camelot_key.as_deref().unwrap_or("?");
        let bpm = analyses
            .get(&track.id)
            .and_then(|r| r.bpm_or_none())
            .or(track.bpm)
            .map(|b| format!("{b:.1}"))
            .unwrap_or_else(|| "?".to_string());

        let _ = writeln!(
            out,
            "{:>2}. [{:>6.1}] {} — {} ({} BPM, {})",
            i + 1,
            cumulative / 60.0,
            track.primary_artist,
            track.title,
            bpm,
            key,
        );

        if let Some(t) = plan.transitions.get(i) {
            let _ = writeln!(
                out,
                "      -> {:?} @ {:.1}s in / {:.1}s out, {:.1}s crossfade",
                t.style, t.from_cue_sec, t.to_cue_sec, t.duration_sec
            );
            if !t.notes.is_empty() {
                for note in &t.notes {
                    let _ = writeln!(out, "      note: {note}");
                }
            }
        }

        cumulative += track.duration_seconds();
    }

    let _ = writeln!(out, "\nTotal duration: {:.1} min", plan.total_duration / 60.0);
    if let Some(difficulty) = crate::transition::mix_difficulty(&plan.transitions) {
        let _ = writeln!(out, "Mix difficulty: {difficulty:?}");
    }

    out
}

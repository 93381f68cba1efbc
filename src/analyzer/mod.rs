//! C3: beat & segment analyzer. Consumes decoded PCM and produces tempo,
//! beats, downbeats, an energy curve, labeled segments, mix points, and
//! transition hints (§4.3). Orchestrates the leaf DSP modules and never
//! fails fatally — a weak or undecodable signal degrades to a low-confidence
//! `AnalysisReport` per §4.3's failure mode / §7's `AnalysisFailed`.

pub mod beats;
pub mod cache;
pub mod decode;
pub mod energy;
pub mod key;
pub mod onset;
pub mod segments;
pub mod tempo;

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use self::energy::EnergyCurve;
use self::segments::{MixPoints, Segment, TransitionHints};

/// Analysis rate PCM is resampled to before any DSP stage runs (§4.3).
pub const ANALYSIS_RATE_HZ: u32 = 22050;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("decode error: {0}")]
    Decode(#[from] decode::DecodeError),
}

/// Outputs of C3 for a single track, wire-compatible with §6's JSON format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub analyzer_version: String,
    pub bpm: f64,
    pub bpm_confidence: f64,
    /// Musical key in common notation (e.g. `"Am"`), may be empty if undetected.
    #[serde(default)]
    pub key: String,
    pub camelot_key: String,
    /// Catalog-style energy rating, 1..10 (§3's "effective energy" rescales this).
    pub energy: u8,
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub beats: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub downbeat_indices: Vec<usize>,
    pub mix_points: MixPoints,
    pub segments: Vec<Segment>,
    pub energy_curve: EnergyCurve,
    pub transition_hints: TransitionHints,
}

impl AnalysisReport {
    /// `None` when `bpm == 0` (the weak-signal failure mode — no usable tempo).
    pub fn bpm_or_none(&self) -> Option<f64> {
        if self.bpm > 0.0 {
            Some(self.bpm)
        } else {
            None
        }
    }

    pub fn camelot_key_or_none(&self) -> Option<&str> {
        if self.camelot_key.is_empty() {
            None
        } else {
            Some(&self.camelot_key)
        }
    }
}

/// Run the full C3 pipeline on a decoded-from-disk track. Never returns
/// `Err` for a weak/silent signal — only for I/O/decode failures, which
/// callers should treat as `AnalysisFailed` (log and skip, per §7) rather
/// than aborting the whole plan.
pub fn analyze_file(path: &Path, genre_family: Option<&str>, analyzer_version: &str) -> Result<AnalysisReport, AnalyzeError> {
    let decoded = decode::load_audio(path)?;
    let pcm = decode::resample_to(&decoded.samples, decoded.sample_rate, ANALYSIS_RATE_HZ);
    let duration = pcm.len() as f64 / ANALYSIS_RATE_HZ as f64;
    Ok(analyze_pcm(&pcm, ANALYSIS_RATE_HZ, duration, genre_family, analyzer_version))
}

/// Run the full C3 pipeline on already-decoded mono PCM at [`ANALYSIS_RATE_HZ`].
/// Pure and deterministic: identical input yields a bit-identical report (§4.3).
pub fn analyze_pcm(pcm: &[f32], sample_rate: u32, duration: f64, genre_family: Option<&str>, analyzer_version: &str) -> AnalysisReport {
    let envelope = onset::compute(pcm, sample_rate);
    let tempo_estimate = tempo::estimate(&envelope);

    let energy_curve = energy::compute(pcm, sample_rate, energy::DEFAULT_SAMPLE_RATE_HZ);

    let beats = beats::place_beats(&envelope, tempo_estimate.bpm, duration);
    let downbeats = beats::place_downbeats(&beats, &envelope);

    let segs = segments::segment_track(&beats, &downbeats, &energy_curve, duration);
    let mix_points = segments::build_mix_points(&segs, &beats, &downbeats, duration);
    let transition_hints = segments::build_transition_hints(&segs, genre_family);

    let key_estimate = key::estimate(pcm, sample_rate);
    let camelot_key = key_estimate.as_ref().map(|k| k.camelot.to_string()).unwrap_or_default();
    let key_label = key_estimate.map(|k| crate::camelot::traditional_notation(&k.camelot)).unwrap_or_default();

    let energy_rating = (energy_curve.average() * 10.0).round().clamp(0.0, 10.0) as u8;

    AnalysisReport {
        analyzer_version: analyzer_version.to_string(),
        bpm: tempo_estimate.bpm,
        bpm_confidence: tempo_estimate.confidence,
        key: key_label,
        camelot_key,
        energy: energy_rating,
        duration,
        beats,
        downbeat_indices: downbeats,
        mix_points,
        segments: segs,
        energy_curve,
        transition_hints,
    }
}

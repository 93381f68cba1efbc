//! Normalized track model. Carries fields from whichever provenance supplied
//! it (professional analysis, catalog API, library match, catalog search)
//! behind one uniform shape — see `Provenance`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::analyzer::AnalysisReport;

/// Where a track's metadata originated. The engine treats all provenances
/// uniformly downstream; this tag exists for diagnostics and for the
/// in-library / professionally-analyzed selection bonus (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Provenance {
    ProfessionalAnalysis,
    CatalogApi,
    LibraryMatch,
    CatalogSearch,
}

/// How the analyzer should obtain PCM/analysis for this track.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum AnalysisSource {
    /// Decode the file at this path and run the analyzer (C3) on it.
    Embedded { audio_path: PathBuf },
    /// A pre-computed report, supplied instead of raw audio.
    Injected { report: Box<AnalysisReport> },
}

/// Immutable-after-analysis track record (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub uri: String,
    pub title: String,
    pub primary_artist: String,
    pub duration_ms: u64,

    #[serde(default)]
    pub bpm: Option<f64>,
    #[serde(default)]
    pub camelot_key: Option<String>,
    /// Catalog-style rating on a 1..10 scale, matching `MixCriteria.energyRange`.
    #[serde(default)]
    pub energy: Option<u8>,
    #[serde(default)]
    pub popularity: Option<u8>,
    #[serde(default)]
    pub play_count: Option<u32>,

    #[serde(default = "default_provenance")]
    pub provenance: Provenance,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub genre_family: Option<String>,
    #[serde(default)]
    pub decade: Option<u32>,

    #[serde(default)]
    pub analysis_source: Option<AnalysisSource>,
}

fn default_provenance() -> Provenance {
    Provenance::CatalogSearch
}

impl Track {
    pub fn duration_seconds(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }

    /// `analysis.bpm` if present, else the criteria-provided `bpm` field.
    pub fn effective_bpm(&self, analysis: Option<&AnalysisReport>) -> Option<f64> {
        analysis.and_then(|a| a.bpm_or_none()).or(self.bpm)
    }

    /// Rescales the 1..10 catalog energy rating into `[0,1]`.
    pub fn effective_energy(&self, analysis: Option<&AnalysisReport>) -> Option<f64> {
        let raw = analysis.map(|a| a.energy).or(self.energy)?;
        Some((raw as f64 / 10.0).clamp(0.0, 1.0))
    }

    pub fn is_in_library(&self) -> bool {
        self.play_count.map(|c| c > 0).unwrap_or(false)
            || self.provenance == Provenance::ProfessionalAnalysis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> Track {
        Track {
            id: "t1".into(),
            uri: "file:///t1.flac".into(),
            title: "Track One".into(),
            primary_artist: "Artist".into(),
            duration_ms: 200_000,
            bpm: Some(120.0),
            camelot_key: Some("8A".into()),
            energy: Some(7),
            popularity: None,
            play_count: None,
            provenance: Provenance::CatalogSearch,
            genre: None,
            genre_family: None,
            decade: None,
            analysis_source: None,
        }
    }

    #[test]
    fn effective_energy_rescales_from_ten_scale() {
        let t = track();
        assert_eq!(t.effective_energy(None), Some(0.7));
    }

    #[test]
    fn effective_bpm_falls_back_to_track_field() {
        let t = track();
        assert_eq!(t.effective_bpm(None), Some(120.0));
    }
}

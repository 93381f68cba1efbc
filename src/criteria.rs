//! `MixCriteria` — the structured output of the (out-of-scope) natural-language
//! constraint extractor. Unspecified fields mean "unconstrained".

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnergyCurveTag {
    Build,
    Drop,
    Wave,
    Steady,
    PeakMiddle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FamiliarityPreference {
    Hits,
    DeepCuts,
    Any,
}

impl Default for FamiliarityPreference {
    fn default() -> Self {
        FamiliarityPreference::Any
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BpmRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyRange {
    pub min: u8,
    pub max: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixCriteria {
    #[serde(default)]
    pub include_artists: HashSet<String>,
    #[serde(default)]
    pub reference_artists: HashSet<String>,
    pub target_track_count: usize,
    #[serde(default)]
    pub bpm_range: Option<BpmRange>,
    #[serde(default)]
    pub energy_range: Option<EnergyRange>,
    #[serde(default)]
    pub energy_curve: Option<EnergyCurveTag>,
    #[serde(default)]
    pub genre_set: Option<HashSet<String>>,
    #[serde(default)]
    pub decade_set: Option<HashSet<u32>>,
    #[serde(default)]
    pub excluded_artists: HashSet<String>,
    #[serde(default)]
    pub familiarity_preference: FamiliarityPreference,
    /// PRNG seed for the variety-jitter selection term. Default 0, matching
    /// the deterministic-test default in §5.
    #[serde(default)]
    pub seed: u64,
}

/// Fields that, if inconsistent, fail the call up front per §7
/// (`ConstraintInconsistent`).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CriteriaError {
    #[error("bpmRange.max ({max}) < bpmRange.min ({min})")]
    BpmRangeInverted { min: String, max: String },
    #[error("energyRange.max ({max}) < energyRange.min ({min})")]
    EnergyRangeInverted { min: u8, max: u8 },
    #[error("targetTrackCount must be > 0")]
    ZeroTargetCount,
}

impl MixCriteria {
    /// A fully unconstrained criteria set targeting `target_track_count`
    /// tracks, used by callers (and tests) that only need ordering/transition
    /// logic without a real constraint-extraction result.
    pub fn unconstrained(target_track_count: usize) -> Self {
        MixCriteria {
            include_artists: Default::default(),
            reference_artists: Default::default(),
            target_track_count,
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

    pub fn validate(&self) -> Result<(), CriteriaError> {
        if self.target_track_count == 0 {
            return Err(CriteriaError::ZeroTargetCount);
        }
        if let Some(r) = &self.bpm_range {
            if r.max < r.min {
                return Err(CriteriaError::BpmRangeInverted {
                    min: r.min.to_string(),
                    max: r.max.to_string(),
                });
            }
        }
        if let Some(r) = &self.energy_range {
            if r.max < r.min {
                return Err(CriteriaError::EnergyRangeInverted {
                    min: r.min,
                    max: r.max,
                });
            }
        }
        Ok(())
    }
}

/// Set of track ids a track should be penalized for repeating (§4.4).
pub type RecentHistory = HashSet<String>;

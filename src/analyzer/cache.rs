//! Content-addressed `AnalysisReport` cache, keyed by `(track.id,
//! analyzer-version)` (§3 "Lifecycles", §5 "Shared resources", §9).
//!
//! This is the crate's only process-wide mutable state. `init()` must be
//! called once at startup (mirrors the model repo's `bands::init()` /
//! `bands::registry()` pattern); `cache()` returns the process-wide handle.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use super::{AnalysisReport, AnalyzeError};

static CACHE: OnceLock<AnalysisCache> = OnceLock::new();

/// Initialize the global analysis cache. Panics if called more than once.
pub fn init(dir: PathBuf) {
    fs::create_dir_all(&dir).ok();
    CACHE
        .set(AnalysisCache::new(dir))
        .unwrap_or_else(|_| panic!("AnalysisCache already initialized"));
}

/// Get the global analysis cache. Panics if [`init`] has not been called.
pub fn cache() -> &'static AnalysisCache {
    CACHE.get().expect("AnalysisCache not initialized — call analyzer::cache::init() first")
}

/// Get the global analysis cache if it has been initialized. Callers that
/// can run uncached (tests, library embedders without a configured cache
/// directory) should prefer this over [`cache`].
pub fn try_cache() -> Option<&'static AnalysisCache> {
    CACHE.get()
}

pub struct AnalysisCache {
    dir: PathBuf,
    /// Per-key locks enforcing single-writer-per-key (§5). Distinct keys
    /// never contend; the outer mutex only guards map insertion.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AnalysisCache {
    fn new(dir: PathBuf) -> Self {
        AnalysisCache { dir, locks: Mutex::new(HashMap::new()) }
    }

    fn key(track_id: &str, analyzer_version: &str) -> String {
        format!("{track_id}-{analyzer_version}")
    }

    fn path_for(&self, track_id: &str, analyzer_version: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::key(track_id, analyzer_version)))
    }

    fn per_key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Load a cached report, if present and parseable.
    pub fn get(&self, track_id: &str, analyzer_version: &str) -> Option<AnalysisReport> {
        let path = self.path_for(track_id, analyzer_version);
        let bytes = fs::read(path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Persist a report under its `(track_id, analyzer_version)` key.
    pub fn put(&self, track_id: &str, analyzer_version: &str, report: &AnalysisReport) {
        let path = self.path_for(track_id, analyzer_version);
        match serde_json::to_vec_pretty(report) {
            Ok(bytes) => {
                if let Err(e) = fs::write(&path, bytes) {
                    log::warn!("failed to write analysis cache {}: {e}", path.display());
                }
            }
            Err(e) => log::warn!("failed to serialize analysis report for {track_id}: {e}"),
        }
    }

    /// Return a cached report, or compute, store, and return a fresh one.
    /// Serializes concurrent computations for the same key (§5).
    pub fn get_or_compute<F>(
        &self,
        track_id: &str,
        analyzer_version: &str,
        compute: F,
    ) -> Result<AnalysisReport, AnalyzeError>
    where
        F: FnOnce() -> Result<AnalysisReport, AnalyzeError>,
    {
        let key = Self::key(track_id, analyzer_version);
        let lock = self.per_key_lock(&key);
        let _guard = lock.lock().unwrap();

        if let Some(cached) = self.get(track_id, analyzer_version) {
            log::debug!("analysis cache hit for {track_id}");
            return Ok(cached);
        }
        log::debug!("analysis cache miss for {track_id}, computing");
        let report = compute()?;
        self.put(track_id, analyzer_version, &report);
        Ok(report)
    }

    /// Explicit flush point for shutdown (§9 "tear down with an explicit
    /// flush"). The cache writes synchronously on every `put`, so this is a
    /// no-op beyond confirming the directory is still reachable — kept as a
    /// named call site so shutdown sequencing stays explicit if a future
    /// write-behind cache is introduced.
    pub fn flush(&self) {
        if let Err(e) = fs::metadata(&self.dir) {
            log::warn!("analysis cache directory {} unreachable at flush: {e}", self.dir.display());
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::segments::{MixPoints, TransitionHints, TransitionType};

    fn sample_report() -> AnalysisReport {
        AnalysisReport {
            analyzer_version: "3".into(),
            bpm: 124.0,
            bpm_confidence: 0.87,
            key: "Am".into(),
            camelot_key: "8A".into(),
            energy: 7,
            duration: 312.4,
            beats: vec![0.0, 0.5, 1.0],
            downbeat_indices: vec![0],
            mix_points: MixPoints {
                intro_end: 16.1,
                mix_in_point: 32.3,
                mix_out_point: 286.0,
                outro_start: 296.0,
                drop_point: Some(96.2),
                breakdown_point: Some(192.5),
            },
            segments: vec![],
            energy_curve: crate::analyzer::energy::EnergyCurve { samples: vec![0.1, 0.2], sample_rate: 20 },
            transition_hints: TransitionHints {
                preferred_in_type: TransitionType::FilterSweep,
                preferred_out_type: TransitionType::EchoOut,
                has_strong_drop: true,
                has_clean_outro: true,
                ideal_crossfade_bars: 32,
            },
        }
    }

    #[test]
    fn roundtrips_through_disk() {
        let dir = std::env::temp_dir().join(format!("mixforge-cache-test-{}", std::process::id()));
        let cache = AnalysisCache::new(dir.clone());
        let report = sample_report();

        let mut calls = 0;
        let first = cache
            .get_or_compute("track-1", "3", || {
                calls += 1;
                Ok(report.clone())
            })
            .unwrap();
        let second = cache
            .get_or_compute("track-1", "3", || {
                calls += 1;
                Ok(report.clone())
            })
            .unwrap();

        assert_eq!(calls, 1);
        assert_eq!(first.bpm, second.bpm);
        std::fs::remove_dir_all(&dir).ok();
    }
}

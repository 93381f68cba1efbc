pub mod analyzer;
pub mod camelot;
pub mod config;
pub mod criteria;
pub mod ordering;
pub mod plan;
pub mod recipe;
pub mod rng;
pub mod selection;
pub mod track;
pub mod transition;

/// Audio file extensions the decoder will attempt to open.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "wav", "m4a", "aac"];

/// Application name for XDG paths.
pub const APP_NAME: &str = "mixforge";

/// Version tag embedded in `AnalysisReport.analyzerVersion` and cache file names.
/// Bump this whenever the analyzer's output would change for the same PCM input.
pub const ANALYZER_VERSION: &str = "3";

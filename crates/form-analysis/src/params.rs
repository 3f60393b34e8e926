use serde::{Deserialize, Serialize};

/// Tunable parameters for the analysis pipeline.
///
/// Defaults were chosen against the reference corpus rather than derived;
/// every field is a documented knob, not a discovered constant. Passed
/// explicitly into each detector so test runs stay deterministic and
/// parameterized — nothing reads ambient state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    /// Key-detection window length in seconds
    pub key_window_secs: f64,
    /// Hop between key windows as a fraction of the window (0.5 = 50% overlap)
    pub key_hop_fraction: f64,

    /// Notes per thematic-analysis window
    pub theme_window_notes: usize,
    /// Similarity above which two windows join the same theme cluster
    pub theme_similarity_threshold: f64,
    /// Notes/second at or above which a window reads as rhythmic
    pub rhythmic_density_min: f64,
    /// Pitch range (semitones) at or below which a window reads as narrow
    pub narrow_range_max: u8,
    /// Notes/second at or below which a window reads as lyrical
    pub lyrical_density_max: f64,
    /// Pitch range (semitones) at or above which a window reads as wide
    pub wide_range_min: u8,

    /// Bass-onset gap (seconds) that marks a candidate phrase boundary
    pub cadence_pause_secs: f64,
    /// Note duration (seconds) treated as a phrase-final long note
    pub cadence_long_note_secs: f64,
    /// Cadences closer together than this merge into one event
    pub cadence_merge_secs: f64,

    /// Expected end of the exposition as a fraction of total duration
    pub expo_end_fraction: f64,
    /// Expected end of the development as a fraction of total duration
    pub dev_end_fraction: f64,
    /// Maximum span fraction for an opening area to count as an introduction
    pub intro_max_fraction: f64,
    /// Radius (seconds) within which boundaries snap to cadence evidence
    pub boundary_snap_secs: f64,

    /// Weight of proportion-prior fit in section confidence
    pub weight_prior: f64,
    /// Weight of key-area confidence overlap in section confidence
    pub weight_key: f64,
    /// Weight of cadence support in section confidence
    pub weight_cadence: f64,

    /// Upper bound on the number of generated insight strings
    pub insight_limit: usize,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            key_window_secs: 6.0,
            key_hop_fraction: 0.5,

            theme_window_notes: 8,
            theme_similarity_threshold: 0.75,
            rhythmic_density_min: 3.0,
            narrow_range_max: 12,
            lyrical_density_max: 1.5,
            wide_range_min: 9,

            cadence_pause_secs: 0.75,
            cadence_long_note_secs: 1.2,
            cadence_merge_secs: 0.5,

            expo_end_fraction: 0.35,
            dev_end_fraction: 0.70,
            intro_max_fraction: 0.15,
            boundary_snap_secs: 4.0,

            weight_prior: 0.4,
            weight_key: 0.4,
            weight_cadence: 0.2,

            insight_limit: 8,
        }
    }
}

impl AnalysisParams {
    /// Hop between key windows in seconds.
    pub fn key_hop_secs(&self) -> f64 {
        (self.key_window_secs * self.key_hop_fraction).max(0.1)
    }
}

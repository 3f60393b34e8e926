use serde::{Deserialize, Serialize};

const NOTE_NAMES_SHARP: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const NOTE_NAMES_FLAT: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Pitch classes conventionally spelled with flats.
const FLAT_ROOTS: [u8; 6] = [1, 3, 5, 6, 8, 10]; // Db, Eb, F, Gb, Ab, Bb

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    Major,
    Minor,
}

impl std::fmt::Display for KeyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMode::Major => write!(f, "major"),
            KeyMode::Minor => write!(f, "minor"),
        }
    }
}

/// A tonal center: root pitch class (C=0 .. B=11) and mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub root_pc: u8,
    pub mode: KeyMode,
}

impl Key {
    pub fn new(root_pc: u8, mode: KeyMode) -> Self {
        Self {
            root_pc: root_pc % 12,
            mode,
        }
    }

    /// Root name with conventional flat/sharp spelling.
    pub fn root_name(&self) -> &'static str {
        if FLAT_ROOTS.contains(&self.root_pc) {
            NOTE_NAMES_FLAT[self.root_pc as usize]
        } else {
            NOTE_NAMES_SHARP[self.root_pc as usize]
        }
    }

    /// Fifth scale degree's pitch class.
    pub fn dominant_pc(&self) -> u8 {
        (self.root_pc + 7) % 12
    }

    /// Pitch classes of the tonic triad (root, third, fifth).
    pub fn tonic_triad(&self) -> [u8; 3] {
        let third = match self.mode {
            KeyMode::Major => 4,
            KeyMode::Minor => 3,
        };
        [
            self.root_pc,
            (self.root_pc + third) % 12,
            (self.root_pc + 7) % 12,
        ]
    }

    /// True when `other` is the dominant key of `self`.
    pub fn is_dominant_of(&self, other: &Key) -> bool {
        self.root_pc == other.dominant_pc()
    }

    /// True when `self` is minor and `other` is its relative major.
    pub fn is_relative_major_of(&self, other: &Key) -> bool {
        other.mode == KeyMode::Minor
            && self.mode == KeyMode::Major
            && self.root_pc == (other.root_pc + 3) % 12
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.root_name(), self.mode)
    }
}

/// A note with onset and duration re-expressed in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedNote {
    pub pitch: u8,
    pub onset: f64,
    pub duration: f64,
    pub velocity: f32,
}

impl TimedNote {
    pub fn end(&self) -> f64 {
        self.onset + self.duration
    }

    pub fn pitch_class(&self) -> u8 {
        self.pitch % 12
    }
}

/// A contiguous span governed by a single tonal center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyArea {
    pub key: Key,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds (always > start)
    pub end: f64,
    /// Mean template correlation of the constituent windows, in [0, 1]
    pub confidence: f64,
    /// Number of analysis windows merged into this area
    pub window_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeCharacter {
    Lyrical,
    Rhythmic,
    Developmental,
}

impl std::fmt::Display for ThemeCharacter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThemeCharacter::Lyrical => write!(f, "lyrical"),
            ThemeCharacter::Rhythmic => write!(f, "rhythmic"),
            ThemeCharacter::Developmental => write!(f, "developmental"),
        }
    }
}

/// A window of melodic material assigned to a recurrence cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThematicBlock {
    /// Cluster label ("T1", "T2", ...) in order of first appearance
    pub label: String,
    pub start: f64,
    pub end: f64,
    pub character: ThemeCharacter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CadenceKind {
    Authentic,
    Half,
}

/// A harmonic cadence point. Presence is binary evidence; no confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cadence {
    pub kind: CadenceKind,
    /// Time in seconds (a point, not an interval)
    pub time: f64,
}

/// Sonata-form section roles in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionKind {
    Introduction,
    ExpositionTheme1,
    ExpositionTransition,
    ExpositionTheme2,
    ExpositionClosing,
    Development,
    RecapitulationTheme1,
    RecapitulationTransition,
    RecapitulationTheme2,
    RecapitulationClosing,
    Coda,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Introduction => "introduction",
            SectionKind::ExpositionTheme1 => "exposition-theme1",
            SectionKind::ExpositionTransition => "exposition-transition",
            SectionKind::ExpositionTheme2 => "exposition-theme2",
            SectionKind::ExpositionClosing => "exposition-closing",
            SectionKind::Development => "development",
            SectionKind::RecapitulationTheme1 => "recapitulation-theme1",
            SectionKind::RecapitulationTransition => "recapitulation-transition",
            SectionKind::RecapitulationTheme2 => "recapitulation-theme2",
            SectionKind::RecapitulationClosing => "recapitulation-closing",
            SectionKind::Coda => "coda",
        }
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A labeled structural section of the piece.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(rename = "type")]
    pub kind: SectionKind,
    pub start_time: f64,
    pub end_time: f64,
    pub confidence: f64,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub musical_key: Option<String>,
}

/// Terminal artifact of one analysis run. Owned by the caller; never
/// mutated by the pipeline after return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub sections: Vec<Section>,
    pub overall_confidence: f64,
    pub summary: String,
    pub musical_insights: Vec<String>,
    pub total_duration: f64,
}

/// Full pipeline output: the result plus the intermediate signals it was
/// fused from, for raw-signal reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreAnalysis {
    pub result: AnalysisResult,
    pub key_areas: Vec<KeyArea>,
    pub themes: Vec<ThematicBlock>,
    pub cadences: Vec<Cadence>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn key_names_use_conventional_spelling() {
        assert_eq!(Key::new(0, KeyMode::Major).to_string(), "C major");
        assert_eq!(Key::new(3, KeyMode::Minor).to_string(), "Eb minor");
        assert_eq!(Key::new(6, KeyMode::Major).to_string(), "Gb major");
        assert_eq!(Key::new(9, KeyMode::Minor).to_string(), "A minor");
    }

    #[test]
    fn dominant_and_triad() {
        let c_major = Key::new(0, KeyMode::Major);
        assert_eq!(c_major.dominant_pc(), 7);
        assert_eq!(c_major.tonic_triad(), [0, 4, 7]);

        let a_minor = Key::new(9, KeyMode::Minor);
        assert_eq!(a_minor.tonic_triad(), [9, 0, 4]);
    }

    #[test]
    fn key_relationships() {
        let c_major = Key::new(0, KeyMode::Major);
        let g_major = Key::new(7, KeyMode::Major);
        let a_minor = Key::new(9, KeyMode::Minor);

        assert!(g_major.is_dominant_of(&c_major));
        assert!(!c_major.is_dominant_of(&g_major));
        assert!(c_major.is_relative_major_of(&a_minor));
        assert!(!g_major.is_relative_major_of(&a_minor));
    }

    #[test]
    fn section_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&SectionKind::ExpositionTheme1).unwrap();
        assert_eq!(json, "\"exposition-theme1\"");
        let json = serde_json::to_string(&SectionKind::RecapitulationTransition).unwrap();
        assert_eq!(json, "\"recapitulation-transition\"");
    }

    #[test]
    fn section_serializes_camel_case_with_type_field() {
        let section = Section {
            kind: SectionKind::Development,
            start_time: 10.0,
            end_time: 20.0,
            confidence: 0.5,
            description: "Development".into(),
            musical_key: None,
        };
        let value = serde_json::to_value(&section).unwrap();
        assert_eq!(value["type"], "development");
        assert_eq!(value["startTime"], 10.0);
        assert!(value.get("musicalKey").is_none());
    }
}

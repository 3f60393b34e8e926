//! Sonata-form structural analysis over symbolic scores.
//!
//! The pipeline runs strictly left to right: note events are mapped to
//! real time, then key areas, thematic material, and cadences are detected
//! over the immutable timed notes, fused into a section sequence, and
//! aggregated into the terminal [`AnalysisResult`]. No state survives an
//! invocation and identical input yields byte-identical serialized output.

pub mod aggregate;
pub mod cadences;
pub mod key_areas;
pub mod params;
pub mod sections;
pub mod themes;
pub mod types;

pub use aggregate::aggregate;
pub use cadences::detect_cadences;
pub use key_areas::{detect_key_areas, merge_key_areas};
pub use params::AnalysisParams;
pub use sections::estimate_sections;
pub use themes::detect_themes;
pub use types::{
    AnalysisResult, Cadence, CadenceKind, Key, KeyArea, KeyMode, ScoreAnalysis, Section,
    SectionKind, ThematicBlock, ThemeCharacter, TimedNote,
};

use midi_score::{Note, ScoreContext, TimeMapper};

/// Fatal analysis errors. Weak signals (no cadences, sparse notes) are
/// absorbed as reduced confidence and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Unparseable or empty note data
    #[error("invalid input format: {0}")]
    InvalidInputFormat(String),

    /// Degenerate tempo data
    #[error("invalid tempo map: {0}")]
    InvalidTempoMap(#[from] midi_score::TimeMapError),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Analyze raw MIDI bytes end to end.
pub fn analyze_midi(midi_bytes: &[u8], params: &AnalysisParams) -> Result<ScoreAnalysis> {
    let (notes, context) = midi_score::extract_score(midi_bytes)
        .map_err(|e| AnalysisError::InvalidInputFormat(e.to_string()))?;
    analyze_score(&notes, &context, params)
}

/// Run the full pipeline over extracted note events.
///
/// Key-area and theme detection operate on disjoint views of the same
/// immutable data and run on scoped threads; cadence detection needs the
/// key context and runs after the join. The whole computation is
/// synchronous and performs no I/O.
pub fn analyze_score(
    notes: &[Note],
    context: &ScoreContext,
    params: &AnalysisParams,
) -> Result<ScoreAnalysis> {
    if notes.is_empty() {
        return Err(AnalysisError::InvalidInputFormat(
            "score contains no note events".to_string(),
        ));
    }

    let mapper = TimeMapper::new(&context.tempo_changes, context.ppq)?;

    let pitched: Vec<Note> = notes.iter().filter(|n| n.channel != 9).cloned().collect();
    if pitched.is_empty() {
        return Err(AnalysisError::InvalidInputFormat(
            "score contains no pitched note events".to_string(),
        ));
    }

    let timed = to_timed(&pitched, &mapper);
    let melody = to_timed(&midi_score::skyline(notes), &mapper);
    let bass = to_timed(&midi_score::bassline(notes), &mapper);

    let duration = timed
        .iter()
        .map(|n| n.end())
        .fold(mapper.seconds_at(context.total_ticks), f64::max);

    tracing::debug!(
        note_count = timed.len(),
        duration,
        "starting structural analysis"
    );

    let (key_areas, themes) = std::thread::scope(|scope| {
        let keys = scope.spawn(|| detect_key_areas(&timed, duration, params));
        let themes = scope.spawn(|| detect_themes(&melody, params));
        (join(keys), join(themes))
    });

    let cadences = detect_cadences(&bass, &timed, &key_areas, params);
    let sections = estimate_sections(&timed, &key_areas, &themes, &cadences, duration, params);
    let result = aggregate(sections, &key_areas, &themes, &cadences, duration, params);

    Ok(ScoreAnalysis {
        result,
        key_areas,
        themes,
        cadences,
    })
}

fn join<T>(handle: std::thread::ScopedJoinHandle<'_, T>) -> T {
    match handle.join() {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

fn to_timed(notes: &[Note], mapper: &TimeMapper) -> Vec<TimedNote> {
    notes
        .iter()
        .map(|n| {
            let onset = mapper.seconds_at(n.onset_tick);
            let end = mapper.seconds_at(n.offset_tick);
            TimedNote {
                pitch: n.pitch,
                onset,
                duration: (end - onset).max(0.0),
                velocity: n.velocity,
            }
        })
        .collect()
}

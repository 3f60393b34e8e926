pub mod extract;
pub mod note;
pub mod reduce;
pub mod timemap;

pub use extract::{extract_score, ScoreContext, TempoEvent, TimeSignatureEvent};
pub use note::Note;
pub use reduce::{bassline, skyline};
pub use timemap::{TimeMapError, TimeMapper};

/// Errors from MIDI score extraction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI parse error: {0}")]
    MidiParse(String),

    #[error("score contains no notes")]
    EmptyScore,
}

pub type Result<T> = std::result::Result<T, Error>;

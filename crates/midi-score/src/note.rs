use serde::{Deserialize, Serialize};

/// A single note event with absolute tick timing and source metadata.
///
/// Velocity is normalized to [0.0, 1.0] at extraction time so downstream
/// consumers never see raw MIDI velocity bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub onset_tick: u64,
    pub offset_tick: u64,
    pub pitch: u8,
    pub velocity: f32,
    pub channel: u8,
    pub track_index: usize,
}

impl Note {
    pub fn duration_ticks(&self) -> u64 {
        self.offset_tick.saturating_sub(self.onset_tick)
    }

    pub fn pitch_class(&self) -> u8 {
        self.pitch % 12
    }
}

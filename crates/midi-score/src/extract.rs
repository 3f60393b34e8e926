use crate::note::Note;
use midly::{MetaMessage, MidiMessage, Smf, TrackEventKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// MIDI default tempo: 120 BPM = 500,000 microseconds per quarter note.
const DEFAULT_USEC_PER_BEAT: u32 = 500_000;

/// Timing and metadata context extracted alongside the notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreContext {
    pub ppq: u16,
    pub format: u8,
    pub track_count: usize,
    pub tempo_changes: Vec<TempoEvent>,
    pub time_signatures: Vec<TimeSignatureEvent>,
    pub total_ticks: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoEvent {
    pub tick: u64,
    pub microseconds_per_beat: u32,
    pub bpm: f64,
}

impl TempoEvent {
    pub fn from_usec(tick: u64, microseconds_per_beat: u32) -> Self {
        Self {
            tick,
            microseconds_per_beat,
            bpm: 60_000_000.0 / microseconds_per_beat as f64,
        }
    }
}

/// Time signature meta event. Retained for phrase heuristics only;
/// never participates in tempo computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSignatureEvent {
    pub tick: u64,
    pub numerator: u8,
    pub denominator: u8,
}

/// Parse MIDI bytes and extract all notes plus timing context.
///
/// Note-on/note-off events are paired through per-(channel, pitch) stacks,
/// treating a vel=0 note-on as note-off. Notes left open at the end of a
/// track are closed at the track's final tick. A file with no tempo meta
/// event gets the MIDI-default 120 BPM at tick 0, so the returned tempo
/// map is never empty.
pub fn extract_score(midi_bytes: &[u8]) -> crate::Result<(Vec<Note>, ScoreContext)> {
    let smf = Smf::parse(midi_bytes).map_err(|e| crate::Error::MidiParse(e.to_string()))?;

    let ppq = match smf.header.timing {
        midly::Timing::Metrical(ticks) => ticks.as_int(),
        midly::Timing::Timecode(_, _) => 480,
    };

    let format = match smf.header.format {
        midly::Format::SingleTrack => 0,
        midly::Format::Parallel => 1,
        midly::Format::Sequential => 2,
    };

    let mut notes = Vec::new();
    let mut tempo_changes = Vec::new();
    let mut time_signatures = Vec::new();
    let mut total_ticks: u64 = 0;

    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut current_tick: u64 = 0;
        let mut pending: HashMap<(u8, u8), Vec<(u64, u8)>> = HashMap::new();

        for event in track {
            current_tick += event.delta.as_int() as u64;

            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                    tempo_changes.push(TempoEvent::from_usec(current_tick, tempo.as_int()));
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(num, denom_pow, _, _)) => {
                    time_signatures.push(TimeSignatureEvent {
                        tick: current_tick,
                        numerator: num,
                        denominator: 1u8 << denom_pow,
                    });
                }
                TrackEventKind::Midi { channel, message } => {
                    let ch = channel.as_int();
                    match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            pending
                                .entry((ch, key.as_int()))
                                .or_default()
                                .push((current_tick, vel.as_int()));
                        }
                        MidiMessage::NoteOff { key, .. } | MidiMessage::NoteOn { key, .. } => {
                            if let Some(stack) = pending.get_mut(&(ch, key.as_int())) {
                                if let Some((onset, velocity)) = stack.pop() {
                                    notes.push(Note {
                                        onset_tick: onset,
                                        offset_tick: current_tick,
                                        pitch: key.as_int(),
                                        velocity: velocity as f32 / 127.0,
                                        channel: ch,
                                        track_index,
                                    });
                                }
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }

            total_ticks = total_ticks.max(current_tick);
        }

        // Close unterminated notes at the track's final tick. Stack order
        // is irrelevant here because everything is re-sorted below.
        let mut leftover: Vec<(u8, u8, u64, u8)> = Vec::new();
        for ((ch, pitch), stack) in &pending {
            for &(onset, velocity) in stack {
                leftover.push((*ch, *pitch, onset, velocity));
            }
        }
        leftover.sort_unstable();
        for (ch, pitch, onset, velocity) in leftover {
            notes.push(Note {
                onset_tick: onset,
                offset_tick: current_tick,
                pitch,
                velocity: velocity as f32 / 127.0,
                channel: ch,
                track_index,
            });
        }
    }

    // Deterministic ordering: onset, then pitch, then track
    notes.sort_by(|a, b| {
        a.onset_tick
            .cmp(&b.onset_tick)
            .then(a.pitch.cmp(&b.pitch))
            .then(a.track_index.cmp(&b.track_index))
    });

    // Format-1 files may repeat tempo events across tracks
    tempo_changes.sort_by_key(|t: &TempoEvent| t.tick);
    tempo_changes
        .dedup_by(|a, b| a.tick == b.tick && a.microseconds_per_beat == b.microseconds_per_beat);

    if tempo_changes.is_empty() {
        tempo_changes.push(TempoEvent::from_usec(0, DEFAULT_USEC_PER_BEAT));
    }

    time_signatures.sort_by_key(|t: &TimeSignatureEvent| t.tick);
    time_signatures.dedup_by(|a, b| a.tick == b.tick);

    let total_ticks = total_ticks.max(notes.iter().map(|n| n.offset_tick).max().unwrap_or(0));

    let context = ScoreContext {
        ppq,
        format,
        track_count: smf.tracks.len(),
        tempo_changes,
        time_signatures,
        total_ticks,
    };

    Ok((notes, context))
}

use crate::note::Note;
use std::collections::BTreeMap;

/// MIDI channel 10 (0-indexed 9) is reserved for percussion.
const PERCUSSION_CHANNEL: u8 = 9;

/// Skyline reduction: the highest-pitched note at each onset.
///
/// Percussion-channel notes are excluded. The result approximates the
/// principal melodic line of a polyphonic texture.
pub fn skyline(notes: &[Note]) -> Vec<Note> {
    reduce_by_onset(notes, |best, candidate| candidate.pitch > best.pitch)
}

/// Bassline reduction: the lowest-pitched note at each onset.
pub fn bassline(notes: &[Note]) -> Vec<Note> {
    reduce_by_onset(notes, |best, candidate| candidate.pitch < best.pitch)
}

fn reduce_by_onset(notes: &[Note], prefer: impl Fn(&Note, &Note) -> bool) -> Vec<Note> {
    let mut by_onset: BTreeMap<u64, Note> = BTreeMap::new();

    for note in notes {
        if note.channel == PERCUSSION_CHANNEL {
            continue;
        }
        let replace = match by_onset.get(&note.onset_tick) {
            Some(best) => prefer(best, note),
            None => true,
        };
        if replace {
            by_onset.insert(note.onset_tick, note.clone());
        }
    }

    by_onset.into_values().collect()
}

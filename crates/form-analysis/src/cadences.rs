use crate::key_areas::key_area_at;
use crate::params::AnalysisParams;
use crate::types::{Cadence, CadenceKind, KeyArea, TimedNote};

/// Locate and classify harmonic cadence points.
///
/// Candidate phrase boundaries come from rhythmic pauses in the bass line,
/// phrase-final long notes, and key-area boundaries. At each candidate the
/// local bass root motion is read as scale degrees of the governing key:
/// dominant→tonic arrival on a tonic-triad sonority is authentic, a halt
/// on the dominant is a half cadence, anything else produces no event.
/// This is a precision-oriented filter — silence is the common case.
pub fn detect_cadences(
    bass: &[TimedNote],
    all_notes: &[TimedNote],
    key_areas: &[KeyArea],
    params: &AnalysisParams,
) -> Vec<Cadence> {
    if bass.len() < 2 || key_areas.is_empty() {
        return Vec::new();
    }

    let mut candidates: Vec<f64> = Vec::new();

    // Rhythmic pauses: a gap after a bass note marks its onset as phrase-final
    for pair in bass.windows(2) {
        if pair[1].onset - pair[0].end() > params.cadence_pause_secs {
            candidates.push(pair[0].onset);
        }
    }

    // Long note values
    for note in bass {
        if note.duration > params.cadence_long_note_secs {
            candidates.push(note.onset);
        }
    }

    // Key-area boundaries, snapped back to the nearest bass onset
    for area in &key_areas[..key_areas.len().saturating_sub(1)] {
        if let Some(note) = bass.iter().rev().find(|n| n.onset <= area.end) {
            candidates.push(note.onset);
        }
    }

    // Final bass onset always closes a phrase
    if let Some(last) = bass.last() {
        candidates.push(last.onset);
    }

    candidates.sort_by(|a, b| a.total_cmp(b));
    candidates.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

    let mut cadences: Vec<Cadence> = Vec::new();

    for &t in &candidates {
        let Some(area) = key_area_at(key_areas, t) else {
            continue;
        };

        if let Some(kind) = classify_at(bass, all_notes, t, area) {
            cadences.push(Cadence { kind, time: t });
        }
    }

    // Collapse near-coincident events; the earlier (already classified) wins
    cadences.dedup_by(|b, a| (b.time - a.time).abs() < params.cadence_merge_secs);

    tracing::debug!(cadence_count = cadences.len(), "detected cadences");
    cadences
}

/// Classify the harmonic motion arriving at candidate time `t`.
fn classify_at(
    bass: &[TimedNote],
    all_notes: &[TimedNote],
    t: f64,
    area: &KeyArea,
) -> Option<CadenceKind> {
    let arrival_idx = bass.iter().rposition(|n| n.onset <= t + 1e-9)?;
    let arrival = &bass[arrival_idx];

    // Previous bass note with a distinct onset
    let previous = bass[..arrival_idx]
        .iter()
        .rev()
        .find(|n| arrival.onset - n.onset > 1e-9)?;

    let tonic = area.key.root_pc;
    let dominant = area.key.dominant_pc();

    if previous.pitch_class() == dominant && arrival.pitch_class() == tonic {
        // Authentic requires the arrival sonority to sit inside the tonic triad
        let triad = area.key.tonic_triad();
        let sounding_ok = all_notes
            .iter()
            .filter(|n| n.onset <= arrival.onset + 1e-9 && n.end() > arrival.onset + 1e-9)
            .all(|n| triad.contains(&n.pitch_class()));

        if sounding_ok {
            return Some(CadenceKind::Authentic);
        }
    }

    if arrival.pitch_class() == dominant {
        return Some(CadenceKind::Half);
    }

    None
}

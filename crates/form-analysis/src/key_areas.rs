use crate::params::AnalysisParams;
use crate::types::{Key, KeyArea, KeyMode, TimedNote};

/// Krumhansl-Kessler major key profile (duration-weighted perception studies).
const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl-Kessler minor key profile.
const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Segment the piece into contiguous tonal regions.
///
/// Overlapping windows of `key_window_secs` advance by the hop; each
/// window builds a duration-weighted pitch-class profile and correlates
/// it against all 24 major/minor templates. A window without notes
/// inherits the previous window's key at zero confidence (dropped when it
/// is the first). Adjacent windows agreeing on key and mode merge into a
/// single area. The returned sequence tiles [0, duration] exactly.
pub fn detect_key_areas(
    notes: &[TimedNote],
    duration: f64,
    params: &AnalysisParams,
) -> Vec<KeyArea> {
    if duration <= 0.0 || notes.is_empty() {
        return Vec::new();
    }

    let window = params.key_window_secs.max(0.5);
    let hop = params.key_hop_secs();

    let mut areas: Vec<KeyArea> = Vec::new();
    let mut previous_key: Option<Key> = None;

    let mut start = 0.0_f64;
    while start < duration {
        let window_end = (start + window).min(duration);
        // Windows overlap for analysis, but each one owns a disjoint
        // hop-length span so the merged areas tile the timeline.
        let span_end = (start + hop).min(duration);

        let profile = pitch_class_profile(notes, start, window_end);
        let total: f64 = profile.iter().sum();

        let detected = if total > 0.0 {
            Some(best_key(&profile))
        } else {
            previous_key.map(|key| (key, 0.0))
        };

        if let Some((key, confidence)) = detected {
            previous_key = Some(key);
            if span_end > start {
                areas.push(KeyArea {
                    key,
                    start,
                    end: span_end,
                    confidence,
                    window_count: 1,
                });
            }
        }

        start += hop;
    }

    let mut merged = merge_key_areas(areas);

    // Clamp coverage to [0, duration]
    if let Some(first) = merged.first_mut() {
        first.start = 0.0;
    }
    if let Some(last) = merged.last_mut() {
        last.end = duration;
    }

    tracing::debug!(area_count = merged.len(), duration, "detected key areas");
    merged
}

/// Merge adjacent areas that agree on key and mode.
///
/// Merged confidence is the mean over all constituent windows, carried
/// through `window_count` so that merging an already-merged sequence is a
/// no-op (adjacent survivors always differ in key).
pub fn merge_key_areas(areas: Vec<KeyArea>) -> Vec<KeyArea> {
    let mut merged: Vec<KeyArea> = Vec::with_capacity(areas.len());

    for area in areas {
        match merged.last_mut() {
            Some(last) if last.key == area.key => {
                let total = last.window_count + area.window_count;
                last.confidence = (last.confidence * last.window_count as f64
                    + area.confidence * area.window_count as f64)
                    / total as f64;
                last.window_count = total;
                last.end = area.end;
            }
            _ => merged.push(area),
        }
    }

    merged
}

/// Governing key area at time `t` (the area containing `t`, or the last
/// area beginning before it).
pub fn key_area_at<'a>(areas: &'a [KeyArea], t: f64) -> Option<&'a KeyArea> {
    areas
        .iter()
        .rev()
        .find(|a| a.start <= t)
        .or_else(|| areas.first())
}

/// Duration-weighted 12-bin pitch-class profile over [start, end).
fn pitch_class_profile(notes: &[TimedNote], start: f64, end: f64) -> [f64; 12] {
    let mut profile = [0.0_f64; 12];
    for note in notes {
        let overlap = note.end().min(end) - note.onset.max(start);
        if overlap > 0.0 {
            profile[note.pitch_class() as usize] += overlap;
        }
    }
    profile
}

/// Best-correlating key template for a pitch-class profile.
fn best_key(profile: &[f64; 12]) -> (Key, f64) {
    let mut best = (Key::new(0, KeyMode::Major), -1.0_f64);

    for root in 0..12u8 {
        // Rotate so the candidate root sits at index 0
        let mut rotated = [0.0_f64; 12];
        for (i, slot) in rotated.iter_mut().enumerate() {
            *slot = profile[(i + root as usize) % 12];
        }

        let major = pearson(&rotated, &MAJOR_PROFILE);
        if major > best.1 {
            best = (Key::new(root, KeyMode::Major), major);
        }

        let minor = pearson(&rotated, &MINOR_PROFILE);
        if minor > best.1 {
            best = (Key::new(root, KeyMode::Minor), minor);
        }
    }

    (best.0, best.1.clamp(0.0, 1.0))
}

/// Pearson correlation coefficient between two 12-element arrays.
fn pearson(x: &[f64; 12], y: &[f64; 12]) -> f64 {
    let x_mean: f64 = x.iter().sum::<f64>() / 12.0;
    let y_mean: f64 = y.iter().sum::<f64>() / 12.0;

    let mut num = 0.0;
    let mut x_sq = 0.0;
    let mut y_sq = 0.0;

    for i in 0..12 {
        let xd = x[i] - x_mean;
        let yd = y[i] - y_mean;
        num += xd * yd;
        x_sq += xd * xd;
        y_sq += yd * yd;
    }

    let denom = (x_sq * y_sq).sqrt();
    if denom < 1e-10 {
        return 0.0;
    }
    num / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Scale notes looping over `pitches`, one per second.
    fn scale_notes(pitches: &[u8], start: f64, count: usize) -> Vec<TimedNote> {
        (0..count)
            .map(|i| TimedNote {
                pitch: pitches[i % pitches.len()],
                onset: start + i as f64,
                duration: 0.9,
                velocity: 0.7,
            })
            .collect()
    }

    const C_MAJOR_SCALE: [u8; 7] = [60, 62, 64, 65, 67, 69, 71];
    const G_MAJOR_SCALE: [u8; 7] = [67, 69, 71, 72, 74, 76, 78];

    #[test]
    fn empty_input_yields_no_areas() {
        let params = AnalysisParams::default();
        assert!(detect_key_areas(&[], 30.0, &params).is_empty());
    }

    #[test]
    fn single_key_piece_collapses_to_one_area() {
        let params = AnalysisParams::default();
        let notes = scale_notes(&C_MAJOR_SCALE, 0.0, 30);

        let areas = detect_key_areas(&notes, 30.0, &params);
        assert_eq!(areas.len(), 1);
        assert_eq!(areas[0].key, Key::new(0, KeyMode::Major));
        assert_eq!(areas[0].start, 0.0);
        assert_eq!(areas[0].end, 30.0);
        assert!(areas[0].confidence > 0.5);
    }

    #[test]
    fn modulation_produces_boundary_near_change() {
        let params = AnalysisParams::default();
        let mut notes = scale_notes(&C_MAJOR_SCALE, 0.0, 40);
        notes.extend(scale_notes(&G_MAJOR_SCALE, 40.0, 30));
        notes.extend(scale_notes(&C_MAJOR_SCALE, 70.0, 30));

        let areas = detect_key_areas(&notes, 100.0, &params);
        assert!(areas.len() >= 3, "expected >= 3 areas, got {:?}", areas);

        let g_area = areas
            .iter()
            .find(|a| a.key == Key::new(7, KeyMode::Major))
            .expect("G major area");
        assert!(
            (g_area.start - 40.0).abs() <= 3.0,
            "G area starts at {}",
            g_area.start
        );
        assert!(
            (g_area.end - 70.0).abs() <= 3.0,
            "G area ends at {}",
            g_area.end
        );
    }

    #[test]
    fn areas_tile_duration_without_gaps() {
        let params = AnalysisParams::default();
        let mut notes = scale_notes(&C_MAJOR_SCALE, 0.0, 20);
        notes.extend(scale_notes(&G_MAJOR_SCALE, 20.0, 20));

        let areas = detect_key_areas(&notes, 40.0, &params);
        assert_eq!(areas.first().unwrap().start, 0.0);
        assert_eq!(areas.last().unwrap().end, 40.0);
        for pair in areas.windows(2) {
            assert!((pair[0].end - pair[1].start).abs() < 1e-9);
        }
    }

    #[test]
    fn merging_is_idempotent() {
        let params = AnalysisParams::default();
        let mut notes = scale_notes(&C_MAJOR_SCALE, 0.0, 25);
        notes.extend(scale_notes(&G_MAJOR_SCALE, 25.0, 25));

        let areas = detect_key_areas(&notes, 50.0, &params);
        let remerged = merge_key_areas(areas.clone());
        assert_eq!(areas, remerged);
    }

    #[test]
    fn silent_gap_inherits_previous_key() {
        let params = AnalysisParams::default();
        // Notes for the first 12s, silence 12-24s, notes again 24-36s
        let mut notes = scale_notes(&C_MAJOR_SCALE, 0.0, 12);
        notes.extend(scale_notes(&C_MAJOR_SCALE, 24.0, 12));

        let areas = detect_key_areas(&notes, 36.0, &params);
        // The silent middle inherits C major, so everything merges
        assert_eq!(areas.len(), 1);
        assert_eq!(areas[0].key, Key::new(0, KeyMode::Major));
    }

    #[test]
    fn key_area_lookup() {
        let areas = vec![
            KeyArea {
                key: Key::new(0, KeyMode::Major),
                start: 0.0,
                end: 10.0,
                confidence: 0.8,
                window_count: 3,
            },
            KeyArea {
                key: Key::new(7, KeyMode::Major),
                start: 10.0,
                end: 20.0,
                confidence: 0.7,
                window_count: 3,
            },
        ];

        assert_eq!(key_area_at(&areas, 5.0).unwrap().key.root_pc, 0);
        assert_eq!(key_area_at(&areas, 15.0).unwrap().key.root_pc, 7);
        assert_eq!(key_area_at(&areas, 25.0).unwrap().key.root_pc, 7);
    }

    #[test]
    fn pearson_self_correlation_is_one() {
        let r = pearson(&MAJOR_PROFILE, &MAJOR_PROFILE);
        assert!((r - 1.0).abs() < 1e-10);
    }
}

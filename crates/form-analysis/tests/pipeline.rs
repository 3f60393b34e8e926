//! End-to-end pipeline scenarios over synthetic scores.

use form_analysis::{analyze_score, AnalysisError, AnalysisParams, Key, KeyMode, SectionKind};
use midi_score::{Note, ScoreContext, TempoEvent};

const PPQ: u16 = 480;

const C_MAJOR_SCALE: [u8; 7] = [60, 62, 64, 65, 67, 69, 71];
const G_MAJOR_SCALE: [u8; 7] = [67, 69, 71, 72, 74, 76, 78];

/// One note per beat (0.5s at 120 BPM), looping over `pitches`.
fn beat_notes(pitches: &[u8], start_tick: u64, beats: usize) -> Vec<Note> {
    (0..beats)
        .map(|i| {
            let onset = start_tick + i as u64 * PPQ as u64;
            Note {
                onset_tick: onset,
                offset_tick: onset + 432,
                pitch: pitches[i % pitches.len()],
                velocity: 0.7,
                channel: 0,
                track_index: 0,
            }
        })
        .collect()
}

fn context_120bpm(total_ticks: u64) -> ScoreContext {
    ScoreContext {
        ppq: PPQ,
        format: 1,
        track_count: 1,
        tempo_changes: vec![TempoEvent::from_usec(0, 500_000)],
        time_signatures: vec![],
        total_ticks,
    }
}

fn assert_result_invariants(analysis: &form_analysis::ScoreAnalysis) {
    let result = &analysis.result;
    assert!(!result.sections.is_empty());
    assert!((0.0..=1.0).contains(&result.overall_confidence));

    assert_eq!(result.sections.first().unwrap().start_time, 0.0);
    assert_eq!(
        result.sections.last().unwrap().end_time,
        result.total_duration
    );
    for section in &result.sections {
        assert!(section.end_time > section.start_time);
        assert!((0.0..=1.0).contains(&section.confidence));
    }
    for pair in result.sections.windows(2) {
        assert_eq!(pair[0].end_time, pair[1].start_time, "gap or overlap");
    }
}

#[test]
fn homogeneous_piece_yields_weak_development() {
    // 120 beats = 60s of looping C major at constant tempo
    let notes = beat_notes(&C_MAJOR_SCALE, 0, 120);
    let context = context_120bpm(120 * PPQ as u64);

    let analysis = analyze_score(&notes, &context, &AnalysisParams::default()).unwrap();
    assert_result_invariants(&analysis);

    assert!(
        analysis.result.summary.contains("tonally homogeneous"),
        "{}",
        analysis.result.summary
    );

    let dev = analysis
        .result
        .sections
        .iter()
        .find(|s| s.kind == SectionKind::Development)
        .expect("development section");
    assert!(dev.confidence < 0.5, "dev confidence {}", dev.confidence);
}

#[test]
fn modulation_places_key_boundaries_and_recapitulation() {
    // C major 0–40s, G major 40–70s, C major 70–100s at 120 BPM
    let mut notes = beat_notes(&C_MAJOR_SCALE, 0, 80);
    notes.extend(beat_notes(&G_MAJOR_SCALE, 80 * PPQ as u64, 60));
    notes.extend(beat_notes(&C_MAJOR_SCALE, 140 * PPQ as u64, 60));
    let context = context_120bpm(200 * PPQ as u64);

    let analysis = analyze_score(&notes, &context, &AnalysisParams::default()).unwrap();
    assert_result_invariants(&analysis);

    let g_area = analysis
        .key_areas
        .iter()
        .find(|a| a.key == Key::new(7, KeyMode::Major))
        .expect("G major area");
    assert!(
        (g_area.start - 40.0).abs() <= 2.0,
        "modulation boundary at {}",
        g_area.start
    );
    assert!(
        (g_area.end - 70.0).abs() <= 2.0,
        "tonic return at {}",
        g_area.end
    );

    let recap = analysis
        .result
        .sections
        .iter()
        .find(|s| s.kind == SectionKind::RecapitulationTheme1)
        .expect("recapitulation section");
    assert!(
        (recap.start_time - 70.0).abs() <= 2.0,
        "recapitulation at {}",
        recap.start_time
    );
    assert_eq!(recap.musical_key.as_deref(), Some("C major"));
}

#[test]
fn empty_input_is_fatal() {
    let context = context_120bpm(0);
    let result = analyze_score(&[], &context, &AnalysisParams::default());
    assert!(matches!(
        result,
        Err(AnalysisError::InvalidInputFormat(_))
    ));
}

#[test]
fn percussion_only_input_is_fatal() {
    let mut notes = beat_notes(&[35, 38, 42], 0, 16);
    for note in &mut notes {
        note.channel = 9;
    }
    let context = context_120bpm(16 * PPQ as u64);

    let result = analyze_score(&notes, &context, &AnalysisParams::default());
    assert!(matches!(
        result,
        Err(AnalysisError::InvalidInputFormat(_))
    ));
}

#[test]
fn degenerate_tempo_is_fatal() {
    let notes = beat_notes(&C_MAJOR_SCALE, 0, 16);
    let mut context = context_120bpm(16 * PPQ as u64);
    context.tempo_changes.clear();

    let result = analyze_score(&notes, &context, &AnalysisParams::default());
    assert!(matches!(result, Err(AnalysisError::InvalidTempoMap(_))));
}

#[test]
fn repeated_runs_are_byte_identical() {
    let mut notes = beat_notes(&C_MAJOR_SCALE, 0, 80);
    notes.extend(beat_notes(&G_MAJOR_SCALE, 80 * PPQ as u64, 60));
    notes.extend(beat_notes(&C_MAJOR_SCALE, 140 * PPQ as u64, 60));
    let context = context_120bpm(200 * PPQ as u64);
    let params = AnalysisParams::default();

    let first = analyze_score(&notes, &context, &params).unwrap();
    let second = analyze_score(&notes, &context, &params).unwrap();

    let a = serde_json::to_string(&first.result).unwrap();
    let b = serde_json::to_string(&second.result).unwrap();
    assert_eq!(a, b);
}

#[test]
fn analyze_midi_end_to_end() {
    // Hand-built single-track file: C major arpeggio at 120 BPM
    let mut buf = Vec::new();
    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes());
    buf.extend_from_slice(&480u16.to_be_bytes());

    let mut track = Vec::new();
    track.extend_from_slice(&[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]);
    for _ in 0..8 {
        for pitch in [60u8, 64, 67, 72, 67, 64] {
            track.extend_from_slice(&[0x00, 0x90, pitch, 100]);
            track.extend_from_slice(&[0x83, 0x60, 0x80, pitch, 0]);
        }
    }
    track.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
    buf.extend_from_slice(b"MTrk");
    buf.extend_from_slice(&(track.len() as u32).to_be_bytes());
    buf.extend_from_slice(&track);

    let analysis = form_analysis::analyze_midi(&buf, &AnalysisParams::default()).unwrap();
    assert_result_invariants(&analysis);
    assert_eq!(
        analysis.key_areas.first().map(|a| a.key),
        Some(Key::new(0, KeyMode::Major))
    );

    let garbage = form_analysis::analyze_midi(b"nope", &AnalysisParams::default());
    assert!(matches!(
        garbage,
        Err(AnalysisError::InvalidInputFormat(_))
    ));
}

use crate::extract::TempoEvent;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from tempo-map construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimeMapError {
    #[error("tempo map is empty")]
    EmptyTempoMap,

    #[error("non-positive bpm {bpm} at tick {tick}")]
    NonPositiveBpm { tick: u64, bpm: f64 },

    #[error("ppq must be non-zero")]
    ZeroPpq,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Segment {
    start_tick: u64,
    start_seconds: f64,
    seconds_per_tick: f64,
}

/// Piecewise tick→seconds mapping over a tempo-event sequence.
///
/// Within each tempo segment, elapsed seconds = (Δtick / ppq) × (60 / bpm).
/// The first event governs from tick 0 even when it arrives later, and the
/// last event's tempo extends indefinitely past the final change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeMapper {
    segments: Vec<Segment>,
}

impl TimeMapper {
    pub fn new(tempo_changes: &[TempoEvent], ppq: u16) -> Result<Self, TimeMapError> {
        if tempo_changes.is_empty() {
            return Err(TimeMapError::EmptyTempoMap);
        }
        if ppq == 0 {
            return Err(TimeMapError::ZeroPpq);
        }
        for event in tempo_changes {
            if event.bpm <= 0.0 || event.microseconds_per_beat == 0 {
                return Err(TimeMapError::NonPositiveBpm {
                    tick: event.tick,
                    bpm: event.bpm,
                });
            }
        }

        let mut sorted: Vec<&TempoEvent> = tempo_changes.iter().collect();
        sorted.sort_by_key(|t| t.tick);

        let ppq = ppq as f64;
        let mut segments: Vec<Segment> = Vec::with_capacity(sorted.len());
        let mut elapsed = 0.0_f64;
        let mut prev_tick = 0u64;
        let mut prev_spt = seconds_per_tick(sorted[0].bpm, ppq);

        for (i, event) in sorted.iter().enumerate() {
            if i > 0 {
                elapsed += (event.tick - prev_tick) as f64 * prev_spt;
            }
            let spt = seconds_per_tick(event.bpm, ppq);
            let start_tick = if i == 0 { 0 } else { event.tick };
            segments.push(Segment {
                start_tick,
                start_seconds: if i == 0 { 0.0 } else { elapsed },
                seconds_per_tick: spt,
            });
            prev_tick = event.tick;
            prev_spt = spt;
        }

        Ok(Self { segments })
    }

    /// Seconds elapsed at an absolute tick position.
    pub fn seconds_at(&self, tick: u64) -> f64 {
        let seg = self.segment_for_tick(tick);
        let seconds = seg.start_seconds + (tick - seg.start_tick) as f64 * seg.seconds_per_tick;
        debug_assert!(seconds >= 0.0, "mapped time must be non-negative");
        seconds
    }

    /// Inverse mapping: absolute tick position at a seconds offset.
    pub fn tick_at(&self, seconds: f64) -> f64 {
        let idx = self
            .segments
            .partition_point(|s| s.start_seconds <= seconds)
            .saturating_sub(1);
        let seg = &self.segments[idx];
        seg.start_tick as f64 + (seconds - seg.start_seconds) / seg.seconds_per_tick
    }

    fn segment_for_tick(&self, tick: u64) -> &Segment {
        let idx = self
            .segments
            .partition_point(|s| s.start_tick <= tick)
            .saturating_sub(1);
        &self.segments[idx]
    }
}

fn seconds_per_tick(bpm: f64, ppq: f64) -> f64 {
    60.0 / (bpm * ppq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tempo(tick: u64, bpm: f64) -> TempoEvent {
        TempoEvent {
            tick,
            microseconds_per_beat: (60_000_000.0 / bpm).round() as u32,
            bpm,
        }
    }

    #[test]
    fn empty_map_rejected() {
        let result = TimeMapper::new(&[], 480);
        assert_eq!(result.unwrap_err(), TimeMapError::EmptyTempoMap);
    }

    #[test]
    fn zero_bpm_rejected() {
        let result = TimeMapper::new(&[tempo(0, 0.0)], 480);
        assert!(matches!(result, Err(TimeMapError::NonPositiveBpm { .. })));
    }

    #[test]
    fn zero_ppq_rejected() {
        let result = TimeMapper::new(&[tempo(0, 120.0)], 0);
        assert_eq!(result.unwrap_err(), TimeMapError::ZeroPpq);
    }

    #[test]
    fn constant_tempo_mapping() {
        let mapper = TimeMapper::new(&[tempo(0, 120.0)], 480).unwrap();

        // One beat at 120 BPM = 0.5s
        assert!((mapper.seconds_at(480) - 0.5).abs() < 1e-9);
        assert!((mapper.seconds_at(4 * 480) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn tempo_change_integrates_piecewise() {
        // 2 beats at 120 (1.0s), then 60 BPM: each further beat is 1.0s
        let mapper = TimeMapper::new(&[tempo(0, 120.0), tempo(960, 60.0)], 480).unwrap();

        assert!((mapper.seconds_at(960) - 1.0).abs() < 1e-9);
        assert!((mapper.seconds_at(1440) - 2.0).abs() < 1e-9);
        assert!((mapper.seconds_at(1920) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn tempo_extends_past_last_event() {
        let mapper = TimeMapper::new(&[tempo(0, 60.0)], 480).unwrap();
        // 100 beats at 60 BPM = 100s
        assert!((mapper.seconds_at(100 * 480) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn first_event_governs_from_zero() {
        // Event declared at tick 960 still applies to ticks 0..960
        let mapper = TimeMapper::new(&[tempo(960, 60.0)], 480).unwrap();
        assert!((mapper.seconds_at(480) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn round_trip_recovers_tick() {
        let mapper =
            TimeMapper::new(&[tempo(0, 120.0), tempo(960, 90.0), tempo(3840, 140.0)], 480)
                .unwrap();

        for tick in [0u64, 240, 960, 1000, 3840, 5000, 12345] {
            let seconds = mapper.seconds_at(tick);
            let recovered = mapper.tick_at(seconds);
            assert!(
                (recovered - tick as f64).abs() < 1e-6,
                "tick {} -> {}s -> {}",
                tick,
                seconds,
                recovered
            );
        }
    }
}

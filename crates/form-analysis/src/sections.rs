use crate::params::AnalysisParams;
use crate::types::{
    Cadence, Key, KeyArea, Section, SectionKind, ThematicBlock, TimedNote,
};

/// Canonical successor of each form state.
///
/// The estimator walks this chain; a state whose boundary cannot be placed
/// is skipped, which is how the sequence degrades on weak input.
pub fn successor(kind: SectionKind) -> Option<SectionKind> {
    use SectionKind::*;
    Some(match kind {
        Introduction => ExpositionTheme1,
        ExpositionTheme1 => ExpositionTransition,
        ExpositionTransition => ExpositionTheme2,
        ExpositionTheme2 => ExpositionClosing,
        ExpositionClosing => Development,
        Development => RecapitulationTheme1,
        RecapitulationTheme1 => RecapitulationTransition,
        RecapitulationTransition => RecapitulationTheme2,
        RecapitulationTheme2 => RecapitulationClosing,
        RecapitulationClosing => Coda,
        Coda => return None,
    })
}

/// A placed section boundary: the snapped start, the prior it came from,
/// and whether a cadence supports it.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Placed {
    time: f64,
    expected: f64,
    cadence_support: bool,
}

/// Evidence consumed by the boundary planner.
struct Evidence<'a> {
    duration: f64,
    onsets: Vec<f64>,
    key_bounds: Vec<f64>,
    key_areas: &'a [KeyArea],
    themes: &'a [ThematicBlock],
    cadences: &'a [Cadence],
    params: &'a AnalysisParams,
}

/// Skeleton of the piece: the anchor times every state placement derives
/// from.
#[derive(Debug, Clone, Copy)]
struct Layout {
    home_key: Option<Key>,
    secondary_key: Option<Key>,
    intro_end: Option<f64>,
    expo_start: f64,
    dev_start: Placed,
    recap_start: Placed,
}

/// Fuse key areas, thematic blocks, and cadences into the final ordered,
/// gapless, non-overlapping section sequence over [0, duration].
///
/// Boundary decisions always snap to a note onset, key-area boundary, or
/// cadence time. A cadence within the snap radius of a prior wins over
/// other candidates; otherwise the globally nearest event is taken, so no
/// boundary ever lands on an interpolated point. The estimator never fails
/// for positive-duration input — it degrades to fewer, low-confidence
/// sections instead.
pub fn estimate_sections(
    notes: &[TimedNote],
    key_areas: &[KeyArea],
    themes: &[ThematicBlock],
    cadences: &[Cadence],
    duration: f64,
    params: &AnalysisParams,
) -> Vec<Section> {
    if duration <= 0.0 {
        return Vec::new();
    }

    let mut onsets: Vec<f64> = notes.iter().map(|n| n.onset).collect();
    onsets.sort_by(|a, b| a.total_cmp(b));
    onsets.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

    let mut key_bounds: Vec<f64> = key_areas
        .iter()
        .flat_map(|a| [a.start, a.end])
        .filter(|t| *t > 0.0 && *t < duration)
        .collect();
    key_bounds.sort_by(|a, b| a.total_cmp(b));
    key_bounds.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

    let ev = Evidence {
        duration,
        onsets,
        key_bounds,
        key_areas,
        themes,
        cadences,
        params,
    };

    let layout = plan_layout(&ev);

    // Walk the state chain, placing each section's start
    let mut plan: Vec<(SectionKind, Placed)> = Vec::new();
    let mut state = if layout.intro_end.is_some() {
        SectionKind::Introduction
    } else {
        SectionKind::ExpositionTheme1
    };

    loop {
        if let Some(placed) = place_state(state, &layout, &ev) {
            plan.push((state, placed));
        }
        match successor(state) {
            Some(next) => state = next,
            None => break,
        }
    }

    // Enforce strict time order: a boundary that cannot fit is dropped and
    // its section absorbed by the predecessor.
    let min_gap = (duration * 0.01).max(1e-6);
    let mut ordered: Vec<(SectionKind, Placed)> = Vec::with_capacity(plan.len());
    for (kind, placed) in plan {
        let fits = match ordered.last() {
            Some((_, prev)) => placed.time > prev.time + min_gap,
            None => true,
        };
        if fits && placed.time < duration - min_gap {
            ordered.push((kind, placed));
        }
    }

    if ordered.is_empty() {
        ordered.push((
            SectionKind::ExpositionTheme1,
            Placed {
                time: 0.0,
                expected: 0.0,
                cadence_support: false,
            },
        ));
    }
    // The first boundary is always the start of the piece
    ordered[0].1.time = 0.0;

    let recurrence = themes_recur_across_form(&ev);

    let mut sections = Vec::with_capacity(ordered.len());
    for (i, (kind, placed)) in ordered.iter().enumerate() {
        let end = ordered
            .get(i + 1)
            .map(|(_, next)| next.time)
            .unwrap_or(duration);
        sections.push(build_section(*kind, placed, end, &layout, &ev, recurrence));
    }

    tracing::debug!(section_count = sections.len(), "estimated section sequence");
    sections
}

/// Compute the structural anchors from evidence.
fn plan_layout(ev: &Evidence<'_>) -> Layout {
    let (home_key, intro_end) = detect_introduction(ev);
    let expo_start = intro_end.unwrap_or(0.0);

    let dev_target = ev.duration * ev.params.expo_end_fraction;
    let dev_start = snap_boundary(dev_target, ev);

    let recap_start = place_recapitulation(ev, home_key, dev_start.time);

    let secondary_key = ev
        .key_areas
        .iter()
        .find(|a| {
            Some(a.key) != home_key
                && a.start > expo_start
                && a.start < dev_start.time + ev.params.boundary_snap_secs
        })
        .map(|a| a.key);

    Layout {
        home_key,
        secondary_key,
        intro_end,
        expo_start,
        dev_start,
        recap_start,
    }
}

/// An opening key area that never recurs and stays short reads as an
/// introduction; the home key then comes from the second area.
fn detect_introduction(ev: &Evidence<'_>) -> (Option<Key>, Option<f64>) {
    match ev.key_areas {
        [] => (None, None),
        [only] => (Some(only.key), None),
        [first, rest @ ..] => {
            let recurs = rest.iter().any(|a| a.key == first.key);
            let short = (first.end - first.start) < ev.params.intro_max_fraction * ev.duration;
            if !recurs && short {
                (Some(rest[0].key), Some(first.end))
            } else {
                (Some(first.key), None)
            }
        }
    }
}

/// Recapitulation starts at the first return to the home key after the
/// development has had room to unfold; without one, the proportion prior
/// decides.
fn place_recapitulation(ev: &Evidence<'_>, home_key: Option<Key>, dev_start: f64) -> Placed {
    let expected = ev.duration * ev.params.dev_end_fraction;
    let margin = ev.duration * 0.05;

    if let Some(home) = home_key {
        let tonic_return = ev
            .key_areas
            .iter()
            .find(|a| a.key == home && a.start > dev_start + margin && a.start < ev.duration);

        if let Some(area) = tonic_return {
            let cadence_support = nearest_cadence(ev, area.start)
                .map(|c| (c - area.start).abs() <= ev.params.boundary_snap_secs)
                .unwrap_or(false);
            return Placed {
                time: area.start,
                expected,
                cadence_support,
            };
        }
    }

    snap_boundary(expected, ev)
}

/// Pure placement function: the start boundary for entering `kind`, or
/// None when the state has no supporting evidence and is skipped.
fn place_state(kind: SectionKind, layout: &Layout, ev: &Evidence<'_>) -> Option<Placed> {
    use SectionKind::*;

    let fixed = |time: f64| Placed {
        time,
        expected: time,
        cadence_support: false,
    };

    let expo_span = (layout.dev_start.time - layout.expo_start).max(0.0);
    let recap_span = (ev.duration - layout.recap_start.time).max(0.0);

    match kind {
        Introduction => layout.intro_end.map(|_| fixed(0.0)),
        ExpositionTheme1 => Some(fixed(layout.expo_start)),
        ExpositionTransition => {
            Some(snap_boundary(layout.expo_start + expo_span * 0.40, ev))
        }
        ExpositionTheme2 => {
            // Prefer the secondary-key arrival when one falls inside the
            // middle of the exposition
            let target = layout.expo_start + expo_span * 0.55;
            let arrival = layout.secondary_key.and_then(|key| {
                ev.key_areas
                    .iter()
                    .find(|a| a.key == key && a.start > layout.expo_start)
                    .map(|a| a.start)
            });
            match arrival {
                Some(t)
                    if t > layout.expo_start + expo_span * 0.3
                        && t < layout.expo_start + expo_span * 0.7 =>
                {
                    let cadence_support = nearest_cadence(ev, t)
                        .map(|c| (c - t).abs() <= ev.params.boundary_snap_secs)
                        .unwrap_or(false);
                    Some(Placed {
                        time: t,
                        expected: target,
                        cadence_support,
                    })
                }
                _ => Some(snap_boundary(target, ev)),
            }
        }
        ExpositionClosing => Some(snap_boundary(layout.expo_start + expo_span * 0.85, ev)),
        Development => Some(layout.dev_start),
        RecapitulationTheme1 => Some(layout.recap_start),
        RecapitulationTransition => {
            Some(snap_boundary(layout.recap_start.time + recap_span * 0.35, ev))
        }
        RecapitulationTheme2 => {
            Some(snap_boundary(layout.recap_start.time + recap_span * 0.45, ev))
        }
        RecapitulationClosing => {
            // Only emitted when a late cadence splits closing material from
            // the coda proper; snaps to onsets only so it cannot claim the
            // coda's cadence for itself
            let coda_target = layout.recap_start.time + recap_span * 0.75;
            let late_cadence = ev.cadences.iter().any(|c| {
                c.time > coda_target + ev.params.cadence_merge_secs
                    && c.time < ev.duration - ev.duration * 0.02
            });
            late_cadence.then(|| snap_to_events(coda_target, ev))
        }
        Coda => {
            let coda_target = layout.recap_start.time + recap_span * 0.75;
            let late_cadence = ev
                .cadences
                .iter()
                .find(|c| {
                    c.time > coda_target + ev.params.cadence_merge_secs
                        && c.time < ev.duration - ev.duration * 0.02
                })
                .map(|c| c.time);
            match late_cadence {
                Some(t) => Some(Placed {
                    time: t,
                    expected: coda_target,
                    cadence_support: true,
                }),
                None => Some(snap_boundary(coda_target, ev)),
            }
        }
    }
}

/// Snap a prior target to musical evidence: a cadence within the snap
/// radius wins outright; otherwise the nearest note onset or key-area
/// boundary. Exact-distance ties resolve to the earlier candidate.
fn snap_boundary(target: f64, ev: &Evidence<'_>) -> Placed {
    if let Some(c) = nearest_cadence(ev, target) {
        if (c - target).abs() <= ev.params.boundary_snap_secs {
            return Placed {
                time: c,
                expected: target,
                cadence_support: true,
            };
        }
    }

    snap_to_events(target, ev)
}

/// Snap to the nearest note onset or key-area boundary only, ignoring
/// cadences.
fn snap_to_events(target: f64, ev: &Evidence<'_>) -> Placed {
    let nearest = nearest_in(&ev.onsets, target)
        .into_iter()
        .chain(nearest_in(&ev.key_bounds, target))
        .min_by(|a, b| {
            (a - target)
                .abs()
                .total_cmp(&(b - target).abs())
                .then(a.total_cmp(b))
        });

    Placed {
        time: nearest.unwrap_or(target),
        expected: target,
        cadence_support: false,
    }
}

fn nearest_cadence(ev: &Evidence<'_>, target: f64) -> Option<f64> {
    ev.cadences
        .iter()
        .map(|c| c.time)
        .min_by(|a, b| (a - target).abs().total_cmp(&(b - target).abs()))
}

fn nearest_in(sorted: &[f64], target: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = sorted.partition_point(|t| *t < target);
    let after = sorted.get(idx).copied();
    let before = idx.checked_sub(1).and_then(|i| sorted.get(i)).copied();
    match (before, after) {
        (Some(b), Some(a)) => {
            // Tie goes to the earlier event
            if (target - b) <= (a - target) {
                Some(b)
            } else {
                Some(a)
            }
        }
        (Some(b), None) => Some(b),
        (None, Some(a)) => Some(a),
        (None, None) => None,
    }
}

/// A theme cluster stated in the opening 40% and restated in the final
/// third under the same key confirms exposition/recapitulation pairing.
fn themes_recur_across_form(ev: &Evidence<'_>) -> bool {
    let early_limit = ev.duration * 0.4;
    let late_limit = ev.duration * (2.0 / 3.0);

    ev.themes.iter().filter(|t| t.start < early_limit).any(|early| {
        ev.themes
            .iter()
            .filter(|t| t.start >= late_limit)
            .any(|late| {
                late.label == early.label
                    && key_at(ev, early.start) == key_at(ev, late.start)
            })
    })
}

fn key_at(ev: &Evidence<'_>, t: f64) -> Option<Key> {
    crate::key_areas::key_area_at(ev.key_areas, t).map(|a| a.key)
}

fn build_section(
    kind: SectionKind,
    placed: &Placed,
    end: f64,
    layout: &Layout,
    ev: &Evidence<'_>,
    recurrence: bool,
) -> Section {
    let confidence = section_confidence(kind, placed, end, ev, recurrence);
    let (description, musical_key) = describe(kind, layout, ev);

    Section {
        kind,
        start_time: placed.time,
        end_time: end,
        confidence,
        description,
        musical_key,
    }
}

/// Weighted evidence combination, deliberately conservative: a section
/// with no supporting signal bottoms out near the prior weight alone.
fn section_confidence(
    kind: SectionKind,
    placed: &Placed,
    end: f64,
    ev: &Evidence<'_>,
    recurrence: bool,
) -> f64 {
    let params = ev.params;

    let prior_fit =
        1.0 - ((placed.time - placed.expected).abs() / (0.1 * ev.duration)).min(1.0);

    let overlap: Vec<&KeyArea> = ev
        .key_areas
        .iter()
        .filter(|a| a.end > placed.time && a.start < end)
        .collect();

    let key_overlap = if overlap.is_empty() {
        0.0
    } else {
        let mut weighted = 0.0;
        let mut total = 0.0;
        for area in &overlap {
            let span = area.end.min(end) - area.start.max(placed.time);
            weighted += area.confidence * span;
            total += span;
        }
        if total > 0.0 {
            weighted / total
        } else {
            0.0
        }
    };

    // Development evidence is key *instability*: a tonally static span is
    // weak support for a development reading
    let key_term = if kind == SectionKind::Development {
        let unique: std::collections::BTreeSet<(u8, u8)> = overlap
            .iter()
            .map(|a| (a.key.root_pc, a.key.mode as u8))
            .collect();
        let instability = if unique.is_empty() {
            0.0
        } else {
            1.0 - 1.0 / unique.len() as f64
        };
        key_overlap * instability
    } else {
        key_overlap
    };

    let cadence_term = if placed.cadence_support { 1.0 } else { 0.0 };

    let mut confidence = params.weight_prior * prior_fit
        + params.weight_key * key_term
        + params.weight_cadence * cadence_term;

    let theme_section = matches!(
        kind,
        SectionKind::ExpositionTheme1
            | SectionKind::ExpositionTheme2
            | SectionKind::RecapitulationTheme1
            | SectionKind::RecapitulationTheme2
    );
    if recurrence && theme_section {
        confidence += 0.05;
    }

    confidence.clamp(0.0, 1.0)
}

fn describe(
    kind: SectionKind,
    layout: &Layout,
    ev: &Evidence<'_>,
) -> (String, Option<String>) {
    use SectionKind::*;

    let home = layout.home_key.map(|k| k.to_string());
    let secondary = layout.secondary_key.map(|k| k.to_string());

    match kind {
        Introduction => {
            let key = ev.key_areas.first().map(|a| a.key.to_string());
            (
                match &key {
                    Some(k) => format!("Introductory material in {}", k),
                    None => "Introductory material".to_string(),
                },
                key,
            )
        }
        ExpositionTheme1 => (
            match &home {
                Some(k) => format!("First theme area in {}", k),
                None => "First theme area".to_string(),
            },
            home,
        ),
        ExpositionTransition => (
            "Transition modulating toward the secondary key".to_string(),
            None,
        ),
        ExpositionTheme2 => (
            match &secondary {
                Some(k) => format!("Second theme area in {}", k),
                None => "Second theme area in the secondary key".to_string(),
            },
            secondary,
        ),
        ExpositionClosing => {
            let key = layout.secondary_key.or(layout.home_key).map(|k| k.to_string());
            (
                match &key {
                    Some(k) => format!("Closing theme confirming {}", k),
                    None => "Closing theme".to_string(),
                },
                key,
            )
        }
        Development => (
            "Development with thematic fragmentation and modulation".to_string(),
            None,
        ),
        RecapitulationTheme1 => (
            match &home {
                Some(k) => format!("Return of the first theme in {}", k),
                None => "Return of the first theme".to_string(),
            },
            home,
        ),
        RecapitulationTransition => (
            match &home {
                Some(k) => format!("Modified transition remaining in {}", k),
                None => "Modified transition".to_string(),
            },
            home,
        ),
        RecapitulationTheme2 => (
            match &home {
                Some(k) => format!("Second theme restated in {}", k),
                None => "Second theme restated in the tonic".to_string(),
            },
            home,
        ),
        RecapitulationClosing => (
            match &home {
                Some(k) => format!("Closing material settling in {}", k),
                None => "Closing material".to_string(),
            },
            home,
        ),
        Coda => (
            match &home {
                Some(k) => format!("Coda confirming {}", k),
                None => "Coda".to_string(),
            },
            home,
        ),
    }
}

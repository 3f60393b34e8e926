use crate::params::AnalysisParams;
use crate::types::{
    AnalysisResult, Cadence, CadenceKind, Key, KeyArea, Section, SectionKind, ThematicBlock,
};
use std::collections::BTreeSet;

/// Assemble the terminal record from the section sequence and the raw
/// signals behind it.
///
/// Everything here is derived from structured data — the record must stand
/// on its own whether or not an external enhancement step runs afterwards.
pub fn aggregate(
    sections: Vec<Section>,
    key_areas: &[KeyArea],
    themes: &[ThematicBlock],
    cadences: &[Cadence],
    duration: f64,
    params: &AnalysisParams,
) -> AnalysisResult {
    let overall_confidence = duration_weighted_confidence(&sections);

    let primary_key = primary_key(&sections, key_areas);
    let unique_keys: BTreeSet<(u8, u8)> = key_areas
        .iter()
        .map(|a| (a.key.root_pc, a.key.mode as u8))
        .collect();

    let summary = build_summary(&sections, &primary_key, unique_keys.len(), duration);
    let musical_insights = build_insights(
        &sections,
        key_areas,
        themes,
        cadences,
        &primary_key,
        unique_keys.len(),
        duration,
        params.insight_limit,
    );

    AnalysisResult {
        sections,
        overall_confidence,
        summary,
        musical_insights,
        total_duration: duration,
    }
}

fn duration_weighted_confidence(sections: &[Section]) -> f64 {
    let mut weighted = 0.0;
    let mut total = 0.0;
    for s in sections {
        let span = s.end_time - s.start_time;
        weighted += s.confidence * span;
        total += span;
    }
    if total > 0.0 {
        (weighted / total).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// The home key as labeled on the first exposition theme, falling back to
/// the first detected key area.
fn primary_key(sections: &[Section], key_areas: &[KeyArea]) -> Option<String> {
    sections
        .iter()
        .find(|s| s.kind == SectionKind::ExpositionTheme1)
        .and_then(|s| s.musical_key.clone())
        .or_else(|| key_areas.first().map(|a| a.key.to_string()))
}

fn build_summary(
    sections: &[Section],
    primary_key: &Option<String>,
    unique_keys: usize,
    duration: f64,
) -> String {
    let head = match primary_key {
        Some(key) => format!("Sonata-form analysis in {}", key),
        None => "Sonata-form analysis".to_string(),
    };

    if unique_keys <= 1 {
        format!(
            "{}: {} sections across {:.1}s; the piece is tonally homogeneous, \
             so the development reading rests on proportion alone.",
            head,
            sections.len(),
            duration
        )
    } else {
        format!(
            "{}: {} sections across {:.1}s, moving through {} key areas.",
            head,
            sections.len(),
            duration,
            unique_keys
        )
    }
}

#[allow(clippy::too_many_arguments)]
fn build_insights(
    sections: &[Section],
    key_areas: &[KeyArea],
    themes: &[ThematicBlock],
    cadences: &[Cadence],
    primary_key: &Option<String>,
    unique_keys: usize,
    duration: f64,
    limit: usize,
) -> Vec<String> {
    let mut insights = Vec::new();

    if let Some(key) = primary_key {
        insights.push(format!("Primary key: {}", key));
    }

    if let Some(line) = secondary_key_insight(key_areas) {
        insights.push(line);
    }

    if themes_recur(themes, duration) {
        insights.push(
            "Thematic material from the exposition returns in the final third of the piece"
                .to_string(),
        );
    }

    if !cadences.is_empty() {
        let authentic = cadences
            .iter()
            .filter(|c| c.kind == CadenceKind::Authentic)
            .count();
        let half = cadences.len() - authentic;
        insights.push(format!(
            "{} cadence points detected ({} authentic, {} half)",
            cadences.len(),
            authentic,
            half
        ));
    }

    if unique_keys > 3 {
        insights.push("High key variety suggests an extensive development section".to_string());
    } else if unique_keys <= 1 && !key_areas.is_empty() {
        insights.push(
            "Single tonal center throughout; development contrast is weak".to_string(),
        );
    }

    if let Some(dev) = sections.iter().find(|s| s.kind == SectionKind::Development) {
        let fraction = (dev.end_time - dev.start_time) / duration.max(1e-9);
        if fraction < 0.15 {
            insights.push(format!(
                "Development occupies only {:.0}% of the piece, short for sonata form",
                fraction * 100.0
            ));
        } else if fraction > 0.45 {
            insights.push(format!(
                "Development occupies {:.0}% of the piece, unusually expansive",
                fraction * 100.0
            ));
        }
    }

    insights.truncate(limit);
    insights
}

fn secondary_key_insight(key_areas: &[KeyArea]) -> Option<String> {
    let home = key_areas.first()?.key;
    let secondary = key_areas.iter().map(|a| a.key).find(|k| *k != home)?;

    let line = if secondary.is_dominant_of(&home) {
        format!("Second key area on the dominant ({})", secondary)
    } else if secondary.is_relative_major_of(&home) {
        format!("Second key area in the relative major ({})", secondary)
    } else {
        format!("Secondary key area in {}", secondary)
    };
    Some(line)
}

fn themes_recur(themes: &[ThematicBlock], duration: f64) -> bool {
    let early_limit = duration * 0.4;
    let late_limit = duration * (2.0 / 3.0);

    themes
        .iter()
        .filter(|t| t.start < early_limit)
        .any(|early| {
            themes
                .iter()
                .any(|late| late.start >= late_limit && late.label == early.label)
        })
}

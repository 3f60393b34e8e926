use crate::params::AnalysisParams;
use crate::types::{ThematicBlock, ThemeCharacter, TimedNote};

/// Per-window melodic features used for clustering.
#[derive(Debug, Clone)]
struct WindowFeatures {
    start: f64,
    end: f64,
    /// Sign of each successive pitch step: +1 up, -1 down, 0 repeat
    contour: Vec<i8>,
    /// max − min pitch in semitones
    range: u8,
    /// Notes per second
    density: f64,
}

/// Find recurring melodic material in a monophonic line.
///
/// Fixed-length note windows (hop = half window) are described by contour,
/// pitch range, and rhythmic density, then greedily clustered: each window
/// joins the earliest cluster whose canonical (first) window is similar
/// enough, so ties always favor the earlier occurrence as the label
/// bearer. Labels are "T1", "T2", ... in order of first appearance.
pub fn detect_themes(melody: &[TimedNote], params: &AnalysisParams) -> Vec<ThematicBlock> {
    let window = params.theme_window_notes.max(2);
    if melody.len() < window + 2 {
        return Vec::new();
    }

    let hop = (window / 2).max(1);
    let mut features: Vec<WindowFeatures> = Vec::new();

    let mut i = 0;
    while i + window <= melody.len() {
        let slice = &melody[i..i + window];
        if let Some(f) = window_features(slice) {
            features.push(f);
        }
        i += hop;
    }

    if features.is_empty() {
        return Vec::new();
    }

    // Greedy clustering against each cluster's canonical window
    let mut canonical: Vec<usize> = Vec::new();
    let mut assignment: Vec<usize> = Vec::with_capacity(features.len());

    for (idx, feat) in features.iter().enumerate() {
        let cluster = canonical
            .iter()
            .position(|&c| similarity(&features[c], feat) >= params.theme_similarity_threshold);

        match cluster {
            Some(c) => assignment.push(c),
            None => {
                canonical.push(idx);
                assignment.push(canonical.len() - 1);
            }
        }
    }

    let blocks: Vec<ThematicBlock> = features
        .iter()
        .zip(&assignment)
        .map(|(feat, &cluster)| ThematicBlock {
            label: format!("T{}", cluster + 1),
            start: feat.start,
            end: feat.end,
            character: character_of(feat, params),
        })
        .collect();

    tracing::debug!(
        window_count = blocks.len(),
        cluster_count = canonical.len(),
        "detected thematic material"
    );
    blocks
}

fn window_features(slice: &[TimedNote]) -> Option<WindowFeatures> {
    let start = slice.first()?.onset;
    let end = slice.last()?.end();
    let span = end - start;
    if span <= 1e-6 {
        return None;
    }

    let contour = slice
        .windows(2)
        .map(|pair| match pair[1].pitch.cmp(&pair[0].pitch) {
            std::cmp::Ordering::Greater => 1,
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
        })
        .collect();

    let min = slice.iter().map(|n| n.pitch).min()?;
    let max = slice.iter().map(|n| n.pitch).max()?;

    Some(WindowFeatures {
        start,
        end,
        contour,
        range: max - min,
        density: slice.len() as f64 / span,
    })
}

/// Similarity of two windows in [0, 1]: contour agreement dominates, with
/// pitch-range and density differences as secondary terms.
fn similarity(a: &WindowFeatures, b: &WindowFeatures) -> f64 {
    let len = a.contour.len().min(b.contour.len());
    if len == 0 {
        return 0.0;
    }

    let agree = a
        .contour
        .iter()
        .zip(&b.contour)
        .filter(|(x, y)| x == y)
        .count() as f64
        / len as f64;

    let range_diff = (a.range as f64 - b.range as f64).abs() / 24.0;
    let density_diff = {
        let larger = a.density.max(b.density).max(1e-6);
        (a.density - b.density).abs() / larger
    };

    let score = 0.6 * agree + 0.2 * (1.0 - range_diff.min(1.0)) + 0.2 * (1.0 - density_diff);
    score.clamp(0.0, 1.0)
}

fn character_of(feat: &WindowFeatures, params: &AnalysisParams) -> ThemeCharacter {
    if feat.density >= params.rhythmic_density_min && feat.range <= params.narrow_range_max {
        ThemeCharacter::Rhythmic
    } else if feat.density <= params.lyrical_density_max && feat.range >= params.wide_range_min {
        ThemeCharacter::Lyrical
    } else {
        ThemeCharacter::Developmental
    }
}

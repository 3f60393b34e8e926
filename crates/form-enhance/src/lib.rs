//! Optional enhancement of analysis results by an external text-generation
//! service.
//!
//! The core pipeline never depends on this step: [`enhance_or_fallback`]
//! degrades to the heuristic result on any failure, so enhancement is
//! strictly additive.

pub mod http;

pub use http::{EnhanceConfig, HttpEnhancer};

use async_trait::async_trait;
use form_analysis::{AnalysisResult, Section};
use serde::{Deserialize, Serialize};

/// Ways the enhancement collaborator can fail. All of them are non-fatal
/// and absorbed by the fallback path.
#[derive(Debug, thiserror::Error)]
pub enum EnhanceError {
    /// Rate limit or quota exhaustion (HTTP 429 equivalents)
    #[error("enhancement service rate limited the request")]
    RateLimited,

    /// Service answered with a non-success status
    #[error("enhancement service returned status {0}")]
    Http(u16),

    /// Request exceeded the configured timeout
    #[error("enhancement request timed out")]
    Timeout,

    /// Connection could not be established
    #[error("enhancement service unreachable: {0}")]
    Unreachable(String),

    /// Non-JSON or shape-incompatible response
    #[error("enhancement response unusable: {0}")]
    InvalidResponse(String),
}

/// The core record plus the optional narrative fields an enhancer may add.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedAnalysis {
    #[serde(flatten)]
    pub result: AnalysisResult,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub historical_context: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical_analysis: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enhanced_insights: Vec<String>,
}

impl EnhancedAnalysis {
    /// Wrap a core result with no enhancement fields.
    pub fn from_core(result: AnalysisResult) -> Self {
        Self {
            result,
            historical_context: None,
            technical_analysis: None,
            enhanced_insights: Vec::new(),
        }
    }
}

/// Pluggable enhancement backend.
///
/// One operation: refine an [`AnalysisResult`] into an [`EnhancedAnalysis`]
/// or fail. Implementations are the only non-deterministic part of the
/// system, so the core depends solely on this trait.
#[async_trait]
pub trait Enhancer: Send + Sync {
    async fn enhance(&self, result: &AnalysisResult) -> Result<EnhancedAnalysis, EnhanceError>;
}

/// Run the enhancer and fall back to the core result on any non-success
/// condition, including an enhanced section sequence that no longer
/// satisfies the output invariants.
pub async fn enhance_or_fallback(
    enhancer: &dyn Enhancer,
    result: &AnalysisResult,
) -> EnhancedAnalysis {
    match enhancer.enhance(result).await {
        Ok(enhanced) => {
            if sections_valid(&enhanced.result.sections, enhanced.result.total_duration) {
                enhanced
            } else {
                tracing::warn!("enhanced section sequence violates invariants, using core result");
                EnhancedAnalysis::from_core(result.clone())
            }
        }
        Err(error) => {
            tracing::warn!(%error, "enhancement unavailable, using core result");
            EnhancedAnalysis::from_core(result.clone())
        }
    }
}

/// Enhanced output must keep the sections-compatible shape: ordered,
/// non-overlapping, confidence in range.
fn sections_valid(sections: &[Section], total_duration: f64) -> bool {
    if sections.is_empty() {
        return false;
    }
    for section in sections {
        if section.end_time <= section.start_time
            || section.start_time < 0.0
            || section.end_time > total_duration + 1e-6
            || !(0.0..=1.0).contains(&section.confidence)
        {
            return false;
        }
    }
    sections
        .windows(2)
        .all(|pair| pair[1].start_time >= pair[0].end_time - 1e-6)
}

//! HTTP handlers for the analysis service.

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::Json;
use form_analysis::{Cadence, KeyArea, ScoreAnalysis, ThematicBlock};
use form_enhance::{enhance_or_fallback, EnhancedAnalysis};
use serde::{Deserialize, Serialize};

/// Uploads above this size are rejected outright.
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Raw-signal block mirrored into the response next to the result proper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAnalysis {
    /// Key areas, capped to keep response size bounded
    pub key_areas: Vec<KeyArea>,
    pub cadence_count: usize,
    pub theme_count: usize,
}

impl RawAnalysis {
    fn from_signals(key_areas: &[KeyArea], cadences: &[Cadence], themes: &[ThematicBlock]) -> Self {
        Self {
            key_areas: key_areas.iter().take(10).cloned().collect(),
            cadence_count: cadences.len(),
            theme_count: themes.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    #[serde(flatten)]
    pub analysis: EnhancedAnalysis,
    pub raw_analysis: RawAnalysis,
}

/// Root discovery endpoint.
pub async fn serve_root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Sonascope",
        "version": env!("CARGO_PKG_VERSION"),
        "links": {
            "health": "/health",
            "analyze": "/analyze",
        }
    }))
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "sonascope",
    }))
}

/// Analyze a MIDI upload.
///
/// Accepts either a multipart form with a `midi_file` field or raw bytes
/// in the request body. The synchronous pipeline runs on a blocking
/// thread; when an enhancement backend is configured its failures are
/// silently absorbed and the core result is returned.
pub async fn analyze(
    State(state): State<AppState>,
    request: Request,
) -> ApiResult<Json<AnalyzeResponse>> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let midi_bytes = if is_multipart {
        read_multipart(request, &state).await?
    } else {
        axum::body::to_bytes(request.into_body(), MAX_UPLOAD_BYTES)
            .await
            .map_err(|e| ApiError::BadRequest(format!("unreadable request body: {}", e)))?
            .to_vec()
    };

    if midi_bytes.is_empty() {
        return Err(ApiError::BadRequest("empty file received".to_string()));
    }

    let params = state.params.clone();
    let analysis: ScoreAnalysis =
        tokio::task::spawn_blocking(move || form_analysis::analyze_midi(&midi_bytes, &params))
            .await
            .map_err(|e| ApiError::Internal(format!("analysis task failed: {}", e)))??;

    let ScoreAnalysis {
        result,
        key_areas,
        themes,
        cadences,
    } = analysis;

    let enhanced = match &state.enhancer {
        Some(enhancer) => enhance_or_fallback(enhancer.as_ref(), &result).await,
        None => EnhancedAnalysis::from_core(result),
    };

    tracing::info!(
        section_count = enhanced.result.sections.len(),
        overall_confidence = enhanced.result.overall_confidence,
        "analysis complete"
    );

    Ok(Json(AnalyzeResponse {
        analysis: enhanced,
        raw_analysis: RawAnalysis::from_signals(&key_areas, &cadences, &themes),
    }))
}

async fn read_multipart(request: Request, state: &AppState) -> ApiResult<Vec<u8>> {
    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {}", e)))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart field: {}", e)))?
    {
        if field.name() != Some("midi_file") {
            continue;
        }

        if let Some(filename) = field.file_name() {
            let lower = filename.to_ascii_lowercase();
            if !lower.ends_with(".mid") && !lower.ends_with(".midi") {
                return Err(ApiError::BadRequest(
                    "file must be a MIDI file (.mid or .midi)".to_string(),
                ));
            }
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("unreadable upload: {}", e)))?;
        return Ok(bytes.to_vec());
    }

    Err(ApiError::BadRequest(
        "multipart body is missing the midi_file field".to_string(),
    ))
}

//! HTTP implementation of the enhancement interface.

use crate::{EnhanceError, EnhancedAnalysis, Enhancer};
use async_trait::async_trait;
use form_analysis::AnalysisResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single enhancement backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceConfig {
    /// Endpoint receiving the analysis JSON
    pub endpoint: String,

    /// Bearer token, optional for local backends
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            timeout_secs: 20,
        }
    }
}

/// Enhancer that posts the analysis to an external text-generation service
/// and expects an `EnhancedAnalysis`-shaped JSON reply.
pub struct HttpEnhancer {
    client: reqwest::Client,
    config: EnhanceConfig,
}

impl HttpEnhancer {
    pub fn new(config: EnhanceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Enhancer for HttpEnhancer {
    async fn enhance(&self, result: &AnalysisResult) -> Result<EnhancedAnalysis, EnhanceError> {
        let body = serde_json::json!({ "analysis": result });

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .json(&body)
            .timeout(Duration::from_secs(self.config.timeout_secs));

        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EnhanceError::Timeout
            } else {
                EnhanceError::Unreachable(e.to_string())
            }
        })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(EnhanceError::RateLimited);
        }
        if !status.is_success() {
            return Err(EnhanceError::Http(status.as_u16()));
        }

        response
            .json::<EnhancedAnalysis>()
            .await
            .map_err(|e| EnhanceError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enhance_or_fallback;
    use form_analysis::{Section, SectionKind};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn core_result() -> AnalysisResult {
        AnalysisResult {
            sections: vec![Section {
                kind: SectionKind::ExpositionTheme1,
                start_time: 0.0,
                end_time: 30.0,
                confidence: 0.55,
                description: "First theme area in C major".into(),
                musical_key: Some("C major".into()),
            }],
            overall_confidence: 0.55,
            summary: "core summary".into(),
            musical_insights: vec!["Primary key: C major".into()],
            total_duration: 30.0,
        }
    }

    async fn enhancer_for(server: &MockServer) -> HttpEnhancer {
        HttpEnhancer::new(EnhanceConfig {
            endpoint: format!("{}/enhance", server.uri()),
            api_key: Some("test-key".into()),
            timeout_secs: 2,
        })
    }

    #[tokio::test]
    async fn successful_enhancement_adds_fields() {
        let server = MockServer::start().await;
        let mut body = serde_json::to_value(&EnhancedAnalysis::from_core(core_result())).unwrap();
        body["historicalContext"] = "Typical of the Classical era".into();
        body["enhancedInsights"] = serde_json::json!(["Opening theme is triadic"]);

        Mock::given(method("POST"))
            .and(path("/enhance"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let enhancer = enhancer_for(&server).await;
        let out = enhance_or_fallback(&enhancer, &core_result()).await;

        assert_eq!(
            out.historical_context.as_deref(),
            Some("Typical of the Classical era")
        );
        assert_eq!(out.enhanced_insights.len(), 1);
        assert_eq!(out.result.sections.len(), 1);
    }

    #[tokio::test]
    async fn rate_limit_falls_back_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/enhance"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let enhancer = enhancer_for(&server).await;
        let core = core_result();
        let out = enhance_or_fallback(&enhancer, &core).await;

        assert_eq!(out.result, core);
        assert!(out.historical_context.is_none());
    }

    #[tokio::test]
    async fn rate_limit_error_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let enhancer = enhancer_for(&server).await;
        let err = enhancer.enhance(&core_result()).await.unwrap_err();
        assert!(matches!(err, EnhanceError::RateLimited));
    }

    #[tokio::test]
    async fn non_json_response_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let enhancer = enhancer_for(&server).await;
        let err = enhancer.enhance(&core_result()).await.unwrap_err();
        assert!(matches!(err, EnhanceError::InvalidResponse(_)));

        let core = core_result();
        let out = enhance_or_fallback(&enhancer, &core).await;
        assert_eq!(out.result, core);
    }

    #[tokio::test]
    async fn server_error_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let enhancer = enhancer_for(&server).await;
        let err = enhancer.enhance(&core_result()).await.unwrap_err();
        assert!(matches!(err, EnhanceError::Http(503)));
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(5))
                    .set_body_json(serde_json::json!({})),
            )
            .mount(&server)
            .await;

        let enhancer = HttpEnhancer::new(EnhanceConfig {
            endpoint: format!("{}/enhance", server.uri()),
            api_key: None,
            timeout_secs: 1,
        });
        let err = enhancer.enhance(&core_result()).await.unwrap_err();
        assert!(matches!(err, EnhanceError::Timeout));
    }

    #[tokio::test]
    async fn unreachable_endpoint_classified() {
        // Nothing listens on this port
        let enhancer = HttpEnhancer::new(EnhanceConfig {
            endpoint: "http://127.0.0.1:1/enhance".into(),
            api_key: None,
            timeout_secs: 1,
        });
        let err = enhancer.enhance(&core_result()).await.unwrap_err();
        assert!(matches!(
            err,
            EnhanceError::Unreachable(_) | EnhanceError::Timeout
        ));
    }
}

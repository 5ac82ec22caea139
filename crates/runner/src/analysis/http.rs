use async_trait::async_trait;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{extract_score, AnalysisClient, ImageAnalysis, Reasoning, VisualDiffReport};
use crate::error::{AnalysisError, AnalysisResult};
use crate::inspector::Screenshot;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8010";

/// Client for an external vision/reasoning service
///
/// Endpoints: `POST /vision/ui-diff`, `POST /vision/analyze`, `POST /ai/reason`.
/// Images travel as base64 PNG.
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAnalysisClient {
    pub fn new(base_url: &str, timeout_ms: u64) -> AnalysisResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> AnalysisResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);
        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                AnalysisError::Unavailable(format!("{}: {}", url, e))
            } else {
                AnalysisError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))
    }
}

fn encode(shot: &Screenshot) -> String {
    base64::engine::general_purpose::STANDARD.encode(&shot.png)
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn visual_diff(
        &self,
        reference: &Screenshot,
        candidate: &Screenshot,
        prompt: &str,
    ) -> AnalysisResult<VisualDiffReport> {
        let body = json!({
            "reference_image": encode(reference),
            "current_image": encode(candidate),
            "prompt": prompt,
        });
        let mut report: VisualDiffReport = self.post("/vision/ui-diff", body).await?;
        report.match_percentage = report.match_percentage.clamp(0.0, 100.0);
        Ok(report)
    }

    async fn analyze_image(&self, image: &Screenshot, prompt: &str) -> AnalysisResult<ImageAnalysis> {
        self.post("/vision/analyze", json!({ "image": encode(image), "prompt": prompt }))
            .await
    }

    async fn reason(&self, question: &str, context: &str) -> AnalysisResult<Reasoning> {
        let mut reasoning: Reasoning = self
            .post("/ai/reason", json!({ "question": question, "context": context }))
            .await?;
        if reasoning.quality_score.is_none() {
            reasoning.quality_score = extract_score(&reasoning.answer);
        }
        Ok(reasoning)
    }
}

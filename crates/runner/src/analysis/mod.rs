//! AI/vision analysis collaborator
//!
//! Checkers that want a second opinion (layout match, content quality) talk to
//! an [`AnalysisClient`]. Failures here are never fatal: the calling checker
//! records an `analysis_unavailable` issue and carries on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::AnalysisConfig;
use crate::error::AnalysisResult;
use crate::inspector::Screenshot;

mod http;
mod local;
mod mock;

pub use http::HttpAnalysisClient;
pub use local::LocalAnalysisClient;
pub use mock::MockAnalysisClient;

/// Which analysis backend a run uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Canned answers, no I/O
    #[default]
    Mock,
    /// Pixel diff only, no reasoning
    Local,
    /// External vision/reasoning service
    Http,
    /// Every call fails as unavailable
    Disabled,
}

impl std::str::FromStr for AnalysisMode {
    type Err = sitegate_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "local" => Ok(Self::Local),
            "http" => Ok(Self::Http),
            "disabled" | "off" | "none" => Ok(Self::Disabled),
            _ => Err(sitegate_common::Error::UnknownVariant {
                kind: "analysis mode",
                value: s.to_string(),
            }),
        }
    }
}

/// One visual difference between reference and candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualDifference {
    #[serde(rename = "type")]
    pub kind: String,
    pub selector: Option<String>,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

/// A suggested CSS change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CssFix {
    pub selector: String,
    pub property: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualDiffReport {
    pub match_achieved: bool,
    /// 0-100
    pub match_percentage: f64,
    pub differences: Vec<VisualDifference>,
    pub fixes: Vec<CssFix>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageAnalysis {
    pub analysis: String,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    /// 1-10 when the backend grades the image
    pub quality: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reasoning {
    pub answer: String,
    /// 0-1
    pub confidence: f64,
    /// 1-10 when the question asked for a score
    pub quality_score: Option<f64>,
    pub reasoning: Vec<String>,
}

#[async_trait]
pub trait AnalysisClient: Send + Sync {
    fn name(&self) -> &'static str;

    /// Compare a candidate screenshot against a reference
    async fn visual_diff(
        &self,
        reference: &Screenshot,
        candidate: &Screenshot,
        prompt: &str,
    ) -> AnalysisResult<VisualDiffReport>;

    async fn analyze_image(&self, image: &Screenshot, prompt: &str) -> AnalysisResult<ImageAnalysis>;

    /// Free-form question with optional context
    async fn reason(&self, question: &str, context: &str) -> AnalysisResult<Reasoning>;
}

/// Backend that refuses every call
#[derive(Debug, Default)]
pub struct DisabledAnalysisClient;

#[async_trait]
impl AnalysisClient for DisabledAnalysisClient {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn visual_diff(&self, _: &Screenshot, _: &Screenshot, _: &str) -> AnalysisResult<VisualDiffReport> {
        Err(disabled())
    }

    async fn analyze_image(&self, _: &Screenshot, _: &str) -> AnalysisResult<ImageAnalysis> {
        Err(disabled())
    }

    async fn reason(&self, _: &str, _: &str) -> AnalysisResult<Reasoning> {
        Err(disabled())
    }
}

fn disabled() -> crate::error::AnalysisError {
    crate::error::AnalysisError::Unavailable("analysis is disabled".into())
}

/// Build the client selected by configuration
pub fn build_client(config: &AnalysisConfig) -> AnalysisResult<Arc<dyn AnalysisClient>> {
    Ok(match config.mode {
        AnalysisMode::Mock => Arc::new(MockAnalysisClient::default()),
        AnalysisMode::Local => Arc::new(LocalAnalysisClient::default()),
        AnalysisMode::Http => {
            let endpoint = config.endpoint.as_deref().unwrap_or(http::DEFAULT_ENDPOINT);
            Arc::new(HttpAnalysisClient::new(endpoint, config.timeout_ms)?)
        }
        AnalysisMode::Disabled => Arc::new(DisabledAnalysisClient),
    })
}

/// Pull a 1-10 score such as "7/10" or "score: 8.5" out of free text
pub fn extract_score(text: &str) -> Option<f64> {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static OUT_OF_TEN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*/\s*10\b").expect("valid score regex"));
    static LABELLED: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)(?:score|rating|quality)\D{0,12}?(\d+(?:\.\d+)?)").expect("valid score regex")
    });

    [&*OUT_OF_TEN, &*LABELLED]
        .iter()
        .filter_map(|re| re.captures(text))
        .filter_map(|c| c.get(1)?.as_str().parse::<f64>().ok())
        .find(|score| (0.0..=10.0).contains(score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("I'd rate this 7/10 overall", Some(7.0))]
    #[test_case("Quality score: 8.5", Some(8.5))]
    #[test_case("rating of 6 out of ten", Some(6.0))]
    #[test_case("no number here", None)]
    #[test_case("42/10 is not a score", None)]
    fn test_extract_score(text: &str, expected: Option<f64>) {
        assert_eq!(extract_score(text), expected);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("HTTP".parse::<AnalysisMode>().unwrap(), AnalysisMode::Http);
        assert_eq!("off".parse::<AnalysisMode>().unwrap(), AnalysisMode::Disabled);
        assert!("gpt".parse::<AnalysisMode>().is_err());
    }

    #[tokio::test]
    async fn test_disabled_client_is_unavailable() {
        let client = build_client(&AnalysisConfig {
            mode: AnalysisMode::Disabled,
            ..Default::default()
        })
        .unwrap();
        let err = client.reason("q", "").await.unwrap_err();
        assert!(matches!(err, crate::error::AnalysisError::Unavailable(_)));
    }
}

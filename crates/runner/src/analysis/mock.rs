use async_trait::async_trait;

use super::{AnalysisClient, CssFix, ImageAnalysis, Reasoning, VisualDiffReport, VisualDifference};
use crate::error::AnalysisResult;
use crate::inspector::Screenshot;

/// Deterministic canned answers for offline runs and tests
#[derive(Debug, Clone)]
pub struct MockAnalysisClient {
    pub match_percentage: f64,
    pub quality_score: f64,
}

impl Default for MockAnalysisClient {
    fn default() -> Self {
        Self {
            match_percentage: 85.0,
            quality_score: 7.0,
        }
    }
}

fn difference(kind: &str, selector: &str, expected: &str, actual: &str) -> VisualDifference {
    VisualDifference {
        kind: kind.to_string(),
        selector: Some(selector.to_string()),
        expected: Some(expected.to_string()),
        actual: Some(actual.to_string()),
    }
}

#[async_trait]
impl AnalysisClient for MockAnalysisClient {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn visual_diff(&self, _: &Screenshot, _: &Screenshot, _: &str) -> AnalysisResult<VisualDiffReport> {
        let differences = vec![
            difference("spacing", ".hero", "padding: 64px 0", "padding: 48px 0"),
            difference("typography", "h1", "font-size: 48px", "font-size: 40px"),
            difference("color", ".cta", "background: #1a73e8", "background: #2563eb"),
            difference("alignment", "nav", "justify-content: space-between", "justify-content: flex-start"),
        ];
        let fixes = differences
            .iter()
            .filter_map(|d| {
                let (property, value) = d.expected.as_deref()?.split_once(':')?;
                Some(CssFix {
                    selector: d.selector.clone().unwrap_or_default(),
                    property: property.trim().to_string(),
                    value: value.trim().to_string(),
                })
            })
            .collect();
        Ok(VisualDiffReport {
            match_achieved: self.match_percentage >= 98.0,
            match_percentage: self.match_percentage,
            differences,
            fixes,
            message: "Mock comparison".to_string(),
        })
    }

    async fn analyze_image(&self, image: &Screenshot, _: &str) -> AnalysisResult<ImageAnalysis> {
        Ok(ImageAnalysis {
            analysis: format!("Mock analysis of a {}x{} image", image.width, image.height),
            issues: vec![
                "Call to action has low visual weight".to_string(),
                "Hero text crowds the navigation bar".to_string(),
            ],
            suggestions: vec![
                "Increase whitespace around the primary call to action".to_string(),
                "Use a heavier font weight for the hero heading".to_string(),
            ],
            quality: Some(self.quality_score),
        })
    }

    async fn reason(&self, _: &str, _: &str) -> AnalysisResult<Reasoning> {
        Ok(Reasoning {
            answer: format!("Overall the content rates {}/10.", self.quality_score),
            confidence: 0.75,
            quality_score: Some(self.quality_score),
            reasoning: vec!["Mock reasoning".to_string()],
        })
    }
}

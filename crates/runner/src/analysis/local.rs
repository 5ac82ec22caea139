use async_trait::async_trait;
use tracing::debug;

use super::{AnalysisClient, ImageAnalysis, Reasoning, VisualDiffReport, VisualDifference};
use crate::error::{AnalysisError, AnalysisResult};
use crate::inspector::Screenshot;
use crate::visual;

/// Pixel-diff backend that needs no external service
#[derive(Debug, Clone)]
pub struct LocalAnalysisClient {
    /// Match percentage reported as achieved
    pub match_threshold: f64,
    /// Regions reported as differences
    pub max_regions: usize,
}

impl Default for LocalAnalysisClient {
    fn default() -> Self {
        Self {
            match_threshold: 98.0,
            max_regions: 8,
        }
    }
}

#[async_trait]
impl AnalysisClient for LocalAnalysisClient {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn visual_diff(
        &self,
        reference: &Screenshot,
        candidate: &Screenshot,
        _prompt: &str,
    ) -> AnalysisResult<VisualDiffReport> {
        let diff = visual::compare(reference, candidate)?;
        debug!(
            "Local diff: {:.2}% match ({} of {} pixels differ)",
            diff.match_percentage, diff.diff_pixels, diff.total_pixels
        );

        let differences = diff
            .regions
            .iter()
            .take(self.max_regions)
            .map(|region| VisualDifference {
                kind: "pixel_region".to_string(),
                selector: None,
                expected: Some(format!(
                    "region {}x{} at ({}, {}) matches reference",
                    region.rect.width, region.rect.height, region.rect.x, region.rect.y
                )),
                actual: Some(format!("{:.1}% of pixels differ", region.diff_percentage)),
            })
            .collect();

        Ok(VisualDiffReport {
            match_achieved: diff.match_percentage >= self.match_threshold,
            match_percentage: diff.match_percentage,
            differences,
            fixes: Vec::new(),
            message: format!("{} of {} pixels differ", diff.diff_pixels, diff.total_pixels),
        })
    }

    async fn analyze_image(&self, image: &Screenshot, _prompt: &str) -> AnalysisResult<ImageAnalysis> {
        let luma = image::load_from_memory(&image.png)?.to_luma8();
        let pixels = luma.pixels().len().max(1) as f64;
        let brightness = luma.pixels().map(|p| p.0[0] as f64).sum::<f64>() / pixels / 255.0;

        let mut issues = Vec::new();
        if brightness < 0.1 {
            issues.push("Image is almost entirely dark".to_string());
        } else if brightness > 0.97 {
            issues.push("Image is almost entirely blank".to_string());
        }
        Ok(ImageAnalysis {
            analysis: format!(
                "{}x{} PNG, {} bytes, mean brightness {:.2}",
                image.width,
                image.height,
                image.png.len(),
                brightness
            ),
            issues,
            suggestions: Vec::new(),
            quality: None,
        })
    }

    async fn reason(&self, _question: &str, _context: &str) -> AnalysisResult<Reasoning> {
        Err(AnalysisError::Unavailable(
            "local analysis cannot answer free-form questions".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visual::solid_png;

    #[tokio::test]
    async fn test_local_diff_of_different_images() {
        let reference = Screenshot::from_png(solid_png(8, 8, [255, 255, 255, 255])).unwrap();
        let candidate = Screenshot::from_png(solid_png(8, 8, [0, 0, 0, 255])).unwrap();
        let report = LocalAnalysisClient::default()
            .visual_diff(&reference, &candidate, "")
            .await
            .unwrap();
        assert_eq!(report.match_percentage, 0.0);
        assert!(!report.match_achieved);
        assert_eq!(report.differences.len(), 8);
    }

    #[tokio::test]
    async fn test_local_image_stats() {
        let blank = Screenshot::from_png(solid_png(4, 4, [255, 255, 255, 255])).unwrap();
        let analysis = LocalAnalysisClient::default().analyze_image(&blank, "").await.unwrap();
        assert!(analysis.analysis.starts_with("4x4 PNG"));
        assert_eq!(analysis.issues, vec!["Image is almost entirely blank".to_string()]);
    }

    #[tokio::test]
    async fn test_local_reason_unavailable() {
        let err = LocalAnalysisClient::default().reason("q", "c").await.unwrap_err();
        assert!(matches!(err, AnalysisError::Unavailable(_)));
    }
}

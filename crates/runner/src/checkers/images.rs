//! Image validator

use async_trait::async_trait;
use tracing::info;
use url::Url;

use sitegate_common::{Category, CategoryResult, Issue, IssueType, Severity};

use super::{CheckContext, Checker, Findings};
use crate::config::ImagesConfig;
use crate::error::InspectorResult;
use crate::inspector::{DomSnapshot, ResourceEntry};

const LOADING: &str = "loading";
const ALT: &str = "alt_text";
const FORMAT: &str = "format";
const SIZE: &str = "file_size";
const DIMENSIONS: &str = "dimensions";

pub struct ImagesChecker {
    config: ImagesConfig,
}

impl ImagesChecker {
    pub fn new(config: ImagesConfig) -> Self {
        Self { config }
    }

    /// One issue per offending image; inline `data:` images are skipped
    pub fn inspect(&self, snapshot: &DomSnapshot, resources: &[ResourceEntry], findings: &mut Findings) {
        let cfg = &self.config;
        let base = Url::parse(&snapshot.url).ok();
        let mut checked = 0;
        let mut failed = 0;
        let mut missing_alt = 0;
        let mut total_bytes = 0u64;

        for (_, img) in snapshot.by_tag("img") {
            let state = img.image.clone().unwrap_or_default();
            let Some(src) = state.current_src.as_deref().or_else(|| img.attr("src")).map(str::trim) else {
                continue;
            };
            if src.is_empty() || src.starts_with("data:") {
                continue;
            }
            checked += 1;
            let resolved = match &base {
                Some(base) => base.join(src).ok(),
                None => Url::parse(src).ok(),
            };
            let selector = img.selector();

            if state.failed() {
                failed += 1;
                findings.push(
                    Issue::new(IssueType::ImageLoadFailed, Severity::Critical, format!("Image failed to load: {}", src))
                        .in_check(LOADING)
                        .with_selector(selector.clone())
                        .with_value(src),
                );
            }

            if cfg.require_alt && !img.has_attr("alt") {
                missing_alt += 1;
                findings.push(
                    Issue::new(IssueType::MissingAlt, Severity::Critical, format!("Image has no alt attribute: {}", src))
                        .in_check(ALT)
                        .with_selector(selector.clone()),
                );
            }

            if let Some(ext) = resolved.as_ref().and_then(extension) {
                if !cfg.allowed_formats.iter().any(|f| f.eq_ignore_ascii_case(&ext)) {
                    findings.push(
                        Issue::new(IssueType::InvalidFormat, Severity::Minor, format!("Unexpected image format '{}'", ext))
                            .in_check(FORMAT)
                            .with_selector(selector.clone())
                            .with_value(ext),
                    );
                }
            }

            let size = resolved
                .as_ref()
                .and_then(|url| resources.iter().find(|r| r.url == url.as_str()))
                .map(|r| r.transfer_size);
            if let Some(size) = size {
                total_bytes += size;
                if size > cfg.max_file_size_bytes {
                    findings.push(
                        Issue::new(
                            IssueType::FileTooLarge,
                            Severity::Minor,
                            format!("Image is {} KB (max {} KB): {}", size / 1000, cfg.max_file_size_bytes / 1000, src),
                        )
                        .in_check(SIZE)
                        .with_selector(selector.clone())
                        .with_value(size),
                    );
                }
            }

            let (w, h) = (state.natural_width, state.natural_height);
            if !state.failed() && w > 0 && h > 0 && (w < cfg.min_dimension_px || h < cfg.min_dimension_px) {
                findings.push(
                    Issue::new(
                        IssueType::PoorDimensions,
                        Severity::Info,
                        format!("Image is only {}x{} px (min {} px)", w, h, cfg.min_dimension_px),
                    )
                    .in_check(DIMENSIONS)
                    .with_selector(selector),
                );
            }
        }

        findings.metric("images_checked", checked);
        findings.metric("images_failed", failed);
        findings.metric("images_missing_alt", missing_alt);
        findings.metric("image_bytes", total_bytes);
    }
}

/// Lower-cased file extension of the URL path, if it has one
fn extension(url: &Url) -> Option<String> {
    let name = url.path_segments()?.last()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[async_trait]
impl Checker for ImagesChecker {
    fn category(&self) -> Category {
        Category::Images
    }

    fn blocking_severity(&self) -> Severity {
        self.config.blocking_severity
    }

    async fn check(&self, ctx: &CheckContext) -> InspectorResult<CategoryResult> {
        info!("Validating images on {}", ctx.target);
        let (page, _) = ctx.open_target().await?;
        let snapshot = page.snapshot().await;
        let resources = page.resources().await;
        page.close().await;

        let mut findings = Findings::new();
        let resources = findings.tolerate("resources", resources)?.unwrap_or_default();
        if let Some(snapshot) = findings.tolerate("snapshot", snapshot)? {
            self.inspect(&snapshot, &resources, &mut findings);
        }
        Ok(findings.into_result(Category::Images, self.config.blocking_severity))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::body;
    use super::*;
    use crate::inspector::{DomElement, ImageState};

    fn img(src: &str, width: u32, height: u32) -> DomElement {
        let mut el = DomElement::new("img").with_attr("src", src);
        el.image = Some(ImageState {
            complete: true,
            natural_width: width,
            natural_height: height,
            current_src: None,
        });
        el
    }

    fn run(snapshot: &DomSnapshot, resources: &[ResourceEntry]) -> CategoryResult {
        let mut findings = Findings::new();
        ImagesChecker::new(ImagesConfig::default()).inspect(snapshot, resources, &mut findings);
        findings.into_result(Category::Images, Severity::Critical)
    }

    #[test]
    fn test_missing_alt_fails() {
        let snap = body(vec![img("/hero.webp", 800, 600)]);
        let result = run(&snap, &[]);
        assert!(!result.passed());
        assert_eq!(result.issues().len(), 1);
        assert_eq!(result.issues()[0].kind, IssueType::MissingAlt);
        assert_eq!(result.issues()[0].severity, Severity::Critical);
    }

    #[test]
    fn test_broken_image_is_critical() {
        let snap = body(vec![img("/gone.png", 0, 0).with_attr("alt", "Gone")]);
        let result = run(&snap, &[]);
        assert_eq!(result.issues()[0].kind, IssueType::ImageLoadFailed);
        assert_eq!(result.issues().len(), 1);
        assert!(!result.passed());
    }

    #[test]
    fn test_minor_findings_do_not_block() {
        let snap = body(vec![
            img("/photo.bmp", 800, 600).with_attr("alt", "Bitmap"),
            img("/big.jpg", 1600, 1200).with_attr("alt", "Big"),
            img("/icon.png", 16, 16).with_attr("alt", "Icon"),
        ]);
        let resources = vec![ResourceEntry {
            url: "https://example.com/big.jpg".into(),
            kind: "image".into(),
            transfer_size: 900_000,
            ..Default::default()
        }];
        let result = run(&snap, &resources);
        assert!(result.passed());
        let kinds: Vec<IssueType> = result.issues().iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![IssueType::InvalidFormat, IssueType::FileTooLarge, IssueType::PoorDimensions]
        );
        assert_eq!(result.metrics()["image_bytes"], 900_000);
    }

    #[test]
    fn test_data_urls_are_skipped() {
        let snap = body(vec![img("data:image/png;base64,iVBORw0KGgo=", 0, 0)]);
        let result = run(&snap, &[]);
        assert!(result.issues().is_empty());
        assert_eq!(result.metrics()["images_checked"], 0);
    }

    #[test]
    fn test_extension() {
        let url = |s: &str| Url::parse(s).unwrap();
        assert_eq!(extension(&url("https://x.com/a/b.JPG?w=3")), Some("jpg".to_string()));
        assert_eq!(extension(&url("https://x.com/image")), None);
        assert_eq!(extension(&url("https://x.com/.hidden")), None);
    }
}

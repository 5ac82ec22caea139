//! SEO checker
//!
//! Meta tags, heading outline, links, image alt text, structured data, plus
//! sitemap and robots.txt probes against the target's origin.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use sitegate_common::gates::seo::{GENERIC_ALT_TEXT, OG_TAGS};
use sitegate_common::{Category, CategoryResult, Issue, IssueType, Severity};

use super::{heading_skips, CheckContext, Checker, Findings};
use crate::config::SeoConfig;
use crate::error::InspectorResult;
use crate::inspector::{DomSnapshot, FetchedResource, PageInspector};

const META: &str = "meta";
const HEADINGS: &str = "headings";
const LINKS: &str = "links";
const IMAGES: &str = "images";
const STRUCTURED_DATA: &str = "structured_data";
const SITEMAP: &str = "sitemap";
const ROBOTS: &str = "robots";

pub struct SeoChecker {
    config: SeoConfig,
}

impl SeoChecker {
    pub fn new(config: SeoConfig) -> Self {
        Self { config }
    }

    /// Checks that need only the rendered document
    pub fn inspect(&self, snapshot: &DomSnapshot, findings: &mut Findings) {
        self.check_meta(snapshot, findings);
        self.check_headings(snapshot, findings);
        self.check_links(snapshot, findings);
        self.check_images(snapshot, findings);
        self.check_structured_data(snapshot, findings);
    }

    fn check_meta(&self, snapshot: &DomSnapshot, findings: &mut Findings) {
        let cfg = &self.config;
        match snapshot.title_text() {
            None => findings.push(Issue::new(IssueType::MissingTitle, Severity::Critical, "Page has no <title>").in_check(META)),
            Some(title) => {
                let len = title.chars().count();
                findings.metric("title_length", len);
                if len < cfg.title_min {
                    findings.push(
                        Issue::new(
                            IssueType::TitleTooShort,
                            Severity::Moderate,
                            format!("Title is {} characters (minimum {})", len, cfg.title_min),
                        )
                        .in_check(META)
                        .with_value(len),
                    );
                } else if len > cfg.title_max {
                    findings.push(
                        Issue::new(
                            IssueType::TitleTooLong,
                            Severity::Moderate,
                            format!("Title is {} characters (maximum {})", len, cfg.title_max),
                        )
                        .in_check(META)
                        .with_value(len),
                    );
                }
            }
        }

        match snapshot.meta("description").map(str::trim).filter(|d| !d.is_empty()) {
            None => findings.push(
                Issue::new(IssueType::MissingDescription, Severity::Moderate, "Page has no meta description").in_check(META),
            ),
            Some(description) => {
                let len = description.chars().count();
                findings.metric("description_length", len);
                if len < cfg.description_min {
                    findings.push(
                        Issue::new(
                            IssueType::DescriptionTooShort,
                            Severity::Minor,
                            format!("Meta description is {} characters (minimum {})", len, cfg.description_min),
                        )
                        .in_check(META)
                        .with_value(len),
                    );
                } else if len > cfg.description_max {
                    findings.push(
                        Issue::new(
                            IssueType::DescriptionTooLong,
                            Severity::Moderate,
                            format!("Meta description is {} characters (maximum {})", len, cfg.description_max),
                        )
                        .in_check(META)
                        .with_value(len),
                    );
                }
            }
        }

        if snapshot.links_with_rel("canonical").next().is_none() {
            findings.push(Issue::new(IssueType::MissingCanonical, Severity::Moderate, "No canonical URL declared").in_check(META));
        }
        if snapshot.meta("viewport").is_none() {
            findings.push(Issue::new(IssueType::MissingViewport, Severity::Serious, "No viewport meta tag").in_check(META));
        }
        if let Some(robots) = snapshot.meta("robots") {
            if robots.to_ascii_lowercase().contains("noindex") {
                findings.push(
                    Issue::new(IssueType::NoindexSet, Severity::Critical, "Page is excluded from indexing (noindex)")
                        .in_check(META)
                        .with_value(robots),
                );
            }
        }

        let missing_og: Vec<&str> = OG_TAGS.iter().copied().filter(|tag| snapshot.meta(tag).is_none()).collect();
        if !missing_og.is_empty() {
            findings.push(
                Issue::new(
                    IssueType::MissingOgTags,
                    Severity::Minor,
                    format!("Missing Open Graph tags: {}", missing_og.join(", ")),
                )
                .in_check(META)
                .with_count(missing_og.len()),
            );
        }
        if snapshot.meta("twitter:card").is_none() {
            findings.push(Issue::new(IssueType::MissingTwitterCard, Severity::Info, "No twitter:card meta tag").in_check(META));
        }
        let has_favicon = ["icon", "apple-touch-icon"]
            .iter()
            .any(|rel| snapshot.links_with_rel(rel).next().is_some());
        if !has_favicon {
            findings.push(Issue::new(IssueType::MissingFavicon, Severity::Minor, "No favicon link").in_check(META));
        }
    }

    fn check_headings(&self, snapshot: &DomSnapshot, findings: &mut Findings) {
        let h1_count = snapshot.by_tag("h1").count();
        if h1_count == 0 {
            findings.push(Issue::new(IssueType::NoH1, Severity::Critical, "Page has no <h1> heading").in_check(HEADINGS));
        } else if h1_count > 1 {
            findings.push(
                Issue::new(IssueType::MultipleH1, Severity::Moderate, format!("Page has {} <h1> headings", h1_count))
                    .in_check(HEADINGS)
                    .with_count(h1_count),
            );
        }

        for (index, previous, level) in heading_skips(snapshot) {
            findings.push(
                Issue::new(
                    IssueType::HeadingSkip,
                    Severity::Minor,
                    format!("Heading level skipped: h{} followed by h{}", previous, level),
                )
                .in_check(HEADINGS)
                .with_selector(snapshot.elements[index].selector()),
            );
        }

        let mut too_deep = 0;
        let mut empty = 0;
        let mut long = 0;
        for (_, el, level) in snapshot.headings() {
            if level > self.config.max_heading_depth {
                too_deep += 1;
            }
            let text = el.trimmed_text();
            if text.is_empty() {
                empty += 1;
            } else if text.chars().count() > self.config.max_heading_length {
                long += 1;
            }
        }
        if too_deep > 0 {
            findings.push(
                Issue::new(
                    IssueType::HeadingTooDeep,
                    Severity::Info,
                    format!("{} headings deeper than h{}", too_deep, self.config.max_heading_depth),
                )
                .in_check(HEADINGS)
                .with_count(too_deep),
            );
        }
        if empty > 0 {
            findings.push(
                Issue::new(IssueType::EmptyHeadings, Severity::Moderate, format!("{} empty headings", empty))
                    .in_check(HEADINGS)
                    .with_count(empty),
            );
        }
        if long > 0 {
            findings.push(
                Issue::new(
                    IssueType::LongHeadings,
                    Severity::Minor,
                    format!("{} headings longer than {} characters", long, self.config.max_heading_length),
                )
                .in_check(HEADINGS)
                .with_count(long),
            );
        }
        findings.metric("headings", snapshot.headings().count());
    }

    fn check_links(&self, snapshot: &DomSnapshot, findings: &mut Findings) {
        let base = Url::parse(&snapshot.url).ok();
        let mut empty = 0;
        let mut javascript = 0;
        let mut internal = 0;
        let mut external = 0;

        for (index, el) in snapshot.by_tag("a") {
            let Some(href) = el.attr("href").map(str::trim) else { continue };
            if snapshot.accessible_name(index).is_none() {
                empty += 1;
            }
            if href.to_ascii_lowercase().starts_with("javascript:") {
                javascript += 1;
                continue;
            }
            if href.starts_with('#') || href.starts_with("mailto:") || href.starts_with("tel:") {
                continue;
            }
            let resolved = match &base {
                Some(base) => base.join(href).ok(),
                None => Url::parse(href).ok(),
            };
            match (resolved, &base) {
                (Some(link), Some(base)) if link.host_str() == base.host_str() => internal += 1,
                (Some(_), _) => external += 1,
                (None, _) => {}
            }
        }

        if empty > 0 {
            findings.push(
                Issue::new(IssueType::EmptyLinks, Severity::Moderate, format!("{} links have no text", empty))
                    .in_check(LINKS)
                    .with_count(empty),
            );
        }
        if javascript > 0 {
            findings.push(
                Issue::new(
                    IssueType::JavascriptLinks,
                    Severity::Minor,
                    format!("{} links use javascript: URLs", javascript),
                )
                .in_check(LINKS)
                .with_count(javascript),
            );
        }
        if internal < self.config.min_internal_links {
            findings.push(
                Issue::new(
                    IssueType::FewInternalLinks,
                    Severity::Info,
                    format!("Only {} internal links (recommended {})", internal, self.config.min_internal_links),
                )
                .in_check(LINKS)
                .with_count(internal),
            );
        }
        findings.metric("internal_links", internal);
        findings.metric("external_links", external);
    }

    fn check_images(&self, snapshot: &DomSnapshot, findings: &mut Findings) {
        let images: Vec<_> = snapshot.by_tag("img").map(|(_, e)| e).collect();
        let missing = images.iter().filter(|e| !e.has_attr("alt")).count();
        let generic = images
            .iter()
            .filter_map(|e| e.non_empty_attr("alt"))
            .filter(|alt| GENERIC_ALT_TEXT.contains(&alt.to_ascii_lowercase().as_str()))
            .count();
        let lazy = images.iter().filter(|e| e.attr("loading") == Some("lazy")).count();

        if missing > 0 {
            findings.push(
                Issue::new(IssueType::MissingImageAlt, Severity::Moderate, format!("{} images have no alt text", missing))
                    .in_check(IMAGES)
                    .with_count(missing),
            );
        }
        if generic > 0 {
            findings.push(
                Issue::new(
                    IssueType::GenericImageAlt,
                    Severity::Minor,
                    format!("{} images have generic alt text", generic),
                )
                .in_check(IMAGES)
                .with_count(generic),
            );
        }
        if images.len() > self.config.lazy_loading_min_images && lazy == 0 {
            findings.push(
                Issue::new(
                    IssueType::NoLazyLoading,
                    Severity::Minor,
                    format!("{} images and none use loading=\"lazy\"", images.len()),
                )
                .in_check(IMAGES)
                .with_count(images.len()),
            );
        }
        findings.metric("images", images.len());
    }

    fn check_structured_data(&self, snapshot: &DomSnapshot, findings: &mut Findings) {
        let blocks: Vec<_> = snapshot
            .by_tag("script")
            .map(|(_, e)| e)
            .filter(|e| e.attr("type").map(|t| t.eq_ignore_ascii_case("application/ld+json")).unwrap_or(false))
            .collect();

        if blocks.is_empty() {
            findings.push(
                Issue::new(IssueType::NoStructuredData, Severity::Info, "No JSON-LD structured data").in_check(STRUCTURED_DATA),
            );
            return;
        }

        let mut types = Vec::new();
        for block in &blocks {
            match serde_json::from_str::<Value>(block.trimmed_text()) {
                Ok(value) if schema_is_valid(&value) => types.extend(schema_types(&value)),
                Ok(_) => findings.push(
                    Issue::new(IssueType::InvalidSchema, Severity::Moderate, "JSON-LD block lacks @context or @type")
                        .in_check(STRUCTURED_DATA),
                ),
                Err(e) => findings.push(
                    Issue::new(IssueType::InvalidSchema, Severity::Moderate, format!("JSON-LD does not parse: {}", e))
                        .in_check(STRUCTURED_DATA),
                ),
            }
        }
        findings.metric("schema_types", types);
    }

    async fn check_sitemap(&self, ctx: &CheckContext, page: &dyn PageInspector, findings: &mut Findings) -> InspectorResult<()> {
        let mut found: Option<FetchedResource> = None;
        for path in &self.config.sitemap_paths {
            let Some(url) = ctx.origin_url(path) else { continue };
            if let Some(resource) = findings.fetch_optional(SITEMAP, page, &url).await? {
                if resource.is_success() {
                    found = Some(resource);
                    break;
                }
            }
        }

        let Some(sitemap) = found else {
            findings.push(
                Issue::new(
                    IssueType::NoSitemap,
                    Severity::Moderate,
                    format!("No sitemap at {}", self.config.sitemap_paths.join(", ")),
                )
                .in_check(SITEMAP),
            );
            return Ok(());
        };

        findings.metric("sitemap_url", sitemap.url.clone());
        self.assess_sitemap(&sitemap, findings);
        Ok(())
    }

    fn assess_sitemap(&self, sitemap: &FetchedResource, findings: &mut Findings) {
        let body = &sitemap.body;
        if !(body.contains("<urlset") || body.contains("<sitemapindex")) {
            findings.push(
                Issue::new(IssueType::InvalidSitemap, Severity::Moderate, "Sitemap is not a urlset or sitemapindex document")
                    .in_check(SITEMAP)
                    .with_value(sitemap.url.clone()),
            );
            return;
        }
        let entries = body.matches("<loc>").count();
        findings.metric("sitemap_entries", entries);
        if entries == 0 {
            findings.push(
                Issue::new(IssueType::EmptySitemap, Severity::Moderate, "Sitemap lists no URLs")
                    .in_check(SITEMAP)
                    .with_value(sitemap.url.clone()),
            );
        }
    }

    async fn check_robots(&self, ctx: &CheckContext, page: &dyn PageInspector, findings: &mut Findings) -> InspectorResult<()> {
        let Some(url) = ctx.origin_url("/robots.txt") else { return Ok(()) };
        let robots = findings.fetch_optional(ROBOTS, page, &url).await?;
        match robots {
            Some(robots) if robots.is_success() => self.assess_robots(&robots.body, findings),
            Some(_) | None => findings.push(
                Issue::new(IssueType::NoRobotsTxt, Severity::Info, "No robots.txt found").in_check(ROBOTS),
            ),
        }
        Ok(())
    }

    fn assess_robots(&self, body: &str, findings: &mut Findings) {
        if disallows_everything(body) {
            findings.push(
                Issue::new(IssueType::DisallowAll, Severity::Critical, "robots.txt disallows all crawlers from the whole site")
                    .in_check(ROBOTS),
            );
        }
        let has_sitemap = body
            .lines()
            .any(|l| l.trim().to_ascii_lowercase().starts_with("sitemap:"));
        if !has_sitemap {
            findings.push(
                Issue::new(IssueType::NoSitemapReference, Severity::Minor, "robots.txt does not reference a sitemap")
                    .in_check(ROBOTS),
            );
        }
    }
}

fn schema_is_valid(value: &Value) -> bool {
    match value {
        Value::Array(items) => !items.is_empty() && items.iter().all(schema_is_valid),
        Value::Object(map) => {
            let has_context = map.contains_key("@context");
            let has_type = map.contains_key("@type")
                || map
                    .get("@graph")
                    .and_then(Value::as_array)
                    .map(|g| !g.is_empty() && g.iter().all(|n| n.get("@type").is_some()))
                    .unwrap_or(false);
            has_context && has_type
        }
        _ => false,
    }
}

fn schema_types(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().flat_map(schema_types).collect(),
        Value::Object(map) => {
            let mut types: Vec<String> = match map.get("@type") {
                Some(Value::String(t)) => vec![t.clone()],
                Some(Value::Array(ts)) => ts.iter().filter_map(|t| t.as_str().map(str::to_string)).collect(),
                _ => Vec::new(),
            };
            if let Some(Value::Array(graph)) = map.get("@graph") {
                types.extend(graph.iter().flat_map(schema_types));
            }
            types
        }
        _ => Vec::new(),
    }
}

/// `User-agent: *` group containing `Disallow: /`
fn disallows_everything(robots: &str) -> bool {
    let mut in_wildcard_group = false;
    let mut previous_was_agent = false;
    for line in robots.lines() {
        let line = line.split('#').next().unwrap_or_default().trim();
        let Some((field, value)) = line.split_once(':') else { continue };
        let field = field.trim().to_ascii_lowercase();
        let value = value.trim();
        match field.as_str() {
            "user-agent" => {
                // consecutive user-agent lines share one group
                if !previous_was_agent {
                    in_wildcard_group = false;
                }
                in_wildcard_group |= value == "*";
                previous_was_agent = true;
            }
            "disallow" => {
                previous_was_agent = false;
                if in_wildcard_group && value == "/" {
                    return true;
                }
            }
            _ => previous_was_agent = false,
        }
    }
    false
}

#[async_trait]
impl Checker for SeoChecker {
    fn category(&self) -> Category {
        Category::Seo
    }

    fn blocking_severity(&self) -> Severity {
        self.config.blocking_severity
    }

    async fn check(&self, ctx: &CheckContext) -> InspectorResult<CategoryResult> {
        info!("Checking SEO for {}", ctx.target);
        let (page, _) = ctx.open_target().await?;
        let mut findings = Findings::new();
        let outcome = self.run(ctx, page.as_ref(), &mut findings).await;
        page.close().await;
        outcome?;
        Ok(findings.into_result(Category::Seo, self.config.blocking_severity))
    }
}

impl SeoChecker {
    async fn run(&self, ctx: &CheckContext, page: &dyn PageInspector, findings: &mut Findings) -> InspectorResult<()> {
        let snapshot = page.snapshot().await;
        if let Some(snapshot) = findings.tolerate("snapshot", snapshot)? {
            self.inspect(&snapshot, findings);
        }
        if self.config.check_sitemap {
            self.check_sitemap(ctx, page, findings).await?;
        } else {
            debug!("Sitemap probe disabled");
        }
        if self.config.check_robots {
            self.check_robots(ctx, page, findings).await?;
        }
        Ok(())
    }
}

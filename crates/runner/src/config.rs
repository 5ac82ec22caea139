//! Suite configuration
//!
//! One typed section per checker, each with compile-time defaults taken from
//! the quality gate registry. Files may be TOML, YAML or JSON; a missing file
//! means defaults. [`SuiteConfig::validate`] runs once at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use sitegate_common::gates::{self, VitalThreshold};
use sitegate_common::{Category, Error, GateLimits, Severity, WcagLevel};

use crate::analysis::AnalysisMode;
use crate::error::RunnerResult;
use crate::inspector::{Engine, NavigateOptions, Viewport, WaitUntil};

/// Top-level configuration for one suite run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Report and log directory
    pub output_dir: PathBuf,
    /// NDJSON log file name, relative to `output_dir`
    pub log_file: String,
    /// Run fast and medium phases concurrently
    pub parallel: bool,
    /// Stop scheduling a phase after its first failing checker
    pub fail_fast: bool,
    /// Deadline for one whole checker
    pub checker_timeout_ms: u64,
    /// Reference page for comparison checkers
    pub reference_url: Option<String>,
    /// Restrict the run to these categories; empty means all enabled
    pub only: Vec<Category>,
    /// Recommendations printed by the CLI
    pub top_recommendations: usize,
    pub gates: GateLimits,
    pub browser: BrowserConfig,
    pub analysis: AnalysisConfig,
    pub accessibility: AccessibilityConfig,
    pub seo: SeoConfig,
    pub security: SecurityConfig,
    pub performance: PerformanceConfig,
    pub content: ContentConfig,
    pub images: ImagesConfig,
    pub typography: TypographyConfig,
    pub interactivity: InteractivityConfig,
    pub responsive: ResponsiveConfig,
    pub cross_browser: CrossBrowserConfig,
    pub layout: LayoutConfig,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("test-results"),
            log_file: "test-results.log".to_string(),
            parallel: true,
            fail_fast: false,
            checker_timeout_ms: 180_000,
            reference_url: None,
            only: Vec::new(),
            top_recommendations: 5,
            gates: GateLimits::default(),
            browser: BrowserConfig::default(),
            analysis: AnalysisConfig::default(),
            accessibility: AccessibilityConfig::default(),
            seo: SeoConfig::default(),
            security: SecurityConfig::default(),
            performance: PerformanceConfig::default(),
            content: ContentConfig::default(),
            images: ImagesConfig::default(),
            typography: TypographyConfig::default(),
            interactivity: InteractivityConfig::default(),
            responsive: ResponsiveConfig::default(),
            cross_browser: CrossBrowserConfig::default(),
            layout: LayoutConfig::default(),
        }
    }
}

impl SuiteConfig {
    /// Load configuration from file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> RunnerResult<Self> {
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            _ => toml::from_str(&content)?,
        };
        Ok(config)
    }

    /// Save configuration as TOML
    pub fn save(&self, path: &Path) -> RunnerResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Internal(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn log_path(&self) -> PathBuf {
        self.output_dir.join(&self.log_file)
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(crate::aggregator::REPORT_FILE)
    }

    pub fn checker_timeout(&self) -> Duration {
        Duration::from_millis(self.checker_timeout_ms)
    }

    /// Whether a category is enabled and selected
    pub fn is_selected(&self, category: Category) -> bool {
        let enabled = match category {
            Category::Accessibility => self.accessibility.enabled,
            Category::Seo => self.seo.enabled,
            Category::Security => self.security.enabled,
            Category::Performance => self.performance.enabled,
            Category::ContentQuality => self.content.enabled,
            Category::Images => self.images.enabled,
            Category::Typography => self.typography.enabled,
            Category::Interactivity => self.interactivity.enabled,
            Category::Responsive => self.responsive.enabled,
            Category::CrossBrowser => self.cross_browser.enabled,
            Category::LayoutMatch => self.layout.enabled && self.reference_url.is_some(),
        };
        enabled && (self.only.is_empty() || self.only.contains(&category))
    }

    /// Reject contradictory or out-of-range thresholds
    pub fn validate(&self) -> sitegate_common::Result<()> {
        let mut problems = Vec::new();
        let mut check = |ok: bool, msg: &str| {
            if !ok {
                problems.push(msg.to_string());
            }
        };

        check(self.checker_timeout_ms > 0, "checker_timeout_ms must be positive");
        check(self.browser.navigation_timeout_ms > 0, "browser.navigation_timeout_ms must be positive");
        check(self.browser.performance_timeout_ms > 0, "browser.performance_timeout_ms must be positive");
        check(
            self.browser.viewport_width > 0 && self.browser.viewport_height > 0,
            "browser viewport must be non-empty",
        );
        check(self.seo.title_min <= self.seo.title_max, "seo.title_min exceeds seo.title_max");
        check(
            self.seo.description_min <= self.seo.description_max,
            "seo.description_min exceeds seo.description_max",
        );
        check(
            (1..=6).contains(&self.seo.max_heading_depth),
            "seo.max_heading_depth must be between 1 and 6",
        );
        check(
            self.typography.line_height_min <= self.typography.line_height_max,
            "typography.line_height_min exceeds typography.line_height_max",
        );
        check(self.typography.min_font_size > 0.0, "typography.min_font_size must be positive");
        check(self.typography.min_contrast >= 1.0, "typography.min_contrast must be at least 1.0");
        check(self.interactivity.min_tappable_px > 0.0, "interactivity.min_tappable_px must be positive");
        check(!self.responsive.viewports.is_empty(), "responsive.viewports must not be empty");
        check(
            self.responsive.viewports.iter().all(|v| v.width > 0 && v.height > 0),
            "responsive viewports must have non-zero dimensions",
        );
        check(!self.cross_browser.engines.is_empty(), "cross_browser.engines must not be empty");
        for (name, vital) in [
            ("lcp", self.performance.lcp),
            ("fid", self.performance.fid),
            ("cls", self.performance.cls),
        ] {
            check(
                vital.good >= 0.0 && vital.good <= vital.needs_improvement,
                &format!("performance.{} good threshold must not exceed needs_improvement", name),
            );
        }
        let perf = &self.performance;
        check(
            perf.timeout_3g_ms > 0 && perf.timeout_4g_ms > 0,
            "performance network timeouts must be positive",
        );
        check(
            !perf.network_checks
                || self.browser.performance_timeout_ms + perf.timeout_3g_ms + perf.timeout_4g_ms
                    <= self.checker_timeout_ms,
            "performance navigation and network timeouts together exceed checker_timeout_ms",
        );
        check(
            (0.0..=100.0).contains(&self.layout.match_threshold_percent),
            "layout.match_threshold_percent must be between 0 and 100",
        );
        check(
            (0.0..=100.0).contains(&self.cross_browser.min_visual_match_percent),
            "cross_browser.min_visual_match_percent must be between 0 and 100",
        );
        check(
            (0.0..=10.0).contains(&self.content.min_quality_score),
            "content.min_quality_score must be between 0 and 10",
        );
        check(
            self.content.framework_leniency_multiplier >= 1.0,
            "content.framework_leniency_multiplier must be at least 1.0",
        );
        check(
            (0.0..=1.0).contains(&self.content.max_passive_ratio),
            "content.max_passive_ratio must be between 0 and 1",
        );
        for (name, phrases) in [
            ("generic_phrases", &self.content.generic_phrases),
            ("ai_indicators", &self.content.ai_indicators),
            ("corporate_slop", &self.content.corporate_slop),
        ] {
            check(
                phrases.iter().all(|p| !p.trim().is_empty()),
                &format!("content.{} must not contain blank entries", name),
            );
        }
        check(
            self.analysis.mode != AnalysisMode::Http || self.analysis.endpoint.is_some(),
            "analysis.endpoint is required when analysis.mode = \"http\"",
        );
        if let Some(reference) = &self.reference_url {
            check(url::Url::parse(reference).is_ok(), "reference_url is not a valid URL");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidConfig(problems.join("; ")))
        }
    }
}

/// Browser process and navigation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub engine: Engine,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Node.js executable used to host the Playwright bridge
    pub node_binary: PathBuf,
    /// Directory containing `node_modules/playwright`
    pub node_modules: Option<PathBuf>,
    pub startup_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
    pub performance_timeout_ms: u64,
    pub wait_until: WaitUntil,
    pub screenshot_dir: PathBuf,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            engine: Engine::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_binary: PathBuf::from("node"),
            node_modules: None,
            startup_timeout_ms: 30_000,
            navigation_timeout_ms: 30_000,
            performance_timeout_ms: 60_000,
            wait_until: WaitUntil::NetworkIdle,
            screenshot_dir: PathBuf::from("test-results/screenshots"),
        }
    }
}

impl BrowserConfig {
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.viewport_width, self.viewport_height)
    }

    pub fn navigate_options(&self) -> NavigateOptions {
        NavigateOptions {
            wait_until: self.wait_until,
            timeout: Duration::from_millis(self.navigation_timeout_ms),
        }
    }

    pub fn performance_timeout(&self) -> Duration {
        Duration::from_millis(self.performance_timeout_ms)
    }
}

/// AI analysis collaborator selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub mode: AnalysisMode,
    /// Base URL of the HTTP bridge
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::Mock,
            endpoint: None,
            timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessibilityConfig {
    pub enabled: bool,
    pub blocking_severity: Severity,
    pub wcag_level: WcagLevel,
    pub check_semantic: bool,
    pub check_contrast: bool,
    pub check_aria: bool,
    pub check_keyboard: bool,
    pub check_forms: bool,
    pub check_skip_links: bool,
    pub check_screen_reader: bool,
    /// Contrast failures reported individually; the rest are only counted
    pub max_contrast_issues: usize,
}

impl Default for AccessibilityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blocking_severity: Category::Accessibility.default_blocking_severity(),
            wcag_level: WcagLevel::AA,
            check_semantic: true,
            check_contrast: true,
            check_aria: true,
            check_keyboard: true,
            check_forms: true,
            check_skip_links: true,
            check_screen_reader: true,
            max_contrast_issues: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeoConfig {
    pub enabled: bool,
    pub blocking_severity: Severity,
    pub title_min: usize,
    pub title_max: usize,
    pub description_min: usize,
    pub description_max: usize,
    pub max_heading_depth: u8,
    pub max_heading_length: usize,
    pub min_internal_links: usize,
    pub lazy_loading_min_images: usize,
    pub check_sitemap: bool,
    pub check_robots: bool,
    pub sitemap_paths: Vec<String>,
}

impl Default for SeoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blocking_severity: Category::Seo.default_blocking_severity(),
            title_min: gates::seo::TITLE_LENGTH.0,
            title_max: gates::seo::TITLE_LENGTH.1,
            description_min: gates::seo::DESCRIPTION_LENGTH.0,
            description_max: gates::seo::DESCRIPTION_LENGTH.1,
            max_heading_depth: gates::seo::MAX_HEADING_DEPTH,
            max_heading_length: gates::seo::MAX_HEADING_LENGTH,
            min_internal_links: gates::seo::MIN_INTERNAL_LINKS,
            lazy_loading_min_images: gates::seo::LAZY_LOADING_MIN_IMAGES,
            check_sitemap: true,
            check_robots: true,
            sitemap_paths: gates::seo::SITEMAP_PATHS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A response header the security checker expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderRule {
    pub header: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub enabled: bool,
    pub blocking_severity: Severity,
    pub headers: Vec<HeaderRule>,
    pub hsts_min_max_age: u64,
    /// Probe a query parameter for unescaped reflection
    pub probe_reflected_xss: bool,
    pub check_cookies: bool,
    pub check_mixed_content: bool,
    pub check_forms: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blocking_severity: Category::Security.default_blocking_severity(),
            headers: gates::security::HEADERS
                .iter()
                .map(|(_, severity, display)| HeaderRule {
                    header: display.to_string(),
                    severity: *severity,
                })
                .collect(),
            hsts_min_max_age: gates::security::HSTS_MIN_MAX_AGE,
            probe_reflected_xss: true,
            check_cookies: true,
            check_mixed_content: true,
            check_forms: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub enabled: bool,
    pub blocking_severity: Severity,
    pub lcp: VitalThreshold,
    pub fid: VitalThreshold,
    pub cls: VitalThreshold,
    pub fcp_max_ms: f64,
    pub ttfb_max_ms: f64,
    pub first_paint_max_ms: f64,
    pub js_budget_bytes: u64,
    pub total_budget_bytes: u64,
    pub slow_resource_ms: f64,
    pub max_slow_resources: usize,
    pub max_resources: usize,
    pub max_js_heap_bytes: u64,
    pub max_js_execution_ms: f64,
    /// Reload the target under throttled 3G and 4G profiles (chromium only)
    pub network_checks: bool,
    pub max_3g_load_ms: f64,
    pub timeout_3g_ms: u64,
    pub max_4g_load_ms: f64,
    pub timeout_4g_ms: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        use gates::performance as p;
        Self {
            enabled: true,
            blocking_severity: Category::Performance.default_blocking_severity(),
            lcp: gates::LCP,
            fid: gates::FID,
            cls: gates::CLS,
            fcp_max_ms: p::FCP_MAX_MS,
            ttfb_max_ms: p::TTFB_MAX_MS,
            first_paint_max_ms: p::FIRST_PAINT_MAX_MS,
            js_budget_bytes: p::JS_BUDGET_BYTES,
            total_budget_bytes: p::TOTAL_BUDGET_BYTES,
            slow_resource_ms: p::SLOW_RESOURCE_MS,
            max_slow_resources: p::MAX_SLOW_RESOURCES,
            max_resources: p::MAX_RESOURCES,
            max_js_heap_bytes: p::MAX_JS_HEAP_BYTES,
            max_js_execution_ms: p::MAX_JS_EXECUTION_MS,
            network_checks: true,
            max_3g_load_ms: p::MAX_3G_LOAD_MS,
            timeout_3g_ms: 60_000,
            max_4g_load_ms: p::MAX_4G_LOAD_MS,
            timeout_4g_ms: 30_000,
        }
    }
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub enabled: bool,
    pub blocking_severity: Severity,
    pub max_generic_phrases: usize,
    pub max_framework_defaults: usize,
    /// Framework-default markers tolerated = `max_framework_defaults` times this
    pub framework_leniency_multiplier: f64,
    pub max_corporate_slop: usize,
    pub min_specific_examples: usize,
    pub min_personal_voice: usize,
    pub min_words: usize,
    pub max_paragraph_words: usize,
    /// Share of sentences in passive voice above which an issue is raised
    pub max_passive_ratio: f64,
    pub min_quality_score: f64,
    /// Ask the analysis client for a 1-10 quality score
    pub ai_quality_score: bool,
    pub generic_phrases: Vec<String>,
    pub corporate_slop: Vec<String>,
    pub ai_indicators: Vec<String>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        use gates::content as c;
        Self {
            enabled: true,
            blocking_severity: Category::ContentQuality.default_blocking_severity(),
            max_generic_phrases: c::MAX_GENERIC_PHRASES,
            max_framework_defaults: c::MAX_FRAMEWORK_DEFAULTS,
            framework_leniency_multiplier: 2.0,
            max_corporate_slop: c::MAX_CORPORATE_SLOP,
            min_specific_examples: c::MIN_SPECIFIC_EXAMPLES,
            min_personal_voice: c::MIN_PERSONAL_VOICE,
            min_words: c::MIN_WORDS,
            max_paragraph_words: c::MAX_PARAGRAPH_WORDS,
            max_passive_ratio: 0.25,
            min_quality_score: c::MIN_QUALITY_SCORE,
            ai_quality_score: true,
            generic_phrases: strings(c::GENERIC_PHRASES),
            corporate_slop: strings(c::CORPORATE_SLOP),
            ai_indicators: strings(c::AI_INDICATORS),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub enabled: bool,
    pub blocking_severity: Severity,
    pub require_alt: bool,
    pub max_file_size_bytes: u64,
    pub min_dimension_px: u32,
    pub allowed_formats: Vec<String>,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blocking_severity: Category::Images.default_blocking_severity(),
            require_alt: true,
            max_file_size_bytes: gates::images::MAX_FILE_SIZE_BYTES,
            min_dimension_px: gates::images::MIN_DIMENSION_PX,
            allowed_formats: strings(gates::images::FORMATS),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TypographyConfig {
    pub enabled: bool,
    pub blocking_severity: Severity,
    pub min_font_size: f64,
    pub line_height_min: f64,
    pub line_height_max: f64,
    /// Required contrast for normal text; large text needs 3:1
    pub min_contrast: f64,
    pub max_h1_size: f64,
    pub min_letter_spacing: f64,
    pub check_fonts: bool,
}

impl Default for TypographyConfig {
    fn default() -> Self {
        use gates::typography as t;
        Self {
            enabled: true,
            blocking_severity: Category::Typography.default_blocking_severity(),
            min_font_size: t::MIN_FONT_SIZE_PX,
            line_height_min: t::MIN_LINE_HEIGHT,
            line_height_max: t::MAX_LINE_HEIGHT,
            min_contrast: t::MIN_CONTRAST,
            max_h1_size: t::MAX_H1_SIZE_PX,
            min_letter_spacing: t::MIN_LETTER_SPACING_PX,
            check_fonts: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractivityConfig {
    pub enabled: bool,
    pub blocking_severity: Severity,
    pub min_tappable_px: f64,
    /// Interactive elements sampled per page
    pub max_elements: usize,
    pub min_contrast: f64,
    pub check_states: bool,
}

impl Default for InteractivityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blocking_severity: Category::Interactivity.default_blocking_severity(),
            min_tappable_px: gates::interactive::MIN_TAPPABLE_PX,
            max_elements: 50,
            min_contrast: gates::typography::MIN_CONTRAST,
            check_states: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportSpec {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl ViewportSpec {
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.width, self.height)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponsiveConfig {
    pub enabled: bool,
    pub blocking_severity: Severity,
    pub viewports: Vec<ViewportSpec>,
    /// Viewports at or below this width count as mobile
    pub mobile_max_width: u32,
    pub min_mobile_font: f64,
    pub min_desktop_font: f64,
    pub min_tappable_px: f64,
    pub overflow_tolerance_px: f64,
}

impl Default for ResponsiveConfig {
    fn default() -> Self {
        use gates::responsive as r;
        Self {
            enabled: true,
            blocking_severity: Category::Responsive.default_blocking_severity(),
            viewports: r::VIEWPORTS
                .iter()
                .map(|(width, height, name)| ViewportSpec {
                    name: name.to_string(),
                    width: *width,
                    height: *height,
                })
                .collect(),
            mobile_max_width: r::MOBILE_MAX_WIDTH,
            min_mobile_font: r::MIN_MOBILE_FONT_PX,
            min_desktop_font: r::MIN_DESKTOP_FONT_PX,
            min_tappable_px: gates::interactive::MIN_TAPPABLE_PX,
            overflow_tolerance_px: r::OVERFLOW_TOLERANCE_PX,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossBrowserConfig {
    pub enabled: bool,
    pub blocking_severity: Severity,
    pub engines: Vec<Engine>,
    pub min_visual_match_percent: f64,
    pub max_negative_margin_px: f64,
    pub max_floats: usize,
}

impl Default for CrossBrowserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blocking_severity: Category::CrossBrowser.default_blocking_severity(),
            engines: Engine::ALL.to_vec(),
            min_visual_match_percent: gates::layout::CROSS_BROWSER_MATCH_PERCENT,
            max_negative_margin_px: 20.0,
            max_floats: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub enabled: bool,
    pub blocking_severity: Severity,
    pub match_threshold_percent: f64,
    pub prompt: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blocking_severity: Category::LayoutMatch.default_blocking_severity(),
            match_threshold_percent: gates::layout::MATCH_THRESHOLD_PERCENT,
            prompt: "Compare the rendered layout against the reference. List spacing, typography \
                     and colour differences with the CSS change needed for each."
                .to_string(),
        }
    }
}

//! Quality gate registry
//!
//! Static threshold tables consumed by checkers as their defaults, plus the
//! global gate limits evaluated over a whole suite. Nothing here is mutated at
//! runtime; checker configuration copies these values into typed config structs.

use serde::{Deserialize, Serialize};

use crate::types::Severity;

/// Good / needs-improvement pair for one Core Web Vital
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VitalThreshold {
    pub good: f64,
    pub needs_improvement: f64,
}

/// Largest Contentful Paint (ms)
pub const LCP: VitalThreshold = VitalThreshold { good: 2500.0, needs_improvement: 4000.0 };
/// First Input Delay (ms)
pub const FID: VitalThreshold = VitalThreshold { good: 100.0, needs_improvement: 300.0 };
/// Cumulative Layout Shift (unitless)
pub const CLS: VitalThreshold = VitalThreshold { good: 0.1, needs_improvement: 0.25 };

pub mod performance {
    pub const FCP_MAX_MS: f64 = 3000.0;
    pub const TTFB_MAX_MS: f64 = 800.0;
    pub const FIRST_PAINT_MAX_MS: f64 = 2000.0;
    pub const JS_BUDGET_BYTES: u64 = 300_000;
    pub const TOTAL_BUDGET_BYTES: u64 = 500_000;
    pub const SLOW_RESOURCE_MS: f64 = 3000.0;
    pub const MAX_SLOW_RESOURCES: usize = 10;
    pub const MAX_RESOURCES: usize = 100;
    pub const MAX_JS_HEAP_BYTES: u64 = 100 * 1024 * 1024;
    pub const MAX_JS_EXECUTION_MS: f64 = 2000.0;
    pub const MAX_3G_LOAD_MS: f64 = 10_000.0;
    pub const MAX_4G_LOAD_MS: f64 = 4000.0;
}

pub mod images {
    pub const MAX_FILE_SIZE_BYTES: u64 = 500_000;
    pub const MIN_DIMENSION_PX: u32 = 72;
    pub const FORMATS: &[&str] = &["webp", "jpg", "jpeg", "png", "svg", "gif", "avif"];
}

pub mod typography {
    pub const MIN_FONT_SIZE_PX: f64 = 16.0;
    pub const MIN_LINE_HEIGHT: f64 = 1.4;
    pub const MAX_LINE_HEIGHT: f64 = 1.6;
    pub const MIN_CONTRAST: f64 = 4.5;
    pub const MAX_H1_SIZE_PX: f64 = 60.0;
    pub const MIN_LETTER_SPACING_PX: f64 = -0.5;
    pub const WEB_SAFE_FONTS: &[&str] = &[
        "arial",
        "helvetica",
        "times new roman",
        "times",
        "courier new",
        "courier",
        "georgia",
        "verdana",
        "tahoma",
        "trebuchet ms",
        "system-ui",
        "-apple-system",
        "sans-serif",
        "serif",
        "monospace",
        "cursive",
        "fantasy",
    ];
}

pub mod interactive {
    pub const MIN_TAPPABLE_PX: f64 = 44.0;
}

pub mod responsive {
    /// (width, height, label)
    pub const VIEWPORTS: &[(u32, u32, &str)] = &[
        (375, 667, "mobile"),
        (414, 896, "mobile-large"),
        (768, 1024, "tablet"),
        (1024, 768, "tablet-landscape"),
        (1280, 720, "desktop"),
        (1920, 1080, "desktop-large"),
    ];
    pub const MOBILE_MAX_WIDTH: u32 = 767;
    pub const MIN_MOBILE_FONT_PX: f64 = 14.0;
    pub const MIN_DESKTOP_FONT_PX: f64 = 16.0;
    pub const OVERFLOW_TOLERANCE_PX: f64 = 5.0;
}

pub mod seo {
    pub const TITLE_LENGTH: (usize, usize) = (30, 60);
    pub const DESCRIPTION_LENGTH: (usize, usize) = (120, 160);
    pub const MAX_HEADING_DEPTH: u8 = 4;
    pub const MAX_HEADING_LENGTH: usize = 70;
    pub const MIN_INTERNAL_LINKS: usize = 5;
    pub const LAZY_LOADING_MIN_IMAGES: usize = 5;
    pub const SITEMAP_PATHS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml", "/wp-sitemap.xml"];
    pub const OG_TAGS: &[&str] = &["og:title", "og:description", "og:image", "og:url", "og:type"];
    pub const GENERIC_ALT_TEXT: &[&str] = &["image", "photo", "picture", "img", "graphic", "icon", "logo"];
}

pub mod security {
    use crate::types::Severity;

    /// Recommended response headers and the severity of their absence
    pub const HEADERS: &[(&str, Severity, &str)] = &[
        ("content-security-policy", Severity::High, "Content-Security-Policy"),
        ("strict-transport-security", Severity::High, "Strict-Transport-Security"),
        ("x-frame-options", Severity::Moderate, "X-Frame-Options"),
        ("x-content-type-options", Severity::Moderate, "X-Content-Type-Options"),
        ("permissions-policy", Severity::Moderate, "Permissions-Policy"),
        ("referrer-policy", Severity::Minor, "Referrer-Policy"),
    ];
    pub const HSTS_MIN_MAX_AGE: u64 = 31_536_000;
}

pub mod content {
    pub const MAX_GENERIC_PHRASES: usize = 2;
    pub const MAX_FRAMEWORK_DEFAULTS: usize = 3;
    pub const MAX_CORPORATE_SLOP: usize = 1;
    pub const MIN_SPECIFIC_EXAMPLES: usize = 1;
    pub const MIN_PERSONAL_VOICE: usize = 1;
    pub const MIN_WORDS: usize = 300;
    pub const MAX_PARAGRAPH_WORDS: usize = 150;
    pub const MIN_QUALITY_SCORE: f64 = 7.0;

    pub const GENERIC_PHRASES: &[&str] = &[
        "great for",
        "user-friendly",
        "powerful",
        "state-of-the-art",
        "cutting-edge",
        "innovative",
        "industry-leading",
        "world-class",
        "revolutionary",
    ];

    pub const CORPORATE_SLOP: &[&str] = &[
        "leverage",
        "synergy",
        "innovative solutions",
        "game-changer",
        "paradigm shift",
        "best practices",
        "thought leader",
        "deep dive",
        "circle back",
        "move the needle",
    ];

    pub const AI_INDICATORS: &[&str] = &[
        "in today's fast-paced world",
        "in today's digital age",
        "it's important to note",
        "delve into",
        "unlock the power",
        "elevate your",
        "seamlessly",
        "a testament to",
        "navigating the complexities",
        "look no further",
    ];

    pub const TAILWIND_DEFAULTS: &[&str] = &["p-6", "gap-3", "shadow-xl", "text-gray-600", "bg-white"];
    pub const BOOTSTRAP_DEFAULTS: &[&str] = &["card", "navbar", "btn-primary", "container-fluid"];
    pub const BOOTSTRAP_COLORS: &[&str] = &["#007bff", "#6c757d", "#28a745", "#17a2b8"];
}

pub mod layout {
    pub const MATCH_THRESHOLD_PERCENT: f64 = 98.0;
    pub const CROSS_BROWSER_MATCH_PERCENT: f64 = 95.0;
}

/// Tally of issues per severity bucket
///
/// Every severity has its own bucket so the tally is an exact partition of the
/// issue population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub serious: usize,
    pub high: usize,
    pub moderate: usize,
    pub minor: usize,
    pub info: usize,
    pub error: usize,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: Severity) {
        *self.bucket_mut(severity) += 1;
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::Serious => self.serious,
            Severity::High => self.high,
            Severity::Moderate => self.moderate,
            Severity::Minor => self.minor,
            Severity::Info => self.info,
            Severity::Error => self.error,
        }
    }

    fn bucket_mut(&mut self, severity: Severity) -> &mut usize {
        match severity {
            Severity::Critical => &mut self.critical,
            Severity::Serious => &mut self.serious,
            Severity::High => &mut self.high,
            Severity::Moderate => &mut self.moderate,
            Severity::Minor => &mut self.minor,
            Severity::Info => &mut self.info,
            Severity::Error => &mut self.error,
        }
    }

    pub fn total(&self) -> usize {
        Severity::ALL.iter().map(|s| self.get(*s)).sum()
    }

    /// Serious and high issues together
    pub fn high_tier(&self) -> usize {
        self.serious + self.high
    }
}

impl<'a> FromIterator<&'a Severity> for SeverityCounts {
    fn from_iter<I: IntoIterator<Item = &'a Severity>>(iter: I) -> Self {
        let mut counts = SeverityCounts::default();
        for severity in iter {
            counts.record(*severity);
        }
        counts
    }
}

/// Global limits applied to a whole suite, independent of per-test pass flags
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GateLimits {
    pub max_critical_issues: usize,
    /// Applies to serious and high issues combined
    pub max_high_issues: usize,
    pub max_moderate_issues: Option<usize>,
}

impl Default for GateLimits {
    fn default() -> Self {
        Self {
            max_critical_issues: 0,
            max_high_issues: 5,
            max_moderate_issues: None,
        }
    }
}

/// Result of evaluating gate limits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateOutcome {
    pub passed: bool,
    pub violations: Vec<String>,
}

impl GateLimits {
    pub fn evaluate(&self, counts: &SeverityCounts) -> GateOutcome {
        let mut violations = Vec::new();

        if counts.critical > self.max_critical_issues {
            violations.push(format!(
                "Too many critical issues: {} (max: {})",
                counts.critical, self.max_critical_issues
            ));
        }

        if counts.high_tier() > self.max_high_issues {
            violations.push(format!(
                "Too many high severity issues: {} (max: {})",
                counts.high_tier(),
                self.max_high_issues
            ));
        }

        if let Some(max) = self.max_moderate_issues {
            if counts.moderate > max {
                violations.push(format!(
                    "Too many moderate issues: {} (max: {})",
                    counts.moderate, max
                ));
            }
        }

        GateOutcome {
            passed: violations.is_empty(),
            violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_partition() {
        let severities = [
            Severity::Critical,
            Severity::Serious,
            Severity::High,
            Severity::High,
            Severity::Info,
            Severity::Error,
        ];
        let counts: SeverityCounts = severities.iter().collect();
        assert_eq!(counts.total(), severities.len());
        assert_eq!(counts.high_tier(), 3);
        assert_eq!(counts.error, 1);
    }

    #[test]
    fn test_single_critical_fails_default_gates() {
        let mut counts = SeverityCounts::default();
        counts.record(Severity::Critical);
        let outcome = GateLimits::default().evaluate(&counts);
        assert!(!outcome.passed);
        assert_eq!(outcome.violations.len(), 1);
        assert!(outcome.violations[0].contains("critical"));
    }

    #[test]
    fn test_high_tier_limit() {
        let counts = SeverityCounts { serious: 3, high: 3, ..Default::default() };
        assert!(!GateLimits::default().evaluate(&counts).passed);

        let counts = SeverityCounts { serious: 2, high: 3, moderate: 40, ..Default::default() };
        assert!(GateLimits::default().evaluate(&counts).passed);

        let limits = GateLimits { max_moderate_issues: Some(10), ..Default::default() };
        assert!(!limits.evaluate(&counts).passed);
    }

    #[test]
    fn test_vital_ordering() {
        for vital in [LCP, FID, CLS] {
            assert!(vital.good < vital.needs_improvement);
        }
    }
}

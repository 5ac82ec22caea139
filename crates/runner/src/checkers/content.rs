//! Content quality checker
//!
//! Heuristic text analysis of the rendered page copy: stock phrasing,
//! framework boilerplate, lack of concrete detail or voice, and an optional
//! 1-10 score from the analysis client.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use sitegate_common::gates::content::{BOOTSTRAP_COLORS, BOOTSTRAP_DEFAULTS, TAILWIND_DEFAULTS};
use sitegate_common::{Category, CategoryResult, Issue, IssueType, Rgba, Severity};

use super::{round2, CheckContext, Checker, Findings};
use crate::analysis::AnalysisClient;
use crate::config::ContentConfig;
use crate::error::InspectorResult;
use crate::inspector::DomSnapshot;

const PHRASES: &str = "generic_phrases";
const FRAMEWORK: &str = "framework_defaults";
const EXAMPLES: &str = "specific_examples";
const VOICE: &str = "personal_voice";
const STRUCTURE: &str = "structure";
const AI_ANALYSIS: &str = "ai_quality";

/// Characters of page text sent along with the scoring question
const ANALYSIS_CONTEXT_CHARS: usize = 4000;

const QUALITY_QUESTION: &str = "Analyze this webpage for content quality. Look for generic phrases, \
lack of specific examples, corporate buzzwords, absence of personal voice and AI-generated writing \
patterns. Rate from 1-10 and explain.";

static NUMBERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\d+\s*(%|percent|users|customers|stars|reviews|days|months|years)")
        .expect("numbers regex")
});
static MEASUREMENTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\d+\s*(px|em|rem|kb|mb|gb|ms|seconds?|minutes?|hours?)\b").expect("measurements regex")
});
static CASE_STUDIES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(case study|for example|such as|we used|we implemented|our client|testimonial)\b")
        .expect("case study regex")
});
static FIRST_PERSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(i|we|my|our|us)\b").expect("first person regex"));
static CONTRACTIONS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(i'm|i've|don't|can't|won't|it's|let's|we're|we've|they're|you're)\b")
        .expect("contractions regex")
});
static OPINIONS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(i think|i believe|in my opinion|we recommend|our favorite|we found|we tried|we learned)\b")
        .expect("opinions regex")
});
static PASSIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(is|are|was|were|been|being|be)\s+\w+(ed|en)\b").expect("passive regex")
});
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+(\s|$)").expect("sentence regex"));

/// Text statistics the checker grades
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextStats {
    pub words: usize,
    pub sentences: usize,
    pub passive_sentences: usize,
    pub specificity_score: f64,
    pub voice_score: f64,
}

impl TextStats {
    pub fn of(text: &str) -> Self {
        let words = text.split_whitespace().count();
        let sentences: Vec<&str> = SENTENCE_END
            .split(text)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        let passive_sentences = sentences.iter().filter(|s| PASSIVE.is_match(s)).count();

        let specificity_score = NUMBERS.find_iter(text).count() as f64 / 2.0
            + MEASUREMENTS.find_iter(text).count() as f64 / 3.0
            + CASE_STUDIES.find_iter(text).count() as f64;
        let voice_score = FIRST_PERSON.find_iter(text).count() as f64 / 10.0
            + CONTRACTIONS.find_iter(text).count() as f64 / 5.0
            + OPINIONS.find_iter(text).count() as f64
            + text.matches('?').count() as f64 / 10.0;

        Self {
            words,
            sentences: sentences.len(),
            passive_sentences,
            specificity_score,
            voice_score,
        }
    }

    pub fn passive_ratio(&self) -> f64 {
        if self.sentences == 0 {
            0.0
        } else {
            self.passive_sentences as f64 / self.sentences as f64
        }
    }
}

pub struct ContentChecker {
    config: ContentConfig,
}

impl ContentChecker {
    pub fn new(config: ContentConfig) -> Self {
        Self { config }
    }

    pub fn inspect(&self, snapshot: &DomSnapshot, findings: &mut Findings) {
        let text = snapshot.body_text();
        let lower = text.to_lowercase();
        let cfg = &self.config;

        let generic = phrase_hits(&lower, &cfg.generic_phrases);
        let generic_total: usize = generic.iter().map(|(_, n)| n).sum();
        if generic_total > cfg.max_generic_phrases {
            findings.push(
                Issue::new(
                    IssueType::TooManyGenericPhrases,
                    Severity::Moderate,
                    format!(
                        "{} generic phrases found (max {}). Rewrite with specific, original language.",
                        generic_total, cfg.max_generic_phrases
                    ),
                )
                .in_check(PHRASES)
                .with_count(generic_total)
                .with_value(names(&generic)),
            );
        }

        let ai = phrase_hits(&lower, &cfg.ai_indicators);
        let ai_total: usize = ai.iter().map(|(_, n)| n).sum();
        if ai_total > 0 {
            findings.push(
                Issue::new(
                    IssueType::AiIndicatorsFound,
                    Severity::Moderate,
                    format!("{} phrases typical of machine-written copy", ai_total),
                )
                .in_check(PHRASES)
                .with_count(ai_total)
                .with_value(names(&ai)),
            );
        }

        let defaults = framework_defaults(snapshot);
        let allowance = cfg.max_framework_defaults as f64 * cfg.framework_leniency_multiplier;
        if defaults as f64 > allowance {
            findings.push(
                Issue::new(
                    IssueType::TooManyFrameworkDefaults,
                    Severity::Minor,
                    format!(
                        "{} framework default classes or colours (allowed {}). Consider custom styling.",
                        defaults, allowance
                    ),
                )
                .in_check(FRAMEWORK)
                .with_count(defaults),
            );
        }

        let slop = phrase_hits(&lower, &cfg.corporate_slop);
        let slop_total: usize = slop.iter().map(|(_, n)| n).sum();
        if slop_total > cfg.max_corporate_slop {
            findings.push(
                Issue::new(
                    IssueType::TooManyBuzzwords,
                    Severity::Moderate,
                    format!("{} corporate buzzwords found (max {})", slop_total, cfg.max_corporate_slop),
                )
                .in_check(PHRASES)
                .with_count(slop_total)
                .with_value(names(&slop)),
            );
        }

        let stats = TextStats::of(&text);
        if stats.specificity_score < cfg.min_specific_examples as f64 {
            findings.push(
                Issue::new(
                    IssueType::LacksSpecificExamples,
                    Severity::Moderate,
                    "Content lacks specific examples. Add numbers, case studies or data.",
                )
                .in_check(EXAMPLES)
                .with_value(round2(stats.specificity_score)),
            );
        }
        if stats.voice_score < cfg.min_personal_voice as f64 {
            findings.push(
                Issue::new(
                    IssueType::LacksPersonalVoice,
                    Severity::Moderate,
                    "Content lacks personal voice. Write conversationally, in the first person.",
                )
                .in_check(VOICE)
                .with_value(round2(stats.voice_score)),
            );
        }
        if stats.passive_ratio() > cfg.max_passive_ratio {
            findings.push(
                Issue::new(
                    IssueType::TooMuchPassiveVoice,
                    Severity::Minor,
                    format!(
                        "{} of {} sentences use the passive voice",
                        stats.passive_sentences, stats.sentences
                    ),
                )
                .in_check(VOICE)
                .with_count(stats.passive_sentences),
            );
        }

        if stats.words < cfg.min_words {
            findings.push(
                Issue::new(
                    IssueType::ContentTooShort,
                    Severity::Moderate,
                    format!("Page has {} words (minimum {})", stats.words, cfg.min_words),
                )
                .in_check(STRUCTURE)
                .with_value(stats.words),
            );
        }
        let long = snapshot
            .by_tag("p")
            .filter(|(_, p)| p.trimmed_text().split_whitespace().count() > cfg.max_paragraph_words)
            .count();
        if long > 0 {
            findings.push(
                Issue::new(
                    IssueType::LongParagraphs,
                    Severity::Minor,
                    format!("{} paragraphs exceed {} words", long, cfg.max_paragraph_words),
                )
                .in_check(STRUCTURE)
                .with_count(long),
            );
        }

        findings.metric("word_count", stats.words);
        findings.metric("generic_phrases", generic_total);
        findings.metric("ai_indicators", ai_total);
        findings.metric("framework_defaults", defaults);
        findings.metric("buzzwords", slop_total);
        findings.metric("specificity_score", round2(stats.specificity_score));
        findings.metric("voice_score", round2(stats.voice_score));
        findings.metric("passive_ratio", round2(stats.passive_ratio()));
    }

    /// Ask the analysis client for a score; failures only ever produce info issues
    pub async fn score(&self, analysis: &dyn AnalysisClient, text: &str, findings: &mut Findings) {
        let context: String = text.chars().take(ANALYSIS_CONTEXT_CHARS).collect();
        match analysis.reason(QUALITY_QUESTION, &context).await {
            Ok(reasoning) => match reasoning.quality_score {
                Some(score) => {
                    findings.metric("quality_score", score);
                    if score < self.config.min_quality_score {
                        findings.push(
                            Issue::new(
                                IssueType::LowQualityScore,
                                Severity::Moderate,
                                format!(
                                    "Analysis rated content {}/10 (min {})",
                                    score, self.config.min_quality_score
                                ),
                            )
                            .in_check(AI_ANALYSIS)
                            .with_value(score),
                        );
                    }
                }
                None => findings.push(
                    Issue::new(
                        IssueType::AnalysisUnavailable,
                        Severity::Info,
                        format!("{} analysis returned no quality score", analysis.name()),
                    )
                    .in_check(AI_ANALYSIS),
                ),
            },
            Err(e) => {
                warn!("Content quality analysis unavailable: {}", e);
                findings.push(
                    Issue::new(
                        IssueType::AnalysisUnavailable,
                        Severity::Info,
                        format!("Content quality analysis unavailable: {}", e),
                    )
                    .in_check(AI_ANALYSIS),
                );
            }
        }
    }
}

/// Occurrences per phrase, only phrases that occur, in configured order.
/// Blank phrases match nothing.
fn phrase_hits<'a>(text: &str, phrases: &'a [String]) -> Vec<(&'a str, usize)> {
    phrases
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(|p| (p.as_str(), text.matches(p.to_lowercase().as_str()).count()))
        .filter(|(_, n)| *n > 0)
        .collect()
}

fn names(hits: &[(&str, usize)]) -> Vec<String> {
    hits.iter().map(|(p, _)| p.to_string()).collect()
}

/// Stock framework classes plus elements painted in stock framework colours
fn framework_defaults(snapshot: &DomSnapshot) -> usize {
    let colours: Vec<Rgba> = BOOTSTRAP_COLORS.iter().filter_map(|c| c.parse().ok()).collect();
    snapshot
        .iter()
        .map(|(_, e)| {
            let classes = e
                .classes()
                .filter(|c| TAILWIND_DEFAULTS.contains(c) || BOOTSTRAP_DEFAULTS.contains(c))
                .count();
            let painted = [&e.style.color, &e.style.background_color]
                .iter()
                .filter_map(|c| c.parse::<Rgba>().ok())
                .filter(|c| colours.contains(c))
                .count();
            classes + painted
        })
        .sum()
}

#[async_trait]
impl Checker for ContentChecker {
    fn category(&self) -> Category {
        Category::ContentQuality
    }

    fn blocking_severity(&self) -> Severity {
        self.config.blocking_severity
    }

    async fn check(&self, ctx: &CheckContext) -> InspectorResult<CategoryResult> {
        info!("Checking content quality of {}", ctx.target);
        let (page, _) = ctx.open_target().await?;
        let snapshot = page.snapshot().await;
        page.close().await;

        let mut findings = Findings::new();
        if let Some(snapshot) = findings.tolerate("snapshot", snapshot)? {
            self.inspect(&snapshot, &mut findings);
            if self.config.ai_quality_score {
                self.score(ctx.analysis.as_ref(), &snapshot.body_text(), &mut findings).await;
            }
        }
        Ok(findings.into_result(Category::ContentQuality, self.config.blocking_severity))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::body;
    use super::*;
    use crate::analysis::{DisabledAnalysisClient, MockAnalysisClient};
    use crate::inspector::DomElement;

    fn paragraph(text: &str) -> DomElement {
        DomElement::new("p").with_text(text)
    }

    fn run(snapshot: &DomSnapshot) -> Findings {
        let mut findings = Findings::new();
        ContentChecker::new(ContentConfig::default()).inspect(snapshot, &mut findings);
        findings
    }

    #[test]
    fn test_generic_and_ai_phrases() {
        let snap = body(vec![paragraph(
            "Our powerful, user-friendly, cutting-edge platform is great for teams. \
             In today's fast-paced world you need to delve into data.",
        )]);
        let findings = run(&snap);
        let generic = findings.issues().iter().find(|i| i.kind == IssueType::TooManyGenericPhrases).unwrap();
        assert_eq!(generic.count, Some(4));
        assert_eq!(findings.count(IssueType::AiIndicatorsFound), 1);
        assert_eq!(findings.count(IssueType::ContentTooShort), 1);
    }

    #[test]
    fn test_framework_leniency_is_configurable() {
        let cards: Vec<DomElement> = (0..5)
            .map(|_| DomElement::new("div").with_attr("class", "card p-6"))
            .collect();
        let snap = body(cards);
        // ten markers against an allowance of 3 x 2
        assert_eq!(run(&snap).count(IssueType::TooManyFrameworkDefaults), 1);

        let lenient = ContentChecker::new(ContentConfig {
            framework_leniency_multiplier: 4.0,
            ..Default::default()
        });
        let mut findings = Findings::new();
        lenient.inspect(&snap, &mut findings);
        assert_eq!(findings.count(IssueType::TooManyFrameworkDefaults), 0);
    }

    #[test]
    fn test_specific_personal_copy_passes() {
        let sentence = "We tested 12 laptops over 3 months and I think the battery results surprised us. ";
        let snap = body(vec![paragraph(&sentence.repeat(25))]);
        let findings = run(&snap);
        assert_eq!(findings.count(IssueType::LacksSpecificExamples), 0);
        assert_eq!(findings.count(IssueType::LacksPersonalVoice), 0);
        assert_eq!(findings.count(IssueType::ContentTooShort), 0);
        // 375 words in one paragraph
        assert_eq!(findings.count(IssueType::LongParagraphs), 1);
    }

    #[test]
    fn test_blank_phrases_match_nothing() {
        let checker = ContentChecker::new(ContentConfig {
            generic_phrases: vec![String::new(), "  ".into()],
            ai_indicators: vec![String::new()],
            corporate_slop: vec!["\t".into()],
            ..Default::default()
        });
        let snap = body(vec![paragraph("We measured a 12 percent drop in latency.")]);
        let mut findings = Findings::new();
        checker.inspect(&snap, &mut findings);
        assert_eq!(findings.count(IssueType::TooManyGenericPhrases), 0);
        assert_eq!(findings.count(IssueType::AiIndicatorsFound), 0);
        assert_eq!(findings.count(IssueType::TooManyBuzzwords), 0);
        assert!(phrase_hits("anything", &[String::new()]).is_empty());
    }

    #[test]
    fn test_passive_voice_ratio() {
        let stats = TextStats::of("The report was written by staff. Mistakes were ignored. We fixed them. It works.");
        assert_eq!(stats.sentences, 4);
        assert_eq!(stats.passive_sentences, 2);
        assert!((stats.passive_ratio() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_score_below_minimum() {
        let checker = ContentChecker::new(ContentConfig {
            min_quality_score: 8.0,
            ..Default::default()
        });
        let mut findings = Findings::new();
        checker.score(&MockAnalysisClient::default(), "some copy", &mut findings).await;
        let issue = &findings.issues()[0];
        assert_eq!(issue.kind, IssueType::LowQualityScore);
        assert_eq!(issue.severity, Severity::Moderate);
    }

    #[tokio::test]
    async fn test_unavailable_analysis_is_info() {
        let checker = ContentChecker::new(ContentConfig::default());
        let mut findings = Findings::new();
        checker.score(&DisabledAnalysisClient, "some copy", &mut findings).await;
        let result = findings.into_result(Category::ContentQuality, Severity::Moderate);
        assert!(result.passed());
        assert_eq!(result.issues()[0].kind, IssueType::AnalysisUnavailable);
        assert_eq!(result.issues()[0].severity, Severity::Info);
    }
}

//! Sitegate runner
//!
//! Drives a headless browser through a battery of quality checkers and folds
//! their results into one suite report:
//! - Launches a browser session through a [`BrowserLauncher`] (Playwright bridge or JSON fixtures)
//! - Runs checkers phase by phase, concurrently where allowed
//! - Aggregates issues by severity and evaluates global quality gates
//! - Derives prioritized recommendations and writes `test-results.json`
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Orchestrator                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  launch() -> BrowserSession                                 │
//! │    ├── phase fast:   images, typography, interactivity,     │
//! │    │                 content-quality          (concurrent)  │
//! │    ├── phase medium: accessibility, seo, security           │
//! │    │                                          (concurrent)  │
//! │    └── phase slow:   responsive, cross-browser,             │
//! │                      performance, layout-match (sequential) │
//! │  close()   exactly once                                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Checker::check(ctx) -> CategoryResult                      │
//! │    └── PageInspector: navigate, evaluate, snapshot,         │
//! │                       screenshot, fetch, cookies, ...       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  aggregate(entries) -> SuiteReport                          │
//! │    ├── severity tallies + quality gates                     │
//! │    └── recommendations                                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod aggregator;
pub mod analysis;
pub mod checkers;
pub mod config;
pub mod error;
pub mod inspector;
pub mod orchestrator;
pub mod recommendations;
pub mod visual;

pub use aggregator::{SuiteReport, Summary, TestReport};
pub use analysis::{build_client, AnalysisClient, AnalysisMode};
pub use config::SuiteConfig;
pub use error::{AnalysisError, InspectorError, RunnerError, RunnerResult};
pub use inspector::{BrowserLauncher, FixtureLauncher, FixtureSite, PlaywrightLauncher};
pub use orchestrator::Orchestrator;
pub use recommendations::{Priority, Recommendation};

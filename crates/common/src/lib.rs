//! Sitegate Common Library
//!
//! Issue model, quality gate registry and WCAG colour maths shared by the
//! runner and the CLI.

pub mod color;
pub mod error;
pub mod gates;
pub mod types;

pub use color::{contrast_ratio, is_large_text, Rgba, WcagLevel};
pub use error::{Error, Result};
pub use gates::{GateLimits, GateOutcome, SeverityCounts};
pub use types::*;

/// Sitegate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

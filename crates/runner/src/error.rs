//! Error types for page inspection, analysis and orchestration

use thiserror::Error;

/// Errors raised by a page inspector or browser session
#[derive(Error, Debug)]
pub enum InspectorError {
    /// The browser could not be started at all. Fatal for a run.
    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("Navigation to {url} timed out after {timeout_ms} ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Page is closed or was navigated away: {0}")]
    StaleInspector(String),

    #[error("Page script '{script}' threw: {message}")]
    Evaluation { script: String, message: String },

    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    #[error("Browser engine not available: {0}")]
    EngineUnavailable(String),

    /// The engine or backend cannot perform this operation
    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Bridge protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl InspectorError {
    /// Timeouts are downgraded to non-blocking issues at the checker boundary
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            InspectorError::Timeout { .. } | InspectorError::NavigationTimeout { .. }
        )
    }
}

pub type InspectorResult<T> = Result<T, InspectorError>;

/// External AI/vision collaborator failures. Never fatal.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Analysis service unavailable: {0}")]
    Unavailable(String),

    #[error("Analysis service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid analysis response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Orchestrator-level failures. These terminate the run.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Browser launch failed: {0}")]
    BrowserLaunch(#[source] InspectorError),

    #[error(transparent)]
    Config(#[from] sitegate_common::Error),

    #[error("Invalid target URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to write report to {path}: {source}")]
    ReportWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RunnerResult<T> = Result<T, RunnerError>;

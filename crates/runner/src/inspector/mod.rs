//! Page inspection
//!
//! A [`BrowserLauncher`] starts one browser process per run and hands back a
//! [`BrowserSession`]. Every checker opens its own [`PageInspector`] from that
//! session, so DOM state is isolated while the process is shared.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::error::{InspectorError, InspectorResult};

pub mod fixture;
pub mod playwright;
pub mod scripts;
pub mod snapshot;

pub use fixture::{FixtureLauncher, FixtureSite, PageFixture};
pub use playwright::PlaywrightLauncher;
pub use scripts::PageScript;
pub use snapshot::{ComputedStyle, DomElement, DomSnapshot, ImageState, Rect, Viewport};

/// Browser engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Engine {
    pub const ALL: [Engine; 3] = [Engine::Chromium, Engine::Firefox, Engine::Webkit];

    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Chromium => "chromium",
            Engine::Firefox => "firefox",
            Engine::Webkit => "webkit",
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When navigation is considered finished
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Load,
    DomContentLoaded,
    #[default]
    NetworkIdle,
}

impl WaitUntil {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitUntil::Load => "load",
            WaitUntil::DomContentLoaded => "domcontentloaded",
            WaitUntil::NetworkIdle => "networkidle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigateOptions {
    pub wait_until: WaitUntil,
    pub timeout: Duration,
}

impl Default for NavigateOptions {
    fn default() -> Self {
        Self {
            wait_until: WaitUntil::NetworkIdle,
            timeout: Duration::from_millis(30_000),
        }
    }
}

/// Main-document response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationResponse {
    pub status: u16,
    /// URL after redirects
    pub url: String,
    /// Lower-cased header names
    pub headers: BTreeMap<String, String>,
}

impl NavigationResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Response to an out-of-page fetch (robots.txt, sitemap, redirect probes)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchedResource {
    pub status: u16,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl FetchedResource {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub domain: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<String>,
}

/// Resource timing entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceEntry {
    pub url: String,
    /// script, stylesheet, image, font, fetch, other
    pub kind: String,
    pub transfer_size: u64,
    pub duration_ms: f64,
    pub status: Option<u16>,
    pub failed: bool,
}

impl ResourceEntry {
    pub fn is_failure(&self) -> bool {
        self.failed || self.status.map(|s| s >= 400).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleMessage {
    /// log, warning, error, pageerror
    pub level: String,
    pub text: String,
}

impl ConsoleMessage {
    pub fn is_error(&self) -> bool {
        matches!(self.level.as_str(), "error" | "pageerror")
    }
}

/// Hover feedback for the element at `index` in the snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoverState {
    pub index: usize,
    /// Computed style differed while the pointer was over the element
    pub changed: bool,
}

/// Throttled network profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkConditions {
    pub download_bytes_per_sec: f64,
    pub upload_bytes_per_sec: f64,
    pub latency_ms: f64,
}

impl NetworkConditions {
    /// 500 kbit/s each way, 100 ms round trip
    pub const SLOW_3G: Self = Self {
        download_bytes_per_sec: 500.0 * 1024.0 / 8.0,
        upload_bytes_per_sec: 500.0 * 1024.0 / 8.0,
        latency_ms: 100.0,
    };

    /// 10 Mbit/s each way, 20 ms round trip
    pub const FAST_4G: Self = Self {
        download_bytes_per_sec: 10.0 * 1024.0 * 1024.0 / 8.0,
        upload_bytes_per_sec: 10.0 * 1024.0 * 1024.0 / 8.0,
        latency_ms: 20.0,
    };
}

/// Screenshot area
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Region {
    FullPage,
    Clip(Rect),
}

/// PNG-encoded screenshot
#[derive(Clone, PartialEq)]
pub struct Screenshot {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Debug for Screenshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screenshot")
            .field("bytes", &self.png.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl Screenshot {
    pub fn from_png(png: Vec<u8>) -> InspectorResult<Self> {
        let img = image::load_from_memory_with_format(&png, image::ImageFormat::Png)?;
        Ok(Self {
            width: img.width(),
            height: img.height(),
            png,
        })
    }

    pub fn save(&self, path: &Path) -> InspectorResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.png)?;
        Ok(())
    }
}

/// Interrogates one loaded page
///
/// Every operation on a closed page, or after a failed navigation, fails with
/// [`InspectorError::StaleInspector`].
#[async_trait]
pub trait PageInspector: Send + Sync {
    async fn navigate(&self, url: &Url, options: &NavigateOptions) -> InspectorResult<NavigationResponse>;

    /// Run a script in page context and return its JSON result
    async fn evaluate(&self, script: &PageScript) -> InspectorResult<serde_json::Value>;

    async fn snapshot(&self) -> InspectorResult<DomSnapshot> {
        let value = self.evaluate(&scripts::SNAPSHOT).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn screenshot(&self, region: Region) -> InspectorResult<Screenshot>;

    /// GET a URL outside the page, following redirects
    async fn fetch(&self, url: &Url) -> InspectorResult<FetchedResource>;

    async fn cookies(&self) -> InspectorResult<Vec<Cookie>>;

    async fn resources(&self) -> InspectorResult<Vec<ResourceEntry>>;

    async fn console_messages(&self) -> InspectorResult<Vec<ConsoleMessage>>;

    async fn set_viewport(&self, viewport: Viewport) -> InspectorResult<()>;

    /// Move the pointer over up to `limit` interactive elements, in document
    /// order, and report whether each one's computed style changed
    async fn hover_states(&self, limit: usize) -> InspectorResult<Vec<HoverState>>;

    /// Throttle every later request of this page. Call before `navigate`.
    async fn emulate_network(&self, _conditions: &NetworkConditions) -> InspectorResult<()> {
        Err(InspectorError::Unsupported("network emulation".into()))
    }

    /// Release the page. Idempotent. Implementations also release an unclosed
    /// page when it is dropped.
    async fn close(&self);
}

/// Evaluate a script and deserialize its result. `null` maps to `T::default()`.
pub async fn evaluate_as<T>(page: &dyn PageInspector, script: &PageScript) -> InspectorResult<T>
where
    T: DeserializeOwned + Default,
{
    let value = page.evaluate(script).await?;
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value).map_err(|e| InspectorError::Evaluation {
        script: script.name.to_string(),
        message: format!("unexpected result shape: {}", e),
    })
}

/// A running browser process shared by every checker in a run
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Open an isolated page in the given engine
    async fn open_page(&self, engine: Engine) -> InspectorResult<Box<dyn PageInspector>>;

    /// Shut the browser down. Idempotent.
    async fn close(&self);
}

/// Starts browser sessions
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> InspectorResult<Arc<dyn BrowserSession>>;
}

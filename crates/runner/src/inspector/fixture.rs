//! Deterministic inspector backed by JSON page fixtures
//!
//! Used by the test suite and by `--fixture` runs. A [`FixtureSite`] holds one
//! [`PageFixture`] per URL; pages answer named scripts from canned values and
//! render solid-colour screenshots so visual comparisons stay reproducible.

use async_trait::async_trait;
use image::{DynamicImage, ImageOutputFormat, Rgba as Pixel, RgbaImage};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::{
    BrowserLauncher, BrowserSession, ConsoleMessage, Cookie, DomSnapshot, Engine, FetchedResource,
    HoverState, NavigateOptions, NavigationResponse, PageInspector, PageScript, Region, ResourceEntry,
    Screenshot, Viewport,
};
use crate::error::{InspectorError, InspectorResult};

/// How navigation to a fixture page fails, if it does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationFailure {
    Timeout,
    Error(String),
}

/// Filled rectangle drawn over the base screenshot colour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub color: [u8; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotFixture {
    pub width: u32,
    pub height: u32,
    pub color: [u8; 3],
    pub patches: Vec<Patch>,
    /// Extra patches drawn only for one engine
    pub engine_patches: BTreeMap<Engine, Vec<Patch>>,
}

impl Default for ScreenshotFixture {
    fn default() -> Self {
        Self {
            width: 64,
            height: 48,
            color: [255, 255, 255],
            patches: Vec::new(),
            engine_patches: BTreeMap::new(),
        }
    }
}

impl ScreenshotFixture {
    fn render(&self, engine: Engine) -> InspectorResult<Screenshot> {
        let mut img = RgbaImage::from_pixel(
            self.width.max(1),
            self.height.max(1),
            Pixel([self.color[0], self.color[1], self.color[2], 255]),
        );
        let extra = self.engine_patches.get(&engine).map(Vec::as_slice).unwrap_or_default();
        for patch in self.patches.iter().chain(extra) {
            for y in patch.y..(patch.y + patch.height).min(img.height()) {
                for x in patch.x..(patch.x + patch.width).min(img.width()) {
                    img.put_pixel(x, y, Pixel([patch.color[0], patch.color[1], patch.color[2], 255]));
                }
            }
        }
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img).write_to(&mut buf, ImageOutputFormat::Png)?;
        Screenshot::from_png(buf.into_inner())
    }
}

fn default_status() -> u16 {
    200
}

/// Everything a checker can observe about one URL
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageFixture {
    pub url: String,
    /// Final URL after redirects, if different
    pub final_url: Option<String>,
    #[serde(default = "default_status")]
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    /// Raw body returned when this page is fetched rather than navigated
    pub body: String,
    pub snapshot: DomSnapshot,
    /// Snapshots rendered at a specific viewport width
    pub viewports: BTreeMap<u32, DomSnapshot>,
    pub cookies: Vec<Cookie>,
    pub resources: Vec<ResourceEntry>,
    pub console: Vec<ConsoleMessage>,
    /// Canned results for named page scripts. `{"$error": ".."}` makes the script
    /// throw and `{"$timeout": true}` makes it time out.
    pub scripts: BTreeMap<String, serde_json::Value>,
    /// Answer to `hover_states`
    pub hover_states: Vec<HoverState>,
    /// Canned responses for out-of-page fetches, keyed by absolute URL
    pub fetch: BTreeMap<String, FetchedResource>,
    pub screenshot: ScreenshotFixture,
    pub navigation_failure: Option<NavigationFailure>,
    /// Navigation fails only in these engines
    pub engine_failures: BTreeMap<Engine, String>,
}

impl PageFixture {
    pub fn new(url: &str, snapshot: DomSnapshot) -> Self {
        Self {
            url: url.to_string(),
            status: 200,
            snapshot,
            ..Default::default()
        }
    }

    fn response_url(&self) -> &str {
        self.final_url.as_deref().unwrap_or(&self.url)
    }

    fn matches(&self, url: &Url) -> bool {
        same_url(&self.url, url)
    }
}

/// A set of fixture pages plus browser-level behaviour
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureSite {
    pub pages: Vec<PageFixture>,
    pub unavailable_engines: Vec<Engine>,
    /// Makes `launch` fail
    pub launch_error: Option<String>,
}

impl FixtureSite {
    pub fn from_page(page: PageFixture) -> Self {
        Self {
            pages: vec![page],
            ..Default::default()
        }
    }

    /// Load a site from JSON. A bare page object is accepted as a one-page site.
    pub fn load(path: &Path) -> InspectorResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        if value.get("pages").is_some() {
            Ok(serde_json::from_value(value)?)
        } else {
            Ok(Self::from_page(serde_json::from_value(value)?))
        }
    }

    pub fn with_page(mut self, page: PageFixture) -> Self {
        self.pages.push(page);
        self
    }

    fn page(&self, url: &Url) -> Option<usize> {
        self.pages.iter().position(|p| p.matches(url))
    }
}

fn same_url(candidate: &str, url: &Url) -> bool {
    match Url::parse(candidate) {
        Ok(mut parsed) => {
            let mut target = url.clone();
            parsed.set_fragment(None);
            target.set_fragment(None);
            parsed == target
        }
        Err(_) => false,
    }
}

/// Launcher over a [`FixtureSite`]; counts session closes and page lifetimes for assertions
#[derive(Clone)]
pub struct FixtureLauncher {
    site: Arc<FixtureSite>,
    closes: Arc<AtomicUsize>,
    pages_opened: Arc<AtomicUsize>,
    pages_released: Arc<AtomicUsize>,
}

impl FixtureLauncher {
    pub fn new(site: FixtureSite) -> Self {
        Self {
            site: Arc::new(site),
            closes: Arc::new(AtomicUsize::new(0)),
            pages_opened: Arc::new(AtomicUsize::new(0)),
            pages_released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of times a launched session was actually closed
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn pages_opened(&self) -> usize {
        self.pages_opened.load(Ordering::SeqCst)
    }

    /// Pages opened but neither closed nor dropped
    pub fn pages_open(&self) -> usize {
        self.pages_opened() - self.pages_released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for FixtureLauncher {
    async fn launch(&self) -> InspectorResult<Arc<dyn BrowserSession>> {
        if let Some(reason) = &self.site.launch_error {
            return Err(InspectorError::BrowserLaunch(reason.clone()));
        }
        Ok(Arc::new(FixtureSession {
            site: self.site.clone(),
            closed: AtomicBool::new(false),
            closes: self.closes.clone(),
            pages_opened: self.pages_opened.clone(),
            pages_released: self.pages_released.clone(),
        }))
    }
}

struct FixtureSession {
    site: Arc<FixtureSite>,
    closed: AtomicBool,
    closes: Arc<AtomicUsize>,
    pages_opened: Arc<AtomicUsize>,
    pages_released: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserSession for FixtureSession {
    async fn open_page(&self, engine: Engine) -> InspectorResult<Box<dyn PageInspector>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(InspectorError::StaleInspector("browser session is closed".into()));
        }
        if self.site.unavailable_engines.contains(&engine) {
            return Err(InspectorError::EngineUnavailable(engine.to_string()));
        }
        self.pages_opened.fetch_add(1, Ordering::SeqCst);
        let mut page = FixtureInspector::new(self.site.clone(), engine);
        page.released = self.pages_released.clone();
        Ok(Box::new(page))
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[derive(Default)]
struct PageState {
    current: Option<usize>,
    viewport: Option<Viewport>,
    closed: bool,
}

/// One fixture-backed page
pub struct FixtureInspector {
    site: Arc<FixtureSite>,
    engine: Engine,
    state: Mutex<PageState>,
    released: Arc<AtomicUsize>,
}

impl FixtureInspector {
    pub fn new(site: Arc<FixtureSite>, engine: Engine) -> Self {
        Self {
            site,
            engine,
            state: Mutex::new(PageState::default()),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn loaded(&self) -> InspectorResult<&PageFixture> {
        let state = self.state.lock();
        if state.closed {
            return Err(InspectorError::StaleInspector("page is closed".into()));
        }
        state
            .current
            .and_then(|i| self.site.pages.get(i))
            .ok_or_else(|| InspectorError::StaleInspector("no document loaded".into()))
    }
}

#[async_trait]
impl PageInspector for FixtureInspector {
    async fn navigate(&self, url: &Url, options: &NavigateOptions) -> InspectorResult<NavigationResponse> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(InspectorError::StaleInspector("page is closed".into()));
        }
        state.current = None;
        let index = self
            .site
            .page(url)
            .ok_or_else(|| InspectorError::Navigation(format!("net::ERR_NAME_NOT_RESOLVED at {}", url)))?;
        let page = &self.site.pages[index];

        match &page.navigation_failure {
            Some(NavigationFailure::Timeout) => {
                return Err(InspectorError::NavigationTimeout {
                    url: url.to_string(),
                    timeout_ms: options.timeout.as_millis() as u64,
                })
            }
            Some(NavigationFailure::Error(reason)) => {
                return Err(InspectorError::Navigation(reason.clone()))
            }
            None => {}
        }
        if let Some(reason) = page.engine_failures.get(&self.engine) {
            return Err(InspectorError::Navigation(reason.clone()));
        }

        debug!(url = %url, engine = %self.engine, "fixture navigation");
        state.current = Some(index);
        Ok(NavigationResponse {
            status: page.status,
            url: page.response_url().to_string(),
            headers: page
                .headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
                .collect(),
        })
    }

    async fn evaluate(&self, script: &PageScript) -> InspectorResult<serde_json::Value> {
        let page = self.loaded()?;
        match page.scripts.get(script.name) {
            Some(value) => {
                if let Some(message) = value.get("$error").and_then(|m| m.as_str()) {
                    return Err(InspectorError::Evaluation {
                        script: script.name.to_string(),
                        message: message.to_string(),
                    });
                }
                if value.get("$timeout").is_some() {
                    return Err(InspectorError::Timeout {
                        operation: format!("script '{}'", script.name),
                        timeout_ms: 0,
                    });
                }
                Ok(value.clone())
            }
            None if script.name == super::scripts::SNAPSHOT.name => {
                Ok(serde_json::to_value(self.snapshot().await?)?)
            }
            None => Ok(serde_json::Value::Null),
        }
    }

    async fn snapshot(&self) -> InspectorResult<DomSnapshot> {
        let page = self.loaded()?;
        let viewport = self.state.lock().viewport;
        let snapshot = match viewport {
            Some(vp) => {
                let mut snap = page
                    .viewports
                    .get(&vp.width)
                    .cloned()
                    .unwrap_or_else(|| page.snapshot.clone());
                snap.viewport = vp;
                snap
            }
            None => page.snapshot.clone(),
        };
        Ok(snapshot)
    }

    async fn screenshot(&self, _region: Region) -> InspectorResult<Screenshot> {
        let page = self.loaded()?;
        page.screenshot.render(self.engine)
    }

    async fn fetch(&self, url: &Url) -> InspectorResult<FetchedResource> {
        if self.state.lock().closed {
            return Err(InspectorError::StaleInspector("page is closed".into()));
        }
        let current = self.state.lock().current.and_then(|i| self.site.pages.get(i));
        if let Some(found) = current
            .and_then(|p| p.fetch.iter().find(|(k, _)| same_url(k, url)))
            .map(|(_, v)| v.clone())
        {
            let mut found = found;
            if found.url.is_empty() {
                found.url = url.to_string();
            }
            return Ok(found);
        }
        if let Some(page) = self.site.page(url).and_then(|i| self.site.pages.get(i)) {
            return Ok(FetchedResource {
                status: page.status,
                url: page.response_url().to_string(),
                headers: page.headers.clone(),
                body: page.body.clone(),
            });
        }
        Ok(FetchedResource {
            status: 404,
            url: url.to_string(),
            ..Default::default()
        })
    }

    async fn cookies(&self) -> InspectorResult<Vec<Cookie>> {
        Ok(self.loaded()?.cookies.clone())
    }

    async fn resources(&self) -> InspectorResult<Vec<ResourceEntry>> {
        Ok(self.loaded()?.resources.clone())
    }

    async fn console_messages(&self) -> InspectorResult<Vec<ConsoleMessage>> {
        Ok(self.loaded()?.console.clone())
    }

    async fn set_viewport(&self, viewport: Viewport) -> InspectorResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(InspectorError::StaleInspector("page is closed".into()));
        }
        state.viewport = Some(viewport);
        Ok(())
    }

    async fn hover_states(&self, limit: usize) -> InspectorResult<Vec<HoverState>> {
        Ok(self.loaded()?.hover_states.iter().take(limit).cloned().collect())
    }

    async fn close(&self) {
        let mut state = self.state.lock();
        if !state.closed {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
        state.closed = true;
        state.current = None;
    }
}

impl Drop for FixtureInspector {
    fn drop(&mut self) {
        if !self.state.get_mut().closed {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

//! Playwright-backed inspector
//!
//! One `node` process hosts a small bridge script for the whole run. Requests
//! and replies are JSON lines on stdin/stdout, correlated by id:
//!
//! ```text
//! -> {"id": 7, "op": "goto", "page": 2, "url": "...", "wait_until": "load", "timeout": 30000}
//! <- {"id": 7, "ok": true, "result": {"status": 200, "url": "...", "headers": {...}}}
//! <- {"id": 8, "ok": false, "error": {"kind": "timeout", "message": "..."}}
//! ```

use async_trait::async_trait;
use base64::Engine as _;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use url::Url;

use super::{
    evaluate_as, scripts, BrowserLauncher, BrowserSession, Cookie, ConsoleMessage, Engine,
    FetchedResource, HoverState, NavigateOptions, NavigationResponse, NetworkConditions,
    PageInspector, PageScript, Region, ResourceEntry, Screenshot, Viewport,
};
use crate::config::BrowserConfig;
use crate::error::{InspectorError, InspectorResult};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Extra time the bridge gets beyond the browser-side navigation timeout
const REPLY_SLACK: Duration = Duration::from_secs(5);

const BRIDGE_TEMPLATE: &str = r#"
const playwright = require('playwright');
const readline = require('readline');

const HEADLESS = __HEADLESS__;
const DEFAULT_ENGINE = '__ENGINE__';
const DEFAULT_VIEWPORT = { width: __WIDTH__, height: __HEIGHT__ };

const INTERACTIVE = 'a[href], button, input:not([type=hidden]), select, textarea, [role=button]';
const HOVER_PROPS = ['color', 'backgroundColor', 'borderColor', 'textDecorationLine', 'boxShadow', 'opacity', 'transform'];

const browsers = {};
const pages = new Map();
let nextPage = 1;

function fail(kind, message) {
  const err = new Error(message);
  err.kind = kind;
  return err;
}

async function browserFor(engine) {
  if (!browsers[engine]) {
    const type = playwright[engine];
    if (!type) throw fail('engine_unavailable', 'unknown engine ' + engine);
    try {
      browsers[engine] = await type.launch({ headless: HEADLESS });
    } catch (e) {
      throw fail(engine === DEFAULT_ENGINE ? 'launch' : 'engine_unavailable', e.message);
    }
  }
  return browsers[engine];
}

function entry(id) {
  const state = pages.get(id);
  if (!state) throw fail('closed', 'page ' + id + ' is closed');
  return state;
}

function loaded(id) {
  const state = entry(id);
  if (!state.loaded) throw fail('closed', 'no document loaded in page ' + id);
  return state;
}

const handlers = {
  async ping() {
    await browserFor(DEFAULT_ENGINE);
    return { ready: true };
  },
  async new_page({ engine, viewport }) {
    const browser = await browserFor(engine);
    const context = await browser.newContext({ viewport: viewport || DEFAULT_VIEWPORT });
    const page = await context.newPage();
    const id = nextPage++;
    const state = { context, page, console: [], failed: [], loaded: false };
    page.on('console', (m) => state.console.push({ level: m.type(), text: m.text() }));
    page.on('pageerror', (e) => state.console.push({ level: 'pageerror', text: e.message }));
    page.on('requestfailed', (r) => state.failed.push({
      url: r.url(), kind: r.resourceType(), transfer_size: 0, duration_ms: 0, status: null, failed: true,
    }));
    pages.set(id, state);
    return { page: id };
  },
  async goto({ page, url, wait_until, timeout }) {
    const state = entry(page);
    state.loaded = false;
    state.console = [];
    state.failed = [];
    let resp;
    try {
      resp = await state.page.goto(url, { waitUntil: wait_until, timeout });
    } catch (e) {
      throw fail(e.name === 'TimeoutError' ? 'timeout' : 'navigation', e.message);
    }
    state.loaded = true;
    return {
      status: resp ? resp.status() : 0,
      url: state.page.url(),
      headers: resp ? await resp.allHeaders() : {},
    };
  },
  async evaluate({ page, source }) {
    const state = loaded(page);
    try {
      const value = await state.page.evaluate(source);
      return value === undefined ? null : value;
    } catch (e) {
      throw fail('evaluation', e.message);
    }
  },
  async screenshot({ page, clip }) {
    const state = loaded(page);
    try {
      const buf = await state.page.screenshot(clip ? { clip } : { fullPage: true });
      return { png: buf.toString('base64') };
    } catch (e) {
      throw fail('screenshot', e.message);
    }
  },
  async cookies({ page }) {
    return await loaded(page).context.cookies();
  },
  async failed_requests({ page }) {
    return loaded(page).failed;
  },
  async console({ page }) {
    return loaded(page).console;
  },
  async viewport({ page, width, height }) {
    await entry(page).page.setViewportSize({ width, height });
    return {};
  },
  async hover_states({ page, limit }) {
    const state = loaded(page);
    const styleOf = (el, props) => { const cs = getComputedStyle(el); return props.map((p) => cs[p]).join('|'); };
    const out = [];
    for (const handle of await state.page.$$(INTERACTIVE)) {
      if (out.length >= limit) break;
      try {
        if (!(await handle.isVisible())) continue;
        const index = await handle.evaluate((el) => Array.from(document.querySelectorAll('*')).slice(0, 5000).indexOf(el));
        if (index < 0) continue;
        const before = await handle.evaluate(styleOf, HOVER_PROPS);
        await handle.hover({ timeout: 1000 });
        const after = await handle.evaluate(styleOf, HOVER_PROPS);
        out.push({ index, changed: before !== after });
      } catch (_) {}
    }
    await state.page.mouse.move(0, 0).catch(() => {});
    return out;
  },
  async throttle({ page, download, upload, latency }) {
    const state = entry(page);
    if (!state.cdp) {
      state.cdp = await state.context.newCDPSession(state.page);
      await state.cdp.send('Network.enable');
    }
    await state.cdp.send('Network.emulateNetworkConditions', {
      offline: false,
      downloadThroughput: download,
      uploadThroughput: upload,
      latency,
    });
    return {};
  },
  async close_page({ page }) {
    const state = pages.get(page);
    if (state) {
      pages.delete(page);
      await state.context.close().catch(() => {});
    }
    return {};
  },
  async shutdown() {
    for (const b of Object.values(browsers)) await b.close().catch(() => {});
    setImmediate(() => process.exit(0));
    return {};
  },
};

const rl = readline.createInterface({ input: process.stdin });
rl.on('line', async (line) => {
  let msg;
  try { msg = JSON.parse(line); } catch (_) { return; }
  const reply = { id: msg.id };
  try {
    const handler = handlers[msg.op];
    if (!handler) throw fail('protocol', 'unknown op ' + msg.op);
    reply.result = await handler(msg);
    reply.ok = true;
  } catch (e) {
    reply.ok = false;
    reply.error = { kind: e.kind || 'protocol', message: String((e && e.message) || e) };
  }
  process.stdout.write(JSON.stringify(reply) + '\n');
});
rl.on('close', async () => {
  for (const b of Object.values(browsers)) await b.close().catch(() => {});
  process.exit(0);
});
"#;

/// Render the bridge script for a browser configuration
pub fn build_bridge_script(config: &BrowserConfig) -> String {
    BRIDGE_TEMPLATE
        .replace("__HEADLESS__", if config.headless { "true" } else { "false" })
        .replace("__ENGINE__", config.engine.as_str())
        .replace("__WIDTH__", &config.viewport_width.to_string())
        .replace("__HEIGHT__", &config.viewport_height.to_string())
}

#[derive(Debug, Deserialize)]
struct Reply {
    id: u64,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<ReplyError>,
}

#[derive(Debug, Deserialize)]
struct ReplyError {
    kind: String,
    message: String,
}

impl ReplyError {
    fn into_inspector_error(self, op: &str, timeout_ms: u64) -> InspectorError {
        match self.kind.as_str() {
            "timeout" => InspectorError::Timeout {
                operation: op.to_string(),
                timeout_ms,
            },
            "navigation" => InspectorError::Navigation(self.message),
            "evaluation" => InspectorError::Evaluation {
                script: op.to_string(),
                message: self.message,
            },
            "closed" => InspectorError::StaleInspector(self.message),
            "screenshot" => InspectorError::Screenshot(self.message),
            "engine_unavailable" => InspectorError::EngineUnavailable(self.message),
            "launch" => InspectorError::BrowserLaunch(self.message),
            _ => InspectorError::Protocol(format!("{}: {}", op, self.message)),
        }
    }
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

/// The node process and its request pipe
struct Bridge {
    child: Mutex<Option<Child>>,
    stdin: tokio::sync::Mutex<ChildStdin>,
    pending: Pending,
    next_id: AtomicU64,
    closed: AtomicBool,
    // keeps bridge.js on disk for the process lifetime
    _script_dir: TempDir,
}

impl Bridge {
    async fn spawn(config: &BrowserConfig) -> InspectorResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, build_bridge_script(config))?;

        let mut cmd = Command::new(&config.node_binary);
        cmd.arg(&script_path)
            .current_dir(script_dir.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(modules) = &config.node_modules {
            cmd.env("NODE_PATH", modules);
        }

        let mut child = cmd.spawn().map_err(|e| {
            InspectorError::BrowserLaunch(format!(
                "Failed to spawn {}: {}",
                config.node_binary.display(),
                e
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| InspectorError::BrowserLaunch("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| InspectorError::BrowserLaunch("bridge stdout unavailable".into()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "sitegate::bridge", "{}", line);
                }
            });
        }

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let reader_pending = pending.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match serde_json::from_str::<Reply>(&line) {
                    Ok(reply) => {
                        let sender = reader_pending.lock().remove(&reply.id);
                        if let Some(tx) = sender {
                            let _ = tx.send(reply);
                        }
                    }
                    Err(_) => debug!(target: "sitegate::bridge", "{}", line),
                }
            }
            // dropping the senders fails every in-flight request
            reader_pending.lock().clear();
        });

        Ok(Self {
            child: Mutex::new(Some(child)),
            stdin: tokio::sync::Mutex::new(stdin),
            pending,
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            _script_dir: script_dir,
        })
    }

    async fn request(&self, op: &str, params: Value, deadline: Duration) -> InspectorResult<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(InspectorError::StaleInspector("browser session is closed".into()));
        }
        self.call(op, params, deadline).await
    }

    async fn call(&self, op: &str, params: Value, deadline: Duration) -> InspectorResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut message = match params {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        message.insert("id".into(), json!(id));
        message.insert("op".into(), json!(op));
        let mut line = serde_json::to_string(&message)?;
        line.push('\n');

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let written = {
            let mut stdin = self.stdin.lock().await;
            match stdin.write_all(line.as_bytes()).await {
                Ok(()) => stdin.flush().await,
                Err(e) => Err(e),
            }
        };
        if let Err(e) = written {
            self.pending.lock().remove(&id);
            return Err(InspectorError::Protocol(format!("bridge write failed: {}", e)));
        }

        let timeout_ms = deadline.as_millis() as u64;
        match timeout(deadline, rx).await {
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(InspectorError::Timeout {
                    operation: op.to_string(),
                    timeout_ms,
                })
            }
            Ok(Err(_)) => Err(InspectorError::Protocol(format!(
                "bridge exited before answering '{}'",
                op
            ))),
            Ok(Ok(reply)) if reply.ok => Ok(reply.result),
            Ok(Ok(reply)) => Err(reply
                .error
                .map(|e| e.into_inspector_error(op, timeout_ms))
                .unwrap_or_else(|| InspectorError::Protocol(format!("'{}' failed without detail", op)))),
        }
    }

    /// Ask the bridge to exit, then escalate to SIGTERM and kill
    async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.call("shutdown", json!({}), SHUTDOWN_GRACE).await {
            debug!("Bridge shutdown request failed: {}", e);
        }

        let child = self.child.lock().take();
        let Some(mut child) = child else { return };
        if timeout(SHUTDOWN_GRACE, child.wait()).await.is_ok() {
            return;
        }

        warn!("Bridge did not exit, terminating (pid: {:?})", child.id());
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                    sleep(Duration::from_millis(500)).await;
                }
            }
        }
        let _ = child.kill().await;
    }
}

/// Launches a Playwright browser through a node bridge
#[derive(Debug, Clone)]
pub struct PlaywrightLauncher {
    config: BrowserConfig,
}

impl PlaywrightLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrowserLauncher for PlaywrightLauncher {
    async fn launch(&self) -> InspectorResult<Arc<dyn BrowserSession>> {
        let session = PlaywrightSession::start(self.config.clone()).await?;
        Ok(Arc::new(session))
    }
}

/// A running bridge process
pub struct PlaywrightSession {
    bridge: Arc<Bridge>,
    http: reqwest::Client,
    config: BrowserConfig,
}

impl PlaywrightSession {
    pub async fn start(config: BrowserConfig) -> InspectorResult<Self> {
        info!("Starting {} via {}", config.engine, config.node_binary.display());
        let bridge = Arc::new(Bridge::spawn(&config).await?);

        // the first ping launches the default engine
        let startup = Duration::from_millis(config.startup_timeout_ms);
        if let Err(e) = bridge.request("ping", json!({}), startup).await {
            bridge.shutdown().await;
            return Err(match e {
                InspectorError::BrowserLaunch(msg) => InspectorError::BrowserLaunch(msg),
                other => InspectorError::BrowserLaunch(other.to_string()),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.navigation_timeout_ms))
            .user_agent(concat!("sitegate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        info!("Browser ready");
        Ok(Self { bridge, http, config })
    }
}

#[async_trait]
impl BrowserSession for PlaywrightSession {
    async fn open_page(&self, engine: Engine) -> InspectorResult<Box<dyn PageInspector>> {
        let viewport = self.config.viewport();
        let startup = Duration::from_millis(self.config.startup_timeout_ms);
        let result = self
            .bridge
            .request("new_page", json!({ "engine": engine, "viewport": viewport }), startup)
            .await?;
        let id = result
            .get("page")
            .and_then(Value::as_u64)
            .ok_or_else(|| InspectorError::Protocol("new_page returned no page id".into()))?;
        debug!("Opened {} page {}", engine, id);

        Ok(Box::new(PlaywrightPage {
            bridge: self.bridge.clone(),
            id,
            engine,
            http: self.http.clone(),
            script_timeout: Duration::from_millis(self.config.navigation_timeout_ms),
            state: Mutex::new(PageState::default()),
        }))
    }

    async fn close(&self) {
        info!("Shutting down browser");
        self.bridge.shutdown().await;
    }
}

#[derive(Debug, Default)]
struct PageState {
    loaded: bool,
    closed: bool,
}

/// One isolated browser context
pub struct PlaywrightPage {
    bridge: Arc<Bridge>,
    id: u64,
    engine: Engine,
    http: reqwest::Client,
    script_timeout: Duration,
    state: Mutex<PageState>,
}

impl PlaywrightPage {
    fn ensure_loaded(&self) -> InspectorResult<()> {
        let state = self.state.lock();
        if state.closed {
            return Err(InspectorError::StaleInspector(format!("page {} is closed", self.id)));
        }
        if !state.loaded {
            return Err(InspectorError::StaleInspector(format!(
                "page {} has no document loaded",
                self.id
            )));
        }
        Ok(())
    }

    async fn page_request(&self, op: &str, mut params: Value) -> InspectorResult<Value> {
        self.ensure_loaded()?;
        params["page"] = json!(self.id);
        self.bridge.request(op, params, self.script_timeout).await
    }
}

#[async_trait]
impl PageInspector for PlaywrightPage {
    async fn navigate(&self, url: &Url, options: &NavigateOptions) -> InspectorResult<NavigationResponse> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(InspectorError::StaleInspector(format!("page {} is closed", self.id)));
            }
            state.loaded = false;
        }

        let timeout_ms = options.timeout.as_millis() as u64;
        let params = json!({
            "page": self.id,
            "url": url.as_str(),
            "wait_until": options.wait_until.as_str(),
            "timeout": timeout_ms,
        });
        let result = self
            .bridge
            .request("goto", params, options.timeout + REPLY_SLACK)
            .await
            .map_err(|e| match e {
                InspectorError::Timeout { .. } => InspectorError::NavigationTimeout {
                    url: url.to_string(),
                    timeout_ms,
                },
                other => other,
            })?;

        let mut response: NavigationResponse = serde_json::from_value(result)?;
        response.headers = response
            .headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        self.state.lock().loaded = true;
        Ok(response)
    }

    async fn evaluate(&self, script: &PageScript) -> InspectorResult<Value> {
        self.page_request("evaluate", json!({ "source": script.source }))
            .await
            .map_err(|e| match e {
                InspectorError::Evaluation { message, .. } => InspectorError::Evaluation {
                    script: script.name.to_string(),
                    message,
                },
                InspectorError::Timeout { timeout_ms, .. } => InspectorError::Timeout {
                    operation: format!("script '{}'", script.name),
                    timeout_ms,
                },
                other => other,
            })
    }

    async fn screenshot(&self, region: Region) -> InspectorResult<Screenshot> {
        let clip = match region {
            Region::FullPage => Value::Null,
            Region::Clip(rect) => serde_json::to_value(rect)?,
        };
        let result = self.page_request("screenshot", json!({ "clip": clip })).await?;
        let encoded = result
            .get("png")
            .and_then(Value::as_str)
            .ok_or_else(|| InspectorError::Screenshot("bridge returned no image".into()))?;
        let png = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| InspectorError::Screenshot(format!("invalid base64: {}", e)))?;
        Screenshot::from_png(png)
    }

    async fn fetch(&self, url: &Url) -> InspectorResult<FetchedResource> {
        let response = self.http.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                InspectorError::Timeout {
                    operation: format!("fetch {}", url),
                    timeout_ms: self.script_timeout.as_millis() as u64,
                }
            } else {
                InspectorError::Http(e)
            }
        })?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let body = response.text().await?;
        Ok(FetchedResource {
            status,
            url: final_url,
            headers,
            body,
        })
    }

    async fn cookies(&self) -> InspectorResult<Vec<Cookie>> {
        let value = self.page_request("cookies", json!({})).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn resources(&self) -> InspectorResult<Vec<ResourceEntry>> {
        let mut entries: Vec<ResourceEntry> = evaluate_as(self, &scripts::RESOURCE_TIMING).await?;
        let failed = self.page_request("failed_requests", json!({})).await?;
        let failed: Vec<ResourceEntry> = serde_json::from_value(failed)?;
        entries.extend(failed);
        Ok(entries)
    }

    async fn console_messages(&self) -> InspectorResult<Vec<ConsoleMessage>> {
        let value = self.page_request("console", json!({})).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn set_viewport(&self, viewport: Viewport) -> InspectorResult<()> {
        if self.state.lock().closed {
            return Err(InspectorError::StaleInspector(format!("page {} is closed", self.id)));
        }
        let params = json!({ "page": self.id, "width": viewport.width, "height": viewport.height });
        self.bridge.request("viewport", params, self.script_timeout).await?;
        Ok(())
    }

    async fn hover_states(&self, limit: usize) -> InspectorResult<Vec<HoverState>> {
        let value = self.page_request("hover_states", json!({ "limit": limit })).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn emulate_network(&self, conditions: &NetworkConditions) -> InspectorResult<()> {
        // CDP network emulation exists only in chromium
        if self.engine != Engine::Chromium {
            return Err(InspectorError::Unsupported(format!("network emulation on {}", self.engine)));
        }
        if self.state.lock().closed {
            return Err(InspectorError::StaleInspector(format!("page {} is closed", self.id)));
        }
        let params = json!({
            "page": self.id,
            "download": conditions.download_bytes_per_sec,
            "upload": conditions.upload_bytes_per_sec,
            "latency": conditions.latency_ms,
        });
        self.bridge.request("throttle", params, self.script_timeout).await?;
        Ok(())
    }

    async fn close(&self) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.loaded = false;
        }
        if let Err(e) = self
            .bridge
            .request("close_page", json!({ "page": self.id }), SHUTDOWN_GRACE)
            .await
        {
            debug!("Closing page {} failed: {}", self.id, e);
        }
    }
}

// A checker cut off by its timeout drops the page without awaiting `close`
impl Drop for PlaywrightPage {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.closed {
            return;
        }
        state.closed = true;
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let bridge = self.bridge.clone();
        let id = self.id;
        runtime.spawn(async move {
            if let Err(e) = bridge.request("close_page", json!({ "page": id }), SHUTDOWN_GRACE).await {
                debug!("Releasing dropped page {} failed: {}", id, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_script_substitution() {
        let config = BrowserConfig {
            engine: Engine::Firefox,
            headless: false,
            viewport_width: 1440,
            viewport_height: 900,
            ..Default::default()
        };
        let script = build_bridge_script(&config);
        assert!(script.contains("const HEADLESS = false;"));
        assert!(script.contains("const DEFAULT_ENGINE = 'firefox';"));
        assert!(script.contains("{ width: 1440, height: 900 }"));
        assert!(!script.contains("__"));
    }

    #[test]
    fn test_bridge_handles_every_op() {
        let script = build_bridge_script(&BrowserConfig::default());
        for op in [
            "ping",
            "new_page",
            "goto",
            "evaluate",
            "screenshot",
            "cookies",
            "failed_requests",
            "console",
            "viewport",
            "hover_states",
            "throttle",
            "close_page",
            "shutdown",
        ] {
            assert!(script.contains(&format!("async {}(", op)), "missing handler {}", op);
        }
    }

    #[test]
    fn test_reply_error_mapping() {
        let err = ReplyError {
            kind: "timeout".into(),
            message: "Timeout 30000ms exceeded".into(),
        }
        .into_inspector_error("goto", 30_000);
        assert!(err.is_timeout());

        let err = ReplyError {
            kind: "closed".into(),
            message: "page 3 is closed".into(),
        }
        .into_inspector_error("evaluate", 1000);
        assert!(matches!(err, InspectorError::StaleInspector(_)));

        let err = ReplyError {
            kind: "weird".into(),
            message: "boom".into(),
        }
        .into_inspector_error("cookies", 1000);
        assert!(matches!(err, InspectorError::Protocol(m) if m == "cookies: boom"));
    }

    #[test]
    fn test_reply_parses_without_result() {
        let reply: Reply =
            serde_json::from_str(r#"{"id": 4, "ok": false, "error": {"kind": "navigation", "message": "net::ERR"}}"#)
                .unwrap();
        assert_eq!(reply.id, 4);
        assert!(!reply.ok);
        assert!(reply.result.is_null());
    }

    #[tokio::test]
    async fn test_missing_node_is_launch_failure() {
        let config = BrowserConfig {
            node_binary: "/nonexistent/sitegate-node".into(),
            ..Default::default()
        };
        let err = PlaywrightLauncher::new(config).launch().await.err().unwrap();
        assert!(matches!(err, InspectorError::BrowserLaunch(_)));
    }
}

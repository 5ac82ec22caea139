//! Page-context scripts
//!
//! Each script is a single JS expression evaluated by the browser. Fixture
//! inspectors answer them by `name` instead of running the source. Scripts
//! that move focus restore the previous focus before returning.

/// A named script evaluated in page context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageScript {
    pub name: &'static str,
    pub source: &'static str,
}

impl PageScript {
    pub const fn new(name: &'static str, source: &'static str) -> Self {
        Self { name, source }
    }
}

/// Flattened DOM in document order, see [`super::DomSnapshot`]
pub const SNAPSHOT: PageScript = PageScript::new(
    "snapshot",
    r#"(() => {
  const MAX_ELEMENTS = 5000;
  const MAX_TEXT = 2000;
  const MAX_SCRIPT_TEXT = 20000;
  const px = (v) => { const n = parseFloat(v); return Number.isFinite(n) ? n : null; };
  const all = Array.from(document.querySelectorAll('*')).slice(0, MAX_ELEMENTS);
  const index = new Map(all.map((el, i) => [el, i]));
  const elements = all.map((el) => {
    const cs = getComputedStyle(el);
    const r = el.getBoundingClientRect();
    const attrs = {};
    for (const a of el.attributes) attrs[a.name] = a.value;
    const limit = el.tagName === 'SCRIPT' ? MAX_SCRIPT_TEXT : MAX_TEXT;
    const text = (el.textContent || '').replace(/\s+/g, ' ').trim().slice(0, limit);
    const direct = Array.from(el.childNodes).some((n) => n.nodeType === 3 && n.textContent.trim().length > 0);
    const item = {
      tag: el.tagName.toLowerCase(),
      attrs,
      text,
      has_direct_text: direct,
      parent: el.parentElement && index.has(el.parentElement) ? index.get(el.parentElement) : null,
      style: {
        font_size: px(cs.fontSize) ?? 16,
        font_weight: parseInt(cs.fontWeight, 10) || 400,
        font_family: cs.fontFamily,
        line_height: px(cs.lineHeight),
        letter_spacing: px(cs.letterSpacing),
        color: cs.color,
        background_color: cs.backgroundColor,
        display: cs.display,
        visibility: cs.visibility,
        opacity: parseFloat(cs.opacity),
        position: cs.position,
        float: cs.float || cs.cssFloat || 'none',
        margin_left: px(cs.marginLeft) ?? 0,
        margin_right: px(cs.marginRight) ?? 0,
        margin_top: px(cs.marginTop) ?? 0,
        outline_style: cs.outlineStyle,
        cursor: cs.cursor,
      },
      rect: { x: r.left + window.scrollX, y: r.top + window.scrollY, width: r.width, height: r.height },
      visible: !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length),
      has_click_handler: typeof el.onclick === 'function' || el.hasAttribute('onclick'),
      image: null,
    };
    if (item.tag === 'img') {
      item.image = {
        complete: el.complete,
        natural_width: el.naturalWidth,
        natural_height: el.naturalHeight,
        current_src: el.currentSrc || el.src || null,
      };
    }
    return item;
  });
  return {
    url: location.href,
    title: document.title || null,
    lang: document.documentElement.getAttribute('lang'),
    viewport: { width: window.innerWidth, height: window.innerHeight },
    scroll_width: document.documentElement.scrollWidth,
    scroll_height: document.documentElement.scrollHeight,
    elements,
  };
})()"#,
);

/// Core Web Vitals and navigation timing, see [`crate::checkers::performance::WebVitals`]
pub const WEB_VITALS: PageScript = PageScript::new(
    "web_vitals",
    r#"(async () => {
  const observe = (type, pick) => new Promise((resolve) => {
    let value = null;
    try {
      const po = new PerformanceObserver((list) => { for (const e of list.getEntries()) value = pick(e, value); });
      po.observe({ type, buffered: true });
      setTimeout(() => { po.disconnect(); resolve(value); }, 3000);
    } catch (_) { resolve(null); }
  });
  // script time inside long animation frames, falling back to long tasks
  const total = (type, pick) => new Promise((resolve) => {
    if (!(PerformanceObserver.supportedEntryTypes || []).includes(type)) return resolve(null);
    let sum = 0;
    const po = new PerformanceObserver((list) => { for (const e of list.getEntries()) sum += pick(e); });
    po.observe({ type, buffered: true });
    setTimeout(() => { po.disconnect(); resolve(sum); }, 3000);
  });
  const [lcp, cls, fid, loaf, longtask] = await Promise.all([
    observe('largest-contentful-paint', (e) => e.renderTime || e.loadTime || e.startTime),
    observe('layout-shift', (e, acc) => e.hadRecentInput ? acc : (acc || 0) + e.value),
    observe('first-input', (e) => e.processingStart - e.startTime),
    total('long-animation-frame', (e) => (e.scripts || []).reduce((s, x) => s + x.duration, 0)),
    total('longtask', (e) => e.duration),
  ]);
  const nav = performance.getEntriesByType('navigation')[0] || {};
  const paint = Object.fromEntries(performance.getEntriesByType('paint').map((p) => [p.name, p.startTime]));
  return {
    lcp_ms: lcp,
    cls,
    fid_ms: fid,
    fcp_ms: paint['first-contentful-paint'] ?? null,
    first_paint_ms: paint['first-paint'] ?? null,
    ttfb_ms: nav.responseStart != null ? nav.responseStart - (nav.requestStart || 0) : null,
    dom_content_loaded_ms: nav.domContentLoadedEventEnd ?? null,
    load_ms: nav.loadEventEnd ?? null,
    js_heap_bytes: performance.memory ? performance.memory.usedJSHeapSize : null,
    js_execution_ms: loaf ?? longtask,
  };
})()"#,
);

/// Resource timing entries
pub const RESOURCE_TIMING: PageScript = PageScript::new(
    "resource_timing",
    r#"(() => performance.getEntriesByType('resource').map((r) => ({
  url: r.name,
  kind: ({ script: 'script', link: 'stylesheet', css: 'stylesheet', img: 'image', image: 'image',
           fetch: 'fetch', xmlhttprequest: 'fetch' })[r.initiatorType] || (/\.woff2?$/.test(r.name) ? 'font' : 'other'),
  transfer_size: r.transferSize || r.encodedBodySize || 0,
  duration_ms: r.duration,
  status: r.responseStatus || null,
  failed: false,
})))()"#,
);

/// Web font load status
pub const FONT_FACES: PageScript = PageScript::new(
    "font_faces",
    r#"(async () => {
  await document.fonts.ready;
  return Array.from(document.fonts).map((f) => ({ family: f.family.replace(/['"]/g, ''), status: f.status }));
})()"#,
);

/// Focus feedback for interactive elements, keyed by snapshot index
pub const FOCUS_STATES: PageScript = PageScript::new(
    "focus_states",
    r#"(() => {
  const all = Array.from(document.querySelectorAll('*')).slice(0, 5000);
  const interactive = 'a[href], button, input:not([type=hidden]), select, textarea, [role=button]';
  const props = ['color', 'backgroundColor', 'borderColor', 'textDecorationLine', 'boxShadow', 'opacity', 'transform'];
  const snap = (el) => { const cs = getComputedStyle(el); return props.map((p) => cs[p]).join('|'); };
  const previous = document.activeElement;
  const out = [];
  all.forEach((el, index) => {
    if (!el.matches(interactive) || out.length >= 200) return;
    const before = snap(el);
    let focus = false;
    try {
      el.focus({ preventScroll: true });
      const cs = getComputedStyle(el);
      focus = document.activeElement === el &&
        ((cs.outlineStyle !== 'none' && parseFloat(cs.outlineWidth) > 0) || snap(el) !== before);
      el.blur();
    } catch (_) {}
    out.push({ index, focus_visible: focus });
  });
  if (previous && typeof previous.focus === 'function') previous.focus({ preventScroll: true });
  return out;
})()"#,
);

/// CSS and JS feature support in the running engine
pub const FEATURE_SUPPORT: PageScript = PageScript::new(
    "feature_support",
    r#"(() => ({
  css: {
    grid: CSS.supports('display', 'grid'),
    flexbox: CSS.supports('display', 'flex'),
    custom_properties: CSS.supports('--x', '0'),
    container_queries: CSS.supports('container-type', 'inline-size'),
    has_selector: CSS.supports('selector(:has(a))'),
    aspect_ratio: CSS.supports('aspect-ratio', '1'),
    backdrop_filter: CSS.supports('backdrop-filter', 'blur(1px)') || CSS.supports('-webkit-backdrop-filter', 'blur(1px)'),
    sticky: CSS.supports('position', 'sticky'),
  },
  js: {
    promise: typeof Promise !== 'undefined',
    fetch: typeof fetch === 'function',
    intersection_observer: 'IntersectionObserver' in window,
    resize_observer: 'ResizeObserver' in window,
    custom_elements: 'customElements' in window,
    structured_clone: typeof structuredClone === 'function',
    web_animations: typeof Element.prototype.animate === 'function',
  },
}))()"#,
);

//! Serializable DOM snapshot
//!
//! A flattened, document-ordered view of a rendered page. Live inspectors build
//! it with a single page script; fixtures deserialize it from JSON. Checkers
//! only ever read it, so identical snapshots give identical issues.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use sitegate_common::Rgba;

/// Width/height pair in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Bounding box in CSS pixels, relative to the document
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Subset of the computed style checkers care about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputedStyle {
    pub font_size: f64,
    pub font_weight: u16,
    pub font_family: String,
    /// Used line height in px; `None` for `normal`
    pub line_height: Option<f64>,
    /// Letter spacing in px; `None` for `normal`
    pub letter_spacing: Option<f64>,
    pub color: String,
    /// Own background; may be transparent
    pub background_color: String,
    pub display: String,
    pub visibility: String,
    pub opacity: f64,
    pub position: String,
    pub float: String,
    pub margin_left: f64,
    pub margin_right: f64,
    pub margin_top: f64,
    pub outline_style: String,
    pub cursor: String,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            font_size: 16.0,
            font_weight: 400,
            font_family: "sans-serif".to_string(),
            line_height: None,
            letter_spacing: None,
            color: "rgb(0, 0, 0)".to_string(),
            background_color: "rgba(0, 0, 0, 0)".to_string(),
            display: "block".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
            position: "static".to_string(),
            float: "none".to_string(),
            margin_left: 0.0,
            margin_right: 0.0,
            margin_top: 0.0,
            outline_style: "none".to_string(),
            cursor: "auto".to_string(),
        }
    }
}

/// Load state of an `<img>`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageState {
    pub complete: bool,
    pub natural_width: u32,
    pub natural_height: u32,
    pub current_src: Option<String>,
}

impl ImageState {
    /// Finished loading but has no pixels
    pub fn failed(&self) -> bool {
        self.complete && self.natural_width == 0
    }
}

/// One element, in document order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomElement {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    /// Whitespace-collapsed text content, truncated by the collector
    pub text: String,
    /// Has a non-empty text node as a direct child
    pub has_direct_text: bool,
    /// Index of the parent element in the snapshot
    pub parent: Option<usize>,
    pub style: ComputedStyle,
    pub rect: Rect,
    pub visible: bool,
    pub has_click_handler: bool,
    pub image: Option<ImageState>,
}

impl Default for DomElement {
    fn default() -> Self {
        Self {
            tag: String::new(),
            attrs: BTreeMap::new(),
            text: String::new(),
            has_direct_text: false,
            parent: None,
            style: ComputedStyle::default(),
            rect: Rect::default(),
            visible: true,
            has_click_handler: false,
            image: None,
        }
    }
}

const NATIVELY_FOCUSABLE: &[&str] = &["a", "button", "input", "select", "textarea", "summary", "iframe"];

impl DomElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self.has_direct_text = !text.trim().is_empty();
        self
    }

    pub fn with_parent(mut self, parent: usize) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /// Attribute value, trimmed, `None` when absent or blank
    pub fn non_empty_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag == tag
    }

    /// Heading level for h1..h6
    pub fn heading_level(&self) -> Option<u8> {
        let bytes = self.tag.as_bytes();
        if bytes.len() == 2 && bytes[0] == b'h' && (b'1'..=b'6').contains(&bytes[1]) {
            Some(bytes[1] - b'0')
        } else {
            None
        }
    }

    pub fn role(&self) -> Option<&str> {
        self.non_empty_attr("role")
    }

    pub fn tab_index(&self) -> Option<i32> {
        self.attr("tabindex").and_then(|v| v.trim().parse().ok())
    }

    pub fn is_disabled(&self) -> bool {
        self.has_attr("disabled")
    }

    /// Reachable with the keyboard
    pub fn is_focusable(&self) -> bool {
        if let Some(index) = self.tab_index() {
            return index >= 0;
        }
        if self.is_disabled() {
            return false;
        }
        match self.tag.as_str() {
            "a" => self.has_attr("href"),
            "input" => self.attr("type") != Some("hidden"),
            tag => NATIVELY_FOCUSABLE.contains(&tag),
        }
    }

    /// Buttons, links, form controls and elements with a widget role
    pub fn is_interactive(&self) -> bool {
        match self.tag.as_str() {
            "button" | "select" | "textarea" => true,
            "a" => self.has_attr("href"),
            "input" => self.attr("type") != Some("hidden"),
            _ => matches!(self.role(), Some("button" | "link" | "checkbox" | "tab" | "menuitem")),
        }
    }

    /// Rendered, not hidden, has a box
    pub fn is_rendered(&self) -> bool {
        self.visible
            && self.style.display != "none"
            && self.style.visibility != "hidden"
            && self.style.opacity > 0.0
            && !self.rect.is_empty()
    }

    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }

    /// Short CSS-like selector: `tag#id` or `tag.class1.class2`
    pub fn selector(&self) -> String {
        if let Some(id) = self.non_empty_attr("id") {
            return format!("{}#{}", self.tag, id);
        }
        let classes: Vec<&str> = self.classes().take(2).collect();
        if classes.is_empty() {
            self.tag.clone()
        } else {
            format!("{}.{}", self.tag, classes.join("."))
        }
    }
}

/// A rendered page, flattened in document order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomSnapshot {
    pub url: String,
    pub title: Option<String>,
    pub lang: Option<String>,
    pub viewport: Viewport,
    pub scroll_width: f64,
    pub scroll_height: f64,
    pub elements: Vec<DomElement>,
}

impl DomSnapshot {
    pub fn iter(&self) -> impl Iterator<Item = (usize, &DomElement)> {
        self.elements.iter().enumerate()
    }

    pub fn by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = (usize, &'a DomElement)> + 'a {
        self.iter().filter(move |(_, e)| e.tag == tag)
    }

    /// Headings in document order
    pub fn headings(&self) -> impl Iterator<Item = (usize, &DomElement, u8)> {
        self.iter()
            .filter_map(|(i, e)| e.heading_level().map(|level| (i, e, level)))
    }

    pub fn find_by_id(&self, id: &str) -> Option<(usize, &DomElement)> {
        self.iter().find(|(_, e)| e.attr("id") == Some(id))
    }

    /// `<meta name=..>` or `<meta property=..>` content
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.by_tag("meta")
            .find(|(_, e)| {
                e.attr("name").map(|n| n.eq_ignore_ascii_case(key)).unwrap_or(false)
                    || e.attr("property").map(|p| p.eq_ignore_ascii_case(key)).unwrap_or(false)
            })
            .and_then(|(_, e)| e.attr("content"))
    }

    /// `<link>` elements whose rel list contains `rel`
    pub fn links_with_rel<'a>(&'a self, rel: &'a str) -> impl Iterator<Item = &'a DomElement> + 'a {
        self.by_tag("link").map(|(_, e)| e).filter(move |e| {
            e.attr("rel")
                .map(|r| r.split_whitespace().any(|t| t.eq_ignore_ascii_case(rel)))
                .unwrap_or(false)
        })
    }

    pub fn title_text(&self) -> Option<&str> {
        self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    pub fn parent(&self, index: usize) -> Option<&DomElement> {
        self.elements
            .get(index)
            .and_then(|e| e.parent)
            .and_then(|p| self.elements.get(p))
    }

    /// Ancestor indices, nearest first
    pub fn ancestors(&self, index: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut current = self.elements.get(index).and_then(|e| e.parent);
        while let Some(p) = current {
            // guard against malformed parent links
            if chain.contains(&p) || chain.len() > self.elements.len() {
                break;
            }
            chain.push(p);
            current = self.elements.get(p).and_then(|e| e.parent);
        }
        chain
    }

    pub fn is_descendant(&self, index: usize, ancestor: usize) -> bool {
        self.ancestors(index).contains(&ancestor)
    }

    /// Descendants of `index`; contiguous after it in document order
    pub fn descendants(&self, index: usize) -> impl Iterator<Item = (usize, &DomElement)> {
        self.elements
            .iter()
            .enumerate()
            .skip(index + 1)
            .take_while(move |(i, _)| self.is_descendant(*i, index))
    }

    pub fn has_ancestor_tag(&self, index: usize, tag: &str) -> bool {
        self.ancestors(index)
            .into_iter()
            .any(|a| self.elements.get(a).map(|e| e.tag == tag).unwrap_or(false))
    }

    /// First non-transparent background walking up from `index`, white if none
    pub fn effective_background(&self, index: usize) -> Rgba {
        let mut layers = Vec::new();
        let chain = std::iter::once(index).chain(self.ancestors(index));
        for i in chain {
            let Some(el) = self.elements.get(i) else { continue };
            let Ok(color) = el.style.background_color.parse::<Rgba>() else { continue };
            if color.is_transparent() {
                continue;
            }
            layers.push(color);
            if color.a >= 1.0 {
                break;
            }
        }
        layers
            .into_iter()
            .rev()
            .fold(Rgba::WHITE, |backdrop, layer| layer.over(backdrop))
    }

    /// Label text associated with a form control
    pub fn label_for(&self, index: usize) -> Option<String> {
        let control = self.elements.get(index)?;
        if let Some(id) = control.non_empty_attr("id") {
            let by_for = self
                .by_tag("label")
                .find(|(_, l)| l.attr("for") == Some(id))
                .map(|(_, l)| l.trimmed_text().to_string());
            if by_for.is_some() {
                return by_for;
            }
        }
        self.ancestors(index)
            .into_iter()
            .filter_map(|a| self.elements.get(a))
            .find(|e| e.is("label"))
            .map(|l| l.trimmed_text().to_string())
    }

    /// Accessible name from text, ARIA attributes, title or image alt
    pub fn accessible_name(&self, index: usize) -> Option<String> {
        let el = self.elements.get(index)?;
        if let Some(label) = el.non_empty_attr("aria-label") {
            return Some(label.to_string());
        }
        if let Some(ids) = el.non_empty_attr("aria-labelledby") {
            let text: Vec<&str> = ids
                .split_whitespace()
                .filter_map(|id| self.find_by_id(id))
                .map(|(_, e)| e.trimmed_text())
                .filter(|t| !t.is_empty())
                .collect();
            if !text.is_empty() {
                return Some(text.join(" "));
            }
        }
        if !el.trimmed_text().is_empty() {
            return Some(el.trimmed_text().to_string());
        }
        if let Some(alt) = self
            .descendants(index)
            .filter(|(_, d)| d.is("img"))
            .find_map(|(_, d)| d.non_empty_attr("alt"))
        {
            return Some(alt.to_string());
        }
        if let Some(label) = self.label_for(index).filter(|l| !l.is_empty()) {
            return Some(label);
        }
        el.non_empty_attr("title")
            .or_else(|| el.non_empty_attr("value").filter(|_| el.is("input")))
            .map(str::to_string)
    }

    /// Visible text of elements carrying their own text nodes
    pub fn body_text(&self) -> String {
        self.iter()
            .filter(|(i, e)| {
                e.has_direct_text
                    && e.is_rendered()
                    && !matches!(e.tag.as_str(), "script" | "style" | "noscript" | "title")
                    && !self.has_ancestor_tag(*i, "head")
            })
            .map(|(_, e)| e.trimmed_text())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Document is wider than the viewport
    pub fn has_horizontal_scroll(&self) -> bool {
        self.scroll_width > self.viewport.width as f64 + 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DomSnapshot {
        DomSnapshot {
            elements: vec![
                DomElement::new("html").with_attr("lang", "en"),
                DomElement::new("body").with_parent(0),
                DomElement::new("form").with_parent(1),
                DomElement::new("label").with_parent(2).with_attr("for", "email").with_text("Email"),
                DomElement::new("input").with_parent(2).with_attr("id", "email"),
                DomElement::new("a").with_parent(1).with_attr("href", "/"),
                DomElement::new("img").with_parent(5).with_attr("alt", "Home"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_descendants_are_contiguous() {
        let snap = sample();
        let under_form: Vec<usize> = snap.descendants(2).map(|(i, _)| i).collect();
        assert_eq!(under_form, vec![3, 4]);
        let under_body: Vec<usize> = snap.descendants(1).map(|(i, _)| i).collect();
        assert_eq!(under_body, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_accessible_names() {
        let snap = sample();
        assert_eq!(snap.accessible_name(4).as_deref(), Some("Email"));
        assert_eq!(snap.accessible_name(5).as_deref(), Some("Home"));
    }

    #[test]
    fn test_effective_background_walks_up() {
        let mut snap = sample();
        snap.elements[1].style.background_color = "rgb(0, 0, 0)".to_string();
        assert_eq!(snap.effective_background(4), Rgba::BLACK);
        assert_eq!(snap.effective_background(0), Rgba::WHITE);
    }

    #[test]
    fn test_selector_and_focus() {
        let el = DomElement::new("div").with_attr("class", "card  hero shadow");
        assert_eq!(el.selector(), "div.card.hero");
        assert!(!el.is_focusable());
        assert!(el.clone().with_attr("tabindex", "0").is_focusable());
        assert!(DomElement::new("a").with_attr("href", "#").is_focusable());
        assert!(!DomElement::new("a").is_focusable());
    }
}

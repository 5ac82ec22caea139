//! WCAG colour maths
//!
//! Parses computed CSS colour strings and evaluates contrast using the WCAG 2.x
//! relative luminance definition.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};

static RGB_FUNC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^rgba?\(\s*([\d.]+)[\s,]+([\d.]+)[\s,]+([\d.]+)(?:[\s,/]+([\d.]+%?))?\s*\)$")
        .expect("valid colour regex")
});

/// An sRGB colour with straight alpha
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a <= 0.0
    }

    /// Composite this colour over an opaque backdrop
    pub fn over(&self, backdrop: Rgba) -> Rgba {
        if self.a >= 1.0 {
            return *self;
        }
        let a = self.a.clamp(0.0, 1.0);
        let mix = |fg: u8, bg: u8| (fg as f64 * a + bg as f64 * (1.0 - a)).round() as u8;
        Rgba::rgb(mix(self.r, backdrop.r), mix(self.g, backdrop.g), mix(self.b, backdrop.b))
    }

    /// WCAG relative luminance, 0.0 (black) to 1.0 (white)
    pub fn relative_luminance(&self) -> f64 {
        fn linearize(channel: u8) -> f64 {
            let c = channel as f64 / 255.0;
            if c <= 0.03928 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        }
        0.2126 * linearize(self.r) + 0.7152 * linearize(self.g) + 0.0722 * linearize(self.b)
    }
}

impl FromStr for Rgba {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim();
        if let Some(hex) = value.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| Error::InvalidColor(s.to_string()));
        }
        match value.to_ascii_lowercase().as_str() {
            "transparent" => return Ok(Rgba { r: 0, g: 0, b: 0, a: 0.0 }),
            "black" => return Ok(Rgba::BLACK),
            "white" => return Ok(Rgba::WHITE),
            _ => {}
        }
        let caps = RGB_FUNC
            .captures(value)
            .ok_or_else(|| Error::InvalidColor(s.to_string()))?;
        let channel = |i: usize| -> Result<u8> {
            caps[i]
                .parse::<f64>()
                .map(|v| v.round().clamp(0.0, 255.0) as u8)
                .map_err(|_| Error::InvalidColor(s.to_string()))
        };
        let a = match caps.get(4) {
            Some(m) => {
                let raw = m.as_str();
                let parsed = match raw.strip_suffix('%') {
                    Some(pct) => pct.parse::<f64>().map(|v| v / 100.0),
                    None => raw.parse::<f64>(),
                };
                parsed.map_err(|_| Error::InvalidColor(s.to_string()))?
            }
            None => 1.0,
        };
        Ok(Rgba { r: channel(1)?, g: channel(2)?, b: channel(3)?, a })
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    let expand = |c: char| c.to_digit(16).map(|d| (d * 17) as u8);
    let pair = |s: &str| u8::from_str_radix(s, 16).ok();
    let chars: Vec<char> = hex.chars().collect();
    match chars.len() {
        3 | 4 => {
            let a = if chars.len() == 4 { expand(chars[3])? as f64 / 255.0 } else { 1.0 };
            Some(Rgba { r: expand(chars[0])?, g: expand(chars[1])?, b: expand(chars[2])?, a })
        }
        6 | 8 => {
            let a = if chars.len() == 8 { pair(hex.get(6..8)?)? as f64 / 255.0 } else { 1.0 };
            Some(Rgba { r: pair(hex.get(0..2)?)?, g: pair(hex.get(2..4)?)?, b: pair(hex.get(4..6)?)?, a })
        }
        _ => None,
    }
}

/// Contrast ratio between two colours, 1.0 to 21.0
pub fn contrast_ratio(a: Rgba, b: Rgba) -> f64 {
    let la = a.relative_luminance();
    let lb = b.relative_luminance();
    let (lighter, darker) = if la >= lb { (la, lb) } else { (lb, la) };
    (lighter + 0.05) / (darker + 0.05)
}

/// Large text is at least 18px, or at least 14px when bold (weight 700+)
pub fn is_large_text(font_size_px: f64, font_weight: u16) -> bool {
    font_size_px >= 18.0 || (font_size_px >= 14.0 && font_weight >= 700)
}

/// WCAG conformance level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WcagLevel {
    A,
    #[serde(alias = "aa")]
    AA,
    #[serde(alias = "aaa")]
    AAA,
}

impl Default for WcagLevel {
    fn default() -> Self {
        Self::AA
    }
}

impl WcagLevel {
    /// Minimum contrast ratio for text at this level
    pub fn required_contrast(&self, large_text: bool) -> f64 {
        match (self, large_text) {
            (WcagLevel::A, _) => 3.0,
            (WcagLevel::AA, false) => 4.5,
            (WcagLevel::AA, true) => 3.0,
            (WcagLevel::AAA, false) => 7.0,
            (WcagLevel::AAA, true) => 4.5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WcagLevel::A => "A",
            WcagLevel::AA => "AA",
            WcagLevel::AAA => "AAA",
        }
    }
}

impl std::fmt::Display for WcagLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WcagLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(WcagLevel::A),
            "AA" => Ok(WcagLevel::AA),
            "AAA" => Ok(WcagLevel::AAA),
            other => Err(Error::UnknownVariant {
                kind: "WCAG level",
                value: other.to_string(),
            }),
        }
    }
}

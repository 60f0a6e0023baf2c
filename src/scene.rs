//! Scene – the laid-out display list between layout and rasterization.
//!
//! A scene is one continuous page-width flow with unbounded height: exactly
//! what a browser would have painted for the preview. Coordinates are CSS
//! pixels, origin top-left.

use serde::{Deserialize, Serialize};

/// 8-bit sRGB colour.
pub type Rgb = [u8; 3];

pub const WHITE: Rgb = [255, 255, 255];
pub const BLACK: Rgb = [17, 24, 39];
pub const GRAY: Rgb = [75, 85, 99];
pub const LIGHT_GRAY: Rgb = [209, 213, 219];

/// A fully laid-out preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Width in CSS px (the virtual page width).
    pub width: f32,
    /// Total content height in CSS px.
    pub height: f32,
    pub background: Rgb,
    /// Painted in order.
    pub items: Vec<Primitive>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Primitive {
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Rgb,
    },
    /// One line of text; `y` is the top of the line box and `baseline` the
    /// offset from there to the glyph baseline.
    Text {
        x: f32,
        y: f32,
        width: f32,
        size: f32,
        baseline: f32,
        bold: bool,
        color: Rgb,
        text: String,
    },
}

impl Scene {
    pub fn new(width: f32, background: Rgb) -> Self {
        Self {
            width,
            height: 0.0,
            background,
            items: Vec::new(),
        }
    }

    /// All text lines in paint order, for inspection and tests.
    pub fn text_lines(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|item| match item {
            Primitive::Text { text, .. } => Some(text.as_str()),
            Primitive::Rect { .. } => None,
        })
    }

    /// Serialise to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Deserialise from JSON.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| e.to_string())
    }
}

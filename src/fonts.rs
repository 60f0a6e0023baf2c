//! Font loading and text measurement using `ttf-parser`.
//!
//! By default the manager uses the Helvetica faces that ship with printpdf,
//! so exports show real text without any system fonts. A user TTF replaces
//! them. Synthetic metrics are the last resort when no face parses; the
//! rasterizer then draws placeholder bars.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use printpdf::BuiltinFont;

/// Where a face came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontSource {
    /// No outlines; average-width metrics only.
    Synthetic,
    /// printpdf's embedded Helvetica.
    Builtin,
    /// A face loaded by the user.
    Loaded,
}

/// A loaded font face with metrics.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes; empty for synthetic metrics.
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
    pub source: FontSource,
}

impl FontData {
    fn synthetic() -> Self {
        Self {
            bytes: Vec::new(),
            units_per_em: 1000.0,
            ascender: 750.0,
            descender: -250.0,
            source: FontSource::Synthetic,
        }
    }

    fn parse(bytes: Vec<u8>, source: FontSource) -> Result<Self, String> {
        let face = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| format!("Failed to parse font: {e}"))?;
        Ok(Self {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            bytes,
            source,
        })
    }

    fn builtin(font: BuiltinFont) -> Self {
        match Self::parse(font.get_subset_font().bytes, FontSource::Builtin) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Builtin font unavailable ({e}); using synthetic metrics");
                Self::synthetic()
            }
        }
    }
}

/// Regular and bold faces used by the résumé templates.
pub struct FontManager {
    faces: HashMap<bool, FontData>,
}

impl FontManager {
    /// Manager with printpdf's Helvetica and Helvetica-Bold.
    pub fn new() -> Self {
        let mut faces = HashMap::new();
        faces.insert(false, FontData::builtin(BuiltinFont::Helvetica));
        faces.insert(true, FontData::builtin(BuiltinFont::HelveticaBold));
        Self { faces }
    }

    /// Manager with synthetic metrics for both weights and no outlines.
    pub fn synthetic() -> Self {
        let mut faces = HashMap::new();
        faces.insert(false, FontData::synthetic());
        faces.insert(true, FontData::synthetic());
        Self { faces }
    }

    /// Load a TTF/OTF face from bytes. Loading only a regular face also
    /// serves bold text (drawn with the regular outlines).
    pub fn load_font(&mut self, bold: bool, bytes: Vec<u8>) -> Result<(), String> {
        let data = FontData::parse(bytes, FontSource::Loaded)?;

        if !bold && self.source(true) != FontSource::Loaded {
            self.faces.insert(true, data.clone());
        }
        self.faces.insert(bold, data);
        Ok(())
    }

    /// Read and load a regular face from disk.
    pub fn load_file(&mut self, path: &Path) -> Result<(), String> {
        let bytes =
            fs::read(path).map_err(|e| format!("Failed to read font '{}': {e}", path.display()))?;
        self.load_font(false, bytes)
    }

    fn get(&self, bold: bool) -> &FontData {
        // Both weights are always present; see `new`.
        &self.faces[&bold]
    }

    pub fn source(&self, bold: bool) -> FontSource {
        self.get(bold).source
    }

    /// Measure the width of a string at a given font size (in px).
    ///
    /// With real font bytes the glyph advances are summed, unmapped
    /// characters taking the `.notdef` advance as the glyph rasterizer
    /// does. Otherwise an average character width of 0.5 × font_size (0.55
    /// for bold) is used.
    pub fn measure_text_width(&self, text: &str, font_size: f32, bold: bool) -> f32 {
        let data = self.get(bold);

        if data.bytes.is_empty() {
            let avg = if bold { 0.55 } else { 0.5 };
            return text.chars().count() as f32 * font_size * avg;
        }

        match ttf_parser::Face::parse(&data.bytes, 0) {
            Ok(face) => {
                let scale = font_size / data.units_per_em;
                let notdef = ttf_parser::GlyphId(0);
                text.chars()
                    .map(|ch| {
                        let gid = face.glyph_index(ch).unwrap_or(notdef);
                        face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale
                    })
                    .sum()
            }
            Err(_) => text.chars().count() as f32 * font_size * 0.5,
        }
    }

    /// Line box height for a font size.
    pub fn line_height_px(&self, font_size: f32) -> f32 {
        font_size * 1.4
    }

    /// Distance from the top of a line box to the baseline.
    pub fn ascender_px(&self, font_size: f32, bold: bool) -> f32 {
        let data = self.get(bold);
        let leading = (self.line_height_px(font_size) - font_size) / 2.0;
        leading + data.ascender * font_size / data.units_per_em
    }

    /// True when the regular face has outlines to draw.
    pub fn has_real_fonts(&self) -> bool {
        self.source(false) != FontSource::Synthetic
    }

    /// Font bytes for glyph rasterization, if loaded.
    pub fn font_bytes(&self, bold: bool) -> Option<&[u8]> {
        let data = self.get(bold);
        if data.bytes.is_empty() {
            None
        } else {
            Some(data.bytes.as_slice())
        }
    }
}

impl Default for FontManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Word-wrap text to fit within `max_width` pixels. Returns a vec of lines.
///
/// Existing newlines are kept as hard breaks. A single word wider than
/// `max_width` stays on its own line rather than being split.
pub fn wrap_text(
    text: &str,
    font_size: f32,
    bold: bool,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<String> {
    if max_width <= 0.0 || text.is_empty() {
        return vec![text.to_string()];
    }

    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current_line = String::new();
        for word in &words {
            let candidate = if current_line.is_empty() {
                word.to_string()
            } else {
                format!("{current_line} {word}")
            };
            let w = fonts.measure_text_width(&candidate, font_size, bold);
            if w > max_width && !current_line.is_empty() {
                lines.push(current_line);
                current_line = word.to_string();
            } else {
                current_line = candidate;
            }
        }
        if !current_line.is_empty() {
            lines.push(current_line);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

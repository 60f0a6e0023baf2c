//! Layout engine – flows template blocks top-to-bottom into a [`Scene`].
//!
//! The flow model is deliberately small: blocks stack vertically, text wraps
//! to the available width, and [`Block::Columns`] places a sidebar next to a
//! main column, the taller of the two deciding where the flow continues.

use crate::fonts::{wrap_text, FontManager};
use crate::scene::{Primitive, Rgb, Scene, LIGHT_GRAY, WHITE};

/// A run of uniformly styled text.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub size: f32,
    pub bold: bool,
    pub color: Rgb,
}

impl Span {
    pub fn new(text: impl Into<String>, size: f32, color: Rgb) -> Self {
        Self {
            text: text.into(),
            size,
            bold: false,
            color,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

/// Display blocks produced by a template projection.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Wrapped paragraph.
    Text(Span),
    /// Left text and right-aligned text on one line (e.g. role and dates).
    Row { left: Span, right: Span },
    /// Section heading with an optional rule underneath.
    Heading { span: Span, rule: Option<Rgb> },
    /// Bulleted list.
    Bullets { items: Vec<String>, size: f32, color: Rgb },
    /// Label followed by a dot meter (`level` of `max` dots filled).
    Meter { label: Span, level: u8, max: u8, color: Rgb },
    /// Filled box around nested content, full width of the current column.
    Banner { fill: Rgb, padding: f32, children: Vec<Block> },
    /// Nested content with a coloured left border.
    Card { accent: Rgb, fill: Option<Rgb>, children: Vec<Block> },
    /// Sidebar plus main column.
    Columns {
        sidebar: Vec<Block>,
        main: Vec<Block>,
        sidebar_width: f32,
        sidebar_fill: Option<Rgb>,
    },
    Rule(Rgb),
    Spacer(f32),
}

/// Geometry of the virtual page the preview is laid out on.
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    /// Width in CSS px; 794 px is A4 at 96 dpi.
    pub width: f32,
    pub padding: f32,
    pub background: Rgb,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            width: 794.0,
            padding: 40.0,
            background: WHITE,
        }
    }
}

const BLOCK_GAP: f32 = 6.0;
const COLUMN_GAP: f32 = 24.0;
const CARD_PADDING: f32 = 12.0;
const CARD_BORDER: f32 = 4.0;
const BULLET_INDENT: f32 = 16.0;

struct Flow<'a> {
    fonts: &'a FontManager,
    items: Vec<Primitive>,
}

/// Lay out `blocks` into a scene of `options.width` and the height the
/// content needs.
pub fn layout(blocks: &[Block], options: &LayoutOptions, fonts: &FontManager) -> Scene {
    let mut flow = Flow {
        fonts,
        items: Vec::new(),
    };
    let content_width = (options.width - 2.0 * options.padding).max(1.0);
    let bottom = flow.blocks(blocks, options.padding, options.padding, content_width);

    let mut scene = Scene::new(options.width, options.background);
    scene.items = flow.items;
    scene.height = (bottom + options.padding).ceil();
    scene
}

impl Flow<'_> {
    /// Lay out a block list at (x, y) within `width`; returns the new y.
    fn blocks(&mut self, blocks: &[Block], x: f32, mut y: f32, width: f32) -> f32 {
        for (i, block) in blocks.iter().enumerate() {
            if i > 0 {
                y += BLOCK_GAP;
            }
            y = self.block(block, x, y, width);
        }
        y
    }

    fn block(&mut self, block: &Block, x: f32, y: f32, width: f32) -> f32 {
        match block {
            Block::Text(span) => self.paragraph(span, x, y, width),
            Block::Row { left, right } => self.row(left, right, x, y, width),
            Block::Heading { span, rule } => {
                let mut bottom = self.paragraph(span, x, y, width);
                if let Some(color) = rule {
                    bottom += 2.0;
                    self.rect(x, bottom, width, 1.5, *color);
                    bottom += 1.5;
                }
                bottom
            }
            Block::Bullets { items, size, color } => {
                let mut cur = y;
                for item in items {
                    let marker = Span::new("\u{2022}", *size, *color);
                    self.line(&marker, x + 4.0, cur);
                    let span = Span::new(item.clone(), *size, *color);
                    cur = self.paragraph(&span, x + BULLET_INDENT, cur, width - BULLET_INDENT);
                }
                cur
            }
            Block::Meter {
                label,
                level,
                max,
                color,
            } => self.meter(label, *level, *max, *color, x, y, width),
            Block::Banner {
                fill,
                padding,
                children,
            } => {
                let start = self.items.len();
                let inner_bottom =
                    self.blocks(children, x + padding, y + padding, width - 2.0 * padding);
                let height = inner_bottom + padding - y;
                self.insert_rect(start, x, y, width, height, *fill);
                y + height
            }
            Block::Card {
                accent,
                fill,
                children,
            } => {
                let start = self.items.len();
                let inner_x = x + CARD_BORDER + CARD_PADDING;
                let inner_w = width - CARD_BORDER - 2.0 * CARD_PADDING;
                let inner_bottom = self.blocks(children, inner_x, y + CARD_PADDING, inner_w);
                let height = inner_bottom + CARD_PADDING - y;
                self.insert_rect(start, x, y, CARD_BORDER, height, *accent);
                if let Some(fill) = fill {
                    self.insert_rect(start, x, y, width, height, *fill);
                }
                y + height
            }
            Block::Columns {
                sidebar,
                main,
                sidebar_width,
                sidebar_fill,
            } => {
                let start = self.items.len();
                let side_w = sidebar_width.min(width / 2.0);
                let pad = if sidebar_fill.is_some() { CARD_PADDING } else { 0.0 };
                let side_bottom = self.blocks(sidebar, x + pad, y + pad, side_w - 2.0 * pad) + pad;
                let main_x = x + side_w + COLUMN_GAP;
                let main_bottom = self.blocks(main, main_x, y, width - side_w - COLUMN_GAP);
                let bottom = side_bottom.max(main_bottom);
                if let Some(fill) = sidebar_fill {
                    self.insert_rect(start, x, y, side_w, bottom - y, *fill);
                }
                bottom
            }
            Block::Rule(color) => {
                self.rect(x, y + 4.0, width, 1.0, *color);
                y + 9.0
            }
            Block::Spacer(h) => y + h,
        }
    }

    fn paragraph(&mut self, span: &Span, x: f32, y: f32, width: f32) -> f32 {
        if span.text.trim().is_empty() {
            return y;
        }
        let line_h = self.fonts.line_height_px(span.size);
        let mut cur = y;
        for text in wrap_text(&span.text, span.size, span.bold, width, self.fonts) {
            let line = Span {
                text,
                ..span.clone()
            };
            self.line(&line, x, cur);
            cur += line_h;
        }
        cur
    }

    fn row(&mut self, left: &Span, right: &Span, x: f32, y: f32, width: f32) -> f32 {
        let right_w = self
            .fonts
            .measure_text_width(&right.text, right.size, right.bold);
        let left_bottom = self.paragraph(left, x, y, (width - right_w - 12.0).max(width / 2.0));
        let right_bottom = if right.text.trim().is_empty() {
            y
        } else {
            self.line(right, x + width - right_w, y);
            y + self.fonts.line_height_px(right.size)
        };
        left_bottom.max(right_bottom)
    }

    #[allow(clippy::too_many_arguments)]
    fn meter(&mut self, label: &Span, level: u8, max: u8, color: Rgb, x: f32, y: f32, width: f32) -> f32 {
        let dot = (label.size * 0.6).round();
        let dots_w = max as f32 * (dot + 3.0);
        let bottom = self.paragraph(label, x, y, (width - dots_w - 8.0).max(width / 2.0));
        let dot_y = y + (self.fonts.line_height_px(label.size) - dot) / 2.0;
        for i in 0..max {
            let dot_x = x + width - dots_w + i as f32 * (dot + 3.0);
            let fill = if i < level { color } else { LIGHT_GRAY };
            self.rect(dot_x, dot_y, dot, dot, fill);
        }
        bottom.max(y + self.fonts.line_height_px(label.size))
    }

    fn line(&mut self, span: &Span, x: f32, y: f32) {
        self.items.push(Primitive::Text {
            x,
            y,
            width: self.fonts.measure_text_width(&span.text, span.size, span.bold),
            size: span.size,
            baseline: self.fonts.ascender_px(span.size, span.bold),
            bold: span.bold,
            color: span.color,
            text: span.text.clone(),
        });
    }

    fn rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgb) {
        self.items.push(Primitive::Rect {
            x,
            y,
            width,
            height,
            color,
        });
    }

    /// Backgrounds are sized after their content, so they are inserted
    /// behind the content already emitted from `at` onwards.
    fn insert_rect(&mut self, at: usize, x: f32, y: f32, width: f32, height: f32, color: Rgb) {
        self.items.insert(
            at,
            Primitive::Rect {
                x,
                y,
                width,
                height,
                color,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::BLACK;

    fn text(s: &str) -> Block {
        Block::Text(Span::new(s, 12.0, BLACK))
    }

    #[test]
    fn layout_simple_paragraph() {
        let fonts = FontManager::default();
        let scene = layout(&[text("Hello world")], &LayoutOptions::default(), &fonts);
        assert_eq!(scene.width, 794.0);
        assert!(scene.height > 80.0, "padding plus one line, got {}", scene.height);
        assert_eq!(scene.text_lines().collect::<Vec<_>>(), vec!["Hello world"]);
    }

    #[test]
    fn height_grows_with_content() {
        let fonts = FontManager::default();
        let short = layout(&[text("a")], &LayoutOptions::default(), &fonts);
        let blocks: Vec<Block> = (0..100).map(|i| text(&format!("Line {i}"))).collect();
        let long = layout(&blocks, &LayoutOptions::default(), &fonts);
        assert!(long.height > short.height * 10.0);
    }

    #[test]
    fn banner_background_is_painted_first() {
        let fonts = FontManager::default();
        let blocks = [Block::Banner {
            fill: [79, 70, 229],
            padding: 20.0,
            children: vec![text("Name")],
        }];
        let scene = layout(&blocks, &LayoutOptions::default(), &fonts);
        match &scene.items[0] {
            Primitive::Rect { color, height, .. } => {
                assert_eq!(*color, [79, 70, 229]);
                assert!(*height > 40.0);
            }
            other => panic!("expected background rect, got {other:?}"),
        }
    }

    #[test]
    fn columns_continue_below_the_taller_side() {
        let fonts = FontManager::default();
        let sidebar: Vec<Block> = (0..30).map(|i| text(&format!("Skill {i}"))).collect();
        let blocks = [
            Block::Columns {
                sidebar,
                main: vec![text("short")],
                sidebar_width: 220.0,
                sidebar_fill: Some([243, 244, 246]),
            },
            text("after"),
        ];
        let scene = layout(&blocks, &LayoutOptions::default(), &fonts);
        let after_y = scene
            .items
            .iter()
            .find_map(|item| match item {
                Primitive::Text { text, y, .. } if text == "after" => Some(*y),
                _ => None,
            })
            .unwrap();
        assert!(after_y > 30.0 * 16.0);
    }

    #[test]
    fn meter_fills_level_dots() {
        let fonts = FontManager::default();
        let blocks = [Block::Meter {
            label: Span::new("Rust", 12.0, BLACK),
            level: 3,
            max: 5,
            color: [1, 2, 3],
        }];
        let scene = layout(&blocks, &LayoutOptions::default(), &fonts);
        let filled = scene
            .items
            .iter()
            .filter(|item| matches!(item, Primitive::Rect { color, .. } if *color == [1, 2, 3]))
            .count();
        assert_eq!(filled, 3);
    }
}

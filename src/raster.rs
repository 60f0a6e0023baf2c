//! Rasterizer – paints a [`Scene`] into one tall RGB image.
//!
//! This is the capture step of the export: the whole preview is rasterized
//! once at an oversampling factor, and pagination happens afterwards in
//! image space.

use ab_glyph::{Font, FontRef, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::error::ExportError;
use crate::fonts::FontManager;
use crate::scene::{Primitive, Scene};

/// Something that can be captured as a raster: the rendered preview.
pub trait Capture {
    /// Size in CSS px.
    fn size(&self) -> (f32, f32);

    /// Rasterize at `scale` device pixels per CSS px. Fails instead of
    /// allocating when the result would exceed `max_pixels`.
    fn rasterize(&self, scale: f32, max_pixels: u64) -> Result<RgbImage, ExportError>;
}

/// Pixel dimensions of a `width × height` CSS px area at `scale`.
pub fn raster_size(width: f32, height: f32, scale: f32) -> (u32, u32) {
    let px = |v: f32| (v * scale).ceil().max(0.0) as u32;
    (px(width), px(height))
}

/// Capture of a laid-out scene with the fonts it was measured with.
pub struct SceneCapture<'a> {
    pub scene: &'a Scene,
    pub fonts: &'a FontManager,
}

impl Capture for SceneCapture<'_> {
    fn size(&self) -> (f32, f32) {
        (self.scene.width, self.scene.height)
    }

    fn rasterize(&self, scale: f32, max_pixels: u64) -> Result<RgbImage, ExportError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(ExportError::Raster(format!("invalid scale factor {scale}")));
        }
        let (width, height) = raster_size(self.scene.width, self.scene.height, scale);
        if width == 0 || height == 0 {
            return Err(ExportError::EmptyRaster { width, height });
        }
        if width as u64 * height as u64 > max_pixels {
            return Err(ExportError::RasterTooLarge {
                width,
                height,
                limit: max_pixels,
            });
        }

        let regular = load_face(self.fonts.font_bytes(false))?;
        let bold = load_face(self.fonts.font_bytes(true))?;
        if (regular.is_none() || bold.is_none()) && self.scene.text_lines().next().is_some() {
            log::warn!("No font outlines available; drawing text as placeholder bars");
        }

        let mut canvas = RgbImage::from_pixel(width, height, Rgb(self.scene.background));
        for item in &self.scene.items {
            match item {
                Primitive::Rect {
                    x,
                    y,
                    width,
                    height,
                    color,
                } => fill(&mut canvas, *x, *y, *width, *height, *color, scale),
                Primitive::Text {
                    x,
                    y,
                    width,
                    size,
                    baseline,
                    bold: is_bold,
                    color,
                    text,
                } => {
                    let face = if *is_bold { bold.as_ref() } else { regular.as_ref() };
                    match face {
                        Some(font) => {
                            let run = TextRun {
                                x: *x,
                                baseline: y + baseline,
                                size: *size,
                                bold: *is_bold,
                                color: *color,
                            };
                            draw_run(&mut canvas, font, self.fonts, &run, text, scale);
                        }
                        None => {
                            // Greeked text: an x-height bar of the measured width.
                            let bar_h = size * 0.45;
                            fill(&mut canvas, *x, y + baseline - bar_h, *width, bar_h, *color, scale);
                        }
                    }
                }
            }
        }

        log::debug!(
            "Rasterized scene {}x{} css px into {}x{} px ({} primitives)",
            self.scene.width,
            self.scene.height,
            width,
            height,
            self.scene.items.len()
        );
        Ok(canvas)
    }
}

struct TextRun {
    x: f32,
    baseline: f32,
    size: f32,
    bold: bool,
    color: [u8; 3],
}

/// Draw `text` one word at a time, advancing by the layout's own measure.
/// Spaces are never handed to the glyph renderer: faces without a space
/// glyph would otherwise paint `.notdef` boxes between words.
fn draw_run(
    canvas: &mut RgbImage,
    font: &FontRef<'_>,
    fonts: &FontManager,
    run: &TextRun,
    text: &str,
    scale: f32,
) {
    let px = PxScale::from(run.size * scale);
    // imageproc hangs glyphs from the ascent line.
    let top = (run.baseline * scale - font.as_scaled(px).ascent()).round() as i32;
    let space = fonts.measure_text_width(" ", run.size, run.bold);

    let mut cursor = run.x;
    for (i, word) in text.split(' ').enumerate() {
        if i > 0 {
            cursor += space;
        }
        if word.is_empty() {
            continue;
        }
        let drawable: String = word
            .chars()
            .map(|ch| if font.glyph_id(ch).0 == 0 { '?' } else { ch })
            .collect();
        draw_text_mut(
            canvas,
            Rgb(run.color),
            (cursor * scale).round() as i32,
            top,
            px,
            font,
            &drawable,
        );
        cursor += fonts.measure_text_width(word, run.size, run.bold);
    }
}

fn load_face(bytes: Option<&[u8]>) -> Result<Option<FontRef<'_>>, ExportError> {
    bytes
        .map(|b| FontRef::try_from_slice(b).map_err(|e| ExportError::Raster(format!("font: {e}"))))
        .transpose()
}

#[allow(clippy::too_many_arguments)]
fn fill(canvas: &mut RgbImage, x: f32, y: f32, w: f32, h: f32, color: [u8; 3], scale: f32) {
    let px = (x * scale).floor() as i32;
    let py = (y * scale).floor() as i32;
    let pw = ((w * scale).round() as u32).max(1);
    let ph = ((h * scale).round() as u32).max(1);
    draw_filled_rect_mut(canvas, Rect::at(px, py).of_size(pw, ph), Rgb(color));
}

/// The preview pane: holds the laid-out scene once it has been mounted.
#[derive(Default)]
pub struct Preview {
    scene: Option<Scene>,
    fonts: FontManager,
}

impl Preview {
    pub fn new(fonts: FontManager) -> Self {
        Self { scene: None, fonts }
    }

    pub fn mount(&mut self, scene: Scene) {
        self.scene = Some(scene);
    }

    pub fn unmount(&mut self) {
        self.scene = None;
    }

    pub fn fonts(&self) -> &FontManager {
        &self.fonts
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    /// The export target, absent until a scene is mounted.
    pub fn target(&self) -> Option<SceneCapture<'_>> {
        self.scene.as_ref().map(|scene| SceneCapture {
            scene,
            fonts: &self.fonts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{BLACK, WHITE};

    fn scene(height: f32) -> Scene {
        let mut scene = Scene::new(100.0, WHITE);
        scene.height = height;
        scene.items.push(Primitive::Rect {
            x: 10.0,
            y: 10.0,
            width: 20.0,
            height: 20.0,
            color: [255, 0, 0],
        });
        scene.items.push(Primitive::Text {
            x: 10.0,
            y: 40.0,
            width: 30.0,
            size: 12.0,
            baseline: 12.0,
            bold: false,
            color: BLACK,
            text: "Hello".into(),
        });
        scene
    }

    #[test]
    fn raster_is_scaled() {
        let fonts = FontManager::default();
        let scene = scene(50.0);
        let capture = SceneCapture {
            scene: &scene,
            fonts: &fonts,
        };
        let img = capture.rasterize(2.0, u64::MAX).unwrap();
        assert_eq!(img.dimensions(), (200, 100));
        assert_eq!(img.get_pixel(40, 40), &Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(190, 90), &Rgb(WHITE));
    }

    #[test]
    fn greeked_text_paints_pixels() {
        let fonts = FontManager::synthetic();
        let scene = scene(60.0);
        let capture = SceneCapture {
            scene: &scene,
            fonts: &fonts,
        };
        let img = capture.rasterize(1.0, u64::MAX).unwrap();
        // Bar sits just above the baseline at y = 52.
        assert_eq!(img.get_pixel(20, 50), &Rgb(BLACK));
    }

    #[test]
    fn default_fonts_draw_glyphs() {
        let fonts = FontManager::default();
        let scene = scene(60.0);
        let capture = SceneCapture {
            scene: &scene,
            fonts: &fonts,
        };
        let img = capture.rasterize(2.0, u64::MAX).unwrap();
        // Anti-aliased glyph edges leave grey pixels; a solid bar leaves none.
        let text_area = (20..100).flat_map(|x| (60..110).map(move |y| (x, y)));
        let (mut inked, mut grey) = (0, 0);
        for (x, y) in text_area {
            let p = img.get_pixel(x, y).0;
            if p != WHITE {
                inked += 1;
                if p != BLACK {
                    grey += 1;
                }
            }
        }
        assert!(inked > 20, "no text drawn");
        assert!(grey > 0, "text was drawn as a solid bar");
    }

    #[test]
    fn words_are_drawn_without_notdef_boxes() {
        let fonts = FontManager::default();
        let mut with_space = Scene::new(200.0, WHITE);
        with_space.height = 30.0;
        with_space.items.push(Primitive::Text {
            x: 0.0,
            y: 0.0,
            width: 200.0,
            size: 16.0,
            baseline: 18.0,
            bold: false,
            color: BLACK,
            text: "l          l".into(),
        });
        let img = SceneCapture {
            scene: &with_space,
            fonts: &fonts,
        }
        .rasterize(1.0, u64::MAX)
        .unwrap();
        let l_width = fonts.measure_text_width("l", 16.0, false);
        let gap_start = (l_width + 2.0) as u32;
        let gap_end = (fonts.measure_text_width("l          ", 16.0, false) - 2.0) as u32;
        for x in gap_start..gap_end {
            for y in 0..30 {
                assert_eq!(img.get_pixel(x, y), &Rgb(WHITE), "ink in gap at {x},{y}");
            }
        }
    }

    #[test]
    fn empty_scene_is_rejected() {
        let fonts = FontManager::default();
        let scene = Scene::new(100.0, WHITE);
        let capture = SceneCapture {
            scene: &scene,
            fonts: &fonts,
        };
        assert!(matches!(
            capture.rasterize(2.0, u64::MAX),
            Err(ExportError::EmptyRaster { .. })
        ));
    }

    #[test]
    fn oversized_raster_is_rejected() {
        let fonts = FontManager::default();
        let scene = scene(50.0);
        let capture = SceneCapture {
            scene: &scene,
            fonts: &fonts,
        };
        assert!(matches!(
            capture.rasterize(3.0, 1000),
            Err(ExportError::RasterTooLarge { .. })
        ));
    }

    #[test]
    fn preview_target_requires_mount() {
        let mut preview = Preview::default();
        assert!(preview.target().is_none());
        preview.mount(scene(50.0));
        assert_eq!(preview.target().map(|t| t.size()), Some((100.0, 50.0)));
        preview.unmount();
        assert!(preview.target().is_none());
    }
}

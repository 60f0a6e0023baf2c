//! Pipeline – ties together projection, layout, rasterization, pagination
//! and rendering.

use image::RgbImage;

use crate::error::ExportError;
use crate::fonts::FontManager;
use crate::layout::{layout, LayoutOptions};
use crate::pagination::{plan_bands, PagePlan};
use crate::raster::Capture;
use crate::render::render_bands;
use crate::resume::Resume;
use crate::scene::Scene;
use crate::templates::project;

/// Configuration for the export pipeline.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Document title embedded in the PDF metadata (default: "Curriculum Vitae").
    pub title: String,
    /// Page width in points (default: A4 = 595.28).
    pub page_width: f32,
    /// Page height in points (default: A4 = 841.89).
    pub page_height: f32,
    /// Device pixels per CSS px when capturing the preview (default: 2).
    pub scale: f32,
    /// Upper bound on raster size in pixels (default: 60 M).
    pub max_raster_pixels: u64,
    /// Width of stored thumbnails in pixels (default: 240).
    pub thumbnail_width: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            title: "Curriculum Vitae".to_string(),
            page_width: 595.28,
            page_height: 841.89,
            scale: 2.0,
            max_raster_pixels: 60_000_000,
            thumbnail_width: 240,
        }
    }
}

impl ExportConfig {
    /// A4 portrait with a custom oversampling factor.
    pub fn with_scale(scale: f32) -> Self {
        Self {
            scale,
            ..Self::default()
        }
    }
}

/// Output of a successful render.
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub plan: PagePlan,
    /// The full-height capture the pages were cut from.
    pub raster: RgbImage,
}

/// Project and lay out a résumé: the preview a user would see.
pub fn render_scene(resume: &Resume, fonts: &FontManager) -> Scene {
    let blocks = project(resume);
    layout(&blocks, &LayoutOptions::default(), fonts)
}

/// Rasterize `target` once, plan the bands, and assemble the PDF.
pub fn generate_pdf(target: &dyn Capture, config: &ExportConfig) -> Result<RenderedPdf, ExportError> {
    let raster = target.rasterize(config.scale, config.max_raster_pixels)?;
    let (w, h) = raster.dimensions();
    let plan = plan_bands(w, h, config.page_width, config.page_height)?;
    let bytes = render_bands(&raster, &plan, config)?;
    Ok(RenderedPdf { bytes, plan, raster })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::SceneCapture;

    #[test]
    fn pipeline_basic() {
        let fonts = FontManager::default();
        let mut resume = Resume::default();
        resume.personal_info.first_name = "Ann".into();
        let scene = render_scene(&resume, &fonts);
        let target = SceneCapture {
            scene: &scene,
            fonts: &fonts,
        };
        let pdf = generate_pdf(&target, &ExportConfig::default()).unwrap();
        assert!(!pdf.bytes.is_empty());
        assert_eq!(pdf.plan.page_count(), 1);
        assert_eq!(&pdf.bytes[0..5], b"%PDF-");
        assert_eq!(pdf.raster.width(), 1588);
    }
}

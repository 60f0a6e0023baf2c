//! PDF renderer – places the raster bands of a [`PagePlan`] on A4 pages using
//! `printpdf` (v0.8 ops-based API). The output carries no text layer.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use image::{imageops, DynamicImage, ImageFormat, RgbImage};
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};

use crate::error::ExportError;
use crate::pagination::{Band, PagePlan};
use crate::pipeline::ExportConfig;

const MM_PER_PT: f32 = 0.352778;

/// Render the bands of `raster` described by `plan` into PDF bytes.
pub fn render_bands(
    raster: &RgbImage,
    plan: &PagePlan,
    config: &ExportConfig,
) -> Result<Vec<u8>, ExportError> {
    let page_w = Mm(config.page_width * MM_PER_PT);
    let page_h = Mm(config.page_height * MM_PER_PT);

    let mut doc = PdfDocument::new(&config.title);
    let mut pages = Vec::with_capacity(plan.pages.len());

    for band in &plan.pages {
        let scratch = slice_band(raster, band)?;
        let (px_width, px_height) = scratch.dimensions();
        let raw = RawImage {
            pixels: RawImageData::U8(scratch.into_raw()),
            width: px_width as usize,
            height: px_height as usize,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };
        let xobj_id = doc.add_image(&raw);

        let ops = vec![Op::UseXobject {
            id: xobj_id,
            transform: band_placement(band, px_width, px_height, config),
        }];
        pages.push(PdfPage::new(page_w, page_h, ops));
    }

    if pages.is_empty() {
        return Err(ExportError::Encode("page plan has no pages".to_string()));
    }

    doc.with_pages(pages);
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
    for warning in &warnings {
        log::warn!("printpdf: {warning:?}");
    }
    Ok(bytes)
}

/// Where a band image lands on its page: full page width, hanging from the
/// top edge. PDF origin is bottom-left, and at dpi=72 printpdf renders
/// 1 px = 1 pt, so each scale is pt / px.
fn band_placement(
    band: &Band,
    px_width: u32,
    px_height: u32,
    config: &ExportConfig,
) -> XObjectTransform {
    XObjectTransform {
        translate_x: Some(Pt(0.0)),
        translate_y: Some(Pt(config.page_height - band.height_pt)),
        dpi: Some(72.0),
        scale_x: Some(config.page_width / px_width as f32),
        scale_y: Some(band.height_pt / px_height as f32),
        rotate: None,
    }
}

/// Copy one band into a same-width scratch image.
fn slice_band(raster: &RgbImage, band: &Band) -> Result<RgbImage, ExportError> {
    let (width, height) = raster.dimensions();
    if band.height_px == 0 || band.src_y + band.height_px > height {
        return Err(ExportError::Encode(format!(
            "band {}..{} outside raster of height {height}",
            band.src_y,
            band.src_y + band.height_px
        )));
    }
    Ok(imageops::crop_imm(raster, 0, band.src_y, width, band.height_px).to_image())
}

/// PNG data URI of the first page, downscaled to `max_width` px wide. Used
/// as the thumbnail of a stored CV.
pub fn thumbnail_data_uri(
    raster: &RgbImage,
    plan: &PagePlan,
    max_width: u32,
) -> Result<String, ExportError> {
    let first = plan
        .pages
        .first()
        .ok_or_else(|| ExportError::Encode("page plan has no pages".to_string()))?;
    let page = slice_band(raster, first)?;
    let (w, h) = page.dimensions();
    let target_w = max_width.min(w).max(1);
    let target_h = ((h as u64 * target_w as u64) / w as u64).max(1) as u32;
    let small = imageops::thumbnail(&page, target_w, target_h);

    let mut png = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(small)
        .write_to(&mut png, ImageFormat::Png)
        .map_err(|e| ExportError::Encode(format!("thumbnail: {e}")))?;
    Ok(format!(
        "data:image/png;base64,{}",
        BASE64_STD.encode(png.into_inner())
    ))
}

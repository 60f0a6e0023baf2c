//! Pagination – splits one tall raster into page-sized horizontal bands.
//!
//! The raster is scaled so its width fills the page. If the scaled height
//! fits on one page the whole image goes on page one; otherwise the source is
//! cut into bands whose pixel height corresponds to exactly one page height,
//! the final band holding whatever remains.

use serde::Serialize;

use crate::error::ExportError;

/// One horizontal strip of the source raster and the page it lands on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Band {
    pub page_index: usize,
    /// First source row of the band.
    pub src_y: u32,
    /// Rows copied from the source.
    pub height_px: u32,
    /// Height of the band on the page, in points.
    pub height_pt: f32,
}

/// Result of planning: one band per output page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagePlan {
    pub pages: Vec<Band>,
    /// Full raster height after scaling to the page width, in points.
    pub image_height_pt: f32,
    /// Source rows per full page.
    pub band_height_px: u32,
    /// Points per source pixel.
    pub pt_per_px: f32,
}

impl PagePlan {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_single_page(&self) -> bool {
        self.pages.len() == 1
    }
}

/// Plan how a `raster_w × raster_h` image is spread over pages of
/// `page_w_pt × page_h_pt`.
pub fn plan_bands(
    raster_w: u32,
    raster_h: u32,
    page_w_pt: f32,
    page_h_pt: f32,
) -> Result<PagePlan, ExportError> {
    if raster_w == 0 || raster_h == 0 {
        return Err(ExportError::EmptyRaster {
            width: raster_w,
            height: raster_h,
        });
    }
    if !(page_w_pt > 0.0 && page_h_pt > 0.0) {
        return Err(ExportError::Encode(format!(
            "invalid page size {page_w_pt}x{page_h_pt} pt"
        )));
    }

    let pt_per_px = page_w_pt / raster_w as f32;
    let image_height_pt = raster_h as f32 * pt_per_px;

    // Page height converted back into source rows with the same factor.
    let band_height_px = ((page_h_pt / pt_per_px).round() as u32).max(1);

    if image_height_pt <= page_h_pt {
        return Ok(PagePlan {
            pages: vec![Band {
                page_index: 0,
                src_y: 0,
                height_px: raster_h,
                height_pt: image_height_pt,
            }],
            image_height_pt,
            band_height_px,
            pt_per_px,
        });
    }

    let mut pages = Vec::new();
    let mut src_y = 0u32;
    while src_y < raster_h {
        let height_px = band_height_px.min(raster_h - src_y);
        pages.push(Band {
            page_index: pages.len(),
            src_y,
            height_px,
            height_pt: height_px as f32 * pt_per_px,
        });
        src_y += height_px;
    }

    log::debug!(
        "Planned {} page(s): raster {}x{} px, {} px per page",
        pages.len(),
        raster_w,
        raster_h,
        band_height_px
    );

    Ok(PagePlan {
        pages,
        image_height_pt,
        band_height_px,
        pt_per_px,
    })
}

//! Paginated export – the "Download PDF" action.
//!
//! One call captures the mounted preview, cuts it into A4 bands, assembles
//! the PDF and hands it to a [`Download`] sink. While it runs a transient
//! "Generating PDF..." overlay is shown on the [`Surface`]; the overlay is
//! owned by a guard and removed on every exit path. A busy flag rejects a
//! second export started before the first returns.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::ExportError;
use crate::pipeline::{generate_pdf, ExportConfig};
use crate::raster::Capture;
use crate::render::thumbnail_data_uri;
use crate::resume::PersonalInfo;

/// Alert shown when there is no preview to capture.
pub const MISSING_TARGET_MESSAGE: &str = "CV preview is not available. Please try again.";
/// Alert shown when rasterization or assembly fails.
pub const EXPORT_FAILED_MESSAGE: &str = "Error generating PDF. Please try again.";
/// Label of the transient overlay.
pub const OVERLAY_LABEL: &str = "Generating PDF...";

/// Handle to an overlay inserted on a [`Surface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayId(pub u64);

/// The user-facing side of an export: overlays and alerts.
pub trait Surface {
    fn show_overlay(&self, label: &str) -> OverlayId;
    fn remove_overlay(&self, id: OverlayId);
    fn alert(&self, message: &str);
}

/// Where finished PDFs go.
pub trait Download {
    /// Persist `bytes` under `filename`; returns where they ended up.
    fn save(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf>;
}

/// Saves downloads into a directory, creating it if needed.
#[derive(Debug, Clone)]
pub struct DirectoryDownload {
    dir: PathBuf,
}

impl DirectoryDownload {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Download for DirectoryDownload {
    fn save(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        if !self.dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.dir)?;
        }
        let path = self.dir.join(filename);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// Terminal surface: overlays become log lines, alerts go to stderr.
#[derive(Debug, Default)]
pub struct ConsoleSurface {
    next_id: AtomicU64,
}

impl Surface for ConsoleSurface {
    fn show_overlay(&self, label: &str) -> OverlayId {
        let id = OverlayId(self.next_id.fetch_add(1, Ordering::Relaxed));
        eprintln!("{label}");
        id
    }

    fn remove_overlay(&self, id: OverlayId) {
        log::debug!("Overlay {} removed", id.0);
    }

    fn alert(&self, message: &str) {
        eprintln!("{message}");
    }
}

/// Removes its overlay when dropped.
struct OverlayGuard<'a> {
    surface: &'a dyn Surface,
    id: OverlayId,
}

impl<'a> OverlayGuard<'a> {
    fn show(surface: &'a dyn Surface, label: &str) -> Self {
        let id = surface.show_overlay(label);
        Self { surface, id }
    }
}

impl Drop for OverlayGuard<'_> {
    fn drop(&mut self) {
        self.surface.remove_overlay(self.id);
    }
}

/// Holds the exporter's busy flag; clears it when dropped.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// What a successful export produced.
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub filename: String,
    pub path: PathBuf,
    pub pages: usize,
    pub raster_width: u32,
    pub raster_height: u32,
    pub bytes: usize,
    /// PNG data URI of the first page, when one could be made.
    pub thumbnail: Option<String>,
}

/// Runs exports one at a time.
#[derive(Debug, Default)]
pub struct Exporter {
    config: ExportConfig,
    busy: AtomicBool,
}

impl Exporter {
    pub fn new(config: ExportConfig) -> Self {
        Self {
            config,
            busy: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// True while an export is running; front ends disable their control.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn claim(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(&self.busy))
    }

    /// Export the preview `target` as a paginated A4 PDF named after `info`.
    ///
    /// `None` for `target` means the preview is not mounted: the user is
    /// alerted and nothing else happens. Failures are terminal for this
    /// call; nothing is retried.
    pub fn export(
        &self,
        target: Option<&dyn Capture>,
        info: &PersonalInfo,
        surface: &dyn Surface,
        download: &dyn Download,
    ) -> Result<ExportReport, ExportError> {
        let _busy = self.claim().ok_or_else(|| {
            log::warn!("Export requested while another export is running");
            ExportError::InProgress
        })?;

        let Some(target) = target else {
            log::warn!("Export requested with no mounted preview");
            surface.alert(MISSING_TARGET_MESSAGE);
            return Err(ExportError::MissingTarget);
        };

        let filename = pdf_filename(&info.first_name, &info.last_name);
        let overlay = OverlayGuard::show(surface, OVERLAY_LABEL);
        log::info!("Exporting '{filename}' at {}x scale", self.config.scale);

        match self.run(target, &filename, download) {
            Ok(report) => {
                drop(overlay);
                log::info!(
                    "Wrote '{}' ({} bytes, {} page{})",
                    report.path.display(),
                    report.bytes,
                    report.pages,
                    if report.pages == 1 { "" } else { "s" }
                );
                Ok(report)
            }
            Err(e) => {
                log::error!("PDF export failed: {e}");
                drop(overlay);
                surface.alert(EXPORT_FAILED_MESSAGE);
                Err(e)
            }
        }
    }

    fn run(
        &self,
        target: &dyn Capture,
        filename: &str,
        download: &dyn Download,
    ) -> Result<ExportReport, ExportError> {
        let pdf = generate_pdf(target, &self.config)?;
        let path = download.save(filename, &pdf.bytes)?;

        let thumbnail = match thumbnail_data_uri(&pdf.raster, &pdf.plan, self.config.thumbnail_width)
        {
            Ok(uri) => Some(uri),
            Err(e) => {
                log::warn!("Skipping thumbnail: {e}");
                None
            }
        };

        Ok(ExportReport {
            filename: filename.to_string(),
            path,
            pages: pdf.plan.page_count(),
            raster_width: pdf.raster.width(),
            raster_height: pdf.raster.height(),
            bytes: pdf.bytes.len(),
            thumbnail,
        })
    }
}

/// `{first}_{last}_CV.pdf` with whitespace runs turned into `_` and
/// characters that are unsafe in file names dropped. Blank parts fall back
/// to `CV` and `Resume`.
pub fn pdf_filename(first_name: &str, last_name: &str) -> String {
    let first = sanitize_part(first_name).unwrap_or_else(|| "CV".to_string());
    let last = sanitize_part(last_name).unwrap_or_else(|| "Resume".to_string());
    format!("{first}_{last}_CV.pdf")
}

fn sanitize_part(part: &str) -> Option<String> {
    let cleaned: String = part
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    let joined = joined.trim_matches('.').to_string();
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

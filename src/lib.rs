//! # cv-forge – résumé builder with paginated raster PDF export
//!
//! The export pipeline stages are:
//!
//! 1. **Model** – the Résumé Document and its reducer ([`resume`])
//! 2. **Project** – template projection into display blocks ([`templates`])
//! 3. **Layout** – blocks → continuous page-width [`scene`] ([`layout`])
//! 4. **Rasterize** – one tall RGB capture of the scene ([`raster`])
//! 5. **Paginate** – cut the capture into A4 bands ([`pagination`])
//! 6. **Render** – emit PDF bytes via printpdf ([`render`])
//!
//! [`export`] wraps stages 4–6 into the user-facing "Download PDF" action.
//! [`store`] persists CVs and chat sessions, and [`chat`] with [`llm`] fills a draft from a
//! conversation with a remote model.

pub mod chat;
pub mod config;
pub mod error;
pub mod export;
pub mod fonts;
pub mod layout;
pub mod llm;
pub mod pagination;
pub mod pipeline;
pub mod raster;
pub mod render;
pub mod resume;
pub mod scene;
pub mod store;
pub mod templates;

// Re-exports for convenience
pub use error::ExportError;
pub use export::{pdf_filename, Exporter};
pub use pipeline::{generate_pdf, render_scene, ExportConfig};
pub use resume::Resume;
pub use templates::TemplateKind;

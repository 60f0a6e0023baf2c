//! Error types shared across the export, storage and configuration layers.

use thiserror::Error;

/// Everything that can stop a PDF export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The preview has not been laid out / mounted yet.
    #[error("no rendered preview to export")]
    MissingTarget,

    /// Another export holds the busy flag.
    #[error("an export is already in progress")]
    InProgress,

    #[error("rendered preview has zero size ({width}x{height} px)")]
    EmptyRaster { width: u32, height: u32 },

    #[error("raster of {width}x{height} px exceeds the limit of {limit} pixels")]
    RasterTooLarge { width: u32, height: u32, limit: u64 },

    #[error("rasterization failed: {0}")]
    Raster(String),

    #[error("PDF assembly failed: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the key-value store and the CV library built on it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stored data has schema version {found}, newest supported is {supported}")]
    UnsupportedVersion { found: String, supported: u32 },
}

/// Invalid or missing configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable '{0}' is not set")]
    Missing(&'static str),

    #[error("environment variable '{key}' has invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

//! Application configuration loaded from environment variables (and a `.env`
//! file when present).

use std::path::PathBuf;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Where the key-value store keeps its files.
    pub data_dir: PathBuf,
    /// Owner of the CV library.
    pub user: String,
    /// Where exported PDFs are written.
    pub out_dir: PathBuf,
    /// Optional TTF used for glyph rendering.
    pub font: Option<PathBuf>,
    pub scale: f32,
    /// Only needed by the chat flow.
    pub groq_api_key: Option<String>,
    pub groq_model: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".cvforge"),
            user: "local".to_string(),
            out_dir: PathBuf::from("."),
            font: None,
            scale: 2.0,
            groq_api_key: None,
            groq_model: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let scale = match get("CVFORGE_SCALE") {
            Some(raw) => parse_scale(&raw)?,
            None => defaults.scale,
        };

        Ok(Self {
            data_dir: get("CVFORGE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            user: get("CVFORGE_USER").unwrap_or(defaults.user),
            out_dir: get("CVFORGE_OUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.out_dir),
            font: get("CVFORGE_FONT").map(PathBuf::from),
            scale,
            groq_api_key: get("GROQ_API_KEY"),
            groq_model: get("GROQ_MODEL"),
        })
    }

    /// The API key, or an error naming the variable to set.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.groq_api_key
            .as_deref()
            .ok_or(ConfigError::Missing("GROQ_API_KEY"))
    }
}

/// Oversampling factor; accepted range is (0, 8].
pub fn parse_scale(raw: &str) -> Result<f32, ConfigError> {
    match raw.trim().parse::<f32>() {
        Ok(v) if v > 0.0 && v <= 8.0 => Ok(v),
        _ => Err(ConfigError::Invalid {
            key: "CVFORGE_SCALE",
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.user, "local");
        assert_eq!(config.scale, 2.0);
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn reads_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("CVFORGE_USER", "ann"),
            ("CVFORGE_SCALE", "3"),
            ("CVFORGE_FONT", "/fonts/Inter.ttf"),
            ("GROQ_API_KEY", "gsk_test"),
            ("GROQ_MODEL", " "),
        ]))
        .unwrap();
        assert_eq!(config.user, "ann");
        assert_eq!(config.scale, 3.0);
        assert_eq!(config.font, Some(PathBuf::from("/fonts/Inter.ttf")));
        assert_eq!(config.require_api_key().unwrap(), "gsk_test");
        assert!(config.groq_model.is_none());
    }

    #[test]
    fn rejects_bad_scale() {
        for bad in ["0", "-1", "abc", "20"] {
            let err = AppConfig::from_lookup(lookup(&[("CVFORGE_SCALE", bad)])).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { .. }), "{bad}");
        }
    }
}

use std::collections::HashSet;

use anyhow::bail;
use serde::Deserialize;

use crate::inputs::{default_controls, InputControl};

/// Server used by the desktop build when nothing else is configured.
pub const DEFAULT_NATIVE_SERVER: &str = "http://localhost:8081";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Origin of the compute server. `None` means "same origin as the page".
    pub server_url: Option<String>,
    /// Definition executed by `/solve/<definition>`.
    pub definition: String,
    /// Margin applied when fitting the camera to a new result.
    pub fit_offset: f32,
    /// Hide the loading indicator when a request or decode fails.
    pub clear_indicator_on_error: bool,
    pub controls: Vec<InputControl>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            definition: "solarcanopy.gh".into(),
            fit_offset: 1.2,
            clear_indicator_on_error: false,
            controls: default_controls(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.definition.trim().is_empty() {
            bail!("definition name is empty");
        }
        if !(self.fit_offset > 0.0) {
            bail!("fit_offset must be positive, got {}", self.fit_offset);
        }
        let mut seen = HashSet::new();
        for control in &self.controls {
            if !seen.insert(control.id.as_str()) {
                bail!("duplicate control id {:?}", control.id);
            }
        }
        Ok(())
    }

    /// Base URL the solve endpoint is resolved against.
    pub fn server_base(&self) -> String {
        match &self.server_url {
            Some(url) => url.clone(),
            None => page_origin().unwrap_or_else(|| DEFAULT_NATIVE_SERVER.to_string()),
        }
    }

    /// Desktop configuration: optional JSON file, then env overrides.
    ///
    /// * `SOLARCANOPY_CONFIG` – path to a JSON file shaped like `AppConfig`
    /// * `SOLARCANOPY_SERVER` – compute server origin
    /// * `SOLARCANOPY_DEFINITION` – definition name
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> anyhow::Result<Self> {
        use anyhow::Context as _;

        let mut config = match std::env::var("SOLARCANOPY_CONFIG") {
            Ok(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config file {path}"))?;
                Self::from_json(&text).with_context(|| format!("parsing config file {path}"))?
            }
            Err(_) => Self::default(),
        };
        if let Ok(server) = std::env::var("SOLARCANOPY_SERVER") {
            config.server_url = Some(server);
        }
        if let Ok(definition) = std::env::var("SOLARCANOPY_DEFINITION") {
            config.definition = definition;
        }
        config.validate()?;
        Ok(config)
    }

    /// Browser configuration: defaults, solving against the page's own origin.
    #[cfg(target_arch = "wasm32")]
    pub fn for_page() -> anyhow::Result<Self> {
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(target_arch = "wasm32")]
fn page_origin() -> Option<String> {
    web_sys::window()?.location().origin().ok()
}

#[cfg(not(target_arch = "wasm32"))]
fn page_origin() -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.definition, "solarcanopy.gh");
        assert_eq!(config.server_base(), DEFAULT_NATIVE_SERVER);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            AppConfig::from_json(r#"{"server_url": "http://compute:9000", "fit_offset": 1.5}"#)
                .unwrap();
        assert_eq!(config.server_base(), "http://compute:9000");
        assert_eq!(config.fit_offset, 1.5);
        assert_eq!(config.controls, default_controls());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut config = AppConfig::default();
        let dup = config.controls[0].clone();
        config.controls.push(dup);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate control id"));
    }

    #[test]
    fn rejects_bad_fit_offset() {
        assert!(AppConfig::from_json(r#"{"fit_offset": 0}"#).is_err());
        assert!(AppConfig::from_json(r#"{"definition": "  "}"#).is_err());
    }
}

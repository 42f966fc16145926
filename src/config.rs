use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{MockupError, MockupResult};

/// Engine configuration, usually loaded from a YAML file next to the assets.
///
/// Every field has a default, so an empty document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub viewport: ViewportConfig,
    pub slots: SlotConfig,
    pub export: ExportConfig,
    /// Number of document snapshots kept for undo
    pub history_limit: usize,
}

/// Pan/zoom limits for the preview canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Pixels kept free around the content when fitting and panning
    pub margin: f64,
    pub max_scale: f64,
    /// Multiplicative zoom factor applied by one zoom in/out step
    pub zoom_step: f64,
    /// Lower bound for the fit scale when the container has no usable room
    pub min_fit_scale: f64,
}

/// Marker attributes and the scoping class convention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotConfig {
    pub image_marker: String,
    pub pattern_marker: String,
    pub title_attribute: String,
    pub scoping_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Node id that stands for the whole preview content
    pub preview_id: String,
    pub jpeg_quality: u8,
    pub default_filename: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            viewport: ViewportConfig::default(),
            slots: SlotConfig::default(),
            export: ExportConfig::default(),
            history_limit: 50,
        }
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            margin: 40.0,
            max_scale: 3.0,
            zoom_step: 1.5,
            min_fit_scale: 0.01,
        }
    }
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            image_marker: "data-img".to_string(),
            pattern_marker: "data-pattern".to_string(),
            title_attribute: "data-title".to_string(),
            scoping_prefix: "pattern-".to_string(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            preview_id: "preview-content".to_string(),
            jpeg_quality: 95,
            default_filename: "mockup".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a config from YAML text
    pub fn from_yaml(yaml: &str) -> MockupResult<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file
    pub fn load(path: &Path) -> MockupResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| MockupError::Io(format!("read {}: {}", path.display(), e)))?;
        Self::from_yaml(&text)
    }

    pub fn validate(&self) -> MockupResult<()> {
        let vp = &self.viewport;
        if !vp.margin.is_finite() || vp.margin < 0.0 {
            return Err(invalid("viewport.margin", "must be a non-negative number"));
        }
        if !vp.max_scale.is_finite() || vp.max_scale <= 0.0 {
            return Err(invalid("viewport.max_scale", "must be greater than 0"));
        }
        if !vp.zoom_step.is_finite() || vp.zoom_step <= 1.0 {
            return Err(invalid("viewport.zoom_step", "must be greater than 1"));
        }
        if !vp.min_fit_scale.is_finite()
            || vp.min_fit_scale <= 0.0
            || vp.min_fit_scale > vp.max_scale
        {
            return Err(invalid(
                "viewport.min_fit_scale",
                "must be greater than 0 and at most max_scale",
            ));
        }

        let slots = &self.slots;
        for (field, value) in [
            ("slots.image_marker", &slots.image_marker),
            ("slots.pattern_marker", &slots.pattern_marker),
            ("slots.title_attribute", &slots.title_attribute),
            ("slots.scoping_prefix", &slots.scoping_prefix),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
        }
        if slots.image_marker == slots.pattern_marker {
            return Err(invalid(
                "slots.pattern_marker",
                "must differ from slots.image_marker",
            ));
        }

        if !(1..=100).contains(&self.export.jpeg_quality) {
            return Err(invalid("export.jpeg_quality", "must be between 1 and 100"));
        }
        if self.export.preview_id.is_empty() {
            return Err(invalid("export.preview_id", "must not be empty"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> MockupError {
    MockupError::InvalidConfig {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

use thiserror::Error;

use crate::locator::SlotKind;

pub type MockupResult<T> = Result<T, MockupError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MockupError {
    #[error("Failed to load template '{name}': {reason}")]
    TemplateLoad { name: String, reason: String },

    #[error("Failed to read pattern catalog: {0}")]
    PatternSource(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("HTML serialization error: {0}")]
    Serialize(String),

    #[error("YAML error: {0}")]
    YamlError(String),

    #[error("Invalid config value for '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Unsupported image data: {0}")]
    UnsupportedImage(String),

    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("Node '{node_id}' not found in the live preview")]
    NodeNotFound { node_id: String },

    #[error("Rasterization failed for '{node_id}': {reason}")]
    Rasterize { node_id: String, reason: String },

    #[error("Image encoding failed: {0}")]
    Encode(String),

    #[error("Unknown pattern '{name}'")]
    UnknownPattern { name: String },

    #[error("{kind} slot index {index} is out of range ({count} slots)")]
    SlotOutOfRange {
        kind: SlotKind,
        index: usize,
        count: usize,
    },
}

impl From<std::io::Error> for MockupError {
    fn from(err: std::io::Error) -> Self {
        MockupError::Io(err.to_string())
    }
}

impl From<serde_yaml::Error> for MockupError {
    fn from(err: serde_yaml::Error) -> Self {
        MockupError::YamlError(err.to_string())
    }
}

impl From<image::ImageError> for MockupError {
    fn from(err: image::ImageError) -> Self {
        MockupError::Encode(err.to_string())
    }
}

impl From<base64::DecodeError> for MockupError {
    fn from(err: base64::DecodeError) -> Self {
        MockupError::InvalidDataUrl(err.to_string())
    }
}

//! Conversion between uploaded image bytes and `data:` URLs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::path::Path;

use crate::error::{MockupError, MockupResult};

/// Encode raw image bytes as `data:<mime>;base64,<payload>`. The MIME type is
/// sniffed from the bytes, not trusted from a file name.
pub fn image_data_url(bytes: &[u8]) -> MockupResult<String> {
    let format = image::guess_format(bytes)
        .map_err(|e| MockupError::UnsupportedImage(e.to_string()))?;
    Ok(format!(
        "data:{};base64,{}",
        format.to_mime_type(),
        STANDARD.encode(bytes)
    ))
}

/// Read an image file and encode it as a data URL.
pub async fn read_image_data_url(path: &Path) -> MockupResult<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| MockupError::Io(format!("read {}: {}", path.display(), e)))?;
    image_data_url(&bytes)
}

/// A decoded `data:` URL
#[derive(Debug, Clone, PartialEq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Decode a base64 `data:` URL. Accepts the bare URL or a CSS `url(...)`
/// wrapper, optionally quoted.
pub fn decode_data_url(value: &str) -> MockupResult<DataUrl> {
    let url = strip_css_url(value.trim());
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| MockupError::InvalidDataUrl("missing 'data:' scheme".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| MockupError::InvalidDataUrl("missing ',' separator".to_string()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| MockupError::InvalidDataUrl("only base64 payloads are supported".to_string()))?;

    Ok(DataUrl {
        mime: mime.to_string(),
        bytes: STANDARD.decode(payload.trim())?,
    })
}

fn strip_css_url(value: &str) -> &str {
    let inner = value
        .strip_prefix("url(")
        .and_then(|v| v.strip_suffix(')'))
        .map(str::trim)
        .unwrap_or(value);
    inner
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| inner.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(inner)
}

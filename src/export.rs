//! Rasterizes a node of the live preview and hands the encoded file to a sink.
//!
//! Layout and painting are behind [`Rasterizer`]; the built-in
//! [`FlatRasterizer`] only paints boxes whose geometry resolves to `px`
//! lengths, from inline styles or from the published style sheet, which is
//! what absolutely positioned mockup templates use.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::io::Cursor;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::ExportConfig;
use crate::css::{ComputedStyle, Stylesheet};
use crate::document::Document;
use crate::dom::{Element, Fragment};
use crate::error::{MockupError, MockupResult};
use crate::upload::decode_data_url;
use crate::viewport::{Size, ViewportTransform};

/// Largest canvas side we agree to allocate
const MAX_DIMENSION: u32 = 16_384;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Png,
    Jpeg,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpeg",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = MockupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "jpeg" | "jpg" => Ok(ExportFormat::Jpeg),
            other => Err(MockupError::Encode(format!(
                "unknown export format '{}': expected png or jpeg",
                other
            ))),
        }
    }
}

/// Snapshot of the live preview an export reads from
#[derive(Debug, Clone)]
pub struct ExportSurface<'a> {
    pub document: &'a Document,
    /// Everything currently published in the style cascade
    pub css: String,
    pub transform: ViewportTransform,
    pub content: Size,
}

/// A resolved node, sized in output pixels
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTarget {
    pub node_id: String,
    /// Outer HTML of the node
    pub html: String,
    pub css: String,
    pub width: u32,
    pub height: u32,
    /// Factor from CSS pixels to output pixels
    pub scale: f64,
}

pub trait Rasterizer {
    fn rasterize(&self, target: &RenderTarget) -> MockupResult<RgbaImage>;
}

pub trait DownloadSink {
    /// Deliver an encoded file. Returns where it ended up.
    fn deliver(&self, file_name: &str, bytes: Vec<u8>) -> impl Future<Output = MockupResult<String>> + Send;
}

/// Paints background colours and `data:` background images of the root box
/// and of every descendant whose `width`/`height` (and optionally
/// `left`/`top`) resolve to pixels. Backgrounds come from inline styles and
/// from the target's CSS, so applied patterns show up in the output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatRasterizer;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Rect {
    x: i64,
    y: i64,
    width: u32,
    height: u32,
}

impl Rasterizer for FlatRasterizer {
    fn rasterize(&self, target: &RenderTarget) -> MockupResult<RgbaImage> {
        let mut canvas = RgbaImage::new(target.width, target.height);
        let fragment = Fragment::parse(&target.html);
        let Some(root) = fragment.first_element() else {
            return Ok(canvas);
        };
        let sheet = Stylesheet::parse(&target.css);

        let full = Rect {
            x: 0,
            y: 0,
            width: target.width,
            height: target.height,
        };
        paint_box(&mut canvas, &root, &sheet.computed(&root), full, &target.node_id)?;

        for element in root.descendants() {
            let style = sheet.computed(&element);
            if let Some(rect) = positioned_rect(&style, target.scale) {
                paint_box(&mut canvas, &element, &style, rect, &target.node_id)?;
            }
        }
        Ok(canvas)
    }
}

fn paint_box(
    canvas: &mut RgbaImage,
    element: &Element,
    style: &ComputedStyle,
    rect: Rect,
    node_id: &str,
) -> MockupResult<()> {
    if rect.width == 0 || rect.height == 0 {
        return Ok(());
    }

    if let Some(color) = style.background_color() {
        fill_rect(canvas, rect, color);
    }

    let Some(background) = style.background_image() else {
        return Ok(());
    };
    if !background.contains("data:") {
        log::debug!("skipping non-inline background image on <{}>", element.tag_name());
        return Ok(());
    }

    let fail = |reason: String| MockupError::Rasterize {
        node_id: node_id.to_string(),
        reason,
    };
    let data = decode_data_url(background).map_err(|e| fail(e.to_string()))?;
    let decoded = image::load_from_memory(&data.bytes)
        .map_err(|e| fail(format!("cannot decode {} background: {}", data.mime, e)))?;
    let resized = imageops::resize(&decoded.to_rgba8(), rect.width, rect.height, FilterType::Triangle);
    imageops::overlay(canvas, &resized, rect.x, rect.y);
    Ok(())
}

fn fill_rect(canvas: &mut RgbaImage, rect: Rect, color: Rgba<u8>) {
    let x0 = rect.x.max(0);
    let y0 = rect.y.max(0);
    let x1 = (rect.x + i64::from(rect.width)).min(i64::from(canvas.width()));
    let y1 = (rect.y + i64::from(rect.height)).min(i64::from(canvas.height()));

    for y in y0..y1 {
        for x in x0..x1 {
            let dst = canvas.get_pixel_mut(x as u32, y as u32);
            *dst = blend(*dst, color);
        }
    }
}

/// Source-over compositing of one pixel
fn blend(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = f32::from(src[3]) / 255.0;
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let channel = |i: usize| {
        let c = (f32::from(src[i]) * sa + f32::from(dst[i]) * da * (1.0 - sa)) / out_a;
        c.round().clamp(0.0, 255.0) as u8
    };
    Rgba([channel(0), channel(1), channel(2), (out_a * 255.0).round() as u8])
}

fn positioned_rect(style: &ComputedStyle, scale: f64) -> Option<Rect> {
    let width = style.px("width")?;
    let height = style.px("height")?;
    let left = style.px("left").unwrap_or(0.0);
    let top = style.px("top").unwrap_or(0.0);
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    Some(Rect {
        x: (left * scale).round() as i64,
        y: (top * scale).round() as i64,
        width: (width * scale).round().min(f64::from(MAX_DIMENSION)) as u32,
        height: (height * scale).round().min(f64::from(MAX_DIMENSION)) as u32,
    })
}

/// Flatten onto an opaque white background
fn flatten_on_white(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let p = blend(Rgba([255, 255, 255, 255]), *image.get_pixel(x, y));
        Rgb([p[0], p[1], p[2]])
    })
}

/// Encode a rasterized node. JPEG output is composited onto white first.
pub fn encode(image: RgbaImage, format: ExportFormat, jpeg_quality: u8) -> MockupResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    match format {
        ExportFormat::Png => {
            DynamicImage::ImageRgba8(image).write_to(&mut buf, ImageFormat::Png)?;
        }
        ExportFormat::Jpeg => {
            let rgb = flatten_on_white(&image);
            JpegEncoder::new_with_quality(&mut buf, jpeg_quality).encode_image(&rgb)?;
        }
    }
    Ok(buf.into_inner())
}

/// Writes exports into a directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DownloadSink for DirectorySink {
    async fn deliver(&self, file_name: &str, bytes: Vec<u8>) -> MockupResult<String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| MockupError::Io(format!("create {}: {}", self.dir.display(), e)))?;
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| MockupError::Io(format!("write {}: {}", path.display(), e)))?;
        log::info!("exported {} ({} bytes)", path.display(), bytes.len());
        Ok(path.display().to_string())
    }
}

pub struct Exporter<R, S> {
    rasterizer: R,
    sink: S,
    config: ExportConfig,
}

impl<R: Rasterizer, S: DownloadSink> Exporter<R, S> {
    pub fn new(rasterizer: R, sink: S, config: ExportConfig) -> Self {
        Self {
            rasterizer,
            sink,
            config,
        }
    }

    /// Resolve `node_id` against the surface. The preview id stands for the
    /// whole document at content size; any other id must match an element,
    /// sized by its resolved `width`/`height` or else the content size.
    ///
    /// A node without a known, non-empty size is an error rather than a
    /// one-pixel image.
    pub fn render_target(&self, surface: &ExportSurface<'_>, node_id: &str) -> MockupResult<RenderTarget> {
        let (html, size) = if node_id == self.config.preview_id {
            (
                format!("<div id=\"{}\">{}</div>", node_id, surface.document.html),
                surface.content,
            )
        } else {
            let fragment = Fragment::parse(&surface.document.html);
            let element = fragment
                .element_by_id(node_id)
                .ok_or_else(|| MockupError::NodeNotFound {
                    node_id: node_id.to_string(),
                })?;
            let style = Stylesheet::parse(&surface.css).computed(&element);
            let width = style.px("width").unwrap_or(surface.content.width);
            let height = style.px("height").unwrap_or(surface.content.height);
            (element.outer_html()?, Size::new(width, height))
        };

        let fail = |reason: String| MockupError::Rasterize {
            node_id: node_id.to_string(),
            reason,
        };
        if !(size.width > 0.0 && size.height > 0.0) {
            return Err(fail("content size unknown".to_string()));
        }

        let scale = surface.transform.scale;
        let to_pixels = |len: f64| -> MockupResult<u32> {
            let px = (len * scale).round();
            if !px.is_finite() || px < 1.0 || px > f64::from(MAX_DIMENSION) {
                return Err(fail(format!("rendered size {} is out of range", px)));
            }
            Ok(px as u32)
        };

        Ok(RenderTarget {
            node_id: node_id.to_string(),
            html,
            css: surface.css.clone(),
            width: to_pixels(size.width)?,
            height: to_pixels(size.height)?,
            scale,
        })
    }

    /// Rasterize and encode without delivering.
    pub fn render(&self, surface: &ExportSurface<'_>, node_id: &str, format: ExportFormat) -> MockupResult<Vec<u8>> {
        let target = self.render_target(surface, node_id)?;
        let image = self.rasterizer.rasterize(&target)?;
        encode(image, format, self.config.jpeg_quality)
    }

    /// Render `node_id` and deliver it as `{filename}.{ext}`.
    pub async fn export(
        &self,
        surface: &ExportSurface<'_>,
        node_id: &str,
        format: ExportFormat,
        filename: &str,
    ) -> MockupResult<String> {
        let bytes = self.render(surface, node_id, format)?;
        let file_name = format!("{}.{}", self.download_stem(filename), format.extension());
        self.sink.deliver(&file_name, bytes).await
    }

    fn download_stem(&self, filename: &str) -> String {
        let cleaned: String = filename
            .trim()
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':' | '\0') { '_' } else { c })
            .collect();
        if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
            self.config.default_filename.clone()
        } else {
            cleaned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::image_data_url;
    use pretty_assertions::assert_eq;

    fn surface(document: &Document, scale: f64) -> ExportSurface<'_> {
        ExportSurface {
            document,
            css: String::new(),
            transform: ViewportTransform {
                offset_x: 0.0,
                offset_y: 0.0,
                scale,
            },
            content: Size::new(100.0, 50.0),
        }
    }

    fn exporter(dir: &std::path::Path) -> Exporter<FlatRasterizer, DirectorySink> {
        Exporter::new(FlatRasterizer, DirectorySink::new(dir), ExportConfig::default())
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("JPG".parse::<ExportFormat>().unwrap(), ExportFormat::Jpeg);
        assert_eq!("png".parse::<ExportFormat>().unwrap(), ExportFormat::Png);
        assert!("gif".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_preview_root_sized_by_content_and_scale() {
        let document = Document::new("<p>hi</p>", "");
        let dir = tempfile::tempdir().unwrap();
        let target = exporter(dir.path())
            .render_target(&surface(&document, 0.5), "preview-content")
            .unwrap();
        assert_eq!((target.width, target.height), (50, 25));
        assert_eq!(target.html, r#"<div id="preview-content"><p>hi</p></div>"#);
    }

    #[test]
    fn test_missing_node() {
        let document = Document::new("<p>hi</p>", "");
        let dir = tempfile::tempdir().unwrap();
        let err = exporter(dir.path())
            .render_target(&surface(&document, 1.0), "nope")
            .unwrap_err();
        assert_eq!(
            err,
            MockupError::NodeNotFound {
                node_id: "nope".to_string()
            }
        );
    }

    #[test]
    fn test_flat_rasterizer_paints_positioned_boxes() {
        let swatch = RgbaImage::from_pixel(1, 1, Rgba([0, 255, 0, 255]));
        let mut png = Cursor::new(Vec::new());
        swatch.write_to(&mut png, ImageFormat::Png).unwrap();
        let url = image_data_url(png.get_ref()).unwrap();

        let html = format!(
            r#"<div id="card" style="width: 20px; height: 10px; background-color: #ff0000"><div data-img="" style="left: 10px; top: 0px; width: 10px; height: 10px; background-image: url({})"></div></div>"#,
            url
        );
        let document = Document::new(html, "");
        let dir = tempfile::tempdir().unwrap();
        let ex = exporter(dir.path());
        let target = ex.render_target(&surface(&document, 2.0), "card").unwrap();
        assert_eq!((target.width, target.height), (40, 20));

        let image = FlatRasterizer.rasterize(&target).unwrap();
        assert_eq!(*image.get_pixel(5, 5), Rgba([255, 0, 0, 255]));
        assert_eq!(*image.get_pixel(30, 10), Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_unknown_content_size_is_an_error() {
        let document = Document::new("<p>hi</p>", "");
        let dir = tempfile::tempdir().unwrap();
        let mut unsized_surface = surface(&document, 1.0);
        unsized_surface.content = Size::new(0.0, 0.0);
        assert_eq!(
            exporter(dir.path()).render_target(&unsized_surface, "preview-content").unwrap_err(),
            MockupError::Rasterize {
                node_id: "preview-content".to_string(),
                reason: "content size unknown".to_string(),
            }
        );
    }

    #[test]
    fn test_node_sized_by_style_sheet() {
        let document = Document::new(r#"<div id="card" class="card"></div>"#, "");
        let dir = tempfile::tempdir().unwrap();
        let mut styled = surface(&document, 1.0);
        styled.css = ".card { width: 30px; height: 12px; }".to_string();
        let target = exporter(dir.path()).render_target(&styled, "card").unwrap();
        assert_eq!((target.width, target.height), (30, 12));
    }

    #[test]
    fn test_flat_rasterizer_paints_css_backgrounds() {
        let html = r#"<div id="card" class="card"><div data-pattern="" class="pattern-0"></div></div>"#;
        let document = Document::new(html, "");
        let dir = tempfile::tempdir().unwrap();
        let mut styled = surface(&document, 1.0);
        styled.css = ".card { width: 20px; height: 10px; background-color: #ffffff; }\n[data-pattern] { width: 1px; }\n.pattern-0 { left: 10px; width: 10px; height: 10px; background: #00ff00; }".to_string();

        let target = exporter(dir.path()).render_target(&styled, "card").unwrap();
        let image = FlatRasterizer.rasterize(&target).unwrap();
        assert_eq!(*image.get_pixel(5, 5), Rgba([255, 255, 255, 255]));
        assert_eq!(*image.get_pixel(15, 5), Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_jpeg_is_flattened_on_white() {
        let transparent = RgbaImage::new(4, 4);
        let bytes = encode(transparent, ExportFormat::Jpeg, 95).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        let p = decoded.get_pixel(1, 1);
        assert!(p[0] > 250 && p[1] > 250 && p[2] > 250);
    }

    #[test]
    fn test_png_keeps_transparency() {
        let bytes = encode(RgbaImage::new(3, 3), ExportFormat::Png, 95).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0)[3], 0);
    }

    #[tokio::test]
    async fn test_export_writes_named_file() {
        let document = Document::new(r#"<div style="background-color: #000"></div>"#, "");
        let dir = tempfile::tempdir().unwrap();
        let ex = exporter(dir.path());
        let location = ex
            .export(&surface(&document, 1.0), "preview-content", ExportFormat::Png, "shirt")
            .await
            .unwrap();
        assert!(location.ends_with("shirt.png"));
        let written = image::open(dir.path().join("shirt.png")).unwrap();
        assert_eq!((written.width(), written.height()), (100, 50));
    }

    #[tokio::test]
    async fn test_export_sanitizes_file_name() {
        let document = Document::new("<p></p>", "");
        let dir = tempfile::tempdir().unwrap();
        let ex = exporter(dir.path());
        ex.export(&surface(&document, 1.0), "preview-content", ExportFormat::Jpeg, "../evil")
            .await
            .unwrap();
        assert!(dir.path().join(".._evil.jpeg").exists());
        ex.export(&surface(&document, 1.0), "preview-content", ExportFormat::Jpeg, "  ")
            .await
            .unwrap();
        assert!(dir.path().join("mockup.jpeg").exists());
    }
}

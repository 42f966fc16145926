//! # Mockup Engine
//!
//! Preview and transform engine for HTML/CSS product mockups.
//!
//! ## Features
//! - Slot discovery: placeholders tagged with `data-img` / `data-pattern`
//! - Image binding from uploaded bytes, files or `data:` URLs
//! - Pattern catalog with per-slot selector scoping
//! - Live style table with idempotent publish/retract by id
//! - Pan/zoom viewport with fit-to-container and clamped panning
//! - Content sizes and backgrounds resolved from inline styles and simple CSS rules
//! - PNG/JPEG export through a pluggable rasterizer
//!
//! ## Example: binding slots
//! ```ignore
//! use mockup_engine::{find_slots, Pattern, SlotBinder, SlotKind};
//!
//! let html = r#"<div data-img></div><div data-pattern data-title="Sleeve"></div>"#;
//! let slots = find_slots(html, SlotKind::Pattern);
//! assert_eq!(slots[0].title, "Sleeve");
//!
//! let binder = SlotBinder::default();
//! let stripes = Pattern { name: "stripes".into(), css: ".stripes-pattern { background: red; }".into() };
//! let applied = binder.apply_pattern(html, 0, &stripes);
//! assert_eq!(applied.scoped_css.as_deref(), Some(".pattern-0 { background: red; }"));
//! ```
//!
//! ## Example: a full session
//! ```ignore
//! use mockup_engine::{DirectorySource, EngineConfig, MockupSession};
//!
//! let assets = DirectorySource::new("assets");
//! let mut session = MockupSession::new(EngineConfig::default());
//! session.load_patterns(&assets).await;
//! session.load_template(&assets, "tshirt").await;
//! session.apply_pattern(0, "stripes")?;
//! for notice in session.drain_notices() {
//!     println!("{}", notice);
//! }
//! ```

pub mod binder;
pub mod config;
pub mod css;
pub mod document;
pub mod dom;
pub mod error;
pub mod export;
pub mod locator;
pub mod notice;
pub mod preview;
pub mod registry;
pub mod session;
pub mod source;
pub mod styles;
pub mod upload;
pub mod viewport;

// --- Core types ---
pub use binder::{scope_pattern_css, PatternApplication, SlotBinder};
pub use config::{EngineConfig, ExportConfig, SlotConfig, ViewportConfig};
pub use css::{ComputedStyle, CssRule, Stylesheet};
pub use document::{Document, History, Mutation, StyleEffect, Transition};
pub use error::{MockupError, MockupResult};
pub use locator::{find_slots, find_slots_with_config, slot_style_id, SlotDescriptor, SlotKind, SlotPayload};
pub use notice::{Notice, NoticeLevel};
pub use registry::{pattern_name, Pattern, PatternRegistry};
pub use styles::{swatch_style_id, StylePublicationTable, DOCUMENT_STYLE_ID};

// --- Session and surfaces ---
pub use preview::{LivePreview, PreviewHost, GUIDE_OVERLAY_ID};
pub use session::{MockupSession, PatternBinding, TemplateTicket};
pub use viewport::{clamp_pan, compute_fit, Size, ViewportController, ViewportState, ViewportTransform};

// --- I/O ---
pub use export::{DirectorySink, DownloadSink, ExportFormat, ExportSurface, Exporter, FlatRasterizer, Rasterizer, RenderTarget};
pub use source::{DirectorySource, PatternEntry, PatternSource, StaticSource, TemplatePayload, TemplateSource};
pub use upload::{decode_data_url, image_data_url, read_image_data_url, DataUrl};

/// Attach an image to image slot `index`. Out-of-range indices return `html` unchanged.
pub fn bind_image(html: &str, index: usize, image_data_url: &str) -> String {
    SlotBinder::default().bind_image(html, index, image_data_url)
}

/// Apply `pattern` to pattern slot `index` with the default scoping convention.
pub fn apply_pattern(html: &str, index: usize, pattern: &Pattern) -> PatternApplication {
    SlotBinder::default().apply_pattern(html, index, pattern)
}

/// Strip the scoping class from pattern slot `index`.
pub fn remove_pattern(html: &str, index: usize) -> String {
    SlotBinder::default().remove_pattern(html, index)
}

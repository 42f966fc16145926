//! Mounted preview surfaces.
//!
//! A [`LivePreview`] owns the transform controller of one rendering surface.
//! A [`PreviewHost`] only holds a preview while it is open, so a closed modal
//! never keeps a second controller alive over the same content.

use crate::config::ViewportConfig;
use crate::viewport::{Size, ViewportController, ViewportTransform};

/// Id of the alignment overlay drawn next to the content node
pub const GUIDE_OVERLAY_ID: &str = "guide-lines";

#[derive(Debug, Clone)]
pub struct LivePreview {
    root_id: String,
    viewport: ViewportController,
    show_guides: bool,
}

impl LivePreview {
    /// Mount a preview and fit the content into the container.
    pub fn mount(root_id: impl Into<String>, config: ViewportConfig, container: Size, content: Size) -> Self {
        let mut viewport = ViewportController::new(config);
        viewport.set_container_size(container);
        viewport.set_content_size(content);
        Self {
            root_id: root_id.into(),
            viewport,
            show_guides: false,
        }
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut ViewportController {
        &mut self.viewport
    }

    pub fn transform(&self) -> ViewportTransform {
        self.viewport.transform()
    }

    /// Content size, zero until known
    pub fn content_size(&self) -> Size {
        self.viewport.content_size().unwrap_or(Size::new(0.0, 0.0))
    }

    pub fn resize_container(&mut self, container: Size) {
        self.viewport.set_container_size(container);
    }

    /// New content always comes back fitted.
    pub fn replace_content(&mut self, content: Size) -> ViewportTransform {
        self.viewport.set_content_size(content);
        self.viewport.recenter()
    }

    pub fn guides_visible(&self) -> bool {
        self.show_guides
    }

    /// Flip the guide overlay. Returns the new visibility.
    pub fn toggle_guides(&mut self) -> bool {
        self.show_guides = !self.show_guides;
        self.show_guides
    }

    /// Markup of the guide overlay, a sibling of the content node. It is
    /// never part of the document, so exports do not include it.
    pub fn guide_overlay_html(&self) -> Option<String> {
        self.show_guides
            .then(|| format!("<div class=\"{0}\" id=\"{0}\"></div>", GUIDE_OVERLAY_ID))
    }
}

/// Visibility-gated mount point for a preview, e.g. a modal
#[derive(Debug, Clone)]
pub struct PreviewHost {
    root_id: String,
    config: ViewportConfig,
    mounted: Option<LivePreview>,
}

impl PreviewHost {
    pub fn new(root_id: impl Into<String>, config: ViewportConfig) -> Self {
        Self {
            root_id: root_id.into(),
            config,
            mounted: None,
        }
    }

    /// Mount a fresh, fitted preview. Reopening discards the previous one.
    pub fn open(&mut self, container: Size, content: Size) -> &mut LivePreview {
        if self.mounted.is_some() {
            log::debug!("preview host '{}' reopened, remounting", self.root_id);
        }
        self.mounted
            .insert(LivePreview::mount(self.root_id.clone(), self.config.clone(), container, content))
    }

    /// Tear the preview down. Returns whether one was mounted.
    pub fn close(&mut self) -> bool {
        self.mounted.take().is_some()
    }

    pub fn is_open(&self) -> bool {
        self.mounted.is_some()
    }

    pub fn preview(&self) -> Option<&LivePreview> {
        self.mounted.as_ref()
    }

    pub fn preview_mut(&mut self) -> Option<&mut LivePreview> {
        self.mounted.as_mut()
    }
}

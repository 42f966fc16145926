//! Pan/zoom state of the preview canvas.
//!
//! Lifecycle: `Uninitialized` until both the container and content sizes are
//! known, then `Fitted`; a drag or zoom step moves through `Interacting` and
//! settles back to `Fitted`.

use serde::{Deserialize, Serialize};

use crate::config::ViewportConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Pan offset and zoom scale applied to the preview content
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportTransform {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale: f64,
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interaction {
    Panning,
    Zooming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewportState {
    Uninitialized,
    Fitted,
    Interacting(Interaction),
}

/// Transform that fits `content` inside `container` minus `margin` on every
/// side, centered. Never upscales past native size.
pub fn compute_fit(container: Size, content: Size, margin: f64) -> ViewportTransform {
    let available_w = (container.width - 2.0 * margin).max(0.0);
    let available_h = (container.height - 2.0 * margin).max(0.0);

    let scale_x = if content.width > 0.0 { available_w / content.width } else { 1.0 };
    let scale_y = if content.height > 0.0 { available_h / content.height } else { 1.0 };

    centered(container, content, scale_x.min(scale_y).min(1.0))
}

fn centered(container: Size, content: Size, scale: f64) -> ViewportTransform {
    ViewportTransform {
        offset_x: (container.width - content.width * scale) / 2.0,
        offset_y: (container.height - content.height * scale) / 2.0,
        scale,
    }
}

/// Clamp a proposed pan offset so the content stays within `margin` of the
/// container edges. An axis where the scaled content is too small to span the
/// range is pinned to the centre instead.
pub fn clamp_pan(
    container: Size,
    content: Size,
    margin: f64,
    proposed: (f64, f64),
    scale: f64,
) -> (f64, f64) {
    (
        clamp_axis(container.width, content.width * scale, margin, proposed.0),
        clamp_axis(container.height, content.height * scale, margin, proposed.1),
    )
}

fn clamp_axis(container: f64, extent: f64, margin: f64, proposed: f64) -> f64 {
    let min = container - extent - margin;
    let max = margin;
    if min > max {
        (container - extent) / 2.0
    } else {
        proposed.clamp(min, max)
    }
}

#[derive(Debug, Clone)]
pub struct ViewportController {
    config: ViewportConfig,
    container: Option<Size>,
    content: Option<Size>,
    transform: ViewportTransform,
    fit_scale: f64,
    state: ViewportState,
}

impl ViewportController {
    pub fn new(config: ViewportConfig) -> Self {
        Self {
            config,
            container: None,
            content: None,
            transform: ViewportTransform::default(),
            fit_scale: 1.0,
            state: ViewportState::Uninitialized,
        }
    }

    pub fn transform(&self) -> ViewportTransform {
        self.transform
    }

    pub fn fit_scale(&self) -> f64 {
        self.fit_scale
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn container_size(&self) -> Option<Size> {
        self.container
    }

    pub fn content_size(&self) -> Option<Size> {
        self.content
    }

    pub fn set_container_size(&mut self, size: Size) {
        self.container = Some(size);
        self.sizes_changed();
    }

    pub fn set_content_size(&mut self, size: Size) {
        self.content = Some(size);
        self.sizes_changed();
    }

    fn sizes_changed(&mut self) {
        let Some((container, content)) = self.sizes() else {
            return;
        };
        if self.state == ViewportState::Uninitialized {
            self.recenter();
            return;
        }

        // Keep the user's zoom where possible but respect the new floor.
        self.fit_scale = self.fit_for(container, content).scale;
        let scale = self.transform.scale.clamp(self.fit_scale, self.config.max_scale.max(self.fit_scale));
        let (x, y) = clamp_pan(
            container,
            content,
            self.config.margin,
            (self.transform.offset_x, self.transform.offset_y),
            scale,
        );
        self.transform = ViewportTransform {
            offset_x: x,
            offset_y: y,
            scale,
        };
    }

    fn sizes(&self) -> Option<(Size, Size)> {
        Some((self.container?, self.content?))
    }

    fn fit_for(&self, container: Size, content: Size) -> ViewportTransform {
        let fit = compute_fit(container, content, self.config.margin);
        if fit.scale < self.config.min_fit_scale {
            centered(container, content, self.config.min_fit_scale)
        } else {
            fit
        }
    }

    /// Re-fit the content to the container and reset the zoom floor.
    pub fn recenter(&mut self) -> ViewportTransform {
        let Some((container, content)) = self.sizes() else {
            log::debug!("recenter ignored: viewport sizes unknown");
            return self.transform;
        };
        let fit = self.fit_for(container, content);
        self.fit_scale = fit.scale;
        self.transform = fit;
        self.state = ViewportState::Fitted;
        fit
    }

    /// Multiply the scale by the zoom step, up to `max_scale`. Returns whether
    /// the scale changed.
    pub fn zoom_in(&mut self) -> bool {
        let target = (self.transform.scale * self.config.zoom_step).min(self.config.max_scale);
        self.zoom_to(target)
    }

    /// Divide the scale by the zoom step, never below the fit scale. At or
    /// below the fit scale this is a no-op.
    pub fn zoom_out(&mut self) -> bool {
        if self.transform.scale <= self.fit_scale {
            return false;
        }
        let target = (self.transform.scale / self.config.zoom_step).max(self.fit_scale);
        self.zoom_to(target)
    }

    /// Zoom around the container centre, then clamp the pan.
    fn zoom_to(&mut self, scale: f64) -> bool {
        let Some((container, content)) = self.sizes() else {
            return false;
        };
        let current = self.transform;
        if scale <= 0.0 || scale == current.scale {
            return false;
        }

        self.state = ViewportState::Interacting(Interaction::Zooming);
        let ratio = scale / current.scale;
        let cx = container.width / 2.0;
        let cy = container.height / 2.0;
        let proposed = (
            cx - (cx - current.offset_x) * ratio,
            cy - (cy - current.offset_y) * ratio,
        );
        let (x, y) = clamp_pan(container, content, self.config.margin, proposed, scale);
        self.transform = ViewportTransform {
            offset_x: x,
            offset_y: y,
            scale,
        };
        self.state = ViewportState::Fitted;
        true
    }

    /// Start a drag. Ignored until the viewport is initialised.
    pub fn begin_pan(&mut self) -> bool {
        if self.state == ViewportState::Uninitialized {
            return false;
        }
        self.state = ViewportState::Interacting(Interaction::Panning);
        true
    }

    /// Move the content during a drag. Bounds are only enforced when the drag ends.
    pub fn pan_to(&mut self, offset_x: f64, offset_y: f64) {
        if self.state == ViewportState::Interacting(Interaction::Panning) {
            self.transform.offset_x = offset_x;
            self.transform.offset_y = offset_y;
        }
    }

    /// Finish a drag at the current offset.
    pub fn end_pan(&mut self) -> ViewportTransform {
        let proposed = (self.transform.offset_x, self.transform.offset_y);
        self.on_pan_end(proposed)
    }

    /// Clamp `proposed` to the pan bounds at the current scale and settle.
    pub fn on_pan_end(&mut self, proposed: (f64, f64)) -> ViewportTransform {
        let Some((container, content)) = self.sizes() else {
            return self.transform;
        };
        let (x, y) = clamp_pan(
            container,
            content,
            self.config.margin,
            proposed,
            self.transform.scale,
        );
        self.transform.offset_x = x;
        self.transform.offset_y = y;
        self.state = ViewportState::Fitted;
        self.transform
    }
}

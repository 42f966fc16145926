//! Writes slot bindings (images, scoped patterns) back into the HTML string.
//!
//! Every operation re-parses the input, mutates the fresh tree and serializes
//! it again. An index past the last slot leaves the input untouched.

use serde::{Deserialize, Serialize};

use crate::config::SlotConfig;
use crate::dom::Fragment;
use crate::locator::{slot_elements, SlotKind};
use crate::registry::Pattern;

/// Result of scoping a pattern onto one slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternApplication {
    pub html: String,
    /// CSS rewritten to target only this slot; `None` when nothing was applied
    pub scoped_css: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SlotBinder {
    config: SlotConfig,
}

impl SlotBinder {
    pub fn new(config: SlotConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SlotConfig {
        &self.config
    }

    /// Scoping class for the pattern slot at `index`, e.g. `pattern-2`
    pub fn scoping_class(&self, index: usize) -> String {
        format!("{}{}", self.config.scoping_prefix, index)
    }

    /// Set `background-image: url(<data_url>)` on the `index`-th image slot.
    pub fn bind_image(&self, html: &str, index: usize, image_data_url: &str) -> String {
        let fragment = Fragment::parse(html);
        let Some(element) = slot_elements(&fragment, SlotKind::Image, &self.config).into_iter().nth(index) else {
            log::debug!("bind_image: no image slot {}", index);
            return html.to_string();
        };

        element.set_style_property("background-image", &format!("url({})", image_data_url));
        self.serialize_or_keep(&fragment, html)
    }

    /// Tag the `index`-th pattern slot with its scoping class and rewrite the
    /// pattern's CSS to target that class alone.
    pub fn apply_pattern(&self, html: &str, index: usize, pattern: &Pattern) -> PatternApplication {
        let fragment = Fragment::parse(html);
        let Some(element) = slot_elements(&fragment, SlotKind::Pattern, &self.config).into_iter().nth(index) else {
            log::debug!("apply_pattern: no pattern slot {}", index);
            return PatternApplication {
                html: html.to_string(),
                scoped_css: None,
            };
        };

        let class = self.scoping_class(index);
        let mut classes = self.without_scoping_classes(element.classes());
        classes.push(class.clone());
        element.set_classes(&classes);

        PatternApplication {
            html: self.serialize_or_keep(&fragment, html),
            scoped_css: Some(scope_pattern_css(&pattern.css, &pattern.name, &class)),
        }
    }

    /// Strip the scoping class from the `index`-th pattern slot. The caller
    /// retracts the published style.
    pub fn remove_pattern(&self, html: &str, index: usize) -> String {
        let fragment = Fragment::parse(html);
        let Some(element) = slot_elements(&fragment, SlotKind::Pattern, &self.config).into_iter().nth(index) else {
            log::debug!("remove_pattern: no pattern slot {}", index);
            return html.to_string();
        };

        let classes = self.without_scoping_classes(element.classes());
        element.set_classes(&classes);
        self.serialize_or_keep(&fragment, html)
    }

    fn without_scoping_classes(&self, classes: Vec<String>) -> Vec<String> {
        classes
            .into_iter()
            .filter(|c| !c.starts_with(&self.config.scoping_prefix))
            .collect()
    }

    fn serialize_or_keep(&self, fragment: &Fragment, original: &str) -> String {
        match fragment.to_html() {
            Ok(html) => html,
            Err(e) => {
                log::error!("failed to serialize document, keeping previous html: {}", e);
                original.to_string()
            }
        }
    }
}

/// Rewrite every `.{pattern_name}-pattern` class selector in `css` to
/// `.{class}`. Longer class names sharing the prefix (`.dots-pattern-alt`) are
/// left alone.
pub fn scope_pattern_css(css: &str, pattern_name: &str, class: &str) -> String {
    let needle = format!(".{}-pattern", pattern_name);
    let mut out = String::with_capacity(css.len());
    let mut rest = css;

    while let Some(pos) = rest.find(&needle) {
        let end = pos + needle.len();
        let at_boundary = rest[end..]
            .chars()
            .next()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '-' || c == '_'));

        out.push_str(&rest[..pos]);
        if at_boundary {
            out.push('.');
            out.push_str(class);
        } else {
            out.push_str(&needle);
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

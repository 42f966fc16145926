//! Finds tagged placeholder elements (slots) in an HTML fragment.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::SlotConfig;
use crate::dom::{Element, Fragment};

/// The two kinds of placeholder the editor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Image,
    Pattern,
}

impl SlotKind {
    /// Human label used for generated titles
    pub fn label(self) -> &'static str {
        match self {
            SlotKind::Image => "Image",
            SlotKind::Pattern => "Pattern",
        }
    }

    /// Marker attribute for this kind under `config`
    pub fn marker(self, config: &SlotConfig) -> &str {
        match self {
            SlotKind::Image => &config.image_marker,
            SlotKind::Pattern => &config.pattern_marker,
        }
    }

    fn slug(self) -> &'static str {
        match self {
            SlotKind::Image => "image",
            SlotKind::Pattern => "pattern",
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind-specific data read back from the slot element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SlotPayload {
    Image {
        /// Inline `background-image` value, `None` when unset or `none`
        background_image: Option<String>,
    },
    Pattern {
        /// Scoping class currently on the element, e.g. `pattern-2`
        scoping_class: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDescriptor {
    pub kind: SlotKind,
    /// Ordinal among slots of the same kind, in document order
    pub position_index: usize,
    pub title: String,
    pub payload: SlotPayload,
}

impl SlotDescriptor {
    pub fn background_image(&self) -> Option<&str> {
        match &self.payload {
            SlotPayload::Image { background_image } => background_image.as_deref(),
            SlotPayload::Pattern { .. } => None,
        }
    }

    pub fn scoping_class(&self) -> Option<&str> {
        match &self.payload {
            SlotPayload::Pattern { scoping_class } => scoping_class.as_deref(),
            SlotPayload::Image { .. } => None,
        }
    }
}

/// Stable publication id for the scoped style of one slot, e.g. `pattern-style-2`
pub fn slot_style_id(kind: SlotKind, index: usize) -> String {
    format!("{}-style-{}", kind.slug(), index)
}

/// Locate all slots of `kind` using the default marker attributes.
pub fn find_slots(html: &str, kind: SlotKind) -> Vec<SlotDescriptor> {
    find_slots_with_config(html, kind, &SlotConfig::default())
}

/// Locate all slots of `kind`. Pure: the same `html` always yields the same
/// ordered sequence.
pub fn find_slots_with_config(html: &str, kind: SlotKind, config: &SlotConfig) -> Vec<SlotDescriptor> {
    let fragment = Fragment::parse(html);
    slot_elements(&fragment, kind, config)
        .iter()
        .enumerate()
        .map(|(index, element)| describe(element, kind, index, config))
        .collect()
}

/// Slot elements of `kind` inside an already-parsed fragment.
pub(crate) fn slot_elements(fragment: &Fragment, kind: SlotKind, config: &SlotConfig) -> Vec<Element> {
    fragment.elements_with_attribute(kind.marker(config))
}

fn describe(element: &Element, kind: SlotKind, index: usize, config: &SlotConfig) -> SlotDescriptor {
    let title = element
        .attribute(&config.title_attribute)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| format!("{} {}", kind.label(), index + 1));

    let payload = match kind {
        SlotKind::Image => SlotPayload::Image {
            background_image: element
                .style_property("background-image")
                .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("none")),
        },
        SlotKind::Pattern => SlotPayload::Pattern {
            scoping_class: element
                .classes()
                .into_iter()
                .find(|c| c.starts_with(&config.scoping_prefix)),
        },
    };

    SlotDescriptor {
        kind,
        position_index: index,
        title,
        payload,
    }
}

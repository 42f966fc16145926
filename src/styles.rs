//! Live style cascade, modelled as a table of style-id -> CSS text.
//!
//! `publish` and `retract` are the only mutators. A browser host turns the
//! table into `<style id>` elements; anything else can read it directly.

use serde::{Deserialize, Serialize};

/// Id under which the document stylesheet is published
pub const DOCUMENT_STYLE_ID: &str = "mockup-style";

/// Id under which a catalog pattern's raw CSS is published for swatches
pub fn swatch_style_id(pattern_name: &str) -> String {
    format!("pattern-swatch-{}", pattern_name)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StylePublicationTable {
    entries: Vec<(String, String)>,
}

impl StylePublicationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent upsert: drops any entry with `style_id`, then appends a fresh
    /// one at the end of the cascade.
    pub fn publish(&mut self, css: &str, style_id: &str) {
        self.entries.retain(|(id, _)| id != style_id);
        self.entries.push((style_id.to_string(), css.to_string()));
        log::debug!("published style '{}' ({} bytes)", style_id, css.len());
    }

    /// Remove the entry with `style_id`. Returns whether anything was removed.
    pub fn retract(&mut self, style_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(id, _)| id != style_id);
        let removed = self.entries.len() != before;
        if removed {
            log::debug!("retracted style '{}'", style_id);
        }
        removed
    }

    pub fn get(&self, style_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(id, _)| id == style_id)
            .map(|(_, css)| css.as_str())
    }

    pub fn contains(&self, style_id: &str) -> bool {
        self.get(style_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids in cascade order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    /// All published CSS concatenated in cascade order
    pub fn combined_css(&self) -> String {
        self.entries
            .iter()
            .map(|(_, css)| css.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Render the table as `<style>` elements for a host page head.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (id, css) in &self.entries {
            out.push_str("<style id=\"");
            out.push_str(&escape_attribute(id));
            out.push_str("\">");
            // A literal `</style` would end the element early.
            out.push_str(&css.replace("</style", "<\\/style"));
            out.push_str("</style>\n");
        }
        out
    }
}

fn escape_attribute(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;")
}

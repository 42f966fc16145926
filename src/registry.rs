//! Catalog of named, reusable pattern stylesheets.

use serde::{Deserialize, Serialize};

use crate::error::MockupError;
use crate::source::{PatternEntry, PatternSource};
use crate::styles::{swatch_style_id, StylePublicationTable};

/// A named CSS fragment whose selector follows the `.{name}-pattern` convention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub name: String,
    pub css: String,
}

impl Pattern {
    /// The class selector the raw CSS is written against
    pub fn selector(&self) -> String {
        format!(".{}-pattern", self.name)
    }
}

/// Derive a pattern name from its source identifier: the last path component
/// up to the first `.` (`patterns/stripes.min.css` -> `stripes`).
pub fn pattern_name(identifier: &str) -> String {
    let file = identifier.rsplit(['/', '\\']).next().unwrap_or(identifier);
    file.split('.').next().unwrap_or(file).to_string()
}

/// Read-only pattern lookup, in load order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternRegistry {
    patterns: Vec<Pattern>,
}

impl PatternRegistry {
    /// Build a catalog from raw entries. Names are derived from identifiers;
    /// the first entry for a name wins and later duplicates are dropped.
    pub fn from_entries(entries: Vec<PatternEntry>) -> Self {
        let mut patterns: Vec<Pattern> = Vec::with_capacity(entries.len());
        for entry in entries {
            let name = pattern_name(&entry.identifier);
            if name.is_empty() {
                log::warn!("skipping pattern '{}': empty name", entry.identifier);
                continue;
            }
            if patterns.iter().any(|p| p.name == name) {
                log::debug!("skipping duplicate pattern '{}' from '{}'", name, entry.identifier);
                continue;
            }
            patterns.push(Pattern { name, css: entry.css });
        }
        Self { patterns }
    }

    /// Publish each pattern's raw CSS under its swatch id so catalog
    /// thumbnails render. Ids that are already present are left alone.
    pub fn publish_swatches(&self, styles: &mut StylePublicationTable) {
        for pattern in &self.patterns {
            let id = swatch_style_id(&pattern.name);
            if !styles.contains(&id) {
                styles.publish(&pattern.css, &id);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Load the pattern catalog from `source` and publish its swatches.
///
/// A source that cannot be read yields an empty catalog; the error is logged
/// and handed back so the caller can tell the user.
pub async fn load_patterns<S: PatternSource>(
    source: &S,
    styles: &mut StylePublicationTable,
) -> (PatternRegistry, Option<MockupError>) {
    match source.entries().await {
        Ok(entries) => {
            let registry = PatternRegistry::from_entries(entries);
            registry.publish_swatches(styles);
            log::info!("loaded {} patterns", registry.len());
            (registry, None)
        }
        Err(e) => {
            log::error!("failed to load pattern catalog: {}", e);
            (PatternRegistry::default(), Some(e))
        }
    }
}

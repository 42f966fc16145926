//! Where templates and pattern stylesheets come from.
//!
//! On disk the assets live under one root:
//!
//! ```text
//! <root>/mockups/<template>/*.html   (first one, sorted by name)
//! <root>/mockups/<template>/*.css    (first one, sorted by name)
//! <root>/patterns/*.css              (one pattern per file)
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::error::{MockupError, MockupResult};

/// HTML fragment + stylesheet for one named template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplatePayload {
    pub html: String,
    pub css: String,
}

/// One raw pattern stylesheet and the identifier (file name) it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub identifier: String,
    pub css: String,
}

pub trait TemplateSource {
    fn fetch(&self, name: &str) -> impl Future<Output = MockupResult<TemplatePayload>> + Send;
}

pub trait PatternSource {
    /// All pattern stylesheets, in source order
    fn entries(&self) -> impl Future<Output = MockupResult<Vec<PatternEntry>>> + Send;
}

/// Assets read from a directory tree with `tokio::fs`
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Regular files directly inside `dir`, sorted by file name.
async fn list_files(dir: &Path) -> Result<Vec<PathBuf>, String> {
    let mut read = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| format!("read_dir {}: {}", dir.display(), e))?;

    let mut files = Vec::new();
    while let Some(entry) = read
        .next_entry()
        .await
        .map_err(|e| format!("read_dir next: {}", e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| format!("file type of {}: {}", entry.path().display(), e))?;
        if file_type.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

impl TemplateSource for DirectorySource {
    async fn fetch(&self, name: &str) -> MockupResult<TemplatePayload> {
        let fail = |reason: String| MockupError::TemplateLoad {
            name: name.to_string(),
            reason,
        };

        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(fail("template names must be a single path component".to_string()));
        }

        let dir = self.root.join("mockups").join(name);
        let files = list_files(&dir).await.map_err(fail)?;

        let html_files: Vec<_> = files.iter().filter(|p| has_extension(p, "html")).collect();
        let css_files: Vec<_> = files.iter().filter(|p| has_extension(p, "css")).collect();
        if html_files.len() > 1 || css_files.len() > 1 {
            log::warn!(
                "template '{}' has {} html and {} css files; using the first of each",
                name,
                html_files.len(),
                css_files.len()
            );
        }

        let html_path = html_files
            .first()
            .ok_or_else(|| fail(format!("no .html file in {}", dir.display())))?;
        let css_path = css_files
            .first()
            .ok_or_else(|| fail(format!("no .css file in {}", dir.display())))?;

        let html = tokio::fs::read_to_string(html_path)
            .await
            .map_err(|e| fail(format!("read {}: {}", html_path.display(), e)))?;
        let css = tokio::fs::read_to_string(css_path)
            .await
            .map_err(|e| fail(format!("read {}: {}", css_path.display(), e)))?;

        log::info!("loaded template '{}' from {}", name, dir.display());
        Ok(TemplatePayload { html, css })
    }
}

impl PatternSource for DirectorySource {
    async fn entries(&self) -> MockupResult<Vec<PatternEntry>> {
        let dir = self.root.join("patterns");
        let files = list_files(&dir).await.map_err(MockupError::PatternSource)?;

        let mut entries = Vec::new();
        for path in files.into_iter().filter(|p| has_extension(p, "css")) {
            let Some(identifier) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                log::warn!("skipping pattern file with a non UTF-8 name: {}", path.display());
                continue;
            };
            let css = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| MockupError::PatternSource(format!("read {}: {}", path.display(), e)))?;
            entries.push(PatternEntry { identifier, css });
        }
        Ok(entries)
    }
}

/// In-memory assets, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    templates: HashMap<String, TemplatePayload>,
    patterns: Vec<PatternEntry>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, name: &str, html: &str, css: &str) -> Self {
        self.templates.insert(
            name.to_string(),
            TemplatePayload {
                html: html.to_string(),
                css: css.to_string(),
            },
        );
        self
    }

    pub fn with_pattern(mut self, identifier: &str, css: &str) -> Self {
        self.patterns.push(PatternEntry {
            identifier: identifier.to_string(),
            css: css.to_string(),
        });
        self
    }
}

impl TemplateSource for StaticSource {
    async fn fetch(&self, name: &str) -> MockupResult<TemplatePayload> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| MockupError::TemplateLoad {
                name: name.to_string(),
                reason: "no such template".to_string(),
            })
    }
}

impl PatternSource for StaticSource {
    async fn entries(&self) -> MockupResult<Vec<PatternEntry>> {
        Ok(self.patterns.clone())
    }
}

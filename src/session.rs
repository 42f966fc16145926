//! The editing session: one document, its slot bindings and live styles.
//!
//! Every change runs through [`Document::apply`] and is followed by a
//! resynchronisation of the per-slot pattern bindings against the freshly
//! located slots. Failures never escape: they are logged and turned into
//! [`Notice`]s for the host to show.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::binder::SlotBinder;
use crate::config::EngineConfig;
use crate::css::Stylesheet;
use crate::document::{Document, History, Mutation, StyleEffect};
use crate::dom::Fragment;
use crate::error::{MockupError, MockupResult};
use crate::export::{DownloadSink, ExportFormat, ExportSurface, Exporter, Rasterizer};
use crate::locator::{find_slots_with_config, slot_style_id, SlotDescriptor, SlotKind};
use crate::notice::Notice;
use crate::preview::{LivePreview, PreviewHost};
use crate::registry::{self, PatternRegistry};
use crate::source::{PatternSource, TemplatePayload, TemplateSource};
use crate::styles::{StylePublicationTable, DOCUMENT_STYLE_ID};
use crate::upload::{image_data_url, read_image_data_url};
use crate::viewport::Size;

/// Id of the modal preview host
pub const MODAL_PREVIEW_ID: &str = "modal-preview-content";

const LOAD_ERROR_CSS: &str = ".mockup-load-error { background: #ff00ff; color: #000000; padding: 16px; font-weight: bold; }";

/// The pattern currently applied to one pattern slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternBinding {
    pub pattern_name: String,
    pub scoped_css: String,
}

/// Handle for one in-flight template load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateTicket {
    generation: u64,
    name: String,
}

impl TemplateTicket {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Snapshot {
    document: Document,
    bindings: Vec<Option<PatternBinding>>,
}

pub struct MockupSession {
    config: EngineConfig,
    binder: SlotBinder,
    document: Document,
    patterns: PatternRegistry,
    styles: StylePublicationTable,
    bindings: Vec<Option<PatternBinding>>,
    bound_images: usize,
    preview: LivePreview,
    modal: PreviewHost,
    generation: u64,
    history: History<Snapshot>,
    notices: Vec<Notice>,
}

impl MockupSession {
    pub fn new(config: EngineConfig) -> Self {
        let empty = Size::new(0.0, 0.0);
        Self {
            binder: SlotBinder::new(config.slots.clone()),
            document: Document::default(),
            patterns: PatternRegistry::default(),
            styles: StylePublicationTable::new(),
            bindings: Vec::new(),
            bound_images: 0,
            preview: LivePreview::mount(config.export.preview_id.clone(), config.viewport.clone(), empty, empty),
            modal: PreviewHost::new(MODAL_PREVIEW_ID, config.viewport.clone()),
            generation: 0,
            history: History::new(config.history_limit),
            notices: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn patterns(&self) -> &PatternRegistry {
        &self.patterns
    }

    pub fn styles(&self) -> &StylePublicationTable {
        &self.styles
    }

    /// Pattern bindings, indexed by pattern slot position
    pub fn pattern_bindings(&self) -> &[Option<PatternBinding>] {
        &self.bindings
    }

    pub fn preview(&self) -> &LivePreview {
        &self.preview
    }

    pub fn preview_mut(&mut self) -> &mut LivePreview {
        &mut self.preview
    }

    pub fn modal(&self) -> &PreviewHost {
        &self.modal
    }

    pub fn modal_mut(&mut self) -> &mut PreviewHost {
        &mut self.modal
    }

    /// Mount the modal preview over the current content.
    pub fn open_modal(&mut self, container: Size) -> &mut LivePreview {
        let content = self.preview.content_size();
        self.modal.open(container, content)
    }

    pub fn close_modal(&mut self) -> bool {
        self.modal.close()
    }

    pub fn set_container_size(&mut self, container: Size) {
        self.preview.resize_container(container);
    }

    /// Report the laid-out size of the content; the previews re-fit.
    pub fn set_content_size(&mut self, content: Size) {
        self.preview.replace_content(content);
        if let Some(modal) = self.modal.preview_mut() {
            modal.replace_content(content);
        }
    }

    // ---- Loading ----

    /// Load the pattern catalog and publish its swatches. A failing source
    /// leaves an empty catalog and raises an error notice.
    pub async fn load_patterns<S: PatternSource>(&mut self, source: &S) -> usize {
        let (patterns, error) = registry::load_patterns(source, &mut self.styles).await;
        if let Some(e) = error {
            self.notices.push(Notice::error(format!("Could not load patterns: {}", e)));
        }
        self.patterns = patterns;
        self.patterns.len()
    }

    /// Start loading `name`. Any ticket handed out earlier becomes stale.
    pub fn begin_template_load(&mut self, name: &str) -> TemplateTicket {
        self.generation += 1;
        log::debug!("template load #{} started: {}", self.generation, name);
        TemplateTicket {
            generation: self.generation,
            name: name.to_string(),
        }
    }

    /// Install the outcome of a load. Results for a stale ticket are dropped
    /// and `false` is returned. A failed load installs a visible error
    /// placeholder document.
    pub fn finish_template_load(&mut self, ticket: TemplateTicket, result: MockupResult<TemplatePayload>) -> bool {
        if ticket.generation != self.generation {
            log::debug!(
                "discarding stale template '{}' (#{}, current #{})",
                ticket.name,
                ticket.generation,
                self.generation
            );
            return false;
        }

        let document = match result {
            Ok(payload) => {
                log::info!("loaded template '{}'", ticket.name);
                Document::new(payload.html, payload.css)
            }
            Err(e) => {
                log::error!("template '{}' failed to load: {}", ticket.name, e);
                self.notices
                    .push(Notice::error(format!("Could not load template '{}': {}", ticket.name, e)));
                load_error_document(&ticket.name, &e)
            }
        };
        self.install(document);
        true
    }

    /// Fetch and install a template in one go.
    pub async fn load_template<S: TemplateSource>(&mut self, source: &S, name: &str) -> bool {
        let ticket = self.begin_template_load(name);
        let result = source.fetch(name).await;
        self.finish_template_load(ticket, result)
    }

    fn install(&mut self, document: Document) {
        for index in 0..self.bindings.len() {
            self.styles.retract(&slot_style_id(SlotKind::Pattern, index));
        }
        self.bindings.clear();
        self.history.clear();
        self.document = document;
        self.styles.publish(&self.document.css, DOCUMENT_STYLE_ID);
        self.bound_images = self.bound_image_count();
        self.resync();

        match self.measure_content() {
            Some(size) => self.set_content_size(size),
            None => {
                log::warn!("template has no resolvable size; exports will fail until one is reported");
                self.set_content_size(Size::new(0.0, 0.0));
            }
        }
    }

    // ---- Editing ----

    pub fn set_html(&mut self, html: &str) -> bool {
        self.commit(Mutation::ReplaceHtml(html.to_string()))
    }

    pub fn set_css(&mut self, css: &str) -> bool {
        self.commit(Mutation::ReplaceCss(css.to_string()))
    }

    pub fn image_slots(&self) -> Vec<SlotDescriptor> {
        find_slots_with_config(&self.document.html, SlotKind::Image, &self.config.slots)
    }

    pub fn pattern_slots(&self) -> Vec<SlotDescriptor> {
        find_slots_with_config(&self.document.html, SlotKind::Pattern, &self.config.slots)
    }

    /// Bind an already-encoded image. Out-of-range indices are a no-op.
    pub fn bind_image_data_url(&mut self, index: usize, data_url: &str) -> bool {
        self.commit(Mutation::BindImage {
            index,
            data_url: data_url.to_string(),
        })
    }

    /// Bind uploaded image bytes. Unrecognised data raises an error notice.
    pub fn bind_image_bytes(&mut self, index: usize, bytes: &[u8]) -> bool {
        match image_data_url(bytes) {
            Ok(url) => self.bind_image_data_url(index, &url),
            Err(e) => {
                log::warn!("rejected upload for image slot {}: {}", index, e);
                self.notices.push(Notice::error(format!("Could not use that image: {}", e)));
                false
            }
        }
    }

    pub async fn bind_image_file(&mut self, index: usize, path: &Path) -> bool {
        match read_image_data_url(path).await {
            Ok(url) => self.bind_image_data_url(index, &url),
            Err(e) => {
                log::warn!("rejected image file {}: {}", path.display(), e);
                self.notices.push(Notice::error(format!("Could not use that image: {}", e)));
                false
            }
        }
    }

    /// Apply the catalog pattern `name` to pattern slot `index`.
    ///
    /// An unknown name is a caller error. An out-of-range index is a no-op
    /// and yields `Ok(false)`.
    pub fn apply_pattern(&mut self, index: usize, name: &str) -> MockupResult<bool> {
        let pattern = self
            .patterns
            .get(name)
            .cloned()
            .ok_or_else(|| MockupError::UnknownPattern { name: name.to_string() })?;
        Ok(self.commit(Mutation::ApplyPattern { index, pattern }))
    }

    pub fn remove_pattern(&mut self, index: usize) -> bool {
        self.commit(Mutation::RemovePattern { index })
    }

    /// Replace the scoped CSS of an applied pattern and republish it.
    pub fn edit_pattern_css(&mut self, index: usize, css: &str) -> bool {
        let Some(Some(binding)) = self.bindings.get(index) else {
            log::debug!("edit_pattern_css: no pattern applied to slot {}", index);
            return false;
        };
        if binding.scoped_css == css {
            return false;
        }

        let snapshot = self.snapshot();
        self.history.record(snapshot);
        if let Some(Some(binding)) = self.bindings.get_mut(index) {
            binding.scoped_css = css.to_string();
        }
        self.styles.publish(css, &slot_style_id(SlotKind::Pattern, index));
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        let current = self.snapshot();
        match self.history.undo(current) {
            Some(previous) => {
                self.restore(previous);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        let current = self.snapshot();
        match self.history.redo(current) {
            Some(next) => {
                self.restore(next);
                true
            }
            None => false,
        }
    }

    /// Notices raised since the last call, oldest first
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // ---- Export ----

    /// What an export reads: the open modal preview if any, else the main one.
    pub fn export_surface(&self) -> ExportSurface<'_> {
        let preview = self.modal.preview().unwrap_or(&self.preview);
        ExportSurface {
            document: &self.document,
            css: self.styles.combined_css(),
            transform: preview.transform(),
            content: preview.content_size(),
        }
    }

    /// Export `node_id`. Failures are logged and raised as an error notice;
    /// the delivered location is returned on success.
    pub async fn export_as_image<R: Rasterizer, S: DownloadSink>(
        &mut self,
        exporter: &Exporter<R, S>,
        node_id: &str,
        format: ExportFormat,
        filename: &str,
    ) -> Option<String> {
        let result = {
            let surface = self.export_surface();
            exporter.export(&surface, node_id, format, filename).await
        };
        match result {
            Ok(location) => {
                self.notices.push(Notice::info(format!("Saved {}", location)));
                Some(location)
            }
            Err(e) => {
                log::error!("export of '{}' failed: {}", node_id, e);
                self.notices.push(Notice::error(format!("Export failed: {}", e)));
                None
            }
        }
    }

    // ---- Internals ----

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            document: self.document.clone(),
            bindings: self.bindings.clone(),
        }
    }

    fn commit(&mut self, mutation: Mutation) -> bool {
        let transition = self.document.apply(&mutation, &self.binder);
        if transition.is_noop(&self.document) {
            return false;
        }

        let snapshot = self.snapshot();
        self.history.record(snapshot);
        let css_changed = transition.document.css != self.document.css;
        self.document = transition.document;

        if let Some(effect) = transition.effect {
            self.apply_effect(effect);
        }
        match mutation {
            Mutation::ApplyPattern { index, pattern } => {
                let scoped_css = self
                    .styles
                    .get(&slot_style_id(SlotKind::Pattern, index))
                    .unwrap_or_default()
                    .to_string();
                self.set_binding(
                    index,
                    Some(PatternBinding {
                        pattern_name: pattern.name,
                        scoped_css,
                    }),
                );
            }
            Mutation::RemovePattern { index } => self.set_binding(index, None),
            _ => {}
        }

        if css_changed {
            self.styles.publish(&self.document.css, DOCUMENT_STYLE_ID);
        }
        self.resync();
        self.remeasure();
        true
    }

    fn apply_effect(&mut self, effect: StyleEffect) {
        match effect {
            StyleEffect::Publish { style_id, css } => self.styles.publish(&css, &style_id),
            StyleEffect::Retract { style_id } => {
                self.styles.retract(&style_id);
            }
        }
    }

    fn set_binding(&mut self, index: usize, binding: Option<PatternBinding>) {
        if self.bindings.len() <= index {
            self.bindings.resize(index + 1, None);
        }
        self.bindings[index] = binding;
    }

    fn restore(&mut self, snapshot: Snapshot) {
        for index in 0..self.bindings.len() {
            self.styles.retract(&slot_style_id(SlotKind::Pattern, index));
        }
        for (index, binding) in snapshot.bindings.iter().enumerate() {
            if let Some(binding) = binding {
                self.styles
                    .publish(&binding.scoped_css, &slot_style_id(SlotKind::Pattern, index));
            }
        }
        if snapshot.document.css != self.document.css {
            self.styles.publish(&snapshot.document.css, DOCUMENT_STYLE_ID);
        }
        self.document = snapshot.document;
        self.bindings = snapshot.bindings;
        self.resync();
        self.remeasure();
    }

    /// Realign pattern bindings with the slots of the current document and
    /// flag bindings an edit has invalidated.
    fn resync(&mut self) {
        let slots = self.pattern_slots();
        let count = slots.len();

        if count != self.bindings.len() {
            let dropped: Vec<usize> = (count..self.bindings.len())
                .filter(|&i| self.bindings[i].is_some())
                .collect();
            let had_bindings = self.bindings.iter().any(Option::is_some);
            for index in count..self.bindings.len() {
                self.styles.retract(&slot_style_id(SlotKind::Pattern, index));
            }
            log::debug!("pattern slots: {} -> {}", self.bindings.len(), count);
            self.bindings.resize(count, None);

            if !dropped.is_empty() {
                self.notices.push(Notice::warning(format!(
                    "The number of pattern slots changed to {}; patterns on slots {} were removed",
                    count,
                    join_positions(&dropped)
                )));
            } else if had_bindings {
                self.notices.push(Notice::warning(format!(
                    "The number of pattern slots changed to {}; check that applied patterns are still on the right slots",
                    count
                )));
            }
        }

        let mut detached = Vec::new();
        for (index, slot) in slots.iter().enumerate() {
            if self.bindings[index].is_none() {
                continue;
            }
            let expected = self.binder.scoping_class(index);
            if slot.scoping_class() != Some(expected.as_str()) {
                self.bindings[index] = None;
                self.styles.retract(&slot_style_id(SlotKind::Pattern, index));
                detached.push(index);
            }
        }
        if !detached.is_empty() {
            self.notices.push(Notice::warning(format!(
                "Patterns on slots {} no longer match the document and were removed",
                join_positions(&detached)
            )));
        }

        let bound = self.bound_image_count();
        if bound < self.bound_images {
            self.notices.push(Notice::warning(format!(
                "{} uploaded image(s) are no longer in the document",
                self.bound_images - bound
            )));
        }
        self.bound_images = bound;
    }

    fn bound_image_count(&self) -> usize {
        self.image_slots()
            .iter()
            .filter(|slot| slot.background_image().is_some())
            .count()
    }

    /// Re-fit the previews when an edit changed the resolved content size.
    /// A size that no longer resolves keeps the last known one.
    fn remeasure(&mut self) {
        if let Some(size) = self.measure_content() {
            if size != self.preview.content_size() {
                log::debug!("content resized to {}x{}", size.width, size.height);
                self.set_content_size(size);
            }
        }
    }

    /// Pixel size of the top-level element, from its inline style or the
    /// published style sheet
    fn measure_content(&self) -> Option<Size> {
        let fragment = Fragment::parse(&self.document.html);
        let root = fragment.first_element()?;
        let style = Stylesheet::parse(&self.styles.combined_css()).computed(&root);
        let width = style.px("width")?;
        let height = style.px("height")?;
        Some(Size::new(width, height))
    }
}

/// 1-based slot numbers for messages
fn join_positions(indices: &[usize]) -> String {
    indices
        .iter()
        .map(|i| (i + 1).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn load_error_document(name: &str, error: &MockupError) -> Document {
    let html = format!(
        "<p class=\"mockup-load-error\">Could not load template '{}': {}</p>",
        escape_text(name),
        escape_text(&error.to_string())
    );
    Document::new(html, LOAD_ERROR_CSS)
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::NoticeLevel;
    use crate::source::{PatternEntry, StaticSource};
    use pretty_assertions::assert_eq;

    struct OfflineSource;

    impl PatternSource for OfflineSource {
        async fn entries(&self) -> MockupResult<Vec<PatternEntry>> {
            Err(MockupError::PatternSource("catalog offline".to_string()))
        }
    }

    const CARD: &str = r#"<div style="width: 400px; height: 300px"><div data-img=""></div><div data-pattern=""></div><div data-pattern=""></div></div>"#;

    fn source() -> StaticSource {
        StaticSource::new()
            .with_template("card", CARD, ".card { color: black; }")
            .with_template("other", "<p>other</p>", "")
            .with_pattern("stripes.css", ".stripes-pattern { background: red; }")
            .with_pattern("dots.css", ".dots-pattern { background: blue; }")
    }

    async fn session() -> MockupSession {
        let src = source();
        let mut session = MockupSession::new(EngineConfig::default());
        session.load_patterns(&src).await;
        assert!(session.load_template(&src, "card").await);
        session
    }

    #[tokio::test]
    async fn test_load_publishes_document_and_swatches() {
        let session = session().await;
        assert_eq!(session.styles().get(DOCUMENT_STYLE_ID), Some(".card { color: black; }"));
        assert!(session.styles().contains("pattern-swatch-stripes"));
        assert_eq!(session.pattern_bindings(), &[None, None]);
        assert_eq!(session.preview().content_size(), Size::new(400.0, 300.0));
    }

    #[tokio::test]
    async fn test_failing_pattern_source_leaves_empty_catalog() {
        let mut session = MockupSession::new(EngineConfig::default());
        assert_eq!(session.load_patterns(&OfflineSource).await, 0);
        assert!(session.patterns().is_empty());
        assert!(session.styles().is_empty());

        let notices = session.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0].message.contains("catalog offline"));
    }

    #[tokio::test]
    async fn test_content_size_from_style_sheet() {
        let src = StaticSource::new().with_template(
            "sheet",
            r#"<div class="card"><div data-pattern=""></div></div>"#,
            ".card { width: 320px; height: 240px; }",
        );
        let mut session = MockupSession::new(EngineConfig::default());
        session.load_template(&src, "sheet").await;
        assert_eq!(session.preview().content_size(), Size::new(320.0, 240.0));

        assert!(session.set_css(".card { width: 100px; height: 50px; }"));
        assert_eq!(session.preview().content_size(), Size::new(100.0, 50.0));
    }

    #[tokio::test]
    async fn test_undo_and_redo_refit_content() {
        let mut session = session().await;
        session.set_container_size(Size::new(800.0, 600.0));
        let resized = CARD.replace("width: 400px; height: 300px", "width: 1600px; height: 1200px");
        assert!(session.set_html(&resized));
        assert_eq!(session.preview().content_size(), Size::new(1600.0, 1200.0));
        assert!(session.preview().transform().scale < 1.0);

        assert!(session.undo());
        assert_eq!(session.preview().content_size(), Size::new(400.0, 300.0));
        assert_eq!(session.preview().transform().scale, 1.0);

        assert!(session.redo());
        assert_eq!(session.preview().content_size(), Size::new(1600.0, 1200.0));
    }

    #[tokio::test]
    async fn test_stale_template_result_is_discarded() {
        let mut session = MockupSession::new(EngineConfig::default());
        let first = session.begin_template_load("card");
        let second = session.begin_template_load("other");

        assert!(session.finish_template_load(second, Ok(TemplatePayload {
            html: "<p>other</p>".to_string(),
            css: String::new(),
        })));
        assert!(!session.finish_template_load(first, Ok(TemplatePayload {
            html: CARD.to_string(),
            css: String::new(),
        })));
        assert_eq!(session.document().html, "<p>other</p>");
    }

    #[tokio::test]
    async fn test_failed_load_installs_placeholder() {
        let mut session = MockupSession::new(EngineConfig::default());
        assert!(session.load_template(&source(), "missing").await);
        assert!(session.document().html.contains("mockup-load-error"));
        assert_eq!(session.styles().get(DOCUMENT_STYLE_ID), Some(LOAD_ERROR_CSS));
        let notices = session.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_apply_and_remove_pattern() {
        let mut session = session().await;
        assert!(session.apply_pattern(1, "stripes").unwrap());
        assert_eq!(session.styles().get("pattern-style-1"), Some(".pattern-1 { background: red; }"));
        assert_eq!(
            session.pattern_bindings()[1].as_ref().map(|b| b.pattern_name.as_str()),
            Some("stripes")
        );

        assert!(session.remove_pattern(1));
        assert!(!session.styles().contains("pattern-style-1"));
        assert_eq!(session.pattern_bindings(), &[None, None]);
        assert!(session.drain_notices().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_pattern_is_an_error() {
        let mut session = session().await;
        assert_eq!(
            session.apply_pattern(0, "plaid"),
            Err(MockupError::UnknownPattern {
                name: "plaid".to_string()
            })
        );
        assert_eq!(session.apply_pattern(9, "dots"), Ok(false));
    }

    #[tokio::test]
    async fn test_removing_a_slot_drops_its_binding() {
        let mut session = session().await;
        session.apply_pattern(1, "dots").unwrap();
        session.drain_notices();

        let html = session.document().html.replace(r#"<div data-pattern="" class="pattern-1"></div>"#, "");
        assert!(session.set_html(&html));

        assert_eq!(session.pattern_bindings(), &[None]);
        assert!(!session.styles().contains("pattern-style-1"));
        let notices = session.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
    }

    #[tokio::test]
    async fn test_inserted_slot_pads_and_detaches_shifted_binding() {
        let mut session = session().await;
        session.apply_pattern(0, "dots").unwrap();
        session.drain_notices();

        let html = session.document().html.replace(
            r#"<div data-pattern="" class="pattern-0"></div>"#,
            r#"<div data-pattern=""></div><div data-pattern="" class="pattern-0"></div>"#,
        );
        assert!(session.set_html(&html));

        assert_eq!(session.pattern_slots().len(), 3);
        assert_eq!(session.pattern_bindings(), &[None, None, None]);
        assert!(!session.styles().contains("pattern-style-0"));

        let notices = session.drain_notices();
        assert_eq!(notices.len(), 2);
        assert!(notices.iter().all(|n| n.level == NoticeLevel::Warning));
        assert!(notices[0].message.contains("changed to 3"));
        assert!(notices[1].message.contains("slots 1"));
    }

    #[tokio::test]
    async fn test_class_removed_by_hand_detaches_binding() {
        let mut session = session().await;
        session.apply_pattern(0, "dots").unwrap();
        let html = session.document().html.replace(r#" class="pattern-0""#, "");
        session.set_html(&html);

        assert_eq!(session.pattern_bindings(), &[None, None]);
        assert!(!session.styles().contains("pattern-style-0"));
        assert_eq!(session.drain_notices().len(), 1);
    }

    #[tokio::test]
    async fn test_edit_pattern_css_republishes() {
        let mut session = session().await;
        assert!(!session.edit_pattern_css(0, ".pattern-0 {}"));
        session.apply_pattern(0, "dots").unwrap();
        assert!(session.edit_pattern_css(0, ".pattern-0 { background: green; }"));
        assert_eq!(
            session.styles().get("pattern-style-0"),
            Some(".pattern-0 { background: green; }")
        );
    }

    #[tokio::test]
    async fn test_undo_restores_bindings_and_styles() {
        let mut session = session().await;
        session.apply_pattern(0, "stripes").unwrap();
        session.remove_pattern(0);

        assert!(session.undo());
        assert_eq!(session.styles().get("pattern-style-0"), Some(".pattern-0 { background: red; }"));
        assert!(session.document().html.contains("pattern-0"));

        assert!(session.undo());
        assert!(!session.styles().contains("pattern-style-0"));
        assert_eq!(session.document().html, CARD);
        assert!(!session.undo());

        assert!(session.redo());
        assert!(session.styles().contains("pattern-style-0"));
    }

    #[tokio::test]
    async fn test_bad_upload_raises_notice() {
        let mut session = session().await;
        assert!(!session.bind_image_bytes(0, b"not an image"));
        assert_eq!(session.drain_notices()[0].level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_losing_a_bound_image_warns() {
        let mut session = session().await;
        assert!(session.bind_image_data_url(0, "data:image/png;base64,AAAA"));
        assert!(session.set_html("<div data-img=\"\"></div>"));
        let notices = session.drain_notices();
        assert!(notices.iter().any(|n| n.message.contains("uploaded image")));
    }

    #[tokio::test]
    async fn test_set_css_republishes_document_style() {
        let mut session = session().await;
        assert!(session.set_css("p { margin: 0; }"));
        assert_eq!(session.styles().get(DOCUMENT_STYLE_ID), Some("p { margin: 0; }"));
        assert!(!session.set_css("p { margin: 0; }"));
    }

    #[tokio::test]
    async fn test_guides_stay_out_of_exports() {
        let mut session = session().await;
        assert!(session.preview_mut().toggle_guides());
        assert!(session.preview().guide_overlay_html().is_some());
        assert!(!session.export_surface().document.html.contains("guide-lines"));
        assert_eq!(session.document().html, CARD);
    }

    #[tokio::test]
    async fn test_modal_is_lazy() {
        let mut session = session().await;
        assert!(!session.modal().is_open());
        session.open_modal(Size::new(800.0, 600.0));
        assert_eq!(session.export_surface().transform.scale, 1.0);
        assert!(session.close_modal());
        assert!(session.modal().preview().is_none());
    }
}

use image::{ImageFormat, Rgba, RgbaImage};
use mockup_engine::{
    apply_pattern, bind_image, clamp_pan, compute_fit, find_slots, DirectorySink, DirectorySource, Document,
    EngineConfig, ExportFormat, Exporter, FlatRasterizer, MockupSession, NoticeLevel, Pattern, PatternRegistry,
    PatternEntry, Size, SlotKind, StaticSource, StylePublicationTable, ViewportConfig, ViewportController,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::io::Cursor;

const TEMPLATE: &str = r#"<div style="width: 200px; height: 100px; background-color: #ffffff"><div data-img="" data-title="Logo" style="left: 0px; top: 0px; width: 100px; height: 100px"></div><div data-pattern="" data-title="Body"></div><div data-pattern=""></div><div data-pattern=""></div><div data-img=""></div></div>"#;

fn stripes() -> Pattern {
    Pattern {
        name: "stripes".to_string(),
        css: ".stripes-pattern { background: red; }".to_string(),
    }
}

fn png(color: [u8; 4]) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    RgbaImage::from_pixel(4, 4, Rgba(color))
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn assets() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let tshirt = dir.path().join("mockups").join("tshirt");
    fs::create_dir_all(&tshirt).unwrap();
    fs::write(tshirt.join("index.html"), TEMPLATE).unwrap();
    fs::write(tshirt.join("style.css"), ".shirt { margin: 0; }").unwrap();

    let patterns = dir.path().join("patterns");
    fs::create_dir_all(&patterns).unwrap();
    fs::write(patterns.join("stripes.css"), ".stripes-pattern { background: red; }").unwrap();
    fs::write(patterns.join("dots.css"), ".dots-pattern { background: blue; }").unwrap();
    dir
}

// Style publication
#[test]
fn test_publish_twice_matches_publish_once() {
    let mut once = StylePublicationTable::new();
    once.publish(".pattern-0 { color: red; }", "pattern-style-0");

    let mut twice = StylePublicationTable::new();
    twice.publish(".pattern-0 { color: red; }", "pattern-style-0");
    twice.publish(".pattern-0 { color: red; }", "pattern-style-0");

    assert_eq!(once, twice);
    assert_eq!(twice.len(), 1);
    assert_eq!(twice.render(), once.render());
}

// Slot location
#[test]
fn test_slot_numbering_survives_reserialization() {
    let before = find_slots(TEMPLATE, SlotKind::Pattern);
    let reserialized = mockup_engine::dom::Fragment::parse(TEMPLATE).to_html().unwrap();
    let after = find_slots(&reserialized, SlotKind::Pattern);
    assert_eq!(before, after);
    assert_eq!(before[0].title, "Body");
    assert_eq!(before[1].title, "Pattern 2");
}

// Viewport
#[test]
fn test_fit_never_upscales_or_overflows() {
    let fit = compute_fit(Size::new(800.0, 600.0), Size::new(1600.0, 1200.0), 40.0);
    assert_eq!(fit.scale, 520.0 / 1200.0);
    assert!(fit.scale <= 720.0 / 1600.0);
    assert_eq!(fit.offset_x, (800.0 - 1600.0 * fit.scale) / 2.0);
    assert_eq!(fit.offset_y, (600.0 - 1200.0 * fit.scale) / 2.0);

    let fit = compute_fit(Size::new(800.0, 600.0), Size::new(1600.0, 1000.0), 40.0);
    assert_eq!((fit.scale, fit.offset_x, fit.offset_y), (0.45, 40.0, 75.0));

    let small = compute_fit(Size::new(800.0, 600.0), Size::new(100.0, 100.0), 40.0);
    assert_eq!(small.scale, 1.0);
}

#[test]
fn test_zoom_out_never_goes_below_fit() {
    let mut viewport = ViewportController::new(ViewportConfig::default());
    viewport.set_container_size(Size::new(800.0, 600.0));
    viewport.set_content_size(Size::new(1600.0, 1000.0));
    assert_eq!(viewport.fit_scale(), 0.45);

    for _ in 0..3 {
        viewport.zoom_in();
    }
    for _ in 0..10 {
        viewport.zoom_out();
        assert!(viewport.transform().scale >= 0.45);
    }
    assert_eq!(viewport.transform().scale, 0.45);
}

#[test]
fn test_pan_clamp_is_idempotent_inside_bounds() {
    let container = Size::new(800.0, 600.0);
    let content = Size::new(1600.0, 1200.0);
    let clamped = clamp_pan(container, content, 40.0, (-5000.0, 5000.0), 1.0);
    assert_eq!(clamped, (-840.0, 40.0));
    assert_eq!(clamp_pan(container, content, 40.0, clamped, 1.0), clamped);
    assert_eq!(clamp_pan(container, content, 40.0, (-100.0, -200.0), 1.0), (-100.0, -200.0));
}

// Binding
#[test]
fn test_pattern_scoping_targets_one_slot() {
    let first = apply_pattern(TEMPLATE, 0, &stripes());
    let applied = apply_pattern(&first.html, 2, &stripes());
    assert_eq!(applied.scoped_css.as_deref(), Some(".pattern-2 { background: red; }"));

    let slots = find_slots(&applied.html, SlotKind::Pattern);
    assert_eq!(slots[0].scoping_class(), Some("pattern-0"));
    assert_eq!(slots[1].scoping_class(), None);
    assert_eq!(slots[2].scoping_class(), Some("pattern-2"));
}

#[test]
fn test_out_of_range_bind_returns_input() {
    assert_eq!(bind_image(TEMPLATE, 99, "data:image/png;base64,AAAA"), TEMPLATE);
}

// Registry
#[test]
fn test_registry_keeps_first_duplicate() {
    let registry = PatternRegistry::from_entries(vec![
        PatternEntry {
            identifier: "a/stripes.css".to_string(),
            css: "first".to_string(),
        },
        PatternEntry {
            identifier: "b/stripes.min.css".to_string(),
            css: "second".to_string(),
        },
    ]);
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("stripes").map(|p| p.css.as_str()), Some("first"));
}

#[test]
fn test_document_apply_is_pure() {
    let document = Document::new(TEMPLATE, "");
    let binder = mockup_engine::SlotBinder::default();
    let t = document.apply(
        &mockup_engine::Mutation::ApplyPattern {
            index: 1,
            pattern: stripes(),
        },
        &binder,
    );
    assert_eq!(document.html, TEMPLATE);
    assert!(t.document.html.contains("pattern-1"));
}

// End to end
#[tokio::test]
async fn test_directory_session_exports_png() {
    let dir = assets();
    let out = tempfile::tempdir().unwrap();
    let source = DirectorySource::new(dir.path());

    let mut session = MockupSession::new(EngineConfig::default());
    assert_eq!(session.load_patterns(&source).await, 2);
    assert!(session.load_template(&source, "tshirt").await);
    assert_eq!(session.image_slots().len(), 2);
    assert_eq!(session.pattern_slots().len(), 3);

    assert!(session.bind_image_bytes(0, &png([0, 0, 255, 255])));
    assert!(session.apply_pattern(1, "dots").unwrap());
    assert!(session.styles().contains("pattern-style-1"));

    session.set_container_size(Size::new(800.0, 600.0));
    let exporter = Exporter::new(FlatRasterizer, DirectorySink::new(out.path()), EngineConfig::default().export);
    let location = session
        .export_as_image(&exporter, "preview-content", ExportFormat::Png, "shirt")
        .await
        .unwrap();
    assert!(location.ends_with("shirt.png"));

    let written = image::open(out.path().join("shirt.png")).unwrap().to_rgba8();
    assert_eq!((written.width(), written.height()), (200, 100));
    assert_eq!(*written.get_pixel(50, 50), Rgba([0, 0, 255, 255]));
    assert_eq!(*written.get_pixel(150, 50), Rgba([255, 255, 255, 255]));

    let notices = session.drain_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Info);
}

#[tokio::test]
async fn test_export_of_missing_node_is_a_notice() {
    let source = StaticSource::new().with_template("card", TEMPLATE, "");
    let out = tempfile::tempdir().unwrap();
    let mut session = MockupSession::new(EngineConfig::default());
    session.load_template(&source, "card").await;

    let exporter = Exporter::new(FlatRasterizer, DirectorySink::new(out.path()), EngineConfig::default().export);
    let location = session
        .export_as_image(&exporter, "does-not-exist", ExportFormat::Jpeg, "card")
        .await;
    assert_eq!(location, None);

    let notices = session.drain_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert!(!out.path().join("card.jpeg").exists());
}

#[tokio::test]
async fn test_jpeg_export_is_opaque() {
    let source = StaticSource::new().with_template(
        "clear",
        r#"<div style="width: 10px; height: 10px"></div>"#,
        "",
    );
    let out = tempfile::tempdir().unwrap();
    let mut session = MockupSession::new(EngineConfig::default());
    session.load_template(&source, "clear").await;
    session.set_container_size(Size::new(800.0, 600.0));

    let exporter = Exporter::new(FlatRasterizer, DirectorySink::new(out.path()), EngineConfig::default().export);
    session
        .export_as_image(&exporter, "preview-content", ExportFormat::Jpeg, "clear")
        .await
        .unwrap();

    let written = image::open(out.path().join("clear.jpeg")).unwrap().to_rgb8();
    let p = written.get_pixel(5, 5);
    assert!(p[0] > 250 && p[1] > 250 && p[2] > 250);
}

#[tokio::test]
async fn test_css_sized_template_exports_applied_pattern() {
    let source = StaticSource::new()
        .with_template(
            "mug",
            r#"<div class="mug"><div data-pattern="" class="band"></div></div>"#,
            ".mug { width: 40px; height: 20px; background-color: #ffffff; } .band { left: 20px; top: 0px; width: 20px; height: 20px; }",
        )
        .with_pattern("lime.css", ".lime-pattern { background: #00ff00; }");
    let out = tempfile::tempdir().unwrap();
    let mut session = MockupSession::new(EngineConfig::default());
    session.load_patterns(&source).await;
    session.load_template(&source, "mug").await;
    session.set_container_size(Size::new(800.0, 600.0));
    assert!(session.apply_pattern(0, "lime").unwrap());

    let exporter = Exporter::new(FlatRasterizer, DirectorySink::new(out.path()), EngineConfig::default().export);
    session
        .export_as_image(&exporter, "preview-content", ExportFormat::Png, "mug")
        .await
        .unwrap();

    let written = image::open(out.path().join("mug.png")).unwrap().to_rgba8();
    assert_eq!((written.width(), written.height()), (40, 20));
    assert_eq!(*written.get_pixel(10, 10), Rgba([255, 255, 255, 255]));
    assert_eq!(*written.get_pixel(30, 10), Rgba([0, 255, 0, 255]));
}

#[tokio::test]
async fn test_unsized_template_export_fails_with_notice() {
    let source = StaticSource::new().with_template("loose", r#"<div class="loose"><p>hi</p></div>"#, "");
    let out = tempfile::tempdir().unwrap();
    let mut session = MockupSession::new(EngineConfig::default());
    session.load_template(&source, "loose").await;
    session.set_container_size(Size::new(800.0, 600.0));

    let exporter = Exporter::new(FlatRasterizer, DirectorySink::new(out.path()), EngineConfig::default().export);
    let location = session
        .export_as_image(&exporter, "preview-content", ExportFormat::Png, "loose")
        .await;
    assert_eq!(location, None);

    let notices = session.drain_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert!(notices[0].message.contains("content size unknown"));
    assert!(!out.path().join("loose.png").exists());
}

use mockup_engine::{
    DirectorySink, DirectorySource, EngineConfig, ExportFormat, Exporter, FlatRasterizer, MockupError,
    MockupSession, NoticeLevel, Size, SlotKind,
};
use std::env;
use std::path::PathBuf;
use std::process;

struct Options {
    assets: PathBuf,
    template: String,
    images: Vec<(usize, PathBuf)>,
    patterns: Vec<(usize, String)>,
    format: ExportFormat,
    out: PathBuf,
    name: Option<String>,
    config: Option<PathBuf>,
}

fn usage() -> ! {
    eprintln!("Usage: mockup-render <assets-dir> <template> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --image N=FILE     bind an image file to image slot N");
    eprintln!("  --pattern N=NAME   apply catalog pattern NAME to pattern slot N");
    eprintln!("  --format png|jpeg  export format (default: png)");
    eprintln!("  --out DIR          output directory (default: .)");
    eprintln!("  --name FILE        output file name without extension");
    eprintln!("  --config FILE      engine config (YAML)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  mockup-render assets tshirt --pattern 0=stripes --image 0=logo.png");
    eprintln!("  mockup-render assets mug --format jpeg --out renders --name mug-blue");
    process::exit(1);
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("error: {}", message);
            eprintln!();
            usage();
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: failed to start runtime: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(options)) {
        eprintln!("✗ {}", e);
        process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut positional = Vec::new();
    let mut images = Vec::new();
    let mut patterns = Vec::new();
    let mut format = ExportFormat::Png;
    let mut out = PathBuf::from(".");
    let mut name = None;
    let mut config = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} needs a value", flag))
        };
        match arg.as_str() {
            "-h" | "--help" => usage(),
            "--image" => {
                let (index, file) = indexed(&value("--image")?)?;
                images.push((index, PathBuf::from(file)));
            }
            "--pattern" => patterns.push(indexed(&value("--pattern")?)?),
            "--format" => format = value("--format")?.parse().map_err(|e: MockupError| e.to_string())?,
            "--out" => out = PathBuf::from(value("--out")?),
            "--name" => name = Some(value("--name")?),
            "--config" => config = Some(PathBuf::from(value("--config")?)),
            flag if flag.starts_with("--") => return Err(format!("unknown option {}", flag)),
            _ => positional.push(arg.clone()),
        }
    }

    let [assets, template]: [String; 2] = positional
        .try_into()
        .map_err(|_| "expected <assets-dir> and <template>".to_string())?;

    Ok(Options {
        assets: PathBuf::from(assets),
        template,
        images,
        patterns,
        format,
        out,
        name,
        config,
    })
}

/// `N=VALUE`
fn indexed(arg: &str) -> Result<(usize, String), String> {
    let (index, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected N=VALUE, got '{}'", arg))?;
    let index = index
        .trim()
        .parse()
        .map_err(|_| format!("slot index '{}' is not a number", index))?;
    Ok((index, value.to_string()))
}

async fn run(options: Options) -> Result<(), MockupError> {
    let config = match &options.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let source = DirectorySource::new(&options.assets);
    let mut session = MockupSession::new(config.clone());

    let count = session.load_patterns(&source).await;
    println!("Loaded {} patterns from {}", count, options.assets.display());
    session.load_template(&source, &options.template).await;

    print_slots(&session);

    for (index, file) in &options.images {
        check_slot(&session, SlotKind::Image, *index)?;
        if !session.bind_image_file(*index, file).await {
            println!("  image slot {} unchanged", index);
        }
    }
    for (index, pattern) in &options.patterns {
        check_slot(&session, SlotKind::Pattern, *index)?;
        if !session.apply_pattern(*index, pattern)? {
            println!("  pattern slot {} unchanged", index);
        }
    }

    // A container exactly one margin larger than the content fits it at 1:1.
    let content = session.preview().content_size();
    let margin = config.viewport.margin;
    session.set_container_size(Size::new(
        content.width + 2.0 * margin,
        content.height + 2.0 * margin,
    ));

    let exporter = Exporter::new(FlatRasterizer, DirectorySink::new(&options.out), config.export.clone());
    let name = options.name.as_deref().unwrap_or(&options.template);
    let location = session
        .export_as_image(&exporter, &config.export.preview_id, options.format, name)
        .await;

    let mut failed = false;
    for notice in session.drain_notices() {
        failed |= notice.level == NoticeLevel::Error;
        match notice.level {
            NoticeLevel::Info => println!("{}", notice),
            _ => eprintln!("{}", notice),
        }
    }

    match location {
        Some(location) if !failed => {
            println!("✓ {} ({} bytes of HTML)", location, session.document().html.len());
            Ok(())
        }
        _ => Err(MockupError::Io("render finished with errors".to_string())),
    }
}

fn check_slot(session: &MockupSession, kind: SlotKind, index: usize) -> Result<(), MockupError> {
    let count = match kind {
        SlotKind::Image => session.image_slots().len(),
        SlotKind::Pattern => session.pattern_slots().len(),
    };
    if index >= count {
        return Err(MockupError::SlotOutOfRange { kind, index, count });
    }
    Ok(())
}

fn print_slots(session: &MockupSession) {
    for kind in [SlotKind::Image, SlotKind::Pattern] {
        let slots = match kind {
            SlotKind::Image => session.image_slots(),
            SlotKind::Pattern => session.pattern_slots(),
        };
        println!("{} slots: {}", kind, slots.len());
        for slot in slots {
            println!("  [{}] {}", slot.position_index, slot.title);
        }
    }
}

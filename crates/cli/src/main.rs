use jewel_composer_core::{
    compositor::{CompositeRequest, PipelineEvent},
    config::Config,
    geometry::{ContainerRect, Dimensions, RelativePosition, content_point_in_container, map_point_to_content},
    image_processing::{EncodedImage, ImageProcessor},
    init,
    lighting::analyze_region,
    session::{Session, SourceImage},
    GenerationResult, JewelComposer,
};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Place jewelry into a scene photo with Gemini", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite a product into a scene at a placement point
    Compose(ComposeArgs),
    /// Re-run the last placement from a session with a resized jewelry piece
    Adjust(AdjustArgs),
    /// Print the local lighting hint for a scene point (offline)
    Analyze(AnalyzeArgs),
    /// Map a click on a displayed image to a content position (offline)
    Locate(LocateArgs),
}

#[derive(Args, Debug)]
struct ComposeArgs {
    /// Jewelry product image
    #[arg(long)]
    product: PathBuf,

    /// Scene photograph
    #[arg(long)]
    scene: PathBuf,

    /// Placement as content percentages, e.g. 50,50
    #[arg(long, value_parser = parse_pair, conflicts_with = "click")]
    at: Option<(f64, f64)>,

    /// Placement as a click position inside a view of size --view
    #[arg(long, value_parser = parse_pair, requires = "view")]
    click: Option<(f64, f64)>,

    /// Size of the view the click happened in, e.g. 800,800
    #[arg(long, value_parser = parse_pair)]
    view: Option<(f64, f64)>,

    /// Jewelry size relative to a realistic size (0.5 - 2.0)
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Where to write the session for later `adjust` runs
    #[arg(long)]
    session: Option<PathBuf>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Debug)]
struct AdjustArgs {
    /// Session file written by a previous `compose`
    #[arg(long)]
    session: PathBuf,

    /// Scale change, e.g. 0.25 or -0.25
    #[arg(long, allow_hyphen_values = true)]
    delta: f64,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Final composite (JPEG)
    #[arg(long)]
    out: PathBuf,

    /// Marked, normalized scene (JPEG)
    #[arg(long)]
    debug_out: Option<PathBuf>,

    /// Exact prompt sent to the image model
    #[arg(long)]
    prompt_out: Option<PathBuf>,

    /// Override the image model defined in .env
    #[arg(short, long)]
    model: Option<String>,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[arg(long)]
    scene: PathBuf,

    /// Placement as content percentages, e.g. 50,50
    #[arg(long, value_parser = parse_pair)]
    at: (f64, f64),

    /// Side of the normalized square
    #[arg(long, default_value_t = 1024)]
    target: u32,
}

#[derive(Args, Debug)]
struct LocateArgs {
    /// Intrinsic image size, e.g. 1200,800
    #[arg(long, value_parser = parse_pair)]
    image: (f64, f64),

    /// Displayed view size, e.g. 600,600
    #[arg(long, value_parser = parse_pair)]
    view: (f64, f64),

    /// Click position inside the view, e.g. 300,300
    #[arg(long, value_parser = parse_pair)]
    click: (f64, f64),
}

fn parse_pair(raw: &str) -> std::result::Result<(f64, f64), String> {
    let (a, b) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected two comma-separated numbers, got '{}'", raw))?;
    let a = a.trim().parse::<f64>().map_err(|e| format!("'{}': {}", a, e))?;
    let b = b.trim().parse::<f64>().map_err(|e| format!("'{}': {}", b, e))?;
    Ok((a, b))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup
    init();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Compose(args) => compose(args).await,
        Command::Adjust(args) => adjust(args).await,
        Command::Analyze(args) => analyze(&args),
        Command::Locate(args) => locate(&args),
    }
}

async fn compose(args: ComposeArgs) -> Result<()> {
    let product_bytes = read_image(&args.product)?;
    let scene_bytes = read_image(&args.scene)?;

    let position = match (args.at, args.click, args.view) {
        (Some((x, y)), _, _) => RelativePosition::new(x, y),
        (None, Some((cx, cy)), Some((vw, vh))) => {
            let dimensions = ImageProcessor::measure(&scene_bytes).context("Failed to read scene")?;
            map_point_to_content(dimensions, ContainerRect::sized(vw, vh), cx, cy)
                .map(|mapping| mapping.relative)
                .ok_or_else(|| anyhow!("The click at {},{} lands on the letterbox padding, not on the scene", cx, cy))?
        }
        _ => bail!("Provide a placement with --at X,Y or --click X,Y --view W,H"),
    };

    let mut session = Session::default();
    session.set_product(source_image(&args.product)?);
    session.set_scene(source_image(&args.scene)?);

    let scale = jewel_composer_core::session::clamp_scale(args.scale);
    if (scale - args.scale).abs() > f64::EPSILON {
        println!("Scale clamped to {}", scale);
    }

    run(&mut session, &product_bytes, &scene_bytes, position, scale, &args.output).await?;

    if let Some(path) = &args.session {
        save_session(path, &session)?;
    }
    Ok(())
}

async fn adjust(args: AdjustArgs) -> Result<()> {
    let mut session = load_session(&args.session)?;

    let (product, scene) = match (&session.product, &session.scene) {
        (Some(product), Some(scene)) => (product.clone(), scene.clone()),
        _ => bail!("Session has no product or scene; run `compose` first"),
    };
    let position = session
        .last_placement
        .ok_or_else(|| anyhow!("Session has no placement yet; run `compose` first"))?;

    let Some(scale) = session.next_scale(args.delta) else {
        println!("Scale is already at {}; nothing to do", session.scale);
        return Ok(());
    };

    let product_bytes = read_image(&product.path)?;
    let scene_bytes = read_image(&scene.path)?;
    run(&mut session, &product_bytes, &scene_bytes, position, scale, &args.output).await?;

    save_session(&args.session, &session)
}

/// Runs one composite with a spinner, writes outputs and commits the session.
async fn run(
    session: &mut Session,
    product_bytes: &[u8],
    scene_bytes: &[u8],
    position: RelativePosition,
    scale: f64,
    output: &OutputArgs,
) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(model) = &output.model {
        config.image_model = model.clone();
    }
    let composer = JewelComposer::with_config(config).context("Failed to initialize Gemini client")?;
    debug!(
        "Composing with {} (describe: {}) at {}px",
        composer.config().image_model,
        composer.config().describe_model,
        composer.config().target_dimension
    );

    let product_label = session.product.as_ref().map(|p| p.label.clone()).unwrap_or_default();
    let scene_label = session.scene.as_ref().map(|s| s.label.clone()).unwrap_or_default();
    let request = CompositeRequest::new(product_bytes, scene_bytes, position)
        .with_labels(&product_label, &scene_label)
        .with_scale(scale);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("{spinner:.green} {msg}")?
    );
    spinner.enable_steady_tick(Duration::from_millis(100));

    let (tx, rx) = channel();
    let progress = spinner.clone();
    let debug_out = output.debug_out.clone();
    let listener = thread::spawn(move || {
        for event in rx {
            match event {
                PipelineEvent::Stage(stage) => progress.set_message(stage.message()),
                PipelineEvent::DebugImage(url) => {
                    // Written as soon as it exists so a failed run still leaves it behind.
                    if let Some(path) = &debug_out {
                        if let Err(e) = write_data_url(path, &url) {
                            progress.println(format!("Warning: could not write debug image: {}", e));
                        }
                    }
                }
            }
        }
    });

    let outcome = composer.compose_with_events(&request, &tx).await;
    drop(tx);
    let _ = listener.join();
    spinner.finish_and_clear();

    let result = outcome.context("Failed to generate the image")?;
    write_outputs(&result, output)?;
    session.record_success(position, scale, result.final_prompt.clone());

    println!(
        "Composite written to {} (placement {:.1}%, {:.1}%, scale {}%)",
        output.out.display(),
        position.x_percent,
        position.y_percent,
        jewel_composer_core::prompt::scale_percent(scale)
    );
    Ok(())
}

fn analyze(args: &AnalyzeArgs) -> Result<()> {
    let bytes = read_image(&args.scene)?;
    let dimensions = ImageProcessor::measure(&bytes)?;
    let scene = ImageProcessor::decode(&bytes)?;
    let normalized = ImageProcessor::letterbox(&scene, args.target)?;
    let position = RelativePosition::new(args.at.0, args.at.1);
    if !position.is_within_bounds() {
        bail!("Placement must be within 0-100% on both axes");
    }

    let lighting = analyze_region(&normalized, position, dimensions)?;
    println!("{}", lighting);
    Ok(())
}

fn locate(args: &LocateArgs) -> Result<()> {
    let dimensions = image_dimensions(args.image)?;
    let container = ContainerRect::sized(args.view.0, args.view.1);

    match map_point_to_content(dimensions, container, args.click.0, args.click.1) {
        Some(mapping) => {
            println!(
                "Content position: {:.2}%, {:.2}%",
                mapping.relative.x_percent, mapping.relative.y_percent
            );
            if let Some(back) = content_point_in_container(dimensions, container.width, container.height, mapping.relative) {
                println!("View position: {:.1}, {:.1}", back.x, back.y);
            }
        }
        None => println!("Click is on the letterbox padding; no placement"),
    }
    Ok(())
}

/// Rejects sizes that would saturate to zero or overflow as pixel counts.
fn image_dimensions((width, height): (f64, f64)) -> Result<Dimensions> {
    let valid = |v: f64| (1.0..=f64::from(u32::MAX)).contains(&v);
    if !(valid(width) && valid(height)) {
        bail!("Invalid image size {}x{}: both sides must be at least 1 pixel", width, height);
    }
    Ok(Dimensions::new(width.round() as u32, height.round() as u32))
}

/// Sessions outlive the working directory, so paths are stored absolute.
fn source_image(path: &Path) -> Result<SourceImage> {
    let absolute = fs::canonicalize(path)
        .with_context(|| format!("Failed to resolve {}", path.display()))?;
    Ok(SourceImage::from_path(absolute))
}

fn read_image(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write_data_url(path: &Path, url: &str) -> Result<()> {
    let image = EncodedImage::from_data_url(url)?;
    fs::write(path, image.bytes).with_context(|| format!("Failed to write {}", path.display()))
}

fn write_outputs(result: &GenerationResult, output: &OutputArgs) -> Result<()> {
    write_data_url(&output.out, &result.final_image_url)?;
    if let Some(path) = &output.prompt_out {
        fs::write(path, &result.final_prompt)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

fn load_session(path: &Path) -> Result<Session> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read session {}", path.display()))?;
    serde_json::from_str(&content).context("Session file is not valid JSON")
}

fn save_session(path: &Path, session: &Session) -> Result<()> {
    let json = serde_json::to_string_pretty(session)?;
    fs::write(path, json).with_context(|| format!("Failed to write session {}", path.display()))
}

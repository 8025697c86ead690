use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use spectrum_studio::capture::ffmpeg::{FfmpegCaptureSink, FfmpegCaptureSinkOpts};
use spectrum_studio::{Canvas, CaptureState, FrameRenderer, Studio, VisualSettings, WavEngine};

#[derive(Parser, Debug)]
#[command(name = "spectrum-studio", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single preview frame as a PNG.
    Frame(FrameArgs),
    /// Capture a playlist of WAV tracks into one video (requires `ffmpeg` on PATH).
    Export(ExportArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Visual settings JSON; stock settings when omitted.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Idle-animation frame index (0-based).
    #[arg(long, default_value_t = 0)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Optional background image.
    #[arg(long)]
    background: Option<PathBuf>,

    /// Optional logo image.
    #[arg(long)]
    logo: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Visual settings JSON; stock settings when omitted.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Output video path; the extension follows the selected container.
    #[arg(long)]
    out: PathBuf,

    /// Optional background image.
    #[arg(long)]
    background: Option<PathBuf>,

    /// Optional logo image.
    #[arg(long)]
    logo: Option<PathBuf>,

    /// WAV tracks in playlist order.
    #[arg(required = true)]
    tracks: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Export(args) => cmd_export(args),
    }
}

fn read_settings(path: Option<&Path>) -> anyhow::Result<VisualSettings> {
    let Some(path) = path else {
        return Ok(VisualSettings::default());
    };
    let f = File::open(path).with_context(|| format!("open settings '{}'", path.display()))?;
    let r = BufReader::new(f);
    let settings: VisualSettings =
        serde_json::from_reader(r).with_context(|| "parse settings JSON")?;
    settings.validate()?;
    Ok(settings)
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let settings = read_settings(args.settings.as_deref())?;

    let mut renderer = FrameRenderer::new(Canvas::full_hd())?;
    if let Some(bg) = &args.background {
        let bytes =
            std::fs::read(bg).with_context(|| format!("read background '{}'", bg.display()))?;
        renderer.set_background_image(Some(&bytes))?;
    }
    if let Some(logo) = &args.logo {
        let bytes =
            std::fs::read(logo).with_context(|| format!("read logo '{}'", logo.display()))?;
        renderer.set_logo_image(Some(&bytes))?;
    }

    // The idle animation is a function of the frame counter; run up to the
    // requested index.
    let mut frame = renderer.render(&settings, None)?;
    for _ in 0..args.frame {
        frame = renderer.render(&settings, None)?;
    }

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let settings = read_settings(args.settings.as_deref())?;

    let mut studio = Studio::new(Box::new(WavEngine::new()), Canvas::full_hd(), settings)?;
    for track in &args.tracks {
        let name = track
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| track.display().to_string());
        studio.add_track(track.clone(), name);
    }
    studio.set_background_image(args.background.as_deref());
    studio.set_logo_image(args.logo.as_deref());

    let sink = FfmpegCaptureSink::new(FfmpegCaptureSinkOpts::new(&args.out));
    studio.start_capture(Box::new(sink))?;

    // Drive the render loop until the session finalizes. A stalled session
    // (playback stopped without an end event) aborts after two seconds of
    // no progress.
    let mut stalled_ticks = 0u32;
    while studio.capture_state() != CaptureState::Inactive {
        studio.tick()?;
        if studio.capture_state() == CaptureState::Active && !studio.is_playing() {
            stalled_ticks += 1;
            if stalled_ticks > 120 {
                studio.stop_capture()?;
                anyhow::bail!("capture stalled: playback stopped without finishing");
            }
        } else {
            stalled_ticks = 0;
        }
    }

    match studio.last_artifact().and_then(|a| a.path.clone()) {
        Some(path) => eprintln!("wrote {}", path.display()),
        None => eprintln!("capture finished with no artifact"),
    }
    Ok(())
}

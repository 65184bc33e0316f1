use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};

use layerflow_core::config::{ConfigManager, ConfigSection, Settings};
use layerflow_core::detection::{
    DetectionOptions, DetectionStore, Device, DomSnapshot, LayerDetector, Viewport,
};
use layerflow_core::logging::{init_tracing, LogLevel};
use layerflow_core::models::{AnimationConfig, RenderStatus};
use layerflow_core::orchestrator::RenderService;

#[derive(Parser, Debug)]
#[command(name = "layerflow", version, about = "UI layer detection and layered video renders")]
struct Cli {
    /// Settings file (created with defaults when missing).
    #[arg(long, global = true, default_value = ".config/layerflow.toml")]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG is set.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect layers in a captured page.
    Detect(DetectArgs),
    /// Render a stored detection and wait for the video.
    Render(RenderArgs),
    /// Write the default settings file, or update sections of an existing one.
    InitConfig(InitConfigArgs),
}

#[derive(Parser, Debug)]
struct InitConfigArgs {
    /// Working directory of the external renderer project.
    #[arg(long)]
    renderer_dir: Option<String>,

    /// Renderer time limit in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Parser, Debug)]
struct DetectArgs {
    /// Page capture JSON (viewport + elements in document order).
    #[arg(long)]
    snapshot: PathBuf,

    /// Screenshot of the page; when given, the result is stored under a new id.
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Viewport preset used when the capture does not record one.
    #[arg(long, default_value = "desktop")]
    device: Device,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Id of a stored detection.
    #[arg(long)]
    detection: String,

    /// Animation config JSON.
    #[arg(long)]
    animations: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    });

    match cli.cmd {
        Command::InitConfig(args) => cmd_init_config(&cli.config, args),
        Command::Detect(args) => cmd_detect(&load_settings(&cli.config)?, args),
        Command::Render(args) => cmd_render(&load_settings(&cli.config)?, args),
    }
}

fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut manager = ConfigManager::new(path);
    manager
        .load_or_create()
        .with_context(|| format!("load config '{}'", path.display()))?;
    manager
        .ensure_dirs_exist()
        .context("create configured directories")?;
    Ok(manager.settings().clone())
}

fn cmd_init_config(path: &Path, args: InitConfigArgs) -> anyhow::Result<()> {
    let existed = path.exists();
    if existed && args.renderer_dir.is_none() && args.timeout_secs.is_none() {
        bail!("config '{}' already exists", path.display());
    }
    let mut manager = ConfigManager::new(path);
    manager
        .load_or_create()
        .with_context(|| format!("write config '{}'", path.display()))?;

    if let Some(dir) = args.renderer_dir {
        manager.settings_mut().paths.renderer_dir = dir;
        manager
            .update_section(ConfigSection::Paths)
            .context("update [paths]")?;
    }
    if let Some(secs) = args.timeout_secs {
        manager.settings_mut().renderer.timeout_secs = secs;
        manager
            .update_section(ConfigSection::Renderer)
            .context("update [renderer]")?;
    }

    eprintln!("{} {}", if existed { "updated" } else { "wrote" }, path.display());
    Ok(())
}

fn cmd_detect(settings: &Settings, args: DetectArgs) -> anyhow::Result<()> {
    let snapshot = DomSnapshot::from_path(&args.snapshot)?;
    let viewport = snapshot
        .viewport
        .unwrap_or_else(|| Viewport::for_device(args.device, &settings.detection));

    let detector = LayerDetector::new(DetectionOptions::from(&settings.detection));
    let result = detector.detect(&snapshot, viewport, snapshot.url.clone())?;
    eprintln!(
        "detected {} layers ({} interactive)",
        result.layers.len(),
        result.interactive_count()
    );

    if let Some(screenshot) = &args.screenshot {
        let store = DetectionStore::from_paths(&settings.paths);
        let id = store
            .save(&result, screenshot)
            .with_context(|| format!("store detection with screenshot '{}'", screenshot.display()))?;
        println!("{}", id);
    }
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn cmd_render(settings: &Settings, args: RenderArgs) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(&args.animations)
        .with_context(|| format!("read animations '{}'", args.animations.display()))?;
    let animations: AnimationConfig = serde_json::from_str(&json)
        .with_context(|| format!("parse animations '{}'", args.animations.display()))?;

    let service = RenderService::start(settings)?;
    let job_id = service.submit(&args.detection, animations)?;
    eprintln!("job {}", job_id);

    let poll = settings.queue.poll_interval();
    let mut last_progress = None;
    let report = loop {
        let report = service.get_status(&job_id)?;
        if report.status.is_terminal() {
            break report;
        }
        if last_progress != Some(report.progress) {
            eprintln!("{} {}%", report.status, report.progress);
            last_progress = Some(report.progress);
        }
        thread::sleep(poll.max(Duration::from_millis(50)));
    };
    service.shutdown();

    println!("{}", serde_json::to_string_pretty(&report)?);
    match report.status {
        RenderStatus::Complete => Ok(()),
        _ => bail!(
            "render failed: {}",
            report.error_detail.as_deref().unwrap_or("unknown error")
        ),
    }
}

use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;

use facecam_core::capture::capture_session_manager::{CaptureConfig, CaptureSessionManager};
use facecam_core::capture::domain::camera_device::CameraProvider;
#[cfg(feature = "webcam")]
use facecam_core::capture::infrastructure::nokhwa_camera::NokhwaCameraProvider;
use facecam_core::capture::infrastructure::still_image_camera::StillImageCameraProvider;
use facecam_core::detection::domain::face_detector::FaceDetector;
use facecam_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use facecam_core::overlay::domain::coordinate_mapper::VideoGravity;
use facecam_core::overlay::domain::display_surface::DisplaySurface;
use facecam_core::overlay::domain::overlay_shape::OverlayStyle;
use facecam_core::overlay::infrastructure::image_surface::ImageSurfaceFactory;
use facecam_core::overlay::overlay_presenter::OverlayUpdate;
use facecam_core::pipeline::infrastructure::threaded_pipeline_executor::ThreadedPipelineExecutor;
use facecam_core::pipeline::pipeline_executor::{PipelineConfig, PipelineExecutor};
use facecam_core::pipeline::pipeline_logger::{PipelineLogger, StdoutPipelineLogger};
use facecam_core::shared::constants::{FACE_MODEL_NAME, FACE_MODEL_URL, IMAGE_EXTENSIONS};
use facecam_core::shared::model_resolver::{self, ModelSource};
use facecam_core::shared::settings::Settings;
use facecam_core::snapshot::domain::snapshot_writer::SnapshotWriter;
use facecam_core::snapshot::infrastructure::png_snapshot_writer::PngSnapshotWriter;

/// Live front-camera preview with a rectangle drawn around every face.
///
/// Flags override the saved settings for this run; `--save-settings`
/// persists the merged result.
#[derive(Parser)]
#[command(name = "facecam")]
struct Cli {
    /// Replay a still image as the front camera instead of opening hardware.
    #[arg(long)]
    image: Option<PathBuf>,

    /// Use the camera with this index.
    #[arg(long)]
    camera_index: Option<u32>,

    /// Accept cameras that do not report which way they face.
    #[arg(long)]
    any_camera: bool,

    /// Face detection model (downloaded to the cache when omitted).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Requested capture width.
    #[arg(long)]
    width: Option<u32>,

    /// Requested capture height.
    #[arg(long)]
    height: Option<u32>,

    /// Requested capture frame rate.
    #[arg(long)]
    fps: Option<u32>,

    /// Preview surface width.
    #[arg(long)]
    surface_width: Option<u32>,

    /// Preview surface height.
    #[arg(long)]
    surface_height: Option<u32>,

    /// How frames fill the preview: resize, aspect or fill.
    #[arg(long)]
    gravity: Option<String>,

    /// Do not mirror the front camera preview.
    #[arg(long)]
    no_mirror: bool,

    /// Queue late frames for detection instead of discarding them.
    #[arg(long)]
    queue_late_frames: bool,

    /// Stop after this many captured frames.
    #[arg(long)]
    frames: Option<usize>,

    /// Write annotated preview snapshots to this directory.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Write a snapshot every Nth drawn frame.
    #[arg(long, default_value = "30")]
    snapshot_every: usize,

    /// Persist the effective settings.
    #[arg(long)]
    save_settings: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let settings = apply_overrides(Settings::load(), &cli);
    settings.validate()?;
    if cli.save_settings {
        let path = settings.save()?;
        log::info!("Settings saved to {}", path.display());
    }

    let detector = build_detector(&settings)?;
    let provider = build_provider(&cli)?;

    let mut capture = CaptureSessionManager::new(
        provider,
        Box::new(ImageSurfaceFactory),
        capture_config(&cli, &settings),
    );
    if capture.start().is_none() {
        return Err("Front camera capture is unavailable".into());
    }

    let writer = PngSnapshotWriter::new();
    let snapshot_dir = cli.snapshot_dir.clone();
    let every = cli.snapshot_every;
    let mut drawn = 0usize;
    let mut snapshots = 0usize;

    let config = PipelineConfig {
        max_frames: cli.frames,
        style: overlay_style(&settings),
        on_drawn: Some(Box::new(
            |update: &OverlayUpdate, surface: &dyn DisplaySurface| {
                drawn += 1;
                let Some(dir) = snapshot_dir.as_deref() else {
                    return true;
                };
                if drawn % every != 0 {
                    return true;
                }
                if let Some(frame) = surface.snapshot() {
                    let path = PngSnapshotWriter::path_for(dir, update.frame_index);
                    match writer.write(&path, &frame, None) {
                        Ok(()) => snapshots += 1,
                        Err(e) => log::warn!("Failed to write {}: {e}", path.display()),
                    }
                }
                true
            },
        )),
        cancelled: Arc::new(AtomicBool::new(false)),
    };

    let mut logger = StdoutPipelineLogger::default();
    let (session, state) = capture
        .run_parts()
        .ok_or("capture session is not configured")?;
    let result = ThreadedPipelineExecutor::new().execute(
        session,
        state,
        detector,
        &mut logger,
        config,
    );
    capture.teardown();
    let report = result?;

    logger.summary();
    if let Some(dir) = &cli.snapshot_dir {
        log::info!("Wrote {snapshots} snapshot(s) to {}", dir.display());
    }
    log::info!(
        "Done: {} frames drawn, {} dropped as late",
        report.frames_drawn,
        report.frames_dropped
    );
    Ok(())
}

fn build_provider(cli: &Cli) -> Result<Box<dyn CameraProvider>, Box<dyn std::error::Error>> {
    match &cli.image {
        Some(path) => Ok(Box::new(StillImageCameraProvider::from_path(path))),
        None => live_camera_provider(),
    }
}

#[cfg(feature = "webcam")]
fn live_camera_provider() -> Result<Box<dyn CameraProvider>, Box<dyn std::error::Error>> {
    Ok(Box::new(NokhwaCameraProvider::new()))
}

#[cfg(not(feature = "webcam"))]
fn live_camera_provider() -> Result<Box<dyn CameraProvider>, Box<dyn std::error::Error>> {
    Err("built without camera support: pass --image or rebuild with --features webcam".into())
}

fn build_detector(settings: &Settings) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    let source = match &settings.model_path {
        Some(path) => ModelSource::Path(path.clone()),
        None => ModelSource::Remote {
            name: FACE_MODEL_NAME.to_string(),
            url: FACE_MODEL_URL.to_string(),
            bundled_dir: bundled_models_dir(),
        },
    };

    log::info!("Resolving model: {FACE_MODEL_NAME}");
    let model_path = model_resolver::resolve(&source, Some(Box::new(download_progress)))?;
    eprintln!();

    Ok(Box::new(OnnxYoloDetector::new(
        &model_path,
        settings.confidence,
    )?))
}

/// `models/` next to the executable.
fn bundled_models_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("models")))
}

fn apply_overrides(mut settings: Settings, cli: &Cli) -> Settings {
    if let Some(c) = cli.confidence {
        settings.confidence = c;
    }
    if let Some(w) = cli.width {
        settings.capture_width = w;
    }
    if let Some(h) = cli.height {
        settings.capture_height = h;
    }
    if let Some(fps) = cli.fps {
        settings.capture_fps = fps;
    }
    if let Some(w) = cli.surface_width {
        settings.surface_width = w;
    }
    if let Some(h) = cli.surface_height {
        settings.surface_height = h;
    }
    if let Some(gravity) = cli.gravity.as_deref().and_then(parse_gravity) {
        settings.gravity = gravity;
    }
    if cli.no_mirror {
        settings.mirror_preview = Some(false);
    }
    if cli.queue_late_frames {
        settings.always_discard_late_frames = false;
    }
    if let Some(model) = &cli.model {
        settings.model_path = Some(model.clone());
    }
    settings
}

fn capture_config(cli: &Cli, settings: &Settings) -> CaptureConfig {
    let mut config = CaptureConfig::from_settings(settings);
    config.selector.index = cli.camera_index;
    config.selector.allow_unspecified_position = cli.any_camera || cli.camera_index.is_some();
    config
}

fn overlay_style(settings: &Settings) -> OverlayStyle {
    OverlayStyle {
        stroke_color: settings.stroke_color,
        line_width: settings.line_width,
        fill_color: None,
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(image) = &cli.image {
        if !image.exists() {
            return Err(format!("Image file not found: {}", image.display()).into());
        }
        if !is_image(image) {
            return Err(format!("Unsupported image type: {}", image.display()).into());
        }
    }
    if let Some(model) = &cli.model {
        if !model.is_file() {
            return Err(format!("Model file not found: {}", model.display()).into());
        }
    }
    if let Some(c) = cli.confidence {
        if !(0.0..=1.0).contains(&c) {
            return Err(format!("Confidence must be between 0.0 and 1.0, got {c}").into());
        }
    }
    for (flag, value) in [
        ("--width", cli.width),
        ("--height", cli.height),
        ("--surface-width", cli.surface_width),
        ("--surface-height", cli.surface_height),
    ] {
        if value == Some(0) {
            return Err(format!("{flag} must be greater than 0").into());
        }
    }
    if let Some(g) = &cli.gravity {
        if parse_gravity(g).is_none() {
            return Err(format!("Gravity must be 'resize', 'aspect' or 'fill', got '{g}'").into());
        }
    }
    if cli.snapshot_every == 0 {
        return Err("--snapshot-every must be at least 1".into());
    }
    if cli.frames == Some(0) {
        return Err("--frames must be at least 1".into());
    }
    Ok(())
}

fn parse_gravity(name: &str) -> Option<VideoGravity> {
    match name {
        "resize" => Some(VideoGravity::Resize),
        "aspect" => Some(VideoGravity::ResizeAspect),
        "fill" => Some(VideoGravity::ResizeAspectFill),
        _ => None,
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}

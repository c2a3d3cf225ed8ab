use anyhow::Context;
use clap::Parser;
use detector::{LabelMap, OutputShape, PostProcessor};
use pipeline::PipelineConfig;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracker::{DisplayBox, Rotation, ScreenFilter, TemporalTracker, ViewportTransform};

/// Replay a raw model output dump through post-processing, screen mapping
/// and tracking.
///
/// Thresholds and modes come from the same environment variables as the
/// detection service.
#[derive(Parser, Debug)]
#[command(name = "arsight-replay")]
struct Args {
    /// Raw f32 output tensor in the configured layout, or a raw RGB frame
    /// of --image-width x --image-height when --model is given
    input: PathBuf,

    /// Label file, one per line (overrides LABELS_PATH)
    #[arg(long)]
    labels: Option<PathBuf>,

    /// ONNX model to run on the input frame through the detection service
    #[cfg(feature = "ort-backend")]
    #[arg(long)]
    model: Option<PathBuf>,

    /// Execution provider for --model: cpu or cuda
    #[cfg(feature = "ort-backend")]
    #[arg(long, default_value = "cpu")]
    provider: detector::ExecutionProvider,

    #[arg(long, default_value_t = 640)]
    image_width: u32,

    #[arg(long, default_value_t = 480)]
    image_height: u32,

    #[arg(long, default_value_t = 1080)]
    viewport_width: u32,

    #[arg(long, default_value_t = 1440)]
    viewport_height: u32,

    /// Display rotation in degrees: 0, 90, 180 or 270
    #[arg(long, default_value_t = 90)]
    rotation: u32,

    /// Times the input is fed through, 100 ms apart
    #[arg(long, default_value_t = 3)]
    frames: u32,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = PipelineConfig::from_env()?;
    common::setup_logging(config.environment);

    tracing::info!(config = ?config, args = ?args, "Loaded configuration");

    let labels_path = args
        .labels
        .clone()
        .or_else(|| config.labels_path.as_ref().map(PathBuf::from));
    let labels = match labels_path {
        Some(path) => LabelMap::from_file(path)?,
        None => LabelMap::coco(),
    };

    let transform = ViewportTransform::new(
        args.image_width,
        args.image_height,
        args.viewport_width,
        args.viewport_height,
        Rotation::try_from(args.rotation)?,
    )?;

    #[cfg(feature = "ort-backend")]
    if let Some(model) = &args.model {
        return run_model(&args, model, &config, labels, transform);
    }

    replay_tensor(&args, &config, labels, transform)
}

fn replay_tensor(
    args: &Args,
    config: &PipelineConfig,
    labels: LabelMap,
    transform: ViewportTransform,
) -> anyhow::Result<()> {
    let output = read_tensor(&args.input)?;
    let features = labels.len() + 4;
    anyhow::ensure!(
        !output.is_empty() && output.len() % features == 0,
        "Tensor holds {} values, not a multiple of {} (4 + {} classes)",
        output.len(),
        features,
        labels.len()
    );
    let shape = OutputShape {
        num_boxes: output.len() / features,
        num_classes: labels.len(),
    };
    tracing::info!(
        path = %args.input.display(),
        num_boxes = shape.num_boxes,
        num_classes = shape.num_classes,
        "Tensor loaded"
    );

    let postprocessor = PostProcessor::new(&config.detector, shape, labels);
    let screen = ScreenFilter::new(config.screen.clone(), transform);
    let mut tracker = TemporalTracker::new(config.tracker.clone());

    let start = Instant::now();
    for frame in 0..args.frames {
        let _span = common::span_debug!("replay_frame");
        let now = start + Duration::from_millis(100 * frame as u64);

        let detections = postprocessor.process(&output)?;
        let on_screen = screen.project(&detections);
        tracker.update(&on_screen, now);

        tracing::info!(
            frame,
            detections = detections.len(),
            on_screen = on_screen.len(),
            tracked = tracker.len(),
            stable = tracker.stable_count(),
            "Frame replayed"
        );
    }

    log_display(&tracker.snapshot());
    Ok(())
}

/// Drive the threaded service with an ONNX model, feeding the same frame on
/// a simulated 60 Hz render loop.
#[cfg(feature = "ort-backend")]
fn run_model(
    args: &Args,
    model: &Path,
    config: &PipelineConfig,
    labels: LabelMap,
    transform: ViewportTransform,
) -> anyhow::Result<()> {
    use detector::{Detector, OrtBackend};
    use pipeline::{CameraFrame, DetectionService};

    let path = model
        .to_str()
        .with_context(|| format!("Model path {} is not UTF-8", model.display()))?;
    let mut backend = OrtBackend::load_model_with_provider(path, args.provider, 4)?;
    backend.warm_up(config.detector.input_size)?;
    let detector = Detector::new(backend, &config.detector, labels)?;
    let mut service = DetectionService::spawn(detector, config)?;

    let pixels = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let expected = args.image_width as usize * args.image_height as usize * 3;
    anyhow::ensure!(
        pixels.len() == expected,
        "{} is {} bytes, expected {} for a {}x{} RGB frame",
        args.input.display(),
        pixels.len(),
        expected,
        args.image_width,
        args.image_height
    );

    let render_period = Duration::from_millis(16);
    let mut submitted = 0;
    while submitted < args.frames {
        let _span = common::span_debug!("render_frame");

        if service.on_render_frame(Instant::now())
            && service.submit(CameraFrame {
                pixels: pixels.clone(),
                width: args.image_width,
                height: args.image_height,
                transform,
            })
        {
            submitted += 1;
        }

        let frame = service.display_frame();
        if frame.updated {
            tracing::info!(
                generation = frame.generation,
                boxes = frame.boxes.len(),
                interval = service.interval(),
                "Display updated"
            );
        }
        std::thread::sleep(render_period);
    }

    while service.is_busy() {
        std::thread::sleep(render_period);
    }
    log_display(&service.display());
    if let Some(summary) = service.summary() {
        tracing::info!(summary = ?summary, "Detector statistics");
    }
    service.close();

    Ok(())
}

fn log_display(boxes: &[DisplayBox]) {
    for display_box in boxes {
        tracing::info!(
            id = %display_box.id,
            label = %display_box.label,
            confidence = display_box.confidence,
            left = display_box.rect.left,
            top = display_box.rect.top,
            right = display_box.rect.right,
            bottom = display_box.rect.bottom,
            stable = display_box.stable,
            "Display box"
        );
    }
}

/// Read a native-endian f32 dump.
fn read_tensor(path: &Path) -> anyhow::Result<Vec<f32>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    anyhow::ensure!(
        bytes.len() % size_of::<f32>() == 0,
        "{} is {} bytes, not a whole number of f32 values",
        path.display(),
        bytes.len()
    );

    Ok(bytemuck::pod_collect_to_vec(&bytes))
}

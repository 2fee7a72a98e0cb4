use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use frame_to_file::capture::{CaptureSource, SyntheticCamera};
use frame_to_file::config::{FormatOrientation, PipelineConfig};
use frame_to_file::frame_scale::pixel::{ElementType, PixelBuffer, PixelFormat};
use frame_to_file::persist::{FramePersister, read_persisted};
use frame_to_file::processing::{CaptureMode, FormatPolicy};
use frame_to_file::session::{AppState, FrameSession, SessionStats};
use tracing::info;

/// Capture camera frames to raw files in a managed temp directory.
#[derive(Parser, Debug)]
#[command(name = "ftf")]
#[command(about = "📸 Persist camera frames (full, resized or cropped) to raw files")]
struct Cli {
    /// JSON pipeline configuration; command-line flags override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pipeline against a synthetic camera
    Run {
        /// Camera width as reported by the device
        #[arg(long, default_value_t = 1920)]
        width: u32,

        /// Camera height as reported by the device
        #[arg(long, default_value_t = 1080)]
        height: u32,

        /// Native camera frame rate
        #[arg(long, default_value_t = 30)]
        camera_fps: u32,

        /// How long to run: 30s, 2m, 1h
        #[arg(short, long, default_value = "10s")]
        duration: String,

        #[arg(short, long, value_enum)]
        mode: Option<CaptureMode>,

        /// Run the pipeline at most this often
        #[arg(short = 'f', long)]
        target_fps: Option<f64>,

        #[arg(long)]
        resize_factor: Option<f64>,

        #[arg(long, value_enum)]
        pixel_format: Option<PixelFormat>,

        #[arg(long, value_enum)]
        element_type: Option<ElementType>,

        #[arg(long, value_enum)]
        format_policy: Option<FormatPolicy>,

        /// Frames arrive rotated to portrait; swap the reported format for geometry
        #[arg(long)]
        portrait: bool,

        /// Write bare pixel data without the 16-byte header
        #[arg(long)]
        no_header: bool,

        /// Managed output directory
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Simulate the app going to the background every N seconds
        #[arg(long)]
        background_every: Option<u64>,
    },
    /// Delete every frame file in the managed directory
    Clear {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Print the layout of a persisted frame and optionally convert it to PNG
    Inspect {
        file: PathBuf,

        #[arg(long)]
        png: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Run {
            width,
            height,
            camera_fps,
            duration,
            mode,
            target_fps,
            resize_factor,
            pixel_format,
            element_type,
            format_policy,
            portrait,
            no_header,
            dir,
            background_every,
        } => {
            if let Some(mode) = mode {
                config.mode = mode;
            }
            if target_fps.is_some() {
                config.target_fps = target_fps;
            }
            if let Some(factor) = resize_factor {
                config.resize_factor = factor;
            }
            if let Some(format) = pixel_format {
                config.pixel_format = format;
            }
            if let Some(element) = element_type {
                config.element_type = element;
            }
            if let Some(policy) = format_policy {
                config.format_policy = policy;
            }
            if portrait {
                config.orientation = FormatOrientation::Portrait;
            }
            if no_header {
                config.write_header = false;
            }
            if dir.is_some() {
                config.directory = dir;
            }
            config.validate()?;

            let seconds = parse_duration(&duration)?;
            let stats = run(
                config,
                width,
                height,
                camera_fps,
                Duration::from_secs(seconds),
                background_every.map(Duration::from_secs),
            )
            .await?;
            println!(
                "persisted {} frames ({} failed, {} throttled, {} dropped busy, {} dropped while clearing)",
                stats.persisted, stats.failed, stats.throttled, stats.dropped_busy, stats.dropped_clearing
            );
            Ok(())
        }
        Commands::Clear { dir } => {
            if dir.is_some() {
                config.directory = dir;
            }
            let persister = FramePersister::new(config.managed_directory(), config.write_header);
            let report = persister
                .initialize()
                .with_context(|| format!("clearing {}", persister.directory().display()))?;
            for failure in &report.failures {
                eprintln!("warning: {}", failure);
            }
            println!(
                "Took {}ms to delete {} files",
                report.elapsed.as_millis(),
                report.deleted
            );
            Ok(())
        }
        Commands::Inspect { file, png } => inspect(&file, png.as_deref()),
    }
}

async fn run(
    config: PipelineConfig,
    width: u32,
    height: u32,
    camera_fps: u32,
    duration: Duration,
    background_every: Option<Duration>,
) -> Result<SessionStats> {
    if camera_fps == 0 {
        return Err(anyhow!("camera fps must be greater than 0"));
    }
    let mut camera = SyntheticCamera::new(width, height)?;
    let (path_tx, mut path_rx) = tokio::sync::watch::channel::<Option<PathBuf>>(None);

    let session = FrameSession::builder(config)
        .with_reported_format(camera.reported_format())
        .with_path_sink(path_tx)
        .build()
        .context("starting frame session")?;

    // Display side: only ever shows the newest file.
    let preview = tokio::spawn(async move {
        while path_rx.changed().await.is_ok() {
            if let Some(path) = path_rx.borrow_and_update().clone() {
                info!(uri = %format!("file://{}", path.display()), "preview updated");
            }
        }
    });

    let stop = Arc::new(AtomicBool::new(false));
    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_stop.store(true, Ordering::Release);
        }
    });

    let frame_time = Duration::from_secs_f64(1.0 / camera_fps as f64);
    let stats = tokio::task::spawn_blocking(move || -> Result<SessionStats> {
        let start = Instant::now();
        let end_time = start + duration;
        let mut last_background = start;
        while Instant::now() < end_time && !stop.load(Ordering::Acquire) {
            let t0 = Instant::now();
            if let Some(every) = background_every {
                if t0.duration_since(last_background) >= every {
                    session.on_app_state(AppState::Background);
                    session.on_app_state(AppState::Active);
                    last_background = t0;
                }
            }
            match camera.next_frame()? {
                Some(frame) => {
                    session.submit(frame);
                }
                None => break,
            }
            if let Some(rest) = frame_time.checked_sub(t0.elapsed()) {
                std::thread::sleep(rest);
            }
        }
        Ok(session.stop()?)
    })
    .await
    .context("camera thread panicked")??;

    preview.abort();
    Ok(stats)
}

fn inspect(file: &Path, png: Option<&Path>) -> Result<()> {
    let buffer = read_persisted(file).with_context(|| format!("reading {}", file.display()))?;
    let meta = buffer.meta();
    println!(
        "{}: {}x{} {}/{} ({} bytes)",
        file.display(),
        meta.width,
        meta.height,
        meta.pixel_format,
        meta.element_type,
        buffer.len()
    );
    if let Some(out) = png {
        let image = to_rgba(&buffer)?;
        image
            .save(out)
            .with_context(|| format!("writing {}", out.display()))?;
        println!("wrote {}", out.display());
    }
    Ok(())
}

/// Convert any persisted layout to 8-bit RGBA for a human preview.
fn to_rgba(buffer: &PixelBuffer) -> Result<image::RgbaImage> {
    let meta = buffer.meta();
    let values: Vec<u8> = match meta.element_type {
        ElementType::Uint8 => buffer.as_bytes().to_vec(),
        ElementType::Float32 => buffer
            .as_bytes()
            .chunks_exact(4)
            .map(|b| {
                let v = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                (v.clamp(0.0, 1.0) * 255.0).round() as u8
            })
            .collect(),
    };
    let mut rgba = Vec::with_capacity(meta.width as usize * meta.height as usize * 4);
    match meta.pixel_format {
        PixelFormat::Argb => {
            for px in values.chunks_exact(4) {
                rgba.extend_from_slice(&[px[1], px[2], px[3], px[0]]);
            }
        }
        PixelFormat::Rgb => {
            for px in values.chunks_exact(3) {
                rgba.extend_from_slice(&[px[0], px[1], px[2], 0xff]);
            }
        }
    }
    image::RgbaImage::from_raw(meta.width, meta.height, rgba)
        .ok_or_else(|| anyhow!("pixel data does not fill {}x{}", meta.width, meta.height))
}

/// Parse duration string like "30s", "2m", "1h" into seconds
fn parse_duration(duration: &str) -> Result<u64> {
    if let Ok(seconds) = duration.parse::<u64>() {
        return Ok(seconds);
    }

    let Some((split, unit)) = duration.char_indices().last() else {
        return Err(anyhow!("Invalid duration format: {}", duration));
    };
    if split == 0 {
        return Err(anyhow!("Invalid duration format: {}", duration));
    }

    let num_str = &duration[..split];
    let num: u64 = num_str
        .parse()
        .map_err(|_| anyhow!("Invalid number in duration: {}", num_str))?;

    match unit {
        's' => Ok(num),
        'm' => Ok(num * 60),
        'h' => Ok(num * 3600),
        _ => Err(anyhow!(
            "Invalid duration unit: {}. Use 's' for seconds, 'm' for minutes, 'h' for hours",
            unit
        )),
    }
}

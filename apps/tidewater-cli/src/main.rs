mod demo;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use glam::Vec3;
use tidewater_assets::{AssetLoader, FileLoader};
use tidewater_common::CameraState;
use tidewater_render::{DebugTextRenderer, FrameLoop, Image, Renderer, SceneConfig};
use tidewater_render_wgpu::GpuRenderer;
use tidewater_shade::{Field, compile, emit_wgsl};
use tidewater_underwater::UnderwaterTracker;
use tidewater_water::{DepthCompositor, WaterSurface, project_caustics};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tidewater-cli", about = "Headless driver for tidewater water scenes")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate info
    Info,
    /// Render frames and write the last one as PNG
    Render {
        /// Output PNG path
        #[arg(short, long, default_value = "frame.png")]
        out: PathBuf,
        /// Number of frames to simulate before writing
        #[arg(short, long, default_value = "1")]
        frames: u32,
        /// Frames per simulated second
        #[arg(long, default_value = "30")]
        fps: f32,
        /// Camera height above the water plane
        #[arg(long, default_value = "5", allow_negative_numbers = true)]
        camera_height: f32,
        #[command(flatten)]
        scene: SceneArgs,
        /// Composite on the GPU, falling back to the CPU if unavailable
        #[arg(long)]
        gpu: bool,
    },
    /// Print the text summary of one frame
    Inspect {
        #[arg(long, default_value = "5", allow_negative_numbers = true)]
        camera_height: f32,
        #[command(flatten)]
        scene: SceneArgs,
    },
    /// Print the emitted WGSL of one of the scene's fields
    Wgsl {
        #[arg(value_enum, default_value = "post")]
        target: WgslTarget,
        /// Scene config JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Classify camera heights against the water plane
    Classify {
        #[arg(required = true, allow_negative_numbers = true)]
        heights: Vec<f32>,
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        water: f32,
        /// Seconds of overlay smoothing per height
        #[arg(long, default_value = "0.5")]
        dwell: f32,
    },
}

#[derive(clap::Args)]
struct SceneArgs {
    /// Scene config JSON
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Scene description JSON; the built-in cove when omitted
    #[arg(short, long)]
    scene: Option<PathBuf>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum WgslTarget {
    Water,
    Caustics,
    Post,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("tidewater-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("shade: {}", tidewater_shade::crate_info());
            println!("assets: {}", tidewater_assets::crate_info());
            println!("render: {}", tidewater_render::crate_info());
        }
        Commands::Render {
            out,
            frames,
            fps,
            camera_height,
            scene,
            gpu,
        } => {
            let config = load_config(&scene)?;
            let camera = camera_at(&config, camera_height);
            let image = if gpu {
                match GpuRenderer::headless(config.viewport) {
                    Ok(renderer) => {
                        tracing::info!(adapter = renderer.adapter_name(), "rendering on the GPU");
                        let mut frame_loop = FrameLoop::new(config, renderer);
                        let image = run(&mut frame_loop, &scene, camera, frames, fps)?;
                        if let Some(reason) = frame_loop.renderer().disabled_reason() {
                            tracing::warn!(reason, "GPU composite was not used");
                        }
                        image
                    }
                    Err(err) => {
                        tracing::warn!(%err, "no GPU available, rendering on the CPU");
                        run(&mut FrameLoop::cpu(config), &scene, camera, frames, fps)?
                    }
                }
            } else {
                run(&mut FrameLoop::cpu(config), &scene, camera, frames, fps)?
            };
            save_png(&image, &out)?;
            println!(
                "Wrote {}x{} frame to {}",
                image.width,
                image.height,
                out.display()
            );
        }
        Commands::Inspect {
            camera_height,
            scene,
        } => {
            let config = load_config(&scene)?;
            let camera = camera_at(&config, camera_height);
            let mut frame_loop = FrameLoop::new(config, DebugTextRenderer::new());
            let summary = run(&mut frame_loop, &scene, camera, 1, 30.0)?;
            print!("{summary}");
        }
        Commands::Wgsl { target, config } => {
            let config = match config {
                Some(path) => SceneConfig::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => SceneConfig::default(),
            };
            println!("{}", wgsl_for(target, &config)?);
        }
        Commands::Classify {
            heights,
            water,
            dwell,
        } => {
            let config = SceneConfig::default();
            let mut tracker = UnderwaterTracker::new(water, config.overlay);
            println!("{:>10}  {:<6}  {:>7}", "height", "state", "overlay");
            for height in heights {
                let update = tracker.update(height, dwell);
                println!(
                    "{:>10.3}  {:<6}  {:>7.3}{}",
                    height,
                    update.classification.to_string(),
                    update.overlay_opacity,
                    if update.changed { "  (crossed)" } else { "" }
                );
            }
            println!("Transitions: {}", tracker.transitions());
        }
    }

    Ok(())
}

fn load_config(args: &SceneArgs) -> anyhow::Result<SceneConfig> {
    let mut config = match &args.config {
        Some(path) => SceneConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SceneConfig::default(),
    };
    if let Some(width) = args.width {
        config.viewport.width = width;
    }
    if let Some(height) = args.height {
        config.viewport.height = height;
    }
    anyhow::ensure!(
        !config.viewport.is_empty(),
        "viewport {}x{} has no pixels",
        config.viewport.width,
        config.viewport.height
    );
    Ok(config)
}

/// Orbit-style pose: looking at the water from above, slightly down from below.
fn camera_at(config: &SceneConfig, height: f32) -> CameraState {
    let water = config.water.height;
    let eye = Vec3::new(0.0, water + height, 10.0);
    let target = if height >= 0.0 {
        Vec3::new(0.0, water, 0.0)
    } else {
        Vec3::new(0.0, eye.y - 1.0, 0.0)
    };
    config.camera.at(eye).looking_at(target)
}

fn run<R: Renderer>(
    frame_loop: &mut FrameLoop<R>,
    args: &SceneArgs,
    camera: CameraState,
    frames: u32,
    fps: f32,
) -> anyhow::Result<R::Output> {
    match &args.scene {
        Some(path) => {
            let (root, file) = split_scene_path(path)?;
            let loader = FileLoader::new(root).with_policy(frame_loop.config().tagging);
            load(frame_loop, &loader, &file)?;
        }
        None => load(frame_loop, &demo::demo_loader(), demo::DEMO_ID)?,
    }

    anyhow::ensure!(fps > 0.0, "fps must be positive");
    let frames = frames.max(1);
    for frame in 0..frames - 1 {
        frame_loop.update(frame as f32 / fps, camera)?;
        frame_loop.present_frame()?;
    }
    frame_loop.update((frames - 1) as f32 / fps, camera)?;
    Ok(frame_loop.present_frame()?)
}

fn load<R: Renderer>(
    frame_loop: &mut FrameLoop<R>,
    loader: &dyn AssetLoader,
    identifier: &str,
) -> anyhow::Result<()> {
    frame_loop
        .load(loader, identifier)
        .with_context(|| format!("loading scene '{identifier}'"))
}

fn split_scene_path(path: &Path) -> anyhow::Result<(PathBuf, String)> {
    let file = path
        .file_name()
        .and_then(|f| f.to_str())
        .with_context(|| format!("not a scene file: {}", path.display()))?
        .to_string();
    let root = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((root, file))
}

fn wgsl_for(target: WgslTarget, config: &SceneConfig) -> anyhow::Result<String> {
    let post = tidewater_post::PostCompositor::try_new(config.passes.clone(), config.post);
    match target {
        WgslTarget::Post => {
            let post = post.context("building the post-process composite")?;
            post.wgsl().context("post-processing is disabled")
        }
        WgslTarget::Water => {
            let surface = WaterSurface::from_config(config.water.clone())?;
            let shading = DepthCompositor::from_config(&config.water).build(&surface)?;
            Ok(emit_wgsl(&compile(&shading.output)?))
        }
        WgslTarget::Caustics => {
            let surface = WaterSurface::from_config(config.water.clone())?;
            let base = Field::screen_uv().sample_scene_color()?;
            let caustics = project_caustics(&surface, &base)?;
            Ok(emit_wgsl(&compile(&caustics.color)?))
        }
    }
}

fn save_png(image: &Image, path: &Path) -> anyhow::Result<()> {
    let buffer = image::RgbaImage::from_raw(image.width, image.height, image.to_rgba8())
        .context("frame buffer does not match its dimensions")?;
    buffer
        .save(path)
        .with_context(|| format!("writing {}", path.display()))
}

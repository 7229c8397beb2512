//! Framefx CLI: apply a color matrix to an image on the GPU.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use framefx::frame::{PixelFormat, VideoFrame};
use framefx::gpu::GpuContext;
use framefx::matrix::{self, ColorMatrix, ColorMatrixProvider, MatrixFade, StaticColorMatrix};
use framefx::stage::{ColorMatrixTextureStage, TextureStage};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Built-in color matrix presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Filter {
    /// Pass colors through unchanged
    Identity,
    /// BT.709 luma grayscale
    Grayscale,
    /// Invert R, G and B
    Invert,
}

impl Filter {
    fn matrix(self) -> ColorMatrix {
        match self {
            Filter::Identity => matrix::identity(),
            Filter::Grayscale => matrix::grayscale(),
            Filter::Invert => matrix::inverted(),
        }
    }
}

/// Apply a color matrix to an image on the GPU.
#[derive(Parser, Debug)]
#[command(name = "framefx")]
#[command(about = "Apply a color matrix to an image on the GPU")]
struct Args {
    /// Input image path
    input: PathBuf,

    /// Output image path
    output: PathBuf,

    /// Color matrix preset
    #[arg(short, long, value_enum, default_value = "grayscale")]
    filter: Filter,

    /// Fade from identity to the preset over this many microseconds
    #[arg(long)]
    fade_us: Option<i64>,

    /// Presentation timestamp of the frame in microseconds
    #[arg(long, default_value = "0")]
    time_us: i64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let img = image::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    let frame = VideoFrame::from_data(width, height, PixelFormat::Rgba, img.into_raw());
    info!("Loaded {} ({}x{})", args.input.display(), width, height);

    let gpu = GpuContext::new()?;

    let provider: Arc<dyn ColorMatrixProvider> = match args.fade_us {
        Some(length_us) => Arc::new(MatrixFade::new(
            matrix::identity(),
            args.filter.matrix(),
            0,
            length_us,
        )),
        None => Arc::new(StaticColorMatrix(args.filter.matrix())),
    };
    let mut stage = ColorMatrixTextureStage::new(&gpu, provider, false)?;

    let (out_width, out_height) = stage.configure(width, height);
    let input_texture = gpu.upload_frame(&frame);
    let input_view = input_texture.create_view(&wgpu::TextureViewDescriptor::default());
    let target = gpu.create_target(out_width, out_height, stage.output_format());
    let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

    stage.draw_frame(&input_view, &target_view, args.time_us)?;
    let result = gpu.read_target(&target)?;

    image::RgbaImage::from_raw(result.width, result.height, result.data)
        .context("result buffer did not match output dimensions")?
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!("Wrote {}", args.output.display());

    Ok(())
}

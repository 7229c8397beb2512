//! Single-frame GPU texture processing stages.
//!
//! Every effect stage consumes one input texture and draws one output frame
//! into a caller-provided render target. Stages are interchangeable through
//! [`TextureStage`]; the caller owns the output target and any
//! synchronization after submission.

mod color_matrix;

pub use color_matrix::ColorMatrixTextureStage;

use thiserror::Error;

/// A named shader source, identified by its logical asset path.
#[derive(Debug, Clone, Copy)]
pub struct ShaderAsset<'a> {
    pub path: &'a str,
    pub source: &'a str,
}

/// Trait for single-input/single-output frame processing stages.
pub trait TextureStage {
    /// Report the output dimensions for a given input size.
    ///
    /// Pure; stages that do not resample return the input size unchanged.
    fn configure(&self, input_width: u32, input_height: u32) -> (u32, u32);

    /// Draw the frame at `presentation_time_us`, sampling `input` and
    /// rendering a full-frame quad into `target`.
    ///
    /// The caller binds the output target by passing its view and remains
    /// responsible for submitting-order and synchronization concerns. A
    /// failed draw leaves the stage usable for subsequent frames.
    fn draw_frame(
        &mut self,
        input: &wgpu::TextureView,
        target: &wgpu::TextureView,
        presentation_time_us: i64,
    ) -> Result<(), DrawError>;
}

/// Construction-time stage failure. Fatal to the stage being built.
#[derive(Debug, Error)]
pub enum SetupError {
    /// A shader asset failed to parse or validate.
    #[error("shader asset {path} failed to compile: {message}")]
    ShaderCompile { path: String, message: String },

    /// The device rejected a stage resource (pipeline, buffer, sampler).
    #[error("graphics device rejected stage resources")]
    Resource {
        #[source]
        source: wgpu::Error,
    },
}

/// Per-frame draw failure, tagged with the failing frame's presentation
/// timestamp. Recoverable: the stage stays usable afterwards.
#[derive(Debug, Error)]
pub enum DrawError {
    /// The matrix provider returned non-finite values.
    #[error("color matrix for frame at {presentation_time_us} us contains non-finite values")]
    NonFiniteMatrix { presentation_time_us: i64 },

    /// A graphics call failed while drawing the frame.
    #[error("graphics error while drawing frame at {presentation_time_us} us")]
    Graphics {
        presentation_time_us: i64,
        #[source]
        source: wgpu::Error,
    },
}

impl DrawError {
    /// Presentation timestamp of the frame that failed to draw.
    pub fn presentation_time_us(&self) -> i64 {
        match self {
            DrawError::NonFiniteMatrix {
                presentation_time_us,
            }
            | DrawError::Graphics {
                presentation_time_us,
                ..
            } => *presentation_time_us,
        }
    }
}

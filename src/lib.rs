//! Framefx: GPU color-matrix frame effect stage
//!
//! Applies a per-frame 4x4 color transformation matrix to an input texture
//! and draws the transformed frame into a caller-provided render target.

pub mod frame;
pub mod gpu;
pub mod matrix;
pub mod stage;

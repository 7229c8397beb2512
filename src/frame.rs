//! Video frame types and full-frame quad geometry.

use bytemuck::{Pod, Zeroable};

/// Supported pixel formats for CPU-side video frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// RGB with 8 bits per channel (24 bits per pixel)
    Rgb,
    /// RGBA with 8 bits per channel (32 bits per pixel)
    Rgba,
}

impl PixelFormat {
    /// Returns the number of bytes per pixel.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }
}

/// A video frame containing image data.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel format of the frame data
    pub format: PixelFormat,
    /// Presentation timestamp in microseconds (if available)
    pub timestamp_us: Option<i64>,
    /// Raw pixel data
    pub data: Vec<u8>,
}

impl VideoFrame {
    /// Creates a new zero-filled video frame with the given dimensions and format.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let size = (width as usize) * (height as usize) * format.bytes_per_pixel();
        Self {
            width,
            height,
            format,
            timestamp_us: None,
            data: vec![0; size],
        }
    }

    /// Creates a video frame from existing data.
    pub fn from_data(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            timestamp_us: None,
            data,
        }
    }

    /// Converts this frame to RGBA format.
    pub fn to_rgba(&self) -> VideoFrame {
        if self.format == PixelFormat::Rgba {
            return self.clone();
        }

        // RGB -> RGBA: add alpha=255, no color conversion needed
        let pixel_count = (self.width as usize) * (self.height as usize);
        let mut rgba_data = vec![0u8; pixel_count * 4];
        for i in 0..pixel_count {
            rgba_data[i * 4] = self.data[i * 3];
            rgba_data[i * 4 + 1] = self.data[i * 3 + 1];
            rgba_data[i * 4 + 2] = self.data[i * 3 + 2];
            rgba_data[i * 4 + 3] = 255;
        }

        VideoFrame {
            width: self.width,
            height: self.height,
            format: PixelFormat::Rgba,
            timestamp_us: self.timestamp_us,
            data: rgba_data,
        }
    }
}

/// Vertex for rendering a full-frame quad.
///
/// Positions are homogeneous NDC coordinates; texture coordinates are derived
/// in the vertex shader, so no second attribute is needed.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct FrameVertex {
    pub position: [f32; 4],
}

impl FrameVertex {
    /// The full NDC range [-1,1]x[-1,1] as a 4-vertex triangle strip.
    pub const VERTICES: &'static [FrameVertex] = &[
        FrameVertex { position: [-1.0, -1.0, 0.0, 1.0] },
        FrameVertex { position: [1.0, -1.0, 0.0, 1.0] },
        FrameVertex { position: [-1.0, 1.0, 0.0, 1.0] },
        FrameVertex { position: [1.0, 1.0, 0.0, 1.0] },
    ];

    /// Returns the vertex buffer layout.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<FrameVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x4,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_to_rgba_conversion() {
        let rgb_data = vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255];
        let frame = VideoFrame::from_data(2, 2, PixelFormat::Rgb, rgb_data);
        let rgba_frame = frame.to_rgba();

        assert_eq!(rgba_frame.format, PixelFormat::Rgba);
        assert_eq!(rgba_frame.data.len(), 16);
        // Check first pixel (red)
        assert_eq!(&rgba_frame.data[0..4], &[255, 0, 0, 255]);
        // Check second pixel (green)
        assert_eq!(&rgba_frame.data[4..8], &[0, 255, 0, 255]);
    }

    #[test]
    fn test_rgba_to_rgba_is_identity() {
        let data = vec![1, 2, 3, 4, 5, 6, 7, 8];
        let frame = VideoFrame::from_data(2, 1, PixelFormat::Rgba, data.clone());
        assert_eq!(frame.to_rgba().data, data);
    }

    #[test]
    fn test_quad_strip_covers_ndc_corners() {
        // Strip order: two triangles sharing the middle edge span the whole
        // [-1,1]x[-1,1] range.
        let corners: Vec<[f32; 2]> = FrameVertex::VERTICES
            .iter()
            .map(|v| [v.position[0], v.position[1]])
            .collect();
        assert_eq!(
            corners,
            vec![[-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0], [1.0, 1.0]]
        );
        for v in FrameVertex::VERTICES {
            assert_eq!(v.position[2], 0.0);
            assert_eq!(v.position[3], 1.0);
        }
    }
}

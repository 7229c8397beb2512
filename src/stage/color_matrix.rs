//! Color-matrix texture stage.

use super::{DrawError, SetupError, ShaderAsset, TextureStage};
use crate::frame::FrameVertex;
use crate::gpu::GpuContext;
use crate::matrix::{self, ColorMatrixProvider};
use naga::valid::{Capabilities, ValidationFlags, Validator};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{info, trace};
use wgpu::util::DeviceExt;

const VERTEX_SHADER: ShaderAsset<'static> = ShaderAsset {
    path: "shaders/quad_transform.wgsl",
    source: include_str!("../../shaders/quad_transform.wgsl"),
};

const FRAGMENT_SHADER: ShaderAsset<'static> = ShaderAsset {
    path: "shaders/color_matrix.wgsl",
    source: include_str!("../../shaders/color_matrix.wgsl"),
};

/// Uniform block shared with the sibling spatial-transform vertex stage.
///
/// The two transformation matrices stay at identity here; only the color
/// matrix changes per frame.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct FrameUniforms {
    transformation_matrix: [f32; 16],
    tex_transformation_matrix: [f32; 16],
    color_matrix: [f32; 16],
}

/// Applies a per-frame 4x4 color matrix to each input frame.
///
/// The stage owns its shader program and static quad geometry; input frames
/// and the output target are owned by the caller. All work happens on the
/// calling thread, one frame per [`TextureStage::draw_frame`] call.
pub struct ColorMatrixTextureStage {
    device: wgpu::Device,
    queue: wgpu::Queue,
    provider: Arc<dyn ColorMatrixProvider>,
    render_pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    target_format: wgpu::TextureFormat,
}

impl std::fmt::Debug for ColorMatrixTextureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // `provider` is a trait object without a `Debug` bound, so format the
        // remaining fields and mark the struct non-exhaustive.
        f.debug_struct("ColorMatrixTextureStage")
            .field("target_format", &self.target_format)
            .finish_non_exhaustive()
    }
}

impl ColorMatrixTextureStage {
    /// Build the stage from the bundled shader assets.
    ///
    /// `use_hdr` selects a float16 render target format for high dynamic
    /// range frames; transfer functions are the caller's concern.
    pub fn new(
        gpu: &GpuContext,
        provider: Arc<dyn ColorMatrixProvider>,
        use_hdr: bool,
    ) -> Result<Self, SetupError> {
        Self::from_shader_sources(gpu, provider, use_hdr, VERTEX_SHADER, FRAGMENT_SHADER)
    }

    /// Build the stage from explicit shader sources.
    ///
    /// The vertex shader must expose the `frame_position` attribute and the
    /// two spatial transformation matrices; the fragment shader must sample
    /// the frame texture and apply the color matrix.
    pub fn from_shader_sources(
        gpu: &GpuContext,
        provider: Arc<dyn ColorMatrixProvider>,
        use_hdr: bool,
        vertex: ShaderAsset<'_>,
        fragment: ShaderAsset<'_>,
    ) -> Result<Self, SetupError> {
        let device = gpu.device.clone();
        let queue = gpu.queue.clone();

        let target_format = if use_hdr {
            wgpu::TextureFormat::Rgba16Float
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        };

        let vertex_module = compile_shader(&device, &vertex)?;
        let fragment_module = compile_shader(&device, &fragment)?;

        let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Color Matrix Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Color Matrix Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Color Matrix Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("vs_main"),
                buffers: &[FrameVertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Vertex Buffer"),
            contents: bytemuck::cast_slice(FrameVertex::VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        // Both spatial matrices start (and stay) at identity.
        let uniforms = FrameUniforms {
            transformation_matrix: matrix::identity(),
            tex_transformation_matrix: matrix::identity(),
            color_matrix: matrix::identity(),
        };
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Frame Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Frame Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        if let Some(source) = pollster::block_on(error_scope.pop()) {
            return Err(SetupError::Resource { source });
        }

        info!("Color matrix stage ready (hdr: {})", use_hdr);

        Ok(Self {
            device,
            queue,
            provider,
            render_pipeline,
            vertex_buffer,
            uniform_buffer,
            bind_group_layout,
            sampler,
            target_format,
        })
    }

    /// The texture format output targets must use with this stage.
    pub fn output_format(&self) -> wgpu::TextureFormat {
        self.target_format
    }
}

impl TextureStage for ColorMatrixTextureStage {
    fn configure(&self, input_width: u32, input_height: u32) -> (u32, u32) {
        // A color transform never changes spatial dimensions.
        (input_width, input_height)
    }

    fn draw_frame(
        &mut self,
        input: &wgpu::TextureView,
        target: &wgpu::TextureView,
        presentation_time_us: i64,
    ) -> Result<(), DrawError> {
        let color_matrix = self.provider.matrix(presentation_time_us);
        if !matrix::is_finite(&color_matrix) {
            return Err(DrawError::NonFiniteMatrix {
                presentation_time_us,
            });
        }

        let out_of_memory_scope = self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let validation_scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let uniforms = FrameUniforms {
            transformation_matrix: matrix::identity(),
            tex_transformation_matrix: matrix::identity(),
            color_matrix,
        };
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Color Matrix Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(input),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Color Matrix Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Color Matrix Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            // The four-vertex triangle strip forms the full-frame quad.
            render_pass.draw(0..4, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));

        let validation = pollster::block_on(validation_scope.pop());
        let out_of_memory = pollster::block_on(out_of_memory_scope.pop());
        if let Some(source) = validation.or(out_of_memory) {
            return Err(DrawError::Graphics {
                presentation_time_us,
                source,
            });
        }

        trace!("Drew frame at {} us", presentation_time_us);
        Ok(())
    }
}

/// Parse and validate a WGSL asset, then hand it to the device.
fn compile_shader(
    device: &wgpu::Device,
    asset: &ShaderAsset<'_>,
) -> Result<wgpu::ShaderModule, SetupError> {
    let module = naga::front::wgsl::parse_str(asset.source).map_err(|e| {
        SetupError::ShaderCompile {
            path: asset.path.to_string(),
            message: e.emit_to_string(asset.source),
        }
    })?;

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    validator
        .validate(&module)
        .map_err(|e| SetupError::ShaderCompile {
            path: asset.path.to_string(),
            message: format!("{:?}", e),
        })?;

    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(asset.path),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(asset.source)),
    }))
}

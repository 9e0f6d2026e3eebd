//! Offscreen wgpu backend: creates/caches a `wgpu::RenderPipeline` per
//! (program, render state, vertex layout) and renders into an RGBA8 target
//! the size of the embedded frame buffer.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::mpsc;

use bytemuck::{Pod, Zeroable};
use log::{debug, info};
use wgpu::util::DeviceExt;
use wgpu::*;

use crate::config::ShimConfig;
use crate::error::BackendError;
use crate::graphics::backend::{
    AttrFormat, AttrSemantic, BlendTerm, DrawSubmission, RenderBackend, RenderState,
    TextureHandle, Topology, VertexLayout,
};
use crate::graphics::gx::state::CompareFunction as GxCompare;
use crate::graphics::gx::tev::ShaderProgram;

const TARGET_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth24Plus;

/// Declarations shared by every vertex and fragment module.
const PRELUDE: &str = "
struct GxUniforms {
    transform: mat4x4<f32>,
    blend_a: vec4<f32>,
    blend_b: vec4<f32>,
    factor_from_alpha: u32,
}

@group(0) @binding(0) var<uniform> gx: GxUniforms;
@group(0) @binding(1) var gx_texture: texture_2d<f32>;
@group(0) @binding(2) var gx_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) uv: vec2<f32>,
}
";

/// Uniform block matching `GxUniforms` in the prelude.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct GxUniforms {
    /// Column-major, as WGSL expects.
    transform: [[f32; 4]; 4],
    blend_a: [f32; 4],
    blend_b: [f32; 4],
    factor_from_alpha: u32,
    _pad: [u32; 3],
}

impl GxUniforms {
    fn new(draw: &DrawSubmission<'_>) -> Self {
        let m = &draw.transform;
        let transform = std::array::from_fn(|col| std::array::from_fn(|row| m[row * 4 + col]));
        Self {
            transform,
            blend_a: draw.constants.blend_a,
            blend_b: draw.constants.blend_b,
            factor_from_alpha: draw.constants.factor_from_alpha as u32,
            _pad: [0; 3],
        }
    }
}

/// Key derived from a submission that determines which pipeline to use.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub program: ShaderProgram,
    pub state: RenderState,
    pub layout: VertexLayout,
}

/// Full WGSL module for a program. Vertex inputs missing from the layout
/// are replaced by constants: white for color, zero for texture coordinates.
pub fn shader_source(program: ShaderProgram, has_color: bool, has_uv: bool) -> String {
    let mut src = String::from(PRELUDE);
    src.push_str("\nstruct VertexInput {\n    @location(0) position: vec3<f32>,\n");
    if has_color {
        src.push_str("    @location(1) color: vec4<f32>,\n");
    }
    if has_uv {
        src.push_str("    @location(2) uv: vec2<f32>,\n");
    }
    src.push_str("}\n\n@vertex\nfn vs_main(v: VertexInput) -> VertexOutput {\n");
    src.push_str("    var out: VertexOutput;\n");
    src.push_str("    out.position = gx.transform * vec4<f32>(v.position, 1.0);\n");
    src.push_str(if has_color {
        "    out.color = v.color;\n"
    } else {
        "    out.color = vec4<f32>(1.0);\n"
    });
    src.push_str(if has_uv {
        "    out.uv = v.uv;\n"
    } else {
        "    out.uv = vec2<f32>(0.0);\n"
    });
    src.push_str("    return out;\n}\n\n");
    src.push_str(program.descriptor().fragment_wgsl);
    src
}

fn vertex_format(format: AttrFormat) -> VertexFormat {
    match format {
        AttrFormat::Float32x2 => VertexFormat::Float32x2,
        AttrFormat::Float32x3 => VertexFormat::Float32x3,
        AttrFormat::Unorm8x4 => VertexFormat::Unorm8x4,
    }
}

fn blend_factor(term: BlendTerm) -> BlendFactor {
    match term {
        BlendTerm::Zero => BlendFactor::Zero,
        BlendTerm::One => BlendFactor::One,
        BlendTerm::SrcColor => BlendFactor::Src,
        BlendTerm::InvSrcColor => BlendFactor::OneMinusSrc,
        BlendTerm::DstColor => BlendFactor::Dst,
        BlendTerm::InvDstColor => BlendFactor::OneMinusDst,
        BlendTerm::SrcAlpha => BlendFactor::SrcAlpha,
        BlendTerm::InvSrcAlpha => BlendFactor::OneMinusSrcAlpha,
        BlendTerm::DstAlpha => BlendFactor::DstAlpha,
        BlendTerm::InvDstAlpha => BlendFactor::OneMinusDstAlpha,
    }
}

fn compare_function(func: GxCompare) -> CompareFunction {
    match func {
        GxCompare::Never => CompareFunction::Never,
        GxCompare::Less => CompareFunction::Less,
        GxCompare::Equal => CompareFunction::Equal,
        GxCompare::LessEqual => CompareFunction::LessEqual,
        GxCompare::Greater => CompareFunction::Greater,
        GxCompare::NotEqual => CompareFunction::NotEqual,
        GxCompare::GreaterEqual => CompareFunction::GreaterEqual,
        GxCompare::Always => CompareFunction::Always,
    }
}

fn primitive_topology(topology: Topology) -> PrimitiveTopology {
    match topology {
        Topology::TriangleList => PrimitiveTopology::TriangleList,
        Topology::TriangleStrip => PrimitiveTopology::TriangleStrip,
        Topology::LineList => PrimitiveTopology::LineList,
        Topology::LineStrip => PrimitiveTopology::LineStrip,
        Topology::PointList => PrimitiveTopology::PointList,
    }
}

/// GX treats clockwise triangles as front-facing.
fn cull_face(state: RenderState) -> Option<Face> {
    if state.contains(RenderState::CULL_CW) {
        Some(Face::Front)
    } else if state.contains(RenderState::CULL_CCW) {
        Some(Face::Back)
    } else {
        None
    }
}

fn color_writes(state: RenderState) -> ColorWrites {
    let mut mask = ColorWrites::empty();
    if state.contains(RenderState::WRITE_RGB) {
        mask |= ColorWrites::COLOR;
    }
    if state.contains(RenderState::WRITE_A) {
        mask |= ColorWrites::ALPHA;
    }
    mask
}

fn shader_location(semantic: AttrSemantic) -> Option<u32> {
    match semantic {
        AttrSemantic::Position => Some(0),
        AttrSemantic::Color0 => Some(1),
        AttrSemantic::TexCoord(0) => Some(2),
        _ => None,
    }
}

struct GpuTexture {
    texture: Texture,
    view: TextureView,
}

fn upload_texture(
    device: &Device,
    queue: &Queue,
    width: u32,
    height: u32,
    rgba: &[u8],
) -> GpuTexture {
    let size = Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&TextureDescriptor {
        label: Some("GX Texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: TextureFormat::Rgba8Unorm,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: Origin3d::ZERO,
            aspect: TextureAspect::All,
        },
        rgba,
        ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        size,
    );
    let view = texture.create_view(&TextureViewDescriptor::default());
    GpuTexture { texture, view }
}

/// Render backend drawing into an offscreen wgpu target.
pub struct WgpuBackend {
    device: Device,
    queue: Queue,
    width: u32,
    height: u32,
    target: Texture,
    target_view: TextureView,
    depth_view: TextureView,
    bind_group_layout: BindGroupLayout,
    pipeline_layout: PipelineLayout,
    sampler: Sampler,
    white: GpuTexture,
    pipelines: HashMap<PipelineKey, RenderPipeline>,
    textures: HashMap<TextureHandle, GpuTexture>,
    next_handle: u32,
    max_texture_size: u32,
    clear_color: Color,
    clear_pending: bool,
}

impl WgpuBackend {
    /// Open a headless device and allocate a `width` x `height` target.
    pub fn new(width: u32, height: u32) -> Result<Self, BackendError> {
        let instance = Instance::new(InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&RequestAdapterOptions {
            power_preference: PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| BackendError::DeviceUnavailable("no suitable GPU adapter".into()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &DeviceDescriptor {
                label: Some("gxshim"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_defaults(),
            },
            None,
        ))
        .map_err(|e| BackendError::DeviceUnavailable(e.to_string()))?;

        info!(
            "wgpu backend on {} ({}x{} target)",
            adapter.get_info().name,
            width,
            height
        );
        Ok(Self::with_device(device, queue, width, height))
    }

    /// Backend sized to the configured frame buffer.
    pub fn from_config(config: &ShimConfig) -> Result<Self, BackendError> {
        Self::new(config.efb_width, config.efb_height)
    }

    fn with_device(device: Device, queue: Queue, width: u32, height: u32) -> Self {
        let size = Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let target = device.create_texture(&TextureDescriptor {
            label: Some("GX Target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&TextureViewDescriptor::default());
        let depth = device.create_texture(&TextureDescriptor {
            label: Some("GX Depth"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth.create_view(&TextureViewDescriptor::default());

        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("GX Bind Group Layout"),
            entries: &[
                // Binding 0: uniform buffer (transform + blend constants)
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Binding 1: texture
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Binding 2: sampler
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("GX Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("GX Sampler"),
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            ..Default::default()
        });
        let white = upload_texture(&device, &queue, 1, 1, &[255; 4]);
        let max_texture_size = device.limits().max_texture_dimension_2d;

        Self {
            device,
            queue,
            width,
            height,
            target,
            target_view,
            depth_view,
            bind_group_layout,
            pipeline_layout,
            sampler,
            white,
            pipelines: HashMap::new(),
            textures: HashMap::new(),
            next_handle: 1,
            max_texture_size,
            clear_color: Color::BLACK,
            clear_pending: true,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Color the target is cleared to at the start of each frame.
    pub fn set_clear_color(&mut self, rgba: [u8; 4]) {
        let [r, g, b, a] = rgba.map(|c| c as f64 / 255.0);
        self.clear_color = Color { r, g, b, a };
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn create_pipeline(&self, key: &PipelineKey) -> RenderPipeline {
        let has_color = key.layout.find(AttrSemantic::Color0).is_some();
        let has_uv = key.layout.find(AttrSemantic::TexCoord(0)).is_some();
        let module = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(key.program.name()),
            source: ShaderSource::Wgsl(Cow::Owned(shader_source(key.program, has_color, has_uv))),
        });

        let attributes: Vec<VertexAttribute> = key
            .layout
            .attrs
            .iter()
            .filter_map(|attr| {
                shader_location(attr.semantic).map(|location| VertexAttribute {
                    offset: attr.offset as u64,
                    shader_location: location,
                    format: vertex_format(attr.format),
                })
            })
            .collect();

        let blend = key.state.blend().map(|(src, dst)| {
            let operation = if key.state.contains(RenderState::BLEND_EQ_REVSUB) {
                BlendOperation::ReverseSubtract
            } else {
                BlendOperation::Add
            };
            let component = BlendComponent {
                src_factor: blend_factor(src),
                dst_factor: blend_factor(dst),
                operation,
            };
            BlendState {
                color: component,
                alpha: component,
            }
        });

        let depth_compare = key
            .state
            .depth_test()
            .map(compare_function)
            .unwrap_or(CompareFunction::Always);

        debug!(
            "Creating {} pipeline for state {:#010X}",
            key.program.name(),
            key.state.bits()
        );
        self.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("GX Render Pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: VertexState {
                module: &module,
                entry_point: "vs_main",
                buffers: &[VertexBufferLayout {
                    array_stride: key.layout.stride as u64,
                    step_mode: VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
            },
            fragment: Some(FragmentState {
                module: &module,
                entry_point: "fs_main",
                targets: &[Some(ColorTargetState {
                    format: TARGET_FORMAT,
                    blend,
                    write_mask: color_writes(key.state),
                })],
            }),
            primitive: PrimitiveState {
                topology: primitive_topology(key.state.topology()),
                strip_index_format: None,
                front_face: FrontFace::Cw,
                cull_mode: cull_face(key.state),
                unclipped_depth: false,
                polygon_mode: PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: key.state.contains(RenderState::WRITE_Z),
                depth_compare,
                stencil: StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            multisample: MultisampleState::default(),
            multiview: None,
        })
    }

    fn load_ops(&self) -> (LoadOp<Color>, LoadOp<f32>) {
        if self.clear_pending {
            (LoadOp::Clear(self.clear_color), LoadOp::Clear(1.0))
        } else {
            (LoadOp::Load, LoadOp::Load)
        }
    }

    /// Clear the target if no draw has done so this frame.
    fn flush_clear(&mut self) {
        if !self.clear_pending {
            return;
        }
        let (color, depth) = self.load_ops();
        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("GX Clear"),
            });
        encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("GX Clear"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: &self.target_view,
                resolve_target: None,
                ops: Operations {
                    load: color,
                    store: StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(Operations {
                    load: depth,
                    store: StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.queue.submit(Some(encoder.finish()));
        self.clear_pending = false;
    }

    /// Copy the current target back to the host as tightly packed RGBA8.
    pub fn read_frame(&mut self) -> Result<Vec<u8>, BackendError> {
        self.flush_clear();

        let unpadded = self.width * 4;
        let padded = unpadded.div_ceil(COPY_BYTES_PER_ROW_ALIGNMENT) * COPY_BYTES_PER_ROW_ALIGNMENT;
        let buffer = self.device.create_buffer(&BufferDescriptor {
            label: Some("GX Readback"),
            size: padded as u64 * self.height as u64,
            usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("GX Readback"),
            });
        encoder.copy_texture_to_buffer(
            ImageCopyTexture {
                texture: &self.target,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            ImageCopyBuffer {
                buffer: &buffer,
                layout: ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.height),
                },
            },
            Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(Maintain::Wait);
        rx.recv()
            .map_err(|e| BackendError::Readback(e.to_string()))?
            .map_err(|e| BackendError::Readback(e.to_string()))?;

        let mut rgba = Vec::with_capacity((unpadded * self.height) as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks(padded as usize) {
                rgba.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        buffer.unmap();
        Ok(rgba)
    }
}

impl RenderBackend for WgpuBackend {
    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<TextureHandle, BackendError> {
        if width == 0 || height == 0 || width > self.max_texture_size || height > self.max_texture_size
        {
            return Err(BackendError::TextureTooLarge {
                width,
                height,
                limit: self.max_texture_size,
            });
        }
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(BackendError::PixelSizeMismatch {
                expected,
                actual: rgba.len(),
            });
        }
        let handle = TextureHandle(self.next_handle);
        self.next_handle += 1;
        let texture = upload_texture(&self.device, &self.queue, width, height, rgba);
        self.textures.insert(handle, texture);
        Ok(handle)
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        if let Some(gpu) = self.textures.remove(&handle) {
            gpu.texture.destroy();
        }
    }

    fn submit(&mut self, draw: &DrawSubmission<'_>) {
        // Cull-all draws rasterize nothing.
        if draw.state.contains(RenderState::CULL_CW | RenderState::CULL_CCW) {
            return;
        }
        if draw.vertex_count == 0 || draw.layout.find(AttrSemantic::Position).is_none() {
            return;
        }

        let key = PipelineKey {
            program: draw.program,
            state: draw.state,
            layout: draw.layout.clone(),
        };
        if !self.pipelines.contains_key(&key) {
            let pipeline = self.create_pipeline(&key);
            self.pipelines.insert(key.clone(), pipeline);
        }
        let (color_load, depth_load) = self.load_ops();
        let Some(pipeline) = self.pipelines.get(&key) else {
            return;
        };

        let uniforms = self.device.create_buffer_init(&util::BufferInitDescriptor {
            label: Some("GX Uniforms"),
            contents: bytemuck::bytes_of(&GxUniforms::new(draw)),
            usage: BufferUsages::UNIFORM,
        });
        let view = draw
            .texture
            .and_then(|handle| self.textures.get(&handle))
            .map_or(&self.white.view, |gpu| &gpu.view);
        let bind_group = self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("GX Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::TextureView(view),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        let vertices = self.device.create_buffer_init(&util::BufferInitDescriptor {
            label: Some("GX Vertices"),
            contents: draw.vertices,
            usage: BufferUsages::VERTEX,
        });
        let indices = draw.indices.map(|indices| {
            self.device.create_buffer_init(&util::BufferInitDescriptor {
                label: Some("GX Indices"),
                contents: bytemuck::cast_slice(indices),
                usage: BufferUsages::INDEX,
            })
        });

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("GX Draw"),
            });
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("GX Draw"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &self.target_view,
                    resolve_target: None,
                    ops: Operations {
                        load: color_load,
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: depth_load,
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, vertices.slice(..));
            match (&indices, draw.indices) {
                (Some(buffer), Some(list)) => {
                    pass.set_index_buffer(buffer.slice(..), IndexFormat::Uint16);
                    pass.draw_indexed(0..list.len() as u32, 0, 0..1);
                }
                _ => pass.draw(0..draw.vertex_count, 0..1),
            }
        }
        self.queue.submit(Some(encoder.finish()));
        self.clear_pending = false;
    }

    fn begin_frame(&mut self) {
        self.clear_pending = true;
    }

    fn end_frame(&mut self) {
        self.flush_clear();
        let _ = self.device.poll(Maintain::Poll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_source_substitutes_missing_inputs() {
        let src = shader_source(ShaderProgram::Modulate, false, true);
        assert!(src.contains("fn vs_main"));
        assert!(src.contains("fn fs_main"));
        assert!(src.contains("out.color = vec4<f32>(1.0);"));
        assert!(src.contains("@location(2) uv"));
        assert!(!src.contains("@location(1) color: vec4<f32>,"));
    }

    #[test]
    fn every_program_has_a_fragment_entry() {
        for program in ShaderProgram::ALL {
            assert!(shader_source(program, true, true).contains("fs_main"));
        }
    }

    #[test]
    fn cull_and_write_masks() {
        assert_eq!(cull_face(RenderState::CULL_CW), Some(Face::Front));
        assert_eq!(cull_face(RenderState::CULL_CCW), Some(Face::Back));
        assert_eq!(cull_face(RenderState::empty()), None);
        assert_eq!(color_writes(RenderState::WRITE_A), ColorWrites::ALPHA);
        assert_eq!(
            color_writes(RenderState::WRITE_RGB | RenderState::WRITE_A),
            ColorWrites::ALL
        );
    }

    #[test]
    fn uniforms_transpose_row_major_transform() {
        let mut transform = [0.0; 16];
        transform[3] = 5.0; // row 0, col 3: x translation
        let layout = VertexLayout::new();
        let draw = DrawSubmission {
            program: ShaderProgram::PassThrough,
            state: RenderState::empty(),
            transform,
            layout: &layout,
            vertices: &[],
            indices: None,
            vertex_count: 0,
            texture: None,
            constants: Default::default(),
        };
        let u = GxUniforms::new(&draw);
        assert_eq!(u.transform[3][0], 5.0);
        assert_eq!(std::mem::size_of::<GxUniforms>(), 112);
    }

    /// Runs only where an adapter is available.
    #[test]
    fn clear_only_frame_reads_back_clear_color() {
        let Ok(mut backend) = WgpuBackend::new(4, 4) else {
            return;
        };
        backend.set_clear_color([255, 0, 0, 255]);
        backend.begin_frame();
        backend.end_frame();
        let rgba = backend.read_frame().unwrap();
        assert_eq!(rgba.len(), 64);
        assert_eq!(&rgba[..4], &[255, 0, 0, 255]);
        assert!(backend.create_texture(2, 2, &[0; 8]).is_err());
    }
}

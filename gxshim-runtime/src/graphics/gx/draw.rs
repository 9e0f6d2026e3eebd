//! Translates a captured GX draw plus the current register state into a
//! backend submission.
use std::collections::HashSet;
use std::path::PathBuf;

use log::{debug, warn};

use super::state::{
    BlendFactor, BlendType, CompType, CullMode, GxState, VtxAttr, VtxAttrFmt, VtxInputType,
    WIRE_COLOR_SIZE,
};
use super::tev::{blend_constants, classify_state, ShaderConstants, ShaderProgram, TevStage};
use super::transform::{expand_3x4, mul_4x4};
use super::vertex::{stream_color_to_rgba, CapturedDraw, GxPrimitive};
use crate::config::ShimConfig;
use crate::error::TextureError;
use crate::graphics::backend::{
    AttrFormat, AttrSemantic, BlendTerm, DrawSubmission, RenderBackend, RenderState,
    TextureHandle, Topology, VertexLayout,
};
use crate::runtime::telemetry::{DrawRecord, GxTelemetry};
use crate::texture::cache::{TextureCache, TextureKey};
use crate::texture::decode::decode;
use crate::texture::formats::{Palette, TextureFormat};
use crate::texture::loader::{save_rgba_png, ImageKey, ImageSource};

/// Append triangle-list indices for `count` quad vertices: every group of
/// four becomes two triangles sharing the 0-2 diagonal. A trailing partial
/// group is dropped.
pub fn quad_indices(count: usize, out: &mut Vec<u16>) {
    for quad in 0..count / 4 {
        let base = (quad * 4) as u16;
        out.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

/// Append triangle-list indices for a fan of `count` vertices.
pub fn fan_indices(count: usize, out: &mut Vec<u16>) {
    for tri in 0..count.saturating_sub(2) {
        let t = tri as u16;
        out.extend_from_slice(&[0, t + 1, t + 2]);
    }
}

/// Fraction bits the hardware implies for normals.
fn normal_frac(ty: CompType) -> u8 {
    match ty {
        CompType::S8 => 6,
        CompType::S16 => 14,
        _ => 0,
    }
}

fn read_bytes<const N: usize>(bytes: &[u8], at: usize) -> [u8; N] {
    bytes
        .get(at..at + N)
        .and_then(|s| s.try_into().ok())
        .unwrap_or([0; N])
}

/// Read one numeric component and scale fixed-point values by `2^-frac`.
fn read_component(bytes: &[u8], at: usize, ty: CompType, frac: u8, big_endian: bool) -> f32 {
    let raw = match ty {
        CompType::U8 => read_bytes::<1>(bytes, at)[0] as f32,
        CompType::S8 => read_bytes::<1>(bytes, at)[0] as i8 as f32,
        CompType::U16 | CompType::S16 => {
            let b = read_bytes::<2>(bytes, at);
            let v = if big_endian {
                u16::from_be_bytes(b)
            } else {
                u16::from_le_bytes(b)
            };
            if ty == CompType::S16 {
                v as i16 as f32
            } else {
                v as f32
            }
        }
        CompType::F32 => {
            let b = read_bytes::<4>(bytes, at);
            return if big_endian {
                f32::from_be_bytes(b)
            } else {
                f32::from_le_bytes(b)
            };
        }
    };
    raw / (1u32 << frac.min(31)) as f32
}

/// Where an attribute's data for one vertex lives.
struct AttrData<'a> {
    bytes: &'a [u8],
    at: usize,
    /// Array data is big-endian and colors keep their stream encoding.
    from_array: bool,
}

/// Converts captured draws into backend submissions.
///
/// Owns the texture ring plus scratch vertex and index buffers that are
/// reused from draw to draw.
pub struct DrawDispatcher {
    cache: TextureCache,
    layout: VertexLayout,
    vertices: Vec<u8>,
    indices: Vec<u16>,
    max_indices: usize,
    dump_textures: Option<PathBuf>,
    warn_unhandled_tev: bool,
    warned: HashSet<Vec<TevStage>>,
}

impl DrawDispatcher {
    pub fn new(config: &ShimConfig) -> Self {
        Self {
            cache: TextureCache::new(config.texture_cache_capacity),
            layout: VertexLayout::new(),
            vertices: Vec::new(),
            indices: Vec::new(),
            max_indices: config.max_indices,
            dump_textures: config.dump_textures.clone(),
            warn_unhandled_tev: config.warn_unhandled_tev,
            warned: HashSet::new(),
        }
    }

    pub fn texture_cache(&self) -> &TextureCache {
        &self.cache
    }

    /// Submit one captured draw. Returns the program used, or `None` when
    /// the draw was skipped.
    pub fn dispatch<B, S>(
        &mut self,
        draw: &CapturedDraw<'_>,
        state: &GxState,
        images: &S,
        backend: &mut B,
        telemetry: &mut GxTelemetry,
    ) -> Option<ShaderProgram>
    where
        B: RenderBackend + ?Sized,
        S: ImageSource + ?Sized,
    {
        if draw.vertex_count == 0 || draw.stride == 0 {
            return None;
        }
        if draw.vertex_count > usize::from(u16::MAX) + 1 {
            warn!(
                "GX draw of {} vertices exceeds 16-bit indexing, skipped",
                draw.vertex_count
            );
            return None;
        }

        let classification = classify_state(state);
        if classification.fallback {
            self.warn_fallback(state, classification.program);
        }
        let program = classification.program;

        self.build_layout(state);
        self.convert_vertices(draw, state, images);

        self.indices.clear();
        match draw.primitive {
            GxPrimitive::Quads => quad_indices(draw.vertex_count, &mut self.indices),
            GxPrimitive::TriangleFan => fan_indices(draw.vertex_count, &mut self.indices),
            _ => {}
        }
        let indexed = matches!(
            draw.primitive,
            GxPrimitive::Quads | GxPrimitive::TriangleFan
        );
        if indexed && self.indices.is_empty() {
            return None;
        }
        if self.indices.len() > self.max_indices {
            warn!(
                "GX {:?} draw needs {} indices (limit {}), skipped",
                draw.primitive,
                self.indices.len(),
                self.max_indices
            );
            return None;
        }

        let mut texture = None;
        let mut texture_key = None;
        if program.needs_texture() {
            match self.resolve_texture(state, images, backend) {
                Ok((handle, key)) => {
                    texture = Some(handle);
                    texture_key = Some(key);
                }
                Err(err) => debug!("GX draw proceeds untextured: {}", err),
            }
        }

        let render_state = render_state(state, draw.primitive);
        let transform = mul_4x4(
            &state.matrices.projection.matrix,
            &expand_3x4(state.current_pos_mtx()),
        );
        let constants = if program.descriptor().reads_constants {
            blend_constants(state)
        } else {
            ShaderConstants::default()
        };

        backend.submit(&DrawSubmission {
            program,
            state: render_state,
            transform,
            layout: &self.layout,
            vertices: &self.vertices,
            indices: indexed.then_some(self.indices.as_slice()),
            vertex_count: draw.vertex_count as u32,
            texture,
            constants,
        });

        telemetry.record_draw(&DrawRecord {
            program,
            primitive: draw.primitive,
            vertices: draw.vertex_count as u32,
            texture: texture_key,
            depth: state.z_mode.enable,
            blend: matches!(
                state.blend_mode.mode,
                BlendType::Blend | BlendType::Subtract
            ),
        });

        Some(program)
    }

    /// Release every cached texture on the backend.
    pub fn clear_textures<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        for handle in self.cache.clear() {
            backend.destroy_texture(handle);
        }
    }

    fn warn_fallback(&mut self, state: &GxState, program: ShaderProgram) {
        if !self.warn_unhandled_tev {
            return;
        }
        let n = state.num_tev_stages.clamp(1, 16) as usize;
        if self.warned.insert(state.tev_stages[..n].to_vec()) {
            warn!(
                "Unhandled {}-stage TEV configuration, using {} program",
                n,
                program.name()
            );
        }
    }

    // ── Vertex conversion ───────────────────────────────────────

    fn build_layout(&mut self, state: &GxState) {
        self.layout.clear();
        for attr in VtxAttr::ALL {
            if attr.is_matrix_index() || state.vtx_desc(attr) == VtxInputType::None {
                continue;
            }
            let (semantic, format) = match attr {
                VtxAttr::Position => (AttrSemantic::Position, AttrFormat::Float32x3),
                VtxAttr::Normal => (AttrSemantic::Normal, AttrFormat::Float32x3),
                VtxAttr::Color0 => (AttrSemantic::Color0, AttrFormat::Unorm8x4),
                VtxAttr::Color1 => (AttrSemantic::Color1, AttrFormat::Unorm8x4),
                other => match other.tex_index() {
                    Some(n) => (AttrSemantic::TexCoord(n), AttrFormat::Float32x2),
                    None => continue,
                },
            };
            self.layout.push(semantic, format);
        }
    }

    fn convert_vertices<S: ImageSource + ?Sized>(
        &mut self,
        draw: &CapturedDraw<'_>,
        state: &GxState,
        images: &S,
    ) {
        self.vertices.clear();
        self.vertices
            .reserve(draw.vertex_count * self.layout.stride as usize);

        for wire in draw.data.chunks_exact(draw.stride).take(draw.vertex_count) {
            let mut pos = 0;
            for attr in VtxAttr::ALL {
                let input = state.vtx_desc(attr);
                let fmt = state.vtx_attr_fmt(draw.vertex_format, attr);
                let data = match input {
                    VtxInputType::None => continue,
                    VtxInputType::Direct => {
                        let size = if attr.is_matrix_index() {
                            1
                        } else if attr.is_color() {
                            WIRE_COLOR_SIZE
                        } else {
                            fmt.numeric_size(attr)
                        };
                        let data = AttrData {
                            bytes: wire,
                            at: pos,
                            from_array: false,
                        };
                        pos += size;
                        data
                    }
                    VtxInputType::Index8 => {
                        let index = read_bytes::<1>(wire, pos)[0] as usize;
                        pos += 1;
                        array_entry(state, images, attr, index)
                    }
                    VtxInputType::Index16 => {
                        let index = u16::from_le_bytes(read_bytes::<2>(wire, pos)) as usize;
                        pos += 2;
                        array_entry(state, images, attr, index)
                    }
                };
                if !attr.is_matrix_index() {
                    self.emit_attr(attr, &fmt, &data);
                }
            }
        }
    }

    fn emit_attr(&mut self, attr: VtxAttr, fmt: &VtxAttrFmt, data: &AttrData<'_>) {
        let ty = fmt.numeric_type();
        let size = ty.size();
        let be = data.from_array;
        let component = |i: usize, frac: u8| {
            if i < fmt.elements(attr) {
                read_component(data.bytes, data.at + i * size, ty, frac, be)
            } else {
                0.0
            }
        };

        match attr {
            VtxAttr::Position => {
                let xyz = [0, 1, 2].map(|i| component(i, fmt.frac));
                self.vertices.extend_from_slice(bytemuck::cast_slice(&xyz[..]));
            }
            VtxAttr::Normal => {
                let frac = normal_frac(ty);
                let n = [0, 1, 2].map(|i| component(i, frac));
                self.vertices.extend_from_slice(bytemuck::cast_slice(&n[..]));
            }
            VtxAttr::Color0 | VtxAttr::Color1 => {
                let rgba = if data.from_array {
                    data.bytes
                        .get(data.at..)
                        .map(|b| stream_color_to_rgba(b, fmt.color_type()))
                        .unwrap_or([0; 4])
                } else {
                    read_bytes::<4>(data.bytes, data.at)
                };
                self.vertices.extend_from_slice(&rgba);
            }
            _ => {
                let st = [0, 1].map(|i| component(i, fmt.frac));
                self.vertices.extend_from_slice(bytemuck::cast_slice(&st[..]));
            }
        }
    }

    // ── Texture resolution ──────────────────────────────────────

    fn resolve_texture<B, S>(
        &mut self,
        state: &GxState,
        images: &S,
        backend: &mut B,
    ) -> Result<(TextureHandle, ImageKey), TextureError>
    where
        B: RenderBackend + ?Sized,
        S: ImageSource + ?Sized,
    {
        let map = state.tev_stages[0].tex_map;
        let binding = state
            .textures
            .get(map as usize)
            .ok_or(TextureError::Unbound(map))?;
        let image = binding.image.ok_or(TextureError::Unbound(map))?;
        if binding.width == 0 || binding.height == 0 {
            return Err(TextureError::EmptyImage {
                width: binding.width,
                height: binding.height,
            });
        }

        let tlut = binding
            .tlut
            .filter(|_| TextureFormat::from_gx(binding.format).is_some_and(|f| f.is_indexed()));
        let key = TextureKey {
            image,
            width: binding.width,
            height: binding.height,
            format: binding.format,
            tlut: tlut.map(|t| (t.image, t.format)),
        };
        if let Some(handle) = self.cache.get(&key) {
            return Ok((handle, image));
        }

        let bytes = images
            .image_bytes(image)
            .ok_or(TextureError::MissingImage(image.0))?;
        let palette = tlut.and_then(|tlut| {
            images
                .image_bytes(tlut.image)
                .map(|entries| Palette::new(tlut.format, entries))
        });

        let (w, h) = (u32::from(binding.width), u32::from(binding.height));
        let rgba = decode(bytes, w, h, binding.format, palette.as_ref());
        self.dump_texture(&key, &rgba);

        let handle = backend.create_texture(w, h, &rgba)?;
        if let Some(evicted) = self.cache.insert(key, handle) {
            backend.destroy_texture(evicted);
        }
        Ok((handle, image))
    }

    fn dump_texture(&self, key: &TextureKey, rgba: &[u8]) {
        let Some(dir) = self.dump_textures.as_ref() else {
            return;
        };
        let name = TextureFormat::from_gx(key.format).map_or("unknown", |f| f.name());
        let path = dir.join(format!(
            "tex_{:08x}_{}x{}_{}.png",
            key.image.0, key.width, key.height, name
        ));
        if let Err(err) = save_rgba_png(&path, key.width.into(), key.height.into(), rgba) {
            warn!("Failed to dump texture {}: {:#}", path.display(), err);
        }
    }
}

fn array_entry<'a, S: ImageSource + ?Sized>(
    state: &GxState,
    images: &'a S,
    attr: VtxAttr,
    index: usize,
) -> AttrData<'a> {
    let bytes = state.arrays[attr as usize]
        .and_then(|array| {
            images
                .image_bytes(array.base)
                .map(|bytes| (bytes, index * array.stride as usize))
        });
    match bytes {
        Some((bytes, at)) => AttrData {
            bytes,
            at,
            from_array: true,
        },
        None => AttrData {
            bytes: &[],
            at: 0,
            from_array: true,
        },
    }
}

// ── Render state translation ────────────────────────────────────

fn src_term(factor: BlendFactor) -> BlendTerm {
    match factor {
        BlendFactor::Zero => BlendTerm::Zero,
        BlendFactor::One => BlendTerm::One,
        BlendFactor::SrcColor => BlendTerm::DstColor,
        BlendFactor::InvSrcColor => BlendTerm::InvDstColor,
        BlendFactor::SrcAlpha => BlendTerm::SrcAlpha,
        BlendFactor::InvSrcAlpha => BlendTerm::InvSrcAlpha,
        BlendFactor::DstAlpha => BlendTerm::DstAlpha,
        BlendFactor::InvDstAlpha => BlendTerm::InvDstAlpha,
    }
}

fn dst_term(factor: BlendFactor) -> BlendTerm {
    match factor {
        BlendFactor::SrcColor => BlendTerm::SrcColor,
        BlendFactor::InvSrcColor => BlendTerm::InvSrcColor,
        other => src_term(other),
    }
}

/// Pack the pixel pipeline registers into backend state bits.
pub fn render_state(state: &GxState, primitive: GxPrimitive) -> RenderState {
    let mut rs = RenderState::empty();
    if state.color_update {
        rs |= RenderState::WRITE_RGB;
    }
    if state.alpha_update {
        rs |= RenderState::WRITE_A;
    }
    if state.z_mode.enable {
        rs = rs.with_depth_test(state.z_mode.function);
    }
    if state.z_mode.update {
        rs |= RenderState::WRITE_Z;
    }

    let blend = &state.blend_mode;
    match blend.mode {
        BlendType::Blend => {
            rs = rs.with_blend(src_term(blend.src_factor), dst_term(blend.dst_factor));
        }
        BlendType::Subtract => {
            rs = rs.with_blend(BlendTerm::One, BlendTerm::One) | RenderState::BLEND_EQ_REVSUB;
        }
        BlendType::None | BlendType::Logic => {}
    }

    match state.cull_mode {
        CullMode::None => {}
        CullMode::Front => rs |= RenderState::CULL_CW,
        CullMode::Back => rs |= RenderState::CULL_CCW,
        CullMode::All => rs |= RenderState::CULL_CW | RenderState::CULL_CCW,
    }

    let topology = match primitive {
        GxPrimitive::TriangleStrip => Topology::TriangleStrip,
        GxPrimitive::Lines => Topology::LineList,
        GxPrimitive::LineStrip => Topology::LineStrip,
        GxPrimitive::Points => Topology::PointList,
        GxPrimitive::Triangles | GxPrimitive::Quads | GxPrimitive::TriangleFan => {
            Topology::TriangleList
        }
    };
    rs.with_topology(topology)
}

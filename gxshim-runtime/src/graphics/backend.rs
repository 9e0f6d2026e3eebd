//! Rendering backend interface.
//!
//! Draw dispatch hands every GX draw to a [`RenderBackend`] as a
//! [`DrawSubmission`]: converted vertex bytes, an optional index buffer, a
//! fixed shader program and a packed [`RenderState`]. The
//! [`RecordingBackend`] keeps submissions in memory for tests and the CLI.

use std::collections::HashMap;

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::error::BackendError;
use crate::graphics::gx::state::CompareFunction;
use crate::graphics::gx::tev::{ShaderConstants, ShaderProgram};

/// Opaque handle to an uploaded texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

// ---------------------------------------------------------------------------
// Vertex layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrSemantic {
    Position,
    Normal,
    Color0,
    Color1,
    TexCoord(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrFormat {
    Float32x2,
    Float32x3,
    /// Four normalized bytes.
    Unorm8x4,
}

impl AttrFormat {
    pub fn size(self) -> u32 {
        match self {
            Self::Float32x2 => 8,
            Self::Float32x3 => 12,
            Self::Unorm8x4 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutAttr {
    pub semantic: AttrSemantic,
    pub format: AttrFormat,
    pub offset: u32,
}

/// Interleaved backend vertex layout.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub attrs: SmallVec<[LayoutAttr; 8]>,
    pub stride: u32,
}

impl VertexLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attribute and return its byte offset.
    pub fn push(&mut self, semantic: AttrSemantic, format: AttrFormat) -> u32 {
        let offset = self.stride;
        self.attrs.push(LayoutAttr {
            semantic,
            format,
            offset,
        });
        self.stride += format.size();
        offset
    }

    pub fn find(&self, semantic: AttrSemantic) -> Option<&LayoutAttr> {
        self.attrs.iter().find(|a| a.semantic == semantic)
    }

    pub fn clear(&mut self) {
        self.attrs.clear();
        self.stride = 0;
    }
}

// ---------------------------------------------------------------------------
// Render state
// ---------------------------------------------------------------------------

/// Backend blend factors. Unlike GX codes these are unambiguous about
/// whether a color term refers to source or destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlendTerm {
    Zero = 0,
    One = 1,
    SrcColor = 2,
    InvSrcColor = 3,
    DstColor = 4,
    InvDstColor = 5,
    SrcAlpha = 6,
    InvSrcAlpha = 7,
    DstAlpha = 8,
    InvDstAlpha = 9,
}

impl BlendTerm {
    const ALL: [BlendTerm; 10] = [
        Self::Zero,
        Self::One,
        Self::SrcColor,
        Self::InvSrcColor,
        Self::DstColor,
        Self::InvDstColor,
        Self::SrcAlpha,
        Self::InvSrcAlpha,
        Self::DstAlpha,
        Self::InvDstAlpha,
    ];

    fn from_bits(bits: u32) -> Self {
        Self::ALL.get(bits as usize).copied().unwrap_or(Self::One)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Topology {
    #[default]
    TriangleList = 0,
    TriangleStrip = 1,
    LineList = 2,
    LineStrip = 3,
    PointList = 4,
}

impl Topology {
    fn from_bits(bits: u32) -> Self {
        match bits {
            1 => Self::TriangleStrip,
            2 => Self::LineList,
            3 => Self::LineStrip,
            4 => Self::PointList,
            _ => Self::TriangleList,
        }
    }
}

bitflags! {
    /// Packed fixed-function state for one draw.
    ///
    /// Besides the flags, bits 4..8 hold the depth compare function (plus
    /// one, zero meaning no depth test), bits 12..16 and 16..20 the blend
    /// source and destination terms and bits 24..27 the topology.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RenderState: u32 {
        const WRITE_RGB = 1 << 0;
        const WRITE_A = 1 << 1;
        const WRITE_Z = 1 << 2;
        const CULL_CW = 1 << 3;
        const CULL_CCW = 1 << 8;
        const BLEND_ENABLE = 1 << 9;
        const BLEND_EQ_REVSUB = 1 << 10;

        const _ = !0;
    }
}

const DEPTH_SHIFT: u32 = 4;
const SRC_SHIFT: u32 = 12;
const DST_SHIFT: u32 = 16;
const TOPOLOGY_SHIFT: u32 = 24;
const FIELD_MASK: u32 = 0xF;

impl RenderState {
    fn field(self, shift: u32) -> u32 {
        (self.bits() >> shift) & FIELD_MASK
    }

    fn with_field(self, shift: u32, value: u32) -> Self {
        let cleared = self.bits() & !(FIELD_MASK << shift);
        Self::from_bits_retain(cleared | ((value & FIELD_MASK) << shift))
    }

    pub fn with_depth_test(self, func: CompareFunction) -> Self {
        self.with_field(DEPTH_SHIFT, func as u32 + 1)
    }

    pub fn depth_test(self) -> Option<CompareFunction> {
        match self.field(DEPTH_SHIFT) {
            0 => None,
            v => Some(CompareFunction::from_bits(v - 1)),
        }
    }

    pub fn with_blend(self, src: BlendTerm, dst: BlendTerm) -> Self {
        (self | Self::BLEND_ENABLE)
            .with_field(SRC_SHIFT, src as u32)
            .with_field(DST_SHIFT, dst as u32)
    }

    /// Source and destination terms when blending is enabled.
    pub fn blend(self) -> Option<(BlendTerm, BlendTerm)> {
        self.contains(Self::BLEND_ENABLE).then(|| {
            (
                BlendTerm::from_bits(self.field(SRC_SHIFT)),
                BlendTerm::from_bits(self.field(DST_SHIFT)),
            )
        })
    }

    pub fn with_topology(self, topology: Topology) -> Self {
        self.with_field(TOPOLOGY_SHIFT, topology as u32)
    }

    pub fn topology(self) -> Topology {
        Topology::from_bits(self.field(TOPOLOGY_SHIFT))
    }
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// One draw, borrowed from the dispatcher's scratch buffers.
#[derive(Debug, Clone, Copy)]
pub struct DrawSubmission<'a> {
    pub program: ShaderProgram,
    pub state: RenderState,
    /// Row-major projection * modelview.
    pub transform: [f32; 16],
    pub layout: &'a VertexLayout,
    pub vertices: &'a [u8],
    pub indices: Option<&'a [u16]>,
    pub vertex_count: u32,
    pub texture: Option<TextureHandle>,
    pub constants: ShaderConstants,
}

/// A rendering backend that GX draws are translated into.
pub trait RenderBackend {
    /// Upload `width * height` RGBA8 texels.
    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<TextureHandle, BackendError>;

    fn destroy_texture(&mut self, handle: TextureHandle);

    fn submit(&mut self, draw: &DrawSubmission<'_>);

    fn begin_frame(&mut self) {}

    fn end_frame(&mut self) {}
}

// ---------------------------------------------------------------------------
// Recording backend
// ---------------------------------------------------------------------------

/// Owned copy of a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub program: ShaderProgram,
    pub state: RenderState,
    pub transform: [f32; 16],
    pub layout: VertexLayout,
    pub vertices: Vec<u8>,
    pub indices: Option<Vec<u16>>,
    pub vertex_count: u32,
    pub texture: Option<TextureHandle>,
    pub constants: ShaderConstants,
}

/// Backend that keeps every submission in memory and folds it into a CRC32
/// digest, so identical command streams can be compared cheaply.
#[derive(Debug)]
pub struct RecordingBackend {
    draws: Vec<RecordedDraw>,
    textures: HashMap<TextureHandle, (u32, u32)>,
    next_handle: u32,
    textures_created: usize,
    textures_destroyed: usize,
    frames: usize,
    max_texture_size: u32,
    hasher: crc32fast::Hasher,
}

impl RecordingBackend {
    pub const DEFAULT_MAX_TEXTURE_SIZE: u32 = 1024;

    pub fn new() -> Self {
        Self {
            draws: Vec::new(),
            textures: HashMap::new(),
            next_handle: 1,
            textures_created: 0,
            textures_destroyed: 0,
            frames: 0,
            max_texture_size: Self::DEFAULT_MAX_TEXTURE_SIZE,
            hasher: crc32fast::Hasher::new(),
        }
    }

    pub fn draws(&self) -> &[RecordedDraw] {
        &self.draws
    }

    pub fn take_draws(&mut self) -> Vec<RecordedDraw> {
        std::mem::take(&mut self.draws)
    }

    /// Textures currently alive.
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn texture_size(&self, handle: TextureHandle) -> Option<(u32, u32)> {
        self.textures.get(&handle).copied()
    }

    pub fn textures_created(&self) -> usize {
        self.textures_created
    }

    pub fn textures_destroyed(&self) -> usize {
        self.textures_destroyed
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// CRC32 over every submission so far.
    pub fn digest(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    fn hash_draw(&mut self, draw: &DrawSubmission<'_>) {
        let h = &mut self.hasher;
        h.update(&[draw.program as u8]);
        h.update(&draw.state.bits().to_le_bytes());
        for v in &draw.transform {
            h.update(&v.to_le_bytes());
        }
        h.update(&draw.vertex_count.to_le_bytes());
        h.update(draw.vertices);
        if let Some(indices) = draw.indices {
            for i in indices {
                h.update(&i.to_le_bytes());
            }
        }
        if let Some(tex) = draw.texture {
            h.update(&tex.0.to_le_bytes());
        }
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for RecordingBackend {
    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<TextureHandle, BackendError> {
        if width > self.max_texture_size || height > self.max_texture_size {
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
        self.textures.insert(handle, (width, height));
        self.textures_created += 1;
        Ok(handle)
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        if self.textures.remove(&handle).is_some() {
            self.textures_destroyed += 1;
        }
    }

    fn submit(&mut self, draw: &DrawSubmission<'_>) {
        self.hash_draw(draw);
        self.draws.push(RecordedDraw {
            program: draw.program,
            state: draw.state,
            transform: draw.transform,
            layout: draw.layout.clone(),
            vertices: draw.vertices.to_vec(),
            indices: draw.indices.map(<[u16]>::to_vec),
            vertex_count: draw.vertex_count,
            texture: draw.texture,
            constants: draw.constants,
        });
    }

    fn end_frame(&mut self) {
        self.frames += 1;
    }
}

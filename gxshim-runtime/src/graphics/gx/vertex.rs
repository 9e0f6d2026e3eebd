// GX vertex capture
//
// Between Begin and End the caller submits vertex components as raw typed
// scalars. They are appended, little-endian, to a fixed-capacity byte buffer
// in wire layout: exactly the attribute order and sizes the register file
// describes for the active vertex format. Draw dispatch converts that layout
// into the backend's once the draw closes.

use log::warn;

use super::state::{ColorType, GxState};
use crate::texture::decode::{expand_bits, rgb565_to_rgba};

// ── GX primitive types ──────────────────────────────────────────

/// GameCube GX primitive types, matching hardware command values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GxPrimitive {
    Quads = 0x80,
    Triangles = 0x90,
    TriangleStrip = 0x98,
    TriangleFan = 0xA0,
    Lines = 0xA8,
    LineStrip = 0xB0,
    Points = 0xB8,
}

impl GxPrimitive {
    /// Decode a raw `u8` command byte (format bits cleared) into a primitive type.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x80 => Some(Self::Quads),
            0x90 => Some(Self::Triangles),
            0x98 => Some(Self::TriangleStrip),
            0xA0 => Some(Self::TriangleFan),
            0xA8 => Some(Self::Lines),
            0xB0 => Some(Self::LineStrip),
            0xB8 => Some(Self::Points),
            _ => None,
        }
    }

    /// Bit for this primitive in a usage mask.
    pub fn mask_bit(self) -> u32 {
        1 << ((self as u8 - 0x80) >> 3)
    }
}

/// Expand a big-endian stream color to RGBA8. Short input reads as zero.
pub fn stream_color_to_rgba(bytes: &[u8], ty: ColorType) -> [u8; 4] {
    let Some(raw) = bytes.get(..ty.stream_size()) else {
        return [0; 4];
    };
    match ty {
        ColorType::Rgb565 => rgb565_to_rgba(u16::from_be_bytes([raw[0], raw[1]])),
        ColorType::Rgb8 | ColorType::Rgbx8 => [raw[0], raw[1], raw[2], 255],
        ColorType::Rgba4 => {
            let v = u16::from_be_bytes([raw[0], raw[1]]) as u32;
            [12, 8, 4, 0].map(|shift| expand_bits((v >> shift) & 0xF, 4))
        }
        ColorType::Rgba6 => {
            let v = u32::from_be_bytes([0, raw[0], raw[1], raw[2]]);
            [18, 12, 6, 0].map(|shift| expand_bits((v >> shift) & 0x3F, 6))
        }
        ColorType::Rgba8 => [raw[0], raw[1], raw[2], raw[3]],
    }
}

// ── Captured draw ───────────────────────────────────────────────

/// A closed draw session, borrowing the capture buffer.
#[derive(Debug, Clone, Copy)]
pub struct CapturedDraw<'a> {
    pub primitive: GxPrimitive,
    /// Active vertex format slot (VTX_FMT 0-7).
    pub vertex_format: u8,
    pub vertex_count: usize,
    /// Wire bytes per vertex, computed at Begin.
    pub stride: usize,
    /// Exactly `vertex_count * stride` bytes.
    pub data: &'a [u8],
    /// Some writes were dropped because the buffer was full.
    pub truncated: bool,
}

// ── Vertex assembler ────────────────────────────────────────────

/// Captures vertex bytes between Begin / End pairs.
///
/// The buffer is allocated once and reused for every draw. A write that
/// would not fit is dropped whole and the session is marked truncated.
pub struct VertexAssembler {
    buffer: Box<[u8]>,
    len: usize,
    primitive: GxPrimitive,
    vertex_format: u8,
    requested: u16,
    completed: u16,
    stride: usize,
    active: bool,
    truncated: bool,
}

impl VertexAssembler {
    pub const DEFAULT_CAPACITY: usize = 256 * 1024;

    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
            primitive: GxPrimitive::Triangles,
            vertex_format: 0,
            requested: 0,
            completed: 0,
            stride: 0,
            active: false,
            truncated: false,
        }
    }

    // ── Public accessors ────────────────────────────────────────

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn primitive(&self) -> GxPrimitive {
        self.primitive
    }

    pub fn vertex_format(&self) -> u8 {
        self.vertex_format
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn bytes_written(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    // ── Begin / End ─────────────────────────────────────────────

    /// Open a draw session. The stride is taken from the register file now,
    /// since the layout may differ between any two draws.
    pub fn begin(&mut self, state: &GxState, primitive: GxPrimitive, vtx_fmt: u8, count: u16) {
        if self.active {
            warn!(
                "GX begin called while already active \
                 (primitive {:?}, {} bytes captured)",
                primitive, self.len,
            );
            return;
        }

        self.primitive = primitive;
        self.vertex_format = vtx_fmt;
        self.requested = count;
        self.completed = 0;
        self.stride = state.stride(vtx_fmt);
        self.len = 0;
        self.truncated = false;
        self.active = true;
    }

    /// Mark the end of one vertex. Gives `end` an explicit count.
    pub fn finish_vertex(&mut self) {
        if self.active {
            self.completed = self.completed.saturating_add(1);
        }
    }

    /// Close the session.
    ///
    /// The vertex count is the explicit count from `finish_vertex` if any,
    /// otherwise bytes written / stride, otherwise the requested count;
    /// in every case capped at the number of whole vertices captured.
    /// Returns `None` if `begin` was never called.
    pub fn end(&mut self) -> Option<CapturedDraw<'_>> {
        if !self.active {
            warn!("GX end called without matching begin");
            return None;
        }
        self.active = false;

        let whole = self.len.checked_div(self.stride).unwrap_or(0);
        let count = if self.completed > 0 {
            self.completed as usize
        } else if whole > 0 {
            whole
        } else {
            self.requested as usize
        }
        .min(whole);

        if self.requested as usize != count {
            warn!(
                "GX end: expected {} vertices but got {}",
                self.requested, count,
            );
        }

        Some(CapturedDraw {
            primitive: self.primitive,
            vertex_format: self.vertex_format,
            vertex_count: count,
            stride: self.stride,
            data: &self.buffer[..count * self.stride],
            truncated: self.truncated,
        })
    }

    // ── Attribute writers ───────────────────────────────────────

    fn push(&mut self, bytes: &[u8]) {
        if !self.active {
            return;
        }
        let end = self.len + bytes.len();
        match self.buffer.get_mut(self.len..end) {
            Some(dst) => {
                dst.copy_from_slice(bytes);
                self.len = end;
            }
            None => self.truncated = true,
        }
    }

    pub fn write_u8(&mut self, v: u8) {
        self.push(&[v]);
    }

    pub fn write_s8(&mut self, v: i8) {
        self.push(&v.to_le_bytes());
    }

    pub fn write_u16(&mut self, v: u16) {
        self.push(&v.to_le_bytes());
    }

    pub fn write_s16(&mut self, v: i16) {
        self.push(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.push(&v.to_le_bytes());
    }

    pub fn write_s32(&mut self, v: i32) {
        self.push(&v.to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.push(&v.to_le_bytes());
    }

    /// Write a direct color as 4 bytes R, G, B, A.
    pub fn write_color(&mut self, rgba: [u8; 4]) {
        self.push(&rgba);
    }

    /// Submit a 3-component f32 position.
    pub fn position_3f32(&mut self, x: f32, y: f32, z: f32) {
        self.write_f32(x);
        self.write_f32(y);
        self.write_f32(z);
    }

    /// Submit a 3-component s16 position.
    pub fn position_3s16(&mut self, x: i16, y: i16, z: i16) {
        self.write_s16(x);
        self.write_s16(y);
        self.write_s16(z);
    }

    pub fn normal_3f32(&mut self, x: f32, y: f32, z: f32) {
        self.position_3f32(x, y, z);
    }

    pub fn color_4u8(&mut self, r: u8, g: u8, b: u8, a: u8) {
        self.write_color([r, g, b, a]);
    }

    pub fn texcoord_2f32(&mut self, s: f32, t: f32) {
        self.write_f32(s);
        self.write_f32(t);
    }
}

impl Default for VertexAssembler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

// ── Tests ───────────────────────────────────────────────────────

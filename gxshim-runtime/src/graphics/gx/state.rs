// GX (Graphics eXecutor) register file.
//
// The GameCube's GPU ("Flipper") is configured entirely through registers:
// vertex layout, up to 16 TEV combiner stages, 8 texture maps, matrix
// memory, and fixed-function blend / depth / cull state. This module models
// that configuration as a single long-lived struct. Every setter is total:
// out-of-range indices are ignored and counts are clamped, since a replayed
// command stream may briefly present inconsistent values.

use super::lighting::LightingState;
use super::tev::{TevAlphaArg, TevBias, TevColorArg, TevOp, TevRegId, TevScale, TevStage};
use super::transform::{normal_to_3x4, Projection, ProjectionType, IDENTITY_3X4};
use crate::texture::formats::TlutFormat;
use crate::texture::loader::ImageKey;

/// Texture map / coordinate value meaning "none".
pub const TEX_MAP_NULL: u8 = 0xFF;

pub const MAX_TEV_STAGES: u8 = 16;
pub const MAX_TEX_GENS: u8 = 8;
pub const MAX_TEX_MAPS: usize = 8;
pub const MATRIX_SLOTS: usize = 10;
pub const VERTEX_FORMATS: usize = 8;

// ---------------------------------------------------------------------------
// Vertex attribute types
// ---------------------------------------------------------------------------

/// Identifies one of the 21 vertex attribute slots defined by GX.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VtxAttr {
    PositionMatrixIdx = 0,
    Tex0MatrixIdx = 1,
    Tex1MatrixIdx = 2,
    Tex2MatrixIdx = 3,
    Tex3MatrixIdx = 4,
    Tex4MatrixIdx = 5,
    Tex5MatrixIdx = 6,
    Tex6MatrixIdx = 7,
    Tex7MatrixIdx = 8,
    Position = 9,
    Normal = 10,
    Color0 = 11,
    Color1 = 12,
    Tex0 = 13,
    Tex1 = 14,
    Tex2 = 15,
    Tex3 = 16,
    Tex4 = 17,
    Tex5 = 18,
    Tex6 = 19,
    Tex7 = 20,
}

impl VtxAttr {
    pub const COUNT: usize = 21;

    /// Attributes in stream order.
    pub const ALL: [VtxAttr; 21] = [
        Self::PositionMatrixIdx,
        Self::Tex0MatrixIdx,
        Self::Tex1MatrixIdx,
        Self::Tex2MatrixIdx,
        Self::Tex3MatrixIdx,
        Self::Tex4MatrixIdx,
        Self::Tex5MatrixIdx,
        Self::Tex6MatrixIdx,
        Self::Tex7MatrixIdx,
        Self::Position,
        Self::Normal,
        Self::Color0,
        Self::Color1,
        Self::Tex0,
        Self::Tex1,
        Self::Tex2,
        Self::Tex3,
        Self::Tex4,
        Self::Tex5,
        Self::Tex6,
        Self::Tex7,
    ];

    /// Return the attribute corresponding to an index (0..=20), if valid.
    pub fn from_index(i: u8) -> Option<Self> {
        Self::ALL.get(i as usize).copied()
    }

    pub fn tex(n: u8) -> Option<Self> {
        Self::from_index(Self::Tex0 as u8 + n).filter(|_| n < 8)
    }

    pub fn is_matrix_index(self) -> bool {
        (self as u8) <= Self::Tex7MatrixIdx as u8
    }

    pub fn is_color(self) -> bool {
        matches!(self, Self::Color0 | Self::Color1)
    }

    /// Texture coordinate slot for `Tex0..Tex7`.
    pub fn tex_index(self) -> Option<u8> {
        (self as u8).checked_sub(Self::Tex0 as u8)
    }
}

/// How vertex data for a particular attribute is supplied.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VtxInputType {
    /// Attribute is not present in the vertex.
    #[default]
    None = 0,
    /// Data is inlined in the vertex stream.
    Direct = 1,
    /// 8-bit index into an external array.
    Index8 = 2,
    /// 16-bit index into an external array.
    Index16 = 3,
}

impl VtxInputType {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => Self::None,
            1 => Self::Direct,
            2 => Self::Index8,
            _ => Self::Index16,
        }
    }

    pub fn is_indexed(self) -> bool {
        matches!(self, Self::Index8 | Self::Index16)
    }
}

/// Numeric component types for position, normal and texcoord attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompType {
    U8 = 0,
    S8 = 1,
    U16 = 2,
    S16 = 3,
    F32 = 4,
}

impl CompType {
    /// Unknown encodings read as F32.
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::U8,
            1 => Self::S8,
            2 => Self::U16,
            3 => Self::S16,
            _ => Self::F32,
        }
    }

    pub fn size(self) -> usize {
        match self {
            Self::U8 | Self::S8 => 1,
            Self::U16 | Self::S16 => 2,
            Self::F32 => 4,
        }
    }
}

/// Color component encodings as they appear in a command stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ColorType {
    Rgb565 = 0,
    Rgb8 = 1,
    Rgbx8 = 2,
    Rgba4 = 3,
    Rgba6 = 4,
    Rgba8 = 5,
}

impl ColorType {
    /// Unknown encodings read as RGBA8.
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Rgb565,
            1 => Self::Rgb8,
            2 => Self::Rgbx8,
            3 => Self::Rgba4,
            4 => Self::Rgba6,
            _ => Self::Rgba8,
        }
    }

    /// Bytes one color occupies in a command stream.
    pub fn stream_size(self) -> usize {
        match self {
            Self::Rgb565 | Self::Rgba4 => 2,
            Self::Rgb8 | Self::Rgba6 => 3,
            Self::Rgbx8 | Self::Rgba8 => 4,
        }
    }
}

/// Bytes every direct color occupies in the capture buffer.
pub const WIRE_COLOR_SIZE: usize = 4;

/// Descriptor for a single vertex attribute: which attribute slot it occupies
/// and how the data is sourced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VtxDesc {
    pub attr: VtxAttr,
    pub input_type: VtxInputType,
}

impl VtxDesc {
    pub const fn new(attr: VtxAttr, input_type: VtxInputType) -> Self {
        Self { attr, input_type }
    }
}

/// Per-format-table description of a single attribute's binary layout.
///
/// * `count`     -- the GX count enum (XY/XYZ, NRM/NBT, RGB/RGBA, S/ST).
/// * `comp_type` -- `CompType` for numeric attributes, `ColorType` for colors.
/// * `frac`      -- fixed-point fractional bit count.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VtxAttrFmt {
    pub count: u8,
    pub comp_type: u8,
    pub frac: u8,
}

impl VtxAttrFmt {
    /// Number of numeric elements a direct attribute carries.
    pub fn elements(&self, attr: VtxAttr) -> usize {
        match attr {
            VtxAttr::Position => {
                if self.count == 0 {
                    2
                } else {
                    3
                }
            }
            VtxAttr::Normal => {
                if self.count == 0 {
                    3
                } else {
                    9
                }
            }
            a if a.tex_index().is_some() => {
                if self.count == 0 {
                    1
                } else {
                    2
                }
            }
            _ => 1,
        }
    }

    /// Bytes a direct numeric attribute occupies.
    pub fn numeric_size(&self, attr: VtxAttr) -> usize {
        self.elements(attr) * self.numeric_type().size()
    }

    pub fn numeric_type(&self) -> CompType {
        CompType::from_u8(self.comp_type)
    }

    pub fn color_type(&self) -> ColorType {
        ColorType::from_u8(self.comp_type)
    }
}

/// External array backing an indexed attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VtxArray {
    pub base: ImageKey,
    pub stride: u32,
}

// ---------------------------------------------------------------------------
// Texture bindings
// ---------------------------------------------------------------------------

/// TLUT attached to a texture map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlutBinding {
    pub image: ImageKey,
    pub format: TlutFormat,
}

/// One of the eight texture map bindings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexBinding {
    pub image: Option<ImageKey>,
    pub width: u16,
    pub height: u16,
    /// Raw GX texture format code.
    pub format: u8,
    pub wrap_s: u8,
    pub wrap_t: u8,
    pub min_filter: u8,
    pub mag_filter: u8,
    pub min_lod: f32,
    pub max_lod: f32,
    pub lod_bias: f32,
    pub tlut: Option<TlutBinding>,
}

impl Default for TexBinding {
    fn default() -> Self {
        Self {
            image: None,
            width: 0,
            height: 0,
            format: 0,
            wrap_s: 0,
            wrap_t: 0,
            min_filter: 1,
            mag_filter: 1,
            min_lod: 0.0,
            max_lod: 0.0,
            lod_bias: 0.0,
            tlut: None,
        }
    }
}

impl TexBinding {
    pub fn valid(&self) -> bool {
        self.image.is_some() && self.width > 0 && self.height > 0
    }
}

/// Texture coordinate generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TexGen {
    pub func: u8,
    pub src: u8,
    pub mtx: u8,
}

impl TexGen {
    fn power_on(n: u8) -> Self {
        Self {
            func: 1,    // GX_TG_MTX2x4
            src: 4 + n, // GX_TG_TEX0 + n
            mtx: 60,    // GX_IDENTITY
        }
    }

    /// Decode a transform-unit texgen word: type bits 4..7, source row 7..12.
    pub fn from_xf(word: u32, mtx: u8) -> Self {
        Self {
            func: ((word >> 4) & 0x7) as u8,
            src: ((word >> 7) & 0x1F) as u8,
            mtx,
        }
    }
}

// ---------------------------------------------------------------------------
// Blend, depth, and rasterizer state
// ---------------------------------------------------------------------------

/// Blend-mode factor selectors matching GX blend factor enums.
///
/// Codes 2 and 3 mean destination color for the source factor and source
/// color for the destination factor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlendFactor {
    Zero = 0,
    #[default]
    One = 1,
    SrcColor = 2,
    InvSrcColor = 3,
    SrcAlpha = 4,
    InvSrcAlpha = 5,
    DstAlpha = 6,
    InvDstAlpha = 7,
}

impl BlendFactor {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 7 {
            0 => Self::Zero,
            1 => Self::One,
            2 => Self::SrcColor,
            3 => Self::InvSrcColor,
            4 => Self::SrcAlpha,
            5 => Self::InvSrcAlpha,
            6 => Self::DstAlpha,
            _ => Self::InvDstAlpha,
        }
    }
}

/// Blend equation selector (GX_BM_*).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlendType {
    #[default]
    None = 0,
    Blend = 1,
    Logic = 2,
    Subtract = 3,
}

/// Logic-op selectors (used when blend type is GX_BM_LOGIC).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LogicOp {
    Clear = 0,
    And = 1,
    RevAnd = 2,
    #[default]
    Copy = 3,
    InvAnd = 4,
    Noop = 5,
    Xor = 6,
    Or = 7,
    Nor = 8,
    Equiv = 9,
    Inv = 10,
    RevOr = 11,
    InvCopy = 12,
    InvOr = 13,
    Nand = 14,
    Set = 15,
}

impl LogicOp {
    const ALL: [LogicOp; 16] = [
        Self::Clear,
        Self::And,
        Self::RevAnd,
        Self::Copy,
        Self::InvAnd,
        Self::Noop,
        Self::Xor,
        Self::Or,
        Self::Nor,
        Self::Equiv,
        Self::Inv,
        Self::RevOr,
        Self::InvCopy,
        Self::InvOr,
        Self::Nand,
        Self::Set,
    ];

    pub fn from_bits(bits: u32) -> Self {
        Self::ALL[(bits & 0xF) as usize]
    }
}

/// Full blend-mode state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendMode {
    pub mode: BlendType,
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub logic_op: LogicOp,
}

impl Default for BlendMode {
    fn default() -> Self {
        Self {
            mode: BlendType::None,
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::Zero,
            logic_op: LogicOp::Copy,
        }
    }
}

/// GX compare function, shared by depth test and alpha compare.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompareFunction {
    Never = 0,
    Less = 1,
    Equal = 2,
    #[default]
    LessEqual = 3,
    Greater = 4,
    NotEqual = 5,
    GreaterEqual = 6,
    Always = 7,
}

impl CompareFunction {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 7 {
            0 => Self::Never,
            1 => Self::Less,
            2 => Self::Equal,
            3 => Self::LessEqual,
            4 => Self::Greater,
            5 => Self::NotEqual,
            6 => Self::GreaterEqual,
            _ => Self::Always,
        }
    }
}

/// Z-buffer (depth) mode state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZMode {
    pub enable: bool,
    pub function: CompareFunction,
    pub update: bool,
}

impl Default for ZMode {
    fn default() -> Self {
        Self {
            enable: true,
            function: CompareFunction::LessEqual,
            update: true,
        }
    }
}

/// How the two alpha comparisons are combined.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AlphaOp {
    #[default]
    And = 0,
    Or = 1,
    Xor = 2,
    Xnor = 3,
}

impl AlphaOp {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => Self::And,
            1 => Self::Or,
            2 => Self::Xor,
            _ => Self::Xnor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlphaCompare {
    pub comp0: CompareFunction,
    pub ref0: u8,
    pub op: AlphaOp,
    pub comp1: CompareFunction,
    pub ref1: u8,
}

impl Default for AlphaCompare {
    fn default() -> Self {
        Self {
            comp0: CompareFunction::Always,
            ref0: 0,
            op: AlphaOp::And,
            comp1: CompareFunction::Always,
            ref1: 0,
        }
    }
}

/// Scissor rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scissor {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Default for Scissor {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 640,
            height: 480,
        }
    }
}

/// Viewport transform parameters (maps clip space to screen space).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 640.0,
            height: 480.0,
            near: 0.0,
            far: 1.0,
        }
    }
}

/// Face-culling mode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CullMode {
    None = 0,
    Front = 1,
    #[default]
    Back = 2,
    All = 3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    pub kind: u8,
    pub start: f32,
    pub end: f32,
    pub near: f32,
    pub far: f32,
    pub color: [u8; 4],
    /// Fog parameter registers as written by a command stream.
    pub raw_params: [u32; 3],
}

impl Default for Fog {
    fn default() -> Self {
        Self {
            kind: 0,
            start: 0.0,
            end: 0.0,
            near: 0.0,
            far: 0.0,
            color: [0, 0, 0, 255],
            raw_params: [0; 3],
        }
    }
}

// ---------------------------------------------------------------------------
// Matrix state
// ---------------------------------------------------------------------------

/// All matrix memory managed by GX.
///
/// The GameCube provides 10 position, normal and texture matrix slots, plus
/// a single projection. Slot matrices are 3x4 row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct GxMatrices {
    pub projection: Projection,
    pub position: [[f32; 12]; MATRIX_SLOTS],
    pub normal: [[f32; 12]; MATRIX_SLOTS],
    pub texture: [[f32; 12]; MATRIX_SLOTS],
    /// Index of the currently active position matrix. Not clamped; draw
    /// dispatch falls back to slot 0 when it is out of range.
    pub current_position_mtx: u8,
}

impl Default for GxMatrices {
    fn default() -> Self {
        Self {
            projection: Projection::default(),
            position: [IDENTITY_3X4; MATRIX_SLOTS],
            normal: [IDENTITY_3X4; MATRIX_SLOTS],
            texture: [IDENTITY_3X4; MATRIX_SLOTS],
            current_position_mtx: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level GX state
// ---------------------------------------------------------------------------

/// Complete mutable register state of the GX pipeline.
///
/// Draws consume whatever is current when they are issued, so a later write
/// always overrides an earlier one.
#[derive(Debug, Clone, PartialEq)]
pub struct GxState {
    // -- Vertex layout ---------------------------------------------------
    pub vertex_descriptors: [VtxDesc; VtxAttr::COUNT],
    pub vertex_formats: [[VtxAttrFmt; VtxAttr::COUNT]; VERTEX_FORMATS],
    pub arrays: [Option<VtxArray>; VtxAttr::COUNT],

    // -- TEV pipeline ----------------------------------------------------
    pub tev_stages: [TevStage; MAX_TEV_STAGES as usize],
    /// Number of active TEV stages (0..=16).
    pub num_tev_stages: u8,
    /// Color registers PREV, REG0, REG1, REG2 as signed 10-bit values.
    pub tev_colors: [[i16; 4]; 4],
    pub tev_konst_colors: [[u8; 4]; 4],
    /// Four swap tables mapping output RGBA to input channels.
    pub swap_tables: [[u8; 4]; 4],

    // -- Textures --------------------------------------------------------
    pub textures: [TexBinding; MAX_TEX_MAPS],
    pub tex_gens: [TexGen; MAX_TEX_GENS as usize],
    pub num_tex_gens: u8,

    // -- Transform / lighting --------------------------------------------
    pub matrices: GxMatrices,
    pub lighting: LightingState,
    pub viewport: Viewport,
    pub scissor: Scissor,

    // -- Pixel pipeline --------------------------------------------------
    pub blend_mode: BlendMode,
    pub z_mode: ZMode,
    pub alpha_compare: AlphaCompare,
    pub cull_mode: CullMode,
    pub color_update: bool,
    pub alpha_update: bool,
    pub fog: Fog,

    // -- Copy / clear ----------------------------------------------------
    pub copy_clear_color: [u8; 4],
    /// 24-bit clear depth.
    pub copy_clear_z: u32,
}

fn default_vertex_descriptors() -> [VtxDesc; VtxAttr::COUNT] {
    VtxAttr::ALL.map(|attr| VtxDesc::new(attr, VtxInputType::None))
}

fn default_tev_stages() -> [TevStage; MAX_TEV_STAGES as usize] {
    let mut stages = [TevStage::default(); MAX_TEV_STAGES as usize];
    stages[0] = TevStage::rasterized();
    stages
}

impl GxState {
    /// Create a `GxState` initialized to the power-on configuration.
    pub fn new() -> Self {
        Self {
            vertex_descriptors: default_vertex_descriptors(),
            vertex_formats: [[VtxAttrFmt::default(); VtxAttr::COUNT]; VERTEX_FORMATS],
            arrays: [None; VtxAttr::COUNT],

            tev_stages: default_tev_stages(),
            num_tev_stages: 1,
            tev_colors: [[0; 4]; 4],
            tev_konst_colors: [[255; 4]; 4],
            swap_tables: [[0, 1, 2, 3], [0, 0, 0, 3], [1, 1, 1, 3], [2, 2, 2, 3]],

            textures: [TexBinding::default(); MAX_TEX_MAPS],
            tex_gens: core::array::from_fn(|n| TexGen::power_on(n as u8)),
            num_tex_gens: 0,

            matrices: GxMatrices::default(),
            lighting: LightingState::new(),
            viewport: Viewport::default(),
            scissor: Scissor::default(),

            blend_mode: BlendMode::default(),
            z_mode: ZMode::default(),
            alpha_compare: AlphaCompare::default(),
            cull_mode: CullMode::default(),
            color_update: true,
            alpha_update: true,
            fog: Fog::default(),

            copy_clear_color: [0, 0, 0, 255],
            copy_clear_z: 0x00FF_FFFF,
        }
    }

    /// Reset the entire GX state to power-on defaults.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    // -- Vertex descriptor helpers ---------------------------------------

    pub fn set_vtx_desc(&mut self, attr: VtxAttr, input_type: VtxInputType) {
        self.vertex_descriptors[attr as usize].input_type = input_type;
    }

    pub fn clear_vtx_descs(&mut self) {
        for desc in &mut self.vertex_descriptors {
            desc.input_type = VtxInputType::None;
        }
    }

    pub fn vtx_desc(&self, attr: VtxAttr) -> VtxInputType {
        self.vertex_descriptors[attr as usize].input_type
    }

    /// Set the layout of one attribute in format table `fmt_index`.
    pub fn set_vtx_attr_fmt(
        &mut self,
        fmt_index: u8,
        attr: VtxAttr,
        count: u8,
        comp_type: u8,
        frac: u8,
    ) {
        if let Some(table) = self.vertex_formats.get_mut(fmt_index as usize) {
            table[attr as usize] = VtxAttrFmt {
                count,
                comp_type,
                frac: frac.min(31),
            };
        }
    }

    pub fn vtx_attr_fmt(&self, fmt_index: u8, attr: VtxAttr) -> VtxAttrFmt {
        self.vertex_formats
            .get(fmt_index as usize)
            .map(|table| table[attr as usize])
            .unwrap_or_default()
    }

    /// Bind the external array for an indexed attribute.
    pub fn set_array(&mut self, attr: VtxAttr, base: ImageKey, stride: u32) {
        self.arrays[attr as usize] = Some(VtxArray { base, stride });
    }

    pub fn has_color0(&self) -> bool {
        self.vtx_desc(VtxAttr::Color0) != VtxInputType::None
    }

    /// Bytes one vertex occupies in the capture buffer for format `fmt`.
    ///
    /// Indexed attributes take 1 or 2 bytes, direct colors always 4, direct
    /// matrix indices 1, everything else `elements * component size`.
    pub fn stride(&self, fmt: u8) -> usize {
        self.vertex_size(fmt, |_| WIRE_COLOR_SIZE)
    }

    /// Bytes one vertex occupies in a command stream for format `fmt`.
    /// Identical to [`stride`](Self::stride) except that colors take their
    /// encoded size.
    pub fn stream_stride(&self, fmt: u8) -> usize {
        self.vertex_size(fmt, |f| f.color_type().stream_size())
    }

    fn vertex_size(&self, fmt: u8, color_size: impl Fn(&VtxAttrFmt) -> usize) -> usize {
        VtxAttr::ALL
            .iter()
            .map(|&attr| {
                let f = self.vtx_attr_fmt(fmt, attr);
                match self.vtx_desc(attr) {
                    VtxInputType::None => 0,
                    VtxInputType::Index8 => 1,
                    VtxInputType::Index16 => 2,
                    VtxInputType::Direct if attr.is_matrix_index() => 1,
                    VtxInputType::Direct if attr.is_color() => color_size(&f),
                    VtxInputType::Direct => f.numeric_size(attr),
                }
            })
            .sum()
    }

    // -- TEV helpers -----------------------------------------------------

    pub fn set_num_tev_stages(&mut self, n: u8) {
        self.num_tev_stages = n.min(MAX_TEV_STAGES);
    }

    fn stage_mut(&mut self, stage: u8) -> Option<&mut TevStage> {
        self.tev_stages.get_mut(stage as usize)
    }

    /// Bind a texture coordinate, texture map and color channel to a stage.
    pub fn set_tev_order(&mut self, stage: u8, tex_coord: u8, tex_map: u8, channel: u8) {
        if let Some(s) = self.stage_mut(stage) {
            s.tex_coord = tex_coord;
            s.tex_map = tex_map;
            s.channel = channel;
        }
    }

    pub fn set_tev_color_in(
        &mut self,
        stage: u8,
        a: TevColorArg,
        b: TevColorArg,
        c: TevColorArg,
        d: TevColorArg,
    ) {
        if let Some(s) = self.stage_mut(stage) {
            s.color_in = [a, b, c, d];
        }
    }

    pub fn set_tev_alpha_in(
        &mut self,
        stage: u8,
        a: TevAlphaArg,
        b: TevAlphaArg,
        c: TevAlphaArg,
        d: TevAlphaArg,
    ) {
        if let Some(s) = self.stage_mut(stage) {
            s.alpha_in = [a, b, c, d];
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_tev_color_op(
        &mut self,
        stage: u8,
        op: TevOp,
        bias: TevBias,
        scale: TevScale,
        clamp: bool,
        dest: TevRegId,
    ) {
        if let Some(s) = self.stage_mut(stage) {
            s.color_op = op;
            s.color_bias = bias;
            s.color_scale = scale;
            s.color_clamp = clamp;
            s.color_dest = dest;
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_tev_alpha_op(
        &mut self,
        stage: u8,
        op: TevOp,
        bias: TevBias,
        scale: TevScale,
        clamp: bool,
        dest: TevRegId,
    ) {
        if let Some(s) = self.stage_mut(stage) {
            s.alpha_op = op;
            s.alpha_bias = bias;
            s.alpha_scale = scale;
            s.alpha_clamp = clamp;
            s.alpha_dest = dest;
        }
    }

    /// Set a color register (0 = PREV, 1..=3 = REG0..REG2) from 8-bit color.
    pub fn set_tev_color(&mut self, reg: u8, color: [u8; 4]) {
        self.set_tev_color_s10(reg, color.map(i16::from));
    }

    /// Set a color register with signed 10-bit components.
    pub fn set_tev_color_s10(&mut self, reg: u8, color: [i16; 4]) {
        if let Some(slot) = self.tev_colors.get_mut(reg as usize) {
            *slot = color.map(|v| v.clamp(-1024, 1023));
        }
    }

    pub fn set_tev_konst_color(&mut self, reg: u8, color: [u8; 4]) {
        if let Some(slot) = self.tev_konst_colors.get_mut(reg as usize) {
            *slot = color;
        }
    }

    pub fn set_tev_k_color_sel(&mut self, stage: u8, sel: u8) {
        if let Some(s) = self.stage_mut(stage) {
            s.konst_color_sel = sel;
        }
    }

    pub fn set_tev_k_alpha_sel(&mut self, stage: u8, sel: u8) {
        if let Some(s) = self.stage_mut(stage) {
            s.konst_alpha_sel = sel;
        }
    }

    pub fn set_tev_swap_mode(&mut self, stage: u8, ras_swap: u8, tex_swap: u8) {
        if let Some(s) = self.stage_mut(stage) {
            s.ras_swap = ras_swap & 3;
            s.tex_swap = tex_swap & 3;
        }
    }

    pub fn set_tev_swap_table(&mut self, table: u8, r: u8, g: u8, b: u8, a: u8) {
        if let Some(t) = self.swap_tables.get_mut(table as usize) {
            *t = [r & 3, g & 3, b & 3, a & 3];
        }
    }

    // -- Texture helpers -------------------------------------------------

    fn binding_mut(&mut self, map: u8) -> Option<&mut TexBinding> {
        self.textures.get_mut(map as usize)
    }

    /// Bind image bytes, dimensions and format to a texture map.
    pub fn set_tex_image(&mut self, map: u8, image: ImageKey, width: u16, height: u16, format: u8) {
        if let Some(b) = self.binding_mut(map) {
            b.image = Some(image);
            b.width = width;
            b.height = height;
            b.format = format;
        }
    }

    pub fn set_tex_dimensions(&mut self, map: u8, width: u16, height: u16, format: u8) {
        if let Some(b) = self.binding_mut(map) {
            b.width = width;
            b.height = height;
            b.format = format;
        }
    }

    /// Point a texture map at new image bytes; `None` invalidates the binding.
    pub fn set_tex_address(&mut self, map: u8, image: Option<ImageKey>) {
        if let Some(b) = self.binding_mut(map) {
            b.image = image;
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_tex_lookup(
        &mut self,
        map: u8,
        wrap_s: u8,
        wrap_t: u8,
        min_filter: u8,
        mag_filter: u8,
        min_lod: f32,
        max_lod: f32,
        lod_bias: f32,
    ) {
        if let Some(b) = self.binding_mut(map) {
            b.wrap_s = wrap_s;
            b.wrap_t = wrap_t;
            b.min_filter = min_filter;
            b.mag_filter = mag_filter;
            b.min_lod = min_lod;
            b.max_lod = max_lod;
            b.lod_bias = lod_bias;
        }
    }

    pub fn set_tex_tlut(&mut self, map: u8, tlut: Option<TlutBinding>) {
        if let Some(b) = self.binding_mut(map) {
            b.tlut = tlut;
        }
    }

    pub fn set_num_tex_gens(&mut self, n: u8) {
        self.num_tex_gens = n.min(MAX_TEX_GENS);
    }

    pub fn set_tex_coord_gen(&mut self, index: u8, func: u8, src: u8, mtx: u8) {
        if let Some(g) = self.tex_gens.get_mut(index as usize) {
            *g = TexGen { func, src, mtx };
        }
    }

    /// True when stage 0 samples a texture map that has a valid binding.
    pub fn stage0_textured(&self) -> bool {
        let map = self.tev_stages[0].tex_map;
        self.textures
            .get(map as usize)
            .is_some_and(|binding| binding.valid())
    }

    // -- Matrix helpers --------------------------------------------------

    /// Load a row-major 4x4 projection.
    pub fn set_projection(&mut self, mtx: &[f32; 16], kind: ProjectionType) {
        self.matrices.projection = Projection::from_matrix(mtx, kind);
    }

    pub fn projection(&self) -> (ProjectionType, [f32; 6]) {
        let p = &self.matrices.projection;
        (p.kind, p.params())
    }

    pub fn load_pos_mtx(&mut self, slot: u8, mtx: &[f32; 12]) {
        if let Some(m) = self.matrices.position.get_mut(slot as usize) {
            *m = *mtx;
        }
    }

    pub fn load_nrm_mtx(&mut self, slot: u8, mtx: &[f32; 9]) {
        if let Some(m) = self.matrices.normal.get_mut(slot as usize) {
            *m = normal_to_3x4(mtx);
        }
    }

    pub fn load_tex_mtx(&mut self, slot: u8, mtx: &[f32; 12]) {
        if let Some(m) = self.matrices.texture.get_mut(slot as usize) {
            *m = *mtx;
        }
    }

    pub fn set_current_mtx(&mut self, slot: u8) {
        self.matrices.current_position_mtx = slot;
    }

    /// The active position matrix, falling back to slot 0 when the index is
    /// out of range.
    pub fn current_pos_mtx(&self) -> &[f32; 12] {
        let slot = self.matrices.current_position_mtx as usize;
        self.matrices
            .position
            .get(slot)
            .unwrap_or(&self.matrices.position[0])
    }

    pub fn set_viewport(&mut self, x: f32, y: f32, w: f32, h: f32, near: f32, far: f32) {
        self.viewport = Viewport {
            x,
            y,
            width: w,
            height: h,
            near,
            far,
        };
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_scissor(&mut self, x: u16, y: u16, w: u16, h: u16) {
        self.scissor = Scissor {
            x,
            y,
            width: w,
            height: h,
        };
    }

    pub fn scissor(&self) -> Scissor {
        self.scissor
    }

    // -- Blend / depth / rasterizer helpers ------------------------------

    pub fn set_blend_mode(
        &mut self,
        mode: BlendType,
        src: BlendFactor,
        dst: BlendFactor,
        logic: LogicOp,
    ) {
        self.blend_mode = BlendMode {
            mode,
            src_factor: src,
            dst_factor: dst,
            logic_op: logic,
        };
    }

    pub fn set_z_mode(&mut self, enable: bool, function: CompareFunction, update: bool) {
        self.z_mode = ZMode {
            enable,
            function,
            update,
        };
    }

    pub fn set_alpha_compare(
        &mut self,
        comp0: CompareFunction,
        ref0: u8,
        op: AlphaOp,
        comp1: CompareFunction,
        ref1: u8,
    ) {
        self.alpha_compare = AlphaCompare {
            comp0,
            ref0,
            op,
            comp1,
            ref1,
        };
    }

    pub fn set_cull_mode(&mut self, mode: CullMode) {
        self.cull_mode = mode;
    }

    pub fn set_color_update(&mut self, enable: bool) {
        self.color_update = enable;
    }

    pub fn set_alpha_update(&mut self, enable: bool) {
        self.alpha_update = enable;
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_fog(
        &mut self,
        kind: u8,
        start: f32,
        end: f32,
        near: f32,
        far: f32,
        color: [u8; 4],
    ) {
        self.fog.kind = kind;
        self.fog.start = start;
        self.fog.end = end;
        self.fog.near = near;
        self.fog.far = far;
        self.fog.color = color;
    }

    // -- Channel / lighting helpers --------------------------------------

    pub fn set_num_chans(&mut self, n: u8) {
        self.lighting.set_num_channels(n);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_chan_ctrl(
        &mut self,
        channel: u8,
        enable: bool,
        amb_src: u8,
        mat_src: u8,
        light_mask: u8,
        diff_fn: u8,
        attn_fn: u8,
    ) {
        self.lighting
            .set_chan_ctrl(channel, enable, amb_src, mat_src, light_mask, diff_fn, attn_fn);
    }

    pub fn set_chan_amb_color(&mut self, channel: u8, color: [u8; 4]) {
        self.lighting.set_amb_color(channel, color);
    }

    pub fn set_chan_mat_color(&mut self, channel: u8, color: [u8; 4]) {
        self.lighting.set_mat_color(channel, color);
    }

    // -- Copy / clear helpers --------------------------------------------

    /// Set the EFB copy clear color and 24-bit depth.
    pub fn set_copy_clear(&mut self, color: [u8; 4], z: u32) {
        self.copy_clear_color = color;
        self.copy_clear_z = z & 0x00FF_FFFF;
    }
}

impl Default for GxState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_default_has_sane_values() {
        let state = GxState::new();
        assert_eq!(state.num_tev_stages, 1);
        assert_eq!(state.lighting.num_channels, 1);
        assert_eq!(state.num_tex_gens, 0);
        assert!(state.z_mode.enable);
        assert!(state.z_mode.update);
        assert_eq!(state.z_mode.function, CompareFunction::LessEqual);
        assert!(state.color_update);
        assert!(state.alpha_update);
        assert_eq!(state.cull_mode, CullMode::Back);
        assert_eq!(state.blend_mode.mode, BlendType::None);
        assert_eq!(state.blend_mode.src_factor, BlendFactor::One);
        assert_eq!(state.blend_mode.dst_factor, BlendFactor::Zero);
        assert_eq!(state.copy_clear_color, [0, 0, 0, 255]);
        assert_eq!(state.copy_clear_z, 0x00FF_FFFF);
        assert_eq!(state.viewport().width, 640.0);
        assert_eq!(state.scissor().height, 480);
    }

    #[test]
    fn power_on_stage0_outputs_rasterized_color() {
        let state = GxState::new();
        let s0 = &state.tev_stages[0];
        assert_eq!(s0.color_in[3], TevColorArg::Rasc);
        assert_eq!(s0.alpha_in[3], TevAlphaArg::Rasa);
        assert_eq!(s0.color_in[..3], [TevColorArg::Zero; 3]);
        assert!(!state.stage0_textured());
    }

    #[test]
    fn vtx_attr_round_trip() {
        for i in 0..=20u8 {
            let attr = VtxAttr::from_index(i).unwrap();
            assert_eq!(attr as u8, i);
        }
        assert!(VtxAttr::from_index(21).is_none());
        assert_eq!(VtxAttr::tex(3), Some(VtxAttr::Tex3));
        assert_eq!(VtxAttr::tex(8), None);
        assert_eq!(VtxAttr::Tex5.tex_index(), Some(5));
        assert_eq!(VtxAttr::Color1.tex_index(), None);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut state = GxState::new();
        state.set_num_tev_stages(8);
        state.set_cull_mode(CullMode::None);
        state.set_z_mode(false, CompareFunction::Always, false);
        state.set_blend_mode(
            BlendType::Blend,
            BlendFactor::SrcAlpha,
            BlendFactor::InvSrcAlpha,
            LogicOp::Noop,
        );
        state.reset();
        assert_eq!(state, GxState::new());
    }

    #[test]
    fn set_vtx_desc_modifies_correct_slot() {
        let mut state = GxState::new();
        state.set_vtx_desc(VtxAttr::Position, VtxInputType::Direct);
        state.set_vtx_desc(VtxAttr::Normal, VtxInputType::Index16);
        assert_eq!(state.vtx_desc(VtxAttr::Position), VtxInputType::Direct);
        assert_eq!(state.vtx_desc(VtxAttr::Normal), VtxInputType::Index16);
        state.clear_vtx_descs();
        assert!(state
            .vertex_descriptors
            .iter()
            .all(|d| d.input_type == VtxInputType::None));
    }

    #[test]
    fn out_of_range_setters_are_ignored() {
        let mut state = GxState::new();
        let before = state.clone();
        state.set_vtx_attr_fmt(8, VtxAttr::Position, 1, 4, 0);
        state.set_tev_order(16, 0, 0, 4);
        state.set_tev_color(4, [1, 2, 3, 4]);
        state.set_tev_konst_color(9, [1, 2, 3, 4]);
        state.set_tex_image(8, ImageKey(1), 8, 8, 0);
        state.load_pos_mtx(10, &IDENTITY_3X4);
        state.load_tex_mtx(255, &IDENTITY_3X4);
        state.set_tex_coord_gen(8, 0, 0, 0);
        assert_eq!(state, before);
    }

    #[test]
    fn counts_are_clamped() {
        let mut state = GxState::new();
        state.set_num_tev_stages(40);
        state.set_num_tex_gens(12);
        state.set_num_chans(7);
        assert_eq!(state.num_tev_stages, 16);
        assert_eq!(state.num_tex_gens, 8);
        assert_eq!(state.lighting.num_channels, 4);
    }

    #[test]
    fn stride_counts_direct_and_indexed() {
        let mut state = GxState::new();
        state.set_vtx_desc(VtxAttr::PositionMatrixIdx, VtxInputType::Direct);
        state.set_vtx_desc(VtxAttr::Position, VtxInputType::Direct);
        state.set_vtx_desc(VtxAttr::Normal, VtxInputType::Index8);
        state.set_vtx_desc(VtxAttr::Color0, VtxInputType::Direct);
        state.set_vtx_desc(VtxAttr::Tex0, VtxInputType::Direct);
        state.set_vtx_desc(VtxAttr::Tex1, VtxInputType::Index16);
        state.set_vtx_attr_fmt(0, VtxAttr::Position, 1, CompType::S16 as u8, 4);
        state.set_vtx_attr_fmt(0, VtxAttr::Color0, 1, ColorType::Rgb565 as u8, 0);
        state.set_vtx_attr_fmt(0, VtxAttr::Tex0, 1, CompType::F32 as u8, 0);
        // 1 + 3*2 + 1 + 4 + 2*4 + 2
        assert_eq!(state.stride(0), 22);
        // Stream color is 2 bytes instead of 4.
        assert_eq!(state.stream_stride(0), 20);
    }

    #[test]
    fn nbt_normals_carry_nine_elements() {
        let mut state = GxState::new();
        state.set_vtx_desc(VtxAttr::Normal, VtxInputType::Direct);
        state.set_vtx_attr_fmt(2, VtxAttr::Normal, 1, CompType::S8 as u8, 0);
        assert_eq!(state.stride(2), 9);
    }

    #[test]
    fn current_matrix_falls_back_to_slot_zero() {
        let mut state = GxState::new();
        let mut m = IDENTITY_3X4;
        m[3] = 7.0;
        state.load_pos_mtx(0, &m);
        state.set_current_mtx(12);
        assert_eq!(state.current_pos_mtx()[3], 7.0);
    }

    #[test]
    fn texture_binding_validity() {
        let mut state = GxState::new();
        state.set_tev_order(0, 0, 0, 4);
        assert!(!state.stage0_textured());
        state.set_tex_image(0, ImageKey(3), 8, 8, 0);
        assert!(state.stage0_textured());
        state.set_tex_address(0, None);
        assert!(!state.stage0_textured());
    }

    #[test]
    fn projection_query_returns_params() {
        let mut state = GxState::new();
        let mut mtx = [0.0f32; 16];
        mtx[0] = 2.0;
        mtx[2] = 0.25;
        mtx[5] = 3.0;
        mtx[10] = -1.0;
        mtx[11] = -0.5;
        mtx[14] = -1.0;
        state.set_projection(&mtx, ProjectionType::Perspective);
        let (kind, params) = state.projection();
        assert_eq!(kind, ProjectionType::Perspective);
        assert_eq!(params, [2.0, 0.25, 3.0, 0.0, -1.0, -0.5]);
    }

    #[test]
    fn copy_clear_z_masked_to_24_bits() {
        let mut state = GxState::new();
        state.set_copy_clear([1, 2, 3, 4], 0xFFFF_FFFF);
        assert_eq!(state.copy_clear_z, 0x00FF_FFFF);
        assert_eq!(state.copy_clear_color, [1, 2, 3, 4]);
    }

    #[test]
    fn tev_color_registers_are_signed() {
        let mut state = GxState::new();
        state.set_tev_color_s10(1, [-2000, 100, 2000, 255]);
        assert_eq!(state.tev_colors[1], [-1024, 100, 1023, 255]);
    }
}

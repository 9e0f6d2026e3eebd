// TEV (Texture Environment) stage model and shader-family classification.
//
// The GameCube GPU has 16 TEV stages that combine textures, rasterized
// colors, and constant colors. Each stage computes
//   d OP ((1 - c) * a + c * b) + bias
// with configurable scale and clamping. Rather than compile a shader per
// combiner setup, the shim recognises the handful of idioms games actually
// use and maps each to a fixed `ShaderProgram`.

use super::state::{GxState, TEX_MAP_NULL};

// ---------------------------------------------------------------------------
// TEV enums
// ---------------------------------------------------------------------------

/// Color combiner input selector. Values match the hardware encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TevColorArg {
    Cprev = 0,
    Aprev = 1,
    C0 = 2,
    A0 = 3,
    C1 = 4,
    A1 = 5,
    C2 = 6,
    A2 = 7,
    Texc = 8,
    Texa = 9,
    Rasc = 10,
    Rasa = 11,
    One = 12,
    Half = 13,
    Konst = 14,
    Zero = 15,
}

impl TevColorArg {
    const ALL: [TevColorArg; 16] = [
        Self::Cprev,
        Self::Aprev,
        Self::C0,
        Self::A0,
        Self::C1,
        Self::A1,
        Self::C2,
        Self::A2,
        Self::Texc,
        Self::Texa,
        Self::Rasc,
        Self::Rasa,
        Self::One,
        Self::Half,
        Self::Konst,
        Self::Zero,
    ];

    /// Decode the low 4 bits of a register field.
    pub fn from_bits(bits: u32) -> Self {
        Self::ALL[(bits & 0xF) as usize]
    }

    /// One of the three color registers or the per-stage konst color.
    pub fn is_constant(self) -> bool {
        matches!(self, Self::C0 | Self::C1 | Self::C2 | Self::Konst)
    }
}

/// Alpha combiner input selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TevAlphaArg {
    Aprev = 0,
    A0 = 1,
    A1 = 2,
    A2 = 3,
    Texa = 4,
    Rasa = 5,
    Konst = 6,
    Zero = 7,
}

impl TevAlphaArg {
    const ALL: [TevAlphaArg; 8] = [
        Self::Aprev,
        Self::A0,
        Self::A1,
        Self::A2,
        Self::Texa,
        Self::Rasa,
        Self::Konst,
        Self::Zero,
    ];

    pub fn from_bits(bits: u32) -> Self {
        Self::ALL[(bits & 0x7) as usize]
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TevOp {
    #[default]
    Add = 0,
    Sub = 1,
}

/// Bias applied after the combine. `Compare` marks the comparison modes,
/// where op and scale select a compare function instead.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TevBias {
    #[default]
    Zero = 0,
    AddHalf = 1,
    SubHalf = 2,
    Compare = 3,
}

impl TevBias {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => Self::Zero,
            1 => Self::AddHalf,
            2 => Self::SubHalf,
            _ => Self::Compare,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TevScale {
    #[default]
    Scale1 = 0,
    Scale2 = 1,
    Scale4 = 2,
    DivideBy2 = 3,
}

impl TevScale {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => Self::Scale1,
            1 => Self::Scale2,
            2 => Self::Scale4,
            _ => Self::DivideBy2,
        }
    }
}

/// Destination register for a TEV stage output.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TevRegId {
    /// The implicit "previous" register passed between stages.
    #[default]
    Prev = 0,
    Reg0 = 1,
    Reg1 = 2,
    Reg2 = 3,
}

impl TevRegId {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => Self::Prev,
            1 => Self::Reg0,
            2 => Self::Reg1,
            _ => Self::Reg2,
        }
    }
}

// ---------------------------------------------------------------------------
// TEV stage configuration
// ---------------------------------------------------------------------------

/// Complete configuration for a single TEV stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TevStage {
    /// Color channel inputs [a, b, c, d].
    pub color_in: [TevColorArg; 4],
    /// Alpha channel inputs [a, b, c, d].
    pub alpha_in: [TevAlphaArg; 4],

    pub color_op: TevOp,
    pub alpha_op: TevOp,
    pub color_bias: TevBias,
    pub alpha_bias: TevBias,
    pub color_clamp: bool,
    pub alpha_clamp: bool,
    pub color_scale: TevScale,
    pub alpha_scale: TevScale,
    pub color_dest: TevRegId,
    pub alpha_dest: TevRegId,

    /// Texture coordinate index, or `TEX_MAP_NULL`.
    pub tex_coord: u8,
    /// Texture map index, or `TEX_MAP_NULL`.
    pub tex_map: u8,
    /// Rasterized color channel (GX_COLOR0A0 = 4, GX_COLOR1A1 = 5, null = 0xFF).
    pub channel: u8,

    /// Konst color / alpha selectors (hardware register values).
    pub konst_color_sel: u8,
    pub konst_alpha_sel: u8,
    /// Swap table indices for the rasterized and texture inputs.
    pub ras_swap: u8,
    pub tex_swap: u8,
}

impl Default for TevStage {
    /// A pass-through stage: the output is the previous stage's color and
    /// alpha, untextured, with no rasterized channel.
    fn default() -> Self {
        Self {
            color_in: [
                TevColorArg::Zero,
                TevColorArg::Zero,
                TevColorArg::Zero,
                TevColorArg::Cprev,
            ],
            alpha_in: [
                TevAlphaArg::Zero,
                TevAlphaArg::Zero,
                TevAlphaArg::Zero,
                TevAlphaArg::Aprev,
            ],
            color_op: TevOp::Add,
            alpha_op: TevOp::Add,
            color_bias: TevBias::Zero,
            alpha_bias: TevBias::Zero,
            color_clamp: true,
            alpha_clamp: true,
            color_scale: TevScale::Scale1,
            alpha_scale: TevScale::Scale1,
            color_dest: TevRegId::Prev,
            alpha_dest: TevRegId::Prev,
            tex_coord: TEX_MAP_NULL,
            tex_map: TEX_MAP_NULL,
            channel: 0xFF,
            konst_color_sel: 0x0C,
            konst_alpha_sel: 0x1C,
            ras_swap: 0,
            tex_swap: 0,
        }
    }
}

impl TevStage {
    /// Power-on configuration of stage 0: output the rasterized color.
    pub fn rasterized() -> Self {
        Self {
            color_in: [
                TevColorArg::Zero,
                TevColorArg::Zero,
                TevColorArg::Zero,
                TevColorArg::Rasc,
            ],
            alpha_in: [
                TevAlphaArg::Zero,
                TevAlphaArg::Zero,
                TevAlphaArg::Zero,
                TevAlphaArg::Rasa,
            ],
            channel: 4,
            ..Self::default()
        }
    }

    pub fn references_texture(&self) -> bool {
        self.tex_map < 8
    }
}

// ---------------------------------------------------------------------------
// Shader programs
// ---------------------------------------------------------------------------

/// Fixed shader families the backend must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ShaderProgram {
    /// Output the rasterized vertex color.
    PassThrough = 0,
    /// Output the texture color.
    Replace = 1,
    /// Texture color times vertex color.
    Modulate = 2,
    /// Vertex color blended towards the texture by texture alpha.
    Decal = 3,
    /// Two constant colors interpolated by the textured result.
    ConstantBlend = 4,
}

/// Static pipeline description carried by each `ShaderProgram`.
#[derive(Debug)]
pub struct ProgramDescriptor {
    pub name: &'static str,
    pub samples_texture: bool,
    pub reads_vertex_color: bool,
    pub reads_constants: bool,
    /// WGSL fragment entry point `fs_main`, written against the shared
    /// `VertexOutput` / uniform declarations of the backend prelude.
    pub fragment_wgsl: &'static str,
}

const PASS_THROUGH: ProgramDescriptor = ProgramDescriptor {
    name: "passthrough",
    samples_texture: false,
    reads_vertex_color: true,
    reads_constants: false,
    fragment_wgsl: "@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
",
};

const REPLACE: ProgramDescriptor = ProgramDescriptor {
    name: "replace",
    samples_texture: true,
    reads_vertex_color: false,
    reads_constants: false,
    fragment_wgsl: "@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(gx_texture, gx_sampler, in.uv);
}
",
};

const MODULATE: ProgramDescriptor = ProgramDescriptor {
    name: "modulate",
    samples_texture: true,
    reads_vertex_color: true,
    reads_constants: false,
    fragment_wgsl: "@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color * textureSample(gx_texture, gx_sampler, in.uv);
}
",
};

const DECAL: ProgramDescriptor = ProgramDescriptor {
    name: "decal",
    samples_texture: true,
    reads_vertex_color: true,
    reads_constants: false,
    fragment_wgsl: "@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let tex = textureSample(gx_texture, gx_sampler, in.uv);
    return vec4<f32>(mix(in.color.rgb, tex.rgb, tex.a), in.color.a);
}
",
};

const CONSTANT_BLEND: ProgramDescriptor = ProgramDescriptor {
    name: "constant-blend",
    samples_texture: true,
    reads_vertex_color: true,
    reads_constants: true,
    fragment_wgsl: "@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let tex = textureSample(gx_texture, gx_sampler, in.uv);
    let factor = select(tex.rgb, vec3<f32>(tex.a), gx.factor_from_alpha != 0u);
    return vec4<f32>(mix(gx.blend_a.rgb, gx.blend_b.rgb, factor), tex.a);
}
",
};

impl ShaderProgram {
    pub const ALL: [ShaderProgram; 5] = [
        Self::PassThrough,
        Self::Replace,
        Self::Modulate,
        Self::Decal,
        Self::ConstantBlend,
    ];

    pub fn descriptor(self) -> &'static ProgramDescriptor {
        match self {
            Self::PassThrough => &PASS_THROUGH,
            Self::Replace => &REPLACE,
            Self::Modulate => &MODULATE,
            Self::Decal => &DECAL,
            Self::ConstantBlend => &CONSTANT_BLEND,
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn needs_texture(self) -> bool {
        self.descriptor().samples_texture
    }

    /// Bit for this program in a usage mask.
    pub fn mask_bit(self) -> u32 {
        1 << self as u32
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Result of classifying a combiner configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub program: ShaderProgram,
    /// Set when a multi-stage setup matched no known idiom and a default
    /// program was substituted.
    pub fallback: bool,
}

const REPLACE_TEXC: [TevColorArg; 4] = [
    TevColorArg::Zero,
    TevColorArg::Zero,
    TevColorArg::Zero,
    TevColorArg::Texc,
];
const MODULATE_TEX_RAS: [TevColorArg; 4] = [
    TevColorArg::Zero,
    TevColorArg::Texc,
    TevColorArg::Rasc,
    TevColorArg::Zero,
];
const MODULATE_RAS_TEX: [TevColorArg; 4] = [
    TevColorArg::Zero,
    TevColorArg::Rasc,
    TevColorArg::Texc,
    TevColorArg::Zero,
];
const DECAL_ARGS: [TevColorArg; 4] = [
    TevColorArg::Rasc,
    TevColorArg::Texc,
    TevColorArg::Texa,
    TevColorArg::Zero,
];

/// Pick a shader family for the active combiner stages.
///
/// `textured` must already account for stage 0 referencing a valid texture
/// map with a valid binding. The result is a pure function of the inputs.
pub fn classify(
    stages: &[TevStage],
    num_stages: u8,
    has_color0: bool,
    textured: bool,
) -> Classification {
    let Some(s0) = stages.first() else {
        return Classification {
            program: ShaderProgram::PassThrough,
            fallback: false,
        };
    };

    let (program, fallback) = if num_stages <= 1 {
        let program = if !textured {
            ShaderProgram::PassThrough
        } else if s0.color_in == REPLACE_TEXC {
            ShaderProgram::Replace
        } else if s0.color_in == MODULATE_TEX_RAS || s0.color_in == MODULATE_RAS_TEX {
            ShaderProgram::Modulate
        } else if s0.color_in == DECAL_ARGS {
            ShaderProgram::Decal
        } else {
            ShaderProgram::Modulate
        };
        (program, false)
    } else if textured
        && num_stages == 2
        && stages.get(1).is_some_and(|s1| is_constant_blend(s0, s1))
    {
        (ShaderProgram::ConstantBlend, false)
    } else if textured {
        (ShaderProgram::Modulate, true)
    } else {
        (ShaderProgram::PassThrough, true)
    };

    let program = match program {
        ShaderProgram::Modulate | ShaderProgram::Decal | ShaderProgram::ConstantBlend
            if !has_color0 =>
        {
            ShaderProgram::Replace
        }
        other => other,
    };

    Classification { program, fallback }
}

fn is_constant_blend(s0: &TevStage, s1: &TevStage) -> bool {
    let [a, b, c, d] = s1.color_in;
    s0.color_in == REPLACE_TEXC
        && a.is_constant()
        && b.is_constant()
        && matches!(c, TevColorArg::Aprev | TevColorArg::Cprev)
        && d == TevColorArg::Zero
}

/// Classify using the live register file.
pub fn classify_state(state: &GxState) -> Classification {
    let stages = &state.tev_stages[..];
    classify(
        stages,
        state.num_tev_stages,
        state.has_color0(),
        state.stage0_textured(),
    )
}

// ---------------------------------------------------------------------------
// Constant colors
// ---------------------------------------------------------------------------

/// Uniform values consumed by programs with `reads_constants`.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ShaderConstants {
    pub blend_a: [f32; 4],
    pub blend_b: [f32; 4],
    pub factor_from_alpha: bool,
}

/// Resolve a konst color selector against the four konst registers.
pub fn konst_color(sel: u8, konst: &[[u8; 4]; 4]) -> [f32; 4] {
    match sel {
        0x00..=0x07 => {
            let v = (8 - sel) as f32 / 8.0;
            [v, v, v, v]
        }
        0x0C..=0x0F => rgba_to_f32(konst[(sel - 0x0C) as usize]),
        0x10..=0x1F => {
            let reg = ((sel - 0x10) % 4) as usize;
            let channel = ((sel - 0x10) / 4) as usize;
            let v = konst[reg][channel] as f32 / 255.0;
            [v, v, v, v]
        }
        _ => [1.0; 4],
    }
}

fn rgba_to_f32(c: [u8; 4]) -> [f32; 4] {
    c.map(|v| v as f32 / 255.0)
}

fn s10_to_f32(c: [i16; 4]) -> [f32; 4] {
    c.map(|v| v as f32 / 255.0)
}

fn constant_arg(arg: TevColorArg, stage: &TevStage, state: &GxState) -> [f32; 4] {
    match arg {
        TevColorArg::C0 => s10_to_f32(state.tev_colors[1]),
        TevColorArg::C1 => s10_to_f32(state.tev_colors[2]),
        TevColorArg::C2 => s10_to_f32(state.tev_colors[3]),
        TevColorArg::Konst => konst_color(stage.konst_color_sel, &state.tev_konst_colors),
        _ => [0.0; 4],
    }
}

/// Gather the constants a `ConstantBlend` draw needs from stage 1.
pub fn blend_constants(state: &GxState) -> ShaderConstants {
    let s1 = &state.tev_stages[1];
    ShaderConstants {
        blend_a: constant_arg(s1.color_in[0], s1, state),
        blend_b: constant_arg(s1.color_in[1], s1, state),
        factor_from_alpha: s1.color_in[2] == TevColorArg::Aprev,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Display-list replay
//!
//! A display list is a pre-baked, big-endian FIFO command stream: register
//! loads for the three register spaces (CP, XF, BP) interleaved with draw
//! commands that carry their vertex data inline. Replay walks the list with
//! a bounds-checked cursor and applies every command to the processor as
//! if it had been issued through the live API.
//!
//! A malformed command halts the rest of the list and is reported in the
//! [`ReplayReport`]; everything before it stays applied.

use log::{trace, warn};
use serde::Serialize;

use super::regs::*;
use super::state::{
    AlphaOp, BlendFactor, BlendType, ColorType, CompType, CompareFunction, CullMode, GxState,
    LogicOp, TexGen, TlutBinding, VtxAttr, VtxInputType, MATRIX_SLOTS, TEX_MAP_NULL,
};
use super::tev::{TevAlphaArg, TevBias, TevColorArg, TevOp, TevRegId, TevScale};
use super::transform::{Projection, ProjectionType};
use super::vertex::{stream_color_to_rgba, GxPrimitive};
use super::GxProcessor;
use crate::error::ReplayFault;
use crate::graphics::backend::RenderBackend;
use crate::texture::formats::TlutFormat;
use crate::texture::loader::{ImageSource, TokenTable};

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

pub const OP_NOP: u8 = 0x00;
pub const OP_LOAD_CP_REG: u8 = 0x08;
pub const OP_LOAD_XF_REG: u8 = 0x10;
pub const OP_LOAD_INDX_A: u8 = 0x20;
pub const OP_LOAD_INDX_B: u8 = 0x28;
pub const OP_LOAD_INDX_C: u8 = 0x30;
pub const OP_LOAD_INDX_D: u8 = 0x38;
pub const OP_CALL_DL: u8 = 0x40;
pub const OP_INVAL_VTX: u8 = 0x48;
pub const OP_LOAD_BP_REG: u8 = 0x61;
/// Draw opcodes have the top bit set; low three bits select the format.
pub const OP_DRAW_MASK: u8 = 0x80;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Non-fatal oddity met during replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// A nested display-list call. Never executed.
    NestedCall {
        offset: usize,
        address: u32,
        size: u32,
    },
    /// A texture pointer token with no entry in the token table.
    UnresolvedTexture { offset: usize, map: u8, token: u32 },
    /// A TLUT token with no entry in the token table, or a bad TLUT format.
    UnresolvedPalette { offset: usize, map: u8, token: u32 },
    /// A draw opcode whose primitive bits name no primitive. Its vertex
    /// data was skipped.
    UnknownPrimitive { offset: usize, opcode: u8 },
}

/// Outcome of one display-list replay.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub bytes_consumed: usize,
    pub commands: usize,
    /// Draw commands that reached the backend.
    pub draws: usize,
    pub anomalies: Vec<Anomaly>,
    pub fault: Option<ReplayFault>,
}

impl ReplayReport {
    pub fn is_complete(&self) -> bool {
        self.fault.is_none()
    }
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Big-endian reader over a borrowed list. Reads past the end return a
/// truncation fault naming the command that started at `command`.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    command: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            command: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ReplayFault> {
        if n > self.remaining() {
            return Err(ReplayFault::Truncated {
                offset: self.command,
                needed: n,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, ReplayFault> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ReplayFault> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ReplayFault> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

impl<B: RenderBackend, S: ImageSource> GxProcessor<B, S> {
    /// Replay a display list. Never panics on malformed input; the first
    /// fault stops the list and is returned in the report.
    pub fn call_display_list(&mut self, list: &[u8]) -> ReplayReport {
        let mut report = ReplayReport::default();
        let mut cursor = Cursor::new(list);

        while cursor.remaining() > 0 {
            cursor.command = cursor.pos;
            match self.replay_command(&mut cursor, &mut report) {
                Ok(()) => report.commands += 1,
                Err(fault) => {
                    warn!("Display list halted: {}", fault);
                    report.fault = Some(fault);
                    break;
                }
            }
        }

        report.bytes_consumed = cursor.pos;
        report
    }

    fn replay_command(
        &mut self,
        cursor: &mut Cursor<'_>,
        report: &mut ReplayReport,
    ) -> Result<(), ReplayFault> {
        let offset = cursor.command;
        let opcode = cursor.u8()?;

        match opcode {
            OP_NOP | OP_INVAL_VTX => {}
            OP_LOAD_CP_REG => {
                let addr = cursor.u8()?;
                let value = cursor.u32()?;
                load_cp_reg(&mut self.state, addr, value);
            }
            OP_LOAD_XF_REG => {
                let count = cursor.u16()? as usize + 1;
                let addr = cursor.u16()?;
                let payload = cursor.take(count * 4)?;
                let words: Vec<u32> = payload
                    .chunks_exact(4)
                    .map(|w| u32::from_be_bytes([w[0], w[1], w[2], w[3]]))
                    .collect();
                load_xf_regs(&mut self.state, addr, &words);
            }
            OP_LOAD_INDX_A | OP_LOAD_INDX_B | OP_LOAD_INDX_C | OP_LOAD_INDX_D => {
                let index = cursor.u16()?;
                let addr = cursor.u16()?;
                trace!(
                    "Indexed matrix load 0x{:02X} (index {}, addr 0x{:04X}) ignored",
                    opcode,
                    index,
                    addr
                );
            }
            OP_CALL_DL => {
                let address = cursor.u32()?;
                let size = cursor.u32()?;
                self.telemetry.record_unimplemented("nested display list");
                report.anomalies.push(Anomaly::NestedCall {
                    offset,
                    address,
                    size,
                });
            }
            OP_LOAD_BP_REG => {
                let word = cursor.u32()?;
                if let Some(anomaly) = load_bp_reg(&mut self.state, &self.tokens, word, offset) {
                    report.anomalies.push(anomaly);
                }
            }
            op if op & OP_DRAW_MASK != 0 => {
                if self.replay_draw(cursor, op, report)? {
                    report.draws += 1;
                }
            }
            _ => return Err(ReplayFault::UnknownOpcode { offset, opcode }),
        }
        Ok(())
    }

    /// Replay one draw command. Returns whether the draw reached the backend.
    fn replay_draw(
        &mut self,
        cursor: &mut Cursor<'_>,
        opcode: u8,
        report: &mut ReplayReport,
    ) -> Result<bool, ReplayFault> {
        let fmt = opcode & 0x07;
        let count = cursor.u16()?;
        let stride = self.state.stream_stride(fmt);
        let payload = cursor.take(count as usize * stride)?;

        let Some(primitive) = GxPrimitive::from_u8(opcode & 0xF8) else {
            report.anomalies.push(Anomaly::UnknownPrimitive {
                offset: cursor.command,
                opcode,
            });
            return Ok(false);
        };
        if count == 0 || stride == 0 {
            return Ok(false);
        }

        self.assembler.begin(&self.state, primitive, fmt, count);
        for vertex in payload.chunks_exact(stride) {
            self.forward_vertex(vertex, fmt);
            self.assembler.finish_vertex();
        }
        Ok(self.end().is_some())
    }

    /// Forward one stream vertex to the assembler as typed writes.
    /// `vertex` holds exactly one stream stride of bytes.
    fn forward_vertex(&mut self, vertex: &[u8], fmt: u8) {
        let mut pos = 0;
        for attr in VtxAttr::ALL {
            let f = self.state.vtx_attr_fmt(fmt, attr);
            match self.state.vtx_desc(attr) {
                VtxInputType::None => {}
                VtxInputType::Index8 => {
                    self.assembler.write_u8(vertex[pos]);
                    pos += 1;
                }
                VtxInputType::Index16 => {
                    self.assembler
                        .write_u16(u16::from_be_bytes([vertex[pos], vertex[pos + 1]]));
                    pos += 2;
                }
                VtxInputType::Direct if attr.is_matrix_index() => {
                    self.assembler.write_u8(vertex[pos]);
                    pos += 1;
                }
                VtxInputType::Direct if attr.is_color() => {
                    let ty: ColorType = f.color_type();
                    let rgba = stream_color_to_rgba(&vertex[pos..], ty);
                    self.assembler.write_color(rgba);
                    pos += ty.stream_size();
                }
                VtxInputType::Direct => {
                    let ty = f.numeric_type();
                    for _ in 0..f.elements(attr) {
                        let b = &vertex[pos..pos + ty.size()];
                        match ty {
                            CompType::U8 => self.assembler.write_u8(b[0]),
                            CompType::S8 => self.assembler.write_s8(b[0] as i8),
                            CompType::U16 => {
                                self.assembler.write_u16(u16::from_be_bytes([b[0], b[1]]))
                            }
                            CompType::S16 => {
                                self.assembler.write_s16(i16::from_be_bytes([b[0], b[1]]))
                            }
                            CompType::F32 => self
                                .assembler
                                .write_f32(f32::from_be_bytes([b[0], b[1], b[2], b[3]])),
                        }
                        pos += ty.size();
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CP registers
// ---------------------------------------------------------------------------

/// Apply a command-processor register write.
pub fn load_cp_reg(state: &mut GxState, addr: u8, value: u32) {
    let slot = (addr & 0x0F) as usize;
    match addr & 0xF0 {
        CP_VCD_LO => {
            for (attr, input) in VcdLow(value).descriptors() {
                state.set_vtx_desc(attr, input);
            }
        }
        CP_VCD_HI => {
            for (attr, input) in VcdHigh(value).descriptors() {
                state.set_vtx_desc(attr, input);
            }
        }
        CP_VAT_A if slot < 8 => VatA(value).apply(&mut state.vertex_formats[slot]),
        CP_VAT_B if slot < 8 => VatB(value).apply(&mut state.vertex_formats[slot]),
        CP_VAT_C if slot < 8 => VatC(value).apply(&mut state.vertex_formats[slot]),
        _ => trace!("CP register 0x{:02X} = 0x{:08X} ignored", addr, value),
    }
}

// ---------------------------------------------------------------------------
// XF registers
// ---------------------------------------------------------------------------

const XF_TEX_MTX_BASE: u16 = 0x78;
const XF_MATRIX_END: u16 = 0x100;
const XF_NRM_MTX_BASE: u16 = 0x400;
const XF_NRM_MTX_END: u16 = 0x460;
const XF_NUM_CHANS: u16 = 0x1009;
const XF_AMBIENT0: u16 = 0x100A;
const XF_MATERIAL0: u16 = 0x100C;
const XF_CHAN_CTRL: u16 = 0x100E;
const XF_MATRIX_INDEX_A: u16 = 0x1018;
const XF_VIEWPORT: u16 = 0x101A;
const XF_PROJECTION: u16 = 0x1020;
const XF_PROJECTION_TYPE: u16 = 0x1026;
const XF_NUM_TEX_GENS: u16 = 0x103F;
const XF_TEX_GEN: u16 = 0x1040;

/// Viewport and scissor registers are biased by this screen offset.
const SCREEN_OFFSET: f32 = 342.0;
const Z_RANGE: f32 = 16_777_215.0;

fn unpack_rgba(word: u32) -> [u8; 4] {
    word.to_be_bytes()
}

/// Apply a run of transform-unit words starting at `addr`. Every word is
/// latched at its own address, so partial matrix updates are kept.
pub fn load_xf_regs(state: &mut GxState, addr: u16, words: &[u32]) {
    for (i, &word) in words.iter().enumerate() {
        let Some(a) = addr.checked_add(i as u16) else {
            break;
        };
        load_xf_reg(state, a, word);
    }
}

fn load_xf_reg(state: &mut GxState, addr: u16, word: u32) {
    let f = f32::from_bits(word);
    match addr {
        a if a < XF_TEX_MTX_BASE => {
            let (slot, elem) = ((a / 12) as usize, (a % 12) as usize);
            state.matrices.position[slot][elem] = f;
        }
        a if a < XF_MATRIX_END => {
            let idx = a - XF_TEX_MTX_BASE;
            let (slot, elem) = ((idx / 12) as usize, (idx % 12) as usize);
            if slot < MATRIX_SLOTS {
                state.matrices.texture[slot][elem] = f;
            }
        }
        a if (XF_NRM_MTX_BASE..XF_NRM_MTX_END).contains(&a) => {
            let idx = a - XF_NRM_MTX_BASE;
            let (slot, elem) = ((idx / 9) as usize, (idx % 9) as usize);
            if slot < MATRIX_SLOTS {
                // 3x3 rows land in a 3x4 matrix with a zero translation column.
                state.matrices.normal[slot][(elem / 3) * 4 + elem % 3] = f;
            }
        }
        XF_NUM_CHANS => state.set_num_chans((word & 3) as u8),
        a if (XF_AMBIENT0..XF_AMBIENT0 + 2).contains(&a) => {
            state.set_chan_amb_color((a - XF_AMBIENT0) as u8, unpack_rgba(word));
        }
        a if (XF_MATERIAL0..XF_MATERIAL0 + 2).contains(&a) => {
            state.set_chan_mat_color((a - XF_MATERIAL0) as u8, unpack_rgba(word));
        }
        a if (XF_CHAN_CTRL..XF_CHAN_CTRL + 4).contains(&a) => {
            state
                .lighting
                .set_chan_ctrl_word((a - XF_CHAN_CTRL) as u8, word);
        }
        XF_MATRIX_INDEX_A => state.set_current_mtx(((word & 0x3F) / 3) as u8),
        a if (XF_VIEWPORT..XF_VIEWPORT + 6).contains(&a) => {
            load_viewport_word(state, (a - XF_VIEWPORT) as usize, f);
        }
        a if (XF_PROJECTION..XF_PROJECTION_TYPE).contains(&a) => {
            let (kind, mut params) = state.projection();
            params[(a - XF_PROJECTION) as usize] = f;
            state.matrices.projection = Projection::from_params(kind, params);
        }
        XF_PROJECTION_TYPE => {
            let (_, params) = state.projection();
            state.matrices.projection =
                Projection::from_params(ProjectionType::from_bits(word), params);
        }
        XF_NUM_TEX_GENS => state.set_num_tex_gens((word & 0xF) as u8),
        a if (XF_TEX_GEN..XF_TEX_GEN + 8).contains(&a) => {
            let n = (a - XF_TEX_GEN) as usize;
            let mtx = state.tex_gens[n].mtx;
            state.tex_gens[n] = TexGen::from_xf(word, mtx);
        }
        _ => trace!("XF register 0x{:04X} = 0x{:08X} ignored", addr, word),
    }
}

/// Update one of the six hardware viewport words (scale x/y/z, offset
/// x/y/z), recovering the other five from the current viewport.
fn load_viewport_word(state: &mut GxState, index: usize, value: f32) {
    let vp = state.viewport();
    let mut hw = [
        vp.width / 2.0,
        -vp.height / 2.0,
        (vp.far - vp.near) * Z_RANGE,
        vp.x + vp.width / 2.0 + SCREEN_OFFSET,
        vp.y + vp.height / 2.0 + SCREEN_OFFSET,
        vp.far * Z_RANGE,
    ];
    hw[index] = value;
    let [sx, sy, sz, ox, oy, oz] = hw;
    let (w, h) = (sx * 2.0, -sy * 2.0);
    let far = oz / Z_RANGE;
    state.set_viewport(
        ox - SCREEN_OFFSET - w / 2.0,
        oy - SCREEN_OFFSET - h / 2.0,
        w,
        h,
        far - sz / Z_RANGE,
        far,
    );
}

// ---------------------------------------------------------------------------
// BP registers
// ---------------------------------------------------------------------------

fn ras_channel(code: u32) -> u8 {
    match code {
        0 => 4, // COLOR0A0
        1 => 5, // COLOR1A1
        _ => TEX_MAP_NULL,
    }
}

/// Apply a blitting-processor register write. `offset` is the command's
/// position in its list and only labels anomalies.
pub fn load_bp_reg(
    state: &mut GxState,
    tokens: &TokenTable,
    word: u32,
    offset: usize,
) -> Option<Anomaly> {
    let addr = (word >> 24) as u8;
    let value = word & 0x00FF_FFFF;

    match addr {
        BP_GEN_MODE => {
            let reg = GenModeReg(value);
            state.set_num_tex_gens(reg.num_tex_gens() as u8);
            state.set_num_chans(reg.num_colors() as u8);
            state.set_num_tev_stages(reg.num_tev_stages_minus1() as u8 + 1);
            state.set_cull_mode(match reg.cull() {
                0 => CullMode::None,
                1 => CullMode::Back,
                2 => CullMode::Front,
                _ => CullMode::All,
            });
        }
        a if (BP_TEV_ORDER..BP_TEV_ORDER + 8).contains(&a) => {
            let reg = TevOrderReg(value);
            let first = (a - BP_TEV_ORDER) * 2;
            for (stage, odd) in [(first, false), (first + 1, true)] {
                let map = if reg.enable(odd) {
                    reg.tex_map(odd) as u8
                } else {
                    TEX_MAP_NULL
                };
                state.set_tev_order(
                    stage,
                    reg.tex_coord(odd) as u8,
                    map,
                    ras_channel(reg.channel(odd)),
                );
            }
        }
        a if (BP_TEV_COMBINER..BP_TEV_COMBINER + 0x20).contains(&a) => {
            let stage = (a - BP_TEV_COMBINER) / 2;
            if a % 2 == 0 {
                load_color_env(state, stage, TevColorEnv(value));
            } else {
                load_alpha_env(state, stage, TevAlphaEnv(value));
            }
        }
        a if (BP_TEV_REG..BP_TEV_REG + 8).contains(&a) => {
            load_tev_reg(state, a - BP_TEV_REG, TevRegHalf(value));
        }
        a if (BP_KSEL..BP_KSEL + 8).contains(&a) => {
            let n = a - BP_KSEL;
            let reg = KSelReg(value);
            let table = n / 2;
            let mut entries = state.swap_tables[table as usize];
            let pair = if n % 2 == 0 { 0 } else { 2 };
            entries[pair] = reg.swap_lo() as u8;
            entries[pair + 1] = reg.swap_hi() as u8;
            let [r, g, b, al] = entries;
            state.set_tev_swap_table(table, r, g, b, al);
            state.set_tev_k_color_sel(n * 2, reg.kcsel_even() as u8);
            state.set_tev_k_alpha_sel(n * 2, reg.kasel_even() as u8);
            state.set_tev_k_color_sel(n * 2 + 1, reg.kcsel_odd() as u8);
            state.set_tev_k_alpha_sel(n * 2 + 1, reg.kasel_odd() as u8);
        }
        BP_ALPHA_COMPARE => {
            let reg = AlphaCompareReg(value);
            state.set_alpha_compare(
                CompareFunction::from_bits(reg.comp0()),
                reg.ref0() as u8,
                AlphaOp::from_bits(reg.op()),
                CompareFunction::from_bits(reg.comp1()),
                reg.ref1() as u8,
            );
        }
        BP_Z_MODE => {
            let reg = ZModeReg(value);
            state.set_z_mode(
                reg.enable() != 0,
                CompareFunction::from_bits(reg.func()),
                reg.update() != 0,
            );
        }
        BP_BLEND_MODE => {
            let reg = BlendModeReg(value);
            let mode = if reg.subtract() != 0 {
                BlendType::Subtract
            } else if reg.blend() != 0 {
                BlendType::Blend
            } else if reg.logic() != 0 {
                BlendType::Logic
            } else {
                BlendType::None
            };
            state.set_blend_mode(
                mode,
                BlendFactor::from_bits(reg.src_factor()),
                BlendFactor::from_bits(reg.dst_factor()),
                LogicOp::from_bits(reg.logic_op()),
            );
            state.set_color_update(reg.color_update() != 0);
            state.set_alpha_update(reg.alpha_update() != 0);
        }
        BP_SCISSOR_TL | BP_SCISSOR_BR => load_scissor(state, addr == BP_SCISSOR_TL, value),
        BP_CLEAR_AR => {
            let reg = ClearArReg(value);
            state.copy_clear_color[0] = reg.r() as u8;
            state.copy_clear_color[3] = reg.a() as u8;
        }
        BP_CLEAR_GB => {
            let reg = ClearGbReg(value);
            state.copy_clear_color[1] = reg.g() as u8;
            state.copy_clear_color[2] = reg.b() as u8;
        }
        BP_CLEAR_Z => state.copy_clear_z = value,
        a if (BP_FOG_PARAM0..BP_FOG_TYPE).contains(&a) => {
            state.fog.raw_params[(a - BP_FOG_PARAM0) as usize] = value;
        }
        BP_FOG_TYPE => state.fog.kind = FogTypeReg(value).kind() as u8,
        BP_FOG_COLOR => {
            let reg = FogColorReg(value);
            state.fog.color = [reg.r() as u8, reg.g() as u8, reg.b() as u8, 255];
        }
        _ => return load_bp_texture_reg(state, tokens, addr, value, offset),
    }
    None
}

/// Per-texture-map BP registers.
fn load_bp_texture_reg(
    state: &mut GxState,
    tokens: &TokenTable,
    addr: u8,
    value: u32,
    offset: usize,
) -> Option<Anomaly> {
    if let Some(map) = tex_map_for(addr, BP_TEX_MODE0) {
        let reg = TexMode0(value);
        let b = &mut state.textures[map as usize];
        b.wrap_s = reg.wrap_s() as u8;
        b.wrap_t = reg.wrap_t() as u8;
        b.mag_filter = reg.mag_filter() as u8;
        b.min_filter = reg.min_filter() as u8;
        b.lod_bias = reg.lod_bias_f32();
    } else if let Some(map) = tex_map_for(addr, BP_TEX_MODE1) {
        let reg = TexMode1(value);
        let b = &mut state.textures[map as usize];
        b.min_lod = reg.min_lod() as f32 / 16.0;
        b.max_lod = reg.max_lod() as f32 / 16.0;
    } else if let Some(map) = tex_map_for(addr, BP_TEX_IMAGE0) {
        let reg = TexImage0(value);
        state.set_tex_dimensions(map, reg.width(), reg.height(), reg.format() as u8);
    } else if let Some(map) = tex_map_for(addr, BP_TEX_IMAGE3) {
        let image = tokens.resolve(value);
        state.set_tex_address(map, image);
        if image.is_none() {
            return Some(Anomaly::UnresolvedTexture {
                offset,
                map,
                token: value,
            });
        }
    } else if let Some(map) = tex_map_for(addr, BP_TLUT_REF) {
        let reg = TlutRef(value);
        let binding = tokens
            .resolve(reg.token())
            .zip(TlutFormat::from_gx(reg.format() as u8))
            .map(|(image, format)| TlutBinding { image, format });
        state.set_tex_tlut(map, binding);
        if binding.is_none() {
            return Some(Anomaly::UnresolvedPalette {
                offset,
                map,
                token: reg.token(),
            });
        }
    } else {
        trace!("BP register 0x{:02X} = 0x{:06X} ignored", addr, value);
    }
    None
}

fn combiner_op(bias: u32, sub: u32, scale: u32) -> (TevOp, TevBias, TevScale) {
    match TevBias::from_bits(bias) {
        // Compare modes are approximated as a plain add.
        TevBias::Compare => (TevOp::Add, TevBias::Zero, TevScale::Scale1),
        bias => {
            let op = if sub != 0 { TevOp::Sub } else { TevOp::Add };
            (op, bias, TevScale::from_bits(scale))
        }
    }
}

fn load_color_env(state: &mut GxState, stage: u8, reg: TevColorEnv) {
    state.set_tev_color_in(
        stage,
        TevColorArg::from_bits(reg.a()),
        TevColorArg::from_bits(reg.b()),
        TevColorArg::from_bits(reg.c()),
        TevColorArg::from_bits(reg.d()),
    );
    let (op, bias, scale) = combiner_op(reg.bias(), reg.sub(), reg.scale());
    state.set_tev_color_op(
        stage,
        op,
        bias,
        scale,
        reg.clamp() != 0,
        TevRegId::from_bits(reg.dest()),
    );
}

fn load_alpha_env(state: &mut GxState, stage: u8, reg: TevAlphaEnv) {
    state.set_tev_alpha_in(
        stage,
        TevAlphaArg::from_bits(reg.a()),
        TevAlphaArg::from_bits(reg.b()),
        TevAlphaArg::from_bits(reg.c()),
        TevAlphaArg::from_bits(reg.d()),
    );
    let (op, bias, scale) = combiner_op(reg.bias(), reg.sub(), reg.scale());
    state.set_tev_alpha_op(
        stage,
        op,
        bias,
        scale,
        reg.clamp() != 0,
        TevRegId::from_bits(reg.dest()),
    );
    state.set_tev_swap_mode(stage, reg.ras_swap() as u8, reg.tex_swap() as u8);
}

/// Color register halves: even offsets carry R (low) and A (high), odd
/// offsets B (low) and G (high). Register 0 is PREV.
fn load_tev_reg(state: &mut GxState, offset: u8, reg: TevRegHalf) {
    let index = offset / 2;
    let (low, high) = if offset % 2 == 0 { (0, 3) } else { (2, 1) };

    if reg.konst() != 0 {
        if let Some(k) = state.tev_konst_colors.get(index as usize) {
            let mut color = *k;
            color[low] = (reg.low() & 0xFF) as u8;
            color[high] = (reg.high() & 0xFF) as u8;
            state.set_tev_konst_color(index, color);
        }
    } else if let Some(c) = state.tev_colors.get(index as usize) {
        let mut color = *c;
        color[low] = reg.low_signed();
        color[high] = reg.high_signed();
        state.set_tev_color_s10(index, color);
    }
}

/// Scissor corners are inclusive and biased by the screen offset. Either
/// corner may be written alone; the rectangle keeps the other one.
fn load_scissor(state: &mut GxState, top_left: bool, value: u32) {
    let reg = ScissorReg(value);
    let x = reg.x() as i32 - SCISSOR_OFFSET as i32;
    let y = reg.y() as i32 - SCISSOR_OFFSET as i32;
    let s = state.scissor();
    let (x0, y0, x1, y1) = if top_left {
        (
            x,
            y,
            s.x as i32 + s.width as i32 - 1,
            s.y as i32 + s.height as i32 - 1,
        )
    } else {
        (s.x as i32, s.y as i32, x, y)
    };
    let clamp = |v: i32| v.clamp(0, u16::MAX as i32) as u16;
    state.set_scissor(
        clamp(x0),
        clamp(y0),
        clamp(x1 - x0 + 1),
        clamp(y1 - y0 + 1),
    );
}

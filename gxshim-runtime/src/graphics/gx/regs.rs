// Bit-packed CP / BP register layouts.
//
// Each hardware register word is wrapped in a newtype with one accessor per
// field. Applying a word to the register file touches only the fields that
// word owns, so any order of writes converges on the same state.

use super::state::{VtxAttr, VtxAttrFmt, VtxInputType};

macro_rules! bitfield_reg {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$fmeta:meta])* $field:ident: $shift:expr, $width:expr; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
        pub struct $name(pub u32);

        impl $name {
            $(
                $(#[$fmeta])*
                #[inline]
                pub fn $field(self) -> u32 {
                    (self.0 >> $shift) & ((1u32 << $width) - 1)
                }
            )*
        }
    };
}

/// Sign-extend the low `bits` bits of `value`.
pub fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

// ---------------------------------------------------------------------------
// Command processor (CP)
// ---------------------------------------------------------------------------

pub const CP_VCD_LO: u8 = 0x50;
pub const CP_VCD_HI: u8 = 0x60;
pub const CP_VAT_A: u8 = 0x70;
pub const CP_VAT_B: u8 = 0x80;
pub const CP_VAT_C: u8 = 0x90;

bitfield_reg! {
    /// Vertex descriptor, low word: matrix indices, position, normal, colors.
    VcdLow {
        pos_mtx_idx: 0, 1;
        position: 9, 2;
        normal: 11, 2;
        color0: 13, 2;
        color1: 15, 2;
    }
}

impl VcdLow {
    pub fn tex_mtx_idx(self, n: u8) -> u32 {
        (self.0 >> (1 + n as u32)) & 1
    }

    /// Input type for every attribute this word owns.
    pub fn descriptors(self) -> impl Iterator<Item = (VtxAttr, VtxInputType)> {
        let matrices = (0..=8u8).filter_map(move |i| {
            let bit = if i == 0 {
                self.pos_mtx_idx()
            } else {
                self.tex_mtx_idx(i - 1)
            };
            VtxAttr::from_index(i).map(|attr| (attr, VtxInputType::from_bits(bit)))
        });
        matrices.chain([
            (VtxAttr::Position, VtxInputType::from_bits(self.position())),
            (VtxAttr::Normal, VtxInputType::from_bits(self.normal())),
            (VtxAttr::Color0, VtxInputType::from_bits(self.color0())),
            (VtxAttr::Color1, VtxInputType::from_bits(self.color1())),
        ])
    }
}

/// Vertex descriptor, high word: 2-bit input types for TEX0..TEX7.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VcdHigh(pub u32);

impl VcdHigh {
    pub fn tex(self, n: u8) -> u32 {
        (self.0 >> (2 * n as u32)) & 3
    }

    pub fn descriptors(self) -> impl Iterator<Item = (VtxAttr, VtxInputType)> {
        (0..8u8).filter_map(move |n| {
            VtxAttr::tex(n).map(|attr| (attr, VtxInputType::from_bits(self.tex(n))))
        })
    }
}

bitfield_reg! {
    /// Vertex attribute table group A.
    VatA {
        pos_cnt: 0, 1;
        pos_type: 1, 3;
        pos_frac: 4, 5;
        nrm_cnt: 9, 1;
        nrm_type: 10, 3;
        clr0_cnt: 13, 1;
        clr0_type: 14, 3;
        clr1_cnt: 17, 1;
        clr1_type: 18, 3;
        tex0_cnt: 21, 1;
        tex0_type: 22, 3;
        tex0_frac: 25, 5;
    }
}

bitfield_reg! {
    /// Vertex attribute table group B. TEX4's fraction lives in group C.
    VatB {
        tex1_cnt: 0, 1;
        tex1_type: 1, 3;
        tex1_frac: 4, 5;
        tex2_cnt: 9, 1;
        tex2_type: 10, 3;
        tex2_frac: 13, 5;
        tex3_cnt: 18, 1;
        tex3_type: 19, 3;
        tex3_frac: 22, 5;
        tex4_cnt: 27, 1;
        tex4_type: 28, 3;
    }
}

bitfield_reg! {
    /// Vertex attribute table group C.
    VatC {
        tex4_frac: 0, 5;
        tex5_cnt: 5, 1;
        tex5_type: 6, 3;
        tex5_frac: 9, 5;
        tex6_cnt: 14, 1;
        tex6_type: 15, 3;
        tex6_frac: 18, 5;
        tex7_cnt: 23, 1;
        tex7_type: 24, 3;
        tex7_frac: 27, 5;
    }
}

fn set_cnt_type(fmt: &mut VtxAttrFmt, cnt: u32, ty: u32) {
    fmt.count = cnt as u8;
    fmt.comp_type = ty as u8;
}

fn set_all(fmt: &mut VtxAttrFmt, cnt: u32, ty: u32, frac: u32) {
    set_cnt_type(fmt, cnt, ty);
    fmt.frac = frac as u8;
}

impl VatA {
    pub fn apply(self, table: &mut [VtxAttrFmt; VtxAttr::COUNT]) {
        set_all(
            &mut table[VtxAttr::Position as usize],
            self.pos_cnt(),
            self.pos_type(),
            self.pos_frac(),
        );
        set_cnt_type(&mut table[VtxAttr::Normal as usize], self.nrm_cnt(), self.nrm_type());
        set_cnt_type(&mut table[VtxAttr::Color0 as usize], self.clr0_cnt(), self.clr0_type());
        set_cnt_type(&mut table[VtxAttr::Color1 as usize], self.clr1_cnt(), self.clr1_type());
        set_all(
            &mut table[VtxAttr::Tex0 as usize],
            self.tex0_cnt(),
            self.tex0_type(),
            self.tex0_frac(),
        );
    }
}

impl VatB {
    pub fn apply(self, table: &mut [VtxAttrFmt; VtxAttr::COUNT]) {
        set_all(
            &mut table[VtxAttr::Tex1 as usize],
            self.tex1_cnt(),
            self.tex1_type(),
            self.tex1_frac(),
        );
        set_all(
            &mut table[VtxAttr::Tex2 as usize],
            self.tex2_cnt(),
            self.tex2_type(),
            self.tex2_frac(),
        );
        set_all(
            &mut table[VtxAttr::Tex3 as usize],
            self.tex3_cnt(),
            self.tex3_type(),
            self.tex3_frac(),
        );
        set_cnt_type(&mut table[VtxAttr::Tex4 as usize], self.tex4_cnt(), self.tex4_type());
    }
}

impl VatC {
    pub fn apply(self, table: &mut [VtxAttrFmt; VtxAttr::COUNT]) {
        table[VtxAttr::Tex4 as usize].frac = self.tex4_frac() as u8;
        set_all(
            &mut table[VtxAttr::Tex5 as usize],
            self.tex5_cnt(),
            self.tex5_type(),
            self.tex5_frac(),
        );
        set_all(
            &mut table[VtxAttr::Tex6 as usize],
            self.tex6_cnt(),
            self.tex6_type(),
            self.tex6_frac(),
        );
        set_all(
            &mut table[VtxAttr::Tex7 as usize],
            self.tex7_cnt(),
            self.tex7_type(),
            self.tex7_frac(),
        );
    }
}

// ---------------------------------------------------------------------------
// Blitting processor (BP)
// ---------------------------------------------------------------------------

pub const BP_GEN_MODE: u8 = 0x00;
pub const BP_TEV_ORDER: u8 = 0x28;
pub const BP_Z_MODE: u8 = 0x40;
pub const BP_BLEND_MODE: u8 = 0x41;
pub const BP_SCISSOR_TL: u8 = 0x49;
pub const BP_SCISSOR_BR: u8 = 0x4A;
pub const BP_CLEAR_AR: u8 = 0x4F;
pub const BP_CLEAR_GB: u8 = 0x50;
pub const BP_CLEAR_Z: u8 = 0x51;
pub const BP_TEX_MODE0: u8 = 0x80;
pub const BP_TEX_MODE1: u8 = 0x84;
pub const BP_TEX_IMAGE0: u8 = 0x88;
pub const BP_TEX_IMAGE3: u8 = 0x94;
pub const BP_TLUT_REF: u8 = 0x98;
pub const BP_TEX_MAP_HIGH: u8 = 0x20;
pub const BP_TEV_COMBINER: u8 = 0xC0;
pub const BP_TEV_REG: u8 = 0xE0;
pub const BP_FOG_PARAM0: u8 = 0xEE;
pub const BP_FOG_TYPE: u8 = 0xF1;
pub const BP_FOG_COLOR: u8 = 0xF2;
pub const BP_ALPHA_COMPARE: u8 = 0xF3;
pub const BP_KSEL: u8 = 0xF6;

/// Screen coordinate offset applied to scissor registers.
pub const SCISSOR_OFFSET: u32 = 342;

/// Texture map addressed by a per-map BP register, given the base of its
/// group. Maps 0..3 live at `base..base+4`, maps 4..7 at `base+0x20..`.
pub fn tex_map_for(addr: u8, base: u8) -> Option<u8> {
    if (base..base + 4).contains(&addr) {
        Some(addr - base)
    } else if (base + BP_TEX_MAP_HIGH..base + BP_TEX_MAP_HIGH + 4).contains(&addr) {
        Some(addr - base - BP_TEX_MAP_HIGH + 4)
    } else {
        None
    }
}

bitfield_reg! {
    GenModeReg {
        num_tex_gens: 0, 4;
        num_colors: 4, 3;
        num_tev_stages_minus1: 10, 4;
        /// Hardware order: none, back, front, all.
        cull: 14, 2;
        num_ind_stages: 16, 3;
    }
}

/// TEV order for a stage pair; even stage in the low 12 bits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TevOrderReg(pub u32);

impl TevOrderReg {
    fn half(self, odd: bool) -> u32 {
        if odd {
            (self.0 >> 12) & 0xFFF
        } else {
            self.0 & 0xFFF
        }
    }

    pub fn tex_map(self, odd: bool) -> u32 {
        self.half(odd) & 7
    }

    pub fn tex_coord(self, odd: bool) -> u32 {
        (self.half(odd) >> 3) & 7
    }

    pub fn enable(self, odd: bool) -> bool {
        (self.half(odd) >> 6) & 1 != 0
    }

    pub fn channel(self, odd: bool) -> u32 {
        (self.half(odd) >> 7) & 7
    }
}

bitfield_reg! {
    TevColorEnv {
        d: 0, 4;
        c: 4, 4;
        b: 8, 4;
        a: 12, 4;
        bias: 16, 2;
        sub: 18, 1;
        clamp: 19, 1;
        scale: 20, 2;
        dest: 22, 2;
    }
}

bitfield_reg! {
    TevAlphaEnv {
        ras_swap: 0, 2;
        tex_swap: 2, 2;
        d: 4, 3;
        c: 7, 3;
        b: 10, 3;
        a: 13, 3;
        bias: 16, 2;
        sub: 18, 1;
        clamp: 19, 1;
        scale: 20, 2;
        dest: 22, 2;
    }
}

bitfield_reg! {
    /// One half of a TEV color register: R/A on even addresses, B/G on odd.
    TevRegHalf {
        low: 0, 11;
        high: 12, 11;
        konst: 23, 1;
    }
}

impl TevRegHalf {
    pub fn low_signed(self) -> i16 {
        sign_extend(self.low(), 11) as i16
    }

    pub fn high_signed(self) -> i16 {
        sign_extend(self.high(), 11) as i16
    }
}

bitfield_reg! {
    KSelReg {
        swap_lo: 0, 2;
        swap_hi: 2, 2;
        kcsel_even: 4, 5;
        kasel_even: 9, 5;
        kcsel_odd: 14, 5;
        kasel_odd: 19, 5;
    }
}

bitfield_reg! {
    AlphaCompareReg {
        ref0: 0, 8;
        ref1: 8, 8;
        comp0: 16, 3;
        comp1: 19, 3;
        op: 22, 2;
    }
}

bitfield_reg! {
    ZModeReg {
        enable: 0, 1;
        func: 1, 3;
        update: 4, 1;
    }
}

bitfield_reg! {
    BlendModeReg {
        blend: 0, 1;
        logic: 1, 1;
        dither: 2, 1;
        color_update: 3, 1;
        alpha_update: 4, 1;
        dst_factor: 5, 3;
        src_factor: 8, 3;
        subtract: 11, 1;
        logic_op: 12, 4;
    }
}

bitfield_reg! {
    TexMode0 {
        wrap_s: 0, 2;
        wrap_t: 2, 2;
        mag_filter: 4, 1;
        min_filter: 5, 3;
        diag_lod: 8, 1;
        lod_bias: 9, 8;
        max_aniso: 19, 2;
        lod_clamp: 21, 1;
    }
}

impl TexMode0 {
    /// LOD bias in texels, signed 8-bit fixed point with 5 fraction bits.
    pub fn lod_bias_f32(self) -> f32 {
        sign_extend(self.lod_bias(), 8) as f32 / 32.0
    }
}

bitfield_reg! {
    TexMode1 {
        min_lod: 0, 8;
        max_lod: 8, 8;
    }
}

bitfield_reg! {
    TexImage0 {
        width_minus1: 0, 10;
        height_minus1: 10, 10;
        format: 20, 4;
    }
}

impl TexImage0 {
    pub fn width(self) -> u16 {
        self.width_minus1() as u16 + 1
    }

    pub fn height(self) -> u16 {
        self.height_minus1() as u16 + 1
    }
}

bitfield_reg! {
    TlutRef {
        token: 0, 10;
        format: 10, 2;
    }
}

bitfield_reg! {
    ScissorReg {
        y: 0, 11;
        x: 12, 11;
    }
}

bitfield_reg! {
    FogColorReg {
        b: 0, 8;
        g: 8, 8;
        r: 16, 8;
    }
}

bitfield_reg! {
    FogTypeReg {
        kind: 21, 3;
    }
}

bitfield_reg! {
    ClearArReg {
        r: 0, 8;
        a: 8, 8;
    }
}

bitfield_reg! {
    ClearGbReg {
        b: 0, 8;
        g: 8, 8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extension() {
        assert_eq!(sign_extend(0x7FF, 11), -1);
        assert_eq!(sign_extend(0x3FF, 11), 1023);
        assert_eq!(sign_extend(0x400, 11), -1024);
        assert_eq!(sign_extend(0x80, 8), -128);
    }

    #[test]
    fn vcd_low_decodes_every_attribute() {
        // PNMTXIDX direct, POS direct, NRM index8, CLR0 index16.
        let vcd = VcdLow(1 | (1 << 9) | (2 << 11) | (3 << 13));
        let descs: Vec<_> = vcd.descriptors().collect();
        assert_eq!(descs.len(), 13);
        assert!(descs.contains(&(VtxAttr::PositionMatrixIdx, VtxInputType::Direct)));
        assert!(descs.contains(&(VtxAttr::Tex0MatrixIdx, VtxInputType::None)));
        assert!(descs.contains(&(VtxAttr::Position, VtxInputType::Direct)));
        assert!(descs.contains(&(VtxAttr::Normal, VtxInputType::Index8)));
        assert!(descs.contains(&(VtxAttr::Color0, VtxInputType::Index16)));
        assert!(descs.contains(&(VtxAttr::Color1, VtxInputType::None)));
    }

    #[test]
    fn vcd_high_tex_slots() {
        let vcd = VcdHigh(1 | (3 << 14));
        let descs: Vec<_> = vcd.descriptors().collect();
        assert_eq!(descs[0], (VtxAttr::Tex0, VtxInputType::Direct));
        assert_eq!(descs[7], (VtxAttr::Tex7, VtxInputType::Index16));
    }

    #[test]
    fn vat_groups_commute_for_tex4() {
        let b = VatB((1 << 27) | (3 << 28));
        let c = VatC(9);

        let mut bc = [VtxAttrFmt::default(); VtxAttr::COUNT];
        b.apply(&mut bc);
        c.apply(&mut bc);
        let mut cb = [VtxAttrFmt::default(); VtxAttr::COUNT];
        c.apply(&mut cb);
        b.apply(&mut cb);

        assert_eq!(bc, cb);
        let tex4 = bc[VtxAttr::Tex4 as usize];
        assert_eq!((tex4.count, tex4.comp_type, tex4.frac), (1, 3, 9));
    }

    #[test]
    fn vat_a_position_fields() {
        let word = 1 | (3 << 1) | (8 << 4) | (1 << 13) | (5 << 14);
        let mut table = [VtxAttrFmt::default(); VtxAttr::COUNT];
        VatA(word).apply(&mut table);
        let pos = table[VtxAttr::Position as usize];
        assert_eq!((pos.count, pos.comp_type, pos.frac), (1, 3, 8));
        let clr = table[VtxAttr::Color0 as usize];
        assert_eq!((clr.count, clr.comp_type), (1, 5));
    }

    #[test]
    fn tex_map_addressing() {
        assert_eq!(tex_map_for(0x88, BP_TEX_IMAGE0), Some(0));
        assert_eq!(tex_map_for(0x8B, BP_TEX_IMAGE0), Some(3));
        assert_eq!(tex_map_for(0xA8, BP_TEX_IMAGE0), Some(4));
        assert_eq!(tex_map_for(0xAB, BP_TEX_IMAGE0), Some(7));
        assert_eq!(tex_map_for(0x8C, BP_TEX_IMAGE0), None);
    }

    #[test]
    fn tev_order_halves() {
        // even: map 2, coord 1, enabled, channel 0; odd: disabled, channel 1
        let reg = TevOrderReg(2 | (1 << 3) | (1 << 6) | (1 << 19));
        assert_eq!(reg.tex_map(false), 2);
        assert_eq!(reg.tex_coord(false), 1);
        assert!(reg.enable(false));
        assert_eq!(reg.channel(false), 0);
        assert!(!reg.enable(true));
        assert_eq!(reg.channel(true), 1);
    }

    #[test]
    fn tex_image0_dimensions() {
        let reg = TexImage0(7 | (3 << 10) | (0xE << 20));
        assert_eq!(reg.width(), 8);
        assert_eq!(reg.height(), 4);
        assert_eq!(reg.format(), 0xE);
    }

    #[test]
    fn lod_bias_is_signed() {
        assert_eq!(TexMode0(0xFF << 9).lod_bias_f32(), -1.0 / 32.0);
        assert_eq!(TexMode0(32 << 9).lod_bias_f32(), 1.0);
    }
}

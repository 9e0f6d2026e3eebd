/// GX lighting / color channel configuration.
/// A single color channel configuration (material + ambient + light enable).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorChannel {
    pub mat_src: ColorSrc,
    pub amb_src: ColorSrc,
    pub light_mask: u8,
    pub diff_fn: DiffuseFunction,
    pub attn_fn: AttenuationFunction,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSrc {
    Register = 0,
    Vertex = 1,
}

impl ColorSrc {
    fn from_bit(bit: u32) -> Self {
        if bit & 1 == 0 {
            Self::Register
        } else {
            Self::Vertex
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffuseFunction {
    None = 0,
    Sign = 1,
    Clamp = 2,
}

impl DiffuseFunction {
    fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            1 => Self::Sign,
            2 => Self::Clamp,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttenuationFunction {
    Off = 0,
    Spec = 1,
    Spot = 2,
}

impl Default for ColorChannel {
    fn default() -> Self {
        Self {
            mat_src: ColorSrc::Register,
            amb_src: ColorSrc::Register,
            light_mask: 0,
            diff_fn: DiffuseFunction::None,
            attn_fn: AttenuationFunction::Off,
            enabled: false,
        }
    }
}

impl ColorChannel {
    /// Decode a transform-unit channel control word.
    ///
    /// Layout: material source bit 0, lighting enable bit 1, light mask
    /// bits 2..6 and 11..15, ambient source bit 6, diffuse function bits
    /// 7..9, attenuation enable bit 9, spot (vs specular) bit 10.
    pub fn from_xf(word: u32) -> Self {
        let light_mask = ((word >> 2) & 0xF) | (((word >> 11) & 0xF) << 4);
        let attn_fn = if word & (1 << 9) == 0 {
            AttenuationFunction::Off
        } else if word & (1 << 10) != 0 {
            AttenuationFunction::Spot
        } else {
            AttenuationFunction::Spec
        };
        Self {
            mat_src: ColorSrc::from_bit(word),
            amb_src: ColorSrc::from_bit(word >> 6),
            light_mask: light_mask as u8,
            diff_fn: DiffuseFunction::from_bits(word >> 7),
            attn_fn,
            enabled: word & (1 << 1) != 0,
        }
    }
}

/// Light channel state for the GX processor.
///
/// Channels are indexed COLOR0, COLOR1, ALPHA0, ALPHA1.
#[derive(Debug, Clone, PartialEq)]
pub struct LightingState {
    pub channels: [ColorChannel; 4],
    pub num_channels: u8,
    pub material_colors: [[u8; 4]; 2],
    pub ambient_colors: [[u8; 4]; 2],
}

impl LightingState {
    pub const MAX_CHANNELS: u8 = 4;

    pub fn new() -> Self {
        Self {
            channels: [ColorChannel::default(); 4],
            num_channels: 1,
            material_colors: [[255, 255, 255, 255]; 2],
            ambient_colors: [[0, 0, 0, 255]; 2],
        }
    }

    pub fn set_num_channels(&mut self, n: u8) {
        self.num_channels = n.min(Self::MAX_CHANNELS);
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
        if let Some(ch) = self.channels.get_mut(channel as usize) {
            ch.enabled = enable;
            ch.amb_src = ColorSrc::from_bit(amb_src as u32);
            ch.mat_src = ColorSrc::from_bit(mat_src as u32);
            ch.light_mask = light_mask;
            ch.diff_fn = DiffuseFunction::from_bits(diff_fn as u32);
            ch.attn_fn = match attn_fn {
                1 => AttenuationFunction::Spec,
                2 => AttenuationFunction::Spot,
                _ => AttenuationFunction::Off,
            };
        }
    }

    /// Replace a channel control wholesale (transform-unit register path).
    pub fn set_chan_ctrl_word(&mut self, channel: u8, word: u32) {
        if let Some(ch) = self.channels.get_mut(channel as usize) {
            *ch = ColorChannel::from_xf(word);
        }
    }

    pub fn set_mat_color(&mut self, channel: u8, color: [u8; 4]) {
        if let Some(slot) = self.material_colors.get_mut(channel as usize) {
            *slot = color;
        }
    }

    pub fn set_amb_color(&mut self, channel: u8, color: [u8; 4]) {
        if let Some(slot) = self.ambient_colors.get_mut(channel as usize) {
            *slot = color;
        }
    }
}

impl Default for LightingState {
    fn default() -> Self {
        Self::new()
    }
}

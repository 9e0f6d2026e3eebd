// GX texture format catalogue
//
// GX textures are stored as a grid of fixed-size tiles. Every tile holds 32
// bytes of texel data (64 for RGBA8, split into AR and GB halves), so the
// tile footprint depends on the bits per texel. The byte size of an image is
// its dimensions rounded up to whole tiles.

/// Texture formats understood by the decoder, with their hardware codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TextureFormat {
    I4 = 0x0,
    I8 = 0x1,
    IA4 = 0x2,
    IA8 = 0x3,
    RGB565 = 0x4,
    RGB5A3 = 0x5,
    RGBA8 = 0x6,
    C4 = 0x8,
    C8 = 0x9,
    C14X2 = 0xA,
    CMPR = 0xE,
}

impl TextureFormat {
    pub const ALL: [TextureFormat; 11] = [
        Self::I4,
        Self::I8,
        Self::IA4,
        Self::IA8,
        Self::RGB565,
        Self::RGB5A3,
        Self::RGBA8,
        Self::C4,
        Self::C8,
        Self::C14X2,
        Self::CMPR,
    ];

    pub fn from_gx(format: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| *f as u8 == format)
    }

    /// Tile dimensions in texels.
    pub fn tile_size(self) -> (usize, usize) {
        match self {
            Self::I4 | Self::C4 | Self::CMPR => (8, 8),
            Self::I8 | Self::IA4 | Self::C8 => (8, 4),
            Self::IA8 | Self::RGB565 | Self::RGB5A3 | Self::RGBA8 | Self::C14X2 => (4, 4),
        }
    }

    pub fn bits_per_texel(self) -> usize {
        match self {
            Self::I4 | Self::C4 | Self::CMPR => 4,
            Self::I8 | Self::IA4 | Self::C8 => 8,
            Self::IA8 | Self::RGB565 | Self::RGB5A3 | Self::C14X2 => 16,
            Self::RGBA8 => 32,
        }
    }

    /// Bytes per tile. RGBA8 stores its tile as two consecutive 32-byte halves.
    pub fn tile_bytes(self) -> usize {
        let (tw, th) = self.tile_size();
        tw * th * self.bits_per_texel() / 8
    }

    /// Palette formats index into a TLUT instead of storing colors.
    pub fn is_indexed(self) -> bool {
        matches!(self, Self::C4 | Self::C8 | Self::C14X2)
    }

    /// Storage size for a `width` x `height` image including tile padding.
    pub fn size(self, width: u32, height: u32) -> usize {
        let (tw, th) = self.tile_size();
        let aligned = align_up(width as usize, tw) * align_up(height as usize, th);
        aligned * self.bits_per_texel() / 8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::I4 => "I4",
            Self::I8 => "I8",
            Self::IA4 => "IA4",
            Self::IA8 => "IA8",
            Self::RGB565 => "RGB565",
            Self::RGB5A3 => "RGB5A3",
            Self::RGBA8 => "RGBA8",
            Self::C4 => "C4",
            Self::C8 => "C8",
            Self::C14X2 => "C14X2",
            Self::CMPR => "CMPR",
        }
    }
}

/// Entry encoding of a texture lookup table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TlutFormat {
    #[default]
    IA8 = 0,
    RGB565 = 1,
    RGB5A3 = 2,
}

impl TlutFormat {
    pub fn from_gx(format: u8) -> Option<Self> {
        match format {
            0 => Some(Self::IA8),
            1 => Some(Self::RGB565),
            2 => Some(Self::RGB5A3),
            _ => None,
        }
    }
}

/// A borrowed TLUT: big-endian 16-bit entries in `format`.
#[derive(Debug, Clone, Copy)]
pub struct Palette<'a> {
    pub format: TlutFormat,
    pub entries: &'a [u8],
}

impl<'a> Palette<'a> {
    pub fn new(format: TlutFormat, entries: &'a [u8]) -> Self {
        Self { format, entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() < 2
    }
}

/// Storage size for a raw GX format code. Unknown codes are treated as
/// linear RGBA8 so callers never under-allocate.
pub fn size(width: u32, height: u32, format: u8) -> usize {
    match TextureFormat::from_gx(format) {
        Some(fmt) => fmt.size(width, height),
        None => width as usize * height as usize * 4,
    }
}

pub(crate) fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_gx_round_trip() {
        for fmt in TextureFormat::ALL {
            assert_eq!(TextureFormat::from_gx(fmt as u8), Some(fmt));
        }
        assert_eq!(TextureFormat::from_gx(0x7), None);
        assert_eq!(TextureFormat::from_gx(0xF), None);
    }

    #[test]
    fn every_tile_is_32_bytes_except_rgba8() {
        for fmt in TextureFormat::ALL {
            let expected = if fmt == TextureFormat::RGBA8 { 64 } else { 32 };
            assert_eq!(fmt.tile_bytes(), expected, "{}", fmt.name());
        }
    }

    #[test]
    fn sizes_round_up_to_tiles() {
        assert_eq!(size(8, 8, 0x0), 32);
        assert_eq!(size(1, 1, 0x0), 32);
        assert_eq!(size(9, 8, 0x0), 64);
        assert_eq!(size(8, 4, 0x1), 32);
        assert_eq!(size(8, 5, 0x2), 64);
        assert_eq!(size(4, 4, 0x3), 32);
        assert_eq!(size(5, 4, 0x4), 64);
        assert_eq!(size(4, 4, 0x6), 64);
        assert_eq!(size(16, 16, 0xE), 128);
        assert_eq!(size(3, 3, 0xA), 32);
    }

    #[test]
    fn unknown_format_size_is_linear_rgba() {
        assert_eq!(size(3, 5, 0x7), 60);
    }

    #[test]
    fn indexed_formats() {
        assert!(TextureFormat::C4.is_indexed());
        assert!(TextureFormat::C14X2.is_indexed());
        assert!(!TextureFormat::CMPR.is_indexed());
    }
}

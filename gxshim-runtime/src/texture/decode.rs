// Tiled GX texture decoding to linear RGBA8
//
// Tiles are laid out row-major across the padded image and texels are
// row-major within a tile. Texels that fall in the padding are skipped.
// Channel widths below 8 bits are widened with round(v * 255 / (2^n - 1)),
// which is what the hardware texture unit produces.

use super::formats::{Palette, TextureFormat, TlutFormat};

/// Fill color for formats that cannot be decoded.
pub const SENTINEL: [u8; 4] = [255, 0, 255, 255];

/// Widen an `bits`-wide channel value to 8 bits with rounding.
#[inline]
pub fn expand_bits(value: u32, bits: u32) -> u8 {
    let max = (1u32 << bits) - 1;
    ((value.min(max) * 255 + max / 2) / max) as u8
}

#[inline]
pub fn rgb565_to_rgba(texel: u16) -> [u8; 4] {
    let t = texel as u32;
    [
        expand_bits((t >> 11) & 0x1F, 5),
        expand_bits((t >> 5) & 0x3F, 6),
        expand_bits(t & 0x1F, 5),
        255,
    ]
}

#[inline]
pub fn rgb5a3_to_rgba(texel: u16) -> [u8; 4] {
    let t = texel as u32;
    if t & 0x8000 != 0 {
        [
            expand_bits((t >> 10) & 0x1F, 5),
            expand_bits((t >> 5) & 0x1F, 5),
            expand_bits(t & 0x1F, 5),
            255,
        ]
    } else {
        [
            expand_bits((t >> 8) & 0xF, 4),
            expand_bits((t >> 4) & 0xF, 4),
            expand_bits(t & 0xF, 4),
            expand_bits((t >> 12) & 0x7, 3),
        ]
    }
}

/// IA8 texel: high byte alpha, low byte intensity.
#[inline]
pub fn ia8_to_rgba(texel: u16) -> [u8; 4] {
    let a = (texel >> 8) as u8;
    let i = texel as u8;
    [i, i, i, a]
}

/// Decode `data` into a `width * height * 4` RGBA8 buffer.
///
/// Unknown formats, and palette formats without a palette, produce a buffer
/// filled with [`SENTINEL`]. A short `data` slice decodes as far as it goes;
/// the remaining texels stay zero.
pub fn decode(
    data: &[u8],
    width: u32,
    height: u32,
    format: u8,
    palette: Option<&Palette<'_>>,
) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let mut out = vec![0u8; w * h * 4];

    let fmt = match TextureFormat::from_gx(format) {
        Some(fmt) => fmt,
        None => {
            fill(&mut out, SENTINEL);
            return out;
        }
    };

    let mut surface = Surface {
        out: &mut out,
        width: w,
        height: h,
    };

    match fmt {
        TextureFormat::I4 => decode_tiles(data, &mut surface, fmt, |tile, i| {
            let nibble = nibble_at(tile, i)?;
            let v = expand_bits(nibble, 4);
            Some([v, v, v, 255])
        }),
        TextureFormat::I8 => decode_tiles(data, &mut surface, fmt, |tile, i| {
            let v = *tile.get(i)?;
            Some([v, v, v, 255])
        }),
        TextureFormat::IA4 => decode_tiles(data, &mut surface, fmt, |tile, i| {
            let b = *tile.get(i)? as u32;
            let v = expand_bits(b & 0xF, 4);
            Some([v, v, v, expand_bits(b >> 4, 4)])
        }),
        TextureFormat::IA8 => decode_tiles(data, &mut surface, fmt, |tile, i| {
            Some(ia8_to_rgba(u16_at(tile, i)?))
        }),
        TextureFormat::RGB565 => decode_tiles(data, &mut surface, fmt, |tile, i| {
            Some(rgb565_to_rgba(u16_at(tile, i)?))
        }),
        TextureFormat::RGB5A3 => decode_tiles(data, &mut surface, fmt, |tile, i| {
            Some(rgb5a3_to_rgba(u16_at(tile, i)?))
        }),
        TextureFormat::RGBA8 => decode_tiles(data, &mut surface, fmt, |tile, i| {
            let a = *tile.get(i * 2)?;
            let r = *tile.get(i * 2 + 1)?;
            let g = *tile.get(32 + i * 2)?;
            let b = *tile.get(32 + i * 2 + 1)?;
            Some([r, g, b, a])
        }),
        TextureFormat::C4 | TextureFormat::C8 | TextureFormat::C14X2 => match palette {
            Some(palette) => decode_tiles(data, &mut surface, fmt, |tile, i| {
                let index = match fmt {
                    TextureFormat::C4 => nibble_at(tile, i)? as usize,
                    TextureFormat::C8 => *tile.get(i)? as usize,
                    _ => (u16_at(tile, i)? & 0x3FFF) as usize,
                };
                Some(palette_lookup(palette, index))
            }),
            None => fill(surface.out, SENTINEL),
        },
        TextureFormat::CMPR => decode_cmpr(data, &mut surface),
    }

    out
}

struct Surface<'a> {
    out: &'a mut [u8],
    width: usize,
    height: usize,
}

impl Surface<'_> {
    fn put(&mut self, x: usize, y: usize, rgba: [u8; 4]) {
        if x < self.width && y < self.height {
            let at = (y * self.width + x) * 4;
            self.out[at..at + 4].copy_from_slice(&rgba);
        }
    }
}

fn fill(out: &mut [u8], rgba: [u8; 4]) {
    for px in out.chunks_exact_mut(4) {
        px.copy_from_slice(&rgba);
    }
}

fn nibble_at(tile: &[u8], i: usize) -> Option<u32> {
    let b = *tile.get(i / 2)? as u32;
    Some(if i % 2 == 0 { b >> 4 } else { b & 0xF })
}

fn u16_at(tile: &[u8], i: usize) -> Option<u16> {
    let hi = *tile.get(i * 2)?;
    let lo = *tile.get(i * 2 + 1)?;
    Some(u16::from_be_bytes([hi, lo]))
}

fn palette_lookup(palette: &Palette<'_>, index: usize) -> [u8; 4] {
    let Some(entry) = u16_at(palette.entries, index) else {
        return [0, 0, 0, 0];
    };
    match palette.format {
        TlutFormat::IA8 => ia8_to_rgba(entry),
        TlutFormat::RGB565 => rgb565_to_rgba(entry),
        TlutFormat::RGB5A3 => rgb5a3_to_rgba(entry),
    }
}

/// Walk every tile of the padded image and decode texel `i` of each tile
/// with `texel`. A `None` from `texel` means the source ran out.
fn decode_tiles<F>(data: &[u8], surface: &mut Surface<'_>, fmt: TextureFormat, texel: F)
where
    F: Fn(&[u8], usize) -> Option<[u8; 4]>,
{
    let (tw, th) = fmt.tile_size();
    let tile_bytes = fmt.tile_bytes();
    let tiles_x = surface.width.div_ceil(tw);
    let tiles_y = surface.height.div_ceil(th);

    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let start = (ty * tiles_x + tx) * tile_bytes;
            if start >= data.len() {
                return;
            }
            let end = (start + tile_bytes).min(data.len());
            let tile = &data[start..end];
            for i in 0..tw * th {
                match texel(tile, i) {
                    Some(rgba) => surface.put(tx * tw + i % tw, ty * th + i / tw, rgba),
                    None => return,
                }
            }
        }
    }
}

fn decode_cmpr(data: &[u8], surface: &mut Surface<'_>) {
    let tiles_x = surface.width.div_ceil(8);
    let tiles_y = surface.height.div_ceil(8);

    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            for sub in 0..4 {
                let start = ((ty * tiles_x + tx) * 4 + sub) * 8;
                let Some(block) = data.get(start..start + 8) else {
                    return;
                };
                let ox = tx * 8 + (sub % 2) * 4;
                let oy = ty * 8 + (sub / 2) * 4;
                decode_dxt1_block(block, |i, rgba| surface.put(ox + i % 4, oy + i / 4, rgba));
            }
        }
    }
}

/// Decode one 8-byte big-endian DXT1 block, calling `put(texel, rgba)` for
/// the 16 texels in row-major order.
fn decode_dxt1_block(block: &[u8], mut put: impl FnMut(usize, [u8; 4])) {
    let raw0 = u16::from_be_bytes([block[0], block[1]]);
    let raw1 = u16::from_be_bytes([block[2], block[3]]);
    let bits = u32::from_be_bytes([block[4], block[5], block[6], block[7]]);

    let c0 = rgb565_to_rgba(raw0);
    let c1 = rgb565_to_rgba(raw1);
    let mut palette = [c0, c1, [0; 4], [0; 4]];

    if raw0 > raw1 {
        for ch in 0..3 {
            let a = c0[ch] as u32;
            let b = c1[ch] as u32;
            palette[2][ch] = ((2 * a + b + 1) / 3) as u8;
            palette[3][ch] = ((a + 2 * b + 1) / 3) as u8;
        }
        palette[2][3] = 255;
        palette[3][3] = 255;
    } else {
        for ch in 0..3 {
            palette[2][ch] = ((c0[ch] as u32 + c1[ch] as u32) / 2) as u8;
        }
        palette[2][3] = 255;
    }

    for i in 0..16 {
        let index = (bits >> (30 - 2 * i)) & 3;
        put(i, palette[index as usize]);
    }
}

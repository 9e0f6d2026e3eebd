//! Round trips through test-side tile encoders and the texture decoder

use gxshim_runtime::texture::{decode, size, Palette, TextureFormat, TlutFormat};
use proptest::prelude::*;

type Rgba = [u8; 4];

/// Lay an image out in GX tile order. `texel(tile, i, x, y)` writes texel
/// `i` of the current tile for image position (x, y); padding stays zero.
fn encode_tiles(
    w: usize,
    h: usize,
    (tw, th): (usize, usize),
    tile_bytes: usize,
    mut texel: impl FnMut(&mut [u8], usize, usize, usize),
) -> Vec<u8> {
    let tiles_x = w.div_ceil(tw);
    let tiles_y = h.div_ceil(th);
    let mut out = vec![0u8; tiles_x * tiles_y * tile_bytes];
    for (n, tile) in out.chunks_exact_mut(tile_bytes).enumerate() {
        let (tx, ty) = (n % tiles_x, n / tiles_x);
        for i in 0..tw * th {
            let (x, y) = (tx * tw + i % tw, ty * th + i / tw);
            if x < w && y < h {
                texel(tile, i, x, y);
            }
        }
    }
    out
}

fn decoded(
    data: &[u8],
    w: usize,
    h: usize,
    format: TextureFormat,
    palette: Option<&Palette<'_>>,
) -> Vec<Rgba> {
    assert_eq!(data.len(), size(w as u32, h as u32, format as u8));
    decode(data, w as u32, h as u32, format as u8, palette)
        .chunks_exact(4)
        .map(|c| [c[0], c[1], c[2], c[3]])
        .collect()
}

/// Nearest `bits`-wide value for an 8-bit channel.
fn quantize(v: u8, bits: u32) -> u16 {
    let max = (1u32 << bits) - 1;
    ((u32::from(v) * max + 127) / 255) as u16
}

/// Largest error quantizing to `bits` and widening back can introduce.
fn tolerance(bits: u32) -> i32 {
    let max = (1i32 << bits) - 1;
    255 / (2 * max) + 1
}

fn near(actual: u8, expected: u8, bits: u32) -> bool {
    (i32::from(actual) - i32::from(expected)).abs() <= tolerance(bits)
}

fn pack565([r, g, b, _]: Rgba) -> u16 {
    (quantize(r, 5) << 11) | (quantize(g, 6) << 5) | quantize(b, 5)
}

/// 16384 IA8 entries, entry `k` decoding to intensity `k & 0xFF` and
/// alpha `k >> 8`, so a decoded texel names its index.
fn index_palette() -> Vec<u8> {
    (0..16384u16).flat_map(u16::to_be_bytes).collect()
}

fn image() -> impl Strategy<Value = (usize, usize, Vec<Rgba>)> {
    (1usize..=16, 1usize..=16).prop_flat_map(|(w, h)| {
        (
            Just(w),
            Just(h),
            prop::collection::vec(prop::array::uniform4(any::<u8>()), w * h),
        )
    })
}

/// An image plus one color per 4x4 block of the padded CMPR block grid.
fn block_image() -> impl Strategy<Value = (usize, usize, Vec<Rgba>)> {
    (1usize..=16, 1usize..=16).prop_flat_map(|(w, h)| {
        let blocks = w.div_ceil(8) * 2 * h.div_ceil(8) * 2;
        (
            Just(w),
            Just(h),
            prop::collection::vec(prop::array::uniform4(any::<u8>()), blocks),
        )
    })
}

proptest! {
    #[test]
    fn test_i8_is_exact((w, h, px) in image()) {
        let data = encode_tiles(w, h, (8, 4), 32, |tile, i, x, y| tile[i] = px[y * w + x][0]);
        let out = decoded(&data, w, h, TextureFormat::I8, None);
        for (got, src) in out.iter().zip(&px) {
            prop_assert_eq!(*got, [src[0], src[0], src[0], 255]);
        }
    }

    #[test]
    fn test_ia8_is_exact((w, h, px) in image()) {
        let data = encode_tiles(w, h, (4, 4), 32, |tile, i, x, y| {
            let [intensity, _, _, alpha] = px[y * w + x];
            tile[i * 2] = alpha;
            tile[i * 2 + 1] = intensity;
        });
        let out = decoded(&data, w, h, TextureFormat::IA8, None);
        for (got, src) in out.iter().zip(&px) {
            prop_assert_eq!(*got, [src[0], src[0], src[0], src[3]]);
        }
    }

    #[test]
    fn test_rgba8_is_exact((w, h, px) in image()) {
        let data = encode_tiles(w, h, (4, 4), 64, |tile, i, x, y| {
            let [r, g, b, a] = px[y * w + x];
            tile[i * 2] = a;
            tile[i * 2 + 1] = r;
            tile[32 + i * 2] = g;
            tile[32 + i * 2 + 1] = b;
        });
        prop_assert_eq!(decoded(&data, w, h, TextureFormat::RGBA8, None), px);
    }

    #[test]
    fn test_palette_indices_are_exact((w, h, px) in image()) {
        let entries = index_palette();
        let palette = Palette::new(TlutFormat::IA8, &entries);

        let index_of = |got: &Rgba| (usize::from(got[3]) << 8) | usize::from(got[0]);

        let data = encode_tiles(w, h, (8, 8), 32, |tile, i, x, y| {
            let shift = if i % 2 == 0 { 4 } else { 0 };
            tile[i / 2] |= (px[y * w + x][0] & 0xF) << shift;
        });
        let out = decoded(&data, w, h, TextureFormat::C4, Some(&palette));
        for (got, src) in out.iter().zip(&px) {
            prop_assert_eq!(index_of(got), usize::from(src[0] & 0xF));
        }

        let data = encode_tiles(w, h, (8, 4), 32, |tile, i, x, y| tile[i] = px[y * w + x][0]);
        let out = decoded(&data, w, h, TextureFormat::C8, Some(&palette));
        for (got, src) in out.iter().zip(&px) {
            prop_assert_eq!(index_of(got), usize::from(src[0]));
        }

        let data = encode_tiles(w, h, (4, 4), 32, |tile, i, x, y| {
            let [hi, lo, _, _] = px[y * w + x];
            tile[i * 2] = hi;
            tile[i * 2 + 1] = lo;
        });
        let out = decoded(&data, w, h, TextureFormat::C14X2, Some(&palette));
        for (got, src) in out.iter().zip(&px) {
            let raw = u16::from_be_bytes([src[0], src[1]]);
            prop_assert_eq!(index_of(got), usize::from(raw & 0x3FFF));
            prop_assert!(got[0] == got[1] && got[1] == got[2]);
        }
    }

    #[test]
    fn test_rgb565_is_within_rounding((w, h, px) in image()) {
        let data = encode_tiles(w, h, (4, 4), 32, |tile, i, x, y| {
            let raw = pack565(px[y * w + x]);
            tile[i * 2..i * 2 + 2].copy_from_slice(&raw.to_be_bytes());
        });
        let out = decoded(&data, w, h, TextureFormat::RGB565, None);
        for (got, src) in out.iter().zip(&px) {
            prop_assert!(near(got[0], src[0], 5), "{:?} vs {:?}", got, src);
            prop_assert!(near(got[1], src[1], 6), "{:?} vs {:?}", got, src);
            prop_assert!(near(got[2], src[2], 5), "{:?} vs {:?}", got, src);
            prop_assert_eq!(got[3], 255);
        }
    }

    #[test]
    fn test_rgb5a3_is_within_rounding((w, h, px) in image()) {
        let data = encode_tiles(w, h, (4, 4), 32, |tile, i, x, y| {
            let [r, g, b, a] = px[y * w + x];
            let raw = if a == 255 {
                0x8000 | (quantize(r, 5) << 10) | (quantize(g, 5) << 5) | quantize(b, 5)
            } else {
                (quantize(a, 3) << 12)
                    | (quantize(r, 4) << 8)
                    | (quantize(g, 4) << 4)
                    | quantize(b, 4)
            };
            tile[i * 2..i * 2 + 2].copy_from_slice(&raw.to_be_bytes());
        });
        let out = decoded(&data, w, h, TextureFormat::RGB5A3, None);
        for (got, src) in out.iter().zip(&px) {
            let (color_bits, alpha_bits) = if src[3] == 255 { (5, 8) } else { (4, 3) };
            for ch in 0..3 {
                prop_assert!(near(got[ch], src[ch], color_bits), "{:?} vs {:?}", got, src);
            }
            prop_assert!(near(got[3], src[3], alpha_bits), "{:?} vs {:?}", got, src);
        }
    }

    #[test]
    fn test_i4_is_within_rounding((w, h, px) in image()) {
        let data = encode_tiles(w, h, (8, 8), 32, |tile, i, x, y| {
            let shift = if i % 2 == 0 { 4 } else { 0 };
            tile[i / 2] |= (quantize(px[y * w + x][0], 4) as u8) << shift;
        });
        let out = decoded(&data, w, h, TextureFormat::I4, None);
        for (got, src) in out.iter().zip(&px) {
            prop_assert!(near(got[0], src[0], 4), "{:?} vs {:?}", got, src);
            prop_assert!(got[0] == got[1] && got[1] == got[2]);
            prop_assert_eq!(got[3], 255);
        }
    }

    #[test]
    fn test_solid_cmpr_blocks_are_within_rounding((w, h, blocks) in block_image()) {
        let blocks_x = w.div_ceil(8) * 2;
        let tiles = w.div_ceil(8) * h.div_ceil(8);
        let mut data = Vec::with_capacity(tiles * 32);
        for n in 0..tiles {
            let (tx, ty) = (n % w.div_ceil(8), n / w.div_ceil(8));
            for sub in 0..4 {
                let (bx, by) = (tx * 2 + sub % 2, ty * 2 + sub / 2);
                let raw = pack565(blocks[by * blocks_x + bx]).to_be_bytes();
                // Equal endpoints with every index 0 select endpoint 0.
                data.extend_from_slice(&[raw[0], raw[1], raw[0], raw[1], 0, 0, 0, 0]);
            }
        }
        let out = decoded(&data, w, h, TextureFormat::CMPR, None);
        for (n, got) in out.iter().enumerate() {
            let (x, y) = (n % w, n / w);
            let src = blocks[(y / 4) * blocks_x + x / 4];
            prop_assert!(near(got[0], src[0], 5), "{:?} vs {:?}", got, src);
            prop_assert!(near(got[1], src[1], 6), "{:?} vs {:?}", got, src);
            prop_assert!(near(got[2], src[2], 5), "{:?} vs {:?}", got, src);
            prop_assert_eq!(got[3], 255);
        }
    }
}

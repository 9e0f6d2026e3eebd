// Image sources and texture-pointer resolution
//
// Texture and vertex-array bindings name their backing bytes with an opaque
// `ImageKey`. Live callers hand keys over directly; replayed display lists
// only carry a 24-bit token, which the `TokenTable` maps back to a key.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Opaque handle for a block of image or vertex-array bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageKey(pub u32);

/// Read-only provider of bytes referenced by an `ImageKey`.
pub trait ImageSource {
    fn image_bytes(&self, key: ImageKey) -> Option<&[u8]>;
}

/// In-memory image source keyed by insertion order.
#[derive(Debug, Default)]
pub struct ImageStore {
    images: HashMap<ImageKey, Vec<u8>>,
    next_key: u32,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` under a fresh key.
    pub fn insert(&mut self, bytes: Vec<u8>) -> ImageKey {
        let key = ImageKey(self.next_key);
        self.next_key = self.next_key.wrapping_add(1);
        self.images.insert(key, bytes);
        key
    }

    /// Store `bytes` under a caller-chosen key, replacing what was there.
    pub fn insert_with_key(&mut self, key: ImageKey, bytes: Vec<u8>) {
        self.next_key = self.next_key.max(key.0.wrapping_add(1));
        self.images.insert(key, bytes);
    }

    pub fn remove(&mut self, key: ImageKey) -> Option<Vec<u8>> {
        self.images.remove(&key)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl ImageSource for ImageStore {
    fn image_bytes(&self, key: ImageKey) -> Option<&[u8]> {
        self.images.get(&key).map(Vec::as_slice)
    }
}

/// Maps the 24-bit texture-pointer token found in replayed lists to a key.
#[derive(Debug, Default, Clone)]
pub struct TokenTable {
    entries: HashMap<u32, ImageKey>,
}

impl TokenTable {
    pub const TOKEN_MASK: u32 = 0x00FF_FFFF;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, token: u32, key: ImageKey) {
        self.entries.insert(token & Self::TOKEN_MASK, key);
    }

    pub fn resolve(&self, token: u32) -> Option<ImageKey> {
        self.entries.get(&(token & Self::TOKEN_MASK)).copied()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Write a decoded RGBA8 buffer to `path` as PNG.
pub fn save_rgba_png(path: &Path, width: u32, height: u32, rgba: &[u8]) -> Result<()> {
    let image = image::RgbaImage::from_raw(width, height, rgba.to_vec())
        .with_context(|| format!("pixel buffer does not hold a {width}x{height} image"))?;
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_hands_out_distinct_keys() {
        let mut store = ImageStore::new();
        let a = store.insert(vec![1, 2]);
        let b = store.insert(vec![3]);
        assert_ne!(a, b);
        assert_eq!(store.image_bytes(a), Some(&[1u8, 2][..]));
        assert_eq!(store.image_bytes(b), Some(&[3u8][..]));
    }

    #[test]
    fn explicit_key_does_not_collide_with_later_inserts() {
        let mut store = ImageStore::new();
        store.insert_with_key(ImageKey(10), vec![0xAA]);
        let next = store.insert(vec![0xBB]);
        assert_eq!(next, ImageKey(11));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn token_lookup_ignores_upper_byte() {
        let mut table = TokenTable::new();
        table.register(0x0012_3456, ImageKey(7));
        assert_eq!(table.resolve(0xFF12_3456), Some(ImageKey(7)));
        assert_eq!(table.resolve(0x0012_3457), None);
    }

    #[test]
    fn png_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tex.png");
        let rgba = [255u8, 0, 0, 255, 0, 255, 0, 255];
        save_rgba_png(&path, 2, 1, &rgba).unwrap();
        let loaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(loaded.as_raw().as_slice(), &rgba);
    }

    #[test]
    fn png_rejects_short_buffer() {
        let dir = tempfile::tempdir().unwrap();
        assert!(save_rgba_png(&dir.path().join("x.png"), 4, 4, &[0; 8]).is_err());
    }
}

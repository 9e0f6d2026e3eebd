// Decoded texture cache
use std::collections::HashMap;

use crate::graphics::backend::TextureHandle;
use crate::texture::formats::TlutFormat;
use crate::texture::loader::ImageKey;

/// Identity of a decoded texture. Palette formats also key on their TLUT
/// image and entry encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureKey {
    pub image: ImageKey,
    pub width: u16,
    pub height: u16,
    pub format: u8,
    pub tlut: Option<(ImageKey, TlutFormat)>,
}

/// Fixed-size ring of uploaded textures.
///
/// Inserting into a full ring overwrites the oldest slot and hands its
/// handle back so the caller can release it on the backend. There is no
/// reference counting; a handle is only valid until its slot is reused.
pub struct TextureCache {
    slots: Vec<Option<(TextureKey, TextureHandle)>>,
    index: HashMap<TextureKey, usize>,
    next: usize,
    hits: u64,
    misses: u64,
}

impl TextureCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![None; capacity],
            index: HashMap::with_capacity(capacity),
            next: 0,
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, key: &TextureKey) -> Option<TextureHandle> {
        let found = self
            .index
            .get(key)
            .and_then(|&slot| self.slots[slot])
            .map(|(_, handle)| handle);
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    /// Store `handle` in the next ring slot, returning any handle it evicts.
    pub fn insert(&mut self, key: TextureKey, handle: TextureHandle) -> Option<TextureHandle> {
        if let Some(&slot) = self.index.get(&key) {
            let old = self.slots[slot].replace((key, handle));
            return old.map(|(_, h)| h).filter(|&h| h != handle);
        }

        let slot = self.next;
        self.next = (self.next + 1) % self.slots.len();

        let evicted = self.slots[slot].take().map(|(old_key, old_handle)| {
            self.index.remove(&old_key);
            old_handle
        });
        self.slots[slot] = Some((key, handle));
        self.index.insert(key, slot);
        evicted
    }

    /// Empty the ring, returning every handle it held.
    pub fn clear(&mut self) -> Vec<TextureHandle> {
        self.index.clear();
        self.next = 0;
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.take().map(|(_, h)| h))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(image: u32) -> TextureKey {
        TextureKey {
            image: ImageKey(image),
            width: 8,
            height: 8,
            format: 0,
            tlut: None,
        }
    }

    #[test]
    fn lookup_after_insert() {
        let mut cache = TextureCache::new(4);
        assert!(cache.get(&key(1)).is_none());
        assert!(cache.insert(key(1), TextureHandle(10)).is_none());
        assert_eq!(cache.get(&key(1)), Some(TextureHandle(10)));
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
    }

    #[test]
    fn dimensions_are_part_of_the_key() {
        let mut cache = TextureCache::new(4);
        cache.insert(key(1), TextureHandle(10));
        let wider = TextureKey {
            width: 16,
            ..key(1)
        };
        assert!(cache.get(&wider).is_none());
    }

    #[test]
    fn palette_encoding_is_part_of_the_key() {
        let mut cache = TextureCache::new(4);
        let ia8 = TextureKey {
            format: 0x8,
            tlut: Some((ImageKey(9), TlutFormat::IA8)),
            ..key(1)
        };
        cache.insert(ia8, TextureHandle(10));
        let rgb565 = TextureKey {
            tlut: Some((ImageKey(9), TlutFormat::RGB565)),
            ..ia8
        };
        assert!(cache.get(&rgb565).is_none());
        assert_eq!(cache.get(&ia8), Some(TextureHandle(10)));
    }

    #[test]
    fn full_ring_evicts_oldest() {
        let mut cache = TextureCache::new(2);
        cache.insert(key(1), TextureHandle(1));
        cache.insert(key(2), TextureHandle(2));
        assert_eq!(cache.insert(key(3), TextureHandle(3)), Some(TextureHandle(1)));
        assert!(cache.get(&key(1)).is_none());
        assert_eq!(cache.get(&key(2)), Some(TextureHandle(2)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn reinserting_a_key_replaces_in_place() {
        let mut cache = TextureCache::new(2);
        cache.insert(key(1), TextureHandle(1));
        assert_eq!(cache.insert(key(1), TextureHandle(5)), Some(TextureHandle(1)));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key(1)), Some(TextureHandle(5)));
    }

    #[test]
    fn clear_returns_all_handles() {
        let mut cache = TextureCache::new(3);
        cache.insert(key(1), TextureHandle(1));
        cache.insert(key(2), TextureHandle(2));
        let mut handles = cache.clear();
        handles.sort_by_key(|h| h.0);
        assert_eq!(handles, vec![TextureHandle(1), TextureHandle(2)]);
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_still_holds_one() {
        let mut cache = TextureCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert(key(1), TextureHandle(1));
        assert_eq!(cache.insert(key(2), TextureHandle(2)), Some(TextureHandle(1)));
    }
}

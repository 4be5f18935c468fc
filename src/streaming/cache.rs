//! LRU cache for decoded thumbnails
//!
//! Keeps fetched LOD images in memory so a cell that leaves and re-enters the
//! camera neighborhood does not hit the network again. The cache is bounded
//! by decoded bytes; when over budget the least recently used image goes.

use std::collections::HashMap;
use std::sync::Arc;

use image::RgbaImage;

use crate::streaming::budget::MemoryBudget;

/// LRU cache of decoded thumbnails keyed by cell index
pub struct ImageCache {
    images: HashMap<u32, Arc<RgbaImage>>,
    /// Access order: oldest first, newest last
    access_order: Vec<u32>,
    budget: MemoryBudget,
}

fn image_bytes(image: &RgbaImage) -> usize {
    image.as_raw().len()
}

impl ImageCache {
    /// Create a cache holding at most `budget_bytes` of decoded pixels.
    /// The most recent image is always kept, even when it alone exceeds
    /// the budget.
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            images: HashMap::new(),
            access_order: Vec::new(),
            budget: MemoryBudget::new(budget_bytes),
        }
    }

    /// Get an image, marking it as recently used.
    pub fn get(&mut self, cell: u32) -> Option<Arc<RgbaImage>> {
        let image = self.images.get(&cell).cloned()?;
        self.update_access_order(cell);
        Some(image)
    }

    /// Insert an image, evicting older entries while over budget.
    ///
    /// # Returns
    /// Cells whose images were evicted
    pub fn insert(&mut self, cell: u32, image: Arc<RgbaImage>) -> Vec<u32> {
        self.budget.add(image_bytes(&image));
        if let Some(replaced) = self.images.insert(cell, image) {
            self.budget.remove(image_bytes(&replaced));
        }
        self.update_access_order(cell);

        let mut evicted = Vec::new();
        while self.budget.is_over() && self.access_order.len() > 1 {
            let oldest = self.access_order[0];
            self.remove(oldest);
            evicted.push(oldest);
        }
        if !evicted.is_empty() {
            log::trace!("Image cache evicted {} thumbnails", evicted.len());
        }
        evicted
    }

    pub fn remove(&mut self, cell: u32) -> Option<Arc<RgbaImage>> {
        self.remove_from_access_order(cell);
        let image = self.images.remove(&cell)?;
        self.budget.remove(image_bytes(&image));
        Some(image)
    }

    pub fn contains(&self, cell: u32) -> bool {
        self.images.contains_key(&cell)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Decoded bytes currently held
    pub fn bytes_used(&self) -> usize {
        self.budget.used()
    }

    pub fn pressure(&self) -> f32 {
        self.budget.pressure()
    }

    fn update_access_order(&mut self, cell: u32) {
        self.remove_from_access_order(cell);
        self.access_order.push(cell);
    }

    fn remove_from_access_order(&mut self, cell: u32) {
        if let Some(pos) = self.access_order.iter().position(|&c| c == cell) {
            self.access_order.remove(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2x2 RGBA image, 16 bytes
    fn thumb() -> Arc<RgbaImage> {
        Arc::new(RgbaImage::new(2, 2))
    }

    #[test]
    fn test_cache_insert_and_get() {
        let mut cache = ImageCache::new(1024);
        assert!(cache.is_empty());
        cache.insert(7, thumb());
        assert!(cache.contains(7));
        assert_eq!(cache.bytes_used(), 16);
        assert!(cache.get(7).is_some());
        assert!(cache.get(8).is_none());
    }

    #[test]
    fn test_cache_replace_keeps_byte_count() {
        let mut cache = ImageCache::new(1024);
        cache.insert(1, thumb());
        cache.insert(1, thumb());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.bytes_used(), 16);
    }

    #[test]
    fn test_cache_lru_eviction() {
        let mut cache = ImageCache::new(48);
        cache.insert(1, thumb());
        cache.insert(2, thumb());
        cache.insert(3, thumb());

        // Touch 1 so that 2 becomes the oldest
        cache.get(1);
        let evicted = cache.insert(4, thumb());
        assert_eq!(evicted, vec![2]);
        assert!(cache.contains(1));
        assert!(!cache.contains(2));
        assert_eq!(cache.bytes_used(), 48);
    }

    #[test]
    fn test_cache_keeps_newest_when_oversized() {
        let mut cache = ImageCache::new(8);
        cache.insert(1, thumb());
        let evicted = cache.insert(2, thumb());
        assert_eq!(evicted, vec![1]);
        assert!(cache.contains(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_remove() {
        let mut cache = ImageCache::new(1024);
        cache.insert(5, thumb());
        assert!(cache.remove(5).is_some());
        assert!(cache.remove(5).is_none());
        assert_eq!(cache.bytes_used(), 0);
    }
}

//! Level of detail streaming for cells near the camera
//!
//! When the camera is close to the plane, cells around it are upgraded from
//! their small atlas thumbnail to a full-resolution image copied into a slot
//! of the shared LOD texture. The work is spread over frames:
//!
//! - one thumbnail fetch is started per frame, seeded from the camera's grid
//!   bucket and then widened ring by ring as the queue drains;
//! - fetched images are activated in batches every `activation_interval`
//!   frames, as long as they are still near the camera and a slot is free;
//! - when the camera changes bucket, active buckets that fell out of the
//!   neighborhood are evicted and their slots returned.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::atlas::config::AtlasConfig;
use crate::cell::model::{Cell, SlotRect};
use crate::core::types::Vec2;
use crate::render::buffer::DrawCalls;
use crate::render::renderer::{Renderer, TextureTarget};
use crate::streaming::cache::ImageCache;
use crate::streaming::grid::{GridCoord, LodGrid};
use crate::streaming::slots::SlotTable;
use crate::streaming::thumbs::{ThumbnailFetcher, ThumbnailResult};

/// Tuning for LOD streaming
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    /// Camera depth above which no LOD work happens and every active cell
    /// is evicted
    pub min_detail_depth: f32,
    /// Smallest neighborhood radius, in buckets
    pub radius_floor: u32,
    /// Largest neighborhood radius, in buckets
    pub radius_max: u32,
    /// Radius multiplier applied when the camera changes bucket
    pub radius_shrink: f32,
    /// Horizontal extent of the neighborhood relative to its vertical extent
    pub horizontal_stretch: f32,
    /// Frames between activation batches
    pub activation_interval: u32,
    /// Minimum grid buckets per axis
    pub min_grid_buckets: u32,
    /// Frames after which an unanswered fetch stops blocking neighborhood
    /// expansion
    pub stale_fetch_frames: u64,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            min_detail_depth: 250.0,
            radius_floor: 1,
            radius_max: 30,
            radius_shrink: 0.6,
            horizontal_stretch: 1.5,
            activation_interval: 10,
            min_grid_buckets: 100,
            stale_fetch_frames: 600,
        }
    }
}

/// What one LOD update did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LodFrameStats {
    pub fetches_started: u32,
    pub activated: u32,
    pub evicted: u32,
    /// Queued activations discarded because the camera moved away
    pub dropped: u32,
}

#[derive(Clone, Copy, Debug)]
struct ActiveSlot {
    cell: u32,
    slot: SlotRect,
}

/// Mutable scene state an update works on
pub struct LodScene<'a> {
    pub cells: &'a mut [Cell],
    pub draw_calls: &'a mut DrawCalls,
    pub renderer: &'a mut dyn Renderer,
}

/// Streaming cache of full-resolution cell images
pub struct LodCache {
    config: LodConfig,
    atlas: AtlasConfig,
    grid: LodGrid,
    /// Bucket the camera was in on the last update; `None` when out of range
    cam_grid_pos: Option<GridCoord>,
    radius: u32,
    /// Radius the neighborhood was last expanded for; 0 when not yet
    neighbors_requested: u32,
    slots: SlotTable,
    active_by_bucket: HashMap<GridCoord, Vec<ActiveSlot>>,
    active_by_cell: HashMap<u32, SlotRect>,
    images: ImageCache,
    fetch_queue: VecDeque<u32>,
    /// Outstanding fetches and the frame they were started on
    in_flight: HashMap<u32, u64>,
    to_activate: VecDeque<u32>,
    /// Members of `to_activate`
    queued: HashSet<u32>,
    /// Cells whose thumbnail failed; not requested again
    failed: HashSet<u32>,
    generation: u64,
    frame: u64,
    exhausted: bool,
}

impl LodCache {
    /// # Arguments
    /// * `config` - Streaming heuristics
    /// * `atlas` - Derived atlas configuration (supplies slot geometry)
    /// * `image_cache_bytes` - Budget for decoded thumbnails kept in memory
    pub fn new(config: LodConfig, atlas: AtlasConfig, image_cache_bytes: usize) -> Self {
        let slots = SlotTable::new(atlas.lod_texture_px, atlas.lod_cell_px);
        log::debug!("LOD texture: {} slots of {}px", slots.total(), atlas.lod_cell_px);
        Self {
            radius: config.radius_floor.max(1),
            config,
            atlas,
            grid: LodGrid::default(),
            cam_grid_pos: None,
            neighbors_requested: 0,
            slots,
            active_by_bucket: HashMap::new(),
            active_by_cell: HashMap::new(),
            images: ImageCache::new(image_cache_bytes),
            fetch_queue: VecDeque::new(),
            in_flight: HashMap::new(),
            to_activate: VecDeque::new(),
            queued: HashSet::new(),
            failed: HashSet::new(),
            generation: 0,
            frame: 0,
            exhausted: false,
        }
    }

    pub fn config(&self) -> &LodConfig {
        &self.config
    }

    pub fn grid(&self) -> &LodGrid {
        &self.grid
    }

    /// Rebuild the spatial grid from current cell positions.
    pub fn rebuild_grid(&mut self, cells: &mut [Cell]) {
        self.grid = LodGrid::build(cells, self.config.min_grid_buckets);
    }

    /// Advance streaming by one frame for a camera above `ground` at height
    /// `depth`.
    pub fn update(
        &mut self,
        ground: Vec2,
        depth: f32,
        scene: LodScene<'_>,
        fetcher: &mut dyn ThumbnailFetcher,
    ) -> LodFrameStats {
        let LodScene { cells, draw_calls, renderer } = scene;
        let mut stats = LodFrameStats::default();
        self.frame += 1;
        self.receive(fetcher.poll());
        self.expire_stale_fetches();

        if depth > self.config.min_detail_depth {
            if self.cam_grid_pos.is_some() || !self.active_by_cell.is_empty() {
                stats.evicted += self.evict_all(cells, draw_calls);
                self.cam_grid_pos = None;
                self.radius = self.config.radius_floor.max(1);
                self.neighbors_requested = 0;
                self.fetch_queue.clear();
                self.to_activate.clear();
                self.queued.clear();
                log::debug!("Camera above detail range, LOD cleared");
            }
            return stats;
        }

        let bucket = self.camera_bucket_of(ground);
        if self.cam_grid_pos != Some(bucket) {
            stats.evicted += self.on_bucket_change(bucket, cells, draw_calls);
        }

        self.fetch_next(cells, fetcher, &mut stats);

        let interval = u64::from(self.config.activation_interval.max(1));
        if self.frame % interval == 0 {
            self.activate_pending(cells, draw_calls, renderer, &mut stats);
        }
        stats
    }

    fn on_bucket_change(&mut self, bucket: GridCoord, cells: &mut [Cell], draw_calls: &mut DrawCalls) -> u32 {
        if self.cam_grid_pos.is_some() {
            let shrunk = (self.radius as f32 * self.config.radius_shrink).ceil() as u32;
            self.radius = shrunk.max(self.config.radius_floor).max(1);
        }
        self.cam_grid_pos = Some(bucket);
        self.neighbors_requested = 0;

        let stale: Vec<GridCoord> = self
            .active_by_bucket
            .keys()
            .copied()
            .filter(|&b| !self.in_radius(b))
            .collect();
        let evicted: u32 = stale.into_iter().map(|b| self.evict_bucket(b, cells, draw_calls)).sum();

        self.fetch_queue = self.grid.cells_in(bucket).iter().copied().collect();
        log::trace!(
            "Camera entered bucket ({}, {}), radius {}, evicted {}",
            bucket.x, bucket.y, self.radius, evicted
        );
        evicted
    }

    /// Neighborhood half-extents `(x, y)` in buckets at `radius`
    fn half_extents_at(&self, radius: u32) -> (i32, i32) {
        let y = i32::try_from(radius).unwrap_or(i32::MAX);
        let x = (radius as f32 * self.config.horizontal_stretch).floor() as i32;
        (x.max(y), y)
    }

    fn half_extents(&self) -> (i32, i32) {
        self.half_extents_at(self.radius)
    }

    /// Camera bucket, pulled in to just beyond the widest neighborhood that
    /// can still reach the grid. Positions far off a small or collapsed grid
    /// would otherwise land near the ends of the `i32` range.
    fn camera_bucket_of(&self, ground: Vec2) -> GridCoord {
        let cap = self.config.radius_max.max(self.config.radius_floor).max(1);
        let (hx, hy) = self.half_extents_at(cap);
        let last = self.grid.buckets() as i32 - 1;
        let raw = self.grid.bucket_of(ground);
        let clamp = |v: i32, reach: i32| v.clamp(-reach.saturating_add(1), last.saturating_add(reach).saturating_add(1));
        GridCoord::new(clamp(raw.x, hx), clamp(raw.y, hy))
    }

    /// True if `bucket` lies inside the camera neighborhood.
    pub fn in_radius(&self, bucket: GridCoord) -> bool {
        let Some(cam) = self.cam_grid_pos else { return false };
        let (hx, hy) = self.half_extents();
        bucket.x.abs_diff(cam.x) <= hx as u32 && bucket.y.abs_diff(cam.y) <= hy as u32
    }

    fn fetch_next(&mut self, cells: &[Cell], fetcher: &mut dyn ThumbnailFetcher, stats: &mut LodFrameStats) {
        if self.fetch_queue.is_empty() && self.in_flight.is_empty() && self.neighbors_requested < self.radius {
            self.enqueue_neighbors();
        }
        let Some(cell) = self.fetch_queue.pop_front() else { return };
        if self.active_by_cell.contains_key(&cell)
            || self.queued.contains(&cell)
            || self.failed.contains(&cell)
            || self.in_flight.contains_key(&cell)
        {
            return;
        }
        if self.images.contains(cell) {
            self.enqueue_activation(cell);
            return;
        }
        let Some(record) = cells.get(cell as usize) else { return };
        self.in_flight.insert(cell, self.frame);
        fetcher.request(cell, &record.name, self.generation);
        stats.fetches_started += 1;
    }

    fn enqueue_neighbors(&mut self) {
        let Some(cam) = self.cam_grid_pos else { return };
        let (hx, hy) = self.half_extents();
        let last = self.grid.buckets() as i32 - 1;
        // Only buckets inside the grid hold cells
        let xs = cam.x.saturating_sub(hx).max(0)..=cam.x.saturating_add(hx).min(last);
        let ys = cam.y.saturating_sub(hy).max(0)..=cam.y.saturating_add(hy).min(last);
        for y in ys {
            for x in xs.clone() {
                for &cell in self.grid.cells_in(GridCoord::new(x, y)) {
                    if !self.active_by_cell.contains_key(&cell) && !self.queued.contains(&cell) && !self.failed.contains(&cell) {
                        self.fetch_queue.push_back(cell);
                    }
                }
            }
        }
        self.neighbors_requested = self.radius;
        self.radius = (self.radius + 1).min(self.config.radius_max.max(self.config.radius_floor));
        log::trace!("Queued {} neighbor fetches, radius now {}", self.fetch_queue.len(), self.radius);
    }

    fn receive(&mut self, results: Vec<ThumbnailResult>) {
        for ThumbnailResult { cell, generation, image } in results {
            if generation == self.generation {
                self.in_flight.remove(&cell);
            }
            match image {
                Ok(image) => {
                    self.images.insert(cell, Arc::new(image));
                    if generation == self.generation {
                        self.enqueue_activation(cell);
                    } else {
                        log::trace!("Cached stale thumbnail for cell {}", cell);
                    }
                }
                Err(e) => {
                    if self.failed.insert(cell) {
                        log::warn!("Thumbnail for cell {} failed: {}", cell, e);
                    }
                }
            }
        }
    }

    fn expire_stale_fetches(&mut self) {
        let horizon = self.config.stale_fetch_frames;
        let frame = self.frame;
        self.in_flight.retain(|cell, started| {
            let fresh = frame.saturating_sub(*started) < horizon;
            if !fresh {
                log::debug!("Thumbnail fetch for cell {} timed out", cell);
            }
            fresh
        });
    }

    fn enqueue_activation(&mut self, cell: u32) {
        if !self.active_by_cell.contains_key(&cell) && self.queued.insert(cell) {
            self.to_activate.push_back(cell);
        }
    }

    fn activate_pending(
        &mut self,
        cells: &mut [Cell],
        draw_calls: &mut DrawCalls,
        renderer: &mut dyn Renderer,
        stats: &mut LodFrameStats,
    ) {
        while let Some(index) = self.to_activate.pop_front() {
            if self.active_by_cell.contains_key(&index) {
                self.queued.remove(&index);
                continue;
            }
            let Some(cell) = cells.get_mut(index as usize) else {
                self.queued.remove(&index);
                continue;
            };
            if !self.in_radius(cell.grid) {
                self.queued.remove(&index);
                stats.dropped += 1;
                continue;
            }
            let Some(image) = self.images.get(index) else {
                // Evicted from the image cache; the next expansion refetches it
                self.queued.remove(&index);
                continue;
            };
            let Some(slot) = self.slots.acquire() else {
                if !self.exhausted {
                    log::warn!(
                        "LOD texture full ({} slots), {} activations deferred",
                        self.slots.total(),
                        self.to_activate.len() + 1
                    );
                    self.exhausted = true;
                }
                self.to_activate.push_front(index);
                break;
            };

            self.queued.remove(&index);
            renderer.copy_region_into_texture(TextureTarget::Lod, slot, &image);
            cell.activate(slot, [image.width(), image.height()], draw_calls);
            self.active_by_bucket.entry(cell.grid).or_default().push(ActiveSlot { cell: index, slot });
            self.active_by_cell.insert(index, slot);
            stats.activated += 1;
        }
    }

    /// Return every active cell in `bucket` to its atlas and free its slots.
    pub fn evict_bucket(&mut self, bucket: GridCoord, cells: &mut [Cell], draw_calls: &mut DrawCalls) -> u32 {
        let Some(entries) = self.active_by_bucket.remove(&bucket) else { return 0 };
        let mut evicted = 0;
        for ActiveSlot { cell, slot } in entries {
            if self.active_by_cell.remove(&cell).is_none() {
                continue;
            }
            if let Some(record) = cells.get_mut(cell as usize) {
                record.deactivate(&self.atlas, draw_calls);
            }
            self.slots.release(slot);
            self.exhausted = false;
            evicted += 1;
        }
        evicted
    }

    /// Evict every active cell.
    pub fn evict_all(&mut self, cells: &mut [Cell], draw_calls: &mut DrawCalls) -> u32 {
        let buckets: Vec<GridCoord> = self.active_by_bucket.keys().copied().collect();
        buckets.into_iter().map(|b| self.evict_bucket(b, cells, draw_calls)).sum()
    }

    /// Evict everything and forget all streaming state. Results of fetches
    /// already in flight will be cached but not activated.
    pub fn clear(&mut self, cells: &mut [Cell], draw_calls: &mut DrawCalls) {
        let evicted = self.evict_all(cells, draw_calls);
        self.cam_grid_pos = None;
        self.radius = self.config.radius_floor.max(1);
        self.neighbors_requested = 0;
        self.fetch_queue.clear();
        self.to_activate.clear();
        self.queued.clear();
        self.in_flight.clear();
        self.generation += 1;
        log::debug!("LOD cache cleared ({} evicted), generation {}", evicted, self.generation);
    }

    /// Full clear followed by a grid rebuild from the committed positions.
    pub fn reset_for_layout(&mut self, cells: &mut [Cell], draw_calls: &mut DrawCalls) {
        self.clear(cells, draw_calls);
        self.rebuild_grid(cells);
    }

    pub fn active_count(&self) -> usize {
        self.active_by_cell.len()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.total()
    }

    pub fn free_slots(&self) -> usize {
        self.slots.available()
    }

    pub fn is_active(&self, cell: u32) -> bool {
        self.active_by_cell.contains_key(&cell)
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn camera_bucket(&self) -> Option<GridCoord> {
        self.cam_grid_pos
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pending_activations(&self) -> usize {
        self.to_activate.len()
    }

    pub fn queued_fetches(&self) -> usize {
        self.fetch_queue.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn cached_images(&self) -> usize {
        self.images.len()
    }

    /// Decoded bytes held by the image cache
    pub fn cached_bytes(&self) -> usize {
        self.images.bytes_used()
    }

    /// Image cache usage relative to its budget
    pub fn cache_pressure(&self) -> f32 {
        self.images.pressure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::location::test_config;
    use crate::cell::model::CellTexture;
    use crate::core::error::Error;
    use crate::core::types::Vec3;
    use crate::render::renderer::HeadlessRenderer;
    use image::RgbaImage;

    /// Answers every request on the next poll.
    #[derive(Default)]
    struct InstantFetcher {
        requests: Vec<u32>,
        ready: Vec<ThumbnailResult>,
        failing: HashSet<u32>,
        hold: bool,
    }

    impl ThumbnailFetcher for InstantFetcher {
        fn request(&mut self, cell: u32, _name: &str, generation: u64) {
            self.requests.push(cell);
            let image = if self.failing.contains(&cell) {
                Err(Error::Fetch { url: format!("thumbs/{}.jpg", cell), reason: "404".into() })
            } else {
                Ok(RgbaImage::new(4, 3))
            };
            self.ready.push(ThumbnailResult { cell, generation, image });
        }

        fn poll(&mut self) -> Vec<ThumbnailResult> {
            if self.hold {
                return Vec::new();
            }
            std::mem::take(&mut self.ready)
        }
    }

    struct Fixture {
        cells: Vec<Cell>,
        draw_calls: DrawCalls,
        renderer: HeadlessRenderer,
        lod: LodCache,
        fetcher: InstantFetcher,
    }

    impl Fixture {
        /// Cells at the given planar points plus anchors at (0, 100) and
        /// (100, 0), so with 100 buckets per axis a point at (x.5, y.5) lands
        /// in bucket (x, y).
        fn new(points: &[(f32, f32)], config: LodConfig) -> Self {
            let mut anchored = points.to_vec();
            anchored.extend([(0.0, 100.0), (100.0, 0.0)]);
            Self::bare(&anchored, config)
        }

        /// Cells at exactly the given points.
        fn bare(points: &[(f32, f32)], config: LodConfig) -> Self {
            // 8px LOD texture of 4px slots: 4 slots
            let atlas = test_config(2, 2, 64);
            let mut cells: Vec<Cell> = points
                .iter()
                .enumerate()
                .map(|(i, &(x, y))| {
                    let mut cell = Cell::new(i as u32, format!("{}.jpg", i), 2, 2, &atlas);
                    cell.position = Vec3::new(x, y, 0.0);
                    cell
                })
                .collect();
            let draw_calls = DrawCalls::partition_for_render(&cells, &atlas);
            let mut lod = LodCache::new(config, atlas, 1 << 20);
            lod.rebuild_grid(&mut cells);
            Self { cells, draw_calls, renderer: HeadlessRenderer::default(), lod, fetcher: InstantFetcher::default() }
        }

        fn tick(&mut self, camera: Vec3) -> LodFrameStats {
            let scene = LodScene {
                cells: &mut self.cells,
                draw_calls: &mut self.draw_calls,
                renderer: &mut self.renderer,
            };
            self.lod.update(camera.truncate(), camera.z, scene, &mut self.fetcher)
        }

        fn run(&mut self, camera: Vec3, frames: usize) -> LodFrameStats {
            let mut total = LodFrameStats::default();
            for _ in 0..frames {
                let stats = self.tick(camera);
                total.fetches_started += stats.fetches_started;
                total.activated += stats.activated;
                total.evicted += stats.evicted;
                total.dropped += stats.dropped;
                assert!(self.lod.active_count() <= self.lod.slot_count());
            }
            total
        }
    }

    fn eager() -> LodConfig {
        LodConfig { activation_interval: 1, radius_max: 1, ..Default::default() }
    }

    fn at(x: f32, y: f32) -> Vec3 {
        Vec3::new(x, y, 10.0)
    }

    #[test]
    fn test_activates_cells_near_camera() {
        let mut fx = Fixture::new(&[(0.5, 0.5), (0.6, 0.6)], eager());
        let stats = fx.run(at(0.5, 0.5), 10);

        assert_eq!(stats.activated, 2);
        assert!(fx.cells[0].is_lod_active());
        assert!(fx.cells[1].is_lod_active());
        assert_eq!(fx.renderer.lod_copies(), 2);
        assert_eq!(fx.cells[0].source_size(), [4, 3]);
        // The anchors are far away and never fetched
        assert!(!fx.fetcher.requests.contains(&2));
        assert!(!fx.fetcher.requests.contains(&3));
    }

    #[test]
    fn test_one_fetch_per_frame() {
        let mut fx = Fixture::new(&[(0.5, 0.5), (0.5, 0.6), (0.6, 0.5)], eager());
        fx.fetcher.hold = true;
        let stats = fx.tick(at(0.5, 0.5));
        assert_eq!(stats.fetches_started, 1);
        let stats = fx.tick(at(0.5, 0.5));
        assert_eq!(stats.fetches_started, 1);
        assert_eq!(fx.lod.in_flight(), 2);
    }

    #[test]
    fn test_bucket_change_evicts_outside_radius() {
        // Buckets (0,0), (1,0) and (3,0)
        let mut fx = Fixture::new(&[(0.5, 0.5), (1.5, 0.5), (3.5, 0.5)], eager());
        fx.run(at(2.5, 0.5), 20);
        assert!(fx.lod.is_active(1));
        assert!(fx.lod.is_active(2));

        let before = fx.cells[2].location(&test_config(2, 2, 64));
        let stats = fx.tick(at(0.5, 0.5));
        assert_eq!(fx.lod.camera_bucket(), Some(GridCoord::new(0, 0)));
        assert_eq!(fx.lod.radius(), 1);
        assert!(stats.evicted >= 1);
        assert!(!fx.lod.is_active(2));
        assert!(fx.lod.is_active(1));
        assert_eq!(
            fx.cells[2].texture,
            CellTexture::Atlased { texture_index: before.texture_index, offset: before.offset }
        );
    }

    #[test]
    fn test_slot_exhaustion_defers_activation() {
        let points: Vec<(f32, f32)> = (0..5).map(|i| (0.1 + i as f32 * 0.1, 0.5)).collect();
        let mut fx = Fixture::new(&points, eager());
        fx.run(at(0.5, 0.5), 20);

        assert_eq!(fx.lod.slot_count(), 4);
        assert_eq!(fx.lod.active_count(), 4);
        assert_eq!(fx.lod.free_slots(), 0);
        assert_eq!(fx.lod.pending_activations(), 1);
    }

    #[test]
    fn test_freed_slot_serves_deferred_cell() {
        let mut points: Vec<(f32, f32)> = (0..4).map(|i| (0.1 + i as f32 * 0.1, 0.5)).collect();
        points.push((0.5, 1.5));
        let mut fx = Fixture::new(&points, eager());
        // Camera on (0,1): both rows are in the neighborhood
        fx.run(at(0.5, 1.5), 20);
        assert_eq!(fx.lod.active_count(), 4);

        // Moving far up the y axis evicts everything, then coming back
        // reactivates from the image cache without refetching
        let requests = fx.fetcher.requests.len();
        fx.run(at(0.5, 50.5), 1);
        assert_eq!(fx.lod.active_count(), 0);
        fx.run(at(0.5, 1.5), 20);
        assert_eq!(fx.lod.active_count(), 4);
        assert_eq!(fx.fetcher.requests.len(), requests);
    }

    #[test]
    fn test_far_camera_evicts_everything() {
        let mut fx = Fixture::new(&[(0.5, 0.5), (0.6, 0.6)], eager());
        fx.run(at(0.5, 0.5), 10);
        assert_eq!(fx.lod.active_count(), 2);

        let stats = fx.tick(Vec3::new(0.5, 0.5, 10_000.0));
        assert_eq!(stats.evicted, 2);
        assert_eq!(fx.lod.active_count(), 0);
        assert_eq!(fx.lod.camera_bucket(), None);
        assert!(!fx.cells[0].is_lod_active());

        // Nothing further happens while out of range
        let stats = fx.run(Vec3::new(0.5, 0.5, 10_000.0), 5);
        assert_eq!(stats, LodFrameStats::default());
    }

    #[test]
    fn test_far_camera_resets_radius() {
        let mut fx = Fixture::new(&[(0.5, 0.5)], LodConfig { radius_max: 4, ..eager() });
        fx.run(at(0.5, 0.5), 30);
        assert_eq!(fx.lod.radius(), 4);

        fx.tick(Vec3::new(0.5, 0.5, 10_000.0));
        assert_eq!(fx.lod.radius(), 1);

        // Back in range the neighborhood starts small again
        fx.tick(at(0.5, 0.5));
        assert_eq!(fx.lod.radius(), 1);
        assert!(fx.lod.in_radius(GridCoord::new(1, 1)));
        assert!(!fx.lod.in_radius(GridCoord::new(3, 0)));
    }

    #[test]
    fn test_single_cell_dataset_activates() {
        let mut fx = Fixture::bare(&[(3.0, 3.0)], LodConfig { activation_interval: 1, ..Default::default() });
        // Collapsed axes get one-unit buckets, so the camera is three out
        let stats = fx.run(at(0.5, 0.5), 40);
        assert_eq!(fx.lod.camera_bucket(), Some(GridCoord::new(-3, -3)));
        assert_eq!(stats.activated, 1);
        assert!(fx.cells[0].is_lod_active());
    }

    #[test]
    fn test_camera_far_off_tiny_grid() {
        // x spans a hundred-thousandth of a unit, y is collapsed
        let mut fx = Fixture::bare(&[(3.0, 3.0), (3.00001, 3.0)], LodConfig { activation_interval: 1, ..Default::default() });
        let stats = fx.run(at(-50_000.0, 3.0), 100);
        assert_eq!(stats.activated, 0);
        // Pulled in to one bucket beyond the widest window (45 buckets)
        assert_eq!(fx.lod.camera_bucket(), Some(GridCoord::new(-46, 0)));

        let stats = fx.run(at(3.0, 3.0), 40);
        assert_eq!(stats.activated, 1);
        assert!(fx.cells[0].is_lod_active());
    }

    #[test]
    fn test_stale_generation_is_cached_not_activated() {
        let mut fx = Fixture::new(&[(0.5, 0.5)], eager());
        fx.fetcher.hold = true;
        fx.tick(at(0.5, 0.5));
        assert_eq!(fx.fetcher.requests, vec![0]);

        fx.lod.clear(&mut fx.cells, &mut fx.draw_calls);
        fx.fetcher.hold = false;
        // Camera gone: the late result must not activate
        fx.tick(Vec3::new(0.5, 0.5, 10_000.0));
        assert_eq!(fx.lod.cached_images(), 1);
        assert_eq!(fx.lod.active_count(), 0);
        assert_eq!(fx.lod.pending_activations(), 0);
    }

    #[test]
    fn test_failed_fetch_not_retried() {
        let mut fx = Fixture::new(&[(0.5, 0.5), (0.6, 0.6)], LodConfig { radius_max: 3, ..eager() });
        fx.fetcher.failing.insert(0);
        fx.run(at(0.5, 0.5), 30);

        assert_eq!(fx.fetcher.requests.iter().filter(|&&c| c == 0).count(), 1);
        assert!(!fx.cells[0].is_lod_active());
        assert!(fx.cells[1].is_lod_active());
    }

    #[test]
    fn test_radius_grows_to_cap_and_shrinks() {
        let mut fx = Fixture::new(&[(0.5, 0.5)], LodConfig { radius_max: 4, ..eager() });
        fx.run(at(0.5, 0.5), 30);
        assert_eq!(fx.lod.radius(), 4);

        fx.tick(at(1.5, 0.5));
        // ceil(4 * 0.6)
        assert_eq!(fx.lod.radius(), 3);
    }

    #[test]
    fn test_activation_interval() {
        let config = LodConfig { activation_interval: 4, ..eager() };
        let mut fx = Fixture::new(&[(0.5, 0.5)], config);
        let stats = fx.run(at(0.5, 0.5), 3);
        assert_eq!(stats.activated, 0);
        let stats = fx.run(at(0.5, 0.5), 1);
        assert_eq!(stats.activated, 1);
    }

    #[test]
    fn test_reset_for_layout_rebuilds_grid() {
        let mut fx = Fixture::new(&[(0.5, 0.5)], eager());
        fx.run(at(0.5, 0.5), 5);
        let generation = fx.lod.generation();

        fx.cells[0].position = Vec3::new(60.5, 60.5, 0.0);
        fx.lod.reset_for_layout(&mut fx.cells, &mut fx.draw_calls);
        assert_eq!(fx.lod.active_count(), 0);
        assert_eq!(fx.lod.generation(), generation + 1);
        assert_eq!(fx.cells[0].grid, GridCoord::new(60, 60));
    }
}

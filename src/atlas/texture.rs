//! Texture canvases assembled from atlases

use std::ops::Range;

use image::RgbaImage;
use image::imageops;

use crate::atlas::config::AtlasConfig;
use crate::atlas::loader::AtlasEvent;
use crate::cell::location::atlas_offset;
use crate::render::renderer::{Renderer, TextureTarget};

/// Load state of one atlas file
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Atlas {
    pub index: u32,
    /// Download progress, 0 to 100
    pub progress: f32,
    pub loaded: bool,
    pub failed: bool,
}

/// One GPU texture holding a contiguous run of atlases.
#[derive(Debug)]
pub struct Texture {
    pub index: u32,
    /// Global indices of the atlases this texture holds
    pub atlases: Range<u32>,
    loaded_count: u32,
    canvas: Option<RgbaImage>,
    complete: bool,
}

impl Texture {
    fn new(index: u32, atlases: Range<u32>) -> Self {
        Self { index, atlases, loaded_count: 0, canvas: None, complete: false }
    }

    pub fn atlas_count(&self) -> u32 {
        self.atlases.end - self.atlases.start
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Canvas size: full width, and only the atlas rows this texture needs.
    pub fn canvas_size(&self, config: &AtlasConfig) -> (u32, u32) {
        let per_row = config.atlases_per_row().max(1);
        let rows = self.atlas_count().div_ceil(per_row);
        (config.texture_px, (rows * config.atlas_px).min(config.texture_px))
    }

    /// Draw a loaded atlas into the canvas.
    ///
    /// # Returns
    /// The finished canvas the first time every atlas has been drawn,
    /// `None` otherwise.
    fn draw(&mut self, atlas: u32, image: &RgbaImage, config: &AtlasConfig) -> Option<RgbaImage> {
        let (width, height) = self.canvas_size(config);
        let canvas = self.canvas.get_or_insert_with(|| RgbaImage::new(width, height));
        let [x, y] = atlas_offset(atlas - self.atlases.start, config);
        imageops::replace(canvas, image, i64::from(x), i64::from(y));

        self.loaded_count += 1;
        if self.loaded_count == self.atlas_count() && !self.complete {
            self.complete = true;
            return self.canvas.take();
        }
        None
    }
}

/// Every atlas and texture of a dataset
#[derive(Debug)]
pub struct TextureSet {
    config: AtlasConfig,
    atlases: Vec<Atlas>,
    textures: Vec<Texture>,
}

impl TextureSet {
    pub fn new(atlas_count: usize, config: &AtlasConfig) -> Self {
        let atlases: Vec<Atlas> = (0..atlas_count as u32).map(|index| Atlas { index, ..Default::default() }).collect();
        let per_texture = config.atlases_per_texture.max(1);
        let textures = (0..config.texture_count(atlas_count) as u32)
            .map(|t| {
                let start = t * per_texture;
                let end = (start + per_texture).min(atlas_count as u32);
                Texture::new(t, start..end)
            })
            .collect();
        Self { config: *config, atlases, textures }
    }

    pub fn atlases(&self) -> &[Atlas] {
        &self.atlases
    }

    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    fn texture_of(&self, atlas: u32) -> usize {
        (atlas / self.config.atlases_per_texture.max(1)) as usize
    }

    pub fn on_atlas_progress(&mut self, atlas: u32, percent: f32) {
        if let Some(a) = self.atlases.get_mut(atlas as usize) {
            if !a.loaded {
                a.progress = percent.clamp(0.0, 100.0);
            }
        }
    }

    /// Record a loaded atlas and draw it into its texture.
    ///
    /// # Returns
    /// `(texture_index, canvas)` the first time the owning texture has all of
    /// its atlases. Repeated loads of the same atlas are ignored.
    pub fn on_atlas_loaded(&mut self, atlas: u32, image: &RgbaImage) -> Option<(u32, RgbaImage)> {
        let texture = self.texture_of(atlas);
        let entry = self.atlases.get_mut(atlas as usize)?;
        if entry.loaded {
            log::debug!("Atlas {} loaded twice; ignored", atlas);
            return None;
        }
        entry.loaded = true;
        entry.failed = false;
        entry.progress = 100.0;

        let canvas = self.textures.get_mut(texture)?.draw(atlas, image, &self.config)?;
        log::info!("Texture {} complete", texture);
        Some((texture as u32, canvas))
    }

    pub fn on_atlas_failed(&mut self, atlas: u32) {
        if let Some(a) = self.atlases.get_mut(atlas as usize) {
            a.failed = true;
        }
    }

    /// Mean progress of a texture's atlases, 0 to 100
    pub fn texture_progress(&self, texture: u32) -> f32 {
        let Some(t) = self.textures.get(texture as usize) else { return 0.0 };
        if t.atlas_count() == 0 {
            return 100.0;
        }
        let sum: f32 = self.atlases[t.atlases.start as usize..t.atlases.end as usize]
            .iter()
            .map(|a| a.progress)
            .sum();
        sum / t.atlas_count() as f32
    }

    /// Mean progress over all textures, 0 to 100
    pub fn global_progress(&self) -> f32 {
        if self.textures.is_empty() {
            return 100.0;
        }
        let sum: f32 = (0..self.textures.len() as u32).map(|t| self.texture_progress(t)).sum();
        sum / self.textures.len() as f32
    }

    pub fn is_complete(&self) -> bool {
        self.textures.iter().all(Texture::is_complete)
    }

    pub fn failed_atlases(&self) -> usize {
        self.atlases.iter().filter(|a| a.failed).count()
    }

    /// Apply loader events, uploading textures as they complete.
    ///
    /// # Returns
    /// Indices of the textures completed by these events
    pub fn apply_events(&mut self, events: Vec<AtlasEvent>, renderer: &mut dyn Renderer) -> Vec<u32> {
        let mut completed = Vec::new();
        for event in events {
            match event {
                AtlasEvent::Progress { atlas, percent } => self.on_atlas_progress(atlas, percent),
                AtlasEvent::Loaded { atlas, image } => {
                    if let Some((texture, canvas)) = self.on_atlas_loaded(atlas, &image) {
                        renderer.upload_texture(TextureTarget::Base(texture), &canvas);
                        completed.push(texture);
                    }
                }
                AtlasEvent::Failed { atlas, error } => {
                    log::warn!("Atlas {} failed to load: {}", atlas, error);
                    self.on_atlas_failed(atlas);
                }
            }
        }
        completed
    }
}

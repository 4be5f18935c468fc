//! Top-level session: one dataset, one renderer, ticked once per frame
//!
//! Frame order: atlas events, layout transition, LOD streaming (only while
//! no transition runs), then upload of every dirty attribute buffer.

pub mod config;

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::atlas::config::AtlasConfig;
use crate::atlas::loader::AtlasLoader;
use crate::atlas::texture::TextureSet;
use crate::cell::manifest::Manifest;
use crate::cell::model::{Cell, cell_for_color};
use crate::cell::build_cells;
use crate::core::camera::Camera;
use crate::core::error::Error;
use crate::layout::positions::LayoutPositions;
use crate::layout::transition::{LayoutTransition, TransitionStatus};
use crate::render::buffer::{Attribute, DrawCalls};
use crate::render::caps::Capabilities;
use crate::render::renderer::{Renderer, TextureTarget};
use crate::streaming::lod::{LodCache, LodFrameStats, LodScene};
use crate::streaming::source::ResourceSource;
use crate::streaming::thumbs::ThumbnailLoader;

pub use config::ViewerSettings;

/// What one tick did
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameStats {
    pub atlas_events: usize,
    pub textures_completed: usize,
    pub transition: TransitionStatus,
    pub lod: LodFrameStats,
    pub buffers_uploaded: usize,
}

/// A loaded dataset and its streaming state
pub struct Viewer<S: ResourceSource> {
    settings: ViewerSettings,
    source: Arc<S>,
    caps: Capabilities,
    config: AtlasConfig,
    manifest: Manifest,
    layout: String,
    cells: Vec<Cell>,
    draw_calls: DrawCalls,
    textures: TextureSet,
    atlas_loader: AtlasLoader,
    thumbs: ThumbnailLoader,
    lod: LodCache,
    transition: LayoutTransition,
    attached: bool,
}

impl<S: ResourceSource> Viewer<S> {
    /// Fetch the manifest and initial layout and build every cell.
    ///
    /// Must be called from inside a tokio runtime; loaders are spawned on it.
    /// Nothing is fetched in the background until [`Viewer::attach`].
    pub async fn load(settings: ViewerSettings, source: Arc<S>, caps: Capabilities) -> Result<Self, Error> {
        settings.validate()?;
        let runtime = Handle::try_current()
            .map_err(|e| Error::Config(format!("viewer needs a tokio runtime: {}", e)))?;

        let manifest = Manifest::from_bytes(&source.fetch_bytes(&settings.manifest_file).await?)?;
        let config = AtlasConfig::derive(&caps, &settings.atlas_sizes(&manifest))?;
        log::info!(
            "Atlas config: {}px textures, {} atlases/texture, {} cells/draw call, {} LOD slots",
            config.texture_px,
            config.atlases_per_texture,
            config.max_cells_per_draw_call,
            config.lod_slot_count()
        );
        let mut cells = build_cells(&manifest, &config)?;

        let layout = match &settings.default_layout {
            Some(name) => name.clone(),
            None => manifest
                .layouts
                .keys()
                .next()
                .cloned()
                .ok_or_else(|| Error::Manifest("manifest declares no layouts".into()))?,
        };
        let path = manifest.layout_path(&layout, settings.jittered)?;
        let positions = LayoutPositions::from_bytes(&source.fetch_bytes(path).await?, settings.world_scale)?;
        positions.check_count(cells.len())?;
        for (cell, &p) in cells.iter_mut().zip(positions.as_slice()) {
            cell.position = p;
            cell.target = p;
        }

        let draw_calls = DrawCalls::partition_for_render(&cells, &config);
        let textures = TextureSet::new(manifest.atlas.count, &config);
        let mut lod = LodCache::new(settings.lod.clone(), config, settings.image_cache_bytes);
        lod.rebuild_grid(&mut cells);

        let atlas_loader = AtlasLoader::new(&runtime, source.clone(), settings.atlas_paths(), settings.max_concurrent_fetches);
        let thumbs = ThumbnailLoader::new(
            &runtime,
            source.clone(),
            settings.thumbs_dir.clone(),
            config.lod_cell_px,
            settings.max_concurrent_fetches,
        );
        let transition = LayoutTransition::new(settings.transition_secs);

        Ok(Self {
            settings,
            source,
            caps,
            config,
            manifest,
            layout,
            cells,
            draw_calls,
            textures,
            atlas_loader,
            thumbs,
            lod,
            transition,
            attached: false,
        })
    }

    /// Hand draw calls and the LOD texture to `renderer` and start loading
    /// atlases. Later calls do nothing.
    pub fn attach(&mut self, renderer: &mut dyn Renderer) {
        if self.attached {
            return;
        }
        self.draw_calls.register(renderer);
        let lod_px = self.config.lod_texture_px;
        renderer.allocate_texture(TextureTarget::Lod, lod_px, lod_px);
        self.atlas_loader.request_all(self.manifest.atlas.count);
        self.attached = true;
    }

    /// Advance one frame.
    pub fn tick(&mut self, camera: &Camera, dt: f32, renderer: &mut dyn Renderer) -> FrameStats {
        let events = self.atlas_loader.poll_events();
        let atlas_events = events.len();
        let textures_completed = self.textures.apply_events(events, renderer).len();

        let transition = self.transition.update(dt, &mut self.cells, &mut self.draw_calls, &mut self.lod, renderer);
        let lod = if transition == TransitionStatus::Idle {
            let scene = LodScene {
                cells: &mut self.cells,
                draw_calls: &mut self.draw_calls,
                renderer: &mut *renderer,
            };
            self.lod.update(camera.ground_position(), camera.depth(), scene, &mut self.thumbs)
        } else {
            LodFrameStats::default()
        };

        let buffers_uploaded = self.draw_calls.flush(renderer);
        FrameStats { atlas_events, textures_completed, transition, lod, buffers_uploaded }
    }

    /// Fetch the positions of a named layout.
    pub async fn load_layout(&self, name: &str) -> Result<LayoutPositions, Error> {
        let path = self.manifest.layout_path(name, self.settings.jittered)?;
        let bytes = self.source.fetch_bytes(path).await?;
        let positions = LayoutPositions::from_bytes(&bytes, self.settings.world_scale)?;
        positions.check_count(self.cells.len())?;
        Ok(positions)
    }

    /// Start animating towards `positions`. Returns `Ok(false)` if a
    /// transition is already running.
    pub fn transition_to(&mut self, name: &str, positions: &LayoutPositions) -> Result<bool, Error> {
        let started = self.transition.start(positions, &mut self.cells, &mut self.draw_calls)?;
        if started {
            self.layout = name.to_string();
        }
        Ok(started)
    }

    pub fn set_selected(&mut self, index: u32, selected: bool) -> bool {
        self.update_cell(index, Attribute::Selected, |cell| cell.selected = selected)
    }

    pub fn set_cluster_selected(&mut self, index: u32, selected: bool) -> bool {
        self.update_cell(index, Attribute::ClusterSelected, |cell| cell.cluster_selected = selected)
    }

    pub fn set_opacity(&mut self, index: u32, opacity: f32) -> bool {
        self.update_cell(index, Attribute::Opacity, |cell| cell.opacity = opacity.clamp(0.0, 1.0))
    }

    /// Deselect every cell, touching only the ones that were selected.
    pub fn clear_selection(&mut self) {
        for cell in self.cells.iter_mut() {
            if cell.selected {
                cell.selected = false;
                self.draw_calls.set_cell_buffer(cell, Attribute::Selected);
            }
            if cell.cluster_selected {
                cell.cluster_selected = false;
                self.draw_calls.set_cell_buffer(cell, Attribute::ClusterSelected);
            }
        }
    }

    fn update_cell(&mut self, index: u32, attribute: Attribute, apply: impl FnOnce(&mut Cell)) -> bool {
        let Some(cell) = self.cells.get_mut(index as usize) else {
            log::warn!("No cell {} to update", index);
            return false;
        };
        apply(cell);
        self.draw_calls.set_cell_buffer(cell, attribute);
        true
    }

    /// Cell under a pixel read back from the picking pass
    pub fn cell_at_color(&self, color: [u8; 4]) -> Option<&Cell> {
        self.cells.get(cell_for_color(color)? as usize)
    }

    /// Atlas loading progress, 0 to 100
    pub fn progress(&self) -> f32 {
        self.textures.global_progress()
    }

    pub fn settings(&self) -> &ViewerSettings {
        &self.settings
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn atlas_config(&self) -> &AtlasConfig {
        &self.config
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Name of the current (or transitioning-to) layout
    pub fn layout(&self) -> &str {
        &self.layout
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn draw_calls(&self) -> &DrawCalls {
        &self.draw_calls
    }

    pub fn textures(&self) -> &TextureSet {
        &self.textures
    }

    pub fn lod(&self) -> &LodCache {
        &self.lod
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_running()
    }
}

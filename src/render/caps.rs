//! Graphics capability probe
//!
//! Everything downstream (atlas packing, texture sizes, draw-call capacity)
//! sizes itself against the limits collected here, once per process.

use crate::core::error::Error;

/// Default cap applied to the reported maximum texture edge.
pub const DEFAULT_TEXTURE_SIZE_CAP: u32 = 8192;

/// Vertex count addressable with 16-bit indices.
pub const MAX_U16_INDEXED_VERTICES: u32 = 1 << 16;

/// Hard limits of the graphics context
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Maximum square texture edge in pixels (capped)
    pub texture_size: u32,
    /// Maximum samplers bindable per draw call
    pub texture_unit_count: u32,
    /// Maximum vertices safely addressable in one draw call
    pub max_indexed_vertices: u32,
}

impl Capabilities {
    /// Derive capabilities from adapter limits.
    ///
    /// Pure function of its inputs so it can be exercised without a GPU.
    pub fn from_limits(limits: &wgpu::Limits, downlevel: wgpu::DownlevelFlags, texture_size_cap: u32) -> Self {
        let max_indexed_vertices = if downlevel.contains(wgpu::DownlevelFlags::FULL_DRAW_INDEX_UINT32) {
            u32::MAX
        } else {
            MAX_U16_INDEXED_VERTICES
        };
        Self {
            texture_size: limits.max_texture_dimension_2d.min(texture_size_cap),
            texture_unit_count: limits.max_sampled_textures_per_shader_stage,
            max_indexed_vertices,
        }
    }

    /// Limits every WebGL2-class context is guaranteed to offer.
    pub fn webgl2_baseline() -> Self {
        Self::from_limits(
            &wgpu::Limits::downlevel_webgl2_defaults(),
            wgpu::DownlevelFlags::empty(),
            DEFAULT_TEXTURE_SIZE_CAP,
        )
    }

    /// Query the default adapter, blocking until it answers.
    pub fn probe(texture_size_cap: u32) -> Result<Self, Error> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| Error::Gpu(format!("No suitable adapter found: {:?}", e)))?;

        let info = adapter.get_info();
        let caps = Self::from_limits(
            &adapter.limits(),
            adapter.get_downlevel_capabilities().flags,
            texture_size_cap,
        );
        log::info!(
            "Adapter {} ({:?}): texture_size={} texture_units={} max_indexed_vertices={}",
            info.name, info.backend, caps.texture_size, caps.texture_unit_count, caps.max_indexed_vertices
        );
        Ok(caps)
    }

    /// Probe the adapter, falling back to the WebGL2 baseline when none exists.
    pub fn probe_or_baseline(texture_size_cap: u32) -> Self {
        match Self::probe(texture_size_cap) {
            Ok(caps) => caps,
            Err(e) => {
                log::warn!("{}; using WebGL2 baseline limits", e);
                let mut caps = Self::webgl2_baseline();
                caps.texture_size = caps.texture_size.min(texture_size_cap);
                caps
            }
        }
    }

    /// Sampler units available to base-resolution textures in one draw call.
    /// One unit is reserved for the LOD texture.
    pub fn atlas_texture_units(&self) -> u32 {
        self.texture_unit_count.saturating_sub(1).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_size_capped() {
        let limits = wgpu::Limits {
            max_texture_dimension_2d: 16384,
            max_sampled_textures_per_shader_stage: 16,
            ..wgpu::Limits::downlevel_webgl2_defaults()
        };
        let caps = Capabilities::from_limits(&limits, wgpu::DownlevelFlags::empty(), 8192);
        assert_eq!(caps.texture_size, 8192);
        assert_eq!(caps.texture_unit_count, 16);
        assert_eq!(caps.atlas_texture_units(), 15);
    }

    #[test]
    fn test_index_width() {
        let limits = wgpu::Limits::downlevel_webgl2_defaults();
        let narrow = Capabilities::from_limits(&limits, wgpu::DownlevelFlags::empty(), 4096);
        assert_eq!(narrow.max_indexed_vertices, MAX_U16_INDEXED_VERTICES);

        let wide = Capabilities::from_limits(&limits, wgpu::DownlevelFlags::FULL_DRAW_INDEX_UINT32, 4096);
        assert_eq!(wide.max_indexed_vertices, u32::MAX);
    }

    #[test]
    fn test_single_unit_still_usable() {
        let caps = Capabilities { texture_size: 2048, texture_unit_count: 1, max_indexed_vertices: 1024 };
        assert_eq!(caps.atlas_texture_units(), 1);
    }
}

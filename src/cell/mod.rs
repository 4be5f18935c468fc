//! Cell data model
//!
//! One [`Cell`] per image in manifest order. Cells are created once and never
//! destroyed; layouts move them and the LOD cache switches their texture.

pub mod location;
pub mod manifest;
pub mod model;

use rayon::prelude::*;

use crate::atlas::config::AtlasConfig;
use crate::core::error::Error;

pub use location::{CellLocation, atlas_offset};
pub use manifest::{Manifest, maybe_gunzip};
pub use model::{Cell, CellTexture, MAX_PICKABLE_CELLS, SlotRect, cell_for_color, picking_color};

/// Build one cell per manifest image, in manifest order.
pub fn build_cells(manifest: &Manifest, config: &AtlasConfig) -> Result<Vec<Cell>, Error> {
    manifest.validate_packing(config)?;
    model::check_pickable(manifest.images.len())?;

    let sizes: Vec<[u32; 2]> = manifest.flat_cell_sizes().collect();
    let cells: Vec<Cell> = manifest
        .images
        .par_iter()
        .zip(sizes.par_iter())
        .enumerate()
        .map(|(i, (name, &[w, h]))| Cell::new(i as u32, name.clone(), w, h, config))
        .collect();

    log::info!(
        "Built {} cells over {} atlases, {} textures",
        cells.len(),
        config.atlas_count(cells.len()),
        config.texture_count(config.atlas_count(cells.len()))
    );
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::location::test_config;

    fn manifest(count: usize, per_atlas: usize) -> Manifest {
        let images: Vec<String> = (0..count).map(|i| format!("img-{}.jpg", i)).collect();
        let cell_sizes: Vec<Vec<[u32; 2]>> = (0..count)
            .collect::<Vec<_>>()
            .chunks(per_atlas)
            .map(|chunk| chunk.iter().map(|&i| [1 + (i % 2) as u32, 2]).collect())
            .collect();
        let json = serde_json::json!({
            "atlas": { "count": cell_sizes.len() },
            "cell_sizes": cell_sizes,
            "images": images,
        });
        Manifest::from_bytes(json.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn test_ten_images_four_per_atlas() {
        // 4 cells per atlas, 2 atlases per texture
        let mut config = test_config(2, 2, 1000);
        config.atlases_per_texture = 2;
        config.cells_per_texture = 8;

        let cells = build_cells(&manifest(10, 4), &config).unwrap();
        assert_eq!(cells.len(), 10);
        let atlases: Vec<u32> = cells.iter().map(|c| c.location(&config).atlas_index).collect();
        assert_eq!(atlases, vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2]);
        let textures: Vec<u32> = cells
            .iter()
            .map(|c| match c.texture {
                CellTexture::Atlased { texture_index, .. } => texture_index,
                CellTexture::LodActive { .. } => unreachable!(),
            })
            .collect();
        assert_eq!(textures, vec![0, 0, 0, 0, 0, 0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_names_and_sizes_follow_manifest_order() {
        let config = test_config(2, 2, 1000);
        let cells = build_cells(&manifest(6, 4), &config).unwrap();
        assert_eq!(cells[5].name, "img-5.jpg");
        assert_eq!(cells[5].index, 5);
        assert_eq!([cells[4].width, cells[4].height], [1, 2]);
        assert_eq!([cells[5].width, cells[5].height], [2, 2]);
    }

    #[test]
    fn test_partial_last_atlas_boundaries() {
        let config = test_config(2, 2, 1000);
        for count in [1, 3, 4, 5, 15, 16, 17] {
            let cells = build_cells(&manifest(count, 4), &config).unwrap();
            let last = cells.last().unwrap().location(&config);
            assert_eq!(last.atlas_index as usize, config.atlas_count(count) - 1, "{} cells", count);
            assert_eq!(
                last.texture_index as usize,
                config.texture_count(config.atlas_count(count)) - 1,
                "{} cells", count
            );
        }
    }

    #[test]
    fn test_rejects_mismatched_packing() {
        let config = test_config(2, 2, 1000);
        assert!(matches!(build_cells(&manifest(6, 3), &config), Err(Error::Manifest(_))));
    }
}

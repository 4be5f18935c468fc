//! Dataset inspector: opens a dataset headlessly and reports how it packs.
//!
//! Usage: cargo run --release --bin imagefield-inspect -- [OPTIONS]
//!
//! Options:
//!   --data <DIR|URL>      Dataset root (default: settings or "output/data")
//!   --settings <FILE>     Viewer settings JSON
//!   --frames <N>          Ticks to run against a recording renderer (default: 0)
//!   --camera <X,Y,Z>      Camera position for those ticks (default: 0,0,100)
//!   --baseline            Skip the GPU probe and assume WebGL2 limits

use std::sync::Arc;
use std::time::Duration;

use imagefield::core::camera::Camera;
use imagefield::core::error::Error;
use imagefield::core::logging;
use imagefield::core::types::Vec3;
use imagefield::render::{Capabilities, HeadlessRenderer};
use imagefield::streaming::{HttpSource, LocalSource, ResourceSource};
use imagefield::viewer::{Viewer, ViewerSettings};

fn main() {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = run(&args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<(), Error> {
    let mut settings = match parse_str_arg(args, "--settings") {
        Some(path) => ViewerSettings::from_json_file(path)?,
        None => ViewerSettings::default(),
    };
    if let Some(data) = parse_str_arg(args, "--data") {
        settings.data_dir = data;
    }
    let frames = parse_usize_arg(args, "--frames").unwrap_or(0);
    let camera_pos = parse_vec3_arg(args, "--camera").unwrap_or(Vec3::new(0.0, 0.0, 100.0));

    let caps = if args.iter().any(|a| a == "--baseline") {
        Capabilities::webgl2_baseline()
    } else {
        Capabilities::probe_or_baseline(settings.texture_size_cap)
    };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        if settings.is_remote() {
            let source = Arc::new(HttpSource::new(settings.data_dir.clone()));
            inspect(settings, source, caps, frames, camera_pos).await
        } else {
            let source = Arc::new(LocalSource::new(settings.data_dir.clone()));
            inspect(settings, source, caps, frames, camera_pos).await
        }
    })
}

async fn inspect<S: ResourceSource>(
    settings: ViewerSettings,
    source: Arc<S>,
    caps: Capabilities,
    frames: usize,
    camera_pos: Vec3,
) -> Result<(), Error> {
    println!("=== imagefield inspect ===");
    println!("Data:     {}", settings.data_dir);
    println!(
        "Device:   {}px textures, {} sampler units, {} indexed vertices",
        caps.texture_size, caps.texture_unit_count, caps.max_indexed_vertices
    );

    let mut viewer = Viewer::load(settings, source, caps).await?;
    let config = *viewer.atlas_config();
    let cells = viewer.cells().len();
    let atlases = viewer.manifest().atlas.count;

    println!();
    println!("Cells:      {}", cells);
    println!("Cell px:    {} (LOD {})", config.cell_px, config.lod_cell_px);
    println!("Atlases:    {} of {}px, {} cells each", atlases, config.atlas_px, config.cells_per_atlas);
    println!(
        "Textures:   {} of {}px, {} atlases each",
        viewer.textures().textures().len(),
        config.texture_px,
        config.atlases_per_texture
    );
    println!("Draw calls: {} of up to {} cells", viewer.draw_calls().len(), config.max_cells_per_draw_call);
    println!("LOD slots:  {} in a {}px texture", config.lod_slot_count(), config.lod_texture_px);
    println!("Layouts:    {}", viewer.manifest().layouts.keys().cloned().collect::<Vec<_>>().join(", "));

    if frames == 0 {
        return Ok(());
    }

    let mut renderer = HeadlessRenderer::quiet();
    viewer.attach(&mut renderer);
    let camera = Camera::new(camera_pos);

    let mut activated = 0;
    let mut fetches = 0;
    for _ in 0..frames {
        let stats = viewer.tick(&camera, 1.0 / 60.0, &mut renderer);
        activated += stats.lod.activated;
        fetches += stats.lod.fetches_started;
        tokio::time::sleep(Duration::from_millis(16)).await;
    }

    println!();
    println!("After {} frames:", frames);
    println!("  Atlas progress: {:.1}%", viewer.progress());
    let lod = viewer.lod();
    println!("  LOD: {} active, {} activated, {} fetches", lod.active_count(), activated, fetches);
    println!("  Slots: {} of {} free", lod.free_slots(), lod.slot_count());
    println!(
        "  Image cache: {} images, {:.1} MB ({:.0}% of budget)",
        lod.cached_images(),
        lod.cached_bytes() as f64 / (1024.0 * 1024.0),
        lod.cache_pressure() * 100.0
    );
    println!("  Uploaded: {:.1} MB", renderer.uploaded_bytes as f64 / (1024.0 * 1024.0));
    Ok(())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn parse_vec3_arg(args: &[String], flag: &str) -> Option<Vec3> {
    let parts: Vec<f32> = parse_str_arg(args, flag)?
        .split(',')
        .map(|s| s.trim().parse().ok())
        .collect::<Option<_>>()?;
    match parts[..] {
        [x, y, z] => Some(Vec3::new(x, y, z)),
        _ => None,
    }
}

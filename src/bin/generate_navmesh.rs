//! Navmesh generator binary: bakes the occlusion navmesh of a scene to disk.
//!
//! Usage: cargo run --release --bin generate_navmesh -- --scene <FILE> [OPTIONS]
//!
//! Options:
//!   --scene <FILE>    Scene JSON with the occluder boxes (required)
//!   --config <FILE>   Navmesh config JSON (default: built-in defaults)
//!   --out <DIR>       Output directory (default: "navmesh")
//!   --depth <N>       Static depth, overrides the config (1..=9)
//!   --jobs <N>        Rasterization threads (default: all cores)
//!
//! Scene format:
//!   { "occluders": [ { "min": [0, 0, 0], "max": [10, 4, 10], "preset": 2 } ] }
//!
//! Output structure:
//!   <out>/
//!     metadata.json           # Navmesh id + per-chunk file ids
//!     chunks/<a>/<b>/<c>.nvc  # One file per chunk, fanned out by chunk key

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Deserialize;

use navoctree::core::types::Vec3;
use navoctree::core::{Error, Result};
use navoctree::math::aabb::Aabb;
use navoctree::navmesh::{Navmesh, NavmeshConfig, NodeState};
use navoctree::rasterize::{BoxOracle, Generator, Occluder};
use navoctree::streaming::disk_io;

#[derive(Debug, Deserialize)]
struct Scene {
    occluders: Vec<SceneOccluder>,
}

#[derive(Debug, Deserialize)]
struct SceneOccluder {
    min: Vec3,
    max: Vec3,
    #[serde(default)]
    preset: u16,
    #[serde(default)]
    state: NodeState,
}

fn main() {
    navoctree::core::logging::init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let scene_path = parse_str_arg(&args, "--scene")
        .map(PathBuf::from)
        .ok_or_else(|| Error::Config("--scene <FILE> is required".to_string()))?;
    let output_dir = parse_str_arg(&args, "--out").map_or_else(|| PathBuf::from("navmesh"), PathBuf::from);

    let mut config = match parse_str_arg(&args, "--config") {
        Some(path) => NavmeshConfig::load_json(Path::new(&path))?,
        None => NavmeshConfig::default(),
    };
    if let Some(depth) = parse_u8_arg(&args, "--depth") {
        config.static_depth = depth;
    }
    config.validate()?;

    if let Some(jobs) = parse_usize_arg(&args, "--jobs") {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .map_err(|e| Error::Config(format!("Failed to configure thread pool: {}", e)))?;
    }

    let scene: Scene = serde_json::from_str(&std::fs::read_to_string(&scene_path)?)?;
    let occluders: Vec<Occluder> = scene
        .occluders
        .iter()
        .enumerate()
        .map(|(i, o)| {
            Occluder::new(i as u32, Aabb::new(o.min, o.max))
                .with_sound_preset(o.preset)
                .with_state(o.state)
        })
        .collect();

    println!("=== Navmesh Generator ===");
    println!("Scene:  {} ({} occluders)", scene_path.display(), occluders.len());
    println!("Depth:  {} ({} unit nodes)", config.static_depth, config.node_size(config.static_depth));
    println!("Jobs:   {} threads", rayon::current_num_threads());
    println!("Output: {}", output_dir.display());
    println!();

    let start = Instant::now();
    let oracle = BoxOracle::new(&occluders);
    let mut navmesh = Navmesh::new();
    let summary = Generator::new(&config, &oracle).generate(&mut navmesh, &occluders);
    let generated_in = start.elapsed();

    println!("Generated {} chunks, {} nodes in {:.1}s",
        navmesh.chunk_count(), navmesh.node_count(), generated_in.as_secs_f64());
    if !summary.skipped_chunks.is_empty() {
        println!("Skipped:  {} chunks", summary.skipped_chunks.len());
    }
    print_layers(&navmesh, NodeState::Static);
    print_layers(&navmesh, NodeState::Dynamic);

    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(disk_io::save_navmesh(&output_dir, &navmesh, &config))?;

    println!();
    println!("=== Generation Complete ===");
    println!("Navmesh: {}", report.navmesh_id);
    println!("Chunks:  {} written, {} removed, {} failed", report.written.len(), report.removed.len(), report.failed.len());
    for (key, reason) in &report.failed {
        println!("  chunk {:#x}: {}", key, reason);
    }
    println!("Total:   {:.1}s", start.elapsed().as_secs_f64());

    if report.is_complete() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!("{} chunks could not be saved", report.failed.len())).into())
    }
}

fn print_layers(navmesh: &Navmesh, state: NodeState) {
    let counts = navmesh.nodes_per_layer(state);
    if counts.iter().all(|&count| count == 0) {
        return;
    }
    println!("{:?} nodes per layer:", state);
    for (layer, count) in counts.iter().enumerate().filter(|(_, count)| **count > 0) {
        println!("  layer {}: {}", layer, count);
    }
}

fn parse_u8_arg(args: &[String], flag: &str) -> Option<u8> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
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

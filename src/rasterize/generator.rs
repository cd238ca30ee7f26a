//! Rasterizes occluder shapes into the navmesh.
//!
//! Every occluder is first cut into the chunks its rounded bounds overlap.
//! Chunks are then rasterized in parallel: each one is copied, edited and
//! swapped back into the navmesh only when every oracle query succeeded, so a
//! failing chunk keeps its previous contents.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use rayon::prelude::*;

use crate::core::types::{IVec3, Result};
use crate::math::aabb::Aabb;
use crate::math::bounds::{GlobalBounds, MortonBounds};
use crate::math::morton;
use crate::navmesh::chunk::Chunk;
use crate::navmesh::config::NavmeshConfig;
use crate::navmesh::mesh::Navmesh;
use crate::rasterize::layer::{child_location, node_center_half_extent, optimal_starting_layer, SkipMask};
use crate::rasterize::occluder::Occluder;
use crate::rasterize::oracle::CollisionOracle;
use crate::rasterize::resolver;

/// Outcome of a generation run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerationSummary {
    /// Occluders with a usable shape
    pub occluders: usize,
    /// Chunks that were rasterized and committed
    pub chunks: BTreeSet<u64>,
    /// Chunks left untouched because the oracle failed
    pub skipped_chunks: BTreeSet<u64>,
}

/// Part of one occluder that falls into one chunk
#[derive(Clone, Copy, Debug)]
struct ChunkJob<'o> {
    occluder: &'o Occluder,
    bounds: GlobalBounds,
    rounded: GlobalBounds,
    layer: u8,
    local: MortonBounds,
}

/// Builds the static (or dynamic) trees of chunks from occluder shapes.
pub struct Generator<'a> {
    config: &'a NavmeshConfig,
    oracle: &'a dyn CollisionOracle,
}

impl<'a> Generator<'a> {
    pub fn new(config: &'a NavmeshConfig, oracle: &'a dyn CollisionOracle) -> Self {
        Self { config, oracle }
    }

    /// Rasterize every occluder into `navmesh`, then resolve the relations of
    /// every chunk.
    pub fn generate(&self, navmesh: &mut Navmesh, occluders: &[Occluder]) -> GenerationSummary {
        let start = Instant::now();
        let summary = self.rasterize(navmesh, occluders);
        resolver::resolve_all(navmesh);

        log::info!(
            "Generated navmesh from {} occluders: {} chunks, {} nodes in {:.1}ms",
            summary.occluders,
            navmesh.chunk_count(),
            navmesh.node_count(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        if !summary.skipped_chunks.is_empty() {
            log::warn!("Skipped {} chunks the oracle could not answer for", summary.skipped_chunks.len());
        }
        summary
    }

    /// Rebuild only the chunks in `keys` from the full occluder set, then
    /// re-resolve the relations in and around them.
    ///
    /// Listed chunks are rasterized from scratch. A listed chunk no occluder
    /// reaches is dropped, and one the oracle fails on keeps its contents.
    pub fn regenerate_chunks(
        &self,
        navmesh: &mut Navmesh,
        keys: &BTreeSet<u64>,
        occluders: &[Occluder],
    ) -> GenerationSummary {
        let start = Instant::now();
        let mut summary = self.rasterize_chunks(navmesh, occluders, Some(keys));

        let mut touched = summary.chunks.clone();
        for &key in keys {
            if summary.chunks.contains(&key) || summary.skipped_chunks.contains(&key) {
                continue;
            }
            if navmesh.remove_chunk(key).is_some() {
                log::debug!("Chunk {:#x} holds no occluder any more, dropped", key);
            }
            touched.insert(key);
        }
        resolver::resolve_chunks(navmesh, &touched);
        summary.chunks.retain(|key| navmesh.contains_chunk(*key));

        log::info!(
            "Regenerated {} of {} chunks in {:.1}ms",
            summary.chunks.len(),
            keys.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        if !summary.skipped_chunks.is_empty() {
            log::warn!("Skipped {} chunks the oracle could not answer for", summary.skipped_chunks.len());
        }
        summary
    }

    /// Rasterize occluders without touching relations.
    pub fn rasterize(&self, navmesh: &mut Navmesh, occluders: &[Occluder]) -> GenerationSummary {
        self.rasterize_chunks(navmesh, occluders, None)
    }

    /// With `only`, chunks outside the set are left alone and the listed ones
    /// start empty instead of from their current contents.
    fn rasterize_chunks(
        &self,
        navmesh: &mut Navmesh,
        occluders: &[Occluder],
        only: Option<&BTreeSet<u64>>,
    ) -> GenerationSummary {
        let mut summary = GenerationSummary::default();

        // Phase 1: cut occluders into per-chunk jobs
        let mut jobs: BTreeMap<u64, Vec<ChunkJob<'_>>> = BTreeMap::new();
        for occluder in occluders {
            let bounds = occluder.world_bounds();
            if !bounds.has_volume() {
                log::debug!("Occluder {:?} has no usable bounds, skipping", occluder.id);
                continue;
            }
            summary.occluders += 1;

            let layer = optimal_starting_layer(bounds.largest_side(), self.config.static_depth);
            let rounded = bounds.round_to_layer(layer);
            rounded.for_each_chunk(|key, _, local| {
                if only.is_some_and(|keys| !keys.contains(&key)) {
                    return;
                }
                jobs.entry(key).or_default().push(ChunkJob {
                    occluder,
                    bounds,
                    rounded,
                    layer,
                    local,
                });
            });
        }

        // Phase 2: rasterize chunks in parallel on copies
        let results: Vec<(u64, Result<Chunk>)> = jobs
            .par_iter()
            .map(|(&key, chunk_jobs)| {
                let mut chunk = match only {
                    Some(_) => Chunk::new(key),
                    None => navmesh.chunk(key).cloned().unwrap_or_else(|| Chunk::new(key)),
                };
                let result = chunk_jobs
                    .iter()
                    .try_for_each(|job| self.rasterize_job(&mut chunk, job))
                    .map(|()| chunk);
                (key, result)
            })
            .collect();

        // Phase 3: swap finished chunks in
        for (key, result) in results {
            match result {
                Ok(chunk) => {
                    log::debug!("Rasterized chunk {:#x}: {} nodes", key, chunk.node_count());
                    navmesh.commit_chunk(chunk);
                    summary.chunks.insert(key);
                }
                Err(e) => {
                    log::warn!("Skipping chunk {:#x}: {}", key, e);
                    summary.skipped_chunks.insert(key);
                }
            }
        }
        summary
    }

    /// Rasterize the part of one occluder that lies in `chunk`.
    fn rasterize_job(&self, chunk: &mut Chunk, job: &ChunkJob<'_>) -> Result<()> {
        let mut voxels = Vec::new();
        job.local.for_each_node(job.layer, |code| voxels.push(code));

        for code in voxels {
            let location = chunk.origin() + morton::node_location(code);
            if !self.overlaps(job.occluder, location, job.layer)? {
                continue;
            }
            // Overlapping occluders keep the highest preset, whatever their order
            chunk.init_node_and_parents(code, job.layer, job.occluder.state, job.occluder.sound_preset_id);
            chunk.raise_sound_preset(code, job.layer, job.occluder.state, job.occluder.sound_preset_id);
            if job.layer < self.config.static_depth {
                let skip = SkipMask::for_voxel(&job.bounds, &job.rounded, location, job.layer);
                self.rasterize_children(chunk, job.occluder, code, location, job.layer, skip)?;
            }
        }
        Ok(())
    }

    /// Test the children of an occluding node and recurse into the ones that
    /// overlap, down to the static depth.
    fn rasterize_children(
        &self,
        chunk: &mut Chunk,
        occluder: &Occluder,
        code: u32,
        location: IVec3,
        layer: u8,
        skip: SkipMask,
    ) -> Result<()> {
        let child_layer = layer + 1;
        let child_size = self.config.node_size(child_layer);
        let skipped = skip.skipped_children(child_size);
        let state = occluder.state;

        for (index, child_code) in morton::children(code, child_layer).into_iter().enumerate() {
            let index = index as u8;
            if skipped >> index & 1 != 0 {
                continue;
            }
            let child_loc = child_location(location, child_layer, index);
            if !self.overlaps(occluder, child_loc, child_layer)? {
                continue;
            }

            let (child, _) = chunk.get_or_init_node(child_code, child_layer, state, occluder.sound_preset_id);
            child.sound_preset_id = child.sound_preset_id.max(occluder.sound_preset_id);
            if let Some(node) = chunk.get_node_mut(code, layer, state) {
                node.set_child(index, state);
            }

            if child_layer < self.config.static_depth {
                let child_skip = skip.child(index, child_size);
                self.rasterize_children(chunk, occluder, child_code, child_loc, child_layer, child_skip)?;
            }
        }
        Ok(())
    }

    fn overlaps(&self, occluder: &Occluder, location: IVec3, layer: u8) -> Result<bool> {
        let (center, half) = node_center_half_extent(location, layer);
        let exact = self.config.exact_contained_tests
            && occluder.bounds.contains(&Aabb::from_center_half_extent(center, half));
        self.oracle.overlaps_shape(occluder.id, center, half, exact)
    }
}

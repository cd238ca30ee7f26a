//! Incremental updates for occluders that moved, appeared or were removed.
//!
//! Only the regions an occluder left or now covers are revisited. Each voxel
//! there is checked against the whole scene again: nodes that stopped
//! overlapping are removed with their subtree, nodes that overlap are created
//! or refreshed down to the static depth. Parents left without children are
//! pruned up to the root, and an emptied chunk is dropped from the navmesh.
//! Sound presets of refreshed nodes and their ancestors are recomputed from
//! the oracle, so they match a fresh generation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::core::types::{IVec3, Result};
use crate::math::bounds::{GlobalBounds, MortonBounds};
use crate::math::morton;
use crate::navmesh::chunk::Chunk;
use crate::navmesh::config::NavmeshConfig;
use crate::navmesh::mesh::Navmesh;
use crate::navmesh::relations::NodeState;
use crate::rasterize::layer::{child_location, node_center_half_extent, starting_layer_for};
use crate::rasterize::occluder::OccluderId;
use crate::rasterize::oracle::CollisionOracle;
use crate::rasterize::resolver;
use crate::rasterize::staging::StagedChange;

/// Outcome of an update batch
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateSummary {
    /// Changes fully applied
    pub applied: usize,
    /// Chunks edited and committed, including the ones removed
    pub touched_chunks: BTreeSet<u64>,
    /// Chunks dropped because nothing is left in them
    pub removed_chunks: BTreeSet<u64>,
    /// Chunks left untouched because the oracle failed
    pub skipped_chunks: BTreeSet<u64>,
    /// Changes not applied because the batch was cancelled
    pub unprocessed: Vec<(OccluderId, StagedChange)>,
    /// Changes with at least one skipped chunk. Applying them again once the
    /// oracle answers finishes them.
    pub incomplete: Vec<(OccluderId, StagedChange)>,
}

impl UpdateSummary {
    pub fn cancelled(&self) -> bool {
        !self.unprocessed.is_empty()
    }

    /// Changes that have to be staged again, cancelled or incomplete
    pub fn to_restage(&self) -> impl Iterator<Item = &(OccluderId, StagedChange)> {
        self.unprocessed.iter().chain(&self.incomplete)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    Applied,
    /// Some chunks were skipped
    Incomplete,
    Cancelled,
}

/// Part of a changed region inside one chunk
#[derive(Clone, Copy, Debug)]
struct Region {
    local: MortonBounds,
    /// Nothing overlaps the region any more, so everything in it goes
    clear: bool,
}

/// Node tree being edited, with what every new node is created with
#[derive(Clone, Copy, Debug)]
struct Target {
    layer: u8,
    state: NodeState,
    sound_preset_id: u16,
}

/// Applies staged occluder changes to a navmesh.
pub struct Updater<'a> {
    config: &'a NavmeshConfig,
    oracle: &'a dyn CollisionOracle,
}

impl<'a> Updater<'a> {
    pub fn new(config: &'a NavmeshConfig, oracle: &'a dyn CollisionOracle) -> Self {
        Self { config, oracle }
    }

    /// Apply a batch of changes, then re-resolve the relations around every
    /// touched chunk.
    ///
    /// `cancel` is checked before each chunk. Changes that were not finished
    /// when it was raised are handed back in [`UpdateSummary::unprocessed`].
    pub fn run(
        &self,
        navmesh: &mut Navmesh,
        batch: Vec<(OccluderId, StagedChange)>,
        cancel: &AtomicBool,
    ) -> UpdateSummary {
        let start = Instant::now();
        let mut summary = UpdateSummary::default();
        let mut batch = batch.into_iter();

        while let Some((id, change)) = batch.next() {
            match self.apply_change(navmesh, &change, cancel, &mut summary) {
                Outcome::Applied => {
                    log::trace!("Applied change of occluder {:?}", id);
                    summary.applied += 1;
                }
                Outcome::Incomplete => {
                    log::debug!("Change of occluder {:?} left chunks behind", id);
                    summary.incomplete.push((id, change));
                }
                Outcome::Cancelled => {
                    log::info!("Update cancelled, re-staging {} changes", batch.len() + 1);
                    summary.unprocessed.push((id, change));
                    summary.unprocessed.extend(batch);
                    break;
                }
            }
        }

        resolver::resolve_chunks(navmesh, &summary.touched_chunks);

        log::info!(
            "Updated navmesh: {} changes, {} chunks touched, {} removed in {:.1}ms",
            summary.applied,
            summary.touched_chunks.len(),
            summary.removed_chunks.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        if !summary.skipped_chunks.is_empty() {
            log::warn!("Skipped {} chunks the oracle could not answer for", summary.skipped_chunks.len());
        }
        summary
    }

    fn apply_change(
        &self,
        navmesh: &mut Navmesh,
        change: &StagedChange,
        cancel: &AtomicBool,
        summary: &mut UpdateSummary,
    ) -> Outcome {
        let current = change
            .current
            .map(|aabb| GlobalBounds::from_aabb(&aabb))
            .unwrap_or_default();
        let previous: Vec<GlobalBounds> = change
            .previous
            .iter()
            .map(GlobalBounds::from_aabb)
            .filter(GlobalBounds::has_volume)
            .collect();

        let target = Target {
            layer: starting_layer_for(previous.iter().chain([&current]), self.config.static_depth),
            state: change.state,
            sound_preset_id: change.sound_preset_id,
        };
        let rounded_current = current.round_to_layer(target.layer);

        let mut work: BTreeMap<u64, Vec<Region>> = BTreeMap::new();
        for bounds in &previous {
            for remainder in bounds.round_to_layer(target.layer).difference(&rounded_current) {
                let clear = match self.region_is_free(&remainder, target.state) {
                    Ok(free) => free,
                    Err(e) => {
                        log::warn!("Could not test vacated region {:?}: {}", remainder, e);
                        false
                    }
                };
                remainder.for_each_chunk(|key, _, local| {
                    work.entry(key).or_default().push(Region { local, clear });
                });
            }
        }
        rounded_current.for_each_chunk(|key, _, local| {
            work.entry(key).or_default().push(Region { local, clear: false });
        });

        let mut outcome = Outcome::Applied;
        for (key, regions) in work {
            if cancel.load(Ordering::Relaxed) {
                return Outcome::Cancelled;
            }
            let existed = navmesh.contains_chunk(key);
            if !existed && regions.iter().all(|region| region.clear) {
                continue;
            }

            let mut chunk = navmesh.chunk(key).cloned().unwrap_or_else(|| Chunk::new(key));
            match self.update_chunk(&mut chunk, &regions, target) {
                Ok(()) => {
                    log::debug!("Updated chunk {:#x}: {} nodes", key, chunk.node_count());
                    navmesh.commit_chunk(chunk);
                    if !navmesh.contains_chunk(key) {
                        if existed {
                            summary.removed_chunks.insert(key);
                            summary.touched_chunks.insert(key);
                        }
                    } else {
                        summary.touched_chunks.insert(key);
                    }
                }
                Err(e) => {
                    log::warn!("Skipping chunk {:#x}: {}", key, e);
                    summary.skipped_chunks.insert(key);
                    outcome = Outcome::Incomplete;
                }
            }
        }
        outcome
    }

    fn region_is_free(&self, region: &GlobalBounds, state: NodeState) -> Result<bool> {
        let (center, half) = region.center_half_extent();
        Ok(!self.oracle.overlaps_state(center, half, state)?)
    }

    fn update_chunk(&self, chunk: &mut Chunk, regions: &[Region], target: Target) -> Result<()> {
        let Target { layer, state, .. } = target;
        let mut emptied_parents = BTreeSet::new();
        let mut parents = BTreeSet::new();

        for region in regions {
            let mut voxels = Vec::new();
            region.local.for_each_node(layer, |code| voxels.push(code));

            for code in voxels {
                let removed = if region.clear {
                    chunk.remove_node(code, layer, state)
                } else {
                    self.refresh_voxel(chunk, code, target)?
                };
                if layer > 0 {
                    let parent = morton::parent(code, layer - 1);
                    parents.insert(parent);
                    if removed {
                        emptied_parents.insert(parent);
                    }
                }
            }
        }

        for &parent in &emptied_parents {
            self.prune(chunk, parent, layer - 1, state)?;
        }

        // Ancestors cover more than the regions, so their presets are
        // recomputed once every voxel below them is settled
        for ancestor_layer in (0..layer).rev() {
            for &code in &parents {
                if !chunk.contains_node(code, ancestor_layer, state) {
                    continue;
                }
                let Some(preset) = self.sound_preset(chunk, code, ancestor_layer, state)? else {
                    continue;
                };
                if let Some(node) = chunk.get_node_mut(code, ancestor_layer, state) {
                    node.sound_preset_id = preset;
                }
            }
            if ancestor_layer > 0 {
                parents = parents.iter().map(|&code| morton::parent(code, ancestor_layer - 1)).collect();
            }
        }
        Ok(())
    }

    /// Bring one starting-layer voxel in line with the scene. Returns true
    /// when the voxel's node was removed.
    fn refresh_voxel(&self, chunk: &mut Chunk, code: u32, target: Target) -> Result<bool> {
        let location = chunk.origin() + morton::node_location(code);
        if !self.overlaps(location, target.layer, target.state)? {
            return Ok(chunk.remove_node(code, target.layer, target.state));
        }

        let preset = self
            .sound_preset(chunk, code, target.layer, target.state)?
            .unwrap_or(target.sound_preset_id);
        chunk.init_node_and_parents(code, target.layer, target.state, preset);
        if let Some(node) = chunk.get_node_mut(code, target.layer, target.state) {
            node.sound_preset_id = preset;
        }
        if target.layer < self.config.static_depth {
            self.refresh_children(chunk, code, location, target.layer, target)?;
        }
        Ok(false)
    }

    /// Recompute every child of an overlapping node. Children that still
    /// overlap are refreshed as well, so stale nodes deeper down are purged.
    fn refresh_children(
        &self,
        chunk: &mut Chunk,
        code: u32,
        location: IVec3,
        layer: u8,
        target: Target,
    ) -> Result<()> {
        let child_layer = layer + 1;
        let state = target.state;

        for (index, child_code) in morton::children(code, child_layer).into_iter().enumerate() {
            let index = index as u8;
            let child_loc = child_location(location, child_layer, index);

            if !self.overlaps(child_loc, child_layer, state)? {
                chunk.remove_node(child_code, child_layer, state);
                continue;
            }

            let preset = self
                .sound_preset(chunk, child_code, child_layer, state)?
                .unwrap_or(target.sound_preset_id);
            let (child, _) = chunk.get_or_init_node(child_code, child_layer, state, preset);
            child.sound_preset_id = preset;
            if let Some(node) = chunk.get_node_mut(code, layer, state) {
                node.set_child(index, state);
            }
            if child_layer < self.config.static_depth {
                self.refresh_children(chunk, child_code, child_loc, child_layer, target)?;
            }
        }
        Ok(())
    }

    /// Remove childless nodes that stopped overlapping, walking up to the root.
    fn prune(&self, chunk: &mut Chunk, mut code: u32, mut layer: u8, state: NodeState) -> Result<()> {
        loop {
            let Some(node) = chunk.get_node(code, layer, state) else {
                return Ok(());
            };
            if node.has_children() {
                return Ok(());
            }
            let location = chunk.origin() + morton::node_location(code);
            if self.overlaps(location, layer, state)? {
                return Ok(());
            }

            log::trace!("Pruning node {:#x} on layer {}", code, layer);
            chunk.remove_node(code, layer, state);
            if layer == 0 {
                return Ok(());
            }
            layer -= 1;
            code = morton::parent(code, layer);
        }
    }

    /// Preset a node of `chunk` gets from the occluders overlapping it
    fn sound_preset(&self, chunk: &Chunk, code: u32, layer: u8, state: NodeState) -> Result<Option<u16>> {
        let location = chunk.origin() + morton::node_location(code);
        let (center, half) = node_center_half_extent(location, layer);
        self.oracle.sound_preset(center, half, state)
    }

    fn overlaps(&self, location: IVec3, layer: u8, state: NodeState) -> Result<bool> {
        let (center, half) = node_center_half_extent(location, layer);
        self.oracle.overlaps_state(center, half, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;
    use crate::core::Error;
    use crate::math::aabb::Aabb;
    use crate::math::morton::encode_chunk;
    use crate::rasterize::generator::Generator;
    use crate::rasterize::occluder::Occluder;
    use crate::rasterize::oracle::BoxOracle;

    fn aabb(min: [f32; 3], max: [f32; 3]) -> Aabb {
        Aabb::new(Vec3::from_array(min), Vec3::from_array(max))
    }

    fn generated(config: &NavmeshConfig, occluders: &[Occluder]) -> Navmesh {
        let oracle = BoxOracle::new(occluders);
        let mut navmesh = Navmesh::new();
        Generator::new(config, &oracle).generate(&mut navmesh, occluders);
        navmesh
    }

    /// Move one occluder in the oracle and stage the move.
    fn move_occluder(oracle: &BoxOracle, id: u32, to: Option<Aabb>) -> (OccluderId, StagedChange) {
        let id = OccluderId(id);
        let previous = match to {
            Some(bounds) => oracle.set_bounds(id, bounds).unwrap(),
            None => oracle.remove(id).unwrap().map(|o| o.bounds),
        };
        (id, StagedChange::new(previous, to))
    }

    #[test]
    fn test_move_one_chunk_matches_regeneration() {
        let config = NavmeshConfig::with_static_depth(4);
        let start = Occluder::new(1, aabb([100.0, 200.0, 300.0], [400.0, 260.0, 333.0]));
        let oracle = BoxOracle::new(&[start]);
        let mut navmesh = generated(&config, &[start]);

        let moved = aabb([1124.0, 200.0, 300.0], [1424.0, 260.0, 333.0]);
        let change = move_occluder(&oracle, 1, Some(moved));
        let summary = Updater::new(&config, &oracle).run(&mut navmesh, vec![change], &AtomicBool::new(false));

        let left = encode_chunk(0, 0, 0);
        let right = encode_chunk(1024, 0, 0);
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.removed_chunks, [left].into());
        assert_eq!(summary.touched_chunks, [left, right].into());
        assert!(!navmesh.contains_chunk(left));

        let expected = generated(&config, &[Occluder { bounds: moved, ..start }]);
        assert_eq!(navmesh, expected);
    }

    #[test]
    fn test_partial_move_matches_regeneration() {
        let config = NavmeshConfig::with_static_depth(5);
        let wall = Occluder::new(1, aabb([0.0, 0.0, 0.0], [1024.0, 40.0, 1024.0]));
        let crate_box = Occluder::new(2, aabb([300.0, 40.0, 300.0], [380.0, 130.0, 420.0]));
        let oracle = BoxOracle::new(&[wall, crate_box]);
        let mut navmesh = generated(&config, &[wall, crate_box]);

        let moved = aabb([350.0, 20.0, 333.0], [700.0, 90.0, 380.0]);
        let change = move_occluder(&oracle, 2, Some(moved));
        Updater::new(&config, &oracle).run(&mut navmesh, vec![change], &AtomicBool::new(false));

        let expected = generated(&config, &[wall, Occluder { bounds: moved, ..crate_box }]);
        assert_eq!(navmesh, expected);
    }

    #[test]
    fn test_accumulated_previous_bounds() {
        // Two moves staged into one change, only the last previous bounds
        // overlaps the final position.
        let config = NavmeshConfig::with_static_depth(4);
        let start = Occluder::new(1, aabb([0.0; 3], [64.0; 3]));
        let oracle = BoxOracle::new(&[start]);
        let mut navmesh = generated(&config, &[start]);

        let (id, mut change) = move_occluder(&oracle, 1, Some(aabb([500.0; 3], [564.0; 3])));
        let (_, second) = move_occluder(&oracle, 1, Some(aabb([530.0; 3], [600.0; 3])));
        change.previous.extend(second.previous);
        change.current = second.current;

        Updater::new(&config, &oracle).run(&mut navmesh, vec![(id, change)], &AtomicBool::new(false));
        let expected = generated(&config, &oracle.occluders().unwrap());
        assert_eq!(navmesh, expected);
    }

    #[test]
    fn test_removal_prunes_to_root() {
        let config = NavmeshConfig::with_static_depth(3);
        let occluder = Occluder::new(1, aabb([0.0; 3], [256.0; 3]));
        let oracle = BoxOracle::new(&[occluder]);
        let mut navmesh = generated(&config, &[occluder]);
        let key = encode_chunk(0, 0, 0);
        assert_eq!(navmesh.chunk(key).and_then(|c| c.get_node(0, 2, NodeState::Static)).map(|n| n.children), Some(0xFF));

        let change = move_occluder(&oracle, 1, None);
        let summary = Updater::new(&config, &oracle).run(&mut navmesh, vec![change], &AtomicBool::new(false));
        assert!(navmesh.is_empty());
        assert_eq!(summary.removed_chunks, [key].into());
    }

    #[test]
    fn test_shrinking_clears_children_and_parent_bits() {
        let config = NavmeshConfig::with_static_depth(3);
        let occluder = Occluder::new(1, aabb([0.0; 3], [256.0; 3]));
        let oracle = BoxOracle::new(&[occluder]);
        let mut navmesh = generated(&config, &[occluder]);

        // Shrink to a single 128 wide octant.
        let change = move_occluder(&oracle, 1, Some(aabb([0.0; 3], [128.0; 3])));
        Updater::new(&config, &oracle).run(&mut navmesh, vec![change], &AtomicBool::new(false));

        let chunk = navmesh.chunk(encode_chunk(0, 0, 0)).expect("chunk");
        assert_eq!(chunk.get_node(0, 2, NodeState::Static).map(|n| n.children), Some(0b0000_0001));
        assert_eq!(chunk.nodes_per_layer(NodeState::Static)[..4], [1, 1, 1, 1]);
    }

    #[test]
    fn test_new_occluder_in_empty_space() {
        let config = NavmeshConfig::with_static_depth(4);
        let oracle = BoxOracle::new(&[]);
        let mut navmesh = Navmesh::new();

        let occluder = Occluder::new(5, aabb([-300.0, 10.0, 10.0], [-200.0, 50.0, 50.0])).with_sound_preset(2);
        oracle.insert(occluder).unwrap();
        let change = StagedChange::new(None, Some(occluder.bounds)).with_sound_preset(2);
        Updater::new(&config, &oracle).run(&mut navmesh, vec![(occluder.id, change)], &AtomicBool::new(false));

        assert_eq!(navmesh, generated(&config, &[occluder]));
    }

    #[test]
    fn test_dynamic_change_leaves_static_tree() {
        let config = NavmeshConfig::with_static_depth(3);
        let floor = Occluder::new(1, aabb([0.0; 3], [1024.0, 100.0, 1024.0]));
        let cart = Occluder::new(2, aabb([0.0; 3], [200.0; 3])).with_state(NodeState::Dynamic);
        let oracle = BoxOracle::new(&[floor, cart]);
        let mut navmesh = generated(&config, &[floor, cart]);
        let static_before = navmesh.nodes_per_layer(NodeState::Static);

        let (id, change) = move_occluder(&oracle, 2, Some(aabb([600.0; 3], [800.0; 3])));
        let change = change.with_state(NodeState::Dynamic);
        Updater::new(&config, &oracle).run(&mut navmesh, vec![(id, change)], &AtomicBool::new(false));

        assert_eq!(navmesh.nodes_per_layer(NodeState::Static), static_before);
        let expected = generated(&config, &oracle.occluders().unwrap());
        assert_eq!(navmesh, expected);
    }

    #[test]
    fn test_cancelled_before_first_chunk() {
        let config = NavmeshConfig::with_static_depth(3);
        let occluder = Occluder::new(1, aabb([0.0; 3], [100.0; 3]));
        let oracle = BoxOracle::new(&[occluder]);
        let mut navmesh = generated(&config, &[occluder]);
        let before = navmesh.clone();

        let change = move_occluder(&oracle, 1, Some(aabb([2000.0; 3], [2100.0; 3])));
        let summary = Updater::new(&config, &oracle).run(&mut navmesh, vec![change.clone()], &AtomicBool::new(true));
        assert!(summary.cancelled());
        assert_eq!(summary.applied, 0);
        assert_eq!(summary.unprocessed, vec![change]);
        assert_eq!(navmesh, before);
    }

    struct UnavailableOracle;

    impl CollisionOracle for UnavailableOracle {
        fn overlaps(&self, _: Vec3, _: Vec3) -> Result<bool> {
            Err(Error::Oracle("scene not loaded".into()))
        }

        fn overlaps_shape(&self, _: OccluderId, _: Vec3, _: Vec3, _: bool) -> Result<bool> {
            Err(Error::Oracle("scene not loaded".into()))
        }
    }

    #[test]
    fn test_oracle_failure_skips_chunks() {
        let config = NavmeshConfig::with_static_depth(3);
        let occluder = Occluder::new(1, aabb([0.0; 3], [100.0; 3]));
        let mut navmesh = generated(&config, &[occluder]);
        let before = navmesh.clone();

        let change = StagedChange::new(Some(occluder.bounds), Some(aabb([50.0; 3], [150.0; 3])));
        let summary = Updater::new(&config, &UnavailableOracle).run(
            &mut navmesh,
            vec![(occluder.id, change)],
            &AtomicBool::new(false),
        );
        assert_eq!(summary.skipped_chunks, [encode_chunk(0, 0, 0)].into());
        assert!(summary.touched_chunks.is_empty());
        assert_eq!(summary.applied, 0);
        assert!(!summary.cancelled());
        assert_eq!(summary.incomplete.len(), 1);
        assert_eq!(summary.to_restage().count(), 1);
        assert_eq!(navmesh, before);
    }

    /// Box scene whose queries fail while `failing` is set
    struct FlakyOracle {
        scene: BoxOracle,
        failing: AtomicBool,
    }

    impl FlakyOracle {
        fn check(&self) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(Error::Oracle("scene streaming".into()));
            }
            Ok(())
        }
    }

    impl CollisionOracle for FlakyOracle {
        fn overlaps(&self, center: Vec3, half_extent: Vec3) -> Result<bool> {
            self.check()?;
            self.scene.overlaps(center, half_extent)
        }

        fn overlaps_shape(&self, shape: OccluderId, center: Vec3, half_extent: Vec3, exact: bool) -> Result<bool> {
            self.check()?;
            self.scene.overlaps_shape(shape, center, half_extent, exact)
        }

        fn overlaps_state(&self, center: Vec3, half_extent: Vec3, state: NodeState) -> Result<bool> {
            self.check()?;
            self.scene.overlaps_state(center, half_extent, state)
        }

        fn sound_preset(&self, center: Vec3, half_extent: Vec3, state: NodeState) -> Result<Option<u16>> {
            self.check()?;
            self.scene.sound_preset(center, half_extent, state)
        }
    }

    #[test]
    fn test_incomplete_change_finishes_on_retry() {
        let config = NavmeshConfig::with_static_depth(4);
        let start = Occluder::new(1, aabb([100.0; 3], [150.0; 3]));
        let oracle = FlakyOracle { scene: BoxOracle::new(&[start]), failing: AtomicBool::new(false) };
        let mut navmesh = generated(&config, &[start]);

        let change = move_occluder(&oracle.scene, 1, Some(aabb([2100.0; 3], [2150.0; 3])));
        oracle.failing.store(true, Ordering::SeqCst);
        let summary = Updater::new(&config, &oracle).run(&mut navmesh, vec![change.clone()], &AtomicBool::new(false));
        assert_eq!(summary.applied, 0);
        assert_eq!(summary.skipped_chunks, [encode_chunk(0, 0, 0), encode_chunk(2048, 2048, 2048)].into());
        assert_eq!(summary.incomplete, vec![change]);

        oracle.failing.store(false, Ordering::SeqCst);
        let retry = summary.incomplete;
        let summary = Updater::new(&config, &oracle).run(&mut navmesh, retry, &AtomicBool::new(false));
        assert_eq!(summary.applied, 1);
        assert!(summary.incomplete.is_empty());
        assert_eq!(navmesh, generated(&config, &oracle.scene.occluders().unwrap()));
    }

    #[test]
    fn test_presets_match_regeneration() {
        // Two presets sharing nodes after the move
        let config = NavmeshConfig::with_static_depth(4);
        let quiet = Occluder::new(1, aabb([300.0, 0.0, 0.0], [360.0, 60.0, 60.0])).with_sound_preset(3);
        let loud = Occluder::new(2, aabb([0.0; 3], [60.0; 3])).with_sound_preset(7);
        let oracle = BoxOracle::new(&[quiet, loud]);
        let mut navmesh = generated(&config, &[quiet, loud]);

        let (id, change) = move_occluder(&oracle, 2, Some(aabb([290.0, 0.0, 0.0], [350.0, 60.0, 60.0])));
        let change = change.with_sound_preset(7);
        Updater::new(&config, &oracle).run(&mut navmesh, vec![(id, change)], &AtomicBool::new(false));

        let chunk = navmesh.chunk(encode_chunk(0, 0, 0)).expect("chunk");
        assert_eq!(chunk.root(NodeState::Static).map(|n| n.sound_preset_id), Some(7));
        let shared = chunk.get_node(morton::encode_node(320, 0, 0), 4, NodeState::Static).expect("shared leaf");
        assert_eq!(shared.sound_preset_id, 7);
        let scene = oracle.occluders().unwrap();
        assert_eq!(navmesh, generated(&config, &scene));

        // Moving the loud one away hands the shared nodes back to the quiet one
        let (id, change) = move_occluder(&oracle, 2, Some(aabb([600.0, 0.0, 0.0], [660.0, 60.0, 60.0])));
        Updater::new(&config, &oracle).run(&mut navmesh, vec![(id, change.with_sound_preset(7))], &AtomicBool::new(false));
        let chunk = navmesh.chunk(encode_chunk(0, 0, 0)).expect("chunk");
        let leaf = chunk.get_node(morton::encode_node(320, 0, 0), 4, NodeState::Static).expect("quiet leaf");
        assert_eq!(leaf.sound_preset_id, 3);
        assert_eq!(navmesh, generated(&config, &oracle.occluders().unwrap()));
    }
}

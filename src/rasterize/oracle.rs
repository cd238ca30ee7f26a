//! Collision queries used to decide which volumes are occluded.
//!
//! The navmesh never looks at scene geometry directly. Every overlap question
//! goes through a [`CollisionOracle`], which may fail when the scene it wraps
//! is unavailable.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::core::types::{Result, Vec3};
use crate::core::Error;
use crate::math::aabb::Aabb;
use crate::navmesh::relations::NodeState;
use crate::rasterize::occluder::{Occluder, OccluderId};

/// Answers whether a box overlaps scene geometry.
pub trait CollisionOracle: Send + Sync {
    /// Does the box overlap any occluder.
    fn overlaps(&self, center: Vec3, half_extent: Vec3) -> Result<bool>;

    /// Does the box overlap one occluder. `exact` asks for a precise shape test
    /// instead of a conservative one.
    fn overlaps_shape(
        &self,
        shape: OccluderId,
        center: Vec3,
        half_extent: Vec3,
        exact: bool,
    ) -> Result<bool>;

    /// Does the box overlap any occluder of one state.
    ///
    /// Defaults to [`CollisionOracle::overlaps`] for scenes that do not tell
    /// states apart.
    fn overlaps_state(&self, center: Vec3, half_extent: Vec3, state: NodeState) -> Result<bool> {
        let _ = state;
        self.overlaps(center, half_extent)
    }

    /// Highest sound preset among the occluders of one state overlapping the
    /// box. `None` when nothing overlaps or the scene does not carry presets,
    /// in which case updated nodes take the preset of the staged change.
    fn sound_preset(&self, center: Vec3, half_extent: Vec3, state: NodeState) -> Result<Option<u16>> {
        let _ = (center, half_extent, state);
        Ok(None)
    }
}

/// Oracle over a set of box occluders. Touching faces do not overlap.
///
/// Occluders can be moved while the oracle is shared, which is how a host
/// application mirrors scene changes before staging them on the navmesh.
#[derive(Debug, Default)]
pub struct BoxOracle {
    occluders: RwLock<BTreeMap<OccluderId, Occluder>>,
}

impl BoxOracle {
    pub fn new(occluders: &[Occluder]) -> Self {
        Self {
            occluders: RwLock::new(occluders.iter().map(|o| (o.id, *o)).collect()),
        }
    }

    /// Insert or replace an occluder, returning the previous version.
    pub fn insert(&self, occluder: Occluder) -> Result<Option<Occluder>> {
        let mut occluders = self.occluders.write().map_err(|_| poisoned())?;
        Ok(occluders.insert(occluder.id, occluder))
    }

    pub fn remove(&self, id: OccluderId) -> Result<Option<Occluder>> {
        let mut occluders = self.occluders.write().map_err(|_| poisoned())?;
        Ok(occluders.remove(&id))
    }

    /// Move an occluder, returning its previous bounds.
    pub fn set_bounds(&self, id: OccluderId, bounds: Aabb) -> Result<Option<Aabb>> {
        let mut occluders = self.occluders.write().map_err(|_| poisoned())?;
        Ok(occluders.get_mut(&id).map(|occluder| std::mem::replace(&mut occluder.bounds, bounds)))
    }

    pub fn get(&self, id: OccluderId) -> Result<Option<Occluder>> {
        let occluders = self.occluders.read().map_err(|_| poisoned())?;
        Ok(occluders.get(&id).copied())
    }

    /// Copy of every occluder, ordered by id.
    pub fn occluders(&self) -> Result<Vec<Occluder>> {
        let occluders = self.occluders.read().map_err(|_| poisoned())?;
        Ok(occluders.values().copied().collect())
    }

    fn any_overlap(&self, query: &Aabb, state: Option<NodeState>) -> Result<bool> {
        let occluders = self.occluders.read().map_err(|_| poisoned())?;
        Ok(occluders
            .values()
            .filter(|o| state.is_none_or(|state| o.state == state))
            .any(|o| o.bounds.is_valid() && o.bounds.overlaps(query)))
    }

    fn highest_preset(&self, query: &Aabb, state: NodeState) -> Result<Option<u16>> {
        let occluders = self.occluders.read().map_err(|_| poisoned())?;
        Ok(occluders
            .values()
            .filter(|o| o.state == state && o.bounds.is_valid() && o.bounds.overlaps(query))
            .map(|o| o.sound_preset_id)
            .max())
    }
}

fn poisoned() -> Error {
    Error::Oracle("occluder set lock poisoned".into())
}

impl CollisionOracle for BoxOracle {
    fn overlaps(&self, center: Vec3, half_extent: Vec3) -> Result<bool> {
        self.any_overlap(&Aabb::from_center_half_extent(center, half_extent), None)
    }

    fn overlaps_shape(
        &self,
        shape: OccluderId,
        center: Vec3,
        half_extent: Vec3,
        _exact: bool,
    ) -> Result<bool> {
        // A box is its own exact shape.
        let query = Aabb::from_center_half_extent(center, half_extent);
        let occluders = self.occluders.read().map_err(|_| poisoned())?;
        Ok(occluders
            .get(&shape)
            .is_some_and(|o| o.bounds.is_valid() && o.bounds.overlaps(&query)))
    }

    fn overlaps_state(&self, center: Vec3, half_extent: Vec3, state: NodeState) -> Result<bool> {
        self.any_overlap(&Aabb::from_center_half_extent(center, half_extent), Some(state))
    }

    fn sound_preset(&self, center: Vec3, half_extent: Vec3, state: NodeState) -> Result<Option<u16>> {
        self.highest_preset(&Aabb::from_center_half_extent(center, half_extent), state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(id: u32, min: Vec3) -> Occluder {
        Occluder::new(id, Aabb::new(min, min + Vec3::splat(10.0)))
    }

    #[test]
    fn test_overlaps_any() {
        let oracle = BoxOracle::new(&[unit_box(1, Vec3::ZERO), unit_box(2, Vec3::splat(100.0))]);
        assert!(oracle.overlaps(Vec3::splat(5.0), Vec3::ONE).unwrap());
        assert!(oracle.overlaps(Vec3::splat(105.0), Vec3::ONE).unwrap());
        assert!(!oracle.overlaps(Vec3::splat(50.0), Vec3::ONE).unwrap());
        // Touching the face is not an overlap.
        assert!(!oracle.overlaps(Vec3::new(11.0, 5.0, 5.0), Vec3::ONE).unwrap());
    }

    #[test]
    fn test_overlaps_shape() {
        let oracle = BoxOracle::new(&[unit_box(1, Vec3::ZERO), unit_box(2, Vec3::splat(100.0))]);
        assert!(oracle.overlaps_shape(OccluderId(1), Vec3::splat(5.0), Vec3::ONE, false).unwrap());
        assert!(!oracle.overlaps_shape(OccluderId(2), Vec3::splat(5.0), Vec3::ONE, true).unwrap());
        assert!(!oracle.overlaps_shape(OccluderId(9), Vec3::splat(5.0), Vec3::ONE, true).unwrap());
    }

    #[test]
    fn test_overlaps_state() {
        let dynamic = unit_box(3, Vec3::ZERO).with_state(NodeState::Dynamic);
        let oracle = BoxOracle::new(&[dynamic]);
        assert!(oracle.overlaps(Vec3::splat(5.0), Vec3::ONE).unwrap());
        assert!(oracle.overlaps_state(Vec3::splat(5.0), Vec3::ONE, NodeState::Dynamic).unwrap());
        assert!(!oracle.overlaps_state(Vec3::splat(5.0), Vec3::ONE, NodeState::Static).unwrap());
    }

    #[test]
    fn test_sound_preset_takes_highest() {
        let low = unit_box(1, Vec3::ZERO).with_sound_preset(3);
        let high = unit_box(2, Vec3::splat(5.0)).with_sound_preset(7);
        let dynamic = unit_box(3, Vec3::ZERO).with_sound_preset(9).with_state(NodeState::Dynamic);
        let oracle = BoxOracle::new(&[low, high, dynamic]);

        let preset = |at: f32| oracle.sound_preset(Vec3::splat(at), Vec3::ONE, NodeState::Static).unwrap();
        assert_eq!(preset(2.0), Some(3));
        assert_eq!(preset(7.0), Some(7));
        assert_eq!(preset(50.0), None);
        assert_eq!(oracle.sound_preset(Vec3::splat(2.0), Vec3::ONE, NodeState::Dynamic).unwrap(), Some(9));
    }

    #[test]
    fn test_move_and_remove() {
        let oracle = BoxOracle::new(&[unit_box(1, Vec3::ZERO)]);
        let moved = Aabb::new(Vec3::splat(20.0), Vec3::splat(30.0));
        let previous = oracle.set_bounds(OccluderId(1), moved).unwrap();
        assert_eq!(previous.map(|b| b.min), Some(Vec3::ZERO));
        assert!(!oracle.overlaps(Vec3::splat(5.0), Vec3::ONE).unwrap());
        assert!(oracle.overlaps(Vec3::splat(25.0), Vec3::ONE).unwrap());

        assert!(oracle.remove(OccluderId(1)).unwrap().is_some());
        assert!(oracle.occluders().unwrap().is_empty());
        assert_eq!(oracle.set_bounds(OccluderId(1), moved).unwrap(), None);
    }
}

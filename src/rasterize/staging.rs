//! Occluder changes waiting for the next update batch

use std::collections::BTreeMap;

use crate::math::aabb::Aabb;
use crate::navmesh::relations::NodeState;
use crate::rasterize::occluder::OccluderId;

/// Everything known about one occluder's movement since the last batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StagedChange {
    /// Every bounds the occluder left, oldest first
    pub previous: Vec<Aabb>,
    /// Where the occluder is now. `None` once it was removed.
    pub current: Option<Aabb>,
    pub state: NodeState,
    pub sound_preset_id: u16,
}

impl StagedChange {
    pub fn new(previous: Option<Aabb>, current: Option<Aabb>) -> Self {
        Self {
            previous: previous.into_iter().collect(),
            current,
            ..Default::default()
        }
    }

    pub fn with_state(mut self, state: NodeState) -> Self {
        self.state = state;
        self
    }

    pub fn with_sound_preset(mut self, sound_preset_id: u16) -> Self {
        self.sound_preset_id = sound_preset_id;
        self
    }

    /// Fold a later change of the same occluder into this one.
    fn absorb(&mut self, later: StagedChange) {
        self.previous.extend(later.previous);
        self.current = later.current;
        self.state = later.state;
        self.sound_preset_id = later.sound_preset_id;
    }
}

/// Pending changes keyed by occluder.
///
/// An occluder staged several times keeps all of its previous bounds, so a
/// batch never misses a region the occluder passed through.
#[derive(Clone, Debug, Default)]
pub struct StagedChanges {
    changes: BTreeMap<OccluderId, StagedChange>,
}

impl StagedChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, id: OccluderId, change: StagedChange) {
        match self.changes.get_mut(&id) {
            Some(staged) => staged.absorb(change),
            None => {
                self.changes.insert(id, change);
            }
        }
    }

    /// Put back changes a batch did not finish.
    ///
    /// Anything staged in the meantime is newer, so it is folded on top. The
    /// unfinished change's current bounds become a previous bounds, since the
    /// batch may already have rasterized part of it.
    pub fn restage(&mut self, id: OccluderId, mut unfinished: StagedChange) {
        if let Some(newer) = self.changes.remove(&id) {
            unfinished.previous.extend(unfinished.current.take());
            unfinished.absorb(newer);
        }
        self.changes.insert(id, unfinished);
    }

    /// Drain every staged change, ordered by occluder id.
    pub fn take(&mut self) -> Vec<(OccluderId, StagedChange)> {
        std::mem::take(&mut self.changes).into_iter().collect()
    }

    pub fn get(&self, id: OccluderId) -> Option<&StagedChange> {
        self.changes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

//! Occluder shapes fed into rasterization

use serde::{Deserialize, Serialize};

use crate::math::aabb::Aabb;
use crate::math::bounds::GlobalBounds;
use crate::navmesh::relations::NodeState;

/// Handle of an occluder shape, as understood by the collision oracle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OccluderId(pub u32);

/// A piece of scene geometry that blocks sound.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Occluder {
    pub id: OccluderId,
    pub bounds: Aabb,
    #[serde(default)]
    pub sound_preset_id: u16,
    #[serde(default)]
    pub state: NodeState,
}

impl Occluder {
    pub fn new(id: u32, bounds: Aabb) -> Self {
        Self {
            id: OccluderId(id),
            bounds,
            sound_preset_id: 0,
            state: NodeState::Static,
        }
    }

    pub fn with_sound_preset(mut self, sound_preset_id: u16) -> Self {
        self.sound_preset_id = sound_preset_id;
        self
    }

    pub fn with_state(mut self, state: NodeState) -> Self {
        self.state = state;
        self
    }

    /// Integer world bounds. Invalid for a degenerate or non-finite shape.
    pub fn world_bounds(&self) -> GlobalBounds {
        GlobalBounds::from_aabb(&self.bounds)
    }
}

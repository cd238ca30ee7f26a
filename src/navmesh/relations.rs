//! Per-side neighbour relations of a node

use serde::{Deserialize, Serialize};

use crate::math::direction::Direction;
use crate::math::morton::MAX_DEPTH;

/// Layer value of a relation slot that has no neighbour.
pub const LAYER_EMPTY: u8 = 11;

/// Layer value of a relation slot whose neighbour is free space inside the
/// node's own parent.
pub const LAYER_PARENT: u8 = 14;

/// Tree a node lives in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    /// Baked by generation, persisted to disk
    #[default]
    Static = 0,
    /// Maintained at runtime only
    Dynamic = 1,
}

impl NodeState {
    pub const ALL: [NodeState; 2] = [NodeState::Static, NodeState::Dynamic];

    pub const fn from_bit(bit: bool) -> Self {
        if bit { NodeState::Dynamic } else { NodeState::Static }
    }

    pub const fn bit(self) -> u8 {
        self as u8
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A resolved relation: the layer and tree of the neighbouring node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Relation {
    pub layer: u8,
    pub state: NodeState,
}

/// Six relation slots in the order `-X -Y -Z +X +Y +Z`.
///
/// Packed layout (u32):
/// - bits 0-23: 4-bit layer index per slot, slot i at bit 4*i
/// - bits 24-29: state bit per slot, slot i at bit 24+i
/// - bits 30-31: zero
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Relations {
    layers: [u8; 6],
    states: u8,
}

impl Default for Relations {
    fn default() -> Self {
        Self::empty()
    }
}

impl Relations {
    pub const fn empty() -> Self {
        Self { layers: [LAYER_EMPTY; 6], states: 0 }
    }

    /// Relation for a single direction, `None` when the slot is empty.
    pub fn get(&self, direction: Direction) -> Option<Relation> {
        let slot = direction.slot()?;
        let layer = self.layers[slot];
        if layer >= MAX_DEPTH {
            return None;
        }
        Some(Relation {
            layer,
            state: NodeState::from_bit(self.states >> slot & 1 != 0),
        })
    }

    /// Raw layer value of a slot, `LAYER_EMPTY` included.
    pub fn layer(&self, direction: Direction) -> u8 {
        direction.slot().map_or(LAYER_EMPTY, |slot| self.layers[slot])
    }

    pub fn set(&mut self, direction: Direction, layer: u8, state: NodeState) {
        debug_assert!(layer < MAX_DEPTH);
        if let Some(slot) = direction.slot() {
            self.layers[slot] = layer;
            self.states = (self.states & !(1 << slot)) | (state.bit() << slot);
        }
    }

    /// Record a neighbour unless the slot already holds a finer one.
    ///
    /// Several nodes can share one neighbour on a side; the slot keeps the
    /// deepest of them, so the result does not depend on processing order.
    pub fn merge(&mut self, direction: Direction, layer: u8, state: NodeState) {
        match self.get(direction) {
            Some(current) if (current.layer, current.state) >= (layer, state) => {}
            _ => self.set(direction, layer, state),
        }
    }

    /// Mark the neighbour on this side as free space within the parent.
    pub fn set_parent(&mut self, direction: Direction) {
        if let Some(slot) = direction.slot() {
            self.layers[slot] = LAYER_PARENT;
            self.states &= !(1 << slot);
        }
    }

    pub fn points_to_parent(&self, direction: Direction) -> bool {
        self.layer(direction) == LAYER_PARENT
    }

    pub fn clear(&mut self, direction: Direction) {
        if let Some(slot) = direction.slot() {
            self.layers[slot] = LAYER_EMPTY;
            self.states &= !(1 << slot);
        }
    }

    pub fn clear_all(&mut self) {
        *self = Self::empty();
    }

    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(|&layer| layer == LAYER_EMPTY)
    }

    pub fn pack(&self) -> u32 {
        let mut packed = 0u32;
        for (slot, &layer) in self.layers.iter().enumerate() {
            packed |= (layer as u32 & 0xF) << (4 * slot);
        }
        packed | ((self.states as u32 & 0b111111) << 24)
    }

    pub fn unpack(packed: u32) -> Self {
        let mut layers = [LAYER_EMPTY; 6];
        for (slot, layer) in layers.iter_mut().enumerate() {
            *layer = (packed >> (4 * slot) & 0xF) as u8;
        }
        Self {
            layers,
            states: (packed >> 24 & 0b111111) as u8,
        }
    }
}

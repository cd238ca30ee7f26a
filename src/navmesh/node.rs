//! Navmesh octree node

use crate::navmesh::relations::{NodeState, Relations};

/// Octree node of a chunk. Its position is the key it is stored under, so the
/// node itself only carries what is known about its volume.
///
/// A node exists only where its volume is occluded. Nodes with children are
/// internal; nodes without children on the deepest layer are leaf occluders.
///
/// Packed layout (u64):
/// - bits 0-7: children mask
/// - bits 8-15: children kinds mask (1 = dynamic)
/// - bits 16-31: sound preset id
/// - bits 32-63: packed relations
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Node {
    /// Bit i set when child i exists and is occluding
    pub children: u8,
    /// Bit i holds the state of child i
    pub children_kinds: u8,
    /// Nearest same-or-larger neighbour per side
    pub relations: Relations,
    /// Attenuation preset of the occluder that rasterized this node
    pub sound_preset_id: u16,
}

impl Node {
    pub const fn new(sound_preset_id: u16) -> Self {
        Self {
            children: 0,
            children_kinds: 0,
            relations: Relations::empty(),
            sound_preset_id,
        }
    }

    pub fn has_children(&self) -> bool {
        self.children != 0
    }

    /// Check if child at index exists
    pub fn child_exists(&self, index: u8) -> bool {
        debug_assert!(index < 8);
        (self.children >> index) & 1 != 0
    }

    /// Mark child at index as existing and occluding
    pub fn set_child(&mut self, index: u8, state: NodeState) {
        debug_assert!(index < 8);
        self.children |= 1 << index;
        self.children_kinds = (self.children_kinds & !(1 << index)) | (state.bit() << index);
    }

    /// Clear child at index
    pub fn clear_child(&mut self, index: u8) {
        debug_assert!(index < 8);
        self.children &= !(1 << index);
        self.children_kinds &= !(1 << index);
    }

    /// Count number of existing children
    pub fn child_count(&self) -> u8 {
        self.children.count_ones() as u8
    }

    pub fn pack(&self) -> u64 {
        self.children as u64
            | (self.children_kinds as u64) << 8
            | (self.sound_preset_id as u64) << 16
            | (self.relations.pack() as u64) << 32
    }

    pub fn unpack(packed: u64) -> Self {
        Self {
            children: (packed & 0xFF) as u8,
            children_kinds: (packed >> 8 & 0xFF) as u8,
            sound_preset_id: (packed >> 16 & 0xFFFF) as u16,
            relations: Relations::unpack((packed >> 32) as u32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::direction::Direction;

    #[test]
    fn test_children() {
        let mut node = Node::new(0);
        assert!(!node.has_children());

        node.set_child(3, NodeState::Static);
        node.set_child(6, NodeState::Dynamic);
        assert!(node.child_exists(3));
        assert!(node.child_exists(6));
        assert!(!node.child_exists(0));
        assert_eq!(node.child_count(), 2);
        assert_eq!(node.children_kinds, 0b0100_0000);

        node.clear_child(6);
        assert_eq!(node.children, 0b0000_1000);
        assert_eq!(node.children_kinds, 0);
    }

    #[test]
    fn test_pack_layout() {
        let mut node = Node::new(0xBEEF);
        node.set_child(0, NodeState::Static);
        node.set_child(7, NodeState::Dynamic);
        node.relations.set(Direction::X_POSITIVE, 5, NodeState::Static);

        let packed = node.pack();
        assert_eq!(packed & 0xFF, 0b1000_0001);
        assert_eq!(packed >> 8 & 0xFF, 0b1000_0000);
        assert_eq!(packed >> 16 & 0xFFFF, 0xBEEF);
        assert_eq!((packed >> 32) as u32, node.relations.pack());
        assert_eq!(Node::unpack(packed), node);
    }
}

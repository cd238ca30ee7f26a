//! Starting layer selection and per-face skip masks

use crate::core::types::{IVec3, Vec3};
use crate::math::bounds::GlobalBounds;
use crate::math::direction::{Axis, Direction};
use crate::math::morton::NODE_SIZES;

/// Coarsest layer on which `largest_side` spans more than one node, capped at
/// `static_depth`.
///
/// Coarser layers would trivially contain the whole shape, finer layers would
/// mean iterating many more voxels up front.
pub fn optimal_starting_layer(largest_side: i32, static_depth: u8) -> u8 {
    (0..static_depth)
        .find(|&layer| largest_side / NODE_SIZES[layer as usize] > 1)
        .unwrap_or(static_depth)
}

/// Starting layer for a set of bounds, looking at the largest side of any of them.
pub fn starting_layer_for<'a>(
    bounds: impl IntoIterator<Item = &'a GlobalBounds>,
    static_depth: u8,
) -> u8 {
    let largest = bounds
        .into_iter()
        .filter(|b| b.has_volume())
        .map(GlobalBounds::largest_side)
        .max()
        .unwrap_or(0);
    optimal_starting_layer(largest, static_depth)
}

/// Center and half extent of a node at world `location`, for oracle queries.
pub fn node_center_half_extent(location: IVec3, layer: u8) -> (Vec3, Vec3) {
    let half = Vec3::splat(NODE_SIZES[layer as usize] as f32 * 0.5);
    (location.as_vec3() + half, half)
}

/// World location of child `child_index` of a node at `location`.
pub fn child_location(location: IVec3, child_layer: u8, child_index: u8) -> IVec3 {
    let size = NODE_SIZES[child_layer as usize];
    let mut child = location;
    for axis in Axis::ALL {
        if child_index & axis.child_bit() != 0 {
            child[axis as usize] += size;
        }
    }
    child
}

/// Distance between the real bounds of a shape and the rounded bounds, per
/// face, for a node lying on the edge of the rounded bounds.
///
/// Children that fall entirely into that gap cannot overlap the shape, so the
/// generator skips their overlap test. Faces the node does not lie against
/// have a gap of zero. Slots follow the relation order `-X -Y -Z +X +Y +Z`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SkipMask {
    gaps: [i32; 6],
}

impl SkipMask {
    pub const NONE: SkipMask = SkipMask { gaps: [0; 6] };

    /// Skip mask of a starting-layer voxel at world `location`.
    pub fn for_voxel(
        bounds: &GlobalBounds,
        rounded: &GlobalBounds,
        location: IVec3,
        layer: u8,
    ) -> Self {
        let size = NODE_SIZES[layer as usize];
        let mut gaps = [0; 6];
        for axis in Axis::ALL {
            let i = axis as usize;
            if location[i] == rounded.min[i] {
                gaps[i] = bounds.min[i] - rounded.min[i];
            }
            if location[i] + size == rounded.max[i] {
                gaps[3 + i] = rounded.max[i] - bounds.max[i];
            }
        }
        Self { gaps }
    }

    pub fn is_empty(&self) -> bool {
        self.gaps.iter().all(|&gap| gap == 0)
    }

    /// Children of size `child_size` that lie entirely inside a gap.
    pub fn skipped_children(&self, child_size: i32) -> u8 {
        let mut skipped = 0;
        for side in Direction::SIDES {
            if let Some(slot) = side.slot() {
                if self.gaps[slot] >= child_size {
                    skipped |= side.touching_children();
                }
            }
        }
        skipped
    }

    /// Mask of one child that was not skipped.
    ///
    /// The child keeps a face's gap when it sits against that face, or the
    /// rest of the gap when its sibling on that face was skipped.
    pub fn child(&self, child_index: u8, child_size: i32) -> Self {
        let mut gaps = [0; 6];
        for axis in Axis::ALL {
            let i = axis as usize;
            let positive = child_index & axis.child_bit() != 0;

            let negative_gap = self.gaps[i];
            gaps[i] = match (positive, negative_gap >= child_size) {
                (false, _) => negative_gap,
                (true, true) => negative_gap - child_size,
                (true, false) => 0,
            };

            let positive_gap = self.gaps[3 + i];
            gaps[3 + i] = match (positive, positive_gap >= child_size) {
                (true, _) => positive_gap,
                (false, true) => positive_gap - child_size,
                (false, false) => 0,
            };
        }
        Self { gaps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(min: [i32; 3], max: [i32; 3]) -> GlobalBounds {
        GlobalBounds::new(IVec3::from_array(min), IVec3::from_array(max))
    }

    #[test]
    fn test_optimal_starting_layer() {
        // 1024 wide spans two 512 nodes.
        assert_eq!(optimal_starting_layer(1024, 5), 1);
        assert_eq!(optimal_starting_layer(2048, 5), 0);
        assert_eq!(optimal_starting_layer(100, 5), 4);
        assert_eq!(optimal_starting_layer(64, 5), 5);
        assert_eq!(optimal_starting_layer(1, 5), 5);
        assert_eq!(optimal_starting_layer(1, 3), 3);
    }

    #[test]
    fn test_starting_layer_for_uses_largest() {
        let small = global([0, 0, 0], [10, 10, 10]);
        let large = global([0, 0, 0], [300, 10, 10]);
        assert_eq!(starting_layer_for([&small], 5), 5);
        assert_eq!(starting_layer_for([&small, &large, &GlobalBounds::empty()], 5), 2);
        assert_eq!(starting_layer_for([], 5), 5);
    }

    #[test]
    fn test_node_extent_and_child_location() {
        let (center, half) = node_center_half_extent(IVec3::new(-1024, 0, 512), 1);
        assert_eq!(half, Vec3::splat(256.0));
        assert_eq!(center, Vec3::new(-768.0, 256.0, 768.0));
        assert_eq!(child_location(IVec3::new(64, 0, 0), 3, 0b101), IVec3::new(192, 0, 128));
    }

    #[test]
    fn test_for_voxel_gaps() {
        // Layer 3 voxels are 128 wide.
        let bounds = global([100, 0, 0], [200, 128, 128]);
        let rounded = bounds.round_to_layer(3);
        assert_eq!(rounded, global([0, 0, 0], [256, 128, 128]));

        let first = SkipMask::for_voxel(&bounds, &rounded, IVec3::ZERO, 3);
        assert_eq!(first.gaps, [100, 0, 0, 0, 0, 0]);
        let second = SkipMask::for_voxel(&bounds, &rounded, IVec3::new(128, 0, 0), 3);
        assert_eq!(second.gaps, [0, 0, 0, 56, 0, 0]);
    }

    #[test]
    fn test_skipped_children_follow_gap() {
        // Gap of 100 on -X: the 64 wide children on -X are outside.
        let mask = SkipMask { gaps: [100, 0, 0, 0, 0, 0] };
        assert_eq!(mask.skipped_children(64), Direction::X_NEGATIVE.touching_children());

        // The +X child carries the remaining 36, which skips its 32 wide -X children.
        let child = mask.child(1, 64);
        assert_eq!(child.gaps[0], 36);
        assert_eq!(child.skipped_children(32), Direction::X_NEGATIVE.touching_children());
        let grandchild = child.child(1, 32);
        assert_eq!(grandchild.gaps[0], 4);
        assert_eq!(grandchild.skipped_children(16), 0);
        assert_eq!(grandchild.child(0, 16).gaps[0], 4);
        assert_eq!(grandchild.child(1, 16).gaps[0], 0);
    }

    #[test]
    fn test_positive_face_mirrors() {
        let mask = SkipMask { gaps: [0, 0, 0, 0, 0, 70] };
        assert_eq!(mask.skipped_children(64), Direction::Z_POSITIVE.touching_children());
        assert_eq!(mask.child(0, 64).gaps[5], 6);
        assert_eq!(mask.child(0, 64).child(4, 32).gaps[5], 6);
        assert!(mask.child(0, 64).child(0, 32).is_empty());
        assert_eq!(SkipMask::NONE.skipped_children(2), 0);
    }
}

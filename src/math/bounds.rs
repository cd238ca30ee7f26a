//! Integer axis-aligned bounds in world space or chunk-local morton space
//!
//! World-space bounds have an exclusive max. Morton-space bounds hold the
//! origins of the first and last node they cover, so their max is inclusive.

use std::marker::PhantomData;

use crate::core::types::{IVec3, Vec3};
use crate::math::aabb::Aabb;
use crate::math::direction::{Axis, Direction};
use crate::math::morton::{self, CHUNK_MASK, CHUNK_SIZE, NODE_SIZES, SMALLEST_NODE_SIZE};

/// Coordinate space of a [`Bounds`].
pub trait Space: Copy + Default + std::fmt::Debug + PartialEq + Eq {
    /// Whether `max` is part of the bounds.
    const INCLUSIVE_MAX: bool;
}

/// World space, one unit per smallest addressable step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Global;

/// Chunk-local node coordinates (0..1024 per axis).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Morton;

impl Space for Global {
    const INCLUSIVE_MAX: bool = false;
}

impl Space for Morton {
    const INCLUSIVE_MAX: bool = true;
}

/// Axis-aligned bounds with a validity flag.
///
/// Invalid bounds stand for "nothing", e.g. an occluder that was deleted. Every
/// iteration over invalid bounds is a no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Bounds<S: Space> {
    pub min: IVec3,
    pub max: IVec3,
    valid: bool,
    _space: PhantomData<S>,
}

pub type GlobalBounds = Bounds<Global>;
pub type MortonBounds = Bounds<Morton>;

impl<S: Space> Default for Bounds<S> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<S: Space> Bounds<S> {
    pub fn new(min: IVec3, max: IVec3) -> Self {
        Self { min, max, valid: true, _space: PhantomData }
    }

    /// Invalid bounds.
    pub fn empty() -> Self {
        Self { min: IVec3::ZERO, max: IVec3::ZERO, valid: false, _space: PhantomData }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// True when valid and enclosing at least one point.
    pub fn has_volume(&self) -> bool {
        self.valid
            && if S::INCLUSIVE_MAX {
                self.min.cmple(self.max).all()
            } else {
                self.min.cmplt(self.max).all()
            }
    }

    pub fn lengths(&self) -> IVec3 {
        self.max - self.min
    }

    pub fn largest_side(&self) -> i32 {
        self.lengths().max_element()
    }

    /// Component-wise clamp to `other`. Invalid when either side is invalid or
    /// the overlap has no volume.
    pub fn intersection(&self, other: &Self) -> Self {
        let mut result = Self {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
            valid: self.valid && other.valid,
            _space: PhantomData,
        };
        result.valid = result.has_volume();
        result
    }

    /// Whether `other` lies fully inside these bounds.
    pub fn contains(&self, other: &Self) -> bool {
        self.valid
            && other.valid
            && self.min.cmple(other.min).all()
            && self.max.cmpge(other.max).all()
    }
}

impl Bounds<Global> {
    /// World bounds of an occluder: min floored, max ceiled, with at least one
    /// unit on every axis so flat shapes still occupy a voxel.
    pub fn from_aabb(aabb: &Aabb) -> Self {
        if !aabb.is_valid() {
            return Self::empty();
        }
        let min = aabb.min.floor().as_ivec3();
        let mut max = aabb.max.ceil().as_ivec3();
        for axis in Axis::ALL {
            let i = axis as usize;
            if max[i] <= min[i] {
                max[i] = min[i] + 1;
            }
        }
        Self::new(min, max)
    }

    /// Bounds of a node given its world location.
    pub fn from_node(location: IVec3, layer: u8) -> Self {
        Self::new(location, location + NODE_SIZES[layer as usize])
    }

    /// Floor min and ceil max to the node size of `layer`.
    ///
    /// Max is only raised when it was not already on the grid.
    pub fn round_to_layer(&self, layer: u8) -> Self {
        if !self.valid {
            return *self;
        }
        let size = NODE_SIZES[layer as usize];
        let mask = !(size - 1);
        let mut rounded = Self::new(self.min & mask, self.max & mask);
        for axis in Axis::ALL {
            let i = axis as usize;
            if rounded.max[i] < self.max[i] {
                rounded.max[i] += size;
            }
        }
        rounded
    }

    /// Strict overlap test: touching faces do not overlap.
    pub fn has_simple_overlap(&self, other: &Self) -> bool {
        self.valid
            && other.valid
            && self.max.cmpgt(other.min).all()
            && self.min.cmplt(other.max).all()
    }

    /// Parts of these bounds not covered by `other`: up to six boxes, in the
    /// order +X, -X, +Y, -Y, +Z, -Z.
    pub fn difference(&self, other: &Self) -> Vec<Self> {
        if !self.valid {
            return Vec::new();
        }
        if !other.valid || !self.has_simple_overlap(other) {
            return vec![*self];
        }

        let mut pieces = Vec::with_capacity(6);
        let mut remaining = *self;

        if self.max.x > other.max.x {
            pieces.push(Self::new(IVec3::new(other.max.x, remaining.min.y, remaining.min.z), remaining.max));
            remaining.max.x = other.max.x;
        }
        if self.min.x < other.min.x {
            pieces.push(Self::new(remaining.min, IVec3::new(other.min.x, remaining.max.y, remaining.max.z)));
            remaining.min.x = other.min.x;
        }
        if self.max.y > other.max.y {
            pieces.push(Self::new(IVec3::new(remaining.min.x, other.max.y, remaining.min.z), remaining.max));
            remaining.max.y = other.max.y;
        }
        if self.min.y < other.min.y {
            pieces.push(Self::new(remaining.min, IVec3::new(remaining.max.x, other.min.y, remaining.max.z)));
            remaining.min.y = other.min.y;
        }
        if self.max.z > other.max.z {
            pieces.push(Self::new(IVec3::new(remaining.min.x, remaining.min.y, other.max.z), remaining.max));
        }
        if self.min.z < other.min.z {
            pieces.push(Self::new(remaining.min, IVec3::new(remaining.max.x, remaining.max.y, other.min.z)));
        }

        pieces
    }

    /// Convert to chunk-local morton space, relative to `chunk_origin`.
    pub fn to_morton_space(&self, chunk_origin: IVec3) -> MortonBounds {
        if !self.valid {
            return MortonBounds::empty();
        }
        let min = self.min - chunk_origin;
        let max = (self.max - chunk_origin - SMALLEST_NODE_SIZE).max(min);
        MortonBounds::new(min, max)
    }

    /// Calls `callback` for every chunk these bounds overlap, with the chunk
    /// key, the axes on which the chunk is the most positive one of the
    /// overlapped chunks, and the overlap in the chunk's morton space.
    ///
    /// Chunks are not created.
    pub fn for_each_chunk(&self, mut callback: impl FnMut(u64, Direction, MortonBounds)) {
        if !self.has_volume() {
            return;
        }

        let chunk_min = self.min & CHUNK_MASK;
        let chunk_max = (self.max - 1) & CHUNK_MASK;

        if chunk_min == chunk_max {
            let chunk_bounds = Self::new(chunk_min, chunk_min + CHUNK_SIZE);
            let morton_bounds = self.intersection(&chunk_bounds).to_morton_space(chunk_min);
            callback(morton::chunk_key_of(chunk_min), Direction::XYZ_POSITIVE, morton_bounds);
            return;
        }

        let mut x = chunk_min.x;
        while x <= chunk_max.x {
            let positive_x = if x == chunk_max.x { Direction::X_POSITIVE } else { Direction::NONE };
            let mut y = chunk_min.y;
            while y <= chunk_max.y {
                let positive_y = if y == chunk_max.y { Direction::Y_POSITIVE } else { Direction::NONE };
                let mut z = chunk_min.z;
                while z <= chunk_max.z {
                    let positive_z = if z == chunk_max.z { Direction::Z_POSITIVE } else { Direction::NONE };

                    let origin = IVec3::new(x, y, z);
                    let chunk_bounds = Self::new(origin, origin + CHUNK_SIZE);
                    let morton_bounds = self.intersection(&chunk_bounds).to_morton_space(origin);
                    callback(
                        morton::chunk_key_of(origin),
                        positive_x | positive_y | positive_z,
                        morton_bounds,
                    );
                    z += CHUNK_SIZE;
                }
                y += CHUNK_SIZE;
            }
            x += CHUNK_SIZE;
        }
    }

    /// Keys of every chunk these bounds overlap.
    pub fn chunk_keys(&self) -> Vec<u64> {
        let mut keys = Vec::new();
        self.for_each_chunk(|key, _, _| keys.push(key));
        keys
    }

    /// Calls `callback` with every point from min towards max in steps of
    /// `offset`, excluding max.
    pub fn for_each_point(&self, offset: i32, mut callback: impl FnMut(IVec3)) {
        if !self.has_volume() || offset <= 0 {
            return;
        }
        let mut point = self.min;
        while point.z < self.max.z {
            point.y = self.min.y;
            while point.y < self.max.y {
                point.x = self.min.x;
                while point.x < self.max.x {
                    callback(point);
                    point.x += offset;
                }
                point.y += offset;
            }
            point.z += offset;
        }
    }

    /// Center and half extents, for overlap queries.
    pub fn center_half_extent(&self) -> (Vec3, Vec3) {
        let min = self.min.as_vec3();
        let max = self.max.as_vec3();
        ((min + max) * 0.5, (max - min) * 0.5)
    }

    pub fn to_aabb(&self) -> Aabb {
        Aabb::new(self.min.as_vec3(), self.max.as_vec3())
    }
}

impl Bounds<Morton> {
    /// Snap min and max to node origins on `layer`.
    ///
    /// Max becomes the last unit of the last node instead of its origin, since
    /// a node's origin is its most negative corner.
    pub fn round_to_layer(&self, layer: u8) -> Self {
        if !self.valid {
            return *self;
        }
        let size = NODE_SIZES[layer as usize];
        let mask = !(size - 1);
        Self::new(self.min & mask, (self.max & mask) + size - 1)
    }

    /// Convert back to world space, relative to `chunk_origin`.
    pub fn to_global_space(&self, chunk_origin: IVec3) -> GlobalBounds {
        if !self.valid {
            return GlobalBounds::empty();
        }
        GlobalBounds::new(self.min + chunk_origin, self.max + SMALLEST_NODE_SIZE + chunk_origin)
    }

    /// Calls `callback` with the code of every node on `layer` within these
    /// bounds, stepping along X, then Y, then Z.
    pub fn for_each_node(&self, layer: u8, mut callback: impl FnMut(u32)) {
        if !self.has_volume() {
            return;
        }
        let rounded = self.round_to_layer(layer);
        let step = NODE_SIZES[layer as usize];
        let start = morton::encode_node_location(rounded.min);

        let mut code = start;
        let mut z = rounded.min.z;
        while z <= rounded.max.z {
            let mut y = rounded.min.y;
            while y <= rounded.max.y {
                let mut x = rounded.min.x;
                while x <= rounded.max.x {
                    callback(code);
                    code = morton::add_axis(code, layer, Axis::X);
                    x += step;
                }
                code = morton::copy_axis(code, start, Axis::X);
                code = morton::add_axis(code, layer, Axis::Y);
                y += step;
            }
            code = morton::copy_axis(code, start, Axis::Y);
            code = morton::add_axis(code, layer, Axis::Z);
            z += step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(min: [i32; 3], max: [i32; 3]) -> GlobalBounds {
        GlobalBounds::new(IVec3::from_array(min), IVec3::from_array(max))
    }

    #[test]
    fn test_from_aabb_has_minimum_extent() {
        let flat = Aabb::new(Vec3::new(1.2, 5.0, -3.7), Vec3::new(4.5, 5.0, -3.2));
        let bounds = GlobalBounds::from_aabb(&flat);
        assert_eq!(bounds.min, IVec3::new(1, 5, -4));
        assert_eq!(bounds.max, IVec3::new(5, 6, -3));
        assert!(bounds.has_volume());
    }

    #[test]
    fn test_round_to_layer_global() {
        let bounds = global([10, -10, 64], [70, 5, 128]);
        let rounded = bounds.round_to_layer(4); // 64 wide
        assert_eq!(rounded.min, IVec3::new(0, -64, 64));
        assert_eq!(rounded.max, IVec3::new(128, 64, 128));
    }

    #[test]
    fn test_round_to_layer_is_idempotent() {
        let bounds = global([-301, 17, 999], [45, 2050, 1001]);
        for layer in 0..10 {
            let once = bounds.round_to_layer(layer);
            assert_eq!(once.round_to_layer(layer), once, "layer {}", layer);
        }
        let local = MortonBounds::new(IVec3::new(3, 70, 500), IVec3::new(40, 90, 1022));
        for layer in 0..10 {
            let once = local.round_to_layer(layer);
            assert_eq!(once.round_to_layer(layer), once, "layer {}", layer);
        }
    }

    #[test]
    fn test_round_to_layer_morton() {
        let local = MortonBounds::new(IVec3::new(130, 0, 0), IVec3::new(254, 0, 0));
        let rounded = local.round_to_layer(3); // 128 wide
        assert_eq!(rounded.min, IVec3::new(128, 0, 0));
        assert_eq!(rounded.max, IVec3::new(255, 127, 127));
    }

    #[test]
    fn test_intersection() {
        let a = global([0, 0, 0], [10, 10, 10]);
        let b = global([5, -5, 2], [20, 8, 4]);
        let c = a.intersection(&b);
        assert_eq!(c, global([5, 0, 2], [10, 8, 4]));

        let far = global([50, 50, 50], [60, 60, 60]);
        assert!(!a.intersection(&far).is_valid());
        assert!(!a.intersection(&GlobalBounds::empty()).is_valid());
    }

    #[test]
    fn test_simple_overlap_is_strict() {
        let a = global([0, 0, 0], [10, 10, 10]);
        assert!(!a.has_simple_overlap(&global([10, 0, 0], [20, 10, 10])));
        assert!(a.has_simple_overlap(&global([9, 9, 9], [20, 20, 20])));
    }

    #[test]
    fn test_difference() {
        let previous = global([0, 0, 0], [30, 10, 10]);
        let current = global([10, 0, 0], [40, 10, 10]);
        let pieces = previous.difference(&current);
        assert_eq!(pieces, vec![global([0, 0, 0], [10, 10, 10])]);

        // Fully enclosed hole leaves six pieces that tile the shell.
        let outer = global([0, 0, 0], [9, 9, 9]);
        let inner = global([3, 3, 3], [6, 6, 6]);
        let shell = outer.difference(&inner);
        assert_eq!(shell.len(), 6);
        let volume: i32 = shell.iter().map(|b| b.lengths().element_product()).sum();
        assert_eq!(volume, 9 * 9 * 9 - 3 * 3 * 3);
        for piece in &shell {
            assert!(!piece.has_simple_overlap(&inner));
        }

        // No overlap or invalid other keeps the whole.
        assert_eq!(outer.difference(&global([20, 20, 20], [30, 30, 30])), vec![outer]);
        assert_eq!(outer.difference(&GlobalBounds::empty()), vec![outer]);
        assert!(GlobalBounds::empty().difference(&outer).is_empty());
        assert!(inner.difference(&outer).is_empty());
    }

    #[test]
    fn test_for_each_chunk_single() {
        let bounds = global([10, 20, 30], [100, 200, 300]);
        let mut calls = Vec::new();
        bounds.for_each_chunk(|key, positive, local| calls.push((key, positive, local)));
        assert_eq!(calls.len(), 1);
        let (key, positive, local) = calls[0];
        assert_eq!(key, morton::encode_chunk(0, 0, 0));
        assert_eq!(positive, Direction::XYZ_POSITIVE);
        assert_eq!(local.min, IVec3::new(10, 20, 30));
        assert_eq!(local.max, IVec3::new(98, 198, 298));
    }

    #[test]
    fn test_for_each_chunk_spanning() {
        let bounds = global([-512, 0, 0], [512, 1024, 2048]);
        let mut calls = Vec::new();
        bounds.for_each_chunk(|key, positive, local| calls.push((key, positive, local)));
        assert_eq!(calls.len(), 4);

        let negative_x = calls
            .iter()
            .find(|(key, _, local)| *key == morton::encode_chunk(-1024, 0, 0) && local.min.z == 0)
            .copied();
        let (_, positive, local) = negative_x.expect("chunk -1 missing");
        assert_eq!(positive, Direction::Y_POSITIVE);
        assert_eq!(local.min, IVec3::new(512, 0, 0));
        assert_eq!(local.max, IVec3::new(1022, 1022, 1022));

        let last = calls
            .iter()
            .find(|(key, _, _)| *key == morton::encode_chunk(0, 0, 1024))
            .copied();
        let (_, positive, _) = last.expect("far chunk missing");
        assert_eq!(positive, Direction::XYZ_POSITIVE);
    }

    #[test]
    fn test_invalid_bounds_are_no_ops() {
        let empty = GlobalBounds::empty();
        let mut calls = 0;
        empty.for_each_chunk(|_, _, _| calls += 1);
        empty.for_each_point(1, |_| calls += 1);
        MortonBounds::empty().for_each_node(0, |_| calls += 1);
        assert_eq!(calls, 0);
        assert!(empty.chunk_keys().is_empty());
    }

    #[test]
    fn test_for_each_node() {
        let local = MortonBounds::new(IVec3::new(0, 0, 0), IVec3::new(1022, 1022, 1022));
        let mut codes = Vec::new();
        local.for_each_node(1, |code| codes.push(code));
        assert_eq!(codes.len(), 8);
        for (i, code) in codes.iter().enumerate() {
            assert_eq!(*code, morton::child(0, 1, i as u8));
        }

        let strip = MortonBounds::new(IVec3::new(64, 128, 0), IVec3::new(254, 128, 0));
        let mut locations = Vec::new();
        strip.for_each_node(4, |code| locations.push(morton::node_location(code)));
        assert_eq!(
            locations,
            vec![
                IVec3::new(64, 128, 0),
                IVec3::new(128, 128, 0),
                IVec3::new(192, 128, 0),
            ]
        );
    }

    #[test]
    fn test_for_each_point() {
        let bounds = global([0, 0, 0], [4, 2, 2]);
        let mut points = Vec::new();
        bounds.for_each_point(2, |p| points.push(p));
        assert_eq!(points, vec![IVec3::new(0, 0, 0), IVec3::new(2, 0, 0)]);
    }

    #[test]
    fn test_morton_global_roundtrip() {
        let origin = IVec3::new(-1024, 0, 2048);
        let bounds = global([-1000, 10, 2050], [-800, 100, 2100]);
        let local = bounds.to_morton_space(origin);
        assert_eq!(local.to_global_space(origin), bounds);
    }
}

//! Morton encoding (Z-order curve) for node and chunk addressing
//!
//! Node codes are 32 bit and interleave 10 bits per axis of a position local
//! to its chunk. Chunk codes are 64 bit and interleave 21 bits per axis of the
//! chunk's world position divided by the chunk size.
//!
//! Offsetting a single axis works directly on the interleaved value: fill the
//! bits of the two other axes with ones, add a power of two, and the carry
//! ripples through the target axis only.

use crate::core::types::IVec3;
use crate::math::direction::{Axis, Direction};

/// Number of layers in a chunk's octree. Layer 0 is the chunk-sized root.
pub const MAX_DEPTH: u8 = 10;

/// Edge length of a chunk in world units.
pub const CHUNK_SIZE: i32 = 1024;

/// Log2 of `CHUNK_SIZE`.
pub const CHUNK_SHIFT: u32 = 10;

/// Masks a world coordinate down to the origin of its chunk.
pub const CHUNK_MASK: i32 = !(CHUNK_SIZE - 1);

/// Edge length of a node per layer.
pub const NODE_SIZES: [i32; MAX_DEPTH as usize] = [1024, 512, 256, 128, 64, 32, 16, 8, 4, 2];

/// Half edge length of a node per layer.
pub const NODE_HALF_SIZES: [i32; MAX_DEPTH as usize] = [512, 256, 128, 64, 32, 16, 8, 4, 2, 1];

/// Size of the nodes on the deepest layer.
pub const SMALLEST_NODE_SIZE: i32 = NODE_SIZES[MAX_DEPTH as usize - 1];

pub const NODE_MASK_X: u32 = 0b00001001001001001001001001001001;
pub const NODE_MASK_Y: u32 = NODE_MASK_X << 1;
pub const NODE_MASK_Z: u32 = NODE_MASK_X << 2;
const NODE_MASK_XY: u32 = NODE_MASK_X | NODE_MASK_Y;
const NODE_MASK_XZ: u32 = NODE_MASK_X | NODE_MASK_Z;
const NODE_MASK_YZ: u32 = NODE_MASK_Y | NODE_MASK_Z;

pub const CHUNK_MASK_X: u64 = 0x1249249249249249;
pub const CHUNK_MASK_Y: u64 = CHUNK_MASK_X << 1;
pub const CHUNK_MASK_Z: u64 = CHUNK_MASK_X << 2;
const CHUNK_MASK_XY: u64 = CHUNK_MASK_X | CHUNK_MASK_Y;
const CHUNK_MASK_XZ: u64 = CHUNK_MASK_X | CHUNK_MASK_Z;
const CHUNK_MASK_YZ: u64 = CHUNK_MASK_Y | CHUNK_MASK_Z;

/// Shifts a world coordinate into the non-negative range before encoding.
/// A multiple of the chunk size, so chunk origins stay aligned.
pub const CHUNK_ENCODE_OFFSET: u32 = 0b00111111111111111111110000000000;

/// Single-axis offset of one node per layer, in morton space.
pub const LAYER_OFFSETS: [u32; MAX_DEPTH as usize] = [
    1 << 30, 1 << 27, 1 << 24, 1 << 21, 1 << 18,
    1 << 15, 1 << 12, 1 << 9, 1 << 6, 1 << 3,
];

/// Clears every bit below a layer, giving the code of the node on that layer
/// which contains the input.
pub const LAYER_MASKS: [u32; MAX_DEPTH as usize] = [
    !((1 << 30) - 1), !((1 << 27) - 1), !((1 << 24) - 1), !((1 << 21) - 1), !((1 << 18) - 1),
    !((1 << 15) - 1), !((1 << 12) - 1), !((1 << 9) - 1), !((1 << 6) - 1), !((1 << 3) - 1),
];

// Interleaving steps: each one doubles the gap between bit groups. Spreading
// walks the masks from widest group to narrowest, compacting walks back.
const CHUNK_SPREAD_SHIFTS: [u32; 5] = [32, 16, 8, 4, 2];
const CHUNK_SPREAD_MASKS: [u64; 6] = [
    0x1f_ffff,
    0x1f00000000ffff,
    0x1f0000ff0000ff,
    0x100f00f00f00f00f,
    0x10c30c30c30c30c3,
    CHUNK_MASK_X,
];

const NODE_SPREAD_SHIFTS: [u32; 4] = [16, 8, 4, 2];
const NODE_SPREAD_MASKS: [u32; 5] = [0x3ff, 0x030000ff, 0x0300f00f, 0x030c30c3, NODE_MASK_X];

/// 21 bit chunk axis onto every third bit
fn spread_chunk_axis(value: u32) -> u64 {
    CHUNK_SPREAD_SHIFTS
        .iter()
        .zip(&CHUNK_SPREAD_MASKS[1..])
        .fold(u64::from(value) & CHUNK_SPREAD_MASKS[0], |x, (&shift, &mask)| (x | x << shift) & mask)
}

fn compact_chunk_axis(code: u64) -> u32 {
    CHUNK_SPREAD_SHIFTS
        .iter()
        .zip(&CHUNK_SPREAD_MASKS[..5])
        .rev()
        .fold(code & CHUNK_MASK_X, |x, (&shift, &mask)| (x | x >> shift) & mask) as u32
}

/// 10 bit node axis onto every third bit
fn spread_node_axis(value: u16) -> u32 {
    NODE_SPREAD_SHIFTS
        .iter()
        .zip(&NODE_SPREAD_MASKS[1..])
        .fold(u32::from(value) & NODE_SPREAD_MASKS[0], |x, (&shift, &mask)| (x | x << shift) & mask)
}

fn compact_node_axis(code: u32) -> u16 {
    NODE_SPREAD_SHIFTS
        .iter()
        .zip(&NODE_SPREAD_MASKS[..4])
        .rev()
        .fold(code & NODE_MASK_X, |x, (&shift, &mask)| (x | x >> shift) & mask) as u16
}

// --- Node codes ---

/// Encode chunk-local coordinates (0..1024 per axis) into a node code.
pub fn encode_node(x: u16, y: u16, z: u16) -> u32 {
    spread_node_axis(x) | (spread_node_axis(y) << 1) | (spread_node_axis(z) << 2)
}

/// Decode a node code back into chunk-local coordinates.
pub fn decode_node(code: u32) -> (u16, u16, u16) {
    (
        compact_node_axis(code),
        compact_node_axis(code >> 1),
        compact_node_axis(code >> 2),
    )
}

/// Chunk-local location of a node as a vector.
pub fn node_location(code: u32) -> IVec3 {
    let (x, y, z) = decode_node(code);
    IVec3::new(x as i32, y as i32, z as i32)
}

/// Node code of a chunk-local location. Components are masked to 10 bits.
pub fn encode_node_location(location: IVec3) -> u32 {
    encode_node(
        (location.x & 0x3ff) as u16,
        (location.y & 0x3ff) as u16,
        (location.z & 0x3ff) as u16,
    )
}

const fn axis_masks(axis: Axis) -> (u32, u32) {
    match axis {
        Axis::X => (NODE_MASK_X, NODE_MASK_YZ),
        Axis::Y => (NODE_MASK_Y, NODE_MASK_XZ),
        Axis::Z => (NODE_MASK_Z, NODE_MASK_XY),
    }
}

/// Add the node size of `layer` to one axis. Wraps to zero past the chunk edge.
#[inline]
pub fn add_axis(code: u32, layer: u8, axis: Axis) -> u32 {
    let (target, others) = axis_masks(axis);
    let sum = (code | others).wrapping_add(LAYER_OFFSETS[layer as usize]);
    (sum & target) | (code & others)
}

/// Subtract the node size of `layer` from one axis. Wraps below zero.
#[inline]
pub fn subtract_axis(code: u32, layer: u8, axis: Axis) -> u32 {
    let (target, others) = axis_masks(axis);
    let diff = (code & target).wrapping_sub(LAYER_OFFSETS[layer as usize]);
    (diff & target) | (code & others)
}

/// Replace one axis of `lhs` with the same axis of `rhs`.
#[inline]
pub fn copy_axis(lhs: u32, rhs: u32, axis: Axis) -> u32 {
    let (target, others) = axis_masks(axis);
    (lhs & others) | (rhs & target)
}

#[inline]
pub fn axis_is_zero(code: u32, axis: Axis) -> bool {
    code & axis_masks(axis).0 == 0
}

/// Move one node of `layer` in a single direction.
pub fn move_node(code: u32, layer: u8, direction: Direction) -> u32 {
    match direction.axis() {
        Some(axis) if direction.is_positive() => add_axis(code, layer, axis),
        Some(axis) => subtract_axis(code, layer, axis),
        None => code,
    }
}

/// Code of the ancestor on `parent_layer`.
#[inline]
pub fn parent(code: u32, parent_layer: u8) -> u32 {
    code & LAYER_MASKS[parent_layer as usize]
}

/// Index (0..8) of a node within its parent.
#[inline]
pub fn child_index(code: u32, layer: u8) -> u8 {
    ((code >> (30 - 3 * layer as u32)) & 0b111) as u8
}

/// Code of one child. Bit 0 of the index offsets X, bit 1 Y, bit 2 Z.
pub fn child(parent_code: u32, child_layer: u8, child_index: u8) -> u32 {
    let mut code = parent_code;
    for axis in Axis::ALL {
        if child_index & axis.child_bit() != 0 {
            code |= add_axis(parent_code, child_layer, axis) & axis_masks(axis).0;
        }
    }
    code
}

/// Codes of all eight children, indexed by child index.
pub fn children(parent_code: u32, child_layer: u8) -> [u32; 8] {
    let added_x = add_axis(parent_code, child_layer, Axis::X);
    let added_y = add_axis(parent_code, child_layer, Axis::Y);
    let added_z = add_axis(parent_code, child_layer, Axis::Z);
    [
        parent_code,
        added_x,
        added_y,
        added_x | added_y,
        added_z,
        added_x | added_z,
        added_y | added_z,
        added_x | added_y | added_z,
    ]
}

/// Chunk faces touched by a node.
pub fn chunk_border(code: u32, layer: u8) -> Direction {
    let location = node_location(code);
    let far = CHUNK_SIZE - NODE_SIZES[layer as usize];
    let mut border = Direction::NONE;
    for axis in Axis::ALL {
        let value = location[axis as usize];
        if value == 0 {
            border |= Direction::from_axis(axis, false);
        }
        if value == far {
            border |= Direction::from_axis(axis, true);
        }
    }
    border
}

// --- Chunk codes ---

fn encode_chunk_axis(value: i32) -> u32 {
    (value as u32).wrapping_add(CHUNK_ENCODE_OFFSET) >> CHUNK_SHIFT
}

fn decode_chunk_axis(value: u32) -> i32 {
    ((value as i64) << CHUNK_SHIFT).wrapping_sub(CHUNK_ENCODE_OFFSET as i64) as i32
}

/// Encode a world position into the code of the chunk containing it.
///
/// Valid for coordinates between -1073740800 and +1073742847 on each axis.
pub fn encode_chunk(x: i32, y: i32, z: i32) -> u64 {
    spread_chunk_axis(encode_chunk_axis(x))
        | (spread_chunk_axis(encode_chunk_axis(y)) << 1)
        | (spread_chunk_axis(encode_chunk_axis(z)) << 2)
}

/// Decode a chunk code back into the world position of the chunk's origin.
pub fn decode_chunk(code: u64) -> (i32, i32, i32) {
    (
        decode_chunk_axis(compact_chunk_axis(code)),
        decode_chunk_axis(compact_chunk_axis(code >> 1)),
        decode_chunk_axis(compact_chunk_axis(code >> 2)),
    )
}

/// Code of the chunk containing a world position.
pub fn chunk_key_of(position: IVec3) -> u64 {
    encode_chunk(position.x, position.y, position.z)
}

/// World position of a chunk's most negative corner.
pub fn chunk_origin(key: u64) -> IVec3 {
    let (x, y, z) = decode_chunk(key);
    IVec3::new(x, y, z)
}

const fn chunk_axis_masks(axis: Axis) -> (u64, u64) {
    match axis {
        Axis::X => (CHUNK_MASK_X, CHUNK_MASK_YZ),
        Axis::Y => (CHUNK_MASK_Y, CHUNK_MASK_XZ),
        Axis::Z => (CHUNK_MASK_Z, CHUNK_MASK_XY),
    }
}

/// Move one chunk positively along an axis.
#[inline]
pub fn increment_chunk(code: u64, axis: Axis) -> u64 {
    let (target, others) = chunk_axis_masks(axis);
    let sum = (code | others).wrapping_add(1);
    (sum & target) | (code & others)
}

/// Move one chunk negatively along an axis.
#[inline]
pub fn decrement_chunk(code: u64, axis: Axis) -> u64 {
    let (target, others) = chunk_axis_masks(axis);
    let diff = (code & target).wrapping_sub(1);
    (diff & target) | (code & others)
}

/// Replace one axis of `lhs` with the same axis of `rhs`.
#[inline]
pub fn copy_chunk_axis(lhs: u64, rhs: u64, axis: Axis) -> u64 {
    let (target, others) = chunk_axis_masks(axis);
    (lhs & others) | (rhs & target)
}

/// Move one chunk in a single direction.
pub fn move_chunk(code: u64, direction: Direction) -> u64 {
    match direction.axis() {
        Some(axis) if direction.is_positive() => increment_chunk(code, axis),
        Some(axis) => decrement_chunk(code, axis),
        None => code,
    }
}

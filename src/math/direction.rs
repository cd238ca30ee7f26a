//! Axis directions within the navmesh
//!
//! Directions use 6 bits laid out as `-X -Y -Z +X +Y +Z` from the high bit down,
//! so `0b001100` is negative on Z and positive on X.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

/// Cartesian axis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Bit of this axis in a child index (bit 0=x, bit 1=y, bit 2=z)
    pub const fn child_bit(self) -> u8 {
        match self {
            Axis::X => 1,
            Axis::Y => 2,
            Axis::Z => 4,
        }
    }
}

/// 6-bit set of directions
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Direction(u8);

impl Direction {
    pub const NONE: Direction = Direction(0b000000);
    pub const X_NEGATIVE: Direction = Direction(0b100000);
    pub const Y_NEGATIVE: Direction = Direction(0b010000);
    pub const Z_NEGATIVE: Direction = Direction(0b001000);
    pub const X_POSITIVE: Direction = Direction(0b000100);
    pub const Y_POSITIVE: Direction = Direction(0b000010);
    pub const Z_POSITIVE: Direction = Direction(0b000001);
    pub const XYZ_NEGATIVE: Direction = Direction(0b111000);
    pub const XYZ_POSITIVE: Direction = Direction(0b000111);
    pub const ALL: Direction = Direction(0b111111);

    /// The six single directions, in relation-slot order.
    pub const SIDES: [Direction; 6] = [
        Direction::X_NEGATIVE,
        Direction::Y_NEGATIVE,
        Direction::Z_NEGATIVE,
        Direction::X_POSITIVE,
        Direction::Y_POSITIVE,
        Direction::Z_POSITIVE,
    ];

    pub const NEGATIVE_SIDES: [Direction; 3] = [
        Direction::X_NEGATIVE,
        Direction::Y_NEGATIVE,
        Direction::Z_NEGATIVE,
    ];

    pub const POSITIVE_SIDES: [Direction; 3] = [
        Direction::X_POSITIVE,
        Direction::Y_POSITIVE,
        Direction::Z_POSITIVE,
    ];

    pub const fn from_bits(bits: u8) -> Self {
        Direction(bits & 0b111111)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Direction) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub const fn intersects(self, other: Direction) -> bool {
        self.0 & other.0 != 0
    }

    /// The single direction for one side of an axis.
    pub const fn from_axis(axis: Axis, positive: bool) -> Direction {
        match (axis, positive) {
            (Axis::X, false) => Direction::X_NEGATIVE,
            (Axis::Y, false) => Direction::Y_NEGATIVE,
            (Axis::Z, false) => Direction::Z_NEGATIVE,
            (Axis::X, true) => Direction::X_POSITIVE,
            (Axis::Y, true) => Direction::Y_POSITIVE,
            (Axis::Z, true) => Direction::Z_POSITIVE,
        }
    }

    /// Axis of a single direction. `None` for sets of several directions.
    pub const fn axis(self) -> Option<Axis> {
        match self.0 {
            0b100000 | 0b000100 => Some(Axis::X),
            0b010000 | 0b000010 => Some(Axis::Y),
            0b001000 | 0b000001 => Some(Axis::Z),
            _ => None,
        }
    }

    pub const fn is_positive(self) -> bool {
        self.0 & Direction::XYZ_POSITIVE.0 != 0
    }

    /// Mirrors every direction in the set: `-X` becomes `+X` and so on.
    pub const fn opposite(self) -> Direction {
        Direction(((self.0 & 0b111000) >> 3) | ((self.0 & 0b000111) << 3))
    }

    /// Slot of a single direction in the relation order `-X -Y -Z +X +Y +Z`.
    pub const fn slot(self) -> Option<usize> {
        match self.0 {
            0b100000 => Some(0),
            0b010000 => Some(1),
            0b001000 => Some(2),
            0b000100 => Some(3),
            0b000010 => Some(4),
            0b000001 => Some(5),
            _ => None,
        }
    }

    /// Single directions contained in this set.
    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Direction::SIDES.into_iter().filter(move |side| self.intersects(*side))
    }

    /// Children of a node that lie against this side of their parent.
    pub const fn touching_children(self) -> u8 {
        match self.0 {
            0b100000 => child_masks::SET_X_NEGATIVE,
            0b010000 => child_masks::SET_Y_NEGATIVE,
            0b001000 => child_masks::SET_Z_NEGATIVE,
            0b000100 => child_masks::SET_X_POSITIVE,
            0b000010 => child_masks::SET_Y_POSITIVE,
            0b000001 => child_masks::SET_Z_POSITIVE,
            _ => 0,
        }
    }

    /// Chunk border of a child, derived from the border of its parent.
    ///
    /// A child can only touch the faces its parent touches.
    pub const fn child_border(parent_border: Direction, child_index: u8) -> Direction {
        if parent_border.0 == 0 {
            return Direction::NONE;
        }
        let mut border = 0;
        border |= if child_index & 1 != 0 { 0b000100 } else { 0b100000 };
        border |= if child_index & 2 != 0 { 0b000010 } else { 0b010000 };
        border |= if child_index & 4 != 0 { 0b000001 } else { 0b001000 };
        Direction(border & parent_border.0)
    }
}

/// Bit masks to select the children of a node against one of its sides.
pub mod child_masks {
    pub const SET_X_NEGATIVE: u8 = 0b01010101;
    pub const SET_Y_NEGATIVE: u8 = 0b00110011;
    pub const SET_Z_NEGATIVE: u8 = 0b00001111;
    pub const SET_X_POSITIVE: u8 = 0b10101010;
    pub const SET_Y_POSITIVE: u8 = 0b11001100;
    pub const SET_Z_POSITIVE: u8 = 0b11110000;

    pub const CLEAR_X_NEGATIVE: u8 = !SET_X_NEGATIVE;
    pub const CLEAR_Y_NEGATIVE: u8 = !SET_Y_NEGATIVE;
    pub const CLEAR_Z_NEGATIVE: u8 = !SET_Z_NEGATIVE;
    pub const CLEAR_X_POSITIVE: u8 = !SET_X_POSITIVE;
    pub const CLEAR_Y_POSITIVE: u8 = !SET_Y_POSITIVE;
    pub const CLEAR_Z_POSITIVE: u8 = !SET_Z_POSITIVE;
}

impl BitOr for Direction {
    type Output = Direction;
    fn bitor(self, rhs: Direction) -> Direction {
        Direction(self.0 | rhs.0)
    }
}

impl BitOrAssign for Direction {
    fn bitor_assign(&mut self, rhs: Direction) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Direction {
    type Output = Direction;
    fn bitand(self, rhs: Direction) -> Direction {
        Direction(self.0 & rhs.0)
    }
}

impl BitAndAssign for Direction {
    fn bitand_assign(&mut self, rhs: Direction) {
        self.0 &= rhs.0;
    }
}

impl Not for Direction {
    type Output = Direction;
    fn not(self) -> Direction {
        Direction(!self.0 & 0b111111)
    }
}

impl fmt::Debug for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Direction({:#08b})", self.0)
    }
}

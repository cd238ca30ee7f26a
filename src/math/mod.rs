//! Mathematical utilities: morton codes, directions and bounds

pub mod aabb;
pub mod bounds;
pub mod direction;
pub mod morton;

pub use aabb::Aabb;
pub use bounds::{Bounds, GlobalBounds, MortonBounds};
pub use direction::{Axis, Direction};

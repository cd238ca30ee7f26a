//! Rasterization of occluders into the navmesh: generation, incremental
//! updates and neighbour relations

pub mod generator;
pub mod layer;
pub mod occluder;
pub mod oracle;
pub mod resolver;
pub mod staging;
pub mod updater;

pub use generator::{GenerationSummary, Generator};
pub use occluder::{Occluder, OccluderId};
pub use oracle::{BoxOracle, CollisionOracle};
pub use staging::{StagedChange, StagedChanges};
pub use updater::{UpdateSummary, Updater};

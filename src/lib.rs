//! Navoctree - chunked sparse voxel occlusion octree for sound propagation

pub mod core;
pub mod math;
pub mod navmesh;
pub mod rasterize;
pub mod streaming;
pub mod service;

pub use service::{NavmeshService, OcclusionNavmesh, UpdateSignal};

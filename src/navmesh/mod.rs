//! Navmesh data model: nodes, chunks and the chunk map

pub mod chunk;
pub mod config;
pub mod mesh;
pub mod node;
pub mod relations;

pub use chunk::{Chunk, LayerMap};
pub use config::NavmeshConfig;
pub use mesh::Navmesh;
pub use node::Node;
pub use relations::{LAYER_EMPTY, LAYER_PARENT, NodeState, Relation, Relations};

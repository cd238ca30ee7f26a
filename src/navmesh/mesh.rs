//! Sparse chunk map that makes up the navmesh

use std::collections::BTreeMap;

use crate::math::morton::MAX_DEPTH;
use crate::navmesh::chunk::Chunk;
use crate::navmesh::node::Node;
use crate::navmesh::relations::NodeState;

/// All chunks of a navmesh keyed by chunk morton code.
///
/// Chunks exist only while at least one of their trees has a root.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Navmesh {
    chunks: BTreeMap<u64, Chunk>,
}

impl Navmesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk(&self, key: u64) -> Option<&Chunk> {
        self.chunks.get(&key)
    }

    pub fn chunk_mut(&mut self, key: u64) -> Option<&mut Chunk> {
        self.chunks.get_mut(&key)
    }

    pub fn contains_chunk(&self, key: u64) -> bool {
        self.chunks.contains_key(&key)
    }

    /// Get the chunk, creating an empty one when missing
    pub fn get_or_init_chunk(&mut self, key: u64) -> &mut Chunk {
        self.chunks.entry(key).or_insert_with(|| Chunk::new(key))
    }

    /// Insert a chunk under its own key, returning the chunk it replaced.
    pub fn insert_chunk(&mut self, chunk: Chunk) -> Option<Chunk> {
        self.chunks.insert(chunk.key(), chunk)
    }

    pub fn remove_chunk(&mut self, key: u64) -> Option<Chunk> {
        self.chunks.remove(&key)
    }

    /// Store a chunk after an edit, or drop it when the edit emptied it.
    pub fn commit_chunk(&mut self, chunk: Chunk) {
        if chunk.is_empty() {
            self.chunks.remove(&chunk.key());
        } else {
            self.chunks.insert(chunk.key(), chunk);
        }
    }

    /// Iterate over chunks in key order
    pub fn chunks(&self) -> impl Iterator<Item = (&u64, &Chunk)> {
        self.chunks.iter()
    }

    pub fn chunk_keys(&self) -> impl Iterator<Item = u64> + '_ {
        self.chunks.keys().copied()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    /// Look up a node by its full address
    pub fn find_node(&self, key: u64, layer: u8, morton: u32, state: NodeState) -> Option<&Node> {
        self.chunks.get(&key)?.get_node(morton, layer, state)
    }

    /// Total nodes over every chunk and both trees
    pub fn node_count(&self) -> usize {
        self.chunks.values().map(Chunk::node_count).sum()
    }

    /// Node count per layer over every chunk for one tree
    pub fn nodes_per_layer(&self, state: NodeState) -> [usize; MAX_DEPTH as usize] {
        let mut totals = [0; MAX_DEPTH as usize];
        for chunk in self.chunks.values() {
            for (total, count) in totals.iter_mut().zip(chunk.nodes_per_layer(state)) {
                *total += count;
            }
        }
        totals
    }
}

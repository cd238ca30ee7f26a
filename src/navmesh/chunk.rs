//! Chunk: a fixed-size cube of world space holding one octree per node state

use std::collections::BTreeMap;

use crate::core::types::IVec3;
use crate::math::morton::{self, MAX_DEPTH};
use crate::navmesh::node::Node;
use crate::navmesh::relations::NodeState;

/// Nodes of one layer keyed by morton code. Ordered so iteration runs from the
/// most negative node towards the most positive one.
pub type LayerMap = BTreeMap<u32, Node>;

type Layers = [LayerMap; MAX_DEPTH as usize];

/// Runtime chunk. Nodes are addressed by `(layer, morton, state)` and never by
/// reference across calls.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    key: u64,
    origin: IVec3,
    layers: [Layers; 2],
}

impl Chunk {
    /// Create an empty chunk for a chunk key
    pub fn new(key: u64) -> Self {
        Self {
            key,
            origin: morton::chunk_origin(key),
            layers: Default::default(),
        }
    }

    /// Get chunk key
    pub fn key(&self) -> u64 {
        self.key
    }

    /// World position of the most negative corner
    pub fn origin(&self) -> IVec3 {
        self.origin
    }

    pub fn layer(&self, layer: u8, state: NodeState) -> &LayerMap {
        &self.layers[state.index()][layer as usize]
    }

    pub fn layer_mut(&mut self, layer: u8, state: NodeState) -> &mut LayerMap {
        &mut self.layers[state.index()][layer as usize]
    }

    pub fn get_node(&self, morton: u32, layer: u8, state: NodeState) -> Option<&Node> {
        self.layer(layer, state).get(&morton)
    }

    pub fn get_node_mut(&mut self, morton: u32, layer: u8, state: NodeState) -> Option<&mut Node> {
        self.layer_mut(layer, state).get_mut(&morton)
    }

    pub fn contains_node(&self, morton: u32, layer: u8, state: NodeState) -> bool {
        self.layer(layer, state).contains_key(&morton)
    }

    /// Get the node, creating it when missing. Returns whether it was created.
    pub fn get_or_init_node(
        &mut self,
        morton: u32,
        layer: u8,
        state: NodeState,
        sound_preset_id: u16,
    ) -> (&mut Node, bool) {
        let nodes = self.layer_mut(layer, state);
        let inserted = !nodes.contains_key(&morton);
        let node = nodes.entry(morton).or_insert_with(|| Node::new(sound_preset_id));
        (node, inserted)
    }

    /// Remove a single node without touching its parent or children.
    pub fn erase_node(&mut self, morton: u32, layer: u8, state: NodeState) -> Option<Node> {
        self.layer_mut(layer, state).remove(&morton)
    }

    /// Create the node if missing, and when it was created make sure every
    /// ancestor exists and has the child bit for this branch set.
    ///
    /// Stops climbing at the first ancestor that already existed.
    pub fn init_node_and_parents(
        &mut self,
        morton: u32,
        layer: u8,
        state: NodeState,
        sound_preset_id: u16,
    ) -> bool {
        let (_, inserted) = self.get_or_init_node(morton, layer, state, sound_preset_id);
        if inserted && layer > 0 {
            self.init_parents(morton, layer, state, sound_preset_id);
        }
        inserted
    }

    fn init_parents(&mut self, morton: u32, layer: u8, state: NodeState, sound_preset_id: u16) {
        let parent_layer = layer - 1;
        let parent_morton = morton::parent(morton, parent_layer);
        let (parent, inserted) = self.get_or_init_node(parent_morton, parent_layer, state, sound_preset_id);
        parent.set_child(morton::child_index(morton, layer), state);

        if inserted && parent_layer > 0 {
            self.init_parents(parent_morton, parent_layer, state, sound_preset_id);
        }
    }

    /// Raise the sound preset of a node and every ancestor to at least
    /// `sound_preset_id`. Missing nodes end the walk.
    pub fn raise_sound_preset(&mut self, mut morton: u32, mut layer: u8, state: NodeState, sound_preset_id: u16) {
        while let Some(node) = self.get_node_mut(morton, layer, state) {
            node.sound_preset_id = node.sound_preset_id.max(sound_preset_id);
            if layer == 0 {
                break;
            }
            layer -= 1;
            morton = morton::parent(morton, layer);
        }
    }

    /// Erase every descendant of a node and clear its children mask.
    /// The node itself stays.
    pub fn clear_children(&mut self, morton: u32, layer: u8, state: NodeState) {
        let Some(children) = self.get_node(morton, layer, state).map(|node| node.children) else {
            return;
        };
        if children == 0 {
            return;
        }
        let child_layer = layer + 1;
        for (index, child_morton) in morton::children(morton, child_layer).into_iter().enumerate() {
            if children >> index & 1 == 0 {
                continue;
            }
            self.clear_children(child_morton, child_layer, state);
            self.erase_node(child_morton, child_layer, state);
        }
        if let Some(node) = self.get_node_mut(morton, layer, state) {
            node.children = 0;
            node.children_kinds = 0;
        }
    }

    /// Erase a node with its whole subtree and clear its bit on the parent.
    /// Returns false when the node did not exist.
    pub fn remove_node(&mut self, morton: u32, layer: u8, state: NodeState) -> bool {
        if !self.contains_node(morton, layer, state) {
            return false;
        }
        self.clear_children(morton, layer, state);
        self.erase_node(morton, layer, state);

        if layer > 0 {
            let parent_layer = layer - 1;
            let parent_morton = morton::parent(morton, parent_layer);
            if let Some(parent) = self.get_node_mut(parent_morton, parent_layer, state) {
                parent.clear_child(morton::child_index(morton, layer));
            }
        }
        true
    }

    /// Root node of one tree
    pub fn root(&self, state: NodeState) -> Option<&Node> {
        self.get_node(0, 0, state)
    }

    /// True when no node of any state is left
    pub fn is_empty(&self) -> bool {
        self.layers.iter().flatten().all(|nodes| nodes.is_empty())
    }

    /// Total number of nodes across both trees
    pub fn node_count(&self) -> usize {
        self.layers.iter().flatten().map(|nodes| nodes.len()).sum()
    }

    /// Node count per layer for one tree
    pub fn nodes_per_layer(&self, state: NodeState) -> [usize; MAX_DEPTH as usize] {
        let mut counts = [0; MAX_DEPTH as usize];
        for (count, nodes) in counts.iter_mut().zip(&self.layers[state.index()]) {
            *count = nodes.len();
        }
        counts
    }

    /// All node keys of one tree, coarse layers first, each layer in morton order
    pub fn node_keys(&self, state: NodeState) -> Vec<(u8, u32)> {
        let mut keys = Vec::with_capacity(self.node_count());
        for (layer, nodes) in self.layers[state.index()].iter().enumerate() {
            keys.extend(nodes.keys().map(|&morton| (layer as u8, morton)));
        }
        keys
    }

    /// Iterate over `(layer, morton, node)` of one tree in the same order as
    /// [`Chunk::node_keys`].
    pub fn nodes(&self, state: NodeState) -> impl Iterator<Item = (u8, u32, &Node)> {
        self.layers[state.index()]
            .iter()
            .enumerate()
            .flat_map(|(layer, nodes)| nodes.iter().map(move |(&morton, node)| (layer as u8, morton, node)))
    }

    /// Drop every node of one tree
    pub fn clear_state(&mut self, state: NodeState) {
        for nodes in self.layers[state.index()].iter_mut() {
            nodes.clear();
        }
    }
}

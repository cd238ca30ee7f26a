//! Neighbour relation resolution.
//!
//! Each node looks for its neighbour on the three negative sides only: one
//! step over, then up the layers until a node is found. The neighbour gets the
//! reverse relation on its positive side, so positive sides are filled in by
//! the nodes that lie beyond them.

use std::collections::BTreeSet;

use crate::math::direction::Direction;
use crate::math::morton::{self, MAX_DEPTH};
use crate::navmesh::mesh::Navmesh;
use crate::navmesh::relations::NodeState;

/// What a negative-side lookup found
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Neighbour {
    /// No chunk on that side, or nothing up to its root
    Empty,
    /// Free space that shares the node's parent
    Parent,
    Node {
        key: u64,
        layer: u8,
        morton: u32,
        state: NodeState,
    },
}

/// Reset and resolve the relations of every chunk.
pub fn resolve_all(navmesh: &mut Navmesh) {
    let keys: Vec<u64> = navmesh.chunk_keys().collect();
    for &key in &keys {
        reset_chunk(navmesh, key);
    }
    for &key in &keys {
        resolve_chunk(navmesh, key);
    }
}

/// Resolve relations after the chunks in `touched` changed.
///
/// Touched chunks are reset and resolved in full. Neighbouring chunks only get
/// the slots facing a touched chunk rebuilt, which gives the same result as
/// [`resolve_all`]. Keys of chunks that were removed are fine too.
pub fn resolve_chunks(navmesh: &mut Navmesh, touched: &BTreeSet<u64>) {
    for &key in touched {
        reset_chunk(navmesh, key);
    }

    // Slots of untouched neighbours that point into a touched chunk
    let mut border_work = Vec::new();
    for &key in touched {
        for side in Direction::SIDES {
            let neighbour = morton::move_chunk(key, side);
            if touched.contains(&neighbour) || !navmesh.contains_chunk(neighbour) {
                continue;
            }
            clear_border_slots(navmesh, neighbour, side.opposite());
            if side.is_positive() {
                border_work.push((neighbour, side.opposite()));
            }
        }
    }

    for &key in touched {
        if navmesh.contains_chunk(key) {
            resolve_chunk(navmesh, key);
        }
    }
    for (key, direction) in border_work {
        resolve_border(navmesh, key, direction);
    }
}

fn reset_chunk(navmesh: &mut Navmesh, key: u64) {
    let Some(chunk) = navmesh.chunk_mut(key) else {
        return;
    };
    for state in NodeState::ALL {
        for layer in 0..MAX_DEPTH {
            for node in chunk.layer_mut(layer, state).values_mut() {
                node.relations.clear_all();
            }
        }
    }
}

/// Clear one slot on every node of a chunk that touches the chunk face on
/// that side.
fn clear_border_slots(navmesh: &mut Navmesh, key: u64, direction: Direction) {
    let Some(chunk) = navmesh.chunk_mut(key) else {
        return;
    };
    for state in NodeState::ALL {
        for layer in 0..MAX_DEPTH {
            for (&code, node) in chunk.layer_mut(layer, state).iter_mut() {
                if morton::chunk_border(code, layer).contains(direction) {
                    node.relations.clear(direction);
                }
            }
        }
    }
}

fn resolve_chunk(navmesh: &mut Navmesh, key: u64) {
    for state in NodeState::ALL {
        let nodes = match navmesh.chunk(key) {
            Some(chunk) => chunk.node_keys(state),
            None => return,
        };
        for (layer, code) in nodes {
            for direction in Direction::NEGATIVE_SIDES {
                resolve_node(navmesh, key, layer, code, state, direction);
            }
        }
    }
}

/// Resolve one negative side for the nodes of a chunk lying against it.
fn resolve_border(navmesh: &mut Navmesh, key: u64, direction: Direction) {
    for state in NodeState::ALL {
        let nodes = match navmesh.chunk(key) {
            Some(chunk) => chunk.node_keys(state),
            None => return,
        };
        for (layer, code) in nodes {
            if morton::chunk_border(code, layer).contains(direction) {
                resolve_node(navmesh, key, layer, code, state, direction);
            }
        }
    }
}

fn resolve_node(navmesh: &mut Navmesh, key: u64, layer: u8, code: u32, state: NodeState, direction: Direction) {
    let neighbour = find_neighbour(navmesh, key, layer, code, direction);

    if let Some(node) = navmesh.chunk_mut(key).and_then(|chunk| chunk.get_node_mut(code, layer, state)) {
        match neighbour {
            Neighbour::Empty => node.relations.clear(direction),
            Neighbour::Parent => node.relations.set_parent(direction),
            Neighbour::Node { layer: found_layer, state: found_state, .. } => {
                node.relations.set(direction, found_layer, found_state)
            }
        }
    }

    if let Neighbour::Node { key: found_key, layer: found_layer, morton: found_code, state: found_state } = neighbour {
        debug_assert!(found_layer <= layer);
        if let Some(found) = navmesh
            .chunk_mut(found_key)
            .and_then(|chunk| chunk.get_node_mut(found_code, found_layer, found_state))
        {
            found.relations.merge(direction.opposite(), layer, state);
        }
    }
}

fn find_neighbour(navmesh: &Navmesh, key: u64, layer: u8, code: u32, direction: Direction) -> Neighbour {
    let crosses = morton::chunk_border(code, layer).contains(direction);
    let neighbour_key = if crosses { morton::move_chunk(key, direction) } else { key };
    let Some(chunk) = navmesh.chunk(neighbour_key) else {
        return Neighbour::Empty;
    };

    let mut neighbour_code = morton::move_node(code, layer, direction);
    let mut neighbour_layer = layer;
    loop {
        for state in NodeState::ALL {
            if chunk.contains_node(neighbour_code, neighbour_layer, state) {
                return Neighbour::Node {
                    key: neighbour_key,
                    layer: neighbour_layer,
                    morton: neighbour_code,
                    state,
                };
            }
        }
        if neighbour_layer == 0 {
            return Neighbour::Empty;
        }
        neighbour_layer -= 1;
        neighbour_code = morton::parent(neighbour_code, neighbour_layer);
        if !crosses && neighbour_code == morton::parent(code, neighbour_layer) {
            return Neighbour::Parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;
    use crate::math::aabb::Aabb;
    use crate::math::morton::{encode_chunk, encode_node};
    use crate::navmesh::config::NavmeshConfig;
    use crate::navmesh::relations::{Relation, LAYER_PARENT};
    use crate::rasterize::generator::Generator;
    use crate::rasterize::occluder::Occluder;
    use crate::rasterize::oracle::BoxOracle;

    const STATIC: NodeState = NodeState::Static;

    fn relation(navmesh: &Navmesh, key: u64, layer: u8, code: u32, direction: Direction) -> Option<Relation> {
        navmesh.find_node(key, layer, code, STATIC).and_then(|n| n.relations.get(direction))
    }

    #[test]
    fn test_siblings_and_parent() {
        let mut navmesh = Navmesh::new();
        let key = encode_chunk(0, 0, 0);
        let chunk = navmesh.get_or_init_chunk(key);
        let a = encode_node(0, 0, 0);
        let b = encode_node(512, 0, 0);
        let lone = encode_node(256, 512, 0);
        chunk.init_node_and_parents(a, 1, STATIC, 0);
        chunk.init_node_and_parents(b, 1, STATIC, 0);
        chunk.init_node_and_parents(lone, 2, STATIC, 0);
        resolve_all(&mut navmesh);

        assert_eq!(relation(&navmesh, key, 1, b, Direction::X_NEGATIVE), Some(Relation { layer: 1, state: STATIC }));
        assert_eq!(relation(&navmesh, key, 1, a, Direction::X_POSITIVE), Some(Relation { layer: 1, state: STATIC }));
        // Nothing beyond the chunk face.
        assert_eq!(relation(&navmesh, key, 1, a, Direction::X_NEGATIVE), None);

        // (0, 512, 0) on layer 2 is free space inside the same layer 1 parent.
        let node = navmesh.find_node(key, 2, lone, STATIC).expect("lone node");
        assert_eq!(node.relations.layer(Direction::X_NEGATIVE), LAYER_PARENT);
        // Below it sits `a`, one layer up.
        assert_eq!(node.relations.get(Direction::Y_NEGATIVE), Some(Relation { layer: 1, state: STATIC }));
        assert_eq!(relation(&navmesh, key, 1, a, Direction::Y_POSITIVE), Some(Relation { layer: 2, state: STATIC }));
    }

    #[test]
    fn test_crosses_chunk_border() {
        let mut navmesh = Navmesh::new();
        let left = encode_chunk(0, 0, 0);
        let right = encode_chunk(1024, 0, 0);
        navmesh.get_or_init_chunk(left).init_node_and_parents(encode_node(512, 0, 0), 1, STATIC, 0);
        navmesh.get_or_init_chunk(right).init_node_and_parents(0, 2, STATIC, 0);
        navmesh
            .get_or_init_chunk(right)
            .init_node_and_parents(0, 1, NodeState::Dynamic, 0);
        resolve_all(&mut navmesh);

        assert_eq!(relation(&navmesh, right, 2, 0, Direction::X_NEGATIVE), Some(Relation { layer: 1, state: STATIC }));
        assert_eq!(
            relation(&navmesh, left, 1, encode_node(512, 0, 0), Direction::X_POSITIVE),
            Some(Relation { layer: 2, state: STATIC })
        );
        // Roots see each other across the face, and the dynamic root sees the static one.
        assert_eq!(relation(&navmesh, right, 0, 0, Direction::X_NEGATIVE), Some(Relation { layer: 0, state: STATIC }));
        let dynamic = navmesh.find_node(right, 1, 0, NodeState::Dynamic).expect("dynamic node");
        assert_eq!(dynamic.relations.get(Direction::X_NEGATIVE), Some(Relation { layer: 1, state: STATIC }));
    }

    /// A 3x3x3 grid of chunks, each holding a small box, plus one box across
    /// the face between the first two chunks.
    fn grid_scene() -> (NavmeshConfig, Vec<Occluder>) {
        let mut occluders = Vec::new();
        let mut id = 0;
        for x in 0..3 {
            for y in 0..3 {
                for z in 0..3 {
                    let origin = Vec3::new(x as f32, y as f32, z as f32) * 1024.0;
                    let offset = Vec3::new(100.0 + 37.0 * x as f32, 700.0, 450.0 - 90.0 * z as f32);
                    occluders.push(Occluder::new(id, Aabb::new(origin + offset, origin + offset + Vec3::splat(200.0))));
                    id += 1;
                }
            }
        }
        occluders.push(Occluder::new(id, Aabb::new(Vec3::new(900.0, 0.0, 0.0), Vec3::new(1300.0, 300.0, 1024.0))));
        (NavmeshConfig::with_static_depth(4), occluders)
    }

    #[test]
    fn test_relation_symmetry_on_grid() {
        let (config, occluders) = grid_scene();
        let oracle = BoxOracle::new(&occluders);
        let mut navmesh = Navmesh::new();
        Generator::new(&config, &oracle).generate(&mut navmesh, &occluders);
        assert_eq!(navmesh.chunk_count(), 27);

        let mut checked = 0;
        for (&key, chunk) in navmesh.chunks() {
            for (layer, code, node) in chunk.nodes(STATIC) {
                for direction in Direction::NEGATIVE_SIDES {
                    let Some(found) = node.relations.get(direction) else {
                        continue;
                    };
                    assert!(found.layer <= layer);

                    let crosses = morton::chunk_border(code, layer).contains(direction);
                    let found_key = if crosses { morton::move_chunk(key, direction) } else { key };
                    let found_code = morton::parent(morton::move_node(code, layer, direction), found.layer);
                    let back = navmesh
                        .find_node(found_key, found.layer, found_code, found.state)
                        .and_then(|n| n.relations.get(direction.opposite()))
                        .expect("neighbour without back relation");
                    assert!(back.layer >= layer);
                    checked += 1;
                }
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn test_resolve_chunks_matches_full_resolution() {
        let (config, occluders) = grid_scene();
        let oracle = BoxOracle::new(&occluders);
        let mut navmesh = Navmesh::new();
        Generator::new(&config, &oracle).generate(&mut navmesh, &occluders);

        // Carve into the centre chunk and drop a corner chunk entirely.
        let centre = encode_chunk(1024, 1024, 1024);
        let corner = encode_chunk(0, 0, 0);
        if let Some(chunk) = navmesh.chunk_mut(centre) {
            let code = morton::parent(encode_node(300, 700, 300), 2);
            assert!(chunk.remove_node(code, 2, STATIC));
            chunk.init_node_and_parents(encode_node(0, 960, 0), 4, STATIC, 0);
        }
        navmesh.remove_chunk(corner);
        let touched: BTreeSet<u64> = [centre, corner].into();

        let mut incremental = navmesh.clone();
        resolve_chunks(&mut incremental, &touched);
        let mut full = navmesh;
        resolve_all(&mut full);
        assert_eq!(incremental, full);
    }
}

//! Chunk serialization and disk I/O
//!
//! Chunk file layout (little endian):
//! - magic `NVOC`, u32 version, 16 byte chunk id, u8 static depth
//! - per layer `0..=static_depth`: u32 node count, then `(u32 morton, u64 packed node)` pairs
//!
//! Only the static tree is stored. Files are optionally LZ4 framed with the
//! uncompressed size prepended.

use std::collections::BTreeSet;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use uuid::Uuid;

use crate::core::{Error, Result};
use crate::math::morton::MAX_DEPTH;
use crate::navmesh::chunk::Chunk;
use crate::navmesh::config::NavmeshConfig;
use crate::navmesh::mesh::Navmesh;
use crate::navmesh::node::Node;
use crate::navmesh::relations::NodeState;
use crate::streaming::metadata::NavmeshMetadata;

const CHUNK_MAGIC: &[u8; 4] = b"NVOC";
const CHUNK_VERSION: u32 = 1;
pub const CHUNK_EXTENSION: &str = "nvc";
const CHUNK_DIR: &str = "chunks";

/// Header of a chunk file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkHeader {
    pub chunk_id: Uuid,
    pub static_depth: u8,
}

/// Outcome of a save
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SaveReport {
    pub navmesh_id: Uuid,
    /// Chunk files written
    pub written: Vec<u64>,
    /// Chunk files deleted because the chunk is gone
    pub removed: Vec<u64>,
    /// Chunks that could not be written or deleted, with the reason
    pub failed: Vec<(u64, String)>,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of a load
#[derive(Clone, Debug)]
pub struct LoadReport {
    pub metadata: NavmeshMetadata,
    pub navmesh: Navmesh,
    /// Chunks whose file was written by another save and must be regenerated
    pub desynced: Vec<u64>,
    /// Chunks that could not be read or decoded, with the reason
    pub failed: Vec<(u64, String)>,
}

impl LoadReport {
    /// Chunks that have to be regenerated before the navmesh is complete
    pub fn stale_chunks(&self) -> BTreeSet<u64> {
        self.desynced
            .iter()
            .copied()
            .chain(self.failed.iter().map(|(key, _)| *key))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.desynced.is_empty() && self.failed.is_empty()
    }
}

fn invalid_data(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

/// Serialize the static tree of a chunk (uncompressed)
pub fn serialize_chunk(chunk: &Chunk, chunk_id: Uuid, static_depth: u8) -> io::Result<Vec<u8>> {
    if static_depth >= MAX_DEPTH {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Static depth {} out of range", static_depth),
        ));
    }
    let mut bytes = Vec::new();
    write_chunk(&mut bytes, chunk, ChunkHeader { chunk_id, static_depth })?;
    Ok(bytes)
}

fn write_chunk(writer: &mut impl Write, chunk: &Chunk, header: ChunkHeader) -> io::Result<()> {
    writer.write_all(CHUNK_MAGIC)?;
    writer.write_all(&CHUNK_VERSION.to_le_bytes())?;
    writer.write_all(header.chunk_id.as_bytes())?;
    writer.write_all(&[header.static_depth])?;

    for layer in 0..=header.static_depth {
        let nodes = chunk.layer(layer, NodeState::Static);
        let count = u32::try_from(nodes.len()).map_err(|_| invalid_data("Too many nodes in layer"))?;
        writer.write_all(&count.to_le_bytes())?;
        for (&morton, node) in nodes {
            writer.write_all(&morton.to_le_bytes())?;
            writer.write_all(&node.pack().to_le_bytes())?;
        }
    }
    Ok(())
}

/// Deserialize a chunk (uncompressed) into a chunk with the given key
pub fn deserialize_chunk(key: u64, data: &[u8]) -> io::Result<(ChunkHeader, Chunk)> {
    let mut reader = data;

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != CHUNK_MAGIC {
        return Err(invalid_data("Invalid magic bytes"));
    }

    let version = read_u32(&mut reader)?;
    if version != CHUNK_VERSION {
        return Err(invalid_data(format!("Unsupported version: {}", version)));
    }

    let mut id = [0u8; 16];
    reader.read_exact(&mut id)?;
    let mut depth = [0u8; 1];
    reader.read_exact(&mut depth)?;
    let header = ChunkHeader {
        chunk_id: Uuid::from_bytes(id),
        static_depth: depth[0],
    };
    if header.static_depth >= MAX_DEPTH {
        return Err(invalid_data(format!("Static depth {} out of range", header.static_depth)));
    }

    let mut chunk = Chunk::new(key);
    for layer in 0..=header.static_depth {
        let count = read_u32(&mut reader)?;
        let nodes = chunk.layer_mut(layer, NodeState::Static);
        for _ in 0..count {
            let morton = read_u32(&mut reader)?;
            let packed = read_u64(&mut reader)?;
            if nodes.insert(morton, Node::unpack(packed)).is_some() {
                return Err(invalid_data(format!("Duplicate node {:#x} on layer {}", morton, layer)));
            }
        }
    }

    if !reader.is_empty() {
        return Err(invalid_data(format!("{} trailing bytes", reader.len())));
    }
    Ok((header, chunk))
}

fn read_u32(reader: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(reader: &mut impl Read) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Compress a serialized chunk using LZ4
pub fn compress_chunk(chunk: &Chunk, chunk_id: Uuid, static_depth: u8) -> io::Result<Vec<u8>> {
    let serialized = serialize_chunk(chunk, chunk_id, static_depth)?;
    Ok(lz4_flex::compress_prepend_size(&serialized))
}

/// Decompress and deserialize a chunk
pub fn decompress_chunk(key: u64, data: &[u8]) -> io::Result<(ChunkHeader, Chunk)> {
    let decompressed = lz4_flex::decompress_size_prepended(data)
        .map_err(|e| invalid_data(format!("LZ4 decompression failed: {}", e)))?;
    deserialize_chunk(key, &decompressed)
}

/// Encode a chunk file the way `config` asks for
pub fn encode_chunk_file(chunk: &Chunk, chunk_id: Uuid, config: &NavmeshConfig) -> io::Result<Vec<u8>> {
    if config.compress_chunks {
        compress_chunk(chunk, chunk_id, config.static_depth)
    } else {
        serialize_chunk(chunk, chunk_id, config.static_depth)
    }
}

/// Decode a chunk file, compressed or not
pub fn decode_chunk_file(key: u64, data: &[u8]) -> io::Result<(ChunkHeader, Chunk)> {
    if data.starts_with(CHUNK_MAGIC) {
        deserialize_chunk(key, data)
    } else {
        decompress_chunk(key, data)
    }
}

/// Get the file path for a chunk
pub fn chunk_path(base_dir: &Path, key: u64) -> PathBuf {
    // Fan out on the low 3-bit groups of the key to keep directories small
    // Format: base_dir/chunks/{key >> 6}/{(key >> 3) & 7}/{key & 7}.nvc
    base_dir
        .join(CHUNK_DIR)
        .join((key >> 6).to_string())
        .join(((key >> 3) & 7).to_string())
        .join(format!("{}.{}", key & 7, CHUNK_EXTENSION))
}

fn has_static_nodes(chunk: &Chunk) -> bool {
    chunk.nodes(NodeState::Static).next().is_some()
}

/// Write a file through a temporary sibling so a failed write never leaves a
/// truncated chunk behind
async fn write_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

async fn delete_file(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Check if a chunk file exists on disk
pub async fn chunk_exists(base_dir: &Path, key: u64) -> bool {
    tokio::fs::try_exists(chunk_path(base_dir, key)).await.unwrap_or(false)
}

/// Save every chunk of the navmesh and delete files of chunks that are gone.
///
/// The navmesh id of an earlier save in the same directory is kept.
pub async fn save_navmesh(base_dir: &Path, navmesh: &Navmesh, config: &NavmeshConfig) -> Result<SaveReport> {
    let mut metadata = NavmeshMetadata::load(base_dir)
        .await?
        .unwrap_or_else(|| NavmeshMetadata::new(config.static_depth));
    metadata.static_depth = config.static_depth;

    let keys: BTreeSet<u64> = navmesh
        .chunks()
        .filter(|(_, chunk)| has_static_nodes(chunk))
        .map(|(&key, _)| key)
        .collect();
    let removed: Vec<u64> = metadata.chunk_ids.keys().filter(|key| !keys.contains(*key)).copied().collect();

    save_chunks(base_dir, navmesh, config, metadata, &keys, &removed).await
}

/// Save only the chunks in `dirty`. Dirty chunks no longer in the navmesh get
/// their files deleted.
pub async fn save_dirty_chunks(
    base_dir: &Path,
    navmesh: &Navmesh,
    dirty: &BTreeSet<u64>,
    config: &NavmeshConfig,
) -> Result<SaveReport> {
    let metadata = match NavmeshMetadata::load(base_dir).await? {
        Some(metadata) if metadata.static_depth != config.static_depth => {
            return Err(Error::Config(format!(
                "Saved navmesh has static depth {}, config has {}; a full save is required",
                metadata.static_depth, config.static_depth
            )));
        }
        Some(metadata) => metadata,
        None => NavmeshMetadata::new(config.static_depth),
    };

    let (keys, removed): (BTreeSet<u64>, BTreeSet<u64>) = dirty
        .iter()
        .copied()
        .partition(|&key| navmesh.chunk(key).is_some_and(has_static_nodes));
    let removed: Vec<u64> = removed.into_iter().collect();

    save_chunks(base_dir, navmesh, config, metadata, &keys, &removed).await
}

async fn save_chunks(
    base_dir: &Path,
    navmesh: &Navmesh,
    config: &NavmeshConfig,
    mut metadata: NavmeshMetadata,
    keys: &BTreeSet<u64>,
    removed: &[u64],
) -> Result<SaveReport> {
    let start = Instant::now();
    let mut report = SaveReport {
        navmesh_id: metadata.navmesh_id,
        ..Default::default()
    };

    let chunks: Vec<&Chunk> = keys.iter().filter_map(|&key| navmesh.chunk(key)).collect();
    let encoded: Vec<(u64, Uuid, io::Result<Vec<u8>>)> = chunks
        .par_iter()
        .map(|chunk| {
            let chunk_id = Uuid::new_v4();
            (chunk.key(), chunk_id, encode_chunk_file(chunk, chunk_id, config))
        })
        .collect();

    for (key, chunk_id, bytes) in encoded {
        let result = match bytes {
            Ok(bytes) => write_file(&chunk_path(base_dir, key), &bytes).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                metadata.chunk_ids.insert(key, chunk_id);
                report.written.push(key);
            }
            Err(e) => {
                log::warn!("Failed to save chunk {:#x}: {}", key, e);
                report.failed.push((key, e.to_string()));
            }
        }
    }

    for &key in removed {
        match delete_file(&chunk_path(base_dir, key)).await {
            Ok(()) => {
                metadata.chunk_ids.remove(&key);
                report.removed.push(key);
            }
            Err(e) => {
                log::warn!("Failed to delete chunk {:#x}: {}", key, e);
                report.failed.push((key, e.to_string()));
            }
        }
    }

    metadata.save(base_dir).await?;

    log::info!(
        "Saved navmesh {} to {}: {} written, {} removed, {} failed in {:.1}ms",
        metadata.navmesh_id,
        base_dir.display(),
        report.written.len(),
        report.removed.len(),
        report.failed.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(report)
}

/// Load a saved navmesh.
///
/// Chunks that cannot be read, or whose file id does not match the metadata,
/// are reported and left out; everything else is loaded.
pub async fn load_navmesh(base_dir: &Path) -> Result<LoadReport> {
    let start = Instant::now();
    let metadata = NavmeshMetadata::load(base_dir).await?.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("No navmesh metadata in {}", base_dir.display()),
        )
    })?;

    let mut failed = Vec::new();
    let mut files = Vec::with_capacity(metadata.chunk_ids.len());
    for (&key, &chunk_id) in &metadata.chunk_ids {
        match tokio::fs::read(chunk_path(base_dir, key)).await {
            Ok(bytes) => files.push((key, chunk_id, bytes)),
            Err(e) => failed.push((key, e.to_string())),
        }
    }

    let decoded: Vec<(u64, Uuid, io::Result<(ChunkHeader, Chunk)>)> = files
        .into_par_iter()
        .map(|(key, chunk_id, bytes)| (key, chunk_id, decode_chunk_file(key, &bytes)))
        .collect();

    let mut navmesh = Navmesh::new();
    let mut desynced = Vec::new();
    for (key, chunk_id, result) in decoded {
        match result {
            Ok((header, _)) if header.chunk_id != chunk_id => desynced.push(key),
            Ok((header, _)) if header.static_depth != metadata.static_depth => failed.push((
                key,
                format!(
                    "Static depth {} does not match navmesh depth {}",
                    header.static_depth, metadata.static_depth
                ),
            )),
            Ok((_, chunk)) => navmesh.commit_chunk(chunk),
            Err(e) => failed.push((key, e.to_string())),
        }
    }
    failed.sort_by_key(|(key, _)| *key);

    for &key in &desynced {
        log::warn!("Chunk {:#x} is out of sync with navmesh {}", key, metadata.navmesh_id);
    }
    for (key, reason) in &failed {
        log::warn!("Failed to load chunk {:#x}: {}", key, reason);
    }
    log::info!(
        "Loaded navmesh {} from {}: {} chunks, {} nodes in {:.1}ms",
        metadata.navmesh_id,
        base_dir.display(),
        navmesh.chunk_count(),
        navmesh.node_count(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(LoadReport {
        metadata,
        navmesh,
        desynced,
        failed,
    })
}

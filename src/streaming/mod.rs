//! Navmesh persistence

pub mod disk_io;
pub mod metadata;

pub use disk_io::{
    ChunkHeader, LoadReport, SaveReport,
    serialize_chunk, deserialize_chunk,
    compress_chunk, decompress_chunk,
    encode_chunk_file, decode_chunk_file,
    save_navmesh, save_dirty_chunks, load_navmesh,
    chunk_exists, chunk_path,
};
pub use metadata::NavmeshMetadata;

//! Navmesh-wide metadata stored beside the chunk files

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::Result;

pub const METADATA_FILE: &str = "metadata.json";

/// Identity of a saved navmesh and of every chunk file written for it.
///
/// A chunk file whose id differs from the one recorded here was written by
/// another save and is out of sync with the rest of the navmesh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavmeshMetadata {
    pub navmesh_id: Uuid,
    pub static_depth: u8,
    #[serde(default)]
    pub chunk_ids: BTreeMap<u64, Uuid>,
}

impl NavmeshMetadata {
    pub fn new(static_depth: u8) -> Self {
        Self {
            navmesh_id: Uuid::new_v4(),
            static_depth,
            chunk_ids: BTreeMap::new(),
        }
    }

    pub fn path(base_dir: &Path) -> PathBuf {
        base_dir.join(METADATA_FILE)
    }

    /// Read the metadata of a saved navmesh, `None` if nothing was saved there.
    pub async fn load(base_dir: &Path) -> Result<Option<Self>> {
        let path = Self::path(base_dir);
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Write through a temporary file so a failed save never truncates the
    /// previous metadata.
    pub async fn save(&self, base_dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(base_dir).await?;
        let path = Self::path(base_dir);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

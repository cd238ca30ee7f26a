//! Shared navmesh with background update batches
//!
//! [`NavmeshService`] owns the navmesh, the collision oracle and the staging
//! area. Rasterization runs on tokio's blocking pool; readers take the async
//! read lock and never see a half-applied chunk.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{oneshot, RwLock, RwLockReadGuard};

use crate::core::{Error, Result};
use crate::math::aabb::Aabb;
use crate::navmesh::config::NavmeshConfig;
use crate::navmesh::mesh::Navmesh;
use crate::navmesh::relations::NodeState;
use crate::rasterize::generator::{GenerationSummary, Generator};
use crate::rasterize::occluder::{Occluder, OccluderId};
use crate::rasterize::oracle::CollisionOracle;
use crate::rasterize::staging::{StagedChange, StagedChanges};
use crate::rasterize::updater::{UpdateSummary, Updater};
use crate::streaming::disk_io::{self, SaveReport};

/// Resolves once an update batch has finished, cancelled or not
pub type UpdateSignal = oneshot::Receiver<UpdateSummary>;

/// Entry points an application drives an occlusion navmesh through.
pub trait OcclusionNavmesh {
    /// Replace the navmesh with one generated from `occluders`.
    fn generate(&self, occluders: &[Occluder]) -> impl Future<Output = Result<GenerationSummary>> + Send;

    /// Record that an occluder moved from `previous` to `current`. `None`
    /// bounds stand for an occluder that did not exist before or is gone now.
    fn stage_change(&self, id: OccluderId, previous: Option<Aabb>, current: Option<Aabb>);

    /// Start applying everything staged so far in the background.
    ///
    /// Returns `None` when nothing is staged or a batch is still running.
    /// Must be called from within a tokio runtime.
    fn run_pending_update(&self) -> Option<UpdateSignal>;

    /// Save every chunk under `dir`.
    fn save(&self, dir: &Path) -> impl Future<Output = Result<SaveReport>> + Send;
}

/// What staging needs to know about an occluder besides its bounds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct OccluderInfo {
    state: NodeState,
    sound_preset_id: u16,
}

struct Shared {
    navmesh: RwLock<Navmesh>,
    config: NavmeshConfig,
    oracle: Arc<dyn CollisionOracle>,
    staged: Mutex<StagedChanges>,
    occluders: Mutex<BTreeMap<OccluderId, OccluderInfo>>,
    /// Chunks changed since the last save
    dirty: Mutex<BTreeSet<u64>>,
    updating: AtomicBool,
    cancel: AtomicBool,
}

/// Locks here only guard plain collections, so a panic elsewhere never leaves
/// them half-written.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the updating flag when a batch ends, also by panic.
struct UpdatingGuard<'a>(&'a AtomicBool);

impl Drop for UpdatingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Cheap to clone; clones share the same navmesh.
#[derive(Clone)]
pub struct NavmeshService {
    shared: Arc<Shared>,
}

impl NavmeshService {
    pub fn new(config: NavmeshConfig, oracle: Arc<dyn CollisionOracle>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                navmesh: RwLock::new(Navmesh::new()),
                config,
                oracle,
                staged: Mutex::new(StagedChanges::new()),
                occluders: Mutex::new(BTreeMap::new()),
                dirty: Mutex::new(BTreeSet::new()),
                updating: AtomicBool::new(false),
                cancel: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &NavmeshConfig {
        &self.shared.config
    }

    /// Make the state and sound preset of an occluder known before its
    /// changes are staged. Occluders passed to `generate` are registered too.
    pub fn register(&self, occluder: &Occluder) {
        lock(&self.shared.occluders).insert(
            occluder.id,
            OccluderInfo {
                state: occluder.state,
                sound_preset_id: occluder.sound_preset_id,
            },
        );
    }

    /// Ask the running batch to stop before its next chunk. Unfinished
    /// changes go back to the staging area.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_updating(&self) -> bool {
        self.shared.updating.load(Ordering::SeqCst)
    }

    pub fn staged_count(&self) -> usize {
        lock(&self.shared.staged).len()
    }

    pub fn dirty_chunks(&self) -> BTreeSet<u64> {
        lock(&self.shared.dirty).clone()
    }

    /// Read access to the current navmesh
    pub async fn navmesh(&self) -> RwLockReadGuard<'_, Navmesh> {
        self.shared.navmesh.read().await
    }

    /// Copy of the current navmesh
    pub async fn snapshot(&self) -> Navmesh {
        self.shared.navmesh.read().await.clone()
    }

    /// Save only the chunks changed since the last save.
    pub async fn save_dirty(&self, dir: &Path) -> Result<SaveReport> {
        let dirty = self.dirty_chunks();
        let navmesh = self.shared.navmesh.read().await;
        let report = disk_io::save_dirty_chunks(dir, &navmesh, &dirty, &self.shared.config).await?;
        self.mark_saved(&report);
        Ok(report)
    }

    /// Rebuild only `keys` from the scene, typically the stale chunks a
    /// [`NavmeshService::load`] reported.
    pub async fn regenerate_chunks(&self, keys: BTreeSet<u64>, occluders: &[Occluder]) -> Result<GenerationSummary> {
        for occluder in occluders {
            self.register(occluder);
        }
        let shared = Arc::clone(&self.shared);
        let occluders = occluders.to_vec();
        let summary = tokio::task::spawn_blocking(move || {
            let mut navmesh = shared.navmesh.blocking_write();
            let summary = Generator::new(&shared.config, shared.oracle.as_ref())
                .regenerate_chunks(&mut navmesh, &keys, &occluders);
            lock(&shared.dirty).extend(keys.difference(&summary.skipped_chunks));
            summary
        })
        .await?;
        Ok(summary)
    }

    /// Replace the navmesh with a saved one.
    ///
    /// Returns the chunks that were out of sync or unreadable; they are
    /// missing from the navmesh until regenerated with
    /// [`NavmeshService::regenerate_chunks`].
    pub async fn load(&self, dir: &Path) -> Result<BTreeSet<u64>> {
        let report = disk_io::load_navmesh(dir).await?;
        if report.metadata.static_depth != self.shared.config.static_depth {
            return Err(Error::Config(format!(
                "Saved navmesh has static depth {}, config has {}",
                report.metadata.static_depth, self.shared.config.static_depth
            )));
        }
        let stale = report.stale_chunks();
        *self.shared.navmesh.write().await = report.navmesh;
        *lock(&self.shared.dirty) = stale.clone();
        Ok(stale)
    }

    fn mark_saved(&self, report: &SaveReport) {
        let mut dirty = lock(&self.shared.dirty);
        for key in report.written.iter().chain(&report.removed) {
            dirty.remove(key);
        }
    }
}

impl OcclusionNavmesh for NavmeshService {
    async fn generate(&self, occluders: &[Occluder]) -> Result<GenerationSummary> {
        for occluder in occluders {
            self.register(occluder);
        }
        // The new navmesh already reflects every staged change
        let discarded = lock(&self.shared.staged).take();
        if !discarded.is_empty() {
            log::debug!("Dropped {} staged changes before generating", discarded.len());
        }

        let shared = Arc::clone(&self.shared);
        let occluders = occluders.to_vec();
        let summary = tokio::task::spawn_blocking(move || {
            let mut navmesh = Navmesh::new();
            let summary = Generator::new(&shared.config, shared.oracle.as_ref()).generate(&mut navmesh, &occluders);

            let mut current = shared.navmesh.blocking_write();
            let mut dirty = lock(&shared.dirty);
            dirty.extend(current.chunk_keys());
            dirty.extend(navmesh.chunk_keys());
            *current = navmesh;
            summary
        })
        .await?;
        Ok(summary)
    }

    fn stage_change(&self, id: OccluderId, previous: Option<Aabb>, current: Option<Aabb>) {
        let info = lock(&self.shared.occluders).get(&id).copied().unwrap_or_default();
        let change = StagedChange::new(previous, current)
            .with_state(info.state)
            .with_sound_preset(info.sound_preset_id);
        lock(&self.shared.staged).stage(id, change);
        log::trace!("Staged change of occluder {:?}", id);
    }

    fn run_pending_update(&self) -> Option<UpdateSignal> {
        if self.shared.updating.swap(true, Ordering::SeqCst) {
            return None;
        }
        let batch = lock(&self.shared.staged).take();
        if batch.is_empty() {
            self.shared.updating.store(false, Ordering::SeqCst);
            return None;
        }
        self.shared.cancel.store(false, Ordering::SeqCst);

        let (tx, rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        log::debug!("Starting update batch of {} changes", batch.len());
        tokio::task::spawn_blocking(move || {
            let updating = UpdatingGuard(&shared.updating);
            let summary = {
                let mut navmesh = shared.navmesh.blocking_write();
                Updater::new(&shared.config, shared.oracle.as_ref()).run(&mut navmesh, batch, &shared.cancel)
            };

            lock(&shared.dirty).extend(&summary.touched_chunks);
            {
                let mut staged = lock(&shared.staged);
                for (id, change) in summary.to_restage() {
                    staged.restage(*id, change.clone());
                }
            }
            drop(updating);
            // The caller may have dropped the signal
            let _ = tx.send(summary);
        });
        Some(rx)
    }

    async fn save(&self, dir: &Path) -> Result<SaveReport> {
        let navmesh = self.shared.navmesh.read().await;
        let report = disk_io::save_navmesh(dir, &navmesh, &self.shared.config).await?;
        self.mark_saved(&report);
        Ok(report)
    }
}

//! Checkpoint stores.
//!
//! A checkpoint is the whole [`TrainingState`] after a completed iteration.
//! Partial iterations are never saved, so resuming always restarts at an
//! iteration boundary.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AdamState, TrainError, TrainResult};

/// Everything needed to continue a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    pub experiment_id: String,
    /// Iterations completed; a resumed run starts at this index.
    pub iteration:     u64,
    pub parameters:    Vec<f32>,
    pub optimizer:     AdamState,
}

/// Durable storage keyed by experiment id.
///
/// Shared by every worker thread; only rank 0 saves.
pub trait CheckpointStore: Send + Sync {
    fn save(&self, experiment_id: &str, iteration: u64, state: &TrainingState) -> TrainResult<()>;

    /// The checkpoint with the highest iteration, if any.
    fn load(&self, experiment_id: &str) -> TrainResult<Option<TrainingState>>;
}

// ── FsCheckpointStore ─────────────────────────────────────────────────────────

/// JSON files at `<root>/<experiment_id>/ckpt_<iteration>.json`.
///
/// Files are written to a temporary name and renamed into place, so a
/// reader never sees a half-written checkpoint.
pub struct FsCheckpointStore {
    root: PathBuf,
}

impl FsCheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, experiment_id: &str, iteration: u64) -> PathBuf {
        self.root.join(experiment_id).join(format!("ckpt_{iteration}.json"))
    }

    /// Saved iterations for `experiment_id`, ascending.
    pub fn iterations(&self, experiment_id: &str) -> TrainResult<Vec<u64>> {
        let dir = self.root.join(experiment_id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut found = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let name = entry?.file_name();
            if let Some(it) = name.to_str().and_then(parse_checkpoint_name) {
                found.push(it);
            }
        }
        found.sort_unstable();
        Ok(found)
    }
}

fn parse_checkpoint_name(name: &str) -> Option<u64> {
    name.strip_prefix("ckpt_")?.strip_suffix(".json")?.parse().ok()
}

impl CheckpointStore for FsCheckpointStore {
    fn save(&self, experiment_id: &str, iteration: u64, state: &TrainingState) -> TrainResult<()> {
        let path = self.path_for(experiment_id, iteration);
        let dir = self.root.join(experiment_id);
        fs::create_dir_all(&dir)?;

        let tmp = dir.join(format!(".ckpt_{iteration}.json.tmp"));
        fs::write(&tmp, serde_json::to_vec(state)?)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), iteration, "checkpoint written");
        Ok(())
    }

    fn load(&self, experiment_id: &str) -> TrainResult<Option<TrainingState>> {
        match self.iterations(experiment_id)?.last() {
            Some(&it) => load_checkpoint_file(&self.path_for(experiment_id, it)).map(Some),
            None => Ok(None),
        }
    }
}

/// Read one checkpoint file, e.g. the warm start of a finetune run.
pub fn load_checkpoint_file(path: &Path) -> TrainResult<TrainingState> {
    let bytes = fs::read(path).map_err(|e| TrainError::Checkpoint {
        path:   path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| TrainError::Checkpoint {
        path:   path.to_path_buf(),
        reason: e.to_string(),
    })
}

// ── MemoryCheckpointStore ─────────────────────────────────────────────────────

/// In-memory store for tests and throwaway runs.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    inner: Mutex<HashMap<String, BTreeMap<u64, TrainingState>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iterations(&self, experiment_id: &str) -> Vec<u64> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.get(experiment_id).map(|m| m.keys().copied().collect()).unwrap_or_default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn save(&self, experiment_id: &str, iteration: u64, state: &TrainingState) -> TrainResult<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entry(experiment_id.to_owned()).or_default().insert(iteration, state.clone());
        Ok(())
    }

    fn load(&self, experiment_id: &str) -> TrainResult<Option<TrainingState>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.get(experiment_id).and_then(|m| m.values().next_back()).cloned())
    }
}

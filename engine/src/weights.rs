// Copyright 2024 Jurimatch AG
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! The process-wide learning-to-rank weight snapshot.
//!
//! Loaded once at engine initialization and refreshable on demand. Readers
//! clone the active `Arc` once per rank call, reloads swap the pointer, so a
//! ranking never observes a torn vector. A failed reload keeps the previously
//! valid vector, on a cold start the built-in default is used.

use std::{
    fs,
    path::PathBuf,
    sync::{Arc, RwLock},
};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use jurimatch_scoring::WeightVector;

use crate::error::WeightLoadError;

/// Configurations of the weight snapshot.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    /// Location of the JSON snapshot artifact written by the training job.
    pub snapshot: Option<PathBuf>,
}

pub(crate) struct SnapshotStore {
    snapshot: Option<PathBuf>,
    active: RwLock<Arc<WeightVector>>,
}

impl SnapshotStore {
    /// Creates the store and eagerly loads the configured snapshot.
    pub(crate) fn new(config: &Config) -> Self {
        let store = Self {
            snapshot: config.snapshot.clone(),
            active: RwLock::new(Arc::new(WeightVector::default())),
        };
        store.reload();

        store
    }

    /// The currently active weight vector.
    pub(crate) fn active(&self) -> Arc<WeightVector> {
        self.active.read().unwrap(/* not poisoned */).clone()
    }

    /// Reloads the snapshot and returns the now active vector.
    ///
    /// A missing, malformed or degenerate snapshot logs a warning and leaves
    /// the active vector untouched.
    pub(crate) fn reload(&self) -> Arc<WeightVector> {
        match self.load() {
            Ok(weights) => {
                let weights = Arc::new(weights);
                *self.active.write().unwrap(/* not poisoned */) = weights.clone();
                info!("activated reloaded weight snapshot");
                weights
            }
            Err(WeightLoadError::Unconfigured) => self.active(),
            Err(error) => {
                warn!(%error, "weight snapshot reload failed, keeping active vector");
                self.active()
            }
        }
    }

    fn load(&self) -> Result<WeightVector, WeightLoadError> {
        let Some(path) = &self.snapshot else {
            return Err(WeightLoadError::Unconfigured);
        };

        let raw = fs::read_to_string(path)?;
        let weights = serde_json::from_str::<WeightVector>(&raw)?;
        if weights.is_valid_snapshot() {
            Ok(weights)
        } else {
            Err(WeightLoadError::Degenerate)
        }
    }
}

#[cfg(test)]
mod tests {
    use jurimatch_test_utils::assert_approx_eq;

    use super::*;

    fn write_snapshot(contents: &str) -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ltr_weights.json");
        fs::write(&path, contents).unwrap();
        let config = Config {
            snapshot: Some(path),
        };

        (dir, config)
    }

    #[test]
    fn test_cold_start_without_snapshot_uses_default() {
        let store = SnapshotStore::new(&Config::default());
        assert_eq!(*store.active(), WeightVector::default());
    }

    #[test]
    fn test_valid_snapshot_is_loaded() {
        let (_dir, config) = write_snapshot(
            r#"{"A": 0.5, "S": 0.5, "T": 0, "G": 0, "Q": 0, "U": 0, "R": 0, "C": 0}"#,
        );
        let store = SnapshotStore::new(&config);
        assert_approx_eq!(f32, store.active().a, 0.5);
    }

    #[test]
    fn test_malformed_snapshot_keeps_previous() {
        let (dir, config) = write_snapshot(
            r#"{"A": 0.5, "S": 0.5, "T": 0, "G": 0, "Q": 0, "U": 0, "R": 0, "C": 0}"#,
        );
        let store = SnapshotStore::new(&config);

        fs::write(dir.path().join("ltr_weights.json"), "not json").unwrap();
        store.reload();
        assert_approx_eq!(f32, store.active().a, 0.5);
    }

    #[test]
    fn test_all_zero_snapshot_keeps_previous() {
        let (dir, config) = write_snapshot(
            r#"{"A": 0.5, "S": 0.5, "T": 0, "G": 0, "Q": 0, "U": 0, "R": 0, "C": 0}"#,
        );
        let store = SnapshotStore::new(&config);

        fs::write(
            dir.path().join("ltr_weights.json"),
            r#"{"A": 0, "S": 0, "T": 0, "G": 0, "Q": 0, "U": 0, "R": 0, "C": 0}"#,
        )
        .unwrap();
        store.reload();
        assert_approx_eq!(f32, store.active().a, 0.5);
    }

    #[test]
    fn test_missing_snapshot_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            snapshot: Some(dir.path().join("does-not-exist.json")),
        };
        let store = SnapshotStore::new(&config);
        assert_eq!(*store.active(), WeightVector::default());
    }
}

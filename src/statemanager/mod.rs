// src/statemanager/mod.rs

//! Checkpoint persistence hooks.
//!
//! The engine calls [`StateSaver::save`] after state mutations worth keeping
//! and [`StateSaver::force_save`] right before creating a container, so the
//! name it is created under survives a restart. [`StateSaver::load`] runs
//! once at init.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{EniAttachment, Task};

/// Everything the engine persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    #[serde(default)]
    pub tasks: Vec<Task>,

    #[serde(default)]
    pub attachments: Vec<EniAttachment>,
}

pub trait StateSaver: Send + Sync {
    /// Persist the snapshot. Implementations may rate-limit this.
    fn save(&self, snapshot: &EngineSnapshot) -> anyhow::Result<()>;

    /// Persist the snapshot now.
    fn force_save(&self, snapshot: &EngineSnapshot) -> anyhow::Result<()>;

    /// Load the last persisted snapshot, if any.
    fn load(&self) -> anyhow::Result<Option<EngineSnapshot>>;
}

/// Saver that keeps nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSaver;

impl StateSaver for NoopSaver {
    fn save(&self, _snapshot: &EngineSnapshot) -> anyhow::Result<()> {
        Ok(())
    }

    fn force_save(&self, _snapshot: &EngineSnapshot) -> anyhow::Result<()> {
        Ok(())
    }

    fn load(&self) -> anyhow::Result<Option<EngineSnapshot>> {
        Ok(None)
    }
}

/// Saver writing the snapshot as JSON to a single file.
///
/// `save` is skipped when the previous write happened less than
/// `min_interval` ago; `force_save` always writes. Writes go to a sibling
/// temporary file that is renamed over the target.
#[derive(Debug)]
pub struct JsonFileSaver {
    path: PathBuf,
    min_interval: Duration,
    last_write: Mutex<Option<Instant>>,
}

impl JsonFileSaver {
    pub fn new(path: impl Into<PathBuf>, min_interval: Duration) -> Self {
        Self {
            path: path.into(),
            min_interval,
            last_write: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, snapshot: &EngineSnapshot) -> anyhow::Result<()> {
        let contents = serde_json::to_vec_pretty(snapshot).context("serialize snapshot")?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, contents).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("rename {} to {}", tmp.display(), self.path.display()))?;

        let mut last = self.last_write.lock().unwrap_or_else(|p| p.into_inner());
        *last = Some(Instant::now());
        debug!(path = %self.path.display(), tasks = snapshot.tasks.len(), "state saved");
        Ok(())
    }
}

impl StateSaver for JsonFileSaver {
    fn save(&self, snapshot: &EngineSnapshot) -> anyhow::Result<()> {
        let recent = {
            let last = self.last_write.lock().unwrap_or_else(|p| p.into_inner());
            last.is_some_and(|at| at.elapsed() < self.min_interval)
        };
        if recent {
            return Ok(());
        }
        self.write(snapshot)
    }

    fn force_save(&self, snapshot: &EngineSnapshot) -> anyhow::Result<()> {
        self.write(snapshot)
    }

    fn load(&self) -> anyhow::Result<Option<EngineSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        let snapshot = serde_json::from_slice(&contents)
            .with_context(|| format!("parse {}", self.path.display()))?;
        Ok(Some(snapshot))
    }
}

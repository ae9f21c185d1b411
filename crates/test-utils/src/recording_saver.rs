use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use taskengine::statemanager::{EngineSnapshot, StateSaver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveKind {
    Save,
    Force,
}

/// A `StateSaver` that keeps every snapshot it is handed.
#[derive(Clone, Default)]
pub struct RecordingSaver {
    saves: Arc<Mutex<Vec<(SaveKind, EngineSnapshot)>>>,
    initial: Arc<Mutex<Option<EngineSnapshot>>>,
    fail_load: Arc<Mutex<bool>>,
}

impl RecordingSaver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A saver whose `load` returns `snapshot`.
    pub fn with_snapshot(snapshot: EngineSnapshot) -> Self {
        let saver = Self::default();
        *saver.initial.lock().unwrap() = Some(snapshot);
        saver
    }

    pub fn fail_load(&self) {
        *self.fail_load.lock().unwrap() = true;
    }

    pub fn saves(&self) -> Vec<(SaveKind, EngineSnapshot)> {
        self.saves.lock().unwrap().clone()
    }

    pub fn count(&self, kind: SaveKind) -> usize {
        self.saves
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    pub fn last(&self) -> Option<EngineSnapshot> {
        self.saves.lock().unwrap().last().map(|(_, s)| s.clone())
    }
}

impl StateSaver for RecordingSaver {
    fn save(&self, snapshot: &EngineSnapshot) -> anyhow::Result<()> {
        self.saves
            .lock()
            .unwrap()
            .push((SaveKind::Save, snapshot.clone()));
        Ok(())
    }

    fn force_save(&self, snapshot: &EngineSnapshot) -> anyhow::Result<()> {
        self.saves
            .lock()
            .unwrap()
            .push((SaveKind::Force, snapshot.clone()));
        Ok(())
    }

    fn load(&self) -> anyhow::Result<Option<EngineSnapshot>> {
        if *self.fail_load.lock().unwrap() {
            return Err(anyhow!("state file is corrupt"));
        }
        Ok(self.initial.lock().unwrap().clone())
    }
}

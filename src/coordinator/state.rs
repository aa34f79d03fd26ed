use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{EvaluationRecord, RecordStatus, UnitDescriptor};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Idle,
    Pending,
    Done,
    Error,
}

impl From<RecordStatus> for Phase {
    fn from(status: RecordStatus) -> Self {
        match status {
            RecordStatus::Pending => Phase::Pending,
            RecordStatus::Done => Phase::Done,
            RecordStatus::Error => Phase::Error,
        }
    }
}

/// In-memory side of the coordinator: the current lineage, its phase and the
/// last-known record, which doubles as the cache in front of the store.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorState {
    lineage: u64,
    phase: Phase,
    current: Option<EvaluationRecord>,
    /// The cached record has not reached the store yet.
    store_dirty: bool,
    store_error: Option<String>,
    /// The slot left by a previous run has been read.
    restored: bool,
}

impl CoordinatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lineage(&self) -> u64 {
        self.lineage
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current(&self) -> Option<&EvaluationRecord> {
        self.current.as_ref()
    }

    pub fn is_restored(&self) -> bool {
        self.restored
    }

    /// Folds in the record the store held before a restart. The lineage never
    /// moves backwards, and a record already minted by this run stays current.
    pub fn restore(&mut self, stored: Option<EvaluationRecord>) {
        self.restored = true;
        let Some(record) = stored else {
            return;
        };
        self.lineage = self.lineage.max(record.lineage);
        if self.current.is_none() {
            self.phase = record.status.into();
            self.current = Some(record);
        }
    }

    /// Starts a new lineage, unconditionally replacing whatever was current.
    pub fn begin(
        &mut self,
        unit: UnitDescriptor,
        context_param: f64,
        now: DateTime<Utc>,
    ) -> EvaluationRecord {
        self.lineage += 1;
        let record = EvaluationRecord::pending(self.lineage, unit, context_param, now);
        self.phase = Phase::Pending;
        self.current = Some(record.clone());
        record
    }

    /// Whether a completion tagged with `lineage` may still be applied.
    pub fn is_current(&self, lineage: u64) -> bool {
        self.current
            .as_ref()
            .map(|record| record.status == RecordStatus::Pending && record.lineage == lineage)
            .unwrap_or(false)
    }

    pub fn settle(&mut self, record: EvaluationRecord) {
        self.phase = record.status.into();
        self.current = Some(record);
    }

    pub fn store_dirty(&self) -> bool {
        self.store_dirty
    }

    pub fn store_synced(&mut self) {
        self.store_dirty = false;
        self.store_error = None;
    }

    pub fn store_failed(&mut self, error: String) {
        self.store_dirty = true;
        self.store_error = Some(error);
    }

    /// User-facing notice while the store is degraded.
    pub fn notice(&self) -> Option<String> {
        self.store_error
            .as_ref()
            .map(|err| format!("Results are not being saved ({err}); showing the latest in-memory result"))
    }
}

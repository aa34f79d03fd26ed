use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, PoisonError,
};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use crate::{db::Database, models::EvaluationRecord};

/// Name of the one slot holding the current record.
pub const LAST_SCORE_SLOT: &str = "last_score";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("result store unavailable: {0}")]
    Unavailable(String),
    #[error("stored record could not be decoded: {0}")]
    Corrupt(String),
}

/// Durable single-slot storage for the current [`EvaluationRecord`].
///
/// `write` replaces the whole record and only returns once it is durable.
#[async_trait]
pub trait ResultStore: Send + Sync + 'static {
    async fn write(&self, record: &EvaluationRecord) -> Result<(), StoreError>;
    async fn read(&self) -> Result<Option<EvaluationRecord>, StoreError>;
}

#[derive(Clone)]
pub struct SqliteResultStore {
    db: Database,
}

impl SqliteResultStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ResultStore for SqliteResultStore {
    async fn write(&self, record: &EvaluationRecord) -> Result<(), StoreError> {
        let encoded =
            serde_json::to_string(record).map_err(|err| StoreError::Corrupt(err.to_string()))?;
        self.db
            .put_slot(LAST_SCORE_SLOT, encoded, Utc::now())
            .await
            .map_err(|err| StoreError::Unavailable(format!("{err:#}")))
    }

    async fn read(&self) -> Result<Option<EvaluationRecord>, StoreError> {
        let row = self
            .db
            .get_slot(LAST_SCORE_SLOT)
            .await
            .map_err(|err| StoreError::Unavailable(format!("{err:#}")))?;

        row.map(|row| {
            serde_json::from_str(&row.value).map_err(|err| StoreError::Corrupt(err.to_string()))
        })
        .transpose()
    }
}

/// Process-local store used for ephemeral runs. It can be switched offline
/// to simulate a failing persistence layer.
#[derive(Default)]
pub struct MemoryResultStore {
    slot: Mutex<Option<EvaluationRecord>>,
    offline: AtomicBool,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store is offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn write(&self, record: &EvaluationRecord) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(record.clone());
        Ok(())
    }

    async fn read(&self) -> Result<Option<EvaluationRecord>, StoreError> {
        self.ensure_online()?;
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slot.clone())
    }
}

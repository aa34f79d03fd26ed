use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};
use tokio::sync::Mutex;

use crate::{
    evaluator::{EvaluationClient, EvaluationError, ScorePayload},
    models::{EvaluationRecord, RecordStatus, UnitDescriptor},
    settings::validate_child_age,
    store::{ResultStore, StoreError},
};

use super::{
    messages::{LastScoreReply, NewUnit, NewUnitReply, Push, Reply, Request},
    registry::ListenerRegistry,
    state::{CoordinatorState, Phase},
};

pub const INTERRUPTED_MESSAGE: &str = "evaluation interrupted by coordinator restart";

/// Owns the evaluation lineage: accepts new units, runs one evaluation per
/// lineage in the background and publishes every transition.
#[derive(Clone)]
pub struct Coordinator {
    state: Arc<Mutex<CoordinatorState>>,
    store: Arc<dyn ResultStore>,
    client: EvaluationClient,
    listeners: ListenerRegistry,
    default_context_param: f64,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn ResultStore>,
        client: EvaluationClient,
        listeners: ListenerRegistry,
        default_context_param: f64,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(CoordinatorState::new())),
            store,
            client,
            listeners,
            default_context_param,
        }
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase()
    }

    pub async fn current(&self) -> Option<EvaluationRecord> {
        self.state.lock().await.current().cloned()
    }

    /// Picks up the record left by a previous run.
    ///
    /// A stored pending record lost its evaluation together with the previous
    /// process, so it is settled as an error instead of staying pending forever.
    /// While the store is unreachable this is retried before every request.
    pub async fn restore(&self) -> Option<EvaluationRecord> {
        let mut state = self.state.lock().await;
        if let Err(err) = self.restore_locked(&mut state).await {
            warn!("could not restore last record: {err}");
        }
        state.current().cloned()
    }

    async fn restore_locked(&self, state: &mut CoordinatorState) -> Result<(), StoreError> {
        if state.is_restored() {
            return Ok(());
        }
        let stored = self.store.read().await?;

        match stored {
            Some(record)
                if record.status == RecordStatus::Pending && !state.is_current(record.lineage) =>
            {
                warn!(
                    "evaluation of {} (lineage {}) was interrupted by a restart",
                    record.unit_url, record.lineage
                );
                let interrupted = record.failed(INTERRUPTED_MESSAGE, Utc::now());
                let adopted = state.current().is_none();
                state.restore(Some(interrupted.clone()));
                if adopted {
                    self.persist(state, &interrupted).await;
                }
            }
            other => {
                if let Some(record) = &other {
                    info!(
                        "restored {} record for {} (lineage {})",
                        record.status.as_str(),
                        record.unit_url,
                        record.lineage
                    );
                }
                state.restore(other);
            }
        }
        Ok(())
    }

    pub async fn handle(&self, request: Request) -> Reply {
        match request {
            Request::NewUnit(message) => Reply::NewUnit(self.new_unit(message).await),
            Request::GetLastScore => Reply::LastScore(self.last_score().await),
        }
    }

    pub async fn new_unit(&self, message: NewUnit) -> NewUnitReply {
        let Some(unit_url) = message
            .unit_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
        else {
            return NewUnitReply::rejected("unitUrl is required");
        };

        let context_param = message.context_param.unwrap_or(self.default_context_param);
        if let Err(err) = validate_child_age(context_param) {
            return NewUnitReply::rejected(err.to_string());
        }

        let unit = UnitDescriptor {
            unit_id: message.unit_id,
            unit_url,
            title: message.title,
        };

        let (record, notice) = {
            let mut state = self.state.lock().await;
            // A lineage minted before the old slot is seen could repeat one
            // observers already hold.
            if let Err(err) = self.restore_locked(&mut state).await {
                warn!("starting lineage without the stored record: {err}");
            }
            let superseded = (state.phase() == Phase::Pending).then(|| state.lineage());
            let record = state.begin(unit, context_param, Utc::now());
            if let Some(previous) = superseded {
                info!(
                    "lineage {} supersedes pending lineage {previous}",
                    record.lineage
                );
            }
            self.persist(&mut state, &record).await;
            (record, state.notice())
        };

        info!(
            "lineage {}: evaluating {} for context {}",
            record.lineage, record.unit_url, record.context_param
        );

        self.publish(&record);
        self.spawn_evaluation(record.clone());

        NewUnitReply::accepted(record, notice)
    }

    /// Two-tier read: the in-memory record first, then the durable slot.
    pub async fn last_score(&self) -> LastScoreReply {
        let mut state = self.state.lock().await;
        let restored = self.restore_locked(&mut state).await;
        if state.store_dirty() {
            if let Some(record) = state.current().cloned() {
                self.persist(&mut state, &record).await;
            }
        }

        let notice = state.notice();
        match (state.current().cloned(), restored) {
            (Some(record), _) => LastScoreReply {
                record: Some(record),
                error: None,
                notice,
            },
            (None, Ok(())) => LastScoreReply {
                record: None,
                error: None,
                notice,
            },
            (None, Err(err)) => {
                warn!("no cached record and store read failed: {err}");
                LastScoreReply {
                    record: None,
                    error: Some(err.to_string()),
                    notice,
                }
            }
        }
    }

    fn spawn_evaluation(&self, pending: EvaluationRecord) {
        let coordinator = self.clone();
        tokio::spawn(async move {
            let outcome = coordinator
                .client
                .evaluate(&pending.unit_url, pending.context_param)
                .await;
            coordinator.settle(pending, outcome).await;
        });
    }

    async fn settle(
        &self,
        pending: EvaluationRecord,
        outcome: Result<ScorePayload, EvaluationError>,
    ) {
        let record = {
            let mut state = self.state.lock().await;
            if !state.is_current(pending.lineage) {
                warn!(
                    "dropping stale result for {} (lineage {}, current {})",
                    pending.unit_url,
                    pending.lineage,
                    state.lineage()
                );
                return;
            }

            let now = Utc::now();
            let record = match outcome {
                Ok(payload) => pending.completed(payload, now),
                Err(err) => {
                    error!(
                        "lineage {}: evaluation of {} failed: {err}",
                        pending.lineage, pending.unit_url
                    );
                    pending.failed(err.to_string(), now)
                }
            };

            state.settle(record.clone());
            self.persist(&mut state, &record).await;
            record
        };

        info!(
            "lineage {}: {} settled as {}",
            record.lineage,
            record.unit_url,
            record.status.as_str()
        );
        self.publish(&record);
    }

    /// Best-effort store write. On failure the record stays cached and the
    /// slot is marked dirty so a later call can catch it up.
    async fn persist(&self, state: &mut CoordinatorState, record: &EvaluationRecord) {
        match self.store.write(record).await {
            Ok(()) => {
                if state.store_dirty() {
                    info!("result store reachable again, slot caught up");
                }
                state.store_synced();
            }
            Err(err) => {
                warn!(
                    "lineage {}: keeping record in memory only: {err}",
                    record.lineage
                );
                state.store_failed(err.to_string());
            }
        }
    }

    fn publish(&self, record: &EvaluationRecord) {
        let delivered = self.listeners.broadcast(&Push::ResultUpdated {
            record: record.clone(),
        });
        info!(
            "lineage {}: {} update delivered to {delivered} context(s)",
            record.lineage,
            record.status.as_str()
        );
    }
}

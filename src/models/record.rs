use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::evaluator::{
    scoring::{normalize_score, SuitabilityLabel},
    ScorePayload,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Done,
    Error,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Done => "done",
            RecordStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RecordStatus::Pending)
    }

    fn rank(&self) -> u8 {
        match self {
            RecordStatus::Pending => 0,
            RecordStatus::Done | RecordStatus::Error => 1,
        }
    }
}

/// The single current evaluation, as persisted in the result slot and pushed
/// to every observer.
///
/// Records are never patched. A completion builds a fresh record from the
/// pending one through [`EvaluationRecord::completed`] or
/// [`EvaluationRecord::failed`], and a new unit always starts from
/// [`EvaluationRecord::pending`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRecord {
    /// Token of the coordinator lineage that minted this record.
    #[serde(default)]
    pub lineage: u64,
    pub unit_id: Option<String>,
    pub unit_url: String,
    pub title: Option<String>,
    pub context_param: f64,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
}

/// Identity of a unit as reported by an observer.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitDescriptor {
    pub unit_id: Option<String>,
    pub unit_url: String,
    pub title: Option<String>,
}

impl EvaluationRecord {
    pub fn pending(
        lineage: u64,
        unit: UnitDescriptor,
        context_param: f64,
        started_at: DateTime<Utc>,
    ) -> Self {
        let label = SuitabilityLabel::AnalysisPending;
        Self {
            lineage,
            unit_id: unit.unit_id,
            unit_url: unit.unit_url,
            title: unit.title,
            context_param,
            status: RecordStatus::Pending,
            primary_score: None,
            risk_score: None,
            normalized_score: None,
            label: Some(label.as_str().to_string()),
            reasons: label.reasons(),
            raw_result: None,
            error: None,
            started_at,
            received_at: None,
        }
    }

    pub fn completed(&self, payload: ScorePayload, received_at: DateTime<Utc>) -> Self {
        let normalized = normalize_score(Some(payload.primary_score));
        let label = SuitabilityLabel::from_normalized(normalized);
        Self {
            lineage: self.lineage,
            unit_id: self.unit_id.clone(),
            unit_url: self.unit_url.clone(),
            title: self.title.clone(),
            context_param: self.context_param,
            status: RecordStatus::Done,
            primary_score: Some(payload.primary_score),
            risk_score: Some(payload.risk_score),
            normalized_score: normalized,
            label: Some(label.as_str().to_string()),
            reasons: label.reasons(),
            raw_result: Some(payload.raw),
            error: None,
            started_at: self.started_at,
            received_at: Some(received_at),
        }
    }

    pub fn failed(&self, message: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            lineage: self.lineage,
            unit_id: self.unit_id.clone(),
            unit_url: self.unit_url.clone(),
            title: self.title.clone(),
            context_param: self.context_param,
            status: RecordStatus::Error,
            primary_score: None,
            risk_score: None,
            normalized_score: None,
            label: None,
            reasons: Vec::new(),
            raw_result: None,
            error: Some(message.into()),
            started_at: self.started_at,
            received_at: Some(received_at),
        }
    }

    /// Whether the status agrees with which fields are present.
    pub fn is_consistent(&self) -> bool {
        let scored = self.primary_score.is_some() && self.risk_score.is_some();
        let unscored = self.primary_score.is_none() && self.risk_score.is_none();
        match self.status {
            RecordStatus::Pending => unscored && self.error.is_none(),
            RecordStatus::Done => scored && self.error.is_none(),
            RecordStatus::Error => unscored && self.error.is_some(),
        }
    }

    /// Ordering used by observers when a push and a poll race each other.
    pub fn supersedes(&self, other: &EvaluationRecord) -> bool {
        match self.lineage.cmp(&other.lineage) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => self.status.rank() > other.status.rank(),
        }
    }

    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|title| !title.trim().is_empty())
            .unwrap_or(&self.unit_url)
    }
}

use serde::{Deserialize, Serialize};

use crate::models::EvaluationRecord;

/// Announcement that an observer is now looking at a unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewUnit {
    #[serde(default)]
    pub unit_id: Option<String>,
    #[serde(default)]
    pub unit_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub context_param: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    NewUnit(NewUnit),
    GetLastScore,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewUnitReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<EvaluationRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set while the result store is degraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl NewUnitReply {
    pub fn accepted(record: EvaluationRecord, notice: Option<String>) -> Self {
        Self {
            ok: true,
            record: Some(record),
            error: None,
            notice,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            record: None,
            error: Some(error.into()),
            notice: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastScoreReply {
    pub record: Option<EvaluationRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    NewUnit(NewUnitReply),
    LastScore(LastScoreReply),
}

/// Unsolicited messages from the coordinator to every reachable context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Push {
    ResultUpdated { record: EvaluationRecord },
}

impl Push {
    pub fn record(&self) -> &EvaluationRecord {
        match self {
            Push::ResultUpdated { record } => record,
        }
    }

    pub fn into_record(self) -> EvaluationRecord {
        match self {
            Push::ResultUpdated { record } => record,
        }
    }
}

pub mod http;
pub mod payload;
pub mod scoring;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use log::{info, warn};
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;

pub use http::HttpBackend;
pub use payload::parse_payload;

/// Hard cap on a single evaluation, matching the slowest pipeline runs.
pub const DEFAULT_EVALUATION_TIMEOUT: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, PartialEq)]
pub struct ScorePayload {
    pub primary_score: f64,
    pub risk_score: f64,
    /// The unmodified response, kept for detail rendering.
    pub raw: Value,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("evaluation timed out after {0:?}")]
    Timeout(Duration),
    #[error("{}", remote_message(.code, .message))]
    Remote { code: Option<u16>, message: String },
    #[error("malformed evaluation payload: {0}")]
    BadPayload(String),
}

fn remote_message(code: &Option<u16>, message: &str) -> String {
    match code {
        Some(code) => format!("evaluator returned {code}: {message}"),
        None => format!("evaluator unreachable: {message}"),
    }
}

/// The remote pipeline that turns a unit locator into scores.
#[async_trait]
pub trait EvaluationBackend: Send + Sync + 'static {
    async fn evaluate(
        &self,
        unit_url: &str,
        context_param: f64,
    ) -> Result<ScorePayload, EvaluationError>;

    /// Whether the pipeline answers at all. Backends without a probe report healthy.
    async fn health(&self) -> bool {
        true
    }
}

/// Single-attempt, time-bounded access to an [`EvaluationBackend`].
#[derive(Clone)]
pub struct EvaluationClient {
    backend: Arc<dyn EvaluationBackend>,
    timeout: Duration,
}

impl EvaluationClient {
    pub fn new(backend: Arc<dyn EvaluationBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn evaluate(
        &self,
        unit_url: &str,
        context_param: f64,
    ) -> Result<ScorePayload, EvaluationError> {
        let started = Instant::now();
        info!("evaluating {unit_url} (context {context_param})");

        // Dropping the backend future on timeout aborts the underlying request.
        match tokio::time::timeout(self.timeout, self.backend.evaluate(unit_url, context_param))
            .await
        {
            Ok(Ok(payload)) => {
                info!(
                    "evaluation of {unit_url} finished in {}s",
                    started.elapsed().as_secs()
                );
                Ok(payload)
            }
            Ok(Err(err)) => {
                warn!("evaluation of {unit_url} failed: {err}");
                Err(err)
            }
            Err(_) => {
                warn!(
                    "evaluation of {unit_url} exceeded {}s",
                    self.timeout.as_secs()
                );
                Err(EvaluationError::Timeout(self.timeout))
            }
        }
    }

    pub async fn health(&self) -> bool {
        self.backend.health().await
    }
}

//! Shared fixtures for the coordination integration tests.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{json, Value};

use mindsafe_lib::{
    coordinator::{serve, Coordinator, CoordinatorHandle, ListenerRegistry},
    evaluator::{
        parse_payload, EvaluationBackend, EvaluationClient, EvaluationError, ScorePayload,
    },
    observer::Surface,
    store::ResultStore,
};

pub const DEFAULT_AGE: f64 = 4.0;

#[derive(Clone)]
pub enum Outcome {
    Payload(Value),
    Fail(EvaluationError),
    Hang,
}

/// Backend answering each url after a fixed delay with a scripted outcome.
/// Unscripted urls fail with a remote error.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<HashMap<String, (Duration, Outcome)>>,
    calls: Mutex<Vec<(String, f64)>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answer(&self, url: &str, after: Duration, outcome: Outcome) {
        self.script
            .lock()
            .unwrap()
            .insert(url.to_string(), (after, outcome));
    }

    pub fn calls(&self) -> Vec<(String, f64)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EvaluationBackend for ScriptedBackend {
    async fn evaluate(
        &self,
        unit_url: &str,
        context_param: f64,
    ) -> Result<ScorePayload, EvaluationError> {
        self.calls
            .lock()
            .unwrap()
            .push((unit_url.to_string(), context_param));
        let scripted = self.script.lock().unwrap().get(unit_url).cloned();
        let Some((after, outcome)) = scripted else {
            return Err(EvaluationError::Remote {
                code: Some(404),
                message: format!("nothing scripted for {unit_url}"),
            });
        };

        tokio::time::sleep(after).await;
        match outcome {
            Outcome::Payload(value) => parse_payload(value),
            Outcome::Fail(err) => Err(err),
            Outcome::Hang => std::future::pending().await,
        }
    }
}

pub fn flat_scores(dev_score: f64, brainrot_index: f64) -> Outcome {
    Outcome::Payload(json!({
        "dev_score": dev_score,
        "brainrot_index": brainrot_index,
    }))
}

pub struct Harness {
    pub coordinator: Coordinator,
    pub handle: CoordinatorHandle,
    pub task: tokio::task::JoinHandle<()>,
}

pub async fn start(
    backend: Arc<ScriptedBackend>,
    store: Arc<dyn ResultStore>,
    timeout: Duration,
) -> Harness {
    let coordinator = Coordinator::new(
        store,
        EvaluationClient::new(backend, timeout),
        ListenerRegistry::new(),
        DEFAULT_AGE,
    );
    coordinator.restore().await;
    let (handle, task) = serve(coordinator.clone());
    Harness {
        coordinator,
        handle,
        task,
    }
}

/// Surface that records every paint; mounting can be toggled.
#[derive(Clone, Default)]
pub struct RecordingSurface {
    painted: Arc<Mutex<Vec<String>>>,
    unmounted: bool,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn painted(&self) -> Vec<String> {
        self.painted.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.painted.lock().unwrap().last().cloned()
    }
}

impl Surface for RecordingSurface {
    fn is_mounted(&self) -> bool {
        !self.unmounted
    }

    fn paint(&mut self, content: &str) {
        self.painted.lock().unwrap().push(content.to_string());
    }
}

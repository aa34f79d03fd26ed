pub mod coordinator;
pub mod db;
pub mod evaluator;
pub mod models;
pub mod observer;
pub mod render;
pub mod settings;
pub mod store;
pub mod utils;
pub mod viewer;

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use log::info;
use tokio::task::JoinHandle;

use coordinator::{serve, Coordinator, CoordinatorHandle, ListenerRegistry};
use db::Database;
use evaluator::{http::HttpBackend, EvaluationBackend, EvaluationClient};
use settings::SettingsStore;
use store::{MemoryResultStore, ResultStore, SqliteResultStore};
use viewer::StatusViewer;

pub const DATA_DIR_ENV: &str = "MINDSAFE_DATA_DIR";

const DB_FILE: &str = "mindsafe.sqlite3";
pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub data_dir: PathBuf,
    /// Keep results in memory only; nothing survives the process.
    pub ephemeral: bool,
}

/// Opens the result store described by `options`, plus the database behind
/// it when there is one.
pub fn open_store(options: &LaunchOptions) -> Result<(Arc<dyn ResultStore>, Option<Database>)> {
    if options.ephemeral {
        info!("ephemeral run; results stay in memory");
        return Ok((Arc::new(MemoryResultStore::new()), None));
    }
    let database = Database::new(options.data_dir.join(DB_FILE))?;
    Ok((
        Arc::new(SqliteResultStore::new(database.clone())),
        Some(database),
    ))
}

/// Everything a running instance needs: settings, the result store and a
/// handle on the coordinator's message loop.
pub struct App {
    pub settings: SettingsStore,
    pub store: Arc<dyn ResultStore>,
    pub handle: CoordinatorHandle,
    coordinator_task: JoinHandle<()>,
    database: Option<Database>,
}

impl App {
    /// Starts against the HTTP evaluation service named in settings.
    pub async fn launch(options: LaunchOptions) -> Result<Self> {
        let settings = SettingsStore::new(options.data_dir.join(SETTINGS_FILE))?;
        let backend = HttpBackend::new(&settings.evaluator().api_url)?;
        info!("evaluation service at {}", backend.base_url());
        Self::launch_with_backend(options, settings, Arc::new(backend)).await
    }

    pub async fn launch_with_backend(
        options: LaunchOptions,
        settings: SettingsStore,
        backend: Arc<dyn EvaluationBackend>,
    ) -> Result<Self> {
        let (store, database) = open_store(&options)?;

        let client = EvaluationClient::new(backend, settings.evaluator().timeout());
        let coordinator = Coordinator::new(
            store.clone(),
            client,
            ListenerRegistry::new(),
            settings.child_age(),
        );
        coordinator.restore().await;

        let (handle, coordinator_task) = serve(coordinator);
        Ok(Self {
            settings,
            store,
            handle,
            coordinator_task,
            database,
        })
    }

    pub fn viewer(&self) -> StatusViewer {
        StatusViewer::new(Some(self.handle.clone()), self.store.clone())
    }

    /// Stops the message loop and the database worker.
    pub async fn shutdown(self) {
        self.coordinator_task.abort();
        let _ = self.coordinator_task.await;
        if let Some(database) = &self.database {
            database.shutdown();
        }
        info!("shut down");
    }
}

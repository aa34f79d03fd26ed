use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::watch,
};
use tokio_util::sync::CancellationToken;

use mindsafe_lib::{
    coordinator::NewUnit,
    evaluator::{EvaluationBackend, HttpBackend},
    observer::{trackable_unit, ObserverConfig, PageSnapshot, StdoutSurface, UnitObserver},
    render::render_overlay,
    settings::{validate_child_age, SettingsStore},
    utils::init_logging,
    viewer::StatusViewer,
    open_store, App, LaunchOptions, DATA_DIR_ENV, SETTINGS_FILE,
};

#[derive(Parser)]
#[command(name = "mindsafe", version, about = "Suitability ratings for the video being watched")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
    /// Where settings and the result store live
    #[arg(long, global = true, env = DATA_DIR_ENV, default_value = ".mindsafe")]
    data_dir: PathBuf,
    /// Keep results in memory for this run only
    #[arg(long, global = true)]
    ephemeral: bool,
}

#[derive(Subcommand)]
enum Cmd {
    /// Follow page locations from stdin (`<url> [title]` per line) and render live
    Observe {
        #[arg(long)]
        age: Option<f64>,
    },
    /// Evaluate one video and wait for the result
    Evaluate {
        url: String,
        #[arg(long)]
        age: Option<f64>,
        #[arg(long)]
        title: Option<String>,
    },
    /// Show the latest evaluation
    Status,
    /// Store the default child age (0-18)
    SetAge { age: f64 },
    /// Check that the evaluation service answers
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let options = LaunchOptions {
        data_dir: cli.data_dir.clone(),
        ephemeral: cli.ephemeral,
    };

    match cli.cmd {
        Cmd::Observe { age } => observe(options, age).await,
        Cmd::Evaluate { url, age, title } => evaluate(options, url, age, title).await,
        Cmd::Status => {
            // Runs without a coordinator, so the viewer reads the store directly.
            let (store, database) = open_store(&options)?;
            println!("{}", StatusViewer::new(None, store).open().await);
            if let Some(database) = database {
                database.shutdown();
            }
            Ok(())
        }
        Cmd::SetAge { age } => {
            let settings = SettingsStore::new(cli.data_dir.join(SETTINGS_FILE))?;
            settings.update_child_age(age)?;
            println!("default age set to {age}");
            Ok(())
        }
        Cmd::Health => {
            let settings = SettingsStore::new(cli.data_dir.join(SETTINGS_FILE))?;
            let api_url = settings.evaluator().api_url;
            let backend = HttpBackend::new(&api_url)?;
            if backend.health().await {
                println!("evaluation service at {api_url} is up");
                Ok(())
            } else {
                bail!("evaluation service at {api_url} is not answering")
            }
        }
    }
}

async fn observe(options: LaunchOptions, age: Option<f64>) -> Result<()> {
    let app = App::launch(options).await?;
    let mut config = ObserverConfig::from_settings(&app.settings.observer());
    if let Some(age) = age {
        config.context_param = Some(validate_child_age(age)?);
    }

    let (page_tx, page_rx) = watch::channel(PageSnapshot::default());
    let cancel = CancellationToken::new();
    let observer = UnitObserver::new(app.handle.clone(), page_rx, StdoutSurface::new(), config)
        .with_fallback(Arc::clone(&app.store));
    let observer_task = tokio::spawn(observer.run(cancel.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("failed to read stdin")? {
                Some(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let (location, title) = match line.split_once(char::is_whitespace) {
                        Some((location, title)) => (location, Some(title.trim().to_string())),
                        None => (line, None),
                    };
                    page_tx.send_replace(PageSnapshot::new(location, title));
                }
                None => {
                    info!("stdin closed; stopping observer");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted; stopping observer");
                break;
            }
        }
    }

    cancel.cancel();
    if let Err(err) = observer_task.await {
        warn!("observer task failed: {err}");
    }
    app.shutdown().await;
    Ok(())
}

async fn evaluate(
    options: LaunchOptions,
    url: String,
    age: Option<f64>,
    title: Option<String>,
) -> Result<()> {
    let context_param = age.map(validate_child_age).transpose()?;
    let app = App::launch(options).await?;
    let mut subscription = app.handle.subscribe();

    let (unit_id, unit_url) = match trackable_unit(&url) {
        Some(unit) => (Some(unit.unit_id), unit.unit_url),
        None => (None, url),
    };
    let reply = app
        .handle
        .new_unit(NewUnit {
            unit_id,
            unit_url: Some(unit_url),
            title,
            context_param,
        })
        .await?;
    let Some(mut record) = reply.record.filter(|_| reply.ok) else {
        bail!(
            "evaluation was not started: {}",
            reply.error.as_deref().unwrap_or("no reason given")
        );
    };
    let notice = reply.notice;
    println!("{}", render_overlay(&record, notice.as_deref()));

    let lineage = record.lineage;
    while !record.status.is_terminal() {
        tokio::select! {
            push = subscription.recv() => match push {
                Some(push) if push.record().lineage == lineage => record = push.into_record(),
                Some(_) => {}
                None => bail!("coordinator stopped before the evaluation finished"),
            },
            _ = tokio::signal::ctrl_c() => {
                bail!("interrupted while waiting for the evaluation");
            }
        }
    }

    println!("{}", render_overlay(&record, notice.as_deref()));
    drop(subscription);
    app.shutdown().await;
    Ok(())
}

use std::sync::Arc;

use tokio::{
    sync::watch,
    time::{interval, Duration, Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    coordinator::{CoordinatorHandle, NewUnit, Push, Subscription},
    models::EvaluationRecord,
    settings::ObserverSettings,
    store::ResultStore,
};

use super::{
    location::{trackable_unit, PageSnapshot, TrackableUnit},
    mount::{wait_for_mount, MountPolicy, Surface},
    view::ObservedView,
};

// Set to true to trace navigation and reconciliation in the observer
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverConfig {
    pub location_poll: Duration,
    pub score_poll: Duration,
    pub mount: MountPolicy,
    /// Sent with every `NEW_UNIT`; `None` leaves the coordinator's default.
    pub context_param: Option<f64>,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self::from_settings(&ObserverSettings::default())
    }
}

impl ObserverConfig {
    pub fn from_settings(settings: &ObserverSettings) -> Self {
        Self {
            location_poll: Duration::from_millis(settings.location_poll_ms.max(1)),
            score_poll: Duration::from_millis(settings.score_poll_ms.max(1)),
            mount: MountPolicy::default(),
            context_param: Some(settings.child_age),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MountState {
    Waiting,
    Mounted,
    GaveUp,
}

/// Per-page observer: follows the page location, announces each new unit to
/// the coordinator and keeps its surface in sync with the latest record.
pub struct UnitObserver<S: Surface> {
    handle: CoordinatorHandle,
    page: watch::Receiver<PageSnapshot>,
    surface: S,
    config: ObserverConfig,
    fallback: Option<Arc<dyn ResultStore>>,
    view: ObservedView,
    subscription: Option<Subscription>,
    unit: Option<TrackableUnit>,
    mount: MountState,
    polling: bool,
}

impl<S: Surface> UnitObserver<S> {
    pub fn new(
        handle: CoordinatorHandle,
        page: watch::Receiver<PageSnapshot>,
        surface: S,
        config: ObserverConfig,
    ) -> Self {
        Self {
            handle,
            page,
            surface,
            config,
            fallback: None,
            view: ObservedView::new(),
            subscription: None,
            unit: None,
            mount: MountState::Waiting,
            polling: false,
        }
    }

    /// Store read directly when the coordinator cannot be reached.
    pub fn with_fallback(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.fallback = Some(store);
        self
    }

    /// Runs until `cancel` fires, then hands back the surface and final view.
    pub async fn run(mut self, cancel: CancellationToken) -> (S, ObservedView) {
        let mut location_tick = ticker(self.config.location_poll);
        let mut score_tick = ticker(self.config.score_poll);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log_debug!("observer shutting down");
                    break;
                }
                _ = location_tick.tick() => {
                    let snapshot = self.page.borrow().clone();
                    if self.check_location(snapshot).await {
                        score_tick.reset();
                    }
                }
                push = next_push(&mut self.subscription) => match push {
                    Some(push) => self.on_push(push),
                    None => {
                        log_warn!("push channel closed; relying on polls");
                        self.subscription = None;
                    }
                },
                _ = score_tick.tick(), if self.polling => {
                    self.reconcile().await;
                }
            }
        }

        (self.surface, self.view)
    }

    /// Returns true when a `NEW_UNIT` went out.
    async fn check_location(&mut self, snapshot: PageSnapshot) -> bool {
        let Some(unit) = trackable_unit(&snapshot.location) else {
            if self.unit.take().is_some() {
                log_info!("left tracked unit; observer idle");
                self.polling = false;
            }
            return false;
        };
        if self.unit.as_ref() == Some(&unit) {
            return false;
        }

        log_info!("now observing {}", unit.unit_url);
        if self.subscription.is_none() {
            self.subscription = Some(self.handle.subscribe());
        }
        let descriptor = unit.descriptor(snapshot.title);
        self.unit = Some(unit);
        self.polling = true;

        let message = NewUnit {
            unit_id: descriptor.unit_id,
            unit_url: Some(descriptor.unit_url),
            title: descriptor.title,
            context_param: self.config.context_param,
        };
        match self.handle.new_unit(message).await {
            Ok(reply) if reply.ok => {
                self.view.set_notice(reply.notice);
                if let Some(record) = reply.record {
                    self.view.reset(record);
                }
            }
            Ok(reply) => {
                log_warn!(
                    "coordinator rejected unit: {}",
                    reply.error.as_deref().unwrap_or("no reason given")
                );
                self.polling = false;
            }
            Err(err) => {
                log_warn!("NEW_UNIT failed: {err}; reading store directly");
                self.read_fallback().await;
            }
        }

        self.ensure_mounted().await;
        self.refresh();
        true
    }

    fn on_push(&mut self, push: Push) {
        let record = push.into_record();
        log_debug!(
            "push for lineage {} ({})",
            record.lineage,
            record.status.as_str()
        );
        self.accept(record);
    }

    async fn reconcile(&mut self) {
        match self.handle.last_score().await {
            Ok(reply) => {
                let notice_changed = self.view.set_notice(reply.notice);
                if let Some(record) = reply.record {
                    self.accept(record);
                }
                if notice_changed {
                    self.refresh();
                }
            }
            Err(err) => {
                log_debug!("GET_LAST_SCORE failed: {err}; reading store directly");
                self.read_fallback().await;
            }
        }
    }

    async fn read_fallback(&mut self) {
        let Some(store) = self.fallback.clone() else {
            return;
        };
        match store.read().await {
            Ok(Some(record)) => self.accept(record),
            Ok(None) => {}
            Err(err) => log_error!("coordinator and store both unreachable: {err}"),
        }
    }

    fn accept(&mut self, record: EvaluationRecord) {
        if self.unit.is_none() {
            return;
        }
        if self.view.apply(record) {
            self.refresh();
        }
        if self.view.is_settled() && self.polling {
            log_debug!("displayed record settled; polling stopped");
            self.polling = false;
        }
    }

    async fn ensure_mounted(&mut self) {
        if self.mount != MountState::Waiting {
            return;
        }
        self.mount = if wait_for_mount(&self.surface, self.config.mount).await {
            MountState::Mounted
        } else {
            MountState::GaveUp
        };
    }

    fn refresh(&mut self) {
        if self.mount != MountState::Mounted {
            return;
        }
        if let Some(content) = self.view.render() {
            self.surface.paint(&content);
        }
    }
}

fn ticker(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn next_push(subscription: &mut Option<Subscription>) -> Option<Push> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

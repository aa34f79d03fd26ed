use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use super::{
    controller::Coordinator,
    messages::{LastScoreReply, NewUnit, NewUnitReply, Push, Reply, Request},
    registry::{ContextId, ListenerRegistry},
};

// Set to true to trace every request crossing the bus
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const REQUEST_QUEUE: usize = 64;
const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("coordinator is not reachable")]
    Unavailable,
    #[error("coordinator dropped the request")]
    ReplyDropped,
    #[error("coordinator did not answer within {0:?}")]
    ReplyTimeout(Duration),
    #[error("coordinator answered with an unexpected reply")]
    Mismatched,
}

/// Requests the message loop has handled, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestCounts {
    pub new_unit: usize,
    pub last_score: usize,
}

#[derive(Default)]
struct Tally {
    new_unit: AtomicUsize,
    last_score: AtomicUsize,
}

impl Tally {
    fn record(&self, request: &Request) {
        let counter = match request {
            Request::NewUnit(_) => &self.new_unit,
            Request::GetLastScore => &self.last_score,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RequestCounts {
        RequestCounts {
            new_unit: self.new_unit.load(Ordering::Relaxed),
            last_score: self.last_score.load(Ordering::Relaxed),
        }
    }
}

struct Envelope {
    request: Request,
    reply_to: oneshot::Sender<Reply>,
}

/// Sending side of the coordinator's message channel, one clone per context.
#[derive(Clone)]
pub struct CoordinatorHandle {
    requests: mpsc::Sender<Envelope>,
    listeners: ListenerRegistry,
    reply_timeout: Duration,
    tally: Arc<Tally>,
}

impl CoordinatorHandle {
    pub fn with_reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    pub fn request_counts(&self) -> RequestCounts {
        self.tally.snapshot()
    }

    pub fn is_connected(&self) -> bool {
        !self.requests.is_closed()
    }

    pub async fn request(&self, request: Request) -> Result<Reply, TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(Envelope {
                request,
                reply_to: reply_tx,
            })
            .await
            .map_err(|_| TransportError::Unavailable)?;

        match tokio::time::timeout(self.reply_timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(TransportError::ReplyDropped),
            Err(_) => Err(TransportError::ReplyTimeout(self.reply_timeout)),
        }
    }

    pub async fn new_unit(&self, message: NewUnit) -> Result<NewUnitReply, TransportError> {
        match self.request(Request::NewUnit(message)).await? {
            Reply::NewUnit(reply) => Ok(reply),
            Reply::LastScore(_) => Err(TransportError::Mismatched),
        }
    }

    pub async fn last_score(&self) -> Result<LastScoreReply, TransportError> {
        match self.request(Request::GetLastScore).await? {
            Reply::LastScore(reply) => Ok(reply),
            Reply::NewUnit(_) => Err(TransportError::Mismatched),
        }
    }

    /// Registers the calling context for `RESULT_UPDATED` pushes.
    pub fn subscribe(&self) -> Subscription {
        let (id, receiver) = self.listeners.register();
        Subscription {
            id,
            receiver,
            listeners: self.listeners.clone(),
        }
    }
}

/// Push receiver that unregisters itself when the context goes away.
pub struct Subscription {
    id: ContextId,
    receiver: mpsc::UnboundedReceiver<Push>,
    listeners: ListenerRegistry,
}

impl Subscription {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<Push> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.listeners.unregister(&self.id);
    }
}

/// Runs the coordinator's message loop.
///
/// Requests are handled one at a time in arrival order. Evaluations run in
/// their own tasks, so a slow evaluation never holds up a reply.
pub fn serve(coordinator: Coordinator) -> (CoordinatorHandle, JoinHandle<()>) {
    let (requests_tx, mut requests_rx) = mpsc::channel::<Envelope>(REQUEST_QUEUE);
    let listeners = coordinator.listeners().clone();
    let tally = Arc::new(Tally::default());
    let served = Arc::clone(&tally);

    let handle = tokio::spawn(async move {
        log_info!("coordinator message loop started");
        while let Some(envelope) = requests_rx.recv().await {
            log_debug!("handling {:?}", envelope.request);
            served.record(&envelope.request);
            let reply = coordinator.handle(envelope.request).await;
            if envelope.reply_to.send(reply).is_err() {
                log_warn!("requester went away before the reply was sent");
            }
        }
        log_info!(
            "coordinator message loop stopped: {:?}",
            served.snapshot()
        );
    });

    (
        CoordinatorHandle {
            requests: requests_tx,
            listeners,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            tally,
        },
        handle,
    )
}

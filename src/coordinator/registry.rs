use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use log::debug;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::Push;

pub type ContextId = Uuid;

/// Push handles of every context that is currently listening.
///
/// Broadcasts snapshot the registry at send time; handles whose receiver is
/// gone are pruned on the way.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<HashMap<ContextId, mpsc::UnboundedSender<Push>>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> (ContextId, mpsc::UnboundedReceiver<Push>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        debug!("context {id} registered for pushes");
        (id, rx)
    }

    pub fn unregister(&self, id: &ContextId) {
        if self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
        {
            debug!("context {id} unregistered");
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Best-effort delivery; returns how many contexts accepted the push.
    pub fn broadcast(&self, push: &Push) -> usize {
        let targets: Vec<(ContextId, mpsc::UnboundedSender<Push>)> = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0;
        for (id, tx) in targets {
            if tx.send(push.clone()).is_ok() {
                delivered += 1;
            } else {
                self.unregister(&id);
            }
        }
        delivered
    }
}

use std::sync::Arc;

use log::{info, warn};

use crate::{coordinator::CoordinatorHandle, render::render_status, store::ResultStore};

/// On-demand status view. Renders once per [`open`](StatusViewer::open) and
/// never polls or announces units.
pub struct StatusViewer {
    handle: Option<CoordinatorHandle>,
    store: Arc<dyn ResultStore>,
}

impl StatusViewer {
    pub fn new(handle: Option<CoordinatorHandle>, store: Arc<dyn ResultStore>) -> Self {
        Self { handle, store }
    }

    pub async fn open(&self) -> String {
        if let Some(handle) = &self.handle {
            match handle.last_score().await {
                Ok(reply) => {
                    let notice = reply.notice.or(reply.error);
                    return render_status(reply.record.as_ref(), notice.as_deref());
                }
                Err(err) => info!("coordinator unreachable ({err}); reading store directly"),
            }
        }

        match self.store.read().await {
            Ok(record) => render_status(record.as_ref(), None),
            Err(err) => {
                warn!("status view has no data: {err}");
                render_status(None, Some(&err.to_string()))
            }
        }
    }
}

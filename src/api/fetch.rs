use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::taxonomy::{AnomalyRow, rows_from_payload};

use super::client::{ApiClient, ApiResult};

/// The two collaborator calls the explorer needs on activation.
pub trait ExplorerSource: Send + Sync + 'static {
    fn anomaly_list(&self) -> impl Future<Output = ApiResult<Value>> + Send;
    fn dynamic_tree(&self) -> impl Future<Output = ApiResult<Value>> + Send;
}

impl ExplorerSource for ApiClient {
    fn anomaly_list(&self) -> impl Future<Output = ApiResult<Value>> + Send {
        ApiClient::anomaly_list(self)
    }

    fn dynamic_tree(&self) -> impl Future<Output = ApiResult<Value>> + Send {
        ApiClient::dynamic_tree(self)
    }
}

#[derive(Debug)]
pub enum FetchEvent {
    /// Normalized rows from the anomaly list.
    AnomalyList(ApiResult<Vec<AnomalyRow>>),
    DynamicTree(ApiResult<Value>),
}

/// Handle to the two in-flight explorer fetches.
///
/// Each fetch reports as soon as it resolves, independently of the other.
/// Cancelling (or dropping) the handle aborts whatever is still running and
/// discards anything not yet received.
pub struct FetchTask {
    rx: UnboundedReceiver<FetchEvent>,
    handles: Vec<JoinHandle<()>>,
    pending: usize,
}

impl FetchTask {
    pub fn try_next(&mut self) -> Option<FetchEvent> {
        let event = self.rx.try_recv().ok()?;
        self.pending = self.pending.saturating_sub(1);
        Some(event)
    }

    /// True once both results were received, or once every task has ended
    /// and nothing is left to receive (a task that died before reporting).
    pub fn is_done(&self) -> bool {
        self.pending == 0
            || (self.handles.iter().all(JoinHandle::is_finished) && self.rx.is_empty())
    }

    pub fn cancel(&mut self) {
        if self.handles.iter().any(|handle| !handle.is_finished()) {
            debug!("cancelling explorer fetch");
        }
        for handle in &self.handles {
            handle.abort();
        }
        self.rx.close();
        self.pending = 0;
    }
}

impl Drop for FetchTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Issues both explorer fetches concurrently on `handle`.
pub fn spawn_explorer_fetch<S: ExplorerSource>(handle: &Handle, source: Arc<S>) -> FetchTask {
    let (tx, rx) = mpsc::unbounded_channel();

    let rows_tx = tx.clone();
    let rows_source = Arc::clone(&source);
    let rows = handle.spawn(async move {
        let result = rows_source
            .anomaly_list()
            .await
            .map(|payload| rows_from_payload(&payload));
        let _ = rows_tx.send(FetchEvent::AnomalyList(result));
    });

    let tree = handle.spawn(async move {
        let result = source.dynamic_tree().await;
        let _ = tx.send(FetchEvent::DynamicTree(result));
    });

    FetchTask {
        rx,
        handles: vec![rows, tree],
        pending: 2,
    }
}

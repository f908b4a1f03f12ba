//! Serialized background execution.

use crate::error::{SyncError, SyncResult};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs blocking jobs one at a time, in submission order, off the caller's
/// thread.
pub(crate) struct SerialQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl SerialQueue {
    /// Starts the queue's worker on the current tokio runtime.
    pub(crate) fn start(label: String) -> SyncResult<Self> {
        let handle = Handle::try_current().map_err(|_| SyncError::NoRuntime)?;
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        handle.spawn(async move {
            while let Some(job) = rx.recv().await {
                if let Err(e) = tokio::task::spawn_blocking(job).await {
                    warn!("[{}] background job panicked: {}", label, e);
                }
            }
        });

        Ok(Self { tx })
    }

    /// Enqueues `job`. The returned completion resolves once it has run.
    pub(crate) fn submit(&self, job: impl FnOnce() + Send + 'static) -> Completion {
        let (done_tx, done_rx) = oneshot::channel();
        let wrapped: Job = Box::new(move || {
            job();
            let _ = done_tx.send(());
        });
        if self.tx.send(wrapped).is_err() {
            warn!("background queue closed, job dropped");
            return Completion::ready();
        }
        Completion {
            rx: Some(done_rx),
        }
    }
}

/// Resolves when a background operation has finished.
///
/// Dropping it does not cancel the operation.
#[derive(Debug)]
pub struct Completion {
    rx: Option<oneshot::Receiver<()>>,
}

impl Completion {
    /// A completion that is already resolved.
    pub fn ready() -> Self {
        Self { rx: None }
    }
}

impl Future for Completion {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match self.rx.as_mut() {
            // A dropped sender means the job panicked; either way it is over.
            Some(rx) => Pin::new(rx).poll(cx).map(|_| ()),
            None => Poll::Ready(()),
        }
    }
}

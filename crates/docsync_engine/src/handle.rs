//! One-shot result handles returned by the document services.

use crate::error::{SyncError, SyncResult};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// Creates a connected resolver/handle pair.
pub fn result_channel<T>() -> (Resolver<T>, ResultHandle<T>) {
    let (tx, rx) = oneshot::channel();
    (Resolver { tx }, ResultHandle { rx })
}

/// The producing half. Consumed by [`Resolver::resolve`], so a result is
/// delivered at most once.
#[derive(Debug)]
pub struct Resolver<T> {
    tx: oneshot::Sender<SyncResult<T>>,
}

impl<T> Resolver<T> {
    /// Delivers the result. A caller that dropped its handle is ignored.
    pub fn resolve(self, result: SyncResult<T>) {
        let _ = self.tx.send(result);
    }
}

/// The consuming half, handed to the caller.
///
/// Await it, or poll it without blocking with [`ResultHandle::try_result`].
/// If the operation is dropped without a result the handle yields
/// [`SyncError::Cancelled`].
#[derive(Debug)]
pub struct ResultHandle<T> {
    rx: oneshot::Receiver<SyncResult<T>>,
}

impl<T> ResultHandle<T> {
    /// Returns the result if it has arrived.
    pub fn try_result(&mut self) -> Option<SyncResult<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(SyncError::Cancelled)),
        }
    }
}

impl<T> Future for ResultHandle<T> {
    type Output = SyncResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(SyncError::Cancelled)))
    }
}

use futures::stream::{FuturesUnordered, StreamExt};
use std::{
    future::Future,
    pin::Pin,
    sync::Mutex,
};
use tokio::{sync::mpsc, task::JoinHandle};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// One of the two long-lived completion pipelines: a submission side that
/// never blocks on the network, a completion queue, and a single digest
/// task that drains it in FIFO completion order.
///
/// Generic over the call's output type `Out` (the in-flight call result,
/// tagged with whatever correlation data the caller needs: a learner id, a
/// `ref_idx`, etc). The digest closure owns all the state a completion needs
/// to mutate.
pub struct Pipeline<Out> {
    submit_tx: Mutex<Option<mpsc::UnboundedSender<BoxFuture<Out>>>>,
    digest_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<Out: Send + 'static> Pipeline<Out> {
    /// Spawn the digest worker and return a handle to the submission side.
    pub fn new<F, Fut>(digest: F) -> Self
    where
        F: Fn(Out) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (submit_tx, submit_rx) = mpsc::unbounded_channel();
        let digest_handle = tokio::spawn(Self::digest_loop(submit_rx, digest));
        Self {
            submit_tx: Mutex::new(Some(submit_tx)),
            digest_handle: Mutex::new(Some(digest_handle)),
        }
    }

    /// Hand an in-flight call to the pipeline. Never awaits the call itself:
    /// the call future starts running on the digest task, not here.
    pub fn submit(&self, call: impl Future<Output = Out> + Send + 'static) {
        // The digest task may have shut down already (post-`shutdown`); a
        // missing or closed sender there just means this call is silently
        // dropped.
        if let Some(submit_tx) = self.submit_tx.lock().unwrap().as_ref() {
            let _ = submit_tx.send(Box::pin(call));
        }
    }

    /// Stop accepting new submissions and wait for in-flight calls to drain
    /// through the digest loop.
    pub async fn shutdown(&self) {
        self.submit_tx.lock().unwrap().take();
        let handle = self.digest_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    async fn digest_loop<F, Fut>(mut submit_rx: mpsc::UnboundedReceiver<BoxFuture<Out>>, digest: F)
    where
        F: Fn(Out) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut in_flight: FuturesUnordered<BoxFuture<Out>> = FuturesUnordered::new();
        let mut closed = false;

        loop {
            if closed && in_flight.is_empty() {
                break;
            }

            tokio::select! {
                maybe_call = submit_rx.recv(), if !closed => {
                    match maybe_call {
                        Some(call) => in_flight.push(call),
                        None => closed = true,
                    }
                }
                Some(out) = in_flight.next(), if !in_flight.is_empty() => {
                    digest(out).await;
                }
            }
        }
    }
}

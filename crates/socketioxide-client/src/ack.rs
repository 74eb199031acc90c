//! Acknowledgement related types and functions.
//!
//! Here is the main type:
//!
//! - [`AckResponse`]: A [`Future`] of the data acknowledged by the server.
use std::{
    collections::HashMap,
    pin::Pin,
    sync::{Arc, Mutex, Weak},
    task::{Context, Poll},
    time::Duration,
};

use futures_core::Future;
use socketioxide_core::PayloadValue;
use tokio::{
    sync::oneshot::{self, Receiver, Sender},
    time::Timeout,
};

use crate::errors::AckError;

pub(crate) type AckResult = Result<Vec<PayloadValue>, AckError>;

/// The acknowledgements waiting for a server response, keyed by ack id.
#[derive(Debug, Default)]
pub(crate) struct PendingAcks(Mutex<HashMap<i64, Sender<AckResult>>>);

impl PendingAcks {
    /// Register a new pending ack and return its [`AckResponse`].
    pub fn register(this: &Arc<Self>, id: i64, timeout: Duration) -> AckResponse {
        let (tx, rx) = oneshot::channel();
        this.0.lock().unwrap().insert(id, tx);
        AckResponse {
            rx: tokio::time::timeout(timeout, rx),
            id,
            pending: Arc::downgrade(this),
        }
    }

    /// Resolve the pending ack `id`. Returns false if there is no such ack,
    /// it might have timed out.
    pub fn resolve(&self, id: i64, res: AckResult) -> bool {
        match self.0.lock().unwrap().remove(&id) {
            Some(tx) => tx.send(res).is_ok(),
            None => false,
        }
    }

    /// Cancel every pending ack except the ones selected by `keep`.
    pub fn cancel(&self, keep: impl Fn(i64) -> bool) {
        let mut acks = self.0.lock().unwrap();
        let ids: Vec<i64> = acks.keys().copied().filter(|id| !keep(*id)).collect();
        for id in ids {
            if let Some(tx) = acks.remove(&id) {
                tx.send(Err(AckError::Cancelled)).ok();
            }
        }
    }

    fn remove(&self, id: i64) {
        self.0.lock().unwrap().remove(&id);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

pin_project_lite::pin_project! {
    /// A [`Future`] of the data acknowledged by the server.
    ///
    /// It resolves with the ack arguments, or with:
    /// * [`AckError::Timeout`] if the server did not answer in time.
    /// * [`AckError::Cancelled`] if the namespace or the client was disconnected before.
    /// * [`AckError::Socket`] if the event could not be sent.
    ///
    /// Dropping it removes the pending acknowledgement.
    ///
    /// # Example
    /// ```no_run
    /// # use socketioxide_client::Client;
    /// # async fn doc(client: Client) {
    /// let res = client.emit_with_ack("sum", vec![2.into(), 3.into()], None).await;
    /// match res {
    ///     Ok(args) => println!("sum: {:?}", args),
    ///     Err(err) => eprintln!("no ack: {err}"),
    /// }
    /// # }
    /// ```
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct AckResponse {
        #[pin]
        rx: Timeout<Receiver<AckResult>>,
        id: i64,
        pending: Weak<PendingAcks>,
    }

    impl PinnedDrop for AckResponse {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if let Some(pending) = this.pending.upgrade() {
                pending.remove(*this.id);
            }
        }
    }
}

impl AckResponse {
    /// The ack id of the emitted event.
    pub fn id(&self) -> i64 {
        self.id
    }
}

impl Future for AckResponse {
    type Output = AckResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let project = self.project();
        match project.rx.poll(cx) {
            Poll::Ready(v) => {
                let v = match v {
                    Ok(Ok(v)) => v,
                    Ok(Err(_)) => Err(AckError::Cancelled),
                    Err(elapsed) => Err(elapsed.into()),
                };
                Poll::Ready(v)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for AckResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckResponse").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve() {
        let pending = Arc::new(PendingAcks::default());
        let res = PendingAcks::register(&pending, 1, Duration::from_secs(5));
        assert!(pending.resolve(1, Ok(vec![5.into()])));
        assert_eq!(res.await, Ok(vec![5.into()]));
        assert!(!pending.resolve(1, Ok(vec![])));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_removes_pending() {
        let pending = Arc::new(PendingAcks::default());
        let res = PendingAcks::register(&pending, 1, Duration::from_millis(2000));
        assert_eq!(res.await, Err(AckError::Timeout));
        assert_eq!(pending.len(), 0);
        assert!(!pending.resolve(1, Ok(vec![])));
    }

    #[tokio::test]
    async fn cancel() {
        let pending = Arc::new(PendingAcks::default());
        let res1 = PendingAcks::register(&pending, 1, Duration::from_secs(5));
        let res2 = PendingAcks::register(&pending, 2, Duration::from_secs(5));
        pending.cancel(|id| id == 2);
        assert_eq!(res1.await, Err(AckError::Cancelled));
        assert_eq!(pending.len(), 1);
        drop(res2);
        assert_eq!(pending.len(), 0);
    }
}

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{Envelope, NotificationEvent, NotificationSink, UserNotification};

/// Non-blocking, at-most-once event emission.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, event: NotificationEvent, payload: UserNotification);
}

/// Bounded queue drained by a background worker.
#[derive(Clone)]
pub struct QueueDispatcher {
    tx: mpsc::Sender<Envelope>,
}

impl QueueDispatcher {
    /// Spawn the worker. It exits once every dispatcher handle is dropped.
    pub fn spawn(sink: Arc<dyn NotificationSink>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Envelope>(capacity.max(1));
        let worker = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                match sink.deliver(&envelope).await {
                    Ok(()) => debug!(
                        event = envelope.event.as_str(),
                        user_id = %envelope.payload.id,
                        "notification delivered"
                    ),
                    Err(e) => warn!(
                        error = %e,
                        event = envelope.event.as_str(),
                        user_id = %envelope.payload.id,
                        "notification delivery failed; dropped"
                    ),
                }
            }
        });
        (Self { tx }, worker)
    }
}

impl NotificationDispatcher for QueueDispatcher {
    fn dispatch(&self, event: NotificationEvent, payload: UserNotification) {
        let user_id = payload.id;
        match self.tx.try_send(Envelope { event, payload }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(event = event.as_str(), %user_id, "notification queue full; dropped")
            }
            Err(TrySendError::Closed(_)) => {
                warn!(event = event.as_str(), %user_id, "notification worker gone; dropped")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;
    use uuid::Uuid;

    use super::*;

    #[derive(Default)]
    struct CollectingSink {
        seen: Mutex<Vec<(NotificationEvent, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationSink for CollectingSink {
        async fn deliver(&self, envelope: &Envelope) -> anyhow::Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push((envelope.event, envelope.payload.token.clone()));
            if self.fail {
                anyhow::bail!("mail service down");
            }
            Ok(())
        }
    }

    /// Holds every delivery until released.
    struct BlockedSink {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl NotificationSink for BlockedSink {
        async fn deliver(&self, _envelope: &Envelope) -> anyhow::Result<()> {
            self.release.notified().await;
            Ok(())
        }
    }

    fn payload(token: &str) -> UserNotification {
        UserNotification {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            full_name: "Doe John".into(),
            token: token.into(),
        }
    }

    #[tokio::test]
    async fn worker_delivers_in_order() {
        let sink = Arc::new(CollectingSink::default());
        let (dispatcher, worker) = QueueDispatcher::spawn(sink.clone(), 8);
        dispatcher.dispatch(NotificationEvent::UserCreated, payload("a"));
        dispatcher.dispatch(NotificationEvent::UserRequestedPasswordReset, payload("b"));
        drop(dispatcher);
        worker.await.unwrap();

        let seen = sink.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                (NotificationEvent::UserCreated, "a".to_string()),
                (NotificationEvent::UserRequestedPasswordReset, "b".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn delivery_failures_are_swallowed() {
        let sink = Arc::new(CollectingSink {
            fail: true,
            ..Default::default()
        });
        let (dispatcher, worker) = QueueDispatcher::spawn(sink.clone(), 8);
        dispatcher.dispatch(NotificationEvent::UserCreated, payload("a"));
        dispatcher.dispatch(NotificationEvent::UserCreated, payload("b"));
        drop(dispatcher);
        worker.await.unwrap();
        assert_eq!(sink.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let release = Arc::new(Notify::new());
        let sink = Arc::new(BlockedSink {
            release: release.clone(),
        });
        let (dispatcher, worker) = QueueDispatcher::spawn(sink, 1);

        let burst = tokio::time::timeout(Duration::from_secs(1), async {
            for i in 0..10 {
                dispatcher.dispatch(NotificationEvent::UserCreated, payload(&i.to_string()));
            }
        })
        .await;
        assert!(burst.is_ok(), "dispatch must never wait on delivery");

        drop(dispatcher);
        worker.abort();
        release.notify_waiters();
    }
}

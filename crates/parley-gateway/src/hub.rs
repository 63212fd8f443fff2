use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use parley_types::events::{ClientCommand, ServerEvent};

const EVENT_CAPACITY: usize = 1024;

/// Process-wide realtime hub. Fans inbound server events out to every
/// subscribed view and queues outbound commands for the connection.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    /// Every live subscription receives every event
    events_tx: broadcast::Sender<ServerEvent>,

    /// Drained by the connection's send task
    commands_tx: mpsc::UnboundedSender<ClientCommand>,

    /// subscription id -> label, for diagnostics and leak checks
    subscriptions: RwLock<HashMap<Uuid, String>>,
}

/// Receiving end of the outbound command queue, owned by the connection.
pub struct CommandQueue {
    rx: mpsc::UnboundedReceiver<ClientCommand>,
}

impl CommandQueue {
    pub async fn recv(&mut self) -> Option<ClientCommand> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ClientCommand> {
        self.rx.try_recv().ok()
    }
}

impl Hub {
    pub fn new() -> (Self, CommandQueue) {
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (commands_tx, rx) = mpsc::unbounded_channel();
        let hub = Self {
            inner: Arc::new(HubInner {
                events_tx,
                commands_tx,
                subscriptions: RwLock::new(HashMap::new()),
            }),
        };
        (hub, CommandQueue { rx })
    }

    /// Scoped subscription; dropping it unregisters it.
    pub fn subscribe(&self, label: impl Into<String>) -> Subscription {
        let id = Uuid::new_v4();
        let label = label.into();
        debug!("Subscription {} opened ({})", id, label);
        self.inner
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, label);

        Subscription {
            id,
            rx: self.inner.events_tx.subscribe(),
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver an event received from the server to every subscriber.
    pub fn publish(&self, event: ServerEvent) {
        // No subscribers is fine: nobody is looking at that event.
        let _ = self.inner.events_tx.send(event);
    }

    /// Queue a command for the server.
    pub fn emit(&self, command: ClientCommand) {
        if self.inner.commands_tx.send(command).is_err() {
            warn!("Gateway connection is gone, dropping outbound command");
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.inner
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

pub struct Subscription {
    id: Uuid,
    rx: broadcast::Receiver<ServerEvent>,
    hub: Weak<HubInner>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next event, in receipt order. `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Subscription {} lagged by {} events", self.id, n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.subscriptions
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.id);
            debug!("Subscription {} released", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_fan_out_to_every_subscription() {
        let (hub, _queue) = Hub::new();
        let mut a = hub.subscribe("a");
        let mut b = hub.subscribe("b");

        hub.publish(ServerEvent::PublicTyping("alice".into()));
        hub.publish(ServerEvent::PublicStopTyping);

        assert_eq!(a.recv().await, Some(ServerEvent::PublicTyping("alice".into())));
        assert_eq!(a.recv().await, Some(ServerEvent::PublicStopTyping));
        assert_eq!(b.recv().await, Some(ServerEvent::PublicTyping("alice".into())));
    }

    #[tokio::test]
    async fn dropping_subscription_releases_it() {
        let (hub, _queue) = Hub::new();
        let first = hub.subscribe("public view");
        let second = hub.subscribe("inbox");
        assert_eq!(hub.subscription_count(), 2);

        drop(first);
        assert_eq!(hub.subscription_count(), 1);
        drop(second);
        assert_eq!(hub.subscription_count(), 0);
    }

    #[tokio::test]
    async fn emitted_commands_reach_the_queue_in_order() {
        let (hub, mut queue) = Hub::new();
        hub.emit(ClientCommand::PublicTyping("bob".into()));
        hub.emit(ClientCommand::PublicStopTyping);

        assert_eq!(queue.recv().await, Some(ClientCommand::PublicTyping("bob".into())));
        assert_eq!(queue.recv().await, Some(ClientCommand::PublicStopTyping));
    }
}

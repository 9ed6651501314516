//! Broadcast hub owning the shared counter.
//!
//! A single actor task owns [`BroadcastState`] and the subscriber table.
//! Joins, leaves and increments arrive over one command channel and are
//! processed strictly one at a time, so every subscriber sees the same
//! gap-free, increasing sequence of values.
//!
//! Outboxes are bounded. A subscriber whose outbox is full when a value is
//! published is evicted: its stream ends after the buffered values.

use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::observability::metrics;
use crate::realtime::protocol::ServerEvent;

/// Outbox capacity used by [`BroadcastHub::spawn`].
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// Identifier assigned to each connected subscriber.
pub type SubscriberId = Uuid;

/// The shared counter. Only the hub actor holds it.
#[derive(Debug, Default)]
pub struct BroadcastState {
    counter: u64,
}

impl BroadcastState {
    pub fn new(initial: u64) -> Self {
        Self { counter: initial }
    }

    pub fn value(&self) -> u64 {
        self.counter
    }

    fn increment(&mut self) -> u64 {
        self.counter = self.counter.saturating_add(1);
        self.counter
    }
}

#[derive(Debug)]
struct Subscriber {
    outbox: mpsc::Sender<ServerEvent>,
    connected_at: Instant,
}

/// Point-in-time view of the hub for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubSnapshot {
    pub counter: u64,
    pub subscribers: usize,
}

enum HubCommand {
    Join {
        id: SubscriberId,
        outbox: mpsc::Sender<ServerEvent>,
    },
    Leave {
        id: SubscriberId,
    },
    Increment {
        from: SubscriberId,
    },
    Snapshot {
        reply: oneshot::Sender<HubSnapshot>,
    },
}

/// Cloneable handle to the hub actor.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    commands: mpsc::UnboundedSender<HubCommand>,
    outbox_capacity: usize,
}

impl BroadcastHub {
    /// Spawn the hub actor. It runs until every handle (and subscription) is dropped.
    pub fn spawn(state: BroadcastState) -> (Self, JoinHandle<()>) {
        Self::spawn_with_capacity(state, DEFAULT_OUTBOX_CAPACITY)
    }

    /// Spawn the hub actor with `outbox_capacity` pending events per subscriber.
    pub fn spawn_with_capacity(state: BroadcastState, outbox_capacity: usize) -> (Self, JoinHandle<()>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let actor = HubActor {
            state,
            subscribers: HashMap::new(),
        };
        let task = tokio::spawn(actor.run(rx));
        let hub = Self {
            commands,
            outbox_capacity: outbox_capacity.max(1),
        };
        (hub, task)
    }

    /// Register a new subscriber. Its first event is the current counter value.
    pub fn subscribe(&self) -> Subscription {
        let id = Uuid::new_v4();
        let (outbox, events) = mpsc::channel(self.outbox_capacity);
        let _ = self.commands.send(HubCommand::Join { id, outbox });
        Subscription {
            id,
            events,
            hub: self.clone(),
        }
    }

    /// Request one increment-and-broadcast cycle.
    pub fn increment(&self, from: SubscriberId) {
        let _ = self.commands.send(HubCommand::Increment { from });
    }

    /// Current counter and subscriber count, or `None` if the hub stopped.
    pub async fn snapshot(&self) -> Option<HubSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(HubCommand::Snapshot { reply }).ok()?;
        rx.await.ok()
    }

    fn leave(&self, id: SubscriberId) {
        let _ = self.commands.send(HubCommand::Leave { id });
    }
}

/// A connected subscriber's end of the hub. Dropping it disconnects.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    events: mpsc::Receiver<ServerEvent>,
    hub: BroadcastHub,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event for this subscriber; `None` once the hub has stopped or evicted it.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.events.recv().await
    }

    /// Emit an increment on behalf of this subscriber.
    pub fn increment(&self) {
        self.hub.increment(self.id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.leave(self.id);
    }
}

struct HubActor {
    state: BroadcastState,
    subscribers: HashMap<SubscriberId, Subscriber>,
}

impl HubActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<HubCommand>) {
        tracing::debug!(counter = self.state.value(), "Broadcast hub started");
        while let Some(command) = commands.recv().await {
            match command {
                HubCommand::Join { id, outbox } => {
                    if outbox.try_send(ServerEvent::Sync(self.state.value())).is_err() {
                        continue;
                    }
                    self.subscribers.insert(
                        id,
                        Subscriber {
                            outbox,
                            connected_at: Instant::now(),
                        },
                    );
                    tracing::debug!(subscriber = %id, subscribers = self.subscribers.len(), "Subscriber joined");
                    metrics::record_subscribers(self.subscribers.len());
                }
                HubCommand::Leave { id } => {
                    if let Some(sub) = self.subscribers.remove(&id) {
                        tracing::debug!(
                            subscriber = %id,
                            connected_secs = sub.connected_at.elapsed().as_secs(),
                            "Subscriber left"
                        );
                        metrics::record_subscribers(self.subscribers.len());
                    }
                }
                HubCommand::Increment { from } => {
                    let value = self.state.increment();
                    self.broadcast(ServerEvent::Sync(value));
                    tracing::debug!(from = %from, value, "Counter incremented");
                    metrics::record_broadcast(value);
                }
                HubCommand::Snapshot { reply } => {
                    let _ = reply.send(HubSnapshot {
                        counter: self.state.value(),
                        subscribers: self.subscribers.len(),
                    });
                }
            }
        }
        tracing::debug!("Broadcast hub stopped");
    }

    fn broadcast(&mut self, event: ServerEvent) {
        let before = self.subscribers.len();
        self.subscribers.retain(|id, sub| match sub.outbox.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(subscriber = %id, "Subscriber outbox full, evicting");
                false
            }
            // Session whose Leave is still queued.
            Err(TrySendError::Closed(_)) => false,
        });
        if self.subscribers.len() != before {
            metrics::record_subscribers(self.subscribers.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_subscriber_receives_current_value() {
        let (hub, _task) = BroadcastHub::spawn(BroadcastState::new(0));
        let mut a = hub.subscribe();
        assert_eq!(a.recv().await, Some(ServerEvent::Sync(0)));

        a.increment();
        a.increment();
        a.increment();
        assert_eq!(a.recv().await, Some(ServerEvent::Sync(1)));
        assert_eq!(a.recv().await, Some(ServerEvent::Sync(2)));
        assert_eq!(a.recv().await, Some(ServerEvent::Sync(3)));

        let mut late = hub.subscribe();
        assert_eq!(late.recv().await, Some(ServerEvent::Sync(3)));

        a.increment();
        assert_eq!(late.recv().await, Some(ServerEvent::Sync(4)));
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_full_sequence() {
        let (hub, _task) = BroadcastHub::spawn(BroadcastState::default());
        let mut subs: Vec<Subscription> = (0..3).map(|_| hub.subscribe()).collect();
        for sub in subs.iter_mut() {
            assert_eq!(sub.recv().await, Some(ServerEvent::Sync(0)));
        }

        let n = 50u64;
        let emitters: Vec<_> = (0..n as usize)
            .map(|i| {
                let hub = hub.clone();
                let from = subs[i % 3].id();
                tokio::spawn(async move { hub.increment(from) })
            })
            .collect();
        for emitter in emitters {
            emitter.await.unwrap();
        }

        for sub in subs.iter_mut() {
            let mut seen = Vec::new();
            for _ in 0..n {
                match sub.recv().await {
                    Some(ServerEvent::Sync(v)) => seen.push(v),
                    None => break,
                }
            }
            assert_eq!(seen, (1..=n).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn test_disconnect_leaves_counter_untouched() {
        let (hub, _task) = BroadcastHub::spawn(BroadcastState::default());
        let mut a = hub.subscribe();
        let b = hub.subscribe();
        a.recv().await;

        b.increment();
        assert_eq!(a.recv().await, Some(ServerEvent::Sync(1)));
        drop(b);

        let snapshot = hub.snapshot().await.unwrap();
        assert_eq!(snapshot, HubSnapshot { counter: 1, subscribers: 1 });

        a.increment();
        assert_eq!(a.recv().await, Some(ServerEvent::Sync(2)));
    }

    #[tokio::test]
    async fn test_stalled_subscriber_is_evicted() {
        let (hub, _task) = BroadcastHub::spawn_with_capacity(BroadcastState::default(), 4);
        let mut fast = hub.subscribe();
        let mut stalled = hub.subscribe();
        assert_eq!(fast.recv().await, Some(ServerEvent::Sync(0)));

        for value in 1..=20u64 {
            fast.increment();
            assert_eq!(fast.recv().await, Some(ServerEvent::Sync(value)));
        }

        // Sync(0) plus three increments filled the outbox; the fourth evicted it.
        let mut buffered = Vec::new();
        while let Some(ServerEvent::Sync(v)) = stalled.recv().await {
            buffered.push(v);
        }
        assert_eq!(buffered, vec![0, 1, 2, 3]);

        let snapshot = hub.snapshot().await.unwrap();
        assert_eq!(snapshot, HubSnapshot { counter: 20, subscribers: 1 });
    }
}

//! Domain events and the event bus
//!
//! Everything observable about the client flows through [`ClientEvent`]:
//! session lifecycle, registration, call progress and network reachability.
//! The [`EventBus`] delivers each published event to every registered
//! observer sequentially, in registration order, before `publish` returns;
//! combined with the single pump task draining the engine channel this gives
//! strict per-source ordering without any locking in the observers.
//!
//! # Examples
//!
//! ```
//! use callbridge_core::events::EventBus;
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//! assert_eq!(bus.observer_count(), 0);
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::engine::EngineCallId;
use crate::session::SessionState;

/// Capacity of the broadcast tap handed out by [`EventBus::subscribe`]
const BROADCAST_CHANNEL_CAPACITY: usize = 256;

/// Registration lifecycle events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationEvent {
    /// REGISTER submitted, waiting for the registrar
    InProgress,
    /// Registration accepted
    Registered,
    /// Registration rejected or timed out
    Failed(String),
    /// Registration cleared after logout
    Unregistered,
}

/// Call progress events, each carrying the engine call id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallEvent {
    /// New incoming call from `from`
    Incoming { call_id: EngineCallId, from: String },
    /// Outgoing call initiated
    OutgoingInit { call_id: EngineCallId },
    /// Outgoing call acknowledged by the network
    OutgoingProgress { call_id: EngineCallId },
    /// Outgoing call ringing at the remote party
    OutgoingRinging { call_id: EngineCallId },
    /// Call connected
    Connected { call_id: EngineCallId },
    /// Media streams running
    StreamsRunning { call_id: EngineCallId },
    /// Call paused, locally or by the remote party
    Paused { call_id: EngineCallId, by_remote: bool },
    /// Call resuming from pause
    Resuming { call_id: EngineCallId },
    /// Call reached a terminal state; `reason` is engine-provided text
    Terminated { call_id: EngineCallId, reason: String },
}

/// Network reachability events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkEvent {
    Available,
    Unavailable,
}

/// Top-level event type published on the bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientEvent {
    /// Session lifecycle change
    Session(SessionState),
    /// Registration lifecycle change
    Registration(RegistrationEvent),
    /// Call progress
    Call(CallEvent),
    /// Network reachability change
    Network(NetworkEvent),
}

/// Opaque handle identifying one observer registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Observer notified of every published event
#[async_trait]
pub trait EventObserver: Send + Sync {
    async fn on_event(&self, event: ClientEvent);
}

/// Ordered observer registry with a broadcast tap
///
/// Observers receive events one at a time via [`EventBus::publish`];
/// stream-style consumers (UIs, tests) can instead take a broadcast
/// receiver from [`EventBus::subscribe`], which sees the same events but
/// tolerates lag by dropping.
pub struct EventBus {
    observers: std::sync::RwLock<Vec<(SubscriptionId, Arc<dyn EventObserver>)>>,
    broadcast_tx: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CHANNEL_CAPACITY);
        Self {
            observers: std::sync::RwLock::new(Vec::new()),
            broadcast_tx,
        }
    }

    /// Register an observer; events are delivered in registration order
    pub fn add_observer(&self, observer: Arc<dyn EventObserver>) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        if let Ok(mut observers) = self.observers.write() {
            observers.push((id, observer));
        }
        id
    }

    /// Remove an observer; returns whether the handle was known
    pub fn remove_observer(&self, id: SubscriptionId) -> bool {
        if let Ok(mut observers) = self.observers.write() {
            let before = observers.len();
            observers.retain(|(sub_id, _)| *sub_id != id);
            return observers.len() != before;
        }
        false
    }

    /// Number of registered observers
    pub fn observer_count(&self) -> usize {
        self.observers.read().map(|o| o.len()).unwrap_or(0)
    }

    /// Take a broadcast receiver for stream-style consumption
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Deliver an event to every observer, then return
    ///
    /// The observer list is snapshotted first, so observers may add or
    /// remove registrations from within their handlers.
    pub async fn publish(&self, event: ClientEvent) {
        tracing::debug!("Publishing event: {:?}", event);
        let snapshot: Vec<Arc<dyn EventObserver>> = match self.observers.read() {
            Ok(observers) => observers.iter().map(|(_, obs)| obs.clone()).collect(),
            Err(_) => Vec::new(),
        };
        for observer in snapshot {
            observer.on_event(event.clone()).await;
        }

        // Broadcast after the observers, so stream consumers see controller
        // state already settled for this event. Lagging receivers just drop.
        let _ = self.broadcast_tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

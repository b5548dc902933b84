//! Client manager
//!
//! [`ClientManager`] is the composition root: one instance owns the event
//! bus, the three controllers and the push bridge, and wires the controllers
//! onto the bus in a fixed order. Applications construct it once with their
//! platform collaborators and keep it for the process lifetime; nothing in
//! the crate is global.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::client::calls::CallController;
use crate::client::config::ClientConfig;
use crate::engine::EngineFactory;
use crate::error::ClientResult;
use crate::events::{ClientEvent, EventBus, SubscriptionId};
use crate::push::PushBridge;
use crate::registration::{Credentials, RegistrationController};
use crate::session::{SessionController, SessionState};
use crate::telephony::TelephonyUi;

/// Top-level client context
///
/// # Examples
///
/// ```no_run
/// # use std::sync::Arc;
/// # use callbridge_core::{ClientManager, ClientConfig};
/// # use callbridge_core::engine::EngineFactory;
/// # use callbridge_core::telephony::TelephonyUi;
/// # async fn example(
/// #     factory: Arc<dyn EngineFactory>,
/// #     telephony: Arc<dyn TelephonyUi>,
/// # ) {
/// let client = ClientManager::new(factory, telephony);
/// let mut events = client.subscribe_events();
/// client.initialize(ClientConfig::new("sip.example.com")).await;
/// while let Ok(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// # }
/// ```
pub struct ClientManager {
    bus: Arc<EventBus>,
    session: Arc<SessionController>,
    registration: Arc<RegistrationController>,
    calls: Arc<CallController>,
    push: PushBridge,
    registration_sub: SubscriptionId,
    calls_sub: SubscriptionId,
}

impl ClientManager {
    /// Build the full controller graph around the given collaborators
    ///
    /// The registration controller observes the bus before the call
    /// controller, so registration state is settled first when both react
    /// to the same event.
    pub fn new(factory: Arc<dyn EngineFactory>, telephony: Arc<dyn TelephonyUi>) -> Arc<Self> {
        let bus = Arc::new(EventBus::new());
        let session = Arc::new(SessionController::new(factory, bus.clone()));
        let registration = Arc::new(RegistrationController::new(session.clone()));
        let calls = Arc::new(CallController::new(session.clone(), telephony));
        let push = PushBridge::new(session.clone());

        let registration_sub = bus.add_observer(registration.clone());
        let calls_sub = bus.add_observer(calls.clone());

        Arc::new(Self {
            bus,
            session,
            registration,
            calls,
            push,
            registration_sub,
            calls_sub,
        })
    }

    /// Configure the telephony provider and start the session
    ///
    /// The provider is configured only on the first call; a redundant
    /// initialize leaves the already-configured provider alone.
    pub async fn initialize(&self, config: ClientConfig) -> SessionState {
        if self.session.state().await == SessionState::Uninitialized {
            self.calls.configure_provider(config.icon.clone()).await;
        }
        self.session.initialize(config).await
    }

    /// Stop the session and detach the controllers from the bus
    pub async fn shutdown(&self) {
        info!("Client shutting down");
        self.session.shutdown().await;
    }

    /// Session lifecycle controller
    pub fn session(&self) -> &Arc<SessionController> {
        &self.session
    }

    /// Registration controller
    pub fn registration(&self) -> &Arc<RegistrationController> {
        &self.registration
    }

    /// Call controller (also the telephony action delegate)
    pub fn calls(&self) -> &Arc<CallController> {
        &self.calls
    }

    /// Push notification bridge
    pub fn push(&self) -> &PushBridge {
        &self.push
    }

    /// The event bus shared by all controllers
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Broadcast receiver over all published events
    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.bus.subscribe()
    }

    /// Convenience: submit account credentials
    pub async fn login(&self, credentials: Credentials) -> ClientResult<()> {
        self.registration.login(credentials).await
    }

    /// Convenience: log out of the current account
    pub async fn logout(&self) -> ClientResult<()> {
        self.registration.logout().await
    }

    /// Convenience: place an outgoing call with the stored local party info
    pub async fn make_call(&self, address: &str) -> ClientResult<crate::call::CallRecord> {
        let client = self.calls.client_info().await;
        self.calls.make_call(address, client).await
    }

    /// Convenience: accept the current incoming call
    pub async fn answer_call(&self) -> ClientResult<()> {
        self.calls.answer_call().await
    }

    /// Convenience: end the current call
    pub async fn end_call(&self) -> ClientResult<()> {
        self.calls.end_call().await
    }
}

impl Drop for ClientManager {
    fn drop(&mut self) {
        self.bus.remove_observer(self.registration_sub);
        self.bus.remove_observer(self.calls_sub);
    }
}

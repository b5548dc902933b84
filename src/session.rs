//! Session lifecycle control
//!
//! The [`SessionController`] owns the engine handle and the single pump task
//! that drains the engine's raw event channel. Because exactly one pump
//! exists and each translated event is published (and fully observed) before
//! the next raw event is taken, all controller state changes happen
//! sequentially and in engine order.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::client::config::ClientConfig;
use crate::engine::{
    EngineEvent, EngineFactory, EngineSettings, RawCallState, RawGlobalState,
    RawRegistrationState, SignalingEngine,
};
use crate::events::{CallEvent, ClientEvent, EventBus, NetworkEvent, RegistrationEvent};

/// Engine configuration file name inside a custom config directory
const ENGINE_CONFIG_FILE: &str = "engine.rc";

/// Lifecycle state of the client session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No engine exists
    Uninitialized,
    /// Engine is being created and started
    Initializing,
    /// Engine is running and accepting commands
    Ready,
    /// Engine creation or startup failed
    Error(String),
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "Uninitialized"),
            SessionState::Initializing => write!(f, "Initializing"),
            SessionState::Ready => write!(f, "Ready"),
            SessionState::Error(reason) => write!(f, "Error: {reason}"),
        }
    }
}

/// Controls engine creation, startup and teardown
pub struct SessionController {
    factory: Arc<dyn EngineFactory>,
    bus: Arc<EventBus>,
    state: Arc<RwLock<SessionState>>,
    engine: RwLock<Option<Arc<dyn SignalingEngine>>>,
    config: RwLock<Option<ClientConfig>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl SessionController {
    pub fn new(factory: Arc<dyn EngineFactory>, bus: Arc<EventBus>) -> Self {
        Self {
            factory,
            bus,
            state: Arc::new(RwLock::new(SessionState::Uninitialized)),
            engine: RwLock::new(None),
            config: RwLock::new(None),
            pump: Mutex::new(None),
        }
    }

    /// Current session state
    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// Whether the session is ready to accept commands
    pub async fn is_ready(&self) -> bool {
        matches!(*self.state.read().await, SessionState::Ready)
    }

    /// Handle to the engine, regardless of session state
    ///
    /// Teardown paths use this; commands go through [`Self::ready_engine`].
    pub async fn engine(&self) -> Option<Arc<dyn SignalingEngine>> {
        self.engine.read().await.clone()
    }

    /// Handle to the engine, only while the session is `Ready`
    ///
    /// The engine can report itself off (`GlobalStateChanged Off`) before
    /// teardown runs; the handle still exists then, but commands must stop.
    pub async fn ready_engine(&self) -> Option<Arc<dyn SignalingEngine>> {
        if !self.is_ready().await {
            return None;
        }
        self.engine.read().await.clone()
    }

    /// The configuration the session was initialized with
    pub async fn config(&self) -> Option<ClientConfig> {
        self.config.read().await.clone()
    }

    /// The event bus this session publishes on
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Create and start the engine
    ///
    /// Idempotent: calling again while not `Uninitialized` logs a warning
    /// and returns the current state unchanged. On any engine failure the
    /// session lands in `Error` with the engine's message.
    pub async fn initialize(&self, config: ClientConfig) -> SessionState {
        {
            let current = self.state.read().await.clone();
            if current != SessionState::Uninitialized {
                warn!("Session already initialized (state: {})", current);
                return current;
            }
        }
        info!("Initializing session");
        self.set_state(SessionState::Initializing).await;

        let settings = EngineSettings {
            config_path: config
                .config_dir
                .as_deref()
                .map(|dir: &Path| dir.join(ENGINE_CONFIG_FILE)),
            log_level: config.log_level,
        };

        let runtime = match self.factory.create(settings).await {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Engine creation failed: {}", e);
                let state = SessionState::Error(e.to_string());
                self.set_state(state.clone()).await;
                return state;
            }
        };

        let engine = runtime.engine.clone();
        engine.set_video_enabled(false);
        engine.set_telephony_ui_enabled(true);
        engine.set_push_enabled(config.push.enabled);

        if let Err(e) = engine.start().await {
            error!("Engine startup failed: {}", e);
            let state = SessionState::Error(e.to_string());
            self.set_state(state.clone()).await;
            return state;
        }

        *self.engine.write().await = Some(engine);
        *self.config.write().await = Some(config);
        self.spawn_pump(runtime.events).await;

        self.set_state(SessionState::Ready).await;
        info!("Session ready");
        SessionState::Ready
    }

    /// Stop the engine and reset to `Uninitialized`
    ///
    /// No-op when no engine exists.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.pump.lock().await.take() {
            handle.abort();
        }
        let engine = self.engine.write().await.take();
        match engine {
            Some(engine) => {
                info!("Shutting down session");
                engine.stop().await;
            }
            None => {
                debug!("Shutdown requested with no engine; ignoring");
            }
        }
        *self.config.write().await = None;
        let current = self.state.read().await.clone();
        if current != SessionState::Uninitialized {
            self.set_state(SessionState::Uninitialized).await;
        }
    }

    async fn set_state(&self, state: SessionState) {
        *self.state.write().await = state.clone();
        self.bus.publish(ClientEvent::Session(state)).await;
    }

    async fn spawn_pump(&self, mut events: tokio::sync::mpsc::Receiver<EngineEvent>) {
        let bus = self.bus.clone();
        let state = self.state.clone();
        let handle = tokio::spawn(async move {
            while let Some(raw) = events.recv().await {
                match translate_engine_event(&raw) {
                    Some(ClientEvent::Session(new_state)) => {
                        *state.write().await = new_state.clone();
                        bus.publish(ClientEvent::Session(new_state)).await;
                    }
                    Some(event) => {
                        bus.publish(event).await;
                    }
                    None => {
                        debug!("Dropping unmapped engine event: {:?}", raw);
                    }
                }
            }
        });
        *self.pump.lock().await = Some(handle);
    }
}

/// Translate a raw engine event into a domain event
///
/// Raw states with no domain meaning yield `None` and are dropped.
pub(crate) fn translate_engine_event(event: &EngineEvent) -> Option<ClientEvent> {
    match event {
        EngineEvent::GlobalStateChanged { state, .. } => match state {
            RawGlobalState::On => Some(ClientEvent::Session(SessionState::Ready)),
            RawGlobalState::Off => Some(ClientEvent::Session(SessionState::Uninitialized)),
            _ => None,
        },
        EngineEvent::CallStateChanged { call_id, state, remote_address, message } => {
            let call_id = call_id.clone();
            let event = match state {
                RawCallState::IncomingReceived | RawCallState::PushIncomingReceived => {
                    CallEvent::Incoming {
                        call_id,
                        from: remote_address.clone().unwrap_or_else(|| "Unknown".to_string()),
                    }
                }
                RawCallState::OutgoingInit => CallEvent::OutgoingInit { call_id },
                RawCallState::OutgoingProgress => CallEvent::OutgoingProgress { call_id },
                RawCallState::OutgoingRinging => CallEvent::OutgoingRinging { call_id },
                RawCallState::Connected => CallEvent::Connected { call_id },
                RawCallState::StreamsRunning => CallEvent::StreamsRunning { call_id },
                RawCallState::Paused => CallEvent::Paused { call_id, by_remote: false },
                RawCallState::PausedByRemote => CallEvent::Paused { call_id, by_remote: true },
                RawCallState::Resuming => CallEvent::Resuming { call_id },
                RawCallState::End | RawCallState::Released | RawCallState::Error => {
                    CallEvent::Terminated { call_id, reason: message.clone() }
                }
                _ => return None,
            };
            Some(ClientEvent::Call(event))
        }
        EngineEvent::RegistrationStateChanged { state, message } => {
            let event = match state {
                RawRegistrationState::Ok => RegistrationEvent::Registered,
                RawRegistrationState::Progress => RegistrationEvent::InProgress,
                RawRegistrationState::Failed => RegistrationEvent::Failed(message.clone()),
                RawRegistrationState::Cleared => RegistrationEvent::Unregistered,
                _ => return None,
            };
            Some(ClientEvent::Registration(event))
        }
        EngineEvent::NetworkReachable { reachable } => Some(ClientEvent::Network(if *reachable {
            NetworkEvent::Available
        } else {
            NetworkEvent::Unavailable
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_event(state: RawCallState) -> EngineEvent {
        EngineEvent::CallStateChanged {
            call_id: "call-1".to_string(),
            state,
            remote_address: Some("sip:bob@example.com".to_string()),
            message: "reason".to_string(),
        }
    }

    #[test]
    fn test_incoming_variants_collapse() {
        for state in [RawCallState::IncomingReceived, RawCallState::PushIncomingReceived] {
            let translated = translate_engine_event(&call_event(state));
            assert_eq!(
                translated,
                Some(ClientEvent::Call(CallEvent::Incoming {
                    call_id: "call-1".to_string(),
                    from: "sip:bob@example.com".to_string(),
                }))
            );
        }
    }

    #[test]
    fn test_incoming_without_remote_uses_placeholder() {
        let raw = EngineEvent::CallStateChanged {
            call_id: "call-1".to_string(),
            state: RawCallState::IncomingReceived,
            remote_address: None,
            message: String::new(),
        };
        let Some(ClientEvent::Call(CallEvent::Incoming { from, .. })) =
            translate_engine_event(&raw)
        else {
            panic!("expected incoming event");
        };
        assert_eq!(from, "Unknown");
    }

    #[test]
    fn test_terminal_raw_states_map_to_terminated() {
        for state in [RawCallState::End, RawCallState::Released, RawCallState::Error] {
            let translated = translate_engine_event(&call_event(state));
            assert_eq!(
                translated,
                Some(ClientEvent::Call(CallEvent::Terminated {
                    call_id: "call-1".to_string(),
                    reason: "reason".to_string(),
                }))
            );
        }
    }

    #[test]
    fn test_unmapped_raw_states_are_dropped() {
        for state in [RawCallState::Idle, RawCallState::Pausing, RawCallState::Updating] {
            assert_eq!(translate_engine_event(&call_event(state)), None);
        }
        let refreshing = EngineEvent::RegistrationStateChanged {
            state: RawRegistrationState::Refreshing,
            message: String::new(),
        };
        assert_eq!(translate_engine_event(&refreshing), None);
        let startup = EngineEvent::GlobalStateChanged {
            state: RawGlobalState::Startup,
            message: String::new(),
        };
        assert_eq!(translate_engine_event(&startup), None);
    }

    #[test]
    fn test_registration_and_network_translation() {
        let failed = EngineEvent::RegistrationStateChanged {
            state: RawRegistrationState::Failed,
            message: "403 Forbidden".to_string(),
        };
        assert_eq!(
            translate_engine_event(&failed),
            Some(ClientEvent::Registration(RegistrationEvent::Failed(
                "403 Forbidden".to_string()
            )))
        );
        assert_eq!(
            translate_engine_event(&EngineEvent::NetworkReachable { reachable: false }),
            Some(ClientEvent::Network(NetworkEvent::Unavailable))
        );
    }
}

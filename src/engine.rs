//! Signaling engine contract
//!
//! The coordination layer never talks SIP itself; it drives an injected
//! [`SignalingEngine`] and consumes the raw events the engine emits. The
//! engine adapter delivers those events over a bounded mpsc channel handed
//! out by [`EngineFactory::create`], and exactly one pump task drains it, so
//! all downstream state changes happen sequentially.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::client::config::LogLevel;
use crate::registration::Transport;

/// Engine-assigned call identifier (SIP Call-ID)
pub type EngineCallId = String;

/// Depth of the raw engine event channel
pub const ENGINE_EVENT_QUEUE_DEPTH: usize = 128;

/// Error reported by the signaling engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-assigned account handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountId(pub u32);

/// Authentication material for a SIP account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthInfo {
    pub username: String,
    pub password: String,
    pub realm: Option<String>,
    pub domain: String,
}

/// A SIP address handed to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineAddress {
    pub uri: String,
    pub display_name: Option<String>,
    pub transport: Option<Transport>,
}

impl EngineAddress {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into(), display_name: None, transport: None }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = Some(transport);
        self
    }
}

/// Account parameters submitted to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountParams {
    /// Identity address, e.g. `sip:alice@example.com`
    pub identity: EngineAddress,
    /// Registrar address, e.g. `sip:example.com`
    pub server: EngineAddress,
    /// Whether REGISTER refreshes are enabled
    pub register_enabled: bool,
    /// Whether the account may receive push notifications
    pub push_allowed: bool,
    /// Push provider name, when push is allowed
    pub push_provider: Option<String>,
}

/// Media encryption mode requested for a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaEncryption {
    #[default]
    None,
    Srtp,
    Zrtp,
    Dtls,
}

/// Per-call parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallParams {
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub media_encryption: MediaEncryption,
}

impl Default for CallParams {
    fn default() -> Self {
        Self {
            audio_enabled: true,
            video_enabled: false,
            media_encryption: MediaEncryption::None,
        }
    }
}

/// Kind of an audio device as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioDeviceKind {
    Microphone,
    Earpiece,
    Speaker,
    Bluetooth,
    Headset,
    Unknown,
}

/// An audio device known to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    pub id: String,
    pub name: String,
    pub kind: AudioDeviceKind,
}

/// Snapshot of one engine-side call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCallSnapshot {
    pub call_id: EngineCallId,
    pub state: RawCallState,
    pub remote_address: String,
}

/// Raw engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawGlobalState {
    Startup,
    On,
    Shutdown,
    Off,
    Configuring,
}

/// Raw per-call state as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawCallState {
    Idle,
    IncomingReceived,
    PushIncomingReceived,
    OutgoingInit,
    OutgoingProgress,
    OutgoingRinging,
    OutgoingEarlyMedia,
    Connected,
    StreamsRunning,
    Pausing,
    Paused,
    PausedByRemote,
    Resuming,
    Updating,
    End,
    Released,
    Error,
}

/// Raw registration state as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawRegistrationState {
    None,
    Progress,
    Refreshing,
    Ok,
    Cleared,
    Failed,
}

/// Raw event emitted by the engine adapter
///
/// These are translated into domain events by the session controller; raw
/// states with no domain meaning are dropped there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    GlobalStateChanged {
        state: RawGlobalState,
        message: String,
    },
    CallStateChanged {
        call_id: EngineCallId,
        state: RawCallState,
        remote_address: Option<String>,
        message: String,
    },
    RegistrationStateChanged {
        state: RawRegistrationState,
        message: String,
    },
    NetworkReachable {
        reachable: bool,
    },
}

/// Settings passed to the engine factory at initialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Engine configuration file, when a custom config directory is in use
    pub config_path: Option<PathBuf>,
    /// Log verbosity requested from the engine's own logger
    pub log_level: LogLevel,
}

/// A created engine together with its raw event stream
pub struct EngineRuntime {
    pub engine: Arc<dyn SignalingEngine>,
    pub events: mpsc::Receiver<EngineEvent>,
}

/// Creates engine instances
///
/// Implementations send raw events into a channel of depth
/// [`ENGINE_EVENT_QUEUE_DEPTH`] and return the receiving half.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create(&self, settings: EngineSettings) -> EngineResult<EngineRuntime>;
}

/// Operations the coordination layer drives on the signaling engine
///
/// All methods that touch engine state are async; implementations are
/// expected to be cheap to call from the single controller task.
#[async_trait]
pub trait SignalingEngine: Send + Sync {
    /// Start the engine (network stack, transports)
    async fn start(&self) -> EngineResult<()>;
    /// Stop the engine and release its resources
    async fn stop(&self);

    /// Enable or disable video capture globally
    fn set_video_enabled(&self, enabled: bool);
    /// Enable or disable the engine's native telephony-UI integration
    fn set_telephony_ui_enabled(&self, enabled: bool);
    /// Enable or disable push notification support
    fn set_push_enabled(&self, enabled: bool);

    /// Add authentication material
    async fn add_auth_info(&self, auth: AuthInfo) -> EngineResult<()>;
    /// Add an account and return its handle
    async fn add_account(&self, params: AccountParams) -> EngineResult<AccountId>;
    /// Select the default account
    async fn set_default_account(&self, account: AccountId);
    /// Current default account, if any
    async fn default_account(&self) -> Option<AccountId>;
    /// Read back the parameters of an account
    async fn account_params(&self, account: AccountId) -> EngineResult<AccountParams>;
    /// Replace the parameters of an account
    async fn update_account_params(
        &self,
        account: AccountId,
        params: AccountParams,
    ) -> EngineResult<()>;
    /// Remove one account
    async fn remove_account(&self, account: AccountId) -> EngineResult<()>;
    /// Remove all accounts
    async fn clear_accounts(&self);
    /// Remove all authentication material
    async fn clear_auth_info(&self);

    /// Place an outgoing call, returning the engine-assigned call id
    async fn invite(
        &self,
        address: &EngineAddress,
        params: &CallParams,
    ) -> EngineResult<EngineCallId>;
    /// The engine's notion of the current call, if any
    async fn current_call(&self) -> Option<EngineCallId>;
    /// Snapshot of all engine-side calls
    async fn calls(&self) -> Vec<EngineCallSnapshot>;

    /// Accept an incoming call
    async fn accept(&self, call_id: &EngineCallId) -> EngineResult<()>;
    /// Terminate a call
    async fn terminate(&self, call_id: &EngineCallId) -> EngineResult<()>;
    /// Pause a call
    async fn pause(&self, call_id: &EngineCallId) -> EngineResult<()>;
    /// Resume a paused call
    async fn resume(&self, call_id: &EngineCallId) -> EngineResult<()>;
    /// Send one DTMF digit in-call
    async fn send_dtmf(&self, call_id: &EngineCallId, digit: char) -> EngineResult<()>;

    /// Enable or disable the microphone
    fn set_mic_enabled(&self, enabled: bool);
    /// Current microphone flag
    fn mic_enabled(&self) -> bool;
    /// Enumerate audio devices
    async fn audio_devices(&self) -> Vec<AudioDevice>;
    /// Output device currently used by a call
    async fn output_audio_device(&self, call_id: &EngineCallId) -> Option<AudioDevice>;
    /// Route a call's output to a device
    async fn set_output_audio_device(
        &self,
        call_id: &EngineCallId,
        device: &AudioDevice,
    ) -> EngineResult<()>;
    /// Activate the platform audio session before answering
    async fn configure_audio_session(&self);

    /// Register a rendered push token with the engine
    async fn register_device_token(&self, token: &str) -> EngineResult<()>;
    /// Hand a push-extracted call id (or none) to the engine
    async fn process_push_payload(&self, call_id: Option<&str>) -> EngineResult<()>;
}

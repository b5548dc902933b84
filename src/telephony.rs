//! Platform telephony UI contract
//!
//! Mirrors the two directions of an OS call-UI subsystem: [`TelephonyUi`] is
//! what the coordination layer asks of the platform (report calls, request
//! actions), [`TelephonyActionDelegate`] is what the platform asks back when
//! the user acts on the system call screen. Returning `Ok` from a delegate
//! method fulfills the pending action; returning `Err` fails it. Delegate
//! outcomes never drive call state, which follows engine events only.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Error reported by the telephony UI subsystem
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TelephonyError(pub String);

impl TelephonyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result type for telephony UI operations
pub type TelephonyResult<T> = Result<T, TelephonyError>;

/// Opaque identifier correlating one call with its OS-side UI action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TelephonyActionId(Uuid);

impl TelephonyActionId {
    /// Create a fresh action id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TelephonyActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TelephonyActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Handle kinds the provider advertises to the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelephonyHandleKind {
    Generic,
    PhoneNumber,
    EmailAddress,
}

/// One-time provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub supported_handle_kinds: Vec<TelephonyHandleKind>,
    pub max_concurrent_calls: usize,
    /// Raw image bytes for the in-call app icon
    pub icon: Option<Vec<u8>>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            supported_handle_kinds: vec![
                TelephonyHandleKind::Generic,
                TelephonyHandleKind::PhoneNumber,
                TelephonyHandleKind::EmailAddress,
            ],
            max_concurrent_calls: 1,
            icon: None,
        }
    }
}

/// Display payload for an incoming-call report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDisplayUpdate {
    pub caller_name: String,
    pub handle: String,
    pub has_video: bool,
    pub supports_dtmf: bool,
    pub supports_holding: bool,
}

/// Outbound surface: what the coordination layer requests from the OS
#[async_trait]
pub trait TelephonyUi: Send + Sync {
    /// Configure the provider; called once before the session starts
    async fn configure(&self, config: ProviderConfig);
    /// Announce a user-initiated outgoing call
    async fn request_start_call(
        &self,
        action: TelephonyActionId,
        handle: &str,
    ) -> TelephonyResult<()>;
    /// Ask the OS to tear down the UI for a call
    async fn request_end_call(&self, action: TelephonyActionId) -> TelephonyResult<()>;
    /// Show the system incoming-call screen
    async fn report_incoming_call(
        &self,
        action: TelephonyActionId,
        update: CallDisplayUpdate,
    ) -> TelephonyResult<()>;
}

/// Inbound surface: user actions arriving from the system call UI
#[async_trait]
pub trait TelephonyActionDelegate: Send + Sync {
    /// The provider reset and dropped all UI state
    async fn on_provider_reset(&self);
    /// User started an outgoing call from the OS side
    async fn perform_start(&self, action: TelephonyActionId) -> TelephonyResult<()>;
    /// User answered the incoming call
    async fn perform_answer(&self, action: TelephonyActionId) -> TelephonyResult<()>;
    /// User ended the call
    async fn perform_end(&self, action: TelephonyActionId) -> TelephonyResult<()>;
    /// User toggled hold
    async fn perform_set_held(
        &self,
        action: TelephonyActionId,
        on_hold: bool,
    ) -> TelephonyResult<()>;
    /// User toggled mute
    async fn perform_set_muted(
        &self,
        action: TelephonyActionId,
        muted: bool,
    ) -> TelephonyResult<()>;
    /// User pressed DTMF digits on the system keypad
    async fn perform_dtmf(
        &self,
        action: TelephonyActionId,
        digits: &str,
    ) -> TelephonyResult<()>;
}

//! Call domain types and the event-to-state mapping
//!
//! The call state machine here is deliberately memoryless: the next
//! [`CallState`] is a pure function of the incoming [`CallEvent`], never of
//! the previous state. All actual signaling is delegated to the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::EngineCallId;
use crate::events::CallEvent;

/// Current state of the (single) tracked call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallState {
    /// No call in progress
    Idle,
    /// Outgoing call is being initiated (INVITE being built)
    OutgoingInit,
    /// Outgoing call received a provisional response
    OutgoingProgress,
    /// Outgoing call is ringing at the remote party
    OutgoingRinging,
    /// Incoming call waiting for user decision
    Ringing,
    /// Call was accepted, media not yet flowing
    Connecting,
    /// Call is connected
    Connected,
    /// Call is connected and media streams are running
    Active,
    /// Call paused locally
    Paused,
    /// Call paused by the remote party
    PausedByRemote,
    /// Call resuming from a paused state
    Resuming,
    /// Call ended normally
    Ended,
    /// Call ended abnormally
    Error(String),
}

impl CallState {
    /// Check if media can flow in this state
    pub fn is_active(&self) -> bool {
        matches!(self, CallState::Connected | CallState::Active)
    }

    /// Check if the call has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Ended | CallState::Error(_))
    }

    /// Check if the call is still in progress
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, CallState::Idle) && !self.is_terminal()
    }
}

/// Direction of a call (from this client's perspective)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallDirection {
    /// Outgoing call (client initiated)
    Outgoing,
    /// Incoming call (received from the network)
    Incoming,
}

/// Local party presentation attached to call records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Display name shown to the remote party and the telephony UI
    pub name: String,
    /// Phone number or extension of the local user
    pub phone_number: String,
    /// Full SIP address of the local user, if known
    pub remote_address: String,
}

/// Information about the tracked call
///
/// At most one record exists at a time; it is created when a call starts
/// (either direction) and cleared exactly once on the terminal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    /// Engine-assigned call identifier
    pub call_id: EngineCallId,
    /// Remote party SIP address
    pub remote_address: String,
    /// Direction of the call
    pub direction: CallDirection,
    /// Local party presentation at call creation time
    pub client: ClientInfo,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

/// Map a domain call event to the state it implies
///
/// Every event names its own state, so replayed or duplicated events are
/// harmless.
pub fn call_state_for_event(event: &CallEvent) -> CallState {
    match event {
        CallEvent::Incoming { .. } => CallState::Ringing,
        CallEvent::OutgoingInit { .. } => CallState::OutgoingInit,
        CallEvent::OutgoingProgress { .. } => CallState::OutgoingProgress,
        CallEvent::OutgoingRinging { .. } => CallState::OutgoingRinging,
        CallEvent::Connected { .. } => CallState::Connected,
        CallEvent::StreamsRunning { .. } => CallState::Active,
        CallEvent::Paused { by_remote, .. } => {
            if *by_remote {
                CallState::PausedByRemote
            } else {
                CallState::Paused
            }
        }
        CallEvent::Resuming { .. } => CallState::Resuming,
        CallEvent::Terminated { reason, .. } => classify_termination(reason),
    }
}

/// Decide whether a termination reason describes a failure
///
/// Best-effort textual heuristic; isolated here so a structured reason code
/// can replace it in one place.
pub(crate) fn classify_termination(reason: &str) -> CallState {
    let lower = reason.to_lowercase();
    let failed = ["failed", "error", "declined", "rejected"]
        .iter()
        .any(|needle| lower.contains(needle));
    if failed {
        CallState::Error(format!("Call failed: {reason}"))
    } else {
        CallState::Ended
    }
}

/// Derive the display text for an incoming caller from their SIP address
///
/// Uses the user part of the URI with its first letter capitalized; falls
/// back to the raw address when no user part can be found.
pub(crate) fn caller_display_name(address: &str) -> String {
    let stripped = address
        .strip_prefix("sip:")
        .or_else(|| address.strip_prefix("sips:"))
        .unwrap_or(address);
    let user = stripped.split('@').next().unwrap_or(stripped);
    if user.is_empty() {
        return address.to_string();
    }
    let mut chars = user.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => address.to_string(),
    }
}

/// Extract the user part of a SIP URI for telephony handles
pub(crate) fn handle_from_uri(uri: &str) -> String {
    let stripped = uri
        .strip_prefix("sip:")
        .or_else(|| uri.strip_prefix("sips:"))
        .unwrap_or(uri);
    stripped.split('@').next().unwrap_or(stripped).to_string()
}

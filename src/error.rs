//! Error types for the call coordination layer
//!
//! Every public command returns [`ClientResult`]. Collaborator failures are
//! wrapped into the matching [`ClientError`] variant with the underlying
//! message preserved, so callers never see raw engine or telephony errors.

use thiserror::Error;

/// Result type alias used throughout the crate
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the client coordination layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The session has not been initialized (or initialization failed)
    #[error("Client is not initialized")]
    NotInitialized,

    /// No SIP account is currently registered
    #[error("Not logged in")]
    NotLoggedIn,

    /// Account setup was rejected by the signaling engine
    #[error("Login failed: {reason}")]
    LoginFailed { reason: String },

    /// A command was invoked with unusable arguments
    #[error("Invalid parameters: {reason}")]
    InvalidParameters { reason: String },

    /// A call operation was rejected by a collaborator
    #[error("Call failed: {reason}")]
    CallFailed { reason: String },

    /// A call-scoped command was issued with no current call
    #[error("No active call")]
    NoActiveCall,

    /// Required configuration (e.g. a default SIP domain) is missing
    #[error("Client is not configured")]
    NotConfigured,

    /// Anything that does not fit the categories above
    #[error("Unknown error: {reason}")]
    Unknown { reason: String },
}

impl ClientError {
    /// Create a LoginFailed error
    pub fn login_failed(reason: impl Into<String>) -> Self {
        Self::LoginFailed { reason: reason.into() }
    }

    /// Create an InvalidParameters error
    pub fn invalid_parameters(reason: impl Into<String>) -> Self {
        Self::InvalidParameters { reason: reason.into() }
    }

    /// Create a CallFailed error
    pub fn call_failed(reason: impl Into<String>) -> Self {
        Self::CallFailed { reason: reason.into() }
    }

    /// Create an Unknown error
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::Unknown { reason: reason.into() }
    }

    /// Whether retrying the same command later can reasonably succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized | Self::NotLoggedIn | Self::NoActiveCall
        )
    }

    /// Coarse grouping for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotInitialized => "session",
            Self::NotLoggedIn | Self::LoginFailed { .. } => "auth",
            Self::CallFailed { .. } | Self::NoActiveCall => "call",
            Self::InvalidParameters { .. } | Self::NotConfigured => "config",
            Self::Unknown { .. } => "other",
        }
    }
}

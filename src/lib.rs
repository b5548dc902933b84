//! callbridge-core: VoIP call lifecycle coordination layer
//!
//! This crate sits between a SIP signaling engine, the platform's telephony
//! UI subsystem, and an application, and keeps the three in agreement about
//! session, registration and call state.
//!
//! ## Layer separation
//! ```text
//! application -> callbridge-core -> { signaling engine, telephony UI }
//! ```
//!
//! The crate focuses on:
//! - Session lifecycle (engine creation, startup, teardown)
//! - Account registration and credentials handling
//! - Call commands and call state tracking for UI integration
//! - Mirroring call progress into the system telephony UI
//! - VoIP push token and payload plumbing
//!
//! All SIP protocol work, media handling and OS UI rendering live behind the
//! [`engine::SignalingEngine`] and [`telephony::TelephonyUi`] contracts; the
//! crate only coordinates them. Engine events are drained by a single pump
//! task and delivered to observers sequentially, so controller state never
//! needs cross-thread reconciliation.

pub mod call;
pub mod client;
pub mod engine;
pub mod error;
pub mod events;
pub mod push;
pub mod registration;
pub mod session;
pub mod telephony;

// Public API exports
pub use call::{CallDirection, CallRecord, CallState, ClientInfo};
pub use client::{CallController, ClientConfig, ClientManager, LogLevel, PushConfig};
pub use error::{ClientError, ClientResult};
pub use events::{
    CallEvent, ClientEvent, EventBus, EventObserver, NetworkEvent, RegistrationEvent,
    SubscriptionId,
};
pub use push::PushBridge;
pub use registration::{Credentials, RegistrationController, RegistrationState, Transport};
pub use session::{SessionController, SessionState};
pub use telephony::{TelephonyActionDelegate, TelephonyActionId, TelephonyUi};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

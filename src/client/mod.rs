//! High-level client composition
//!
//! This module holds the pieces applications touch directly:
//!
//! - **`manager`** - the [`ClientManager`] composition root
//! - **`calls`** - call control and the telephony action delegate
//! - **`config`** - client configuration
//!
//! Construct a [`ClientManager`] with your platform's engine factory and
//! telephony UI adapter, initialize it, then drive everything through the
//! controllers it exposes.

pub mod calls;
pub mod config;
pub mod manager;

pub use calls::CallController;
pub use config::{ClientConfig, LogLevel, PushConfig};
pub use manager::ClientManager;

//! Client configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Log verbosity forwarded to the signaling engine's logger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    #[default]
    Debug,
    Info,
    Warning,
    Error,
    Off,
}

/// Push notification configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushConfig {
    /// Whether push notifications are enabled for accounts
    pub enabled: bool,
    /// Use the sandbox push environment (development builds)
    pub sandbox: bool,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self { enabled: true, sandbox: true }
    }
}

impl PushConfig {
    /// Provider name submitted with account parameters
    pub fn provider(&self) -> &'static str {
        if self.sandbox {
            "apns.dev"
        } else {
            "apns"
        }
    }
}

/// Configuration for the client session
///
/// # Examples
///
/// ```
/// use callbridge_core::{ClientConfig, LogLevel};
///
/// let config = ClientConfig::new("sip.example.com")
///     .with_log_level(LogLevel::Info)
///     .with_push_enabled(false);
/// assert_eq!(config.domain, "sip.example.com");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Engine log verbosity
    pub log_level: LogLevel,
    /// Custom engine configuration directory; engine default when `None`
    pub config_dir: Option<PathBuf>,
    /// Push notification settings
    pub push: PushConfig,
    /// Default SIP domain used to complete bare extensions when dialing
    pub domain: String,
    /// Raw image bytes shown by the system call UI
    pub icon: Option<Vec<u8>>,
}

impl ClientConfig {
    /// Create a configuration with the given default SIP domain
    pub fn new(domain: impl Into<String>) -> Self {
        Self { domain: domain.into(), ..Default::default() }
    }

    /// Set the engine log verbosity
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Use a custom engine configuration directory
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    /// Enable or disable push notifications
    pub fn with_push_enabled(mut self, enabled: bool) -> Self {
        self.push.enabled = enabled;
        self
    }

    /// Select the sandbox or production push environment
    pub fn with_push_sandbox(mut self, sandbox: bool) -> Self {
        self.push.sandbox = sandbox;
        self
    }

    /// Set the icon shown by the system call UI
    pub fn with_icon(mut self, bytes: Vec<u8>) -> Self {
        self.icon = Some(bytes);
        self
    }
}

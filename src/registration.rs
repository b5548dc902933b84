//! SIP account registration
//!
//! The [`RegistrationController`] submits account setup to the engine and
//! tracks registration state from the domain events the engine reports.
//! `login` only ever *submits*: the transition to `Registered` (or `Failed`)
//! arrives later through the event bus.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::engine::{AccountParams, AuthInfo, EngineAddress};
use crate::error::{ClientError, ClientResult};
use crate::events::{ClientEvent, EventObserver, RegistrationEvent};
use crate::session::SessionController;

/// SIP transport used to reach the registrar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Transport {
    #[default]
    Tls,
    Tcp,
    Udp,
}

/// Account credentials supplied at login
///
/// # Examples
///
/// ```
/// use callbridge_core::registration::{Credentials, Transport};
///
/// let creds = Credentials::new("alice", "secret", "example.com")
///     .with_transport(Transport::Tcp);
/// assert_eq!(creds.transport, Transport::Tcp);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub domain: String,
    pub transport: Transport,
}

impl Credentials {
    /// Create credentials with the default transport (TLS)
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            domain: domain.into(),
            transport: Transport::default(),
        }
    }

    /// Select the transport used to reach the registrar
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }
}

/// Registration lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationState {
    /// No account configured
    None,
    /// REGISTER submitted, waiting for the registrar
    InProgress,
    /// Registration accepted
    Registered,
    /// Registration rejected or timed out
    Failed(String),
    /// Registration cleared after logout
    Unregistered,
}

impl std::fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationState::None => write!(f, "None"),
            RegistrationState::InProgress => write!(f, "InProgress"),
            RegistrationState::Registered => write!(f, "Registered"),
            RegistrationState::Failed(reason) => write!(f, "Failed: {reason}"),
            RegistrationState::Unregistered => write!(f, "Unregistered"),
        }
    }
}

/// Manages the single SIP account and its registration
pub struct RegistrationController {
    session: Arc<SessionController>,
    state: RwLock<RegistrationState>,
    username: RwLock<String>,
    domain: RwLock<String>,
    logged_in: AtomicBool,
}

impl RegistrationController {
    pub fn new(session: Arc<SessionController>) -> Self {
        Self {
            session,
            state: RwLock::new(RegistrationState::None),
            username: RwLock::new(String::new()),
            domain: RwLock::new(String::new()),
            logged_in: AtomicBool::new(false),
        }
    }

    /// Current registration state
    pub async fn state(&self) -> RegistrationState {
        self.state.read().await.clone()
    }

    /// Whether a registration was confirmed and not since lost
    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    /// Username of the account last submitted
    pub async fn username(&self) -> String {
        self.username.read().await.clone()
    }

    /// Domain of the account last submitted
    pub async fn domain(&self) -> String {
        self.domain.read().await.clone()
    }

    /// Submit account credentials to the engine
    ///
    /// Builds the identity (`sip:user@domain`) and registrar (`sip:domain`)
    /// addresses, installs auth info and an account with registration
    /// enabled, and makes it the default account. Returns as soon as the
    /// submission is accepted; the outcome arrives as a registration event.
    pub async fn login(&self, credentials: Credentials) -> ClientResult<()> {
        let engine = self.session.ready_engine().await.ok_or(ClientError::NotInitialized)?;
        if credentials.username.is_empty() || credentials.domain.is_empty() {
            return Err(ClientError::invalid_parameters(
                "username and domain must not be empty",
            ));
        }
        let config = self.session.config().await.ok_or(ClientError::NotInitialized)?;

        info!(
            username = %credentials.username,
            domain = %credentials.domain,
            "Logging in"
        );
        *self.username.write().await = credentials.username.clone();
        *self.domain.write().await = credentials.domain.clone();

        let auth = AuthInfo {
            username: credentials.username.clone(),
            password: credentials.password.clone(),
            realm: None,
            domain: credentials.domain.clone(),
        };
        let identity = EngineAddress::new(format!(
            "sip:{}@{}",
            credentials.username, credentials.domain
        ));
        let server = EngineAddress::new(format!("sip:{}", credentials.domain))
            .with_transport(credentials.transport);
        let params = AccountParams {
            identity,
            server,
            register_enabled: true,
            push_allowed: config.push.enabled,
            push_provider: config.push.enabled.then(|| config.push.provider().to_string()),
        };

        engine
            .add_auth_info(auth)
            .await
            .map_err(|e| ClientError::login_failed(e.to_string()))?;
        let account = engine
            .add_account(params)
            .await
            .map_err(|e| ClientError::login_failed(e.to_string()))?;
        engine.set_default_account(account).await;

        // Optimistic; the registrar's verdict arrives as an event.
        *self.state.write().await = RegistrationState::InProgress;
        Ok(())
    }

    /// Disable registration on the default account, keeping the account
    pub async fn logout(&self) -> ClientResult<()> {
        let engine = self.session.ready_engine().await.ok_or(ClientError::NotInitialized)?;
        let account = engine.default_account().await.ok_or(ClientError::NotLoggedIn)?;

        let mut params = engine
            .account_params(account)
            .await
            .map_err(|e| ClientError::unknown(e.to_string()))?;
        params.register_enabled = false;
        engine
            .update_account_params(account, params)
            .await
            .map_err(|e| ClientError::unknown(e.to_string()))?;

        info!("Logged out");
        *self.state.write().await = RegistrationState::Unregistered;
        self.logged_in.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Remove the default account and all stored auth material
    pub async fn delete_account(&self) -> ClientResult<()> {
        let engine = self.session.ready_engine().await.ok_or(ClientError::NotInitialized)?;
        let account = engine.default_account().await.ok_or(ClientError::NotLoggedIn)?;

        engine
            .remove_account(account)
            .await
            .map_err(|e| ClientError::unknown(e.to_string()))?;
        engine.clear_accounts().await;
        engine.clear_auth_info().await;

        info!("Account deleted");
        *self.username.write().await = String::new();
        *self.domain.write().await = String::new();
        *self.state.write().await = RegistrationState::None;
        self.logged_in.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl EventObserver for RegistrationController {
    async fn on_event(&self, event: ClientEvent) {
        let ClientEvent::Registration(event) = event else { return };
        let (state, logged_in) = match event {
            RegistrationEvent::Registered => (RegistrationState::Registered, true),
            RegistrationEvent::InProgress => (RegistrationState::InProgress, false),
            RegistrationEvent::Failed(reason) => {
                warn!("Registration failed: {}", reason);
                (RegistrationState::Failed(reason), false)
            }
            RegistrationEvent::Unregistered => (RegistrationState::Unregistered, false),
        };
        *self.state.write().await = state;
        self.logged_in.store(logged_in, Ordering::SeqCst);
    }
}

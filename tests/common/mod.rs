//! Shared fakes for integration tests
//!
//! `FakeEngine` and `FakeTelephonyUi` record every interaction and support
//! fault injection, so tests can assert on exactly what the controllers
//! asked of their collaborators.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use callbridge_core::engine::{
    AccountId, AccountParams, AudioDevice, AudioDeviceKind, AuthInfo, CallParams,
    EngineAddress, EngineCallId, EngineCallSnapshot, EngineError, EngineEvent, EngineFactory,
    EngineResult, EngineRuntime, EngineSettings, RawCallState, SignalingEngine,
    ENGINE_EVENT_QUEUE_DEPTH,
};
use callbridge_core::telephony::{
    CallDisplayUpdate, ProviderConfig, TelephonyActionId, TelephonyError, TelephonyResult,
    TelephonyUi,
};
use callbridge_core::{ClientConfig, ClientEvent, ClientManager, SessionState};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Recording fake of the signaling engine
pub struct FakeEngine {
    event_tx: mpsc::Sender<EngineEvent>,

    pub started: AtomicBool,
    pub video_enabled: AtomicBool,
    pub telephony_ui_enabled: AtomicBool,
    pub push_enabled: AtomicBool,
    mic_enabled: AtomicBool,

    current: Mutex<Option<EngineCallId>>,
    snapshots: Mutex<Vec<EngineCallSnapshot>>,
    next_call: AtomicU32,
    next_account: AtomicU32,

    pub invites: Mutex<Vec<EngineAddress>>,
    pub accepted: Mutex<Vec<EngineCallId>>,
    pub terminated: Mutex<Vec<EngineCallId>>,
    pub paused_calls: Mutex<Vec<EngineCallId>>,
    pub resumed_calls: Mutex<Vec<EngineCallId>>,
    pub dtmf_sent: Mutex<Vec<(EngineCallId, char)>>,
    pub auth_infos: Mutex<Vec<AuthInfo>>,
    pub accounts: Mutex<Vec<(AccountId, AccountParams)>>,
    default_account: Mutex<Option<AccountId>>,
    pub audio_session_configures: AtomicU32,
    pub registered_tokens: Mutex<Vec<String>>,
    pub push_payloads: Mutex<Vec<Option<String>>>,

    devices: Mutex<Vec<AudioDevice>>,
    output_device: Mutex<Option<AudioDevice>>,

    pub fail_start: AtomicBool,
    pub fail_invite: AtomicBool,
    pub fail_add_account: AtomicBool,
    pub fail_terminate: AtomicBool,
}

impl FakeEngine {
    fn new(event_tx: mpsc::Sender<EngineEvent>) -> Self {
        let devices = vec![
            AudioDevice {
                id: "earpiece0".into(),
                name: "Earpiece".into(),
                kind: AudioDeviceKind::Earpiece,
            },
            AudioDevice {
                id: "speaker0".into(),
                name: "Speaker".into(),
                kind: AudioDeviceKind::Speaker,
            },
            AudioDevice {
                id: "mic0".into(),
                name: "Microphone".into(),
                kind: AudioDeviceKind::Microphone,
            },
        ];
        Self {
            event_tx,
            started: AtomicBool::new(false),
            video_enabled: AtomicBool::new(true),
            telephony_ui_enabled: AtomicBool::new(false),
            push_enabled: AtomicBool::new(false),
            mic_enabled: AtomicBool::new(true),
            current: Mutex::new(None),
            snapshots: Mutex::new(Vec::new()),
            next_call: AtomicU32::new(1),
            next_account: AtomicU32::new(1),
            invites: Mutex::new(Vec::new()),
            accepted: Mutex::new(Vec::new()),
            terminated: Mutex::new(Vec::new()),
            paused_calls: Mutex::new(Vec::new()),
            resumed_calls: Mutex::new(Vec::new()),
            dtmf_sent: Mutex::new(Vec::new()),
            auth_infos: Mutex::new(Vec::new()),
            accounts: Mutex::new(Vec::new()),
            default_account: Mutex::new(None),
            audio_session_configures: AtomicU32::new(0),
            registered_tokens: Mutex::new(Vec::new()),
            push_payloads: Mutex::new(Vec::new()),
            devices: Mutex::new(devices),
            output_device: Mutex::new(None),
            fail_start: AtomicBool::new(false),
            fail_invite: AtomicBool::new(false),
            fail_add_account: AtomicBool::new(false),
            fail_terminate: AtomicBool::new(false),
        }
    }

    /// Inject a raw engine event, as a live engine adapter would
    pub fn send_event(&self, event: EngineEvent) {
        self.event_tx.try_send(event).expect("event channel full or closed");
    }

    /// Simulate an established incoming call on the engine side
    pub fn seed_incoming_call(&self, call_id: &str, remote: &str) {
        *self.current.lock().unwrap() = Some(call_id.to_string());
        self.snapshots.lock().unwrap().push(EngineCallSnapshot {
            call_id: call_id.to_string(),
            state: RawCallState::IncomingReceived,
            remote_address: remote.to_string(),
        });
        self.send_event(EngineEvent::CallStateChanged {
            call_id: call_id.to_string(),
            state: RawCallState::IncomingReceived,
            remote_address: Some(remote.to_string()),
            message: String::new(),
        });
    }

    pub fn set_snapshot_state(&self, call_id: &str, state: RawCallState) {
        let mut snapshots = self.snapshots.lock().unwrap();
        if let Some(snapshot) = snapshots.iter_mut().find(|s| s.call_id == call_id) {
            snapshot.state = state;
        }
    }

    pub fn current_call_sync(&self) -> Option<EngineCallId> {
        self.current.lock().unwrap().clone()
    }

    pub fn mic_enabled_sync(&self) -> bool {
        self.mic_enabled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalingEngine for FakeEngine {
    async fn start(&self) -> EngineResult<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(EngineError::new("transport bind failed"));
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
    }

    fn set_video_enabled(&self, enabled: bool) {
        self.video_enabled.store(enabled, Ordering::SeqCst);
    }

    fn set_telephony_ui_enabled(&self, enabled: bool) {
        self.telephony_ui_enabled.store(enabled, Ordering::SeqCst);
    }

    fn set_push_enabled(&self, enabled: bool) {
        self.push_enabled.store(enabled, Ordering::SeqCst);
    }

    async fn add_auth_info(&self, auth: AuthInfo) -> EngineResult<()> {
        self.auth_infos.lock().unwrap().push(auth);
        Ok(())
    }

    async fn add_account(&self, params: AccountParams) -> EngineResult<AccountId> {
        if self.fail_add_account.load(Ordering::SeqCst) {
            return Err(EngineError::new("account rejected"));
        }
        let id = AccountId(self.next_account.fetch_add(1, Ordering::SeqCst));
        self.accounts.lock().unwrap().push((id, params));
        Ok(id)
    }

    async fn set_default_account(&self, account: AccountId) {
        *self.default_account.lock().unwrap() = Some(account);
    }

    async fn default_account(&self) -> Option<AccountId> {
        *self.default_account.lock().unwrap()
    }

    async fn account_params(&self, account: AccountId) -> EngineResult<AccountParams> {
        self.accounts
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| *id == account)
            .map(|(_, params)| params.clone())
            .ok_or_else(|| EngineError::new("unknown account"))
    }

    async fn update_account_params(
        &self,
        account: AccountId,
        params: AccountParams,
    ) -> EngineResult<()> {
        let mut accounts = self.accounts.lock().unwrap();
        let entry = accounts
            .iter_mut()
            .find(|(id, _)| *id == account)
            .ok_or_else(|| EngineError::new("unknown account"))?;
        entry.1 = params;
        Ok(())
    }

    async fn remove_account(&self, account: AccountId) -> EngineResult<()> {
        self.accounts.lock().unwrap().retain(|(id, _)| *id != account);
        let mut default = self.default_account.lock().unwrap();
        if *default == Some(account) {
            *default = None;
        }
        Ok(())
    }

    async fn clear_accounts(&self) {
        self.accounts.lock().unwrap().clear();
        *self.default_account.lock().unwrap() = None;
    }

    async fn clear_auth_info(&self) {
        self.auth_infos.lock().unwrap().clear();
    }

    async fn invite(
        &self,
        address: &EngineAddress,
        _params: &CallParams,
    ) -> EngineResult<EngineCallId> {
        if self.fail_invite.load(Ordering::SeqCst) {
            return Err(EngineError::new("engine busy"));
        }
        self.invites.lock().unwrap().push(address.clone());
        let call_id = format!("call-{}", self.next_call.fetch_add(1, Ordering::SeqCst));
        *self.current.lock().unwrap() = Some(call_id.clone());
        self.snapshots.lock().unwrap().push(EngineCallSnapshot {
            call_id: call_id.clone(),
            state: RawCallState::OutgoingInit,
            remote_address: address.uri.clone(),
        });
        Ok(call_id)
    }

    async fn current_call(&self) -> Option<EngineCallId> {
        self.current.lock().unwrap().clone()
    }

    async fn calls(&self) -> Vec<EngineCallSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }

    async fn accept(&self, call_id: &EngineCallId) -> EngineResult<()> {
        self.accepted.lock().unwrap().push(call_id.clone());
        Ok(())
    }

    async fn terminate(&self, call_id: &EngineCallId) -> EngineResult<()> {
        if self.fail_terminate.load(Ordering::SeqCst) {
            return Err(EngineError::new("terminate refused"));
        }
        self.terminated.lock().unwrap().push(call_id.clone());
        self.snapshots.lock().unwrap().retain(|s| s.call_id != *call_id);
        let mut current = self.current.lock().unwrap();
        if current.as_deref() == Some(call_id.as_str()) {
            *current = None;
        }
        Ok(())
    }

    async fn pause(&self, call_id: &EngineCallId) -> EngineResult<()> {
        self.paused_calls.lock().unwrap().push(call_id.clone());
        self.set_snapshot_state(call_id, RawCallState::Paused);
        Ok(())
    }

    async fn resume(&self, call_id: &EngineCallId) -> EngineResult<()> {
        self.resumed_calls.lock().unwrap().push(call_id.clone());
        self.set_snapshot_state(call_id, RawCallState::StreamsRunning);
        Ok(())
    }

    async fn send_dtmf(&self, call_id: &EngineCallId, digit: char) -> EngineResult<()> {
        self.dtmf_sent.lock().unwrap().push((call_id.clone(), digit));
        Ok(())
    }

    fn set_mic_enabled(&self, enabled: bool) {
        self.mic_enabled.store(enabled, Ordering::SeqCst);
    }

    fn mic_enabled(&self) -> bool {
        self.mic_enabled.load(Ordering::SeqCst)
    }

    async fn audio_devices(&self) -> Vec<AudioDevice> {
        self.devices.lock().unwrap().clone()
    }

    async fn output_audio_device(&self, _call_id: &EngineCallId) -> Option<AudioDevice> {
        self.output_device.lock().unwrap().clone()
    }

    async fn set_output_audio_device(
        &self,
        _call_id: &EngineCallId,
        device: &AudioDevice,
    ) -> EngineResult<()> {
        *self.output_device.lock().unwrap() = Some(device.clone());
        Ok(())
    }

    async fn configure_audio_session(&self) {
        self.audio_session_configures.fetch_add(1, Ordering::SeqCst);
    }

    async fn register_device_token(&self, token: &str) -> EngineResult<()> {
        self.registered_tokens.lock().unwrap().push(token.to_string());
        Ok(())
    }

    async fn process_push_payload(&self, call_id: Option<&str>) -> EngineResult<()> {
        self.push_payloads.lock().unwrap().push(call_id.map(str::to_owned));
        Ok(())
    }
}

/// Factory handing out one pre-built fake engine
pub struct FakeEngineFactory {
    engine: Arc<FakeEngine>,
    receiver: Mutex<Option<mpsc::Receiver<EngineEvent>>>,
    pub fail_create: AtomicBool,
    pub last_settings: Mutex<Option<EngineSettings>>,
}

impl FakeEngineFactory {
    pub fn new() -> (Arc<Self>, Arc<FakeEngine>) {
        let (tx, rx) = mpsc::channel(ENGINE_EVENT_QUEUE_DEPTH);
        let engine = Arc::new(FakeEngine::new(tx));
        let factory = Arc::new(Self {
            engine: engine.clone(),
            receiver: Mutex::new(Some(rx)),
            fail_create: AtomicBool::new(false),
            last_settings: Mutex::new(None),
        });
        (factory, engine)
    }
}

#[async_trait]
impl EngineFactory for FakeEngineFactory {
    async fn create(&self, settings: EngineSettings) -> EngineResult<EngineRuntime> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(EngineError::new("factory offline"));
        }
        *self.last_settings.lock().unwrap() = Some(settings);
        let events = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| EngineError::new("engine already created"))?;
        Ok(EngineRuntime { engine: self.engine.clone(), events })
    }
}

/// Recording fake of the platform telephony UI
pub struct FakeTelephonyUi {
    pub configured: Mutex<Vec<ProviderConfig>>,
    pub start_requests: Mutex<Vec<(TelephonyActionId, String)>>,
    pub end_requests: Mutex<Vec<TelephonyActionId>>,
    pub incoming_reports: Mutex<Vec<(TelephonyActionId, CallDisplayUpdate)>>,
    pub fail_start: AtomicBool,
}

impl FakeTelephonyUi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            configured: Mutex::new(Vec::new()),
            start_requests: Mutex::new(Vec::new()),
            end_requests: Mutex::new(Vec::new()),
            incoming_reports: Mutex::new(Vec::new()),
            fail_start: AtomicBool::new(false),
        })
    }

    pub fn end_request_count(&self) -> usize {
        self.end_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl TelephonyUi for FakeTelephonyUi {
    async fn configure(&self, config: ProviderConfig) {
        self.configured.lock().unwrap().push(config);
    }

    async fn request_start_call(
        &self,
        action: TelephonyActionId,
        handle: &str,
    ) -> TelephonyResult<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(TelephonyError::new("provider unavailable"));
        }
        self.start_requests.lock().unwrap().push((action, handle.to_string()));
        Ok(())
    }

    async fn request_end_call(&self, action: TelephonyActionId) -> TelephonyResult<()> {
        self.end_requests.lock().unwrap().push(action);
        Ok(())
    }

    async fn report_incoming_call(
        &self,
        action: TelephonyActionId,
        update: CallDisplayUpdate,
    ) -> TelephonyResult<()> {
        self.incoming_reports.lock().unwrap().push((action, update));
        Ok(())
    }
}

/// A manager initialized against fresh fakes, ready for commands
pub async fn ready_client() -> (Arc<ClientManager>, Arc<FakeEngine>, Arc<FakeTelephonyUi>) {
    ready_client_with_config(ClientConfig::new("sip.example.com")).await
}

pub async fn ready_client_with_config(
    config: ClientConfig,
) -> (Arc<ClientManager>, Arc<FakeEngine>, Arc<FakeTelephonyUi>) {
    init_tracing();
    let (factory, engine) = FakeEngineFactory::new();
    let telephony = FakeTelephonyUi::new();
    let client = ClientManager::new(factory, telephony.clone());
    let state = client.initialize(config).await;
    assert_eq!(state, SessionState::Ready);
    (client, engine, telephony)
}

/// Await the first broadcast event matching `pred`, skipping others
pub async fn wait_for<F>(rx: &mut broadcast::Receiver<ClientEvent>, mut pred: F) -> ClientEvent
where
    F: FnMut(&ClientEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.expect("event bus closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

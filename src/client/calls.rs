//! Call control
//!
//! The [`CallController`] issues call commands to the engine, keeps the
//! single tracked [`CallRecord`], and mirrors call progress into the system
//! telephony UI. State changes come exclusively from domain events observed
//! on the bus; command results and telephony action outcomes never touch
//! [`CallState`] directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::call::{
    call_state_for_event, caller_display_name, handle_from_uri, CallDirection, CallRecord,
    CallState, ClientInfo,
};
use crate::engine::{AudioDeviceKind, CallParams, EngineAddress, RawCallState};
use crate::error::{ClientError, ClientResult};
use crate::events::{CallEvent, ClientEvent, EventObserver};
use crate::session::SessionController;
use crate::telephony::{
    CallDisplayUpdate, ProviderConfig, TelephonyActionDelegate, TelephonyActionId,
    TelephonyError, TelephonyResult, TelephonyUi,
};

/// Controls the single tracked call
pub struct CallController {
    session: Arc<SessionController>,
    telephony: Arc<dyn TelephonyUi>,
    current_call: RwLock<Option<CallRecord>>,
    call_state: RwLock<CallState>,
    action_id: RwLock<Option<TelephonyActionId>>,
    client: RwLock<ClientInfo>,
    mic_muted: AtomicBool,
    speaker_enabled: AtomicBool,
    paused: AtomicBool,
}

impl CallController {
    pub fn new(session: Arc<SessionController>, telephony: Arc<dyn TelephonyUi>) -> Self {
        Self {
            session,
            telephony,
            current_call: RwLock::new(None),
            call_state: RwLock::new(CallState::Idle),
            action_id: RwLock::new(None),
            client: RwLock::new(ClientInfo::default()),
            mic_muted: AtomicBool::new(false),
            speaker_enabled: AtomicBool::new(false),
            paused: AtomicBool::new(false),
        }
    }

    /// One-time telephony provider setup
    pub async fn configure_provider(&self, icon: Option<Vec<u8>>) {
        let config = ProviderConfig { icon, ..Default::default() };
        self.telephony.configure(config).await;
    }

    /// The tracked call, if any
    pub async fn current_call(&self) -> Option<CallRecord> {
        self.current_call.read().await.clone()
    }

    /// Current call state
    pub async fn call_state(&self) -> CallState {
        self.call_state.read().await.clone()
    }

    /// Whether the microphone is muted
    pub fn is_mic_muted(&self) -> bool {
        self.mic_muted.load(Ordering::SeqCst)
    }

    /// Whether audio is routed to the speaker
    pub fn is_speaker_enabled(&self) -> bool {
        self.speaker_enabled.load(Ordering::SeqCst)
    }

    /// Whether the tracked call is locally on hold
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Local party presentation stamped into new call records
    pub async fn client_info(&self) -> ClientInfo {
        self.client.read().await.clone()
    }

    /// Update the local party presentation
    pub async fn set_client_info(&self, client: ClientInfo) {
        *self.client.write().await = client;
    }

    /// Place an outgoing call
    ///
    /// A bare extension is completed with the configured default domain
    /// (`5551234` becomes `sip:5551234@{domain}`); addresses that already
    /// carry a scheme or host are used as given. The telephony start action
    /// is requested before the engine invite so the OS shows the call
    /// immediately; if the invite then fails the action is rolled back.
    pub async fn make_call(&self, address: &str, client: ClientInfo) -> ClientResult<CallRecord> {
        let engine = self.session.ready_engine().await.ok_or(ClientError::NotInitialized)?;
        if address.is_empty() {
            return Err(ClientError::invalid_parameters("address must not be empty"));
        }

        let uri = if address.starts_with("sip:")
            || address.starts_with("sips:")
            || address.contains('@')
        {
            address.to_string()
        } else {
            let config = self.session.config().await.ok_or(ClientError::NotInitialized)?;
            if config.domain.is_empty() {
                return Err(ClientError::NotConfigured);
            }
            format!("sip:{}@{}", address, config.domain)
        };

        let mut target = EngineAddress::new(uri.clone());
        if !client.name.is_empty() {
            target = target.with_display_name(client.name.clone());
        }
        let params = CallParams::default();

        let action = TelephonyActionId::new();
        *self.action_id.write().await = Some(action);
        if let Err(e) = self.telephony.request_start_call(action, &handle_from_uri(&uri)).await {
            *self.action_id.write().await = None;
            return Err(ClientError::call_failed(e.to_string()));
        }

        let call_id = match engine.invite(&target, &params).await {
            Ok(call_id) => call_id,
            Err(e) => {
                // Roll back the already-requested start action.
                if let Some(action) = self.action_id.write().await.take() {
                    if let Err(ui_err) = self.telephony.request_end_call(action).await {
                        warn!("Telephony rollback failed: {}", ui_err);
                    }
                }
                return Err(ClientError::call_failed(e.to_string()));
            }
        };

        let record = CallRecord {
            call_id: call_id.clone(),
            remote_address: uri,
            direction: CallDirection::Outgoing,
            client,
            created_at: Utc::now(),
        };
        *self.current_call.write().await = Some(record.clone());
        *self.call_state.write().await = CallState::OutgoingInit;
        info!(call_id = %call_id, "Outgoing call started");
        Ok(record)
    }

    /// Accept the current incoming call
    pub async fn answer_call(&self) -> ClientResult<()> {
        let engine = self.session.ready_engine().await.ok_or(ClientError::NotInitialized)?;
        let call_id = engine.current_call().await.ok_or(ClientError::NoActiveCall)?;

        engine.configure_audio_session().await;
        engine
            .accept(&call_id)
            .await
            .map_err(|e| ClientError::call_failed(e.to_string()))?;
        *self.call_state.write().await = CallState::Connecting;
        info!(call_id = %call_id, "Call answered");
        Ok(())
    }

    /// End the current call
    ///
    /// Tears down both paths best-effort: the telephony UI action (if one is
    /// pending) and the engine call (if one exists). Failures are logged,
    /// never returned; calling with nothing to tear down is a no-op.
    pub async fn end_call(&self) -> ClientResult<()> {
        let engine = self.session.ready_engine().await.ok_or(ClientError::NotInitialized)?;

        // The id is only read, never cleared here; clearing belongs to the
        // terminal event, which arrives once the engine confirms.
        let action = *self.action_id.read().await;
        if let Some(action) = action {
            if let Err(e) = self.telephony.request_end_call(action).await {
                warn!("Telephony end request failed: {}", e);
            }
        }
        if let Some(call_id) = engine.current_call().await {
            if let Err(e) = engine.terminate(&call_id).await {
                warn!(call_id = %call_id, "Engine terminate failed: {}", e);
            }
        }
        Ok(())
    }

    /// Flip the microphone mute flag; returns the new muted state
    pub async fn toggle_microphone(&self) -> ClientResult<bool> {
        let engine = self.session.ready_engine().await.ok_or(ClientError::NotInitialized)?;
        let muted = !self.mic_muted.load(Ordering::SeqCst);
        engine.set_mic_enabled(!muted);
        self.mic_muted.store(muted, Ordering::SeqCst);
        Ok(muted)
    }

    /// Toggle hold on a call
    ///
    /// Pauses the running call if one exists. Otherwise resumes a paused
    /// call: the first one whose remote address contains `target` when
    /// given, else the first paused call. Returns `Ok(true)` when a pause
    /// or resume was accepted, `Ok(false)` when no call matched or the
    /// engine refused.
    pub async fn toggle_call_hold(&self, target: Option<&str>) -> ClientResult<bool> {
        let engine = self.session.ready_engine().await.ok_or(ClientError::NotInitialized)?;
        let snapshots = engine.calls().await;

        if let Some(running) = snapshots.iter().find(|s| {
            matches!(s.state, RawCallState::StreamsRunning | RawCallState::Connected)
        }) {
            return match engine.pause(&running.call_id).await {
                Ok(()) => {
                    self.paused.store(true, Ordering::SeqCst);
                    Ok(true)
                }
                Err(e) => {
                    warn!(call_id = %running.call_id, "Pause failed: {}", e);
                    Ok(false)
                }
            };
        }

        let paused = |s: &&crate::engine::EngineCallSnapshot| {
            matches!(s.state, RawCallState::Paused | RawCallState::Pausing)
        };
        let snapshot = match target {
            Some(needle) => snapshots
                .iter()
                .filter(paused)
                .find(|s| s.remote_address.contains(needle)),
            None => snapshots.iter().find(paused),
        };
        let Some(snapshot) = snapshot else {
            debug!("No call matched hold toggle");
            return Ok(false);
        };
        match engine.resume(&snapshot.call_id).await {
            Ok(()) => {
                self.paused.store(false, Ordering::SeqCst);
                Ok(true)
            }
            Err(e) => {
                warn!(call_id = %snapshot.call_id, "Resume failed: {}", e);
                Ok(false)
            }
        }
    }

    /// Toggle audio routing between speaker and earpiece
    ///
    /// Returns the new speaker flag; no-op (returning the current flag) when
    /// there is no current call or no alternative device.
    pub async fn toggle_speaker(&self) -> ClientResult<bool> {
        let engine = self.session.ready_engine().await.ok_or(ClientError::NotInitialized)?;
        let Some(call_id) = engine.current_call().await else {
            return Ok(self.speaker_enabled.load(Ordering::SeqCst));
        };

        let on_speaker = matches!(
            engine.output_audio_device(&call_id).await,
            Some(device) if device.kind == AudioDeviceKind::Speaker
        );
        let wanted = if on_speaker {
            AudioDeviceKind::Earpiece
        } else {
            AudioDeviceKind::Speaker
        };
        let devices = engine.audio_devices().await;
        let device = devices
            .iter()
            .find(|d| d.kind == wanted)
            .or_else(|| {
                // Headless engines report plain microphones instead of an earpiece.
                (wanted == AudioDeviceKind::Earpiece)
                    .then(|| devices.iter().find(|d| d.kind == AudioDeviceKind::Microphone))
                    .flatten()
            });
        let Some(device) = device else {
            return Ok(self.speaker_enabled.load(Ordering::SeqCst));
        };

        engine
            .set_output_audio_device(&call_id, device)
            .await
            .map_err(|e| ClientError::call_failed(e.to_string()))?;
        let enabled = !on_speaker;
        self.speaker_enabled.store(enabled, Ordering::SeqCst);
        Ok(enabled)
    }

    /// Send one DTMF digit on the current call
    pub async fn send_dtmf(&self, digit: char) -> ClientResult<()> {
        if !digit.is_ascii_alphanumeric() && digit != '*' && digit != '#' {
            return Err(ClientError::invalid_parameters(format!(
                "invalid DTMF digit: {digit:?}"
            )));
        }
        let engine = self.session.ready_engine().await.ok_or(ClientError::NotInitialized)?;
        let call_id = engine.current_call().await.ok_or(ClientError::NoActiveCall)?;
        engine
            .send_dtmf(&call_id, digit)
            .await
            .map_err(|e| ClientError::call_failed(e.to_string()))
    }

    /// Terminal-event teardown; clearing twice is a no-op
    async fn clear_call(&self) {
        *self.current_call.write().await = None;
        if let Some(action) = self.action_id.write().await.take() {
            if let Err(e) = self.telephony.request_end_call(action).await {
                warn!("Telephony end request failed: {}", e);
            }
        }
        self.mic_muted.store(false, Ordering::SeqCst);
        self.speaker_enabled.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
    }

    async fn handle_incoming(&self, call_id: &str, from: &str) {
        let action = TelephonyActionId::new();
        *self.action_id.write().await = Some(action);

        let record = CallRecord {
            call_id: call_id.to_string(),
            remote_address: from.to_string(),
            direction: CallDirection::Incoming,
            client: self.client.read().await.clone(),
            created_at: Utc::now(),
        };
        *self.current_call.write().await = Some(record);

        let update = CallDisplayUpdate {
            caller_name: caller_display_name(from),
            handle: from.to_string(),
            has_video: false,
            supports_dtmf: true,
            supports_holding: true,
        };
        if let Err(e) = self.telephony.report_incoming_call(action, update).await {
            warn!(call_id = %call_id, "Incoming call report failed: {}", e);
        }
        info!(call_id = %call_id, from = %from, "Incoming call");
    }
}

#[async_trait]
impl EventObserver for CallController {
    async fn on_event(&self, event: ClientEvent) {
        let ClientEvent::Call(event) = event else { return };
        let new_state = call_state_for_event(&event);
        match &event {
            CallEvent::Incoming { call_id, from } => {
                self.handle_incoming(call_id, from).await;
            }
            CallEvent::Terminated { call_id, reason } => {
                info!(call_id = %call_id, reason = %reason, "Call terminated");
                self.clear_call().await;
            }
            _ => {}
        }
        *self.call_state.write().await = new_state;
    }
}

#[async_trait]
impl TelephonyActionDelegate for CallController {
    /// The OS dropped all call UI; drop the engine calls with it
    async fn on_provider_reset(&self) {
        warn!("Telephony provider reset");
        let Some(engine) = self.session.engine().await else { return };
        for snapshot in engine.calls().await {
            if let Err(e) = engine.terminate(&snapshot.call_id).await {
                warn!(call_id = %snapshot.call_id, "Terminate on reset failed: {}", e);
            }
        }
    }

    async fn perform_start(&self, _action: TelephonyActionId) -> TelephonyResult<()> {
        // The engine invite was already sent by make_call.
        Ok(())
    }

    async fn perform_answer(&self, _action: TelephonyActionId) -> TelephonyResult<()> {
        let engine = self
            .session
            .engine()
            .await
            .ok_or_else(|| TelephonyError::new("not initialized"))?;
        let call_id = engine
            .current_call()
            .await
            .ok_or_else(|| TelephonyError::new("no active call"))?;
        engine.configure_audio_session().await;
        engine
            .accept(&call_id)
            .await
            .map_err(|e| TelephonyError::new(e.to_string()))
    }

    async fn perform_end(&self, _action: TelephonyActionId) -> TelephonyResult<()> {
        let engine = self
            .session
            .engine()
            .await
            .ok_or_else(|| TelephonyError::new("not initialized"))?;
        let call_id = match engine.current_call().await {
            Some(call_id) => call_id,
            None => match engine.calls().await.into_iter().next() {
                Some(snapshot) => snapshot.call_id,
                // Nothing to end; fulfill so the UI can close.
                None => return Ok(()),
            },
        };
        engine
            .terminate(&call_id)
            .await
            .map_err(|e| TelephonyError::new(e.to_string()))
    }

    async fn perform_set_held(
        &self,
        _action: TelephonyActionId,
        on_hold: bool,
    ) -> TelephonyResult<()> {
        let engine = self
            .session
            .engine()
            .await
            .ok_or_else(|| TelephonyError::new("not initialized"))?;
        let call_id = engine
            .current_call()
            .await
            .ok_or_else(|| TelephonyError::new("no active call"))?;
        let result = if on_hold {
            engine.pause(&call_id).await
        } else {
            engine.resume(&call_id).await
        };
        result.map_err(|e| TelephonyError::new(e.to_string()))?;
        self.paused.store(on_hold, Ordering::SeqCst);
        Ok(())
    }

    async fn perform_set_muted(
        &self,
        _action: TelephonyActionId,
        muted: bool,
    ) -> TelephonyResult<()> {
        let engine = self
            .session
            .engine()
            .await
            .ok_or_else(|| TelephonyError::new("not initialized"))?;
        engine.set_mic_enabled(!muted);
        self.mic_muted.store(muted, Ordering::SeqCst);
        Ok(())
    }

    async fn perform_dtmf(
        &self,
        _action: TelephonyActionId,
        digits: &str,
    ) -> TelephonyResult<()> {
        let engine = self
            .session
            .engine()
            .await
            .ok_or_else(|| TelephonyError::new("not initialized"))?;
        let call_id = engine
            .current_call()
            .await
            .ok_or_else(|| TelephonyError::new("no active call"))?;
        for digit in digits.chars() {
            engine
                .send_dtmf(&call_id, digit)
                .await
                .map_err(|e| TelephonyError::new(e.to_string()))?;
        }
        Ok(())
    }
}

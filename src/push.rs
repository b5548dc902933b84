//! VoIP push notification bridge
//!
//! Renders device push tokens into the engine's expected text form and
//! extracts call identifiers from incoming push payloads.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};
use crate::session::SessionController;

/// Suffix marking a token as a VoIP push token
const VOIP_TOKEN_SUFFIX: &str = ":voip";

/// Render raw token bytes as uppercase hex with the VoIP suffix
///
/// ```
/// assert_eq!(callbridge_core::push::render_token(&[0xAB, 0xCD]), "ABCD:voip");
/// ```
pub fn render_token(bytes: &[u8]) -> String {
    let mut rendered = String::with_capacity(bytes.len() * 2 + VOIP_TOKEN_SUFFIX.len());
    for byte in bytes {
        rendered.push_str(&format!("{byte:02X}"));
    }
    rendered.push_str(VOIP_TOKEN_SUFFIX);
    rendered
}

/// Pull a call identifier out of a push payload
///
/// Checks the `call-id` key, the alternate `callId` spelling, then the
/// nested `aps.alert.title` fallback some push gateways use.
fn extract_call_id(payload: &Value) -> Option<String> {
    payload
        .get("call-id")
        .and_then(Value::as_str)
        .or_else(|| payload.get("callId").and_then(Value::as_str))
        .or_else(|| payload.pointer("/aps/alert/title").and_then(Value::as_str))
        .map(str::to_owned)
}

/// Connects OS push notifications to the signaling engine
pub struct PushBridge {
    session: Arc<SessionController>,
}

impl PushBridge {
    pub fn new(session: Arc<SessionController>) -> Self {
        Self { session }
    }

    /// Register a device push token with the engine
    ///
    /// Fails with `NotInitialized` while the session is not ready; the
    /// token is not retained, callers retry after initialization.
    pub async fn register_token(&self, token: &[u8]) -> ClientResult<()> {
        let engine = self.session.ready_engine().await.ok_or(ClientError::NotInitialized)?;
        let rendered = render_token(token);
        debug!(token = %rendered, "Registering push token");
        engine
            .register_device_token(&rendered)
            .await
            .map_err(|e| ClientError::unknown(e.to_string()))
    }

    /// Process an incoming push payload
    ///
    /// Always forwards to the engine's push-processing primitive (with the
    /// extracted identifier or none) and returns whether an identifier was
    /// found. Returns `Ok(false)` without forwarding when the session is
    /// not ready.
    pub async fn handle_notification(&self, payload: &Value) -> ClientResult<bool> {
        let Some(engine) = self.session.ready_engine().await else {
            warn!("Push received before initialization; dropping");
            return Ok(false);
        };
        let call_id = extract_call_id(payload);
        debug!(call_id = ?call_id, "Processing push payload");
        engine
            .process_push_payload(call_id.as_deref())
            .await
            .map_err(|e| ClientError::unknown(e.to_string()))?;
        Ok(call_id.is_some())
    }
}

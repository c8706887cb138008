//! Connection-upgrade gate.
//!
//! Authenticates the `token` query parameter before any WebSocket
//! resources are allocated. On success the transport is upgraded and the
//! connection handed to the realtime pumps; on any authentication
//! failure the handshake is never completed.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::auth::token_prefix;
use crate::error::RelayError;
use crate::realtime::{HubHandle, run_connection};

/// Query parameters accepted by the upgrade endpoints.
#[derive(Debug, Deserialize)]
pub struct UpgradeParams {
    /// Credential token issued by the account service.
    #[serde(default)]
    token: Option<String>,
}

/// `GET /ws/chat` — upgrade onto the chat hub.
///
/// # Errors
///
/// Returns 401 when the token is missing, invalid, or expired.
pub async fn chat_ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<UpgradeParams>,
    State(state): State<AppState>,
) -> Result<Response, RelayError> {
    let hub = state.chat_hub.clone();
    upgrade(ws, &params, &state, hub)
}

/// `GET /ws/notifications` — upgrade onto the notifications hub.
///
/// # Errors
///
/// Returns 401 when the token is missing, invalid, or expired.
pub async fn notifications_ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<UpgradeParams>,
    State(state): State<AppState>,
) -> Result<Response, RelayError> {
    let hub = state.notify_hub.clone();
    upgrade(ws, &params, &state, hub)
}

/// Validates the credential token and completes the upgrade.
///
/// An absent or empty token is rejected without ever reaching the
/// validator. The failure log carries only a bounded token prefix.
fn upgrade(
    ws: WebSocketUpgrade,
    params: &UpgradeParams,
    state: &AppState,
    hub: HubHandle,
) -> Result<Response, RelayError> {
    let token = params
        .token
        .as_deref()
        .filter(|token| !token.is_empty())
        .ok_or(RelayError::AuthRequired)?;

    let principal = match state.validator.validate(token) {
        Ok(principal) => principal,
        Err(error) => {
            tracing::warn!(
                token_prefix = %token_prefix(token),
                %error,
                "authentication failed"
            );
            return Err(RelayError::AuthRejected(error));
        }
    };

    let pump = state.pump;
    Ok(ws
        .max_message_size(pump.max_frame_bytes)
        .on_upgrade(move |socket| run_connection(socket, hub, principal, pump)))
}

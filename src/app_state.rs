//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::TokenValidator;
use crate::config::PumpConfig;
use crate::realtime::HubHandle;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Hub instance behind the chat endpoints.
    pub chat_hub: HubHandle,
    /// Hub instance behind the notifications endpoint.
    pub notify_hub: HubHandle,
    /// Validator for connection-upgrade credential tokens.
    pub validator: Arc<dyn TokenValidator>,
    /// Per-connection pump settings.
    pub pump: PumpConfig,
}

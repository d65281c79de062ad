//! Request handlers for sync endpoints.

use crate::auth::{AuthConfig, TokenValidator};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::store::EventStore;
use std::sync::Arc;
use weapon_core::{Clock, SystemClock};
use weapon_sync_protocol::{
    Credentials, HandshakeRequest, HandshakeResponse, PullRequest, PullResponse, PushRequest,
    PushResponse, PROTOCOL_VERSION,
};

/// Context for request handling.
#[derive(Debug)]
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Event storage (shared across all handlers).
    pub store: Arc<EventStore>,
    validator: Option<TokenValidator>,
}

impl HandlerContext {
    /// Creates a context on the system clock.
    pub fn new(config: ServerConfig, store: Arc<EventStore>) -> Self {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    /// Creates a context whose token checks read `clock`.
    pub fn with_clock(config: ServerConfig, store: Arc<EventStore>, clock: Arc<dyn Clock>) -> Self {
        let validator = match (&config.auth_secret, config.require_auth) {
            (Some(secret), true) => Some(TokenValidator::with_clock(
                AuthConfig::new(secret.clone()).with_expiry(config.token_expiry),
                clock,
            )),
            _ => None,
        };
        Self {
            config,
            store,
            validator,
        }
    }

    /// Token validator, when authentication is enabled.
    pub fn validator(&self) -> Option<&TokenValidator> {
        self.validator.as_ref()
    }

    fn authenticate(&self, credentials: &Credentials) -> ServerResult<()> {
        if credentials.user_id.is_empty() {
            return Err(ServerError::InvalidRequest("empty user id".into()));
        }
        if !self.config.require_auth {
            return Ok(());
        }
        let validator = self.validator.as_ref().ok_or_else(|| {
            ServerError::Internal("authentication required but no secret configured".into())
        })?;
        let token = credentials
            .auth_token
            .as_deref()
            .ok_or_else(|| ServerError::AuthenticationFailed("missing token".into()))?;
        validator.validate_token(token, &credentials.user_id, &credentials.device_id)
    }
}

/// Handler for sync requests.
#[derive(Debug)]
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles a handshake request.
    pub fn handle_handshake(&self, request: HandshakeRequest) -> ServerResult<HandshakeResponse> {
        if request.protocol_version != PROTOCOL_VERSION {
            return Err(ServerError::ProtocolMismatch {
                server: PROTOCOL_VERSION,
                client: request.protocol_version,
            });
        }
        self.context.authenticate(&request.credentials)?;

        let user = &request.credentials.user_id;
        tracing::debug!(user = %user, device = %request.credentials.device_id, "handshake");
        Ok(HandshakeResponse {
            protocol_version: PROTOCOL_VERSION,
            remote_clock: self.context.store.clock(user),
            event_count: self.context.store.count(user),
        })
    }

    /// Handles a pull request.
    pub fn handle_pull(&self, request: PullRequest) -> ServerResult<PullResponse> {
        self.context.authenticate(&request.credentials)?;
        if request.limit == 0 {
            return Err(ServerError::InvalidRequest("pull limit must be positive".into()));
        }

        let user = &request.credentials.user_id;
        let limit = request.limit.min(self.context.config.max_pull_batch);
        let store = &self.context.store;
        let (events, has_more) = store.events_since(user, &request.since, limit);
        tracing::debug!(user = %user, returned = events.len(), has_more, "pull");
        Ok(PullResponse {
            events,
            has_more,
            remote_clock: store.clock(user),
            event_count: store.count(user),
        })
    }

    /// Handles a push request.
    pub fn handle_push(&self, request: PushRequest) -> ServerResult<PushResponse> {
        self.context.authenticate(&request.credentials)?;
        let limit = self.context.config.max_push_batch;
        if request.events.len() > limit as usize {
            return Err(ServerError::TooLarge {
                size: request.events.len(),
                limit,
            });
        }
        for event in &request.events {
            event
                .validate()
                .map_err(|e| ServerError::InvalidRequest(format!("event {}: {e}", event.id)))?;
        }

        let user = &request.credentials.user_id;
        let store = &self.context.store;
        let summary = store.append(user, &request.events)?;
        tracing::debug!(
            user = %user,
            stored = summary.stored,
            duplicates = summary.duplicates,
            "push"
        );
        Ok(PushResponse {
            stored: summary.stored,
            duplicates: summary.duplicates,
            remote_clock: store.clock(user),
            event_count: store.count(user),
        })
    }
}

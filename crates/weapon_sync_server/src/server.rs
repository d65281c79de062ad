//! Main sync server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RequestHandler};
use crate::store::EventStore;
use std::sync::Arc;
use weapon_core::{Clock, DeviceId};
use weapon_sync_protocol::{
    endpoints, ErrorResponse, HandshakeRequest, HandshakeResponse, PullRequest, PullResponse,
    PushRequest, PushResponse, Reply, Wire,
};

/// The sync server.
///
/// Handles handshake, push and pull for every user it stores events for.
/// HTTP front ends (or in-process loopback clients) call [`SyncServer::route`]
/// with the request path and CBOR body.
///
/// # Example
///
/// ```
/// use weapon_sync_server::{ServerConfig, SyncServer};
///
/// let server = SyncServer::new(ServerConfig::default());
/// assert_eq!(server.event_count("user-1"), 0);
/// ```
#[derive(Debug)]
pub struct SyncServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl SyncServer {
    /// Creates a new sync server.
    pub fn new(config: ServerConfig) -> Self {
        Self::from_context(HandlerContext::new(config, Arc::new(EventStore::new())))
    }

    /// Creates a sync server with an existing store.
    pub fn with_store(config: ServerConfig, store: Arc<EventStore>) -> Self {
        Self::from_context(HandlerContext::new(config, store))
    }

    /// Creates a sync server whose token expiry reads `clock`.
    pub fn with_clock(config: ServerConfig, clock: Arc<dyn Clock>) -> Self {
        Self::from_context(HandlerContext::with_clock(
            config,
            Arc::new(EventStore::new()),
            clock,
        ))
    }

    fn from_context(context: HandlerContext) -> Self {
        let context = Arc::new(context);
        let handler = RequestHandler::new(Arc::clone(&context));
        Self { handler, context }
    }

    /// Handles a handshake request.
    pub fn handle_handshake(
        &self,
        request: HandshakeRequest,
    ) -> Result<HandshakeResponse, ErrorResponse> {
        self.handler
            .handle_handshake(request)
            .map_err(|e| reject("handshake", &e))
    }

    /// Handles a pull request.
    pub fn handle_pull(&self, request: PullRequest) -> Result<PullResponse, ErrorResponse> {
        self.handler
            .handle_pull(request)
            .map_err(|e| reject("pull", &e))
    }

    /// Handles a push request.
    pub fn handle_push(&self, request: PushRequest) -> Result<PushResponse, ErrorResponse> {
        self.handler
            .handle_push(request)
            .map_err(|e| reject("push", &e))
    }

    /// Dispatches a CBOR request body by path and returns the CBOR reply.
    ///
    /// Refusals are encoded in the reply body; only bodies that cannot be
    /// produced at all surface as `Err`.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply cannot be encoded.
    pub fn route(&self, path: &str, body: &[u8]) -> ServerResult<Vec<u8>> {
        let encoded = match path {
            endpoints::HANDSHAKE => Self::dispatch(body, |r| self.handle_handshake(r)),
            endpoints::PUSH => Self::dispatch(body, |r| self.handle_push(r)),
            endpoints::PULL => Self::dispatch(body, |r| self.handle_pull(r)),
            other => Reply::<()>::Rejected(ServerError::NotFound(other.to_string()).to_response())
                .encode(),
        };
        encoded.map_err(|e| ServerError::Internal(e.to_string()))
    }

    fn dispatch<Req, Res>(
        body: &[u8],
        handle: impl FnOnce(Req) -> Result<Res, ErrorResponse>,
    ) -> weapon_sync_protocol::ProtocolResult<Vec<u8>>
    where
        Req: Wire,
        Res: serde::Serialize + serde::de::DeserializeOwned,
    {
        let reply: Reply<Res> = match Req::decode(body) {
            Ok(request) => handle(request).into(),
            Err(e) => Reply::Rejected(ServerError::InvalidRequest(e.to_string()).to_response()),
        };
        reply.encode()
    }

    /// Issues a token for `user_id` on `device_id`, when authentication is
    /// enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication is disabled or the key is unusable.
    pub fn issue_token(&self, user_id: &str, device_id: DeviceId) -> ServerResult<Vec<u8>> {
        self.context
            .validator()
            .ok_or_else(|| ServerError::InvalidRequest("authentication is disabled".into()))?
            .create_token(user_id, device_id)
    }

    /// Number of events stored for `user_id`.
    pub fn event_count(&self, user_id: &str) -> u64 {
        self.context.store.count(user_id)
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<EventStore> {
        &self.context.store
    }
}

fn reject(endpoint: &str, error: &ServerError) -> ErrorResponse {
    if error.is_server_error() {
        tracing::error!(endpoint, %error, "request failed");
    } else {
        tracing::info!(endpoint, %error, "request rejected");
    }
    error.to_response()
}

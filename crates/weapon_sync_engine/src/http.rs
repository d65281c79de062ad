//! HTTP transport implementation.
//!
//! The HTTP client itself is abstracted behind [`HttpClient`], so the engine
//! carries no network stack of its own. Bodies are CBOR [`Reply`] envelopes.

use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use weapon_sync_protocol::{
    endpoints, HandshakeRequest, HandshakeResponse, PullRequest, PullResponse, PushRequest,
    PushResponse, Reply, Wire,
};

/// Why a request never produced a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// Connection refused, DNS failure, reset.
    Unreachable(String),
    /// No response within the timeout.
    TimedOut,
}

impl From<TransportFailure> for SyncError {
    fn from(failure: TransportFailure) -> Self {
        match failure {
            TransportFailure::Unreachable(message) => SyncError::Connectivity(message),
            TransportFailure::TimedOut => SyncError::Timeout,
        }
    }
}

/// HTTP client abstraction.
///
/// Implement this over reqwest, ureq, hyper or anything else that can POST a
/// byte body.
pub trait HttpClient: Send + Sync {
    /// Sends a POST request and returns the response body.
    fn post(&self, url: &str, body: Vec<u8>, timeout: Duration)
        -> Result<Vec<u8>, TransportFailure>;

    /// Checks if the client is healthy.
    fn is_healthy(&self) -> bool;
}

/// HTTP-based sync transport.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL of the backend (e.g., "https://sync.example.com").
    base_url: String,
    client: C,
    timeout: RwLock<Duration>,
    /// Cleared only by `close`.
    open: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport with a 30 second timeout.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            timeout: RwLock::new(Duration::from_secs(30)),
            open: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        *self.timeout.get_mut() = timeout;
        self
    }

    /// Current per-request timeout.
    pub fn timeout(&self) -> Duration {
        *self.timeout.read()
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last transport error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns the client.
    pub fn client(&self) -> &C {
        &self.client
    }

    fn post_cbor<Req, Res>(&self, endpoint: &str, request: &Req) -> SyncResult<Res>
    where
        Req: Wire,
        Res: serde::Serialize + serde::de::DeserializeOwned,
    {
        if !self.is_connected() {
            return Err(SyncError::connectivity(format!(
                "{} is not reachable",
                self.base_url
            )));
        }

        let body = request.encode()?;
        let url = format!("{}{}", self.base_url, endpoint);
        let response_body = self.client.post(&url, body, self.timeout()).map_err(|failure| {
            let err = SyncError::from(failure);
            *self.last_error.write() = Some(err.to_string());
            err
        })?;
        *self.last_error.write() = None;

        match Reply::<Res>::decode(&response_body)? {
            Reply::Ok(response) => Ok(response),
            Reply::Rejected(rejection) => Err(SyncError::RemoteRejection {
                code: rejection.code,
                message: rejection.message,
            }),
        }
    }
}

impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    fn handshake(&self, request: &HandshakeRequest) -> SyncResult<HandshakeResponse> {
        self.post_cbor(endpoints::HANDSHAKE, request)
    }

    fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        self.post_cbor(endpoints::PULL, request)
    }

    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.post_cbor(endpoints::PUSH, request)
    }

    fn is_connected(&self) -> bool {
        self.open.load(Ordering::SeqCst) && self.client.is_healthy()
    }

    fn close(&self) -> SyncResult<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_timeout(&self, timeout: Duration) {
        *self.timeout.write() = timeout;
    }
}

/// Servers that can answer loopback requests in-process.
pub trait LoopbackServer {
    /// Handles a POST request and returns the response body.
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String>;
}

/// An HTTP client that routes requests directly to an in-process server.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
    online: AtomicBool,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a client connected to `server`.
    pub fn new(server: S) -> Self {
        Self {
            server,
            online: AtomicBool::new(true),
        }
    }

    /// Simulates losing or regaining the network.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        _timeout: Duration,
    ) -> Result<Vec<u8>, TransportFailure> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(TransportFailure::Unreachable(format!(
                "{url}: network is offline"
            )));
        }
        self.server
            .handle_post(route_path(url), &body)
            .map_err(TransportFailure::Unreachable)
    }

    fn is_healthy(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Path of `url` from its `/sync/` segment on, with scheme and authority
/// stripped first so a host named `sync` is not mistaken for the route.
fn route_path(url: &str) -> &str {
    let path = match url.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("/", |i| &rest[i..]),
        None => url,
    };
    path.find("/sync/").map_or(path, |i| &path[i..])
}

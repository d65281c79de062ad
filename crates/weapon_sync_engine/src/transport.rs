//! Transport layer abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use weapon_sync_protocol::{
    HandshakeRequest, HandshakeResponse, PullRequest, PullResponse, PushRequest, PushResponse,
    RejectionCode,
};

/// A sync transport carries requests to one remote backend.
///
/// Implementations must not retry on their own; a failed request surfaces as
/// an error and the cycle is abandoned.
pub trait SyncTransport: Send + Sync {
    /// Opens a cycle and learns the remote's clock.
    fn handshake(&self, request: &HandshakeRequest) -> SyncResult<HandshakeResponse>;

    /// Pulls a page of remote events.
    fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse>;

    /// Pushes local events.
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse>;

    /// Checks if the transport can reach its remote.
    fn is_connected(&self) -> bool;

    /// Closes the transport connection.
    fn close(&self) -> SyncResult<()>;

    /// Sets the per-request timeout; transports without one ignore it.
    fn set_timeout(&self, _timeout: Duration) {}
}

impl<T: SyncTransport + ?Sized> SyncTransport for Arc<T> {
    fn handshake(&self, request: &HandshakeRequest) -> SyncResult<HandshakeResponse> {
        (**self).handshake(request)
    }

    fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        (**self).pull(request)
    }

    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        (**self).push(request)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn close(&self) -> SyncResult<()> {
        (**self).close()
    }

    fn set_timeout(&self, timeout: Duration) {
        (**self).set_timeout(timeout);
    }
}

/// A mock transport with canned responses.
#[derive(Debug)]
pub struct MockTransport {
    connected: AtomicBool,
    handshake_response: Mutex<Option<HandshakeResponse>>,
    pull_response: Mutex<Option<PullResponse>>,
    push_response: Mutex<Option<PushResponse>>,
    pushed: Mutex<Vec<PushRequest>>,
    timeout: Mutex<Option<Duration>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Creates a connected mock transport with no responses set.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            handshake_response: Mutex::new(None),
            pull_response: Mutex::new(None),
            push_response: Mutex::new(None),
            pushed: Mutex::new(Vec::new()),
            timeout: Mutex::new(None),
        }
    }

    /// Sets the handshake response.
    pub fn set_handshake_response(&self, response: HandshakeResponse) {
        *self.handshake_response.lock() = Some(response);
    }

    /// Sets the pull response.
    pub fn set_pull_response(&self, response: PullResponse) {
        *self.pull_response.lock() = Some(response);
    }

    /// Sets the push response.
    pub fn set_push_response(&self, response: PushResponse) {
        *self.push_response.lock() = Some(response);
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Push requests received so far.
    pub fn pushed(&self) -> Vec<PushRequest> {
        self.pushed.lock().clone()
    }

    /// Timeout last set through [`SyncTransport::set_timeout`].
    pub fn timeout(&self) -> Option<Duration> {
        *self.timeout.lock()
    }

    fn ensure_connected(&self) -> SyncResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(SyncError::connectivity("mock transport disconnected"))
        }
    }
}

impl SyncTransport for MockTransport {
    fn handshake(&self, _request: &HandshakeRequest) -> SyncResult<HandshakeResponse> {
        self.ensure_connected()?;
        self.handshake_response
            .lock()
            .clone()
            .ok_or_else(|| SyncError::protocol("no mock handshake response set"))
    }

    fn pull(&self, _request: &PullRequest) -> SyncResult<PullResponse> {
        self.ensure_connected()?;
        self.pull_response
            .lock()
            .clone()
            .ok_or_else(|| SyncError::protocol("no mock pull response set"))
    }

    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.ensure_connected()?;
        self.pushed.lock().push(request.clone());
        self.push_response
            .lock()
            .clone()
            .ok_or_else(|| SyncError::protocol("no mock push response set"))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> SyncResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_timeout(&self, timeout: Duration) {
        *self.timeout.lock() = Some(timeout);
    }
}

/// Request kinds a [`FaultyTransport`] can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportOp {
    /// Handshake.
    Handshake,
    /// Push.
    Push,
    /// Pull.
    Pull,
}

/// How an injected failure presents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The remote cannot be reached.
    Unreachable,
    /// The remote refuses with this code.
    Reject(RejectionCode),
}

impl Fault {
    fn into_error(self, op: TransportOp) -> SyncError {
        match self {
            Fault::Unreachable => SyncError::connectivity(format!("injected fault on {op:?}")),
            Fault::Reject(code) => SyncError::RemoteRejection {
                code,
                message: format!("injected rejection on {op:?}"),
            },
        }
    }
}

/// Wraps a transport and fails selected requests.
///
/// Faults are armed per operation and fire once; the request after a fired
/// fault goes through to the inner transport.
pub struct FaultyTransport<T> {
    inner: T,
    faults: Mutex<HashMap<TransportOp, Fault>>,
}

impl<T: SyncTransport> FaultyTransport<T> {
    /// Wraps `inner` with no faults armed.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            faults: Mutex::new(HashMap::new()),
        }
    }

    /// Arms a one-shot fault for `op`.
    pub fn fail_next(&self, op: TransportOp, fault: Fault) {
        self.faults.lock().insert(op, fault);
    }

    /// Disarms all faults.
    pub fn clear(&self) {
        self.faults.lock().clear();
    }

    /// Returns the wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn check(&self, op: TransportOp) -> SyncResult<()> {
        match self.faults.lock().remove(&op) {
            Some(fault) => Err(fault.into_error(op)),
            None => Ok(()),
        }
    }
}

impl<T: SyncTransport> SyncTransport for FaultyTransport<T> {
    fn handshake(&self, request: &HandshakeRequest) -> SyncResult<HandshakeResponse> {
        self.check(TransportOp::Handshake)?;
        self.inner.handshake(request)
    }

    fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        self.check(TransportOp::Pull)?;
        self.inner.pull(request)
    }

    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.check(TransportOp::Push)?;
        self.inner.push(request)
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn close(&self) -> SyncResult<()> {
        self.inner.close()
    }

    fn set_timeout(&self, timeout: Duration) {
        self.inner.set_timeout(timeout);
    }
}

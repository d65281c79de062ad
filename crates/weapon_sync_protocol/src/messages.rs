//! Protocol messages for sync.

use crate::codec::Wire;
use serde::{Deserialize, Serialize};
use std::fmt;
use weapon_core::{DeviceId, Event, VectorClock};

/// Current protocol version.
pub const PROTOCOL_VERSION: u16 = 1;

/// Request paths, relative to a backend's base URL.
pub mod endpoints {
    /// Handshake.
    pub const HANDSHAKE: &str = "/sync/handshake";
    /// Push local events.
    pub const PUSH: &str = "/sync/push";
    /// Pull remote events.
    pub const PULL: &str = "/sync/pull";
}

/// Who is calling. Sent with every request; the remote scopes its event set
/// by `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Authenticated principal.
    pub user_id: String,
    /// Calling replica.
    pub device_id: DeviceId,
    /// Signed token, when the remote requires one.
    pub auth_token: Option<Vec<u8>>,
}

impl Credentials {
    /// Credentials without a token.
    pub fn new(user_id: impl Into<String>, device_id: DeviceId) -> Self {
        Self {
            user_id: user_id.into(),
            device_id,
            auth_token: None,
        }
    }

    /// Attaches a token.
    #[must_use]
    pub fn with_token(mut self, token: Vec<u8>) -> Self {
        self.auth_token = Some(token);
        self
    }
}

/// Opens a sync cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    /// Caller identity.
    pub credentials: Credentials,
    /// Caller's protocol version.
    pub protocol_version: u16,
}

impl HandshakeRequest {
    /// Creates a handshake at the current protocol version.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            protocol_version: PROTOCOL_VERSION,
        }
    }
}

/// What the remote holds for the caller's user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeResponse {
    /// Remote protocol version.
    pub protocol_version: u16,
    /// Per-device counts of stored events.
    pub remote_clock: VectorClock,
    /// Total stored events.
    pub event_count: u64,
}

/// Uploads events. Resubmitting a stored event is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Caller identity.
    pub credentials: Credentials,
    /// Events grouped by device, each group in seq order.
    pub events: Vec<Event>,
}

/// Acknowledges a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    /// Events newly stored.
    pub stored: u32,
    /// Events already present.
    pub duplicates: u32,
    /// Remote clock after the push.
    pub remote_clock: VectorClock,
    /// Total stored events after the push.
    pub event_count: u64,
}

/// Asks for events the caller does not have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Caller identity.
    pub credentials: Credentials,
    /// Events covered by this clock are skipped.
    pub since: VectorClock,
    /// Maximum events to return.
    pub limit: u32,
}

/// A page of events, ordered by `(device, seq)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullResponse {
    /// Events not covered by the request clock.
    pub events: Vec<Event>,
    /// Whether more events remain beyond this page.
    pub has_more: bool,
    /// Remote clock when the page was cut.
    pub remote_clock: VectorClock,
    /// Total stored events when the page was cut.
    pub event_count: u64,
}

/// Why the remote refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectionCode {
    /// Missing or invalid credentials.
    Unauthorized,
    /// Token was valid once but has expired.
    TokenExpired,
    /// Malformed request or events.
    BadRequest,
    /// Protocol versions are incompatible.
    UnsupportedVersion,
    /// Request exceeds a server limit.
    TooLarge,
    /// Remote is overloaded; try later.
    Unavailable,
    /// Remote failed internally.
    Internal,
}

impl RejectionCode {
    /// Returns true if repeating the same request later may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Unavailable | Self::Internal)
    }

    /// Short name for error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::TokenExpired => "token_expired",
            Self::BadRequest => "bad_request",
            Self::UnsupportedVersion => "unsupported_version",
            Self::TooLarge => "too_large",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for RejectionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Refusal body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable reason.
    pub code: RejectionCode,
    /// Human-readable detail.
    pub message: String,
}

impl ErrorResponse {
    /// Creates a refusal.
    pub fn new(code: RejectionCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Envelope for every response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply<T> {
    /// The request succeeded.
    Ok(T),
    /// The remote refused the request.
    Rejected(ErrorResponse),
}

impl<T> Reply<T> {
    /// Converts into a `Result`.
    pub fn into_result(self) -> Result<T, ErrorResponse> {
        match self {
            Self::Ok(value) => Ok(value),
            Self::Rejected(err) => Err(err),
        }
    }
}

impl<T> From<Result<T, ErrorResponse>> for Reply<T> {
    fn from(result: Result<T, ErrorResponse>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(err) => Self::Rejected(err),
        }
    }
}

impl Wire for HandshakeRequest {}
impl Wire for HandshakeResponse {}
impl Wire for PushRequest {}
impl Wire for PushResponse {}
impl Wire for PullRequest {}
impl Wire for PullResponse {}
impl Wire for ErrorResponse {}
impl<T: Serialize + serde::de::DeserializeOwned> Wire for Reply<T> {}

//! Configuration for the sync engine.

use std::time::Duration;
use weapon_core::DeviceId;
use weapon_sync_protocol::{Credentials, PROTOCOL_VERSION};

/// Configuration for one backend's sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Principal whose events are synced.
    pub user_id: String,
    /// This replica.
    pub device_id: DeviceId,
    /// Token presented to the remote, if it requires one.
    pub auth_token: Option<Vec<u8>>,
    /// Protocol version.
    pub protocol_version: u16,
    /// Maximum events per pull request.
    pub pull_batch_size: u32,
    /// Maximum events per push request.
    pub push_batch_size: u32,
    /// Per-request timeout handed to the transport.
    pub timeout: Duration,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(user_id: impl Into<String>, device_id: DeviceId) -> Self {
        Self {
            user_id: user_id.into(),
            device_id,
            auth_token: None,
            protocol_version: PROTOCOL_VERSION,
            pull_batch_size: 200,
            push_batch_size: 200,
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the auth token.
    #[must_use]
    pub fn with_auth_token(mut self, token: Vec<u8>) -> Self {
        self.auth_token = Some(token);
        self
    }

    /// Sets the pull batch size.
    #[must_use]
    pub fn with_pull_batch_size(mut self, size: u32) -> Self {
        self.pull_batch_size = size.max(1);
        self
    }

    /// Sets the push batch size.
    #[must_use]
    pub fn with_push_batch_size(mut self, size: u32) -> Self {
        self.push_batch_size = size.max(1);
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Credentials sent with every request.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            user_id: self.user_id.clone(),
            device_id: self.device_id,
            auth_token: self.auth_token.clone(),
        }
    }
}

//! Authentication support for the sync server.
//!
//! Tokens are HMAC-SHA256 signed and carry their issue time for expiration
//! checking.
//!
//! ## Token Format
//!
//! - 16 bytes: device id
//! - 8 bytes: issue time (Unix millis, big-endian)
//! - 32 bytes: HMAC-SHA256 over the above plus the UTF-8 user id
//!
//! Total: 56 bytes. The user id is not embedded; it must be presented
//! alongside the token and is bound by the signature.

use crate::error::{ServerError, ServerResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use weapon_core::{Clock, DeviceId, SystemClock, Timestamp};

type HmacSha256 = Hmac<Sha256>;

/// Length of an encoded token.
pub const TOKEN_LEN: usize = 56;

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: Vec<u8>,
    /// Token expiration duration.
    pub token_expiry: Duration,
}

impl AuthConfig {
    /// Creates a new auth configuration with a 24 hour expiry.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            token_expiry: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Sets the token expiration duration.
    #[must_use]
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

/// Issues and checks tokens.
#[derive(Clone)]
pub struct TokenValidator {
    config: AuthConfig,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("token_expiry", &self.config.token_expiry)
            .finish_non_exhaustive()
    }
}

impl TokenValidator {
    /// Creates a validator on the system clock.
    pub fn new(config: AuthConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a validator on the given clock.
    pub fn with_clock(config: AuthConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    /// Creates a token binding `user_id` and `device_id`, issued now.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Internal`] if the key is unusable.
    pub fn create_token(&self, user_id: &str, device_id: DeviceId) -> ServerResult<Vec<u8>> {
        let issued = self.clock.now().as_millis();

        let mut token = Vec::with_capacity(TOKEN_LEN);
        token.extend_from_slice(device_id.as_bytes());
        token.extend_from_slice(&issued.to_be_bytes());

        let mac = self.mac(&token, user_id)?;
        token.extend_from_slice(&mac.finalize().into_bytes());
        Ok(token)
    }

    /// Validates a token presented by `user_id` on `device_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::AuthenticationFailed`] for a malformed, forged
    /// or mismatched token, and [`ServerError::TokenExpired`] for a genuine
    /// token past its lifetime.
    pub fn validate_token(
        &self,
        token: &[u8],
        user_id: &str,
        device_id: &DeviceId,
    ) -> ServerResult<()> {
        if token.len() != TOKEN_LEN {
            return Err(ServerError::AuthenticationFailed(
                "invalid token length".into(),
            ));
        }
        let (body, signature) = token.split_at(24);
        let (device_bytes, issued_bytes) = body.split_at(16);

        if device_bytes != device_id.as_bytes() {
            return Err(ServerError::AuthenticationFailed(
                "device id mismatch".into(),
            ));
        }

        self.mac(body, user_id)?
            .verify_slice(signature)
            .map_err(|_| ServerError::AuthenticationFailed("invalid signature".into()))?;

        let mut raw = [0u8; 8];
        raw.copy_from_slice(issued_bytes);
        let issued = Timestamp::from_millis(u64::from_be_bytes(raw));
        let expiry_ms = u64::try_from(self.config.token_expiry.as_millis()).unwrap_or(u64::MAX);
        if self.clock.now() > issued.plus_millis(expiry_ms) {
            return Err(ServerError::TokenExpired);
        }

        Ok(())
    }

    fn mac(&self, body: &[u8], user_id: &str) -> ServerResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.config.secret)
            .map_err(|e| ServerError::Internal(format!("hmac key: {e}")))?;
        mac.update(body);
        mac.update(user_id.as_bytes());
        Ok(mac)
    }
}

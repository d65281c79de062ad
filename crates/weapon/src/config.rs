//! Facade configuration.

use std::path::PathBuf;
use weapon_core::{DeviceId, LogConfig};
use weapon_deck::{LeechPolicy, SchedulerConfig};

/// How to open a [`Weapon`](crate::Weapon).
#[derive(Debug, Clone)]
pub struct WeaponConfig {
    /// Principal whose events this replica records.
    pub user_id: String,
    /// Data directory; `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// Device id for an in-memory replica. A data directory always uses the
    /// id stored in it.
    pub device_id: Option<DeviceId>,
    /// Event log options.
    pub log: LogConfig,
    /// Scheduler parameters.
    pub scheduler: SchedulerConfig,
    /// Leech detection.
    pub leech_policy: LeechPolicy,
}

impl WeaponConfig {
    /// In-memory configuration for `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            data_dir: None,
            device_id: None,
            log: LogConfig::default(),
            scheduler: SchedulerConfig::default(),
            leech_policy: LeechPolicy::default(),
        }
    }

    /// Persists to `path`.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Fixes the device id of an in-memory replica.
    #[must_use]
    pub fn with_device_id(mut self, device_id: DeviceId) -> Self {
        self.device_id = Some(device_id);
        self
    }

    /// Sets event log options.
    #[must_use]
    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Sets scheduler parameters.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Sets the leech policy.
    #[must_use]
    pub fn with_leech_policy(mut self, policy: LeechPolicy) -> Self {
        self.leech_policy = policy;
        self
    }
}

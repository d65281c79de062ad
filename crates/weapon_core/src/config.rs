//! Event log configuration.

/// Configuration for opening an event log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether to create the data directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether every append waits for the bytes to reach durable media.
    pub sync_on_append: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_append: true,
        }
    }
}

impl LogConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the data directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync storage on every append.
    #[must_use]
    pub const fn sync_on_append(mut self, value: bool) -> Self {
        self.sync_on_append = value;
        self
    }
}

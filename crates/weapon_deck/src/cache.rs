//! Version-stamped memoization of derived views.

use std::sync::Arc;

/// A value computed for one log version.
#[derive(Debug)]
pub struct Memo<T> {
    slot: Option<(u64, Arc<T>)>,
    computed: u64,
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self {
            slot: None,
            computed: 0,
        }
    }
}

impl<T> Memo<T> {
    /// Returns the value for `version`, computing it only if the stored one
    /// belongs to a different version.
    pub fn get_or_compute(&mut self, version: u64, compute: impl FnOnce() -> T) -> Arc<T> {
        match &self.slot {
            Some((v, value)) if *v == version => Arc::clone(value),
            _ => {
                let value = Arc::new(compute());
                self.slot = Some((version, Arc::clone(&value)));
                self.computed += 1;
                value
            }
        }
    }

    /// Version of the stored value, if any.
    #[must_use]
    pub fn version(&self) -> Option<u64> {
        self.slot.as_ref().map(|(v, _)| *v)
    }

    /// How many times the value has been computed.
    #[must_use]
    pub const fn computed(&self) -> u64 {
        self.computed
    }

    /// Drops the stored value.
    pub fn clear(&mut self) {
        self.slot = None;
    }
}

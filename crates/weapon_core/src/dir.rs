//! Data directory management.
//!
//! One engine instance owns one directory:
//!
//! ```text
//! <data_dir>/
//! ├─ LOCK          # advisory lock, held while the engine is open
//! ├─ DEVICE        # this replica's device id
//! └─ events.log    # the event log
//! ```

use crate::error::{LogError, LogResult};
use crate::types::DeviceId;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const DEVICE_FILE: &str = "DEVICE";
const DEVICE_TEMP: &str = "DEVICE.tmp";
const LOG_FILE: &str = "events.log";

/// An exclusively locked data directory.
///
/// The lock is released when the value is dropped.
#[derive(Debug)]
pub struct DataDir {
    path: PathBuf,
    device_id: DeviceId,
    _lock_file: File,
}

impl DataDir {
    /// Opens `path`, taking the directory lock and loading (or minting) the
    /// device id.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the directory is missing and `create_if_missing` is false
    /// - another process holds the lock ([`LogError::DirectoryLocked`])
    /// - the DEVICE file is unreadable
    pub fn open(path: &Path, create_if_missing: bool) -> LogResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(LogError::invalid_directory(format!(
                    "data directory does not exist: {}",
                    path.display()
                )));
            }
        }
        if !path.is_dir() {
            return Err(LogError::invalid_directory(format!(
                "not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(LogError::DirectoryLocked);
        }

        let device_id = load_or_create_device_id(path)?;
        tracing::debug!(path = %path.display(), %device_id, "opened data directory");

        Ok(Self {
            path: path.to_path_buf(),
            device_id,
            _lock_file: lock_file,
        })
    }

    /// Root path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// This replica's device id.
    #[must_use]
    pub const fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Path of the event log file.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }
}

fn load_or_create_device_id(dir: &Path) -> LogResult<DeviceId> {
    let device_path = dir.join(DEVICE_FILE);
    if device_path.exists() {
        let text = fs::read_to_string(&device_path)?;
        return text.parse().map_err(|e| {
            LogError::invalid_directory(format!("unreadable DEVICE file: {e}"))
        });
    }

    let device_id = DeviceId::generate();
    let temp_path = dir.join(DEVICE_TEMP);
    {
        let mut file = File::create(&temp_path)?;
        writeln!(file, "{device_id}")?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, &device_path)?;
    tracing::info!(%device_id, "minted new device id");
    Ok(device_id)
}

/// Reads the device id of a directory without locking it.
///
/// Inspection tools use this on a directory another process may hold.
///
/// # Errors
///
/// Returns an error if the DEVICE file is missing or unreadable.
pub fn peek_device_id(dir: &Path) -> LogResult<DeviceId> {
    let text = fs::read_to_string(dir.join(DEVICE_FILE))?;
    text.parse()
        .map_err(|e| LogError::invalid_directory(format!("unreadable DEVICE file: {e}")))
}

/// Path of the event log file inside `dir`.
#[must_use]
pub fn log_file_path(dir: &Path) -> PathBuf {
    dir.join(LOG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn device_id_is_stable_across_opens() {
        let dir = tempdir().unwrap();
        let first = DataDir::open(dir.path(), true).unwrap().device_id();
        let second = DataDir::open(dir.path(), true).unwrap().device_id();
        assert_eq!(first, second);
        assert_eq!(peek_device_id(dir.path()).unwrap(), first);
    }

    #[test]
    fn second_open_is_locked_out() {
        let dir = tempdir().unwrap();
        let _held = DataDir::open(dir.path(), true).unwrap();
        assert!(matches!(
            DataDir::open(dir.path(), true),
            Err(LogError::DirectoryLocked)
        ));
    }

    #[test]
    fn missing_dir_without_create_fails() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            DataDir::open(&missing, false),
            Err(LogError::InvalidDirectory { .. })
        ));
    }

    #[test]
    fn log_path_is_inside_dir() {
        let dir = tempdir().unwrap();
        let data = DataDir::open(dir.path(), true).unwrap();
        assert_eq!(data.log_path(), log_file_path(dir.path()));
    }
}

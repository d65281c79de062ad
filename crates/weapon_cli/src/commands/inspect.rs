//! Inspect command implementation.

use super::{load_log, CliError};
use serde::Serialize;
use std::path::Path;
use weapon_core::{peek_device_id, EventLog, Timestamp};

/// Data directory summary.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Directory path.
    pub path: String,
    /// Device id of the directory's owner, if readable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Log file size in bytes.
    pub size_bytes: u64,
    /// Committed events.
    pub event_count: u64,
    /// Checkpoint records, including superseded ones.
    pub checkpoint_records: u64,
    /// Events per device.
    pub devices: Vec<DeviceCount>,
    /// Sync state per backend.
    pub backends: Vec<BackendInfo>,
}

/// Events contributed by one device.
#[derive(Debug, Serialize)]
pub struct DeviceCount {
    /// Device id.
    pub device_id: String,
    /// Events held from it.
    pub events: u64,
}

/// Persisted sync state of one backend.
#[derive(Debug, Serialize)]
pub struct BackendInfo {
    /// Backend name.
    pub name: String,
    /// Remote event count at the last commit.
    pub remote_event_count: u64,
    /// Local events the backend has not acknowledged.
    pub unsynced_events: usize,
    /// Oldest of those, in epoch ms.
    pub earliest_unsynced_ms: Option<u64>,
    /// Last cycle start, in epoch ms.
    pub last_sync_started_ms: Option<u64>,
    /// Last cycle end, in epoch ms.
    pub last_sync_finished_ms: Option<u64>,
    /// Last cycle error.
    pub last_sync_error: Option<String>,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), CliError> {
    let log = load_log(path)?;
    let result = inspect(path, &log)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

/// Summarizes `log`, read from `path`.
pub fn inspect(path: &Path, log: &EventLog) -> Result<InspectResult, CliError> {
    let stats = log.stats()?;
    let devices = log
        .device_clock()
        .iter()
        .map(|(device, count)| DeviceCount {
            device_id: device.to_string(),
            events: *count,
        })
        .collect();
    let backends = log
        .checkpoints()
        .map(|checkpoint| {
            let unsynced = log.not_covered_by(&checkpoint.acknowledged);
            BackendInfo {
                name: checkpoint.backend.clone(),
                remote_event_count: checkpoint.remote_event_count,
                unsynced_events: unsynced.len(),
                earliest_unsynced_ms: log
                    .earliest_not_covered_by(&checkpoint.acknowledged)
                    .map(|event| event.timestamp.as_millis()),
                last_sync_started_ms: checkpoint.last_sync_started.map(Timestamp::as_millis),
                last_sync_finished_ms: checkpoint.last_sync_finished.map(Timestamp::as_millis),
                last_sync_error: checkpoint.last_sync_error.clone(),
            }
        })
        .collect();

    Ok(InspectResult {
        path: path.display().to_string(),
        device_id: peek_device_id(path).ok().map(|d| d.to_string()),
        size_bytes: stats.size_bytes,
        event_count: stats.events,
        checkpoint_records: stats.checkpoint_records,
        devices,
        backends,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("Data directory: {}", result.path);
    if let Some(device) = &result.device_id {
        println!("Device:         {device}");
    }
    println!("Log size:       {} bytes", result.size_bytes);
    println!("Events:         {}", result.event_count);
    println!("Checkpoints:    {}", result.checkpoint_records);

    println!();
    println!("Devices:");
    for device in &result.devices {
        println!("  {}  {} events", device.device_id, device.events);
    }

    println!();
    println!("Backends:");
    if result.backends.is_empty() {
        println!("  (never synced)");
    }
    for backend in &result.backends {
        println!("  {}", backend.name);
        println!("    remote events:   {}", backend.remote_event_count);
        println!("    unsynced events: {}", backend.unsynced_events);
        if let Some(ms) = backend.earliest_unsynced_ms {
            println!("    earliest unsynced: {ms}");
        }
        if let Some(ms) = backend.last_sync_started_ms {
            println!("    last started:    {ms}");
        }
        if let Some(ms) = backend.last_sync_finished_ms {
            println!("    last finished:   {ms}");
        }
        if let Some(error) = &backend.last_sync_error {
            println!("    last error:      {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testdir;
    use tempfile::TempDir;
    use weapon_core::Rating;

    #[test]
    fn reports_devices_and_backends() {
        let dir = TempDir::new().unwrap();
        let device = testdir::write(dir.path(), &[Rating::Good, Rating::Good, Rating::Again]);

        let log = load_log(dir.path()).unwrap();
        let result = inspect(dir.path(), &log).unwrap();

        assert_eq!(result.event_count, 3);
        assert_eq!(result.device_id, Some(device.to_string()));
        assert_eq!(result.devices.len(), 1);
        assert_eq!(result.backends.len(), 1);
        assert_eq!(result.backends[0].unsynced_events, 3);
        assert_eq!(result.backends[0].earliest_unsynced_ms, Some(1_000));
        assert_eq!(result.backends[0].remote_event_count, 1);
    }
}

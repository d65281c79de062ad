//! Dump-log command implementation.

use super::{load_log, CliError};
use std::path::Path;
use weapon_core::{DeviceId, Event, EventLog};

/// Runs the dump-log command.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    device: Option<&str>,
    format: &str,
) -> Result<(), CliError> {
    let device = device
        .map(|text| {
            text.parse::<DeviceId>()
                .map_err(|_| CliError::InvalidDevice(text.to_string()))
        })
        .transpose()?;
    let log = load_log(path)?;
    let events = select(&log, limit, device.as_ref())?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&events)?),
        _ => {
            for event in &events {
                println!("{}", format_event(event));
            }
            println!("{} events", events.len());
        }
    }
    Ok(())
}

/// Events in canonical order, optionally of one device, up to `limit`.
pub fn select<'a>(
    log: &'a EventLog,
    limit: Option<usize>,
    device: Option<&DeviceId>,
) -> Result<Vec<&'a Event>, CliError> {
    Ok(log
        .iterate(None)?
        .filter(|event| device.map_or(true, |d| event.id.device == *d))
        .take(limit.unwrap_or(usize::MAX))
        .collect())
}

/// One line per event: time, id, kind, keys.
pub fn format_event(event: &Event) -> String {
    let keys: Vec<String> = event.payload.keys().iter().map(|k| k.to_string()).collect();
    format!(
        "{:>15}  {}  {:<9} {}",
        event.timestamp.as_millis(),
        event.id,
        event.payload.kind(),
        keys.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testdir;
    use tempfile::TempDir;
    use weapon_core::Rating;

    #[test]
    fn select_filters_and_limits() {
        let dir = TempDir::new().unwrap();
        let device = testdir::write(dir.path(), &[Rating::Good, Rating::Again, Rating::Good]);
        let log = load_log(dir.path()).unwrap();

        assert_eq!(select(&log, None, None).unwrap().len(), 3);
        assert_eq!(select(&log, Some(2), Some(&device)).unwrap().len(), 2);
        let other = DeviceId::from_bytes([0xAB; 16]);
        assert!(select(&log, None, Some(&other)).unwrap().is_empty());
    }

    #[test]
    fn text_line_names_kind_and_key() {
        let dir = TempDir::new().unwrap();
        testdir::write(dir.path(), &[Rating::Again]);
        let log = load_log(dir.path()).unwrap();
        let events = select(&log, None, None).unwrap();

        let line = format_event(events[0]);
        assert!(line.contains("review"));
        assert!(line.contains("casa"));
    }
}

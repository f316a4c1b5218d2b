//! Audit trail.
//!
//! Append-only record of connection and login events, one line per event:
//!
//! ```text
//! 2026-03-01 12:00:00,123 - CONNECTION FROM 192.0.2.10:40000
//! ```
//!
//! The audit trail is separate from diagnostic logging and is never consulted
//! for decisions. Sinks are shared by every session, so `record` takes
//! `&self` and implementations serialise appends internally.

use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Local};
use stackgate_core::AuditEvent;
use thiserror::Error;

/// Timestamp layout for audit records.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Audit sink errors.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Writing the record failed.
    #[error("audit write failed: {0}")]
    Io(#[from] io::Error),

    /// A previous writer panicked while holding the sink.
    #[error("audit sink poisoned")]
    Poisoned,
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    /// Append one event.
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Render one audit line (without the trailing newline).
pub fn format_record(timestamp: &DateTime<Local>, event: &AuditEvent) -> String {
    format!("{} - {event}", timestamp.format(TIMESTAMP_FORMAT))
}

/// Audit log appended to a file.
pub struct FileAuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileAuditLog {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self { path, file: Mutex::new(file) })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileAuditLog {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let line = format_record(&Local::now(), event);

        let mut file = self.file.lock().map_err(|_| AuditError::Poisoned)?;
        writeln!(file, "{line}")?;
        file.flush()?;

        Ok(())
    }
}

/// In-memory audit log for tests.
#[derive(Default)]
pub struct MemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far, in order.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Recorded messages without timestamps, in order.
    pub fn messages(&self) -> Vec<String> {
        self.events().iter().map(ToString::to_string).collect()
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.events.lock().map_err(|_| AuditError::Poisoned)?.push(*event);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::SocketAddr;

    use chrono::TimeZone;
    use proptest::prelude::*;

    use super::*;

    fn peer() -> SocketAddr {
        "192.0.2.10:40000".parse().unwrap()
    }

    #[test]
    fn record_format() {
        let timestamp = Local.with_ymd_and_hms(2026, 3, 1, 12, 0, 5).unwrap();
        let line = format_record(&timestamp, &AuditEvent::ConnectionAccepted { peer: peer() });

        assert_eq!(line, "2026-03-01 12:00:05,000 - CONNECTION FROM 192.0.2.10:40000");
    }

    #[test]
    fn file_log_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.log");

        let log = FileAuditLog::open(&path).unwrap();
        log.record(&AuditEvent::ConnectionAccepted { peer: peer() }).unwrap();
        log.record(&AuditEvent::LoginFailed { peer: peer() }).unwrap();
        drop(log);

        // Reopening appends rather than truncating
        let log = FileAuditLog::open(&path).unwrap();
        log.record(&AuditEvent::Disconnected { peer: peer() }).unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with(" - CONNECTION FROM 192.0.2.10:40000"));
        assert!(lines[1].ends_with(" - LOGIN FAILED FOR 192.0.2.10:40000"));
        assert!(lines[2].ends_with(" - DISCONNECTED 192.0.2.10:40000"));
    }

    #[test]
    fn file_log_open_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileAuditLog::open(dir.path().join("missing").join("server.log"));

        assert!(matches!(result, Err(AuditError::Io(_))));
    }

    #[test]
    fn memory_log_keeps_order() {
        let log = MemoryAuditLog::new();
        log.record(&AuditEvent::ConnectionAccepted { peer: peer() }).unwrap();
        log.record(&AuditEvent::LoginSucceeded { peer: peer() }).unwrap();

        assert_eq!(log.messages(), vec![
            "CONNECTION FROM 192.0.2.10:40000".to_string(),
            "LOGIN SUCCESS FOR 192.0.2.10:40000".to_string(),
        ]);
    }

    proptest! {
        /// Every record is one line: a fixed-width timestamp, the separator,
        /// then the event text.
        #[test]
        fn record_is_single_line(
            ip in any::<[u8; 4]>(),
            port in any::<u16>(),
            millis in 0u32..1000,
            kind in 0u8..4,
        ) {
            let peer = SocketAddr::from((ip, port));
            let event = match kind {
                0 => AuditEvent::ConnectionAccepted { peer },
                1 => AuditEvent::LoginSucceeded { peer },
                2 => AuditEvent::LoginFailed { peer },
                _ => AuditEvent::Disconnected { peer },
            };
            let timestamp = Local.with_ymd_and_hms(2026, 3, 1, 12, 0, 5).unwrap()
                + chrono::Duration::milliseconds(i64::from(millis));

            let line = format_record(&timestamp, &event);

            prop_assert!(!line.contains('\n'));
            prop_assert_eq!(&line[23..26], " - ");
            prop_assert_eq!(&line[26..], event.to_string());
            prop_assert!(line.ends_with(&peer.to_string()));
        }
    }
}

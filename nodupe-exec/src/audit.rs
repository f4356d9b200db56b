use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use nodupe_types::{AuditEvent, AuditEventKind};

use crate::error::ExecError;

/// Append-only, durable audit sink with two parallel outputs: a
/// line-oriented text log for humans and a JSON-lines log for tooling. A
/// single writer mutex is implied by `&mut self` on every write method: the
/// mutex is held for the duration of a record's write.
pub struct AuditLog {
    text: File,
    jsonl: File,
    text_path: PathBuf,
    jsonl_path: PathBuf,
}

impl AuditLog {
    pub fn open(text_path: &Path, jsonl_path: &Path) -> Result<Self, ExecError> {
        let text = OpenOptions::new()
            .create(true)
            .append(true)
            .open(text_path)
            .map_err(|e| ExecError::io(text_path.display().to_string(), e))?;
        let jsonl = OpenOptions::new()
            .create(true)
            .append(true)
            .open(jsonl_path)
            .map_err(|e| ExecError::io(jsonl_path.display().to_string(), e))?;

        Ok(AuditLog {
            text,
            jsonl,
            text_path: text_path.to_path_buf(),
            jsonl_path: jsonl_path.to_path_buf(),
        })
    }

    /// Writes one event to both sinks and flushes before returning, so a
    /// crash between this call and the filesystem effect it precedes is
    /// reconcilable from the log alone (write-ahead discipline).
    pub fn record(&mut self, kind: AuditEventKind, payload: serde_json::Value) -> Result<(), ExecError> {
        let timestamp = chrono::Utc::now().to_rfc3339();
        let event = AuditEvent::new(timestamp.clone(), kind, payload.clone());

        writeln!(self.text, "{} {} {}", timestamp, kind.as_str(), payload)
            .map_err(|e| ExecError::io(self.text_path.display().to_string(), e))?;
        self.text
            .flush()
            .map_err(|e| ExecError::io(self.text_path.display().to_string(), e))?;

        let line = serde_json::to_string(&event)?;
        writeln!(self.jsonl, "{line}").map_err(|e| ExecError::io(self.jsonl_path.display().to_string(), e))?;
        self.jsonl
            .flush()
            .map_err(|e| ExecError::io(self.jsonl_path.display().to_string(), e))?;

        log::debug!("audit: {} {}", kind.as_str(), payload);
        Ok(())
    }

    /// Reads back every event from the JSON-lines sink, in file order. Used
    /// on startup to scan for unmatched `*_started` events.
    pub fn read_events(path: &Path) -> Result<Vec<AuditEvent>, ExecError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ExecError::io(path.display().to_string(), e)),
        };

        let mut events = Vec::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(line)?);
        }
        Ok(events)
    }

    /// Startup reconciliation sweep: every `*_started` event with no
    /// matching terminal event later in the log is unmatched and needs
    /// manual reconciliation.
    pub fn unmatched_started_events(events: &[AuditEvent]) -> Vec<&AuditEvent> {
        let mut pending: Vec<&AuditEvent> = Vec::new();
        for event in events {
            if event.event_kind.is_terminal() {
                if let Some(correlation) = event.payload.get("correlation_id").and_then(|v| v.as_str()) {
                    pending.retain(|p| {
                        p.payload.get("correlation_id").and_then(|v| v.as_str()) != Some(correlation)
                    });
                }
            } else if is_started_kind(event.event_kind) {
                pending.push(event);
            }
        }
        pending
    }
}

fn is_started_kind(kind: AuditEventKind) -> bool {
    matches!(
        kind,
        AuditEventKind::ScanStarted
            | AuditEventKind::ApplyStarted
            | AuditEventKind::RollbackStarted
            | AuditEventKind::RollbackOperationStarted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn record_writes_both_sinks() {
        let dir = TempDir::new().unwrap();
        let text_path = dir.path().join("audit.log");
        let jsonl_path = dir.path().join("audit.jsonl");
        let mut log = AuditLog::open(&text_path, &jsonl_path).unwrap();

        log.record(AuditEventKind::ScanStarted, serde_json::json!({"roots": ["/a"]}))
            .unwrap();

        let text = std::fs::read_to_string(&text_path).unwrap();
        assert!(text.contains("scan_started"));

        let events = AuditLog::read_events(&jsonl_path).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_kind, AuditEventKind::ScanStarted);
    }

    #[test]
    fn unmatched_started_events_excludes_completed_pairs() {
        let started = AuditEvent::new(
            "t1".into(),
            AuditEventKind::ApplyStarted,
            serde_json::json!({"correlation_id": "c1"}),
        );
        let completed = AuditEvent::new(
            "t2".into(),
            AuditEventKind::ApplyCompleted,
            serde_json::json!({"correlation_id": "c1"}),
        );
        let orphan = AuditEvent::new(
            "t3".into(),
            AuditEventKind::ApplyStarted,
            serde_json::json!({"correlation_id": "c2"}),
        );

        let events = vec![started, completed, orphan];
        let unmatched = AuditLog::unmatched_started_events(&events);
        assert_eq!(unmatched.len(), 1);
        assert_eq!(
            unmatched[0].payload.get("correlation_id").and_then(|v| v.as_str()),
            Some("c2")
        );
    }
}

//! Event Logger
//!
//! Gameplay log collection and append-only JSONL output.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use resist_events::{LogCategory, LogEntry, SessionTime};

/// Writes log entries to a JSONL file, one entry per line.
pub struct JsonlWriter {
    writer: BufWriter<File>,
    written: u64,
}

impl JsonlWriter {
    /// Create a writer, truncating any existing file at `path`
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn write(&mut self, entry: &LogEntry) -> std::io::Result<()> {
        let json = entry.to_jsonl()?;
        writeln!(self.writer, "{}", json)?;
        self.written += 1;
        Ok(())
    }

    /// Number of entries written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "failed to flush event log");
        }
    }
}

/// Collects a session's log entries until presentation drains them.
///
/// Entries are also mirrored to an optional [`JsonlWriter`]. A write
/// failure is reported once and the sink is dropped; the game keeps going.
#[derive(Default)]
pub struct EventLog {
    pending: Vec<LogEntry>,
    total: u64,
    sink: Option<JsonlWriter>,
}

impl EventLog {
    /// A log that only buffers in memory
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: JsonlWriter) -> Self {
        Self {
            sink: Some(sink),
            ..Self::default()
        }
    }

    pub fn set_sink(&mut self, sink: Option<JsonlWriter>) {
        self.sink = sink;
    }

    pub fn push(&mut self, at: SessionTime, category: LogCategory, message: impl Into<String>) {
        let entry = LogEntry::new(at, category, message);
        tracing::trace!(%entry, "log");

        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.write(&entry) {
                tracing::warn!(error = %e, "event log write failed, disabling file output");
                self.sink = None;
            }
        }
        self.total += 1;
        self.pending.push(entry);
    }

    pub fn player(&mut self, at: SessionTime, message: impl Into<String>) {
        self.push(at, LogCategory::Player, message);
    }

    pub fn system(&mut self, at: SessionTime, message: impl Into<String>) {
        self.push(at, LogCategory::System, message);
    }

    pub fn ai(&mut self, at: SessionTime, message: impl Into<String>) {
        self.push(at, LogCategory::Ai, message);
    }

    pub fn citizen(&mut self, at: SessionTime, message: impl Into<String>) {
        self.push(at, LogCategory::Citizen, message);
    }

    /// Takes every entry logged since the last drain.
    pub fn drain(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> &[LogEntry] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Entries logged over the whole session, drained or not
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        match self.sink.as_mut() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    #[test]
    fn test_jsonl_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        let mut log = EventLog::with_sink(JsonlWriter::create(&path).unwrap());
        log.system(SessionTime::ZERO, "Resistance network activated.");
        log.ai(SessionTime::from_secs(5), "Property optimization protocols activated.");
        log.flush().unwrap();

        let file = File::open(&path).unwrap();
        let lines: Vec<String> = std::io::BufReader::new(file)
            .lines()
            .map(|l| l.unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        let parsed = LogEntry::from_jsonl(&lines[1]).unwrap();
        assert_eq!(parsed.category, LogCategory::Ai);
        assert_eq!(parsed.at, SessionTime::from_secs(5));
    }

    #[test]
    fn test_memory_log_drain() {
        let mut log = EventLog::new();
        assert!(log.is_empty());

        log.player(SessionTime::ZERO, "Planted community garden in Riverside");
        log.citizen(SessionTime::ZERO, "Neighbors sharing resources.");
        assert_eq!(log.len(), 2);

        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].category, LogCategory::Player);
        assert!(log.is_empty());
        assert_eq!(log.total(), 2);
    }
}

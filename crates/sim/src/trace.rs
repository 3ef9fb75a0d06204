// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Diagnostic event trace.
//!
//! Every simulator-visible event (send, receive, snapshot start and finish)
//! is recorded in memory and, when a sink path is configured, appended as
//! JSONL. The trace is diagnostic only: it never influences algorithmic
//! behavior, and sink write failures are swallowed.

use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::message::{Message, ServerId, SnapshotId};

/// A single trace record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub time: u64,
    pub seq: u64,
    #[serde(flatten)]
    pub kind: TraceKind,
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceKind {
    Sent { src: ServerId, dest: ServerId, message: Message },
    Received { src: ServerId, dest: ServerId, message: Message },
    SnapshotStarted { server: ServerId, snapshot_id: SnapshotId },
    SnapshotCompleted { server: ServerId, snapshot_id: SnapshotId },
}

/// Append-only in-memory trace with an optional JSONL file sink.
#[derive(Debug, Default)]
pub struct EventLog {
    entries: Vec<TraceEntry>,
    sink: Option<PathBuf>,
    next_seq: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trace log that also appends each entry to `path` as JSONL.
    pub fn with_sink(path: PathBuf) -> Self {
        Self { sink: Some(path), ..Self::default() }
    }

    /// Route future entries to `path` as well as memory.
    pub fn set_sink(&mut self, path: PathBuf) {
        self.sink = Some(path);
    }

    pub(crate) fn record(&mut self, time: u64, kind: TraceKind) {
        let entry = TraceEntry { time, seq: self.next_seq, kind };
        self.next_seq += 1;
        match &entry.kind {
            TraceKind::Sent { src, dest, message } => {
                trace!(time, src = %src, dest = %dest, message = ?message, "sent");
            }
            TraceKind::Received { src, dest, message } => {
                trace!(time, src = %src, dest = %dest, message = ?message, "received");
            }
            TraceKind::SnapshotStarted { server, snapshot_id } => {
                debug!(time, server = %server, snapshot_id = *snapshot_id, "snapshot started");
            }
            TraceKind::SnapshotCompleted { server, snapshot_id } => {
                debug!(time, server = %server, snapshot_id = *snapshot_id, "snapshot completed");
            }
        }
        self.append_sink(&entry);
        self.entries.push(entry);
    }

    fn append_sink(&self, entry: &TraceEntry) {
        let Some(ref path) = self.sink else {
            return;
        };
        let Ok(mut line) = serde_json::to_string(entry) else {
            return;
        };
        line.push('\n');
        let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(path)
        else {
            return;
        };
        let _ = file.write_all(line.as_bytes());
    }

    /// All entries recorded so far, in order.
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Entries with `seq > since_seq`, for catchup-style consumers.
    pub fn entries_since(&self, since_seq: u64) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter().filter(move |entry| entry.seq > since_seq)
    }
}

#[cfg(test)]
#[path = "trace_tests.rs"]
mod tests;

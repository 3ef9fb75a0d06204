// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot accumulation: per-server contributions merged into global cuts.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::message::{ServerId, SnapshotId};
use crate::server::LocalCut;

/// One recorded in-flight token transfer in a finalized snapshot.
///
/// Only token messages are ever recorded; markers are protocol-internal and
/// never part of a cut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMessage {
    pub src: ServerId,
    pub dest: ServerId,
    pub count: u64,
}

/// The aggregated consistent cut for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSnapshot {
    pub id: SnapshotId,
    pub server_tokens: BTreeMap<ServerId, u64>,
    pub messages: Vec<SnapshotMessage>,
}

impl GlobalSnapshot {
    fn new(id: SnapshotId) -> Self {
        Self { id, server_tokens: BTreeMap::new(), messages: Vec::new() }
    }

    /// Total tokens captured by the cut: local holdings plus in-flight.
    pub fn total_tokens(&self) -> u64 {
        let held: u64 = self.server_tokens.values().sum();
        let in_flight: u64 = self.messages.iter().map(|m| m.count).sum();
        held + in_flight
    }

    /// Recorded messages bound for `dest`, in recorded order.
    pub fn messages_to<'a>(
        &'a self,
        dest: &'a str,
    ) -> impl Iterator<Item = &'a SnapshotMessage> + 'a {
        self.messages.iter().filter(move |m| m.dest == dest)
    }

    /// Equality as the verification contract defines it: ids and token maps
    /// match, and for every destination the ordered sequence of recorded
    /// messages matches. Ordering across destinations is unconstrained.
    pub fn same_cut(&self, other: &GlobalSnapshot) -> bool {
        if self.id != other.id
            || self.server_tokens != other.server_tokens
            || self.messages.len() != other.messages.len()
        {
            return false;
        }
        let dests: BTreeSet<&str> = self
            .messages
            .iter()
            .chain(other.messages.iter())
            .map(|m| m.dest.as_str())
            .collect();
        dests.into_iter().all(|dest| self.messages_to(dest).eq(other.messages_to(dest)))
    }
}

/// Bookkeeping for one snapshot while contributions trickle in.
#[derive(Debug)]
struct PendingSnapshot {
    cut: GlobalSnapshot,
    participants: BTreeSet<ServerId>,
    completed: BTreeSet<ServerId>,
}

/// Accumulates per-server contributions into global snapshots, keyed by
/// snapshot id in initiation order.
#[derive(Debug, Default)]
pub struct SnapshotRegistry {
    snapshots: IndexMap<SnapshotId, PendingSnapshot>,
}

impl SnapshotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a snapshot with the given participant set.
    pub(crate) fn open(&mut self, id: SnapshotId, participants: BTreeSet<ServerId>) {
        self.snapshots.insert(
            id,
            PendingSnapshot {
                cut: GlobalSnapshot::new(id),
                participants,
                completed: BTreeSet::new(),
            },
        );
    }

    /// Merge one server's contribution into the cut for `id`.
    pub(crate) fn record_completion(
        &mut self,
        server: &str,
        id: SnapshotId,
        cut: LocalCut,
    ) -> Result<()> {
        let entry = self.snapshots.get_mut(&id).ok_or(SimError::UnknownSnapshot { id })?;
        if !entry.completed.insert(server.to_owned()) {
            return Err(SimError::DuplicateCompletion { server: server.to_owned(), id });
        }
        entry.cut.server_tokens.insert(server.to_owned(), cut.tokens);
        for (src, counts) in &cut.channels {
            for &count in counts {
                entry.cut.messages.push(SnapshotMessage {
                    src: src.clone(),
                    dest: server.to_owned(),
                    count,
                });
            }
        }
        Ok(())
    }

    /// Whether every participant has reported for `id`.
    pub fn is_complete(&self, id: SnapshotId) -> Result<bool> {
        let entry = self.snapshots.get(&id).ok_or(SimError::UnknownSnapshot { id })?;
        Ok(entry.completed == entry.participants)
    }

    /// The finalized snapshot, or `None` while contributions are missing.
    pub fn get(&self, id: SnapshotId) -> Result<Option<&GlobalSnapshot>> {
        let entry = self.snapshots.get(&id).ok_or(SimError::UnknownSnapshot { id })?;
        Ok((entry.completed == entry.participants).then_some(&entry.cut))
    }

    /// Snapshot ids in initiation order.
    pub fn ids(&self) -> impl Iterator<Item = SnapshotId> + '_ {
        self.snapshots.keys().copied()
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;

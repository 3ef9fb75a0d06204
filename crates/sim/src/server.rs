// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-server state and the Chandy-Lamport marker rules.
//!
//! A server holds a token count, knows its neighbors by id, and keeps one
//! recording state per snapshot it participates in. Entry points mutate only
//! the server itself and hand follow-up work (marker broadcasts, finished
//! contributions) back to the simulator as a [`Step`], which keeps ownership
//! acyclic: servers never reference the simulator or its channels.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, SimError};
use crate::message::{Message, ServerId, SnapshotId};

/// Recording state for one inbound channel within one snapshot.
#[derive(Debug, Clone, Default)]
struct ChannelRecord {
    /// Set once the marker for this snapshot has arrived on the channel.
    closed: bool,
    /// Token counts observed in flight, in arrival order.
    messages: Vec<u64>,
}

/// A server's local recording state for one snapshot.
///
/// Created the first time the server hears of the snapshot, whether by
/// initiating it or by receiving its first marker. `recorded_tokens` is
/// written exactly once, at that moment.
#[derive(Debug, Clone)]
struct PerSnapshot {
    recorded_tokens: u64,
    channels: BTreeMap<ServerId, ChannelRecord>,
    /// Local completion has been handed to the simulator.
    reported: bool,
}

impl PerSnapshot {
    fn open(recorded_tokens: u64, inbound: &BTreeSet<ServerId>) -> Self {
        let channels =
            inbound.iter().map(|src| (src.clone(), ChannelRecord::default())).collect();
        Self { recorded_tokens, channels, reported: false }
    }

    fn all_closed(&self) -> bool {
        self.channels.values().all(|record| record.closed)
    }

    fn local_cut(&self) -> LocalCut {
        LocalCut {
            tokens: self.recorded_tokens,
            channels: self
                .channels
                .iter()
                .map(|(src, record)| (src.clone(), record.messages.clone()))
                .collect(),
        }
    }
}

/// A server's finished contribution to one snapshot: its recorded token
/// count plus the tokens recorded in flight on each inbound channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCut {
    pub tokens: u64,
    pub channels: BTreeMap<ServerId, Vec<u64>>,
}

/// Follow-up work a server hands back to the simulator after one entry
/// point runs.
#[derive(Debug, Default)]
pub struct Step {
    /// Snapshots whose marker must go out on every outbound channel.
    pub broadcast: Vec<SnapshotId>,
    /// Snapshots that just completed locally, with their contributions.
    pub completed: Vec<(SnapshotId, LocalCut)>,
}

/// One node of the simulated system.
#[derive(Debug)]
pub struct Server {
    id: ServerId,
    tokens: u64,
    outbound: BTreeSet<ServerId>,
    inbound: BTreeSet<ServerId>,
    snapshots: BTreeMap<SnapshotId, PerSnapshot>,
}

impl Server {
    pub fn new(id: ServerId, tokens: u64) -> Self {
        Self {
            id,
            tokens,
            outbound: BTreeSet::new(),
            inbound: BTreeSet::new(),
            snapshots: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Tokens currently held.
    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    /// Outbound neighbor ids, in sorted order.
    pub fn outbound(&self) -> impl Iterator<Item = &ServerId> {
        self.outbound.iter()
    }

    pub(crate) fn add_outbound(&mut self, dest: ServerId) {
        self.outbound.insert(dest);
    }

    pub(crate) fn add_inbound(&mut self, src: ServerId) {
        self.inbound.insert(src);
    }

    /// Debit `count` tokens for transfer to `dest` and return the message to
    /// put on the wire. The debit happens before the message travels, so the
    /// tokens exist either here or in flight, never both.
    pub fn send_tokens(&mut self, count: u64, dest: &str) -> Result<Message> {
        if !self.outbound.contains(dest) {
            return Err(SimError::UnknownDestination {
                src: self.id.clone(),
                dest: dest.to_owned(),
            });
        }
        if count > self.tokens {
            return Err(SimError::TokenOverdraft {
                id: self.id.clone(),
                held: self.tokens,
                requested: count,
            });
        }
        self.tokens -= count;
        Ok(Message::Token { count })
    }

    /// Enter `snapshot_id`: record the local token count and request a
    /// marker broadcast. Calling again for an id already entered is a no-op.
    pub fn start_snapshot(&mut self, snapshot_id: SnapshotId) -> Step {
        let mut step = Step::default();
        if self.snapshots.contains_key(&snapshot_id) {
            return step;
        }
        self.snapshots.insert(snapshot_id, PerSnapshot::open(self.tokens, &self.inbound));
        step.broadcast.push(snapshot_id);
        self.maybe_complete(snapshot_id, &mut step);
        step
    }

    /// Handle one delivery popped from the inbound channel `(src, self)`.
    pub fn handle_packet(&mut self, src: &str, message: Message) -> Result<Step> {
        match message {
            Message::Token { count } => {
                self.receive_tokens(src, count);
                Ok(Step::default())
            }
            Message::Marker { snapshot_id } => self.receive_marker(src, snapshot_id),
        }
    }

    fn receive_tokens(&mut self, src: &str, count: u64) {
        self.tokens += count;
        // A token arriving on a still-open channel is inside the cut of
        // every snapshot this server is recording.
        for snapshot in self.snapshots.values_mut() {
            if snapshot.reported {
                continue;
            }
            if let Some(record) = snapshot.channels.get_mut(src) {
                if !record.closed {
                    record.messages.push(count);
                }
            }
        }
    }

    fn receive_marker(&mut self, src: &str, snapshot_id: SnapshotId) -> Result<Step> {
        let mut step = Step::default();
        match self.snapshots.entry(snapshot_id) {
            Entry::Vacant(slot) => {
                // First contact with this snapshot: record local state now.
                // The channel the marker arrived on carries nothing of the
                // cut, so it closes immediately with an empty record.
                let mut snapshot = PerSnapshot::open(self.tokens, &self.inbound);
                match snapshot.channels.get_mut(src) {
                    Some(record) => record.closed = true,
                    None => {
                        return Err(SimError::UnknownDestination {
                            src: src.to_owned(),
                            dest: self.id.clone(),
                        })
                    }
                }
                slot.insert(snapshot);
                step.broadcast.push(snapshot_id);
            }
            Entry::Occupied(mut slot) => {
                let record = match slot.get_mut().channels.get_mut(src) {
                    Some(record) => record,
                    None => {
                        return Err(SimError::UnknownDestination {
                            src: src.to_owned(),
                            dest: self.id.clone(),
                        })
                    }
                };
                if record.closed {
                    return Err(SimError::MarkerAfterClose {
                        server: self.id.clone(),
                        src: src.to_owned(),
                        snapshot_id,
                    });
                }
                record.closed = true;
            }
        }
        self.maybe_complete(snapshot_id, &mut step);
        Ok(step)
    }

    /// Once a marker has arrived on every inbound channel the snapshot is
    /// locally complete and its contribution goes out exactly once.
    fn maybe_complete(&mut self, snapshot_id: SnapshotId, step: &mut Step) {
        if let Some(snapshot) = self.snapshots.get_mut(&snapshot_id) {
            if !snapshot.reported && snapshot.all_closed() {
                snapshot.reported = true;
                step.completed.push((snapshot_id, snapshot.local_cut()));
            }
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;

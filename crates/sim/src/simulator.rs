// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The discrete-time driver: owns every server and channel, advances the
//! logical clock, and coordinates snapshot collection.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::channel::Channel;
use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::message::{Event, Message, PendingDelivery, ServerId, SnapshotId};
use crate::server::{Server, Step};
use crate::snapshot::{GlobalSnapshot, SnapshotRegistry};
use crate::trace::{EventLog, TraceKind};

/// Discrete-time simulator and snapshot coordinator.
///
/// All state lives here: the simulator owns every server, every channel
/// (keyed by `(src, dest)`), the snapshot registry, and the seeded PRNG for
/// delivery delays. Servers know their neighbors by id only, so ownership
/// stays acyclic and channel iteration needs no aliasing.
///
/// Determinism is a contract, not an accident: servers and each server's
/// outbound destinations are iterated in sorted order, each tick delivers at
/// most one message per sending server, and the PRNG is consumed once per
/// enqueued message in enqueue order. Two runs with the same config,
/// topology, and event sequence are identical.
#[derive(Debug)]
pub struct Simulator {
    time: u64,
    next_snapshot_id: SnapshotId,
    servers: BTreeMap<ServerId, Server>,
    channels: BTreeMap<(ServerId, ServerId), Channel>,
    registry: SnapshotRegistry,
    rng: StdRng,
    max_delay: u64,
    trace: EventLog,
}

impl Simulator {
    /// Create an empty simulator. `max_delay` is floored at 1 so the delay
    /// range is never empty.
    pub fn new(config: SimConfig) -> Self {
        Self {
            time: 0,
            next_snapshot_id: 0,
            servers: BTreeMap::new(),
            channels: BTreeMap::new(),
            registry: SnapshotRegistry::new(),
            rng: StdRng::seed_from_u64(config.seed),
            max_delay: config.max_delay.max(1),
            trace: EventLog::new(),
        }
    }

    /// Current logical time.
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Route trace entries to a JSONL file in addition to memory.
    pub fn set_trace_sink(&mut self, path: PathBuf) {
        self.trace.set_sink(path);
    }

    /// Diagnostic trace of everything that has happened so far.
    pub fn trace(&self) -> &EventLog {
        &self.trace
    }

    /// Register a server holding `tokens`.
    pub fn add_server(&mut self, id: &str, tokens: u64) -> Result<()> {
        if self.servers.contains_key(id) {
            return Err(SimError::DuplicateServer { id: id.to_owned() });
        }
        self.servers.insert(id.to_owned(), Server::new(id.to_owned(), tokens));
        Ok(())
    }

    /// Create the unidirectional channel `src -> dest`. Self-links are
    /// silently ignored; a second channel for the same pair is an error.
    pub fn add_forward_link(&mut self, src: &str, dest: &str) -> Result<()> {
        if !self.servers.contains_key(src) {
            return Err(SimError::UnknownServer { id: src.to_owned() });
        }
        if !self.servers.contains_key(dest) {
            return Err(SimError::UnknownServer { id: dest.to_owned() });
        }
        if src == dest {
            return Ok(());
        }
        let key = (src.to_owned(), dest.to_owned());
        if self.channels.contains_key(&key) {
            return Err(SimError::DuplicateChannel {
                src: src.to_owned(),
                dest: dest.to_owned(),
            });
        }
        self.channels.insert(key, Channel::new(src.to_owned(), dest.to_owned()));
        if let Some(server) = self.servers.get_mut(src) {
            server.add_outbound(dest.to_owned());
        }
        if let Some(server) = self.servers.get_mut(dest) {
            server.add_inbound(src.to_owned());
        }
        Ok(())
    }

    /// Receive time for a message sent now: one tick of transit plus a
    /// uniform random extra delay below `max_delay`.
    fn schedule_receive(&mut self) -> u64 {
        self.time + 1 + self.rng.random_range(0..self.max_delay)
    }

    /// Inject an external event at the current time. Returns the allocated
    /// snapshot id when the event initiated a snapshot.
    pub fn inject_event(&mut self, event: Event) -> Result<Option<SnapshotId>> {
        match event {
            Event::PassToken { src, dest, count } => {
                let server = self
                    .servers
                    .get_mut(&src)
                    .ok_or_else(|| SimError::UnknownServer { id: src.clone() })?;
                let message = server.send_tokens(count, &dest)?;
                let receive_time = self.schedule_receive();
                self.trace.record(
                    self.time,
                    TraceKind::Sent { src: src.clone(), dest: dest.clone(), message: message.clone() },
                );
                let key = (src, dest);
                let channel = self.channels.get_mut(&key).ok_or_else(|| {
                    SimError::UnknownDestination { src: key.0.clone(), dest: key.1.clone() }
                })?;
                channel.enqueue(message, receive_time);
                Ok(None)
            }
            Event::InitiateSnapshot { server } => {
                let snapshot_id = self.next_snapshot_id;
                let step = self
                    .servers
                    .get_mut(&server)
                    .ok_or_else(|| SimError::UnknownServer { id: server.clone() })?
                    .start_snapshot(snapshot_id);
                self.next_snapshot_id += 1;
                let participants: BTreeSet<ServerId> = self.servers.keys().cloned().collect();
                self.registry.open(snapshot_id, participants);
                self.trace.record(
                    self.time,
                    TraceKind::SnapshotStarted { server: server.clone(), snapshot_id },
                );
                self.apply_step(&server, step)?;
                Ok(Some(snapshot_id))
            }
        }
    }

    /// Advance time one step, then deliver at most one eligible message per
    /// sending server, scanning senders and their destinations in sorted
    /// order. A receiver may absorb several messages in one tick (one from
    /// each sender); a sender never emits more than one.
    pub fn tick(&mut self) -> Result<()> {
        self.time += 1;
        let senders: Vec<ServerId> = self.servers.keys().cloned().collect();
        for src in senders {
            let dests: Vec<ServerId> = match self.servers.get(&src) {
                Some(server) => server.outbound().cloned().collect(),
                None => continue,
            };
            for dest in dests {
                let key = (src.clone(), dest);
                let due = self
                    .channels
                    .get(&key)
                    .and_then(Channel::peek_head)
                    .is_some_and(|head| head.receive_time <= self.time);
                if !due {
                    continue;
                }
                let delivery = self
                    .channels
                    .get_mut(&key)
                    .ok_or_else(|| SimError::UnknownDestination {
                        src: key.0.clone(),
                        dest: key.1.clone(),
                    })?
                    .pop_head()?;
                self.deliver(delivery)?;
                break;
            }
        }
        Ok(())
    }

    fn deliver(&mut self, delivery: PendingDelivery) -> Result<()> {
        let PendingDelivery { src, dest, message, .. } = delivery;
        self.trace.record(
            self.time,
            TraceKind::Received { src: src.clone(), dest: dest.clone(), message: message.clone() },
        );
        let step = self
            .servers
            .get_mut(&dest)
            .ok_or_else(|| SimError::UnknownServer { id: dest.clone() })?
            .handle_packet(&src, message)?;
        self.apply_step(&dest, step)
    }

    /// Carry out the follow-up work a server requested: fan markers out on
    /// its outbound channels and file finished contributions.
    fn apply_step(&mut self, server: &str, step: Step) -> Result<()> {
        for snapshot_id in step.broadcast {
            let dests: Vec<ServerId> = match self.servers.get(server) {
                Some(s) => s.outbound().cloned().collect(),
                None => Vec::new(),
            };
            for dest in dests {
                let receive_time = self.schedule_receive();
                let message = Message::Marker { snapshot_id };
                self.trace.record(
                    self.time,
                    TraceKind::Sent {
                        src: server.to_owned(),
                        dest: dest.clone(),
                        message: message.clone(),
                    },
                );
                let key = (server.to_owned(), dest);
                let channel = self.channels.get_mut(&key).ok_or_else(|| {
                    SimError::UnknownDestination { src: key.0.clone(), dest: key.1.clone() }
                })?;
                channel.enqueue(message, receive_time);
            }
        }
        for (snapshot_id, cut) in step.completed {
            self.trace.record(
                self.time,
                TraceKind::SnapshotCompleted { server: server.to_owned(), snapshot_id },
            );
            self.registry.record_completion(server, snapshot_id, cut)?;
        }
        Ok(())
    }

    /// The finalized snapshot for `id`, or `None` while servers are still
    /// recording. Never advances time; the caller ticks between checks.
    pub fn collect_snapshot(&self, id: SnapshotId) -> Result<Option<GlobalSnapshot>> {
        Ok(self.registry.get(id)?.cloned())
    }

    /// Whether every participant has reported completion for `id`.
    pub fn snapshot_complete(&self, id: SnapshotId) -> Result<bool> {
        self.registry.is_complete(id)
    }

    /// Ids of every snapshot initiated so far, in initiation order.
    pub fn snapshot_ids(&self) -> Vec<SnapshotId> {
        self.registry.ids().collect()
    }

    /// Tokens currently held by `id`.
    pub fn server_tokens(&self, id: &str) -> Result<u64> {
        self.servers
            .get(id)
            .map(Server::tokens)
            .ok_or_else(|| SimError::UnknownServer { id: id.to_owned() })
    }

    /// Tokens held by servers plus tokens in flight on every channel. This
    /// is the conserved quantity of the whole simulation.
    pub fn total_tokens(&self) -> u64 {
        let held: u64 = self.servers.values().map(Server::tokens).sum();
        let in_flight: u64 = self.channels.values().map(Channel::pending_tokens).sum();
        held + in_flight
    }

    /// Whether every channel has drained.
    pub fn idle(&self) -> bool {
        self.channels.values().all(Channel::is_empty)
    }
}

#[cfg(test)]
#[path = "simulator_tests.rs"]
mod tests;

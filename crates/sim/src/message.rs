// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Messages exchanged between servers, and the external events a driver can
//! inject into the simulator.

use serde::{Deserialize, Serialize};

/// Identifier of a server, unique within one simulation.
pub type ServerId = String;

/// Identifier of a snapshot, allocated monotonically by the simulator.
pub type SnapshotId = u64;

/// A message traveling on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Transfers `count` tokens from sender to receiver.
    Token { count: u64 },
    /// Chandy-Lamport marker delimiting the cut of one snapshot.
    Marker { snapshot_id: SnapshotId },
}

impl Message {
    /// Token payload of this message, if it is a token transfer.
    pub fn token_count(&self) -> Option<u64> {
        match self {
            Self::Token { count } => Some(*count),
            Self::Marker { .. } => None,
        }
    }
}

/// A message queued on a channel together with its scheduled receive time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelivery {
    pub src: ServerId,
    pub dest: ServerId,
    pub message: Message,
    pub receive_time: u64,
}

/// External events injected into the simulator by a driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Move `count` tokens from `src` to `dest`.
    PassToken { src: ServerId, dest: ServerId, count: u64 },
    /// Start a new snapshot at `server`.
    InitiateSnapshot { server: ServerId },
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic discrete-event simulator of the Chandy-Lamport snapshot
//! algorithm over a directed graph of token-passing servers.
//!
//! The [`simulator::Simulator`] owns every server and channel and advances a
//! logical clock one tick at a time; [`server::Server`] implements the marker
//! rules; [`snapshot::SnapshotRegistry`] merges per-server contributions into
//! consistent global cuts. The `topology`, `script`, and `snapfile` modules
//! read and write the text formats that drive the simulator from files.

pub mod channel;
pub mod config;
pub mod error;
pub mod message;
pub mod script;
pub mod server;
pub mod simulator;
pub mod snapfile;
pub mod snapshot;
pub mod topology;
pub mod trace;

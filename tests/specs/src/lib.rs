// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end harness for snapsim scenario tests.
//!
//! Loads fixture topologies and event scripts from `testdata/`, runs them to
//! completion, and hands back the finalized snapshots for golden comparison
//! and invariant checks.

use std::path::PathBuf;

use anyhow::{bail, Context};

use snapsim::config::SimConfig;
use snapsim::script::{load_script, run_script};
use snapsim::simulator::Simulator;
use snapsim::snapfile::{compare_snapshots, load_snapshot};
use snapsim::snapshot::GlobalSnapshot;
use snapsim::topology::load_topology;

/// Ticks to spend waiting on one snapshot (or the final drain) before
/// declaring the run wedged.
const COMPLETION_BUDGET: u64 = 10_000;

/// Path to a fixture under `testdata/`.
pub fn testdata(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata").join(name)
}

/// Everything a finished scenario run exposes to assertions.
pub struct ScenarioRun {
    /// Finalized snapshots, sorted by id.
    pub snapshots: Vec<GlobalSnapshot>,
    pub initial_tokens: u64,
    /// Total tokens after the wire fully drained.
    pub resting_tokens: u64,
    pub final_time: u64,
}

/// Build a simulator from a `testdata/` topology fixture.
pub fn build_fixture(topology: &str, config: SimConfig) -> anyhow::Result<Simulator> {
    load_topology(&testdata(topology))?.build(config)
}

/// Run a topology fixture against an event script fixture and collect every
/// snapshot the script initiated.
///
/// After the script finishes, the clock keeps advancing until each snapshot
/// is collectable and every channel has drained, so resting-state invariants
/// are observable.
pub fn run_scenario(
    topology: &str,
    events: &str,
    config: SimConfig,
) -> anyhow::Result<ScenarioRun> {
    let top = load_topology(&testdata(topology))?;
    let steps = load_script(&testdata(events))?;
    let initial_tokens = top.total_tokens();

    let mut sim = top.build(config)?;
    let initiated = run_script(&mut sim, &steps)?;

    let mut snapshots = Vec::with_capacity(initiated.len());
    for id in initiated {
        let mut spent = 0;
        let snapshot = loop {
            if let Some(snapshot) = sim.collect_snapshot(id)? {
                break snapshot;
            }
            if spent >= COMPLETION_BUDGET {
                bail!("snapshot {id} still incomplete after {COMPLETION_BUDGET} ticks");
            }
            sim.tick()?;
            spent += 1;
        };
        snapshots.push(snapshot);
    }

    let mut spent = 0;
    while !sim.idle() {
        if spent >= COMPLETION_BUDGET {
            bail!("deliveries still pending after {COMPLETION_BUDGET} drain ticks");
        }
        sim.tick()?;
        spent += 1;
    }

    snapshots.sort_by_key(|snapshot| snapshot.id);
    Ok(ScenarioRun {
        snapshots,
        initial_tokens,
        resting_tokens: sim.total_tokens(),
        final_time: sim.time(),
    })
}

impl ScenarioRun {
    /// Assert conservation: the resting total and every cut's total must
    /// both equal the initial token supply.
    pub fn check_conservation(&self) -> anyhow::Result<()> {
        if self.resting_tokens != self.initial_tokens {
            bail!(
                "resting total {} does not match initial total {}",
                self.resting_tokens,
                self.initial_tokens
            );
        }
        for snapshot in &self.snapshots {
            let captured = snapshot.total_tokens();
            if captured != self.initial_tokens {
                bail!(
                    "snapshot {} captured {captured} token(s), expected {}",
                    snapshot.id,
                    self.initial_tokens
                );
            }
        }
        Ok(())
    }

    /// Compare the `index`-th collected snapshot with a golden fixture.
    pub fn check_golden(&self, index: usize, golden: &str) -> anyhow::Result<()> {
        let expected = load_snapshot(&testdata(golden))?;
        let actual = self
            .snapshots
            .get(index)
            .with_context(|| format!("run produced no snapshot #{index}"))?;
        compare_snapshots(&expected, actual)
            .with_context(|| format!("against golden {golden}"))
    }
}

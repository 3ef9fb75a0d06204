// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios over the `testdata/` fixtures.
//!
//! The small topologies run in lockstep (`max_delay = 1`), where every hop
//! lands exactly one tick after it is sent and the expected cut is derivable
//! by hand, so they compare against golden `.snap` files. The larger runs
//! use the full random delay and are checked through invariants instead:
//! conservation, purity, and seed determinism.

use snapsim::config::SimConfig;
use snapsim::script::{load_script, run_script};
use snapsim_specs::{build_fixture, run_scenario, testdata};

/// One-tick hops: the random extra delay collapses to zero.
const LOCKSTEP: SimConfig = SimConfig { seed: 1, max_delay: 1 };

/// Full random delays for the invariant-only scenarios.
const DELAYED: SimConfig = SimConfig { seed: 8_053_172_852_482_175_524, max_delay: 5 };

#[test]
fn two_nodes_quiescent() -> anyhow::Result<()> {
    let run = run_scenario("2nodes.top", "2nodes-quiescent.events", LOCKSTEP)?;
    run.check_conservation()?;
    run.check_golden(0, "2nodes-quiescent.snap")?;
    assert!(run.final_time >= 10);
    Ok(())
}

#[test]
fn two_nodes_token_ahead_of_marker() -> anyhow::Result<()> {
    let run = run_scenario("2nodes.top", "2nodes-token-ahead.events", LOCKSTEP)?;
    run.check_conservation()?;
    run.check_golden(0, "2nodes-token-ahead.snap")
}

#[test]
fn two_nodes_crossing_token_lands_in_the_cut() -> anyhow::Result<()> {
    let run = run_scenario("2nodes.top", "2nodes-crossing.events", LOCKSTEP)?;
    run.check_conservation()?;
    run.check_golden(0, "2nodes-crossing.snap")
}

#[test]
fn ring_of_three_with_multiple_transfers() -> anyhow::Result<()> {
    let run = run_scenario("3nodes-ring.top", "3nodes-ring.events", LOCKSTEP)?;
    run.check_conservation()?;
    run.check_golden(0, "3nodes-ring.snap")
}

#[test]
fn bidirectional_triangle_records_the_crossing_transfer() -> anyhow::Result<()> {
    let run = run_scenario("3nodes-triangle.top", "3nodes-triangle.events", LOCKSTEP)?;
    run.check_conservation()?;
    run.check_golden(0, "3nodes-triangle.snap")
}

#[test]
fn eight_nodes_sequential_snapshots() -> anyhow::Result<()> {
    let run = run_scenario("8nodes.top", "8nodes-sequential.events", DELAYED)?;
    assert_eq!(run.snapshots.len(), 2);
    run.check_conservation()
}

#[test]
fn eight_nodes_concurrent_snapshots() -> anyhow::Result<()> {
    let run = run_scenario("8nodes.top", "8nodes-concurrent.events", DELAYED)?;
    assert_eq!(run.snapshots.len(), 5);
    for (index, snapshot) in run.snapshots.iter().enumerate() {
        assert_eq!(snapshot.id, index as u64);
    }
    run.check_conservation()
}

#[test]
fn ten_nodes_directed_edges() -> anyhow::Result<()> {
    let run = run_scenario("10nodes.top", "10nodes.events", DELAYED)?;
    assert_eq!(run.snapshots.len(), 3);
    run.check_conservation()
}

#[test]
fn same_seed_reproduces_identical_snapshots() -> anyhow::Result<()> {
    let first = run_scenario("8nodes.top", "8nodes-concurrent.events", DELAYED)?;
    let second = run_scenario("8nodes.top", "8nodes-concurrent.events", DELAYED)?;
    assert_eq!(
        serde_json::to_string(&first.snapshots)?,
        serde_json::to_string(&second.snapshots)?
    );
    Ok(())
}

#[test]
fn cuts_never_contain_markers() -> anyhow::Result<()> {
    let run = run_scenario("8nodes.top", "8nodes-concurrent.events", DELAYED)?;
    for snapshot in &run.snapshots {
        assert!(snapshot.messages.iter().all(|message| message.count >= 1));
        let json = serde_json::to_string(snapshot)?;
        assert!(!json.contains("marker"));
    }
    Ok(())
}

#[test]
fn trace_sink_captures_a_whole_run() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("trace.jsonl");

    let mut sim = build_fixture("2nodes.top", LOCKSTEP)?;
    sim.set_trace_sink(path.clone());
    let steps = load_script(&testdata("2nodes-quiescent.events"))?;
    run_script(&mut sim, &steps)?;

    let text = std::fs::read_to_string(&path)?;
    assert!(text.lines().count() >= 4, "trace too short:\n{text}");
    for line in text.lines() {
        let entry: serde_json::Value = serde_json::from_str(line)?;
        assert!(entry.get("kind").is_some());
        assert!(entry.get("time").is_some());
    }
    Ok(())
}

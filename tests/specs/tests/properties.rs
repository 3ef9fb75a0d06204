// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property tests: conservation and determinism hold for arbitrary seeds,
//! token placements, and transfer scripts on a three-node ring.

use anyhow::Context;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

use snapsim::config::SimConfig;
use snapsim::message::Event;
use snapsim::simulator::Simulator;

/// Outcome of one scripted run on the ring.
struct RingRun {
    initial: u64,
    resting: u64,
    snapshot_total: u64,
    serialized: String,
}

fn ring(tokens: [u64; 3], config: SimConfig) -> anyhow::Result<Simulator> {
    let mut sim = Simulator::new(config);
    for (index, held) in tokens.iter().enumerate() {
        sim.add_server(&format!("n{}", index + 1), *held)?;
    }
    for (src, dest) in [("n1", "n2"), ("n2", "n3"), ("n3", "n1")] {
        sim.add_forward_link(src, dest)?;
    }
    Ok(sim)
}

/// Run the given transfer script with a snapshot initiated midway, then
/// tick until the snapshot is finalized and the wire has drained.
fn drive(seed: u64, tokens: [u64; 3], sends: &[(usize, u64)]) -> anyhow::Result<RingRun> {
    let mut sim = ring(tokens, SimConfig { seed, max_delay: 5 })?;
    let initial: u64 = tokens.iter().sum();

    for (index, (src, requested)) in sends.iter().enumerate() {
        let src_id = format!("n{}", (src % 3) + 1);
        let dest_id = format!("n{}", ((src + 1) % 3) + 1);
        // Clamp to the sender's holdings so the script never overdrafts.
        let count = (*requested).min(sim.server_tokens(&src_id)?);
        if count > 0 {
            sim.inject_event(Event::PassToken { src: src_id, dest: dest_id, count })?;
        }
        if index == sends.len() / 2 {
            sim.inject_event(Event::InitiateSnapshot { server: "n1".to_owned() })?;
        }
        sim.tick()?;
    }
    if sim.snapshot_ids().is_empty() {
        sim.inject_event(Event::InitiateSnapshot { server: "n1".to_owned() })?;
    }

    let mut guard = 0u64;
    while !(sim.snapshot_complete(0)? && sim.idle()) {
        if guard > 10_000 {
            anyhow::bail!("run never drained");
        }
        sim.tick()?;
        guard += 1;
    }

    let snapshot =
        sim.collect_snapshot(0)?.context("complete snapshot must be collectable")?;
    Ok(RingRun {
        initial,
        resting: sim.total_tokens(),
        snapshot_total: snapshot.total_tokens(),
        serialized: serde_json::to_string(&snapshot)?,
    })
}

proptest! {
    #[test]
    fn conservation_holds_for_any_seed(
        seed in any::<u64>(),
        tokens in proptest::array::uniform3(0u64..50),
        sends in proptest::collection::vec((0usize..3, 0u64..10), 0..12),
    ) {
        let run = match drive(seed, tokens, &sends) {
            Ok(run) => run,
            Err(e) => return Err(TestCaseError::fail(format!("{e:#}"))),
        };
        prop_assert_eq!(run.resting, run.initial);
        prop_assert_eq!(run.snapshot_total, run.initial);
    }

    #[test]
    fn same_seed_reproduces_the_same_cut(
        seed in any::<u64>(),
        tokens in proptest::array::uniform3(0u64..50),
        sends in proptest::collection::vec((0usize..3, 0u64..10), 0..12),
    ) {
        let first = match drive(seed, tokens, &sends) {
            Ok(run) => run,
            Err(e) => return Err(TestCaseError::fail(format!("{e:#}"))),
        };
        let second = match drive(seed, tokens, &sends) {
            Ok(run) => run,
            Err(e) => return Err(TestCaseError::fail(format!("{e:#}"))),
        };
        prop_assert_eq!(first.serialized, second.serialized);
        prop_assert_eq!(first.resting, second.resting);
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot files (`.snap`): parse, render, compare.
//!
//! Line 1 is the snapshot id; 2-field lines are `<id> <tokens>` holdings;
//! 3-field lines are `<src> <dest> token(<count>)` in-flight messages. Only
//! token messages appear; markers are protocol-internal and never recorded.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Context};
use regex::Regex;

use crate::snapshot::{GlobalSnapshot, SnapshotMessage};
use crate::topology::significant_lines;

/// Parse the `.snap` text format.
pub fn parse_snapshot(text: &str) -> anyhow::Result<GlobalSnapshot> {
    let token_re = Regex::new(r"^token\((\d+)\)$").context("compiling token pattern")?;
    let mut lines = significant_lines(text);
    let (line_no, id_line) = lines.next().context("empty snapshot file")?;
    let id: u64 = id_line
        .parse()
        .with_context(|| format!("line {line_no}: expected snapshot id, got {id_line:?}"))?;

    let mut server_tokens = BTreeMap::new();
    let mut messages = Vec::new();
    for (line_no, line) in lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [server, tokens] => {
                let tokens: u64 = tokens
                    .parse()
                    .with_context(|| format!("line {line_no}: bad token count {tokens:?}"))?;
                if server_tokens.insert((*server).to_owned(), tokens).is_some() {
                    bail!("line {line_no}: duplicate server {server:?}");
                }
            }
            [src, dest, payload] => {
                let count = token_re
                    .captures(payload)
                    .and_then(|caps| caps.get(1))
                    .with_context(|| {
                        format!("line {line_no}: expected token(<count>), got {payload:?}")
                    })?
                    .as_str()
                    .parse::<u64>()
                    .with_context(|| format!("line {line_no}: bad count in {payload:?}"))?;
                messages.push(SnapshotMessage {
                    src: (*src).to_owned(),
                    dest: (*dest).to_owned(),
                    count,
                });
            }
            _ => bail!("line {line_no}: unrecognized snapshot line {line:?}"),
        }
    }

    Ok(GlobalSnapshot { id, server_tokens, messages })
}

/// Read and parse a `.snap` file.
pub fn load_snapshot(path: &Path) -> anyhow::Result<GlobalSnapshot> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_snapshot(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Render a snapshot in the same text format `parse_snapshot` reads.
pub fn format_snapshot(snapshot: &GlobalSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", snapshot.id);
    for (server, tokens) in &snapshot.server_tokens {
        let _ = writeln!(out, "{server} {tokens}");
    }
    for message in &snapshot.messages {
        let _ = writeln!(out, "{} {} token({})", message.src, message.dest, message.count);
    }
    out
}

/// Compare two snapshots under the verification contract: ids and token
/// maps must match, message counts must match, and for every destination
/// the ordered sequence of recorded messages must match. Ordering across
/// destinations is unconstrained. Reports the first difference found.
pub fn compare_snapshots(
    expected: &GlobalSnapshot,
    actual: &GlobalSnapshot,
) -> anyhow::Result<()> {
    if expected.id != actual.id {
        bail!("snapshot id mismatch: expected {}, got {}", expected.id, actual.id);
    }
    for (server, tokens) in &expected.server_tokens {
        match actual.server_tokens.get(server) {
            Some(actual_tokens) if actual_tokens == tokens => {}
            Some(actual_tokens) => bail!(
                "snapshot {}: server {server} holds {actual_tokens} token(s), expected {tokens}",
                expected.id
            ),
            None => bail!("snapshot {}: server {server} missing", expected.id),
        }
    }
    for server in actual.server_tokens.keys() {
        if !expected.server_tokens.contains_key(server) {
            bail!("snapshot {}: unexpected server {server}", expected.id);
        }
    }
    if expected.messages.len() != actual.messages.len() {
        bail!(
            "snapshot {}: expected {} in-flight message(s), got {}",
            expected.id,
            expected.messages.len(),
            actual.messages.len()
        );
    }
    let dests: BTreeSet<&str> = expected
        .messages
        .iter()
        .chain(actual.messages.iter())
        .map(|m| m.dest.as_str())
        .collect();
    for dest in dests {
        let want: Vec<&SnapshotMessage> = expected.messages_to(dest).collect();
        let got: Vec<&SnapshotMessage> = actual.messages_to(dest).collect();
        if want != got {
            bail!(
                "snapshot {}: messages to {dest} differ: expected {want:?}, got {got:?}",
                expected.id
            );
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "snapfile_tests.rs"]
mod tests;

//! Scenario 4: learner catch-up (spec §8 seed test 4).
//!
//! `RaftHandle` exposes `propose`/`deliver`/`stop` only — there is no wire
//! op for adding a learner to a running group after the fact, so this
//! keeps the learner in the initial membership rather than joining it
//! mid-stream. What's asserted is the part that matters for catch-up:
//! `AppendEntries` replicates to a non-voting member exactly like a voter,
//! so the learner's applied log converges with the voters' and stays
//! converged across a second batch of writes.

mod common;

use common::{put_command, spin_up_cluster};
use samyama::config::RaftConfig;
use std::time::Duration;

#[tokio::test]
async fn learner_converges_with_voters_and_keeps_up_after_more_writes() {
    let cluster = spin_up_cluster(&[1, 2, 3], &[4], RaftConfig::fast_for_tests()).await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    for i in 0..100 {
        cluster.propose_via_leader(put_command(&format!("a{i}"), "v")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(500)).await;

    let voter_log = cluster.sinks[&1].applied_indices();
    let learner_log = cluster.sinks[&4].applied_indices();
    assert_eq!(learner_log, voter_log, "learner must hold every record the voters committed");
    assert_eq!(learner_log.len(), 100);

    for i in 100..200 {
        cluster.propose_via_leader(put_command(&format!("a{i}"), "v")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(500)).await;

    let voter_log = cluster.sinks[&1].applied_indices();
    let learner_log = cluster.sinks[&4].applied_indices();
    assert_eq!(learner_log, voter_log);
    assert_eq!(learner_log.len(), 200);
}

//! Scenario 3: three-replica election then leader kill (spec §8 seed test 3).

mod common;

use common::{put_command, spin_up_cluster};
use samyama::config::RaftConfig;
use std::time::Duration;

#[tokio::test]
async fn three_voters_elect_one_leader_and_recover_after_the_leader_is_killed() {
    let cluster = spin_up_cluster(&[1, 2, 3], &[], RaftConfig::fast_for_tests()).await;

    // Give the election timer room to fire and a leader to emerge.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let (first_leader, _) = cluster
        .propose_via_leader(put_command("k0", "v0"))
        .await
        .expect("exactly one leader should have been elected");

    tokio::time::sleep(Duration::from_millis(300)).await;

    cluster.stop(first_leader);
    // Let the remaining two notice the silence and elect a replacement.
    tokio::time::sleep(Duration::from_millis(800)).await;

    let survivors: Vec<u64> = cluster.handles.keys().copied().filter(|&id| id != first_leader).collect();
    let mut committed = 0;
    for i in 0..100 {
        if cluster.propose_via_leader(put_command(&format!("k{i}"), "v")).await.is_some() {
            committed += 1;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(committed > 0, "a new leader must have formed to accept writes");

    tokio::time::sleep(Duration::from_millis(500)).await;

    let logs: Vec<Vec<u64>> = survivors.iter().map(|id| cluster.sinks[id].applied_indices()).collect();
    for w in logs.windows(2) {
        assert_eq!(w[0], w[1], "surviving replicas must converge to identical applied logs");
    }
}

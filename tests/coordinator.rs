//! Coordinator concurrency tests
//!
//! Exercises registration, liveness and guild aggregation through the
//! public `Coordinator` API with many concurrent callers.

use shard_coordinator::metrics::CoordinatorMetrics;
use shard_coordinator::{
    Aggregate, Coordinator, CoordinatorConfig, CoordinatorError, Heartbeat, PartitionRecord,
};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use twilight_model::id::Id;

fn coordinator(total_shards: u32) -> Coordinator {
    Coordinator::new(
        CoordinatorConfig::new(total_shards),
        Arc::new(CoordinatorMetrics::new()),
        None,
    )
}

fn guild(id: u64, members: u64) -> PartitionRecord {
    PartitionRecord {
        guild_id: Id::new(id),
        member_count: members,
        admin_ids: BTreeSet::new(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registration_hands_out_unique_ids() {
    let total_shards = 32;
    let coordinator = coordinator(total_shards);

    let handles: Vec<_> = (0..=total_shards)
        .map(|_| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.register().await })
        })
        .collect();

    let mut ids = HashSet::new();
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(registration) => {
                assert!(registration.shard_id < total_shards);
                assert_eq!(registration.total_shards, total_shards);
                assert!(ids.insert(registration.shard_id), "duplicate shard id handed out");
            }
            Err(CoordinatorError::CapacityExhausted { total_shards: n }) => {
                assert_eq!(n, total_shards);
                rejected += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(ids.len(), total_shards as usize);
    assert_eq!(rejected, 1);
}

#[tokio::test(start_paused = true)]
async fn silent_shard_is_evicted_exactly_once_and_id_is_reused() {
    let coordinator = coordinator(3);
    for expected in 0..3 {
        assert_eq!(coordinator.register().await.unwrap().shard_id, expected);
    }

    tokio::time::advance(Duration::from_secs(3)).await;
    coordinator.checkin(0).await.unwrap();
    coordinator.checkin(2).await.unwrap();
    tokio::time::advance(Duration::from_secs(3)).await;

    assert_eq!(coordinator.sweep_expired().await, vec![1]);
    assert!(coordinator.sweep_expired().await.is_empty());

    let registration = coordinator.register().await.unwrap();
    assert_eq!(registration.shard_id, 1);
}

#[tokio::test(start_paused = true)]
async fn checkin_racing_a_sweep_leaves_shard_registered() {
    for _ in 0..50 {
        let coordinator = coordinator(1);
        coordinator.register().await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;

        let sweeper = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.sweep_expired().await })
        };
        let checkin = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.checkin(0).await })
        };

        let evicted = sweeper.await.unwrap();
        let outcome = checkin.await.unwrap().unwrap();

        // Whichever ran first, the checkin is the later event
        if evicted.is_empty() {
            assert_eq!(outcome, Heartbeat::Refreshed);
        } else {
            assert_eq!(outcome, Heartbeat::Readmitted);
        }
        assert!(coordinator.fleet_report().await.slots[0].registered);
    }
}

#[tokio::test(start_paused = true)]
async fn late_checkin_after_eviction_readmits() {
    let coordinator = coordinator(2);
    coordinator.register().await.unwrap();
    tokio::time::advance(Duration::from_secs(6)).await;
    assert_eq!(coordinator.sweep_expired().await, vec![0]);

    assert_eq!(coordinator.checkin(0).await.unwrap(), Heartbeat::Readmitted);
    assert_eq!(coordinator.register().await.unwrap().shard_id, 1);
}

#[tokio::test]
async fn checkin_out_of_range_is_unknown_shard() {
    let coordinator = coordinator(2);
    let err = coordinator.checkin(2).await.unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::UnknownShard { shard_id: 2, total_shards: 2 }
    ));
}

#[tokio::test]
async fn aggregate_sums_all_shards() {
    let coordinator = coordinator(2);
    coordinator.register().await.unwrap();
    coordinator.register().await.unwrap();

    coordinator.update_guilds(0, vec![guild(1, 3)]).await.unwrap();
    coordinator
        .update_guilds(1, vec![guild(2, 5), guild(3, 2)])
        .await
        .unwrap();

    assert_eq!(
        coordinator.query_aggregate().await,
        Aggregate { guild_count: 3, user_count: 10 }
    );
}

#[tokio::test]
async fn second_snapshot_supersedes_first() {
    let coordinator = coordinator(1);
    coordinator.register().await.unwrap();

    coordinator
        .update_guilds(0, vec![guild(1, 40), guild(2, 60)])
        .await
        .unwrap();
    assert_eq!(coordinator.query_aggregate().await.user_count, 100);

    coordinator.update_guilds(0, vec![guild(3, 7)]).await.unwrap();
    assert_eq!(
        coordinator.query_aggregate().await,
        Aggregate { guild_count: 1, user_count: 7 }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stream_is_unaffected_by_concurrent_pushes() {
    let coordinator = coordinator(2);
    coordinator.register().await.unwrap();
    coordinator.register().await.unwrap();
    coordinator
        .update_guilds(0, (1..=100).map(|id| guild(id, 1)).collect())
        .await
        .unwrap();
    coordinator.update_guilds(1, vec![guild(500, 9)]).await.unwrap();

    let mut stream = coordinator.stream_all_guilds().await;
    let first: Vec<u64> = stream.by_ref().take(10).map(|r| r.guild_id.get()).collect();
    assert_eq!(first, (1..=10).collect::<Vec<_>>());

    let pushers: Vec<_> = (0..20)
        .map(|round| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .update_guilds(1, vec![guild(1000 + round, 2)])
                    .await
                    .unwrap()
            })
        })
        .collect();
    for pusher in pushers {
        assert!(pusher.await.unwrap());
    }

    let rest: Vec<u64> = stream.map(|r| r.guild_id.get()).collect();
    let mut expected: Vec<u64> = (11..=100).collect();
    expected.push(500);
    assert_eq!(rest, expected);

    assert_eq!(coordinator.query_aggregate().await.guild_count, 101);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_pushes_from_many_shards_do_not_double_count() {
    let total_shards = 8;
    let coordinator = coordinator(total_shards);
    for _ in 0..total_shards {
        coordinator.register().await.unwrap();
    }

    let handles: Vec<_> = (0..total_shards)
        .flat_map(|shard_id| {
            let coordinator = coordinator.clone();
            (0..10).map(move |round| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    let base = u64::from(shard_id) * 1000 + 1;
                    let records = (0..5).map(|i| guild(base + i, round + 1)).collect();
                    coordinator.update_guilds(shard_id, records).await.unwrap()
                })
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    // Every shard holds exactly one 5-guild snapshot, whatever round won
    let aggregate = coordinator.query_aggregate().await;
    assert_eq!(aggregate.guild_count, u64::from(total_shards) * 5);
    assert_eq!(coordinator.stream_all_guilds().await.count(), total_shards as usize * 5);
}

#[tokio::test(start_paused = true)]
async fn overflowing_member_counts_do_not_break_aggregation_or_sweeps() {
    let coordinator = coordinator(2);
    coordinator.register().await.unwrap();
    coordinator.register().await.unwrap();

    assert!(coordinator.update_guilds(0, vec![guild(1, u64::MAX)]).await.unwrap());
    assert!(coordinator.update_guilds(1, vec![guild(2, 1)]).await.unwrap());

    assert_eq!(
        coordinator.query_aggregate().await,
        Aggregate { guild_count: 2, user_count: u64::MAX }
    );

    tokio::time::advance(Duration::from_secs(3)).await;
    coordinator.checkin(1).await.unwrap();
    tokio::time::advance(Duration::from_secs(3)).await;

    assert_eq!(coordinator.sweep_expired().await, vec![0]);
    assert_eq!(
        coordinator.query_aggregate().await,
        Aggregate { guild_count: 1, user_count: 1 }
    );
}
